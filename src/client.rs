// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! # Descarga Client
//!
//! Sequences the SAT operations: every business call (query, verify,
//! download) first obtains a token through the [`TokenPolicy`], refuses to
//! continue when the token is not valid, then sends the signed request with
//! the token attached and decodes the answer.
//!
//! The credential is passed to each call. The client holds no per-user state
//! beyond what the policy chooses to keep.

use std::time::Duration;

use chrono::Utc;
use tracing::{debug, info, warn};

use crate::decode::{decode_download, decode_query, decode_token, decode_verify};
use crate::endpoints::ServiceEndpoints;
use crate::envelope::{
    authenticate_request, download_request, query_request, verify_request, SoapRequest,
};
use crate::error::{DescargaError, Result};
use crate::models::{DownloadResult, QueryParameters, QueryResult, Token, VerifyResult};
use crate::signing::{format_timestamp, Credential};
use crate::transport::Transport;

/// Validity window requested for each authentication.
pub const DEFAULT_TOKEN_VALIDITY: Duration = Duration::from_secs(300);

/// Decides whether a previously issued token may be reused.
pub trait TokenPolicy: Send + Sync {
    /// A token to reuse for `rfc`, if any.
    fn reusable(&self, rfc: &str) -> Option<Token>;

    /// Offer a freshly issued token for later reuse.
    fn store(&self, rfc: &str, token: &Token);
}

/// Never reuses tokens: every business call authenticates again.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoTokenCache;

impl TokenPolicy for NoTokenCache {
    fn reusable(&self, _rfc: &str) -> Option<Token> {
        None
    }

    fn store(&self, _rfc: &str, _token: &Token) {}
}

/// Client for the four SAT mass download operations.
pub struct DescargaClient<T, P = NoTokenCache> {
    transport: T,
    endpoints: ServiceEndpoints,
    policy: P,
    token_validity: Duration,
}

impl<T: Transport> DescargaClient<T> {
    pub fn new(transport: T, endpoints: ServiceEndpoints) -> Self {
        Self::with_policy(transport, endpoints, NoTokenCache)
    }
}

impl<T: Transport, P: TokenPolicy> DescargaClient<T, P> {
    pub fn with_policy(transport: T, endpoints: ServiceEndpoints, policy: P) -> Self {
        Self {
            transport,
            endpoints,
            policy,
            token_validity: DEFAULT_TOKEN_VALIDITY,
        }
    }

    /// Override the validity window requested on authentication.
    pub fn with_token_validity(mut self, validity: Duration) -> Self {
        self.token_validity = validity;
        self
    }

    pub fn endpoints(&self) -> &ServiceEndpoints {
        &self.endpoints
    }

    /// Authenticate and return the issued token, valid or not.
    pub async fn authenticate<C: Credential + ?Sized>(&self, credential: &C) -> Result<Token> {
        let created = Utc::now();
        let expires = chrono::Duration::from_std(self.token_validity)
            .ok()
            .and_then(|validity| created.checked_add_signed(validity))
            .ok_or_else(|| DescargaError::InvalidTokenWindow {
                created: format_timestamp(&created),
                expires: "out of range".to_string(),
            })?;
        let request = authenticate_request(&self.endpoints, credential, created, expires, None)?;

        let response = self.transport.send(&request).await?;
        let token = decode_token(&response.body)?;

        info!(
            rfc = %credential.subject_rfc(),
            expires = %token.expires(),
            valid = token.is_valid(),
            "Authenticated with SAT"
        );
        Ok(token)
    }

    /// Submit a download request.
    pub async fn query<C: Credential + ?Sized>(
        &self,
        credential: &C,
        parameters: &QueryParameters,
    ) -> Result<QueryResult> {
        let token = self.valid_token(credential).await?;
        let request = query_request(&self.endpoints, credential, token.value(), parameters)?;
        let result = decode_query(&self.send(&request).await?)?;

        info!(
            request_id = %result.request_id,
            code = result.status.code,
            message = %result.status.message,
            "Download request submitted"
        );
        Ok(result)
    }

    /// Poll the state of a download request.
    pub async fn verify<C: Credential + ?Sized>(
        &self,
        credential: &C,
        request_id: &str,
    ) -> Result<VerifyResult> {
        let token = self.valid_token(credential).await?;
        let request = verify_request(&self.endpoints, credential, token.value(), request_id)?;
        let result = decode_verify(&self.send(&request).await?)?;

        info!(
            request_id = %request_id,
            request_status = ?result.request_status,
            packages = result.package_ids.len(),
            "Download request verified"
        );
        Ok(result)
    }

    /// Retrieve one package.
    pub async fn download<C: Credential + ?Sized>(
        &self,
        credential: &C,
        package_id: &str,
    ) -> Result<DownloadResult> {
        let token = self.valid_token(credential).await?;
        let request = download_request(&self.endpoints, credential, token.value(), package_id)?;
        let result = decode_download(&self.send(&request).await?)?;

        info!(
            package_id = %package_id,
            code = result.status.code,
            size = result.package_base64.len(),
            "Package downloaded"
        );
        Ok(result)
    }

    async fn valid_token<C: Credential + ?Sized>(&self, credential: &C) -> Result<Token> {
        let rfc = credential.subject_rfc();
        if let Some(token) = self.policy.reusable(&rfc).filter(Token::is_valid) {
            debug!(rfc = %rfc, "Reusing token");
            return Ok(token);
        }

        let token = self.authenticate(credential).await?;
        if !token.is_valid() {
            warn!(rfc = %rfc, "Authentication returned an unusable token");
            return Err(DescargaError::InvalidToken);
        }
        self.policy.store(&rfc, &token);
        Ok(token)
    }

    async fn send(&self, request: &SoapRequest) -> Result<String> {
        Ok(self.transport.send(request).await?.body)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::envelope::{soap_action, SoapResponse};
    use crate::models::RequestStatus;
    use crate::signing::credential::test_credential;
    use async_trait::async_trait;
    use std::collections::{HashMap, VecDeque};
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::{Arc, Mutex};

    /// Replays canned responses and records every request. Clones share state.
    #[derive(Clone, Default)]
    struct RecordingTransport {
        responses: Arc<Mutex<VecDeque<Result<SoapResponse>>>>,
        requests: Arc<Mutex<Vec<SoapRequest>>>,
    }

    impl RecordingTransport {
        fn replying(responses: Vec<Result<SoapResponse>>) -> Self {
            Self {
                responses: Arc::new(Mutex::new(responses.into())),
                requests: Arc::default(),
            }
        }

        fn requests(&self) -> Vec<SoapRequest> {
            self.requests.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl Transport for RecordingTransport {
        async fn send(&self, request: &SoapRequest) -> Result<SoapResponse> {
            self.requests.lock().unwrap().push(request.clone());
            self.responses
                .lock()
                .unwrap()
                .pop_front()
                .unwrap_or_else(|| Ok(SoapResponse::new(200, "")))
        }
    }

    #[derive(Default)]
    struct MemoryPolicy {
        tokens: Mutex<HashMap<String, Token>>,
    }

    impl TokenPolicy for &MemoryPolicy {
        fn reusable(&self, rfc: &str) -> Option<Token> {
            self.tokens.lock().unwrap().get(rfc).cloned()
        }

        fn store(&self, rfc: &str, token: &Token) {
            self.tokens
                .lock()
                .unwrap()
                .insert(rfc.to_string(), token.clone());
        }
    }

    fn token_response(value: &str, lifetime: chrono::Duration) -> Result<SoapResponse> {
        let created = Utc::now();
        Ok(SoapResponse::new(
            200,
            format!(
                r#"<s:Envelope xmlns:s="http://schemas.xmlsoap.org/soap/envelope/" xmlns:u="http://docs.oasis-open.org/wss/2004/01/oasis-200401-wss-wssecurity-utility-1.0.xsd"><s:Header><o:Security xmlns:o="http://docs.oasis-open.org/wss/2004/01/oasis-200401-wss-wssecurity-secext-1.0.xsd"><u:Timestamp u:Id="_0"><u:Created>{}</u:Created><u:Expires>{}</u:Expires></u:Timestamp></o:Security></s:Header><s:Body><AutenticaResponse xmlns="http://DescargaMasivaTerceros.gob.mx"><AutenticaResult>{value}</AutenticaResult></AutenticaResponse></s:Body></s:Envelope>"#,
                format_timestamp(&created),
                format_timestamp(&(created + lifetime)),
            ),
        ))
    }

    fn live_token_response() -> Result<SoapResponse> {
        token_response("live-token", chrono::Duration::minutes(5))
    }

    const QUERY_ACCEPTED: &str = r#"<s:Envelope xmlns:s="http://schemas.xmlsoap.org/soap/envelope/"><s:Body><SolicitaDescargaResponse xmlns="http://DescargaMasivaTerceros.sat.gob.mx"><SolicitaDescargaResult IdSolicitud="REQ-1" CodEstado="5000" Mensaje="Solicitud Aceptada"/></SolicitaDescargaResponse></s:Body></s:Envelope>"#;

    const VERIFY_FINISHED: &str = r#"<s:Envelope xmlns:s="http://schemas.xmlsoap.org/soap/envelope/"><s:Body><VerificaSolicitudDescargaResponse xmlns="http://DescargaMasivaTerceros.sat.gob.mx"><VerificaSolicitudDescargaResult CodEstado="5000" EstadoSolicitud="3" CodigoEstadoSolicitud="5000" NumeroCFDIs="1" Mensaje="Solicitud Aceptada"><IdsPaquetes>REQ-1_01</IdsPaquetes></VerificaSolicitudDescargaResult></VerificaSolicitudDescargaResponse></s:Body></s:Envelope>"#;

    #[tokio::test]
    async fn query_authenticates_then_sends_with_wrap_token() {
        let transport = RecordingTransport::replying(vec![
            live_token_response(),
            Ok(SoapResponse::new(200, QUERY_ACCEPTED)),
        ]);
        let client = DescargaClient::new(transport.clone(), ServiceEndpoints::cfdi());
        let credential = test_credential();

        let result = client
            .query(&credential, &QueryParameters::folio("UUID-1"))
            .await
            .unwrap();
        assert_eq!(result.request_id, "REQ-1");
        assert!(result.status.is_accepted());

        let requests = transport.requests();
        assert_eq!(requests.len(), 2);
        assert_eq!(requests[0].soap_action(), soap_action::AUTHENTICATE);
        assert_eq!(requests[0].header("Authorization"), None);
        assert_eq!(requests[1].soap_action(), soap_action::QUERY);
        assert_eq!(
            requests[1].header("Authorization"),
            Some("WRAP access_token=\"live-token\"")
        );
    }

    /// Answers by SOAP action, issuing a distinct token per authentication,
    /// and yields inside every call so concurrent operations interleave.
    #[derive(Clone, Default)]
    struct RoutingTransport {
        issued: Arc<AtomicUsize>,
        requests: Arc<Mutex<Vec<SoapRequest>>>,
    }

    #[async_trait]
    impl Transport for RoutingTransport {
        async fn send(&self, request: &SoapRequest) -> Result<SoapResponse> {
            self.requests.lock().unwrap().push(request.clone());
            tokio::task::yield_now().await;
            if request.soap_action() == soap_action::AUTHENTICATE {
                let n = self.issued.fetch_add(1, Ordering::SeqCst) + 1;
                token_response(&format!("token-{n}"), chrono::Duration::minutes(5))
            } else {
                Ok(SoapResponse::new(200, VERIFY_FINISHED))
            }
        }
    }

    #[tokio::test]
    async fn one_credential_serves_concurrent_operations() {
        let transport = RoutingTransport::default();
        let client = DescargaClient::new(transport.clone(), ServiceEndpoints::cfdi());
        let credential = test_credential();

        let (first, second) = tokio::join!(
            client.verify(&credential, "REQ-1"),
            client.verify(&credential, "REQ-2"),
        );
        assert!(first.unwrap().is_finished());
        assert!(second.unwrap().is_finished());

        let requests = transport.requests.lock().unwrap().clone();
        assert_eq!(requests.len(), 4);
        let mut wraps: Vec<String> = requests
            .iter()
            .filter(|request| request.soap_action() == soap_action::VERIFY)
            .filter_map(|request| request.header("Authorization").map(str::to_string))
            .collect();
        wraps.sort();
        assert_eq!(
            wraps,
            vec![
                "WRAP access_token=\"token-1\"".to_string(),
                "WRAP access_token=\"token-2\"".to_string(),
            ]
        );
    }

    #[tokio::test]
    async fn expired_token_stops_before_the_business_request() {
        let transport = RecordingTransport::replying(vec![token_response(
            "stale-token",
            chrono::Duration::zero(),
        )]);
        let client = DescargaClient::new(transport.clone(), ServiceEndpoints::cfdi());

        let err = client
            .verify(&test_credential(), "REQ-1")
            .await
            .unwrap_err();
        assert!(matches!(err, DescargaError::InvalidToken));
        assert_eq!(transport.requests().len(), 1);
    }

    #[tokio::test]
    async fn empty_token_stops_before_the_business_request() {
        let transport = RecordingTransport::replying(vec![token_response(
            "",
            chrono::Duration::minutes(5),
        )]);
        let client = DescargaClient::new(transport.clone(), ServiceEndpoints::cfdi());

        let err = client
            .download(&test_credential(), "PKG")
            .await
            .unwrap_err();
        assert!(matches!(err, DescargaError::InvalidToken));
        assert_eq!(transport.requests().len(), 1);
    }

    #[tokio::test]
    async fn every_call_reauthenticates_without_a_cache() {
        let transport = RecordingTransport::replying(vec![
            live_token_response(),
            Ok(SoapResponse::new(200, VERIFY_FINISHED)),
            live_token_response(),
            Ok(SoapResponse::new(200, VERIFY_FINISHED)),
        ]);
        let client = DescargaClient::new(transport.clone(), ServiceEndpoints::cfdi());
        let credential = test_credential();

        let first = client.verify(&credential, "REQ-1").await.unwrap();
        let second = client.verify(&credential, "REQ-1").await.unwrap();
        assert_eq!(first, second);
        assert_eq!(first.request_status, RequestStatus::Finished);

        let actions: Vec<String> = transport
            .requests()
            .iter()
            .map(|r| r.soap_action().to_string())
            .collect();
        assert_eq!(
            actions,
            vec![
                soap_action::AUTHENTICATE,
                soap_action::VERIFY,
                soap_action::AUTHENTICATE,
                soap_action::VERIFY
            ]
        );
    }

    #[tokio::test]
    async fn caching_policy_reuses_a_valid_token() {
        let transport = RecordingTransport::replying(vec![
            live_token_response(),
            Ok(SoapResponse::new(200, VERIFY_FINISHED)),
            Ok(SoapResponse::new(200, VERIFY_FINISHED)),
        ]);
        let policy = MemoryPolicy::default();
        let client = DescargaClient::with_policy(transport.clone(), ServiceEndpoints::cfdi(), &policy);
        let credential = test_credential();

        client.verify(&credential, "REQ-1").await.unwrap();
        client.verify(&credential, "REQ-1").await.unwrap();

        let requests = transport.requests();
        assert_eq!(requests.len(), 3);
        assert_eq!(requests[2].soap_action(), soap_action::VERIFY);
        assert_eq!(
            requests[2].header("Authorization"),
            Some("WRAP access_token=\"live-token\"")
        );
    }

    #[tokio::test]
    async fn transport_failure_surfaces_with_request_context() {
        let transport = RecordingTransport::replying(vec![
            live_token_response(),
            Err(DescargaError::Transport {
                uri: ServiceEndpoints::cfdi().download().to_string(),
                soap_action: soap_action::DOWNLOAD.to_string(),
                status: Some(500),
                message: "returned 500 Internal Server Error".to_string(),
            }),
        ]);
        let client = DescargaClient::new(transport.clone(), ServiceEndpoints::cfdi());

        let err = client
            .download(&test_credential(), "PKG")
            .await
            .unwrap_err();
        assert!(err.is_transport());
        assert!(matches!(
            err,
            DescargaError::Transport { status: Some(500), soap_action: ref action, .. }
                if action == soap_action::DOWNLOAD
        ));
    }

    #[tokio::test]
    async fn token_validity_sets_the_requested_window() {
        let transport = RecordingTransport::replying(vec![live_token_response()]);
        let client = DescargaClient::new(transport.clone(), ServiceEndpoints::cfdi())
            .with_token_validity(Duration::from_secs(60));

        client.authenticate(&test_credential()).await.unwrap();

        let body = &transport.requests()[0].body;
        let document = roxmltree::Document::parse(body).unwrap();
        let timestamp = |name: &str| {
            let text = crate::xml::find_content(
                document.root_element(),
                &["Header", "Security", "Timestamp", name],
            );
            chrono::DateTime::parse_from_rfc3339(&text).unwrap()
        };
        assert_eq!(
            timestamp("Expires") - timestamp("Created"),
            chrono::Duration::seconds(60)
        );
    }
}
