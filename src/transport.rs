// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! HTTP transport for SOAP requests.
//!
//! [`Transport`] is the seam between envelope building and the network so the
//! client can be exercised without the SAT services. [`ReqwestTransport`] is
//! the production implementation.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, Method};
use tracing::{debug, warn};

use crate::envelope::{SoapRequest, SoapResponse};
use crate::error::{DescargaError, Result};

/// Sends a prepared SOAP request and returns the raw response.
///
/// Implementations report non-2xx answers as [`DescargaError::Transport`] and
/// expired deadlines as [`DescargaError::Timeout`].
#[async_trait]
pub trait Transport: Send + Sync {
    async fn send(&self, request: &SoapRequest) -> Result<SoapResponse>;
}

/// [`Transport`] backed by a `reqwest` client with a request timeout.
#[derive(Debug, Clone)]
pub struct ReqwestTransport {
    http: Client,
}

impl ReqwestTransport {
    pub fn new(timeout: Duration) -> Result<Self> {
        let http = Client::builder().timeout(timeout).build().map_err(|e| {
            DescargaError::Transport {
                uri: String::new(),
                soap_action: String::new(),
                status: None,
                message: format!("failed to build HTTP client: {e}"),
            }
        })?;
        Ok(Self { http })
    }
}

#[async_trait]
impl Transport for ReqwestTransport {
    async fn send(&self, request: &SoapRequest) -> Result<SoapResponse> {
        let soap_action = request.soap_action().to_string();
        let transport_error = |status: Option<u16>, message: String| DescargaError::Transport {
            uri: request.uri.clone(),
            soap_action: soap_action.clone(),
            status,
            message,
        };

        let method = Method::from_bytes(request.method.as_bytes())
            .map_err(|e| transport_error(None, format!("invalid method {}: {e}", request.method)))?;

        let mut builder = self
            .http
            .request(method, &request.uri)
            .body(request.body.clone());
        for (name, value) in &request.headers {
            builder = builder.header(name.as_str(), value.as_str());
        }

        let response = builder.send().await.map_err(|e| {
            if e.is_timeout() {
                DescargaError::Timeout {
                    uri: request.uri.clone(),
                    soap_action: soap_action.clone(),
                }
            } else {
                transport_error(None, format!("{} {} failed: {e}", request.method, request.uri))
            }
        })?;

        let status = response.status();
        let body = response.text().await.map_err(|e| {
            if e.is_timeout() {
                DescargaError::Timeout {
                    uri: request.uri.clone(),
                    soap_action: soap_action.clone(),
                }
            } else {
                transport_error(Some(status.as_u16()), format!("failed to read body: {e}"))
            }
        })?;

        if !status.is_success() {
            warn!(
                uri = %request.uri,
                soap_action = %soap_action,
                status = status.as_u16(),
                "SOAP request rejected"
            );
            return Err(transport_error(
                Some(status.as_u16()),
                format!("returned {status}: {body}"),
            ));
        }

        debug!(uri = %request.uri, status = status.as_u16(), body = %body, "SOAP response received");
        Ok(SoapResponse::new(status.as_u16(), body))
    }
}
