// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! SOAP envelopes for the four SAT operations.
//!
//! Every business envelope (query, verify, download) signs its inner request
//! element with an enveloped XML-DSig signature that references the whole
//! document (`URI=""`). The authentication envelope instead carries a
//! WS-Security header whose signature covers the timestamp.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use tracing::debug;

use crate::endpoints::ServiceEndpoints;
use crate::error::Result;
use crate::models::QueryParameters;
use crate::signing::{build_security_header, sign_fragment, Credential};
use crate::xml::{ns, strip_whitespace, XmlElement};

pub const CONTENT_TYPE: &str = "text/xml; charset=utf-8";

/// `SOAPAction` header values, one per operation.
pub mod soap_action {
    pub const AUTHENTICATE: &str = "http://DescargaMasivaTerceros.gob.mx/IAutenticacion/Autentica";
    pub const QUERY: &str =
        "http://DescargaMasivaTerceros.sat.gob.mx/ISolicitaDescargaService/SolicitaDescarga";
    pub const VERIFY: &str =
        "http://DescargaMasivaTerceros.sat.gob.mx/IVerificaSolicitudDescargaService/VerificaSolicitudDescarga";
    pub const DOWNLOAD: &str =
        "http://DescargaMasivaTerceros.sat.gob.mx/IDescargaMasivaTercerosService/Descargar";
}

// =============================================================================
// Request / Response
// =============================================================================

/// An HTTP request ready to be handed to a transport.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SoapRequest {
    pub method: String,
    pub uri: String,
    pub body: String,
    pub headers: Vec<(String, String)>,
}

impl SoapRequest {
    fn post(uri: &str, action: &str, body: String, token: Option<&str>) -> Self {
        let mut headers = vec![
            ("SOAPAction".to_string(), action.to_string()),
            ("Content-Type".to_string(), CONTENT_TYPE.to_string()),
        ];
        if let Some(token) = token {
            headers.push((
                "Authorization".to_string(),
                format!("WRAP access_token=\"{token}\""),
            ));
        }
        Self {
            method: "POST".to_string(),
            uri: uri.to_string(),
            body,
            headers,
        }
    }

    /// Header value by case-insensitive name.
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(key, _)| key.eq_ignore_ascii_case(name))
            .map(|(_, value)| value.as_str())
    }

    pub fn soap_action(&self) -> &str {
        self.header("SOAPAction").unwrap_or_default()
    }
}

/// What came back from the remote service.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SoapResponse {
    pub status_code: u16,
    pub body: String,
}

impl SoapResponse {
    pub fn new(status_code: u16, body: impl Into<String>) -> Self {
        Self {
            status_code,
            body: body.into(),
        }
    }

    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status_code)
    }
}

// =============================================================================
// Authenticate
// =============================================================================

/// Build the authentication request for the window `[created, expires)`.
pub fn authenticate_request<C: Credential + ?Sized>(
    endpoints: &ServiceEndpoints,
    credential: &C,
    created: DateTime<Utc>,
    expires: DateTime<Utc>,
    security_token_id: Option<&str>,
) -> Result<SoapRequest> {
    let security = build_security_header(created, expires, security_token_id, credential)?;

    let envelope = XmlElement::new("s:Envelope")
        .attr("xmlns:s", ns::SOAP_ENVELOPE)
        .attr("xmlns:u", ns::WSU)
        .child(XmlElement::new("s:Header").child(security))
        .child(
            XmlElement::new("s:Body").child(
                XmlElement::new("Autentica")
                    .attr("xmlns", ns::AUTENTICACION)
                    .self_closing(),
            ),
        );

    Ok(finish(
        endpoints.authenticate(),
        soap_action::AUTHENTICATE,
        &envelope,
        None,
    ))
}

// =============================================================================
// Business operations
// =============================================================================

/// Build the download request (`SolicitaDescarga`) for `parameters`.
pub fn query_request<C: Credential + ?Sized>(
    endpoints: &ServiceEndpoints,
    credential: &C,
    token: &str,
    parameters: &QueryParameters,
) -> Result<SoapRequest> {
    let attributes = solicitud_attributes(parameters, &credential.subject_rfc());
    let receivers = match parameters {
        QueryParameters::DateRange(query) if !query.receiver_rfcs.is_empty() => Some(
            query
                .receiver_rfcs
                .iter()
                .fold(XmlElement::new("des:RfcReceptores"), |list, rfc| {
                    list.child(XmlElement::new("des:RfcReceptor").text(rfc.as_str()))
                }),
        ),
        _ => None,
    };

    let solicitud = XmlElement::new("des:solicitud")
        .attrs(attributes)
        .child_opt(receivers);
    let envelope = signed_business_envelope("des:SolicitaDescarga", solicitud, credential)?;

    Ok(finish(endpoints.query(), soap_action::QUERY, &envelope, Some(token)))
}

/// Build the status request (`VerificaSolicitudDescarga`) for `request_id`.
pub fn verify_request<C: Credential + ?Sized>(
    endpoints: &ServiceEndpoints,
    credential: &C,
    token: &str,
    request_id: &str,
) -> Result<SoapRequest> {
    let solicitud = XmlElement::new("des:solicitud")
        .attr("IdSolicitud", request_id)
        .attr("RfcSolicitante", credential.subject_rfc().to_uppercase());
    let envelope =
        signed_business_envelope("des:VerificaSolicitudDescarga", solicitud, credential)?;

    Ok(finish(endpoints.verify(), soap_action::VERIFY, &envelope, Some(token)))
}

/// Build the package request (`PeticionDescargaMasivaTercerosEntrada`).
pub fn download_request<C: Credential + ?Sized>(
    endpoints: &ServiceEndpoints,
    credential: &C,
    token: &str,
    package_id: &str,
) -> Result<SoapRequest> {
    let peticion = XmlElement::new("des:peticionDescarga")
        .attr("IdPaquete", package_id)
        .attr("RfcSolicitante", credential.subject_rfc().to_uppercase());
    let envelope = signed_business_envelope(
        "des:PeticionDescargaMasivaTercerosEntrada",
        peticion,
        credential,
    )?;

    Ok(finish(endpoints.download(), soap_action::DOWNLOAD, &envelope, Some(token)))
}

/// Attributes of `<des:solicitud>`: empty values dropped, keys in ascending
/// order. The signed bytes depend on this order.
pub fn solicitud_attributes(
    parameters: &QueryParameters,
    signer_rfc: &str,
) -> Vec<(&'static str, String)> {
    let mut attributes = BTreeMap::new();
    attributes.insert("RfcSolicitante", signer_rfc.to_uppercase());
    attributes.insert("TipoSolicitud", parameters.request_type().value().to_string());

    match parameters {
        QueryParameters::Folio(uuid) => {
            attributes.insert("Folio", uuid.clone());
        }
        QueryParameters::DateRange(query) => {
            attributes.insert("FechaInicial", query.start_value());
            attributes.insert("FechaFinal", query.end_value());
            attributes.insert("RfcEmisor", query.issuer_rfc.clone());
            attributes.insert("TipoComprobante", query.document_type.value().to_string());
            attributes.insert("EstadoComprobante", query.document_status.value().to_string());
            attributes.insert("RfcACuentaTerceros", query.on_behalf_rfc.clone());
            attributes.insert("Complemento", query.complement.clone());
        }
    }

    attributes
        .into_iter()
        .filter(|(_, value)| !value.is_empty())
        .collect()
}

// The digested fragment declares `xmlns:des` on the operation element; in the
// envelope the prefix is declared on <s:Envelope> and the signature becomes
// the last child of the request element.
fn signed_business_envelope<C: Credential + ?Sized>(
    operation: &str,
    request: XmlElement,
    credential: &C,
) -> Result<XmlElement> {
    let fragment = XmlElement::new(operation)
        .attr("xmlns:des", ns::DESCARGA)
        .child(request.clone());
    let signature = sign_fragment(&fragment.to_xml(), "", None, credential)?;

    Ok(XmlElement::new("s:Envelope")
        .attr("xmlns:s", ns::SOAP_ENVELOPE)
        .attr("xmlns:des", ns::DESCARGA)
        .attr("xmlns:xd", ns::DSIG)
        .child(XmlElement::new("s:Header").self_closing())
        .child(
            XmlElement::new("s:Body")
                .child(XmlElement::new(operation).child(request.child(signature))),
        ))
}

fn finish(uri: &str, action: &str, envelope: &XmlElement, token: Option<&str>) -> SoapRequest {
    let body = strip_whitespace(&envelope.to_xml());
    debug!(uri = %uri, soap_action = %action, body = %body, "Built SOAP envelope");
    SoapRequest::post(uri, action, body, token)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{DateRangeQuery, DocumentType};
    use crate::signing::credential::test_credential;
    use crate::signing::digest_value;
    use chrono::{Duration, NaiveDate, TimeZone};

    const DESCARGA_ENVELOPE_OPEN: &str = "<s:Envelope xmlns:s=\"http://schemas.xmlsoap.org/soap/envelope/\" xmlns:des=\"http://DescargaMasivaTerceros.sat.gob.mx\" xmlns:xd=\"http://www.w3.org/2000/09/xmldsig#\"><s:Header/><s:Body>";

    fn january() -> DateRangeQuery {
        DateRangeQuery::new(
            NaiveDate::from_ymd_opt(2024, 1, 1).unwrap(),
            NaiveDate::from_ymd_opt(2024, 1, 31).unwrap(),
        )
    }

    #[test]
    fn empty_attributes_are_omitted_and_keys_sorted() {
        let attributes = solicitud_attributes(&QueryParameters::folio(""), "AAA010101AAA");
        let element = XmlElement::new("des:solicitud").attrs(attributes);
        assert_eq!(
            element.to_xml(),
            "<des:solicitud RfcSolicitante=\"AAA010101AAA\" TipoSolicitud=\"CFDI\"></des:solicitud>"
        );
    }

    #[test]
    fn date_range_attributes_are_in_lexicographic_order() {
        let query = DateRangeQuery::issued(
            january().start,
            january().end,
            "eku9003173c9",
            Vec::new(),
        )
        .with_document_type(DocumentType::Ingreso);
        let keys: Vec<&str> = solicitud_attributes(&query.into(), "eku9003173c9")
            .into_iter()
            .map(|(key, _)| key)
            .collect();
        assert_eq!(
            keys,
            vec![
                "FechaFinal",
                "FechaInicial",
                "RfcEmisor",
                "RfcSolicitante",
                "TipoComprobante",
                "TipoSolicitud"
            ]
        );
    }

    #[test]
    fn query_envelope_signs_the_request_fragment() {
        let credential = test_credential();
        let request = query_request(
            &ServiceEndpoints::cfdi(),
            &credential,
            "token-value",
            &QueryParameters::folio("B1F05B1A-0000-4000-8000-000000000001"),
        )
        .unwrap();

        let solicitud = "<des:solicitud Folio=\"B1F05B1A-0000-4000-8000-000000000001\" RfcSolicitante=\"EKU9003173C9\" TipoSolicitud=\"CFDI\">";
        let fragment = format!(
            "<des:SolicitaDescarga xmlns:des=\"http://DescargaMasivaTerceros.sat.gob.mx\">{solicitud}</des:solicitud></des:SolicitaDescarga>"
        );

        assert!(request.body.starts_with(&format!(
            "{DESCARGA_ENVELOPE_OPEN}<des:SolicitaDescarga>{solicitud}<Signature xmlns="
        )));
        assert!(request.body.ends_with(
            "</Signature></des:solicitud></des:SolicitaDescarga></s:Body></s:Envelope>"
        ));
        assert!(request
            .body
            .contains(&format!("<DigestValue>{}</DigestValue>", digest_value(&fragment))));
        assert!(request.body.contains("<Reference URI=\"\">"));
        assert!(roxmltree::Document::parse(&request.body).is_ok());
    }

    #[test]
    fn query_envelope_lists_receivers_before_the_signature() {
        let credential = test_credential();
        let query = DateRangeQuery::received(
            january().start,
            january().end,
            vec!["AAA010101AAA".into(), "BBB010101BBB".into()],
        );
        let request =
            query_request(&ServiceEndpoints::cfdi(), &credential, "t", &query.into()).unwrap();
        assert!(request.body.contains(
            "<des:RfcReceptores><des:RfcReceptor>AAA010101AAA</des:RfcReceptor><des:RfcReceptor>BBB010101BBB</des:RfcReceptor></des:RfcReceptores><Signature"
        ));
        assert!(request.body.contains("FechaInicial=\"2024-01-01T00:00:00\""));
        assert!(request.body.contains("FechaFinal=\"2024-01-31T23:59:59\""));
        assert!(request.body.contains("RfcEmisor=\"AAA010101AAA\""));
    }

    #[test]
    fn business_requests_carry_soap_action_and_wrap_token() {
        let credential = test_credential();
        let endpoints = ServiceEndpoints::cfdi();
        let request = verify_request(&endpoints, &credential, "abc", "REQ-1").unwrap();

        assert_eq!(request.method, "POST");
        assert_eq!(request.uri, endpoints.verify());
        assert_eq!(request.soap_action(), soap_action::VERIFY);
        assert_eq!(request.header("content-type"), Some(CONTENT_TYPE));
        assert_eq!(
            request.header("Authorization"),
            Some("WRAP access_token=\"abc\"")
        );
        assert!(request.body.contains(
            "<des:VerificaSolicitudDescarga><des:solicitud IdSolicitud=\"REQ-1\" RfcSolicitante=\"EKU9003173C9\"><Signature"
        ));
    }

    #[test]
    fn download_envelope_targets_the_package() {
        let credential = test_credential();
        let endpoints = ServiceEndpoints::retenciones();
        let request = download_request(&endpoints, &credential, "abc", "PKG_01").unwrap();

        assert_eq!(request.uri, endpoints.download());
        assert_eq!(request.soap_action(), soap_action::DOWNLOAD);
        assert!(request.body.contains(
            "<des:PeticionDescargaMasivaTercerosEntrada><des:peticionDescarga IdPaquete=\"PKG_01\" RfcSolicitante=\"EKU9003173C9\"><Signature"
        ));
        let fragment = "<des:PeticionDescargaMasivaTercerosEntrada xmlns:des=\"http://DescargaMasivaTerceros.sat.gob.mx\"><des:peticionDescarga IdPaquete=\"PKG_01\" RfcSolicitante=\"EKU9003173C9\"></des:peticionDescarga></des:PeticionDescargaMasivaTercerosEntrada>";
        assert!(request
            .body
            .contains(&format!("<DigestValue>{}</DigestValue>", digest_value(fragment))));
    }

    #[test]
    fn authenticate_envelope_has_security_header_and_no_token() {
        let credential = test_credential();
        let created = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
        let request = authenticate_request(
            &ServiceEndpoints::cfdi(),
            &credential,
            created,
            created + Duration::minutes(5),
            Some("uuid-fixed-1"),
        )
        .unwrap();

        assert_eq!(request.soap_action(), soap_action::AUTHENTICATE);
        assert_eq!(request.header("Authorization"), None);
        assert!(request.body.starts_with(
            "<s:Envelope xmlns:s=\"http://schemas.xmlsoap.org/soap/envelope/\" xmlns:u=\"http://docs.oasis-open.org/wss/2004/01/oasis-200401-wss-wssecurity-utility-1.0.xsd\"><s:Header><o:Security"
        ));
        assert!(request.body.ends_with(
            "</o:Security></s:Header><s:Body><Autentica xmlns=\"http://DescargaMasivaTerceros.gob.mx\"/></s:Body></s:Envelope>"
        ));
        assert!(request
            .body
            .contains("<DigestValue>AzXU4CDtjsErheSLxSfdP9soGdY=</DigestValue>"));
        assert!(roxmltree::Document::parse(&request.body).is_ok());
    }
}
