// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! # Request and Result Models
//!
//! Value types exchanged with the SAT mass download service. Results derive
//! `Serialize` so an outer layer can relay them as JSON unchanged.
//!
//! ## Model Categories
//!
//! - **Token**: the bearer token returned by authentication
//! - **Query parameters**: folio lookups and date-range requests
//! - **Status tables**: request status and package acceptance codes
//! - **Results**: one typed result per business operation

use base64ct::{Base64, Encoding};
use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{DescargaError, Result};
use crate::signing::format_timestamp;

// =============================================================================
// Token
// =============================================================================

/// Bearer token issued by the authentication service.
///
/// A token whose expiration precedes its creation cannot be built. Validity is
/// evaluated against the clock every time it is asked for.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Token {
    created: DateTime<Utc>,
    expires: DateTime<Utc>,
    value: String,
}

impl Token {
    pub fn new(
        created: DateTime<Utc>,
        expires: DateTime<Utc>,
        value: impl Into<String>,
    ) -> Result<Self> {
        if expires < created {
            return Err(DescargaError::InvalidTokenWindow {
                created: format_timestamp(&created),
                expires: format_timestamp(&expires),
            });
        }
        Ok(Self {
            created,
            expires,
            value: value.into(),
        })
    }

    pub fn created(&self) -> DateTime<Utc> {
        self.created
    }

    pub fn expires(&self) -> DateTime<Utc> {
        self.expires
    }

    pub fn value(&self) -> &str {
        &self.value
    }

    pub fn is_value_empty(&self) -> bool {
        self.value.is_empty()
    }

    pub fn is_expired(&self) -> bool {
        self.is_expired_at(Utc::now())
    }

    /// Whether the token is expired at `now`. Expiration is inclusive.
    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        now >= self.expires
    }

    /// A token is usable when it has a value and has not expired.
    pub fn is_valid(&self) -> bool {
        !self.is_value_empty() && !self.is_expired()
    }
}

// =============================================================================
// Status
// =============================================================================

/// Status code and message the service attaches to every business response.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatusCode {
    pub code: i32,
    pub message: String,
}

impl StatusCode {
    /// Code the service uses when it accepted the call.
    pub const ACCEPTED: i32 = 5000;

    pub fn new(code: i32, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
        }
    }

    pub fn is_accepted(&self) -> bool {
        self.code == Self::ACCEPTED
    }
}

/// Processing state of a download request (`EstadoSolicitud`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum RequestStatus {
    Unknown,
    Accepted,
    InProgress,
    Finished,
    Failure,
    Rejected,
    Expired,
}

impl RequestStatus {
    pub fn from_code(code: i32) -> Option<Self> {
        match code {
            0 => Some(RequestStatus::Unknown),
            1 => Some(RequestStatus::Accepted),
            2 => Some(RequestStatus::InProgress),
            3 => Some(RequestStatus::Finished),
            4 => Some(RequestStatus::Failure),
            5 => Some(RequestStatus::Rejected),
            6 => Some(RequestStatus::Expired),
            _ => None,
        }
    }

    pub fn code(&self) -> i32 {
        match self {
            RequestStatus::Unknown => 0,
            RequestStatus::Accepted => 1,
            RequestStatus::InProgress => 2,
            RequestStatus::Finished => 3,
            RequestStatus::Failure => 4,
            RequestStatus::Rejected => 5,
            RequestStatus::Expired => 6,
        }
    }

    pub fn message(&self) -> &'static str {
        match self {
            RequestStatus::Unknown => "Desconocido",
            RequestStatus::Accepted => "Aceptada",
            RequestStatus::InProgress => "En proceso",
            RequestStatus::Finished => "Terminada",
            RequestStatus::Failure => "Error",
            RequestStatus::Rejected => "Rechazada",
            RequestStatus::Expired => "Vencida",
        }
    }

    /// Whether the service will not change this status any more.
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            RequestStatus::Finished
                | RequestStatus::Failure
                | RequestStatus::Rejected
                | RequestStatus::Expired
        )
    }
}

/// Outcome of package generation for a request (`CodigoEstadoSolicitud`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PackageAcceptance {
    Accepted,
    Exhausted,
    MaximumLimitReached,
    EmptyResult,
    Duplicated,
}

impl PackageAcceptance {
    pub fn from_code(code: i32) -> Option<Self> {
        match code {
            5000 => Some(PackageAcceptance::Accepted),
            5002 => Some(PackageAcceptance::Exhausted),
            5003 => Some(PackageAcceptance::MaximumLimitReached),
            5004 => Some(PackageAcceptance::EmptyResult),
            5005 => Some(PackageAcceptance::Duplicated),
            _ => None,
        }
    }

    pub fn code(&self) -> i32 {
        match self {
            PackageAcceptance::Accepted => 5000,
            PackageAcceptance::Exhausted => 5002,
            PackageAcceptance::MaximumLimitReached => 5003,
            PackageAcceptance::EmptyResult => 5004,
            PackageAcceptance::Duplicated => 5005,
        }
    }

    pub fn message(&self) -> &'static str {
        match self {
            PackageAcceptance::Accepted => "Solicitud recibida con éxito",
            PackageAcceptance::Exhausted => {
                "Se agotó las solicitudes de por vida: Máximo para solicitudes con los mismos parámetros"
            }
            PackageAcceptance::MaximumLimitReached => {
                "Tope máximo: Indica que se está superando el tope máximo de CFDI o Metadata"
            }
            PackageAcceptance::EmptyResult => {
                "No se encontró la información: Indica que no generó paquetes por falta de información."
            }
            PackageAcceptance::Duplicated => {
                "Solicitud duplicada: Si existe una solicitud vigente con los mismos parámetros"
            }
        }
    }
}

// =============================================================================
// Query Parameters
// =============================================================================

/// What the service should return for a request (`TipoSolicitud`).
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum RequestType {
    #[default]
    #[serde(rename = "CFDI")]
    Cfdi,
    Metadata,
}

impl RequestType {
    pub fn value(&self) -> &'static str {
        match self {
            RequestType::Cfdi => "CFDI",
            RequestType::Metadata => "Metadata",
        }
    }
}

/// CFDI voucher type filter (`TipoComprobante`). `Undefined` means no filter.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum DocumentType {
    #[default]
    #[serde(rename = "")]
    Undefined,
    #[serde(rename = "I")]
    Ingreso,
    #[serde(rename = "E")]
    Egreso,
    #[serde(rename = "T")]
    Traslado,
    #[serde(rename = "N")]
    Nomina,
    #[serde(rename = "P")]
    Pago,
}

impl DocumentType {
    pub fn value(&self) -> &'static str {
        match self {
            DocumentType::Undefined => "",
            DocumentType::Ingreso => "I",
            DocumentType::Egreso => "E",
            DocumentType::Traslado => "T",
            DocumentType::Nomina => "N",
            DocumentType::Pago => "P",
        }
    }
}

/// CFDI status filter (`EstadoComprobante`). `Undefined` means no filter.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum DocumentStatus {
    #[default]
    #[serde(rename = "")]
    Undefined,
    #[serde(rename = "Vigente")]
    Active,
    #[serde(rename = "Cancelado")]
    Cancelled,
}

impl DocumentStatus {
    pub fn value(&self) -> &'static str {
        match self {
            DocumentStatus::Undefined => "",
            DocumentStatus::Active => "Vigente",
            DocumentStatus::Cancelled => "Cancelado",
        }
    }
}

/// A download request over a range of days.
///
/// `start` covers its day from `00:00:00` and `end` up to `23:59:59`.
/// String filters left empty are not sent.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DateRangeQuery {
    pub start: NaiveDate,
    pub end: NaiveDate,
    pub issuer_rfc: String,
    pub receiver_rfcs: Vec<String>,
    pub document_type: DocumentType,
    pub document_status: DocumentStatus,
    pub on_behalf_rfc: String,
    pub complement: String,
    pub request_type: RequestType,
}

impl DateRangeQuery {
    /// A query without any RFC or document filter.
    pub fn new(start: NaiveDate, end: NaiveDate) -> Self {
        Self {
            start,
            end,
            issuer_rfc: String::new(),
            receiver_rfcs: Vec::new(),
            document_type: DocumentType::default(),
            document_status: DocumentStatus::default(),
            on_behalf_rfc: String::new(),
            complement: String::new(),
            request_type: RequestType::default(),
        }
    }

    /// Documents issued by `signer_rfc`, optionally to the given receivers.
    pub fn issued(
        start: NaiveDate,
        end: NaiveDate,
        signer_rfc: &str,
        receiver_rfcs: Vec<String>,
    ) -> Self {
        Self {
            issuer_rfc: signer_rfc.to_uppercase(),
            receiver_rfcs,
            ..Self::new(start, end)
        }
    }

    /// Documents received from the first RFC of `rfcs`.
    pub fn received(start: NaiveDate, end: NaiveDate, rfcs: Vec<String>) -> Self {
        Self {
            issuer_rfc: rfcs.first().cloned().unwrap_or_default(),
            receiver_rfcs: rfcs,
            ..Self::new(start, end)
        }
    }

    pub fn with_document_type(mut self, document_type: DocumentType) -> Self {
        self.document_type = document_type;
        self
    }

    pub fn with_document_status(mut self, document_status: DocumentStatus) -> Self {
        self.document_status = document_status;
        self
    }

    pub fn with_on_behalf_rfc(mut self, rfc: impl Into<String>) -> Self {
        self.on_behalf_rfc = rfc.into();
        self
    }

    pub fn with_complement(mut self, complement: impl Into<String>) -> Self {
        self.complement = complement.into();
        self
    }

    pub fn with_request_type(mut self, request_type: RequestType) -> Self {
        self.request_type = request_type;
        self
    }

    /// `FechaInicial` value, e.g. `2024-01-01T00:00:00`.
    pub fn start_value(&self) -> String {
        self.start.format("%Y-%m-%dT00:00:00").to_string()
    }

    /// `FechaFinal` value, e.g. `2024-01-31T23:59:59`.
    pub fn end_value(&self) -> String {
        self.end.format("%Y-%m-%dT23:59:59").to_string()
    }
}

/// Parameters of a download request: one folio or a date range.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum QueryParameters {
    Folio(String),
    DateRange(DateRangeQuery),
}

impl QueryParameters {
    pub fn folio(uuid: impl Into<String>) -> Self {
        QueryParameters::Folio(uuid.into())
    }

    pub fn request_type(&self) -> RequestType {
        match self {
            QueryParameters::Folio(_) => RequestType::Cfdi,
            QueryParameters::DateRange(query) => query.request_type,
        }
    }
}

impl From<DateRangeQuery> for QueryParameters {
    fn from(query: DateRangeQuery) -> Self {
        QueryParameters::DateRange(query)
    }
}

// =============================================================================
// Results
// =============================================================================

/// Outcome of submitting a download request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct QueryResult {
    pub status: StatusCode,
    /// Identifier to poll with; empty when the request was rejected.
    pub request_id: String,
}

/// Outcome of polling a download request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct VerifyResult {
    pub status: StatusCode,
    pub request_status: RequestStatus,
    pub package_acceptance: PackageAcceptance,
    pub cfdi_count: u32,
    pub package_ids: Vec<String>,
}

impl VerifyResult {
    /// Whether the packages are ready for download.
    pub fn is_finished(&self) -> bool {
        self.request_status == RequestStatus::Finished
    }
}

/// A downloaded package, still base64 encoded.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DownloadResult {
    pub status: StatusCode,
    pub package_base64: String,
}

impl DownloadResult {
    /// Decode the package into the bytes of its ZIP archive.
    pub fn package_bytes(&self) -> Result<Vec<u8>> {
        let compact: String = self
            .package_base64
            .chars()
            .filter(|c| !c.is_ascii_whitespace())
            .collect();
        Base64::decode_vec(&compact).map_err(|e| DescargaError::InvalidField {
            field: "Paquete".to_string(),
            value: e.to_string(),
        })
    }
}
