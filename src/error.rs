// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Error type shared by every layer of the client.
//!
//! Variants are grouped by where the failure originates: construction of
//! values, the signing primitive, the transport, and decoding of the remote
//! service's responses. Business rejections reported by the service (status
//! codes inside a well-formed response) are never errors; they are carried in
//! the typed results.

/// Errors produced while building, sending, or decoding SAT requests.
#[derive(Debug, thiserror::Error)]
pub enum DescargaError {
    #[error("token expiration {expires} precedes its creation {created}")]
    InvalidTokenWindow { created: String, expires: String },

    #[error("cannot load an empty XML document")]
    EmptyXml,

    #[error("XML parsing error: {0}")]
    XmlParse(String),

    #[error("invalid service endpoint: {0}")]
    InvalidEndpoint(String),

    #[error("credential error: {0}")]
    Credential(String),

    #[error("signing failed: {0}")]
    Signing(String),

    #[error("request to {uri} ({soap_action}) failed: {message}")]
    Transport {
        uri: String,
        soap_action: String,
        status: Option<u16>,
        message: String,
    },

    #[error("request to {uri} ({soap_action}) timed out")]
    Timeout { uri: String, soap_action: String },

    #[error("response is missing {0}")]
    MissingField(String),

    #[error("response field {field} has an invalid value: {value}")]
    InvalidField { field: String, value: String },

    #[error("response field {field} has an unknown code: {code}")]
    UnknownCode { field: String, code: String },

    #[error("authentication did not produce a usable token")]
    InvalidToken,

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl DescargaError {
    /// Stable machine-readable code for this error.
    pub fn kind(&self) -> &'static str {
        match self {
            DescargaError::InvalidTokenWindow { .. } => "invalid_token_window",
            DescargaError::EmptyXml => "empty_xml",
            DescargaError::XmlParse(_) => "xml_parse",
            DescargaError::InvalidEndpoint(_) => "invalid_endpoint",
            DescargaError::Credential(_) => "credential",
            DescargaError::Signing(_) => "signing",
            DescargaError::Transport { .. } => "transport",
            DescargaError::Timeout { .. } => "timeout",
            DescargaError::MissingField(_) => "missing_field",
            DescargaError::InvalidField { .. } => "invalid_field",
            DescargaError::UnknownCode { .. } => "unknown_code",
            DescargaError::InvalidToken => "invalid_token",
            DescargaError::Io(_) => "io",
        }
    }

    /// Whether the failure happened while talking to the remote service.
    pub fn is_transport(&self) -> bool {
        matches!(
            self,
            DescargaError::Transport { .. } | DescargaError::Timeout { .. }
        )
    }

    /// Whether the remote service answered but the answer could not be decoded.
    pub fn is_decode(&self) -> bool {
        matches!(
            self,
            DescargaError::EmptyXml
                | DescargaError::XmlParse(_)
                | DescargaError::MissingField(_)
                | DescargaError::InvalidField { .. }
                | DescargaError::UnknownCode { .. }
        )
    }
}

pub type Result<T> = std::result::Result<T, DescargaError>;
