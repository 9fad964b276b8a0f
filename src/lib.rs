// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Descarga Masiva - SAT mass CFDI download client
//!
//! This crate talks to the SAT "descarga masiva" SOAP services: it
//! authenticates with a FIEL credential, submits download requests, polls
//! their status, and retrieves the resulting packages.
//!
//! ## Modules
//!
//! - `xml` - Deterministic XML building, canonicalization, response lookup
//! - `signing` - Credential capability, XML-DSig signatures, WS-Security
//! - `envelope` - SOAP envelopes for the four operations
//! - `decode` - Response decoding into typed results
//! - `transport` - HTTP transport seam (reqwest)
//! - `client` - Operation sequencing and token policy
//!
//! ## Example
//!
//! ```rust,ignore
//! let credential = FielCredential::open_files("fiel.cer", "fiel.key", "password")?;
//! let client = ClientConfig::default().build_client()?;
//! let result = client.query(&credential, &QueryParameters::folio(uuid)).await?;
//! ```

pub mod client;
pub mod config;
pub mod decode;
pub mod endpoints;
pub mod envelope;
pub mod error;
pub mod models;
pub mod signing;
pub mod transport;
pub mod xml;

pub use client::{DescargaClient, NoTokenCache, TokenPolicy};
pub use endpoints::{ServiceEndpoints, ServiceType};
pub use error::{DescargaError, Result};
pub use models::{
    DateRangeQuery, DocumentStatus, DocumentType, DownloadResult, PackageAcceptance,
    QueryParameters, QueryResult, RequestStatus, RequestType, StatusCode, Token, VerifyResult,
};
pub use signing::{Credential, FielCredential, SignatureAlgorithm};
pub use transport::{ReqwestTransport, Transport};
