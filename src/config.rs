// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! # Runtime Configuration
//!
//! Environment variable names, defaults, and the loaders that turn them into
//! a ready [`DescargaClient`] and a [`FielCredential`].
//!
//! ## Environment Variables
//!
//! | Variable | Description | Default |
//! |----------|-------------|---------|
//! | `SAT_SERVICE_TYPE` | Service family (`cfdi` or `retenciones`) | `cfdi` |
//! | `SAT_HTTP_TIMEOUT_SECS` | Timeout of each HTTP request | `60` |
//! | `SAT_TOKEN_VALIDITY_SECS` | Validity window requested on authentication | `300` |
//! | `SAT_CERTIFICATE_PATH` | FIEL certificate (`.cer` DER or PEM) | Required by the binary |
//! | `SAT_PRIVATE_KEY_PATH` | FIEL private key (`.key` DER or PEM) | Required by the binary |
//! | `SAT_PRIVATE_KEY_PASSWORD` | Password of the private key | empty |
//! | `LOG_FORMAT` | Logging format (`json` or `pretty`) | `pretty` |
//! | `RUST_LOG` | Log level filter | `info,descarga_masiva=debug` |

use std::time::Duration;

use tracing::warn;

use crate::client::DescargaClient;
use crate::endpoints::{ServiceEndpoints, ServiceType};
use crate::error::{DescargaError, Result};
use crate::signing::FielCredential;
use crate::transport::ReqwestTransport;

pub const SERVICE_TYPE_ENV: &str = "SAT_SERVICE_TYPE";
pub const HTTP_TIMEOUT_ENV: &str = "SAT_HTTP_TIMEOUT_SECS";
pub const TOKEN_VALIDITY_ENV: &str = "SAT_TOKEN_VALIDITY_SECS";
pub const CERTIFICATE_PATH_ENV: &str = "SAT_CERTIFICATE_PATH";
pub const PRIVATE_KEY_PATH_ENV: &str = "SAT_PRIVATE_KEY_PATH";
pub const PRIVATE_KEY_PASSWORD_ENV: &str = "SAT_PRIVATE_KEY_PASSWORD";
pub const LOG_FORMAT_ENV: &str = "LOG_FORMAT";

pub const DEFAULT_HTTP_TIMEOUT_SECS: u64 = 60;
pub const DEFAULT_TOKEN_VALIDITY_SECS: u64 = 300;
pub const DEFAULT_LOG_FILTER: &str = "info,descarga_masiva=debug";

/// Settings of the HTTP client and the authentication window.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientConfig {
    pub service_type: ServiceType,
    pub http_timeout: Duration,
    pub token_validity: Duration,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            service_type: ServiceType::Cfdi,
            http_timeout: Duration::from_secs(DEFAULT_HTTP_TIMEOUT_SECS),
            token_validity: Duration::from_secs(DEFAULT_TOKEN_VALIDITY_SECS),
        }
    }
}

impl ClientConfig {
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Load from an arbitrary variable source. Unparseable durations fall back
    /// to their defaults; an unknown service type is an error.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let service_type = env_or_default(&lookup, SERVICE_TYPE_ENV, ServiceType::Cfdi.as_str())
            .parse::<ServiceType>()?;

        Ok(Self {
            service_type,
            http_timeout: Duration::from_secs(env_secs(
                &lookup,
                HTTP_TIMEOUT_ENV,
                DEFAULT_HTTP_TIMEOUT_SECS,
            )),
            token_validity: Duration::from_secs(env_secs(
                &lookup,
                TOKEN_VALIDITY_ENV,
                DEFAULT_TOKEN_VALIDITY_SECS,
            )),
        })
    }

    pub fn endpoints(&self) -> ServiceEndpoints {
        ServiceEndpoints::for_service_type(self.service_type)
    }

    /// Build a client over a `reqwest` transport.
    pub fn build_client(&self) -> Result<DescargaClient<ReqwestTransport>> {
        let transport = ReqwestTransport::new(self.http_timeout)?;
        Ok(DescargaClient::new(transport, self.endpoints()).with_token_validity(self.token_validity))
    }
}

/// Locations of the FIEL files and the key password.
#[derive(Clone)]
pub struct CredentialConfig {
    pub certificate_path: String,
    pub private_key_path: String,
    pub password: String,
}

impl std::fmt::Debug for CredentialConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CredentialConfig")
            .field("certificate_path", &self.certificate_path)
            .field("private_key_path", &self.private_key_path)
            .field("password", &"<redacted>")
            .finish()
    }
}

impl CredentialConfig {
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        Ok(Self {
            certificate_path: env_required(&lookup, CERTIFICATE_PATH_ENV)?,
            private_key_path: env_required(&lookup, PRIVATE_KEY_PATH_ENV)?,
            // Passwords are taken verbatim.
            password: lookup(PRIVATE_KEY_PASSWORD_ENV).unwrap_or_default(),
        })
    }

    pub fn open(&self) -> Result<FielCredential> {
        FielCredential::open_files(
            &self.certificate_path,
            &self.private_key_path,
            &self.password,
        )
    }
}

fn env_optional(lookup: &impl Fn(&str) -> Option<String>, name: &str) -> Option<String> {
    lookup(name)
        .map(|value| value.trim().to_string())
        .filter(|value| !value.is_empty())
}

fn env_required(lookup: &impl Fn(&str) -> Option<String>, name: &str) -> Result<String> {
    env_optional(lookup, name)
        .ok_or_else(|| DescargaError::Credential(format!("{name} is not set")))
}

fn env_or_default(lookup: &impl Fn(&str) -> Option<String>, name: &str, default: &str) -> String {
    env_optional(lookup, name).unwrap_or_else(|| default.to_string())
}

fn env_secs(lookup: &impl Fn(&str) -> Option<String>, name: &str, default: u64) -> u64 {
    match env_optional(lookup, name) {
        None => default,
        Some(raw) => match raw.parse::<u64>() {
            Ok(secs) if secs > 0 => secs,
            _ => {
                warn!(variable = %name, value = %raw, default, "Ignoring invalid duration");
                default
            }
        },
    }
}
