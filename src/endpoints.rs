// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! SAT web service locations.
//!
//! Use [`ServiceEndpoints::cfdi`] for regular CFDI and
//! [`ServiceEndpoints::retenciones`] for withholding and payment CFDI.

use std::{fmt, str::FromStr};

use serde::{Deserialize, Serialize};
use url::Url;

use crate::error::{DescargaError, Result};

/// Which family of documents a set of endpoints serves.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ServiceType {
    Cfdi,
    Retenciones,
}

impl ServiceType {
    pub fn as_str(&self) -> &'static str {
        match self {
            ServiceType::Cfdi => "cfdi",
            ServiceType::Retenciones => "retenciones",
        }
    }
}

impl fmt::Display for ServiceType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ServiceType {
    type Err = DescargaError;

    fn from_str(value: &str) -> Result<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "cfdi" => Ok(ServiceType::Cfdi),
            "retenciones" => Ok(ServiceType::Retenciones),
            other => Err(DescargaError::InvalidEndpoint(format!(
                "unknown service type: {other}"
            ))),
        }
    }
}

/// The four operation URLs of one SAT service.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServiceEndpoints {
    authenticate: String,
    query: String,
    verify: String,
    download: String,
    service_type: ServiceType,
}

impl ServiceEndpoints {
    /// Endpoints for regular CFDI.
    pub fn cfdi() -> Self {
        Self {
            authenticate:
                "https://cfdidescargamasivasolicitud.clouda.sat.gob.mx/Autenticacion/Autenticacion.svc"
                    .to_string(),
            query: "https://cfdidescargamasivasolicitud.clouda.sat.gob.mx/SolicitaDescargaService.svc"
                .to_string(),
            verify:
                "https://cfdidescargamasivasolicitud.clouda.sat.gob.mx/VerificaSolicitudDescargaService.svc"
                    .to_string(),
            download: "https://cfdidescargamasiva.clouda.sat.gob.mx/DescargaMasivaService.svc"
                .to_string(),
            service_type: ServiceType::Cfdi,
        }
    }

    /// Endpoints for withholding ("retenciones") CFDI.
    pub fn retenciones() -> Self {
        Self {
            authenticate:
                "https://retendescargamasivasolicitud.clouda.sat.gob.mx/Autenticacion/Autenticacion.svc"
                    .to_string(),
            query:
                "https://retendescargamasivasolicitud.clouda.sat.gob.mx/SolicitaDescargaService.svc"
                    .to_string(),
            verify:
                "https://retendescargamasivasolicitud.clouda.sat.gob.mx/VerificaSolicitudDescargaService.svc"
                    .to_string(),
            download: "https://retendescargamasiva.clouda.sat.gob.mx/DescargaMasivaService.svc"
                .to_string(),
            service_type: ServiceType::Retenciones,
        }
    }

    pub fn for_service_type(service_type: ServiceType) -> Self {
        match service_type {
            ServiceType::Cfdi => Self::cfdi(),
            ServiceType::Retenciones => Self::retenciones(),
        }
    }

    /// Endpoints at other locations, e.g. a staging host. Each URL must parse.
    pub fn custom(
        authenticate: &str,
        query: &str,
        verify: &str,
        download: &str,
        service_type: ServiceType,
    ) -> Result<Self> {
        Ok(Self {
            authenticate: validate_url(authenticate)?,
            query: validate_url(query)?,
            verify: validate_url(verify)?,
            download: validate_url(download)?,
            service_type,
        })
    }

    pub fn authenticate(&self) -> &str {
        &self.authenticate
    }

    pub fn query(&self) -> &str {
        &self.query
    }

    pub fn verify(&self) -> &str {
        &self.verify
    }

    pub fn download(&self) -> &str {
        &self.download
    }

    pub fn service_type(&self) -> ServiceType {
        self.service_type
    }
}

fn validate_url(value: &str) -> Result<String> {
    Url::parse(value)
        .map(|url| url.to_string())
        .map_err(|e| DescargaError::InvalidEndpoint(format!("{value}: {e}")))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn canonical_instances_point_at_their_hosts() {
        let cfdi = ServiceEndpoints::cfdi();
        assert_eq!(cfdi.service_type(), ServiceType::Cfdi);
        assert!(cfdi.authenticate().starts_with("https://cfdidescargamasivasolicitud."));
        assert!(cfdi.download().starts_with("https://cfdidescargamasiva."));

        let retenciones = ServiceEndpoints::retenciones();
        assert_eq!(retenciones.service_type(), ServiceType::Retenciones);
        assert!(retenciones.query().starts_with("https://retendescargamasivasolicitud."));
        assert!(retenciones
            .verify()
            .ends_with("/VerificaSolicitudDescargaService.svc"));
    }

    #[test]
    fn for_service_type_selects_the_canonical_instance() {
        assert_eq!(
            ServiceEndpoints::for_service_type(ServiceType::Retenciones),
            ServiceEndpoints::retenciones()
        );
    }

    #[test]
    fn custom_rejects_malformed_urls() {
        let result = ServiceEndpoints::custom(
            "not a url",
            "http://localhost/q",
            "http://localhost/v",
            "http://localhost/d",
            ServiceType::Cfdi,
        );
        assert!(matches!(result, Err(DescargaError::InvalidEndpoint(_))));
    }

    #[test]
    fn service_type_parses_case_insensitively() {
        assert_eq!("CFDI".parse::<ServiceType>().unwrap(), ServiceType::Cfdi);
        assert_eq!(
            " retenciones ".parse::<ServiceType>().unwrap(),
            ServiceType::Retenciones
        );
        assert!("nomina".parse::<ServiceType>().is_err());
    }
}
