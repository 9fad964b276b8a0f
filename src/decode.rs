// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Decoding of SAT SOAP responses into typed results.
//!
//! Lookups ignore namespace prefixes and letter case. A status the service
//! reports is returned as data; only responses that cannot be interpreted
//! (missing status, non-numeric codes, codes outside the known tables) are
//! errors.

use std::collections::HashMap;

use chrono::{DateTime, Utc};

use crate::error::{DescargaError, Result};
use crate::models::{
    DownloadResult, PackageAcceptance, QueryResult, RequestStatus, StatusCode, Token,
    VerifyResult,
};
use crate::xml::{find_attributes, find_content, find_contents, read_xml_document};

/// Decode the authentication response into a [`Token`].
///
/// A missing `Created` defaults to now and a missing `Expires` to `Created`,
/// which yields an already expired token.
pub fn decode_token(body: &str) -> Result<Token> {
    let document = read_xml_document(body)?;
    let envelope = document.root_element();

    let created = find_content(envelope, &["header", "security", "timestamp", "created"]);
    let expires = find_content(envelope, &["header", "security", "timestamp", "expires"]);
    let value = find_content(envelope, &["body", "autenticaResponse", "autenticaResult"]);

    let created = match parse_instant("Created", &created)? {
        Some(created) => created,
        None => Utc::now(),
    };
    let expires = parse_instant("Expires", &expires)?.unwrap_or(created);

    Token::new(created, expires, value)
}

/// Decode the `SolicitaDescarga` response.
pub fn decode_query(body: &str) -> Result<QueryResult> {
    let document = read_xml_document(body)?;
    let values = find_attributes(
        document.root_element(),
        &["body", "solicitaDescargaResponse", "solicitaDescargaResult"],
    );

    Ok(QueryResult {
        status: status_code(&values)?,
        request_id: values.get("idsolicitud").cloned().unwrap_or_default(),
    })
}

/// Decode the `VerificaSolicitudDescarga` response.
pub fn decode_verify(body: &str) -> Result<VerifyResult> {
    let document = read_xml_document(body)?;
    let path = [
        "body",
        "VerificaSolicitudDescargaResponse",
        "VerificaSolicitudDescargaResult",
    ];
    let values = find_attributes(document.root_element(), &path);

    let status = status_code(&values)?;

    let request_status_code = optional_number(&values, "estadosolicitud", "EstadoSolicitud")?;
    let request_status =
        RequestStatus::from_code(request_status_code).ok_or_else(|| DescargaError::UnknownCode {
            field: "EstadoSolicitud".to_string(),
            code: request_status_code.to_string(),
        })?;

    let acceptance_code =
        optional_number(&values, "codigoestadosolicitud", "CodigoEstadoSolicitud")?;
    let package_acceptance =
        PackageAcceptance::from_code(acceptance_code).ok_or_else(|| DescargaError::UnknownCode {
            field: "CodigoEstadoSolicitud".to_string(),
            code: acceptance_code.to_string(),
        })?;

    let cfdi_count = match values.get("numerocfdis").map(|v| v.trim()) {
        None | Some("") => 0,
        Some(raw) => raw.parse::<u32>().map_err(|_| DescargaError::InvalidField {
            field: "NumeroCFDIs".to_string(),
            value: raw.to_string(),
        })?,
    };

    let mut ids_path = path.to_vec();
    ids_path.push("IdsPaquetes");
    let package_ids = find_contents(document.root_element(), &ids_path);

    Ok(VerifyResult {
        status,
        request_status,
        package_acceptance,
        cfdi_count,
        package_ids,
    })
}

/// Decode the `Descargar` response. The status travels in the SOAP header.
pub fn decode_download(body: &str) -> Result<DownloadResult> {
    let document = read_xml_document(body)?;
    let envelope = document.root_element();
    let values = find_attributes(envelope, &["header", "respuesta"]);

    Ok(DownloadResult {
        status: status_code(&values)?,
        package_base64: find_content(
            envelope,
            &["body", "RespuestaDescargaMasivaTercerosSalida", "Paquete"],
        ),
    })
}

fn status_code(values: &HashMap<String, String>) -> Result<StatusCode> {
    let raw = values
        .get("codestado")
        .ok_or_else(|| DescargaError::MissingField("CodEstado".to_string()))?;
    let code = parse_number("CodEstado", raw)?;
    Ok(StatusCode::new(
        code,
        values.get("mensaje").cloned().unwrap_or_default(),
    ))
}

// Absent status codes read as 0, which maps to `Unknown` or to an unknown
// acceptance code.
fn optional_number(values: &HashMap<String, String>, key: &str, field: &str) -> Result<i32> {
    match values.get(key).map(|v| v.trim()) {
        None | Some("") => Ok(0),
        Some(raw) => parse_number(field, raw),
    }
}

fn parse_number(field: &str, raw: &str) -> Result<i32> {
    raw.trim().parse().map_err(|_| DescargaError::InvalidField {
        field: field.to_string(),
        value: raw.to_string(),
    })
}

fn parse_instant(field: &str, raw: &str) -> Result<Option<DateTime<Utc>>> {
    let raw = raw.trim();
    if raw.is_empty() {
        return Ok(None);
    }
    DateTime::parse_from_rfc3339(raw)
        .map(|instant| Some(instant.with_timezone(&Utc)))
        .map_err(|_| DescargaError::InvalidField {
            field: field.to_string(),
            value: raw.to_string(),
        })
}
