// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! WS-Security header used by the authentication request.
//!
//! The header carries a `<u:Timestamp>` signed with the credential and a
//! `<o:BinarySecurityToken>` holding the certificate. The signature's
//! `<KeyInfo>` points at the token through a `SecurityTokenReference`.

use chrono::{DateTime, SecondsFormat, Utc};
use sha1::{Digest, Sha1};
use uuid::Uuid;

use super::{credential::Credential, signature::sign_fragment};
use crate::error::{DescargaError, Result};
use crate::xml::{algorithm, ns, strip_pem_framing, XmlElement};

/// `Id` of the timestamp and the reference URI that signs it.
pub const TIMESTAMP_ID: &str = "_0";

/// Generate a token id of the form `uuid-xxxxxxxx-xxxx-xxxx-xxxx-xxxxxxxxxxxx-1`.
pub fn create_security_token_id() -> String {
    let hash: String = Sha1::digest(Uuid::new_v4().as_bytes())
        .iter()
        .map(|byte| format!("{byte:02x}"))
        .collect();
    format!(
        "uuid-{}-{}-{}-{}-{}-1",
        &hash[0..8],
        &hash[8..12],
        &hash[12..16],
        &hash[16..20],
        &hash[20..32]
    )
}

/// ISO-8601 UTC with millisecond precision, e.g. `2024-01-01T00:00:00.000Z`.
pub fn format_timestamp(instant: &DateTime<Utc>) -> String {
    instant.to_rfc3339_opts(SecondsFormat::Millis, true)
}

// The signed copy declares the wsu prefix itself; inside the envelope it is
// inherited from <s:Envelope>.
fn timestamp(created: &str, expires: &str, declare_namespace: bool) -> XmlElement {
    let element = XmlElement::new("u:Timestamp");
    let element = if declare_namespace {
        element.attr("xmlns:u", ns::WSU)
    } else {
        element
    };
    element
        .attr("u:Id", TIMESTAMP_ID)
        .child(XmlElement::new("u:Created").text(created))
        .child(XmlElement::new("u:Expires").text(expires))
}

fn token_reference_key_info(security_token_id: &str) -> XmlElement {
    XmlElement::new("KeyInfo").child(
        XmlElement::new("o:SecurityTokenReference").child(
            XmlElement::new("o:Reference")
                .attr("URI", format!("#{security_token_id}"))
                .attr("ValueType", algorithm::X509V3)
                .self_closing(),
        ),
    )
}

/// Build the `<o:Security>` header for a validity window.
///
/// `expires` must be later than `created`. A random token id is generated
/// when `security_token_id` is `None`.
pub fn build_security_header<C: Credential + ?Sized>(
    created: DateTime<Utc>,
    expires: DateTime<Utc>,
    security_token_id: Option<&str>,
    credential: &C,
) -> Result<XmlElement> {
    if expires <= created {
        return Err(DescargaError::InvalidTokenWindow {
            created: format_timestamp(&created),
            expires: format_timestamp(&expires),
        });
    }

    let token_id = security_token_id
        .map(str::to_string)
        .unwrap_or_else(create_security_token_id);
    let created = format_timestamp(&created);
    let expires = format_timestamp(&expires);

    let signature = sign_fragment(
        &timestamp(&created, &expires, true).to_xml(),
        &format!("#{TIMESTAMP_ID}"),
        Some(token_reference_key_info(&token_id)),
        credential,
    )?;

    Ok(XmlElement::new("o:Security")
        .attr("xmlns:o", ns::WSSE)
        .attr("s:mustUnderstand", "1")
        .child(timestamp(&created, &expires, false))
        .child(
            XmlElement::new("o:BinarySecurityToken")
                .attr("u:Id", token_id)
                .attr("ValueType", algorithm::X509V3)
                .attr("EncodingType", algorithm::BASE64_BINARY)
                .text(strip_pem_framing(&credential.certificate_pem())),
        )
        .child(signature))
}
