// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! XML-DSig `<Signature>` construction over a single fragment.
//!
//! The fragment is canonicalized and digested with SHA-1, the digest goes into
//! a `<SignedInfo>` with one `<Reference>`, and the canonical `<SignedInfo>`
//! (still carrying its own `xmlns`) is signed with RSA-SHA1. The embedded copy
//! drops that declaration because the enclosing `<Signature>` carries it.

use base64ct::{Base64, Encoding};
use sha1::{Digest, Sha1};
use tracing::debug;

use super::credential::{Credential, SignatureAlgorithm};
use crate::error::Result;
use crate::xml::{algorithm, ns, strip_pem_framing, strip_whitespace, XmlElement};

/// Base64 SHA-1 digest of the canonical form of `fragment_xml`.
pub fn digest_value(fragment_xml: &str) -> String {
    let canonical = strip_whitespace(fragment_xml);
    Base64::encode_string(&Sha1::digest(canonical.as_bytes()))
}

/// Build the `<SignedInfo>` element for a digest, with its namespace declared.
pub fn signed_info(digest: &str, reference_uri: &str) -> XmlElement {
    XmlElement::new("SignedInfo")
        .attr("xmlns", ns::DSIG)
        .child(XmlElement::new("CanonicalizationMethod").attr("Algorithm", algorithm::EXC_C14N))
        .child(XmlElement::new("SignatureMethod").attr("Algorithm", algorithm::RSA_SHA1))
        .child(
            XmlElement::new("Reference")
                .attr("URI", reference_uri)
                .child(
                    XmlElement::new("Transforms").child(
                        XmlElement::new("Transform").attr("Algorithm", algorithm::EXC_C14N),
                    ),
                )
                .child(XmlElement::new("DigestMethod").attr("Algorithm", algorithm::SHA1))
                .child(XmlElement::new("DigestValue").text(digest)),
        )
}

/// `<KeyInfo>` identifying the signer by issuer, serial, and certificate.
pub fn x509_key_info<C: Credential + ?Sized>(credential: &C) -> XmlElement {
    XmlElement::new("KeyInfo").child(
        XmlElement::new("X509Data")
            .child(
                XmlElement::new("X509IssuerSerial")
                    .child(
                        XmlElement::new("X509IssuerName")
                            .text(credential.certificate_issuer_rfc4514()),
                    )
                    .child(
                        XmlElement::new("X509SerialNumber")
                            .text(credential.certificate_serial_decimal()),
                    ),
            )
            .child(
                XmlElement::new("X509Certificate")
                    .text(strip_pem_framing(&credential.certificate_pem())),
            ),
    )
}

/// Sign `fragment_xml` and return the `<Signature>` element.
///
/// When `key_info` is `None` the default X.509 `<KeyInfo>` is used.
pub fn sign_fragment<C: Credential + ?Sized>(
    fragment_xml: &str,
    reference_uri: &str,
    key_info: Option<XmlElement>,
    credential: &C,
) -> Result<XmlElement> {
    let digest = digest_value(fragment_xml);
    let mut signed_info = signed_info(&digest, reference_uri);

    let canonical_signed_info = strip_whitespace(&signed_info.to_xml());
    let signature = credential.sign(canonical_signed_info.as_bytes(), SignatureAlgorithm::Sha1)?;
    let signature_value = Base64::encode_string(&signature);

    debug!(reference_uri = %reference_uri, digest = %digest, "Signed XML fragment");

    signed_info.remove_attr("xmlns");
    let key_info = key_info.unwrap_or_else(|| x509_key_info(credential));

    Ok(XmlElement::new("Signature")
        .attr("xmlns", ns::DSIG)
        .child(signed_info)
        .child(XmlElement::new("SignatureValue").text(signature_value))
        .child(key_info))
}
