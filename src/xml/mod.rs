// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! XML building, canonicalization, and response lookup.

pub mod canonical;
pub mod node;
pub mod reader;

pub use canonical::{escape_xml_text, strip_pem_framing, strip_whitespace};
pub use node::{XmlElement, XmlNode};
pub use reader::{find_attributes, find_content, find_contents, find_element, read_xml_document};

/// Namespace URIs that appear in signed fragments. These are bit-exact.
pub mod ns {
    pub const SOAP_ENVELOPE: &str = "http://schemas.xmlsoap.org/soap/envelope/";
    pub const WSU: &str =
        "http://docs.oasis-open.org/wss/2004/01/oasis-200401-wss-wssecurity-utility-1.0.xsd";
    pub const WSSE: &str =
        "http://docs.oasis-open.org/wss/2004/01/oasis-200401-wss-wssecurity-secext-1.0.xsd";
    pub const DSIG: &str = "http://www.w3.org/2000/09/xmldsig#";
    pub const DESCARGA: &str = "http://DescargaMasivaTerceros.sat.gob.mx";
    pub const AUTENTICACION: &str = "http://DescargaMasivaTerceros.gob.mx";
}

/// Algorithm identifiers referenced from `<SignedInfo>` and WS-Security tokens.
pub mod algorithm {
    pub const EXC_C14N: &str = "http://www.w3.org/2001/10/xml-exc-c14n#";
    pub const RSA_SHA1: &str = "http://www.w3.org/2000/09/xmldsig#rsa-sha1";
    pub const SHA1: &str = "http://www.w3.org/2000/09/xmldsig#sha1";
    pub const X509V3: &str =
        "http://docs.oasis-open.org/wss/2004/01/oasis-200401-wss-x509-token-profile-1.0#X509v3";
    pub const BASE64_BINARY: &str =
        "http://docs.oasis-open.org/wss/2004/01/oasis-200401-wss-soap-message-security-1.0#Base64Binary";
}
