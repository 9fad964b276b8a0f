// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Request signing: the credential capability, XML-DSig signature blocks,
//! and the WS-Security header of the authentication request.

pub mod credential;
pub mod security;
pub mod signature;

pub use credential::{Credential, FielCredential, SignatureAlgorithm};
pub use security::{build_security_header, create_security_token_id, format_timestamp};
pub use signature::{digest_value, sign_fragment, x509_key_info};
