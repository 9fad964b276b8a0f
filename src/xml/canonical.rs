// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Whitespace canonicalization and escaping applied before digesting.
//!
//! The SAT services verify an exclusive-C14N rendering of the signed fragment.
//! Every fragment this crate signs is produced without insignificant
//! whitespace, so stripping indentation and line breaks yields the same bytes
//! the remote canonicalizer computes.

/// Remove indentation and line breaks from an XML text.
///
/// - leading whitespace of every line is removed,
/// - trailing whitespace and the line break itself are removed,
/// - an XML declaration (`?>`) is forced onto its own line.
///
/// Applying the transform twice yields the same output as applying it once.
pub fn strip_whitespace(xml: &str) -> String {
    let mut out = String::with_capacity(xml.len());
    let mut lines = xml.split('\n').peekable();
    while let Some(line) = lines.next() {
        let line = line.trim_start();
        if lines.peek().is_some() {
            out.push_str(line.trim_end());
        } else {
            out.push_str(line);
        }
    }
    out.replace("?><", "?>\n<")
}

/// Escape a value for embedding in XML text or a double-quoted attribute.
pub fn escape_xml_text(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for ch in s.chars() {
        match ch {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#039;"),
            _ => out.push(ch),
        }
    }
    out
}

/// Reduce a PEM document to its bare base64 body.
///
/// Header and footer lines (`-----BEGIN ...-----`) are dropped and the
/// remaining lines are trimmed and joined.
pub fn strip_pem_framing(pem: &str) -> String {
    pem.lines()
        .filter(|line| !line.starts_with("-----"))
        .map(str::trim)
        .collect()
}
