// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Path lookups over SOAP responses.
//!
//! Paths are sequences of local element names matched case-insensitively
//! against direct children; namespace prefixes are ignored. A path that does
//! not resolve yields an empty value rather than an error, so callers decide
//! which fields are mandatory.

use std::collections::HashMap;

use roxmltree::{Document, Node};

use crate::error::{DescargaError, Result};

/// Parse a response body. Empty input is rejected before parsing.
pub fn read_xml_document(source: &str) -> Result<Document<'_>> {
    if source.is_empty() {
        return Err(DescargaError::EmptyXml);
    }
    Document::parse(source).map_err(|e| DescargaError::XmlParse(e.to_string()))
}

/// Resolve `path` below `element`. An empty path resolves to `element` itself.
pub fn find_element<'a, 'input>(
    element: Node<'a, 'input>,
    path: &[&str],
) -> Option<Node<'a, 'input>> {
    let mut current = element;
    for name in path {
        current = current
            .children()
            .find(|child| matches_local_name(*child, name))?;
    }
    Some(current)
}

/// Text content of the element at `path`, or `""` when it does not exist.
pub fn find_content(element: Node<'_, '_>, path: &[&str]) -> String {
    find_element(element, path)
        .map(element_content)
        .unwrap_or_default()
}

/// Text content of every child named like the last segment of `path`, under
/// the element named by the preceding segments, in document order.
pub fn find_contents(element: Node<'_, '_>, path: &[&str]) -> Vec<String> {
    let Some((last, parent_path)) = path.split_last() else {
        return Vec::new();
    };
    let Some(parent) = find_element(element, parent_path) else {
        return Vec::new();
    };
    parent
        .children()
        .filter(|child| matches_local_name(*child, last))
        .map(element_content)
        .collect()
}

/// Attributes of the element at `path`, keyed by lower-cased local name.
pub fn find_attributes(element: Node<'_, '_>, path: &[&str]) -> HashMap<String, String> {
    let Some(found) = find_element(element, path) else {
        return HashMap::new();
    };
    found
        .attributes()
        .map(|attr| (attr.name().to_ascii_lowercase(), attr.value().to_string()))
        .collect()
}

fn matches_local_name(node: Node<'_, '_>, name: &str) -> bool {
    node.is_element() && node.tag_name().name().eq_ignore_ascii_case(name)
}

// Only direct text children count; nested element text is not included.
fn element_content(element: Node<'_, '_>) -> String {
    element
        .children()
        .filter(|child| child.is_text())
        .filter_map(|child| child.text())
        .collect()
}
