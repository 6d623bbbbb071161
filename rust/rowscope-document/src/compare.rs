//! Total ordering over documents, mirroring the store's native ordering.
//!
//! Values of different kinds are ordered by comparing their kind labels as
//! strings, so the resulting kind order is
//!
//! ```text
//! ARRAY < BOOL < NULL < NUMBER < OBJECT < PTYPE<BINARY> < PTYPE<TIME> < STRING
//! ```
//!
//! The labels must stay exactly as they are: the order between kinds is a
//! consequence of their spelling, not of a rank table.
//!
//! A missing value ([`compare_optional`] with `None`) sorts after every
//! document, independent of the sort direction applied by the caller.

use std::{cmp::Ordering, collections::BTreeMap};

use crate::{Document, pseudo::ComparablePseudoType};

pub const NULL_LABEL: &str = "NULL";
pub const BOOL_LABEL: &str = "BOOL";
pub const NUMBER_LABEL: &str = "NUMBER";
pub const STRING_LABEL: &str = "STRING";
pub const ARRAY_LABEL: &str = "ARRAY";
pub const OBJECT_LABEL: &str = "OBJECT";

/// Returns the kind label of a document as used for cross-kind comparison.
pub fn type_label(doc: &Document) -> &'static str {
    if let Some(ptype) = doc.comparable_pseudo_type() {
        return ptype.label();
    }
    primitive_label(doc)
}

fn primitive_label(doc: &Document) -> &'static str {
    match doc {
        Document::Null => NULL_LABEL,
        Document::Bool(_) => BOOL_LABEL,
        Document::Number(_) => NUMBER_LABEL,
        Document::String(_) => STRING_LABEL,
        Document::Array(_) => ARRAY_LABEL,
        Document::Object(_) => OBJECT_LABEL,
    }
}

/// Compares two possibly-missing documents; `None` sorts last.
pub fn compare_optional(a: Option<&Document>, b: Option<&Document>) -> Ordering {
    match (a, b) {
        (None, None) => Ordering::Equal,
        (None, Some(_)) => Ordering::Greater,
        (Some(_), None) => Ordering::Less,
        (Some(a), Some(b)) => compare(a, b),
    }
}

/// Compares two documents.
pub fn compare(a: &Document, b: &Document) -> Ordering {
    match (a.comparable_pseudo_type(), b.comparable_pseudo_type()) {
        (Some(pa), Some(pb)) => {
            if pa != pb {
                pa.name().cmp(pb.name())
            } else {
                compare_pseudo(pa, a, b)
            }
        }
        (Some(pa), None) => pa.label().cmp(primitive_label(b)),
        (None, Some(pb)) => primitive_label(a).cmp(pb.label()),
        (None, None) => {
            let (la, lb) = (primitive_label(a), primitive_label(b));
            if la != lb {
                return la.cmp(lb);
            }
            compare_same_kind(a, b)
        }
    }
}

fn compare_pseudo(ptype: ComparablePseudoType, a: &Document, b: &Document) -> Ordering {
    match ptype {
        ComparablePseudoType::Time => compare_numbers(a.epoch_time(), b.epoch_time()),
        ComparablePseudoType::Binary => a.binary_content().cmp(&b.binary_content()),
    }
}

fn compare_same_kind(a: &Document, b: &Document) -> Ordering {
    match (a, b) {
        (Document::Null, Document::Null) => Ordering::Equal,
        (Document::Bool(a), Document::Bool(b)) => a.cmp(b),
        (Document::Number(a), Document::Number(b)) => compare_numbers(*a, *b),
        (Document::String(a), Document::String(b)) => compare_strings(a, b),
        (Document::Array(a), Document::Array(b)) => compare_arrays(a, b),
        (Document::Object(a), Document::Object(b)) => compare_objects(a, b),
        _ => unreachable!("labels matched but kinds differ"),
    }
}

/// Numbers compare as `<` does: incomparable values (NaN) are equal to
/// everything.
fn compare_numbers(a: f64, b: f64) -> Ordering {
    a.partial_cmp(&b).unwrap_or(Ordering::Equal)
}

/// Code point wise comparison; on a common prefix the shorter string (in code
/// points) is less.
pub fn compare_strings(a: &str, b: &str) -> Ordering {
    a.chars().cmp(b.chars())
}

fn compare_arrays(a: &[Document], b: &[Document]) -> Ordering {
    for (x, y) in a.iter().zip(b) {
        match compare(x, y) {
            Ordering::Equal => continue,
            unequal => return unequal,
        }
    }
    a.len().cmp(&b.len())
}

/// Objects compare as the key-sorted `[k1, v1, k2, v2, ...]` arrays they
/// flatten to. Keys and values never meet at the same position, so pairs are
/// compared key first, then value.
fn compare_objects(a: &BTreeMap<String, Document>, b: &BTreeMap<String, Document>) -> Ordering {
    for ((ka, va), (kb, vb)) in a.iter().zip(b) {
        match compare_strings(ka, kb).then_with(|| compare(va, vb)) {
            Ordering::Equal => continue,
            unequal => return unequal,
        }
    }
    a.len().cmp(&b.len())
}
