//! # JSON Pointers — Instance Locations
//!
//! RFC 6901 pointers identifying a node inside a certificate document,
//! e.g. `/Certificate/CommercialTransaction/A01`. The root document is the
//! empty pointer.

use std::fmt;

use serde::{Serialize, Serializer};

/// An RFC 6901 JSON pointer into a document.
///
/// Pointers are built by appending segments; escaping of `~` and `/` in
/// object keys happens on the way in, so the rendered form is always a
/// valid pointer.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash)]
pub struct JsonPointer(String);

impl JsonPointer {
    /// The pointer to the whole document.
    pub fn root() -> Self {
        Self(String::new())
    }

    /// Pointer to the object member `key` below `self`.
    pub fn push_key(&self, key: &str) -> Self {
        let mut inner = String::with_capacity(self.0.len() + key.len() + 1);
        inner.push_str(&self.0);
        inner.push('/');
        escape_into(&mut inner, key);
        Self(inner)
    }

    /// Pointer to the array element `index` below `self`.
    pub fn push_index(&self, index: usize) -> Self {
        Self(format!("{}/{index}", self.0))
    }

    /// Whether this is the root pointer.
    pub fn is_root(&self) -> bool {
        self.0.is_empty()
    }

    /// The rendered pointer.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

/// Escape a single reference token (`~` → `~0`, `/` → `~1`).
pub fn escape_token(token: &str) -> String {
    let mut out = String::with_capacity(token.len());
    escape_into(&mut out, token);
    out
}

fn escape_into(out: &mut String, token: &str) {
    for c in token.chars() {
        match c {
            '~' => out.push_str("~0"),
            '/' => out.push_str("~1"),
            other => out.push(other),
        }
    }
}

impl fmt::Display for JsonPointer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for JsonPointer {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl Serialize for JsonPointer {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.0)
    }
}
