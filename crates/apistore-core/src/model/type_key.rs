// ── Type keys ──
//
// Every type label crossing a boundary (payload `type` fields, `find`
// arguments, model registrations) is folded into a `TypeKey` first.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Canonical type identifier, normalized to trimmed lowercase.
///
/// The empty key means "no type".
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct TypeKey(String);

impl TypeKey {
    pub const RESOURCE: &'static str = "resource";
    pub const SCHEMA: &'static str = "schema";
    pub const COLLECTION: &'static str = "collection";
    pub const ERROR: &'static str = "error";

    /// Normalize any label.
    pub fn new(raw: impl AsRef<str>) -> Self {
        Self(raw.as_ref().trim().to_lowercase())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

/// Normalize a type label. Total and side-effect free.
pub fn normalize_type(label: impl AsRef<str>) -> TypeKey {
    TypeKey::new(label)
}

/// Normalize an optional label; absent input yields the empty key.
pub fn normalize_opt(label: Option<&str>) -> TypeKey {
    label.map(TypeKey::new).unwrap_or_default()
}

impl fmt::Display for TypeKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for TypeKey {
    type Err = std::convert::Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(Self::new(s))
    }
}

impl From<&str> for TypeKey {
    fn from(s: &str) -> Self {
        Self::new(s)
    }
}

impl From<String> for TypeKey {
    fn from(s: String) -> Self {
        Self::new(s)
    }
}

impl From<&TypeKey> for TypeKey {
    fn from(k: &TypeKey) -> Self {
        k.clone()
    }
}

impl AsRef<str> for TypeKey {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl PartialEq<str> for TypeKey {
    fn eq(&self, other: &str) -> bool {
        self.0 == other
    }
}

impl PartialEq<&str> for TypeKey {
    fn eq(&self, other: &&str) -> bool {
        self.0 == *other
    }
}
