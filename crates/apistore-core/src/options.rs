// ── Per-call options ──
//
// Builders for the knobs each `Store` operation accepts. Every struct has a
// `Default` that matches what the store does when no options are given.

use std::time::Duration;

use apistore_api::{Credentials, Headers, Method};
use indexmap::IndexMap;

// ── find ─────────────────────────────────────────────────────────────

/// Options for [`Store::find`](crate::Store::find).
#[derive(Debug, Clone)]
pub struct FindOptions {
    /// Query filters, sent as repeated `key=value` pairs. Non-empty filters
    /// make the result uncacheable.
    pub filter: IndexMap<String, serde_json::Value>,
    /// Related resources to embed (`include=`). Non-empty makes the result
    /// uncacheable.
    pub include: Vec<String>,
    /// Skip the cache and always hit the server.
    pub force_reload: bool,
    /// Page size. Defaults to the store's page size when listing.
    pub limit: Option<usize>,
    /// Follow `pagination.next` until exhausted.
    pub depaginate: bool,
    /// Extra headers, layered over the type's model headers.
    pub headers: Headers,
    /// Fetch this URL instead of resolving one from the schema.
    pub url: Option<String>,
    /// After a full listing, evict cached records missing from it.
    pub remove_missing: bool,
    pub sort_by: Option<String>,
    pub descending: bool,
    pub timeout: Option<Duration>,
}

impl Default for FindOptions {
    fn default() -> Self {
        Self {
            filter: IndexMap::new(),
            include: Vec::new(),
            force_reload: false,
            limit: None,
            depaginate: true,
            headers: Headers::new(),
            url: None,
            remove_missing: false,
            sort_by: None,
            descending: false,
            timeout: None,
        }
    }
}

impl FindOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn filter(mut self, key: impl Into<String>, value: impl Into<serde_json::Value>) -> Self {
        self.filter.insert(key.into(), value.into());
        self
    }

    pub fn include(mut self, relation: impl Into<String>) -> Self {
        self.include.push(relation.into());
        self
    }

    pub fn force_reload(mut self) -> Self {
        self.force_reload = true;
        self
    }

    pub fn limit(mut self, limit: usize) -> Self {
        self.limit = Some(limit);
        self
    }

    pub fn no_depaginate(mut self) -> Self {
        self.depaginate = false;
        self
    }

    pub fn header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.insert(name.into(), value.into());
        self
    }

    pub fn url(mut self, url: impl Into<String>) -> Self {
        self.url = Some(url.into());
        self
    }

    pub fn remove_missing(mut self) -> Self {
        self.remove_missing = true;
        self
    }

    pub fn sort_by(mut self, field: impl Into<String>, descending: bool) -> Self {
        self.sort_by = Some(field.into());
        self.descending = descending;
        self
    }

    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    /// Whether the result may be served from (and recorded in) the cache.
    pub(crate) fn is_cacheable(&self) -> bool {
        self.depaginate && self.filter.is_empty() && self.include.is_empty()
    }
}

// ── typeify / create_record ──────────────────────────────────────────

/// Options for typeification and [`Store::create_record`](crate::Store::create_record).
#[derive(Debug, Clone)]
pub struct RecordOptions {
    /// Use this type instead of the payload's `type` field.
    pub type_override: Option<String>,
    /// Fill missing fields from the schema's defaults.
    pub apply_defaults: bool,
    /// Register typed records with an id in the identity cache.
    pub update_store: bool,
    /// Key holding a collection's members (default `data`).
    pub data_key: Option<String>,
}

impl Default for RecordOptions {
    fn default() -> Self {
        Self {
            type_override: None,
            apply_defaults: true,
            update_store: true,
            data_key: None,
        }
    }
}

impl RecordOptions {
    /// How server responses are typeified: no schema defaults.
    pub fn for_response() -> Self {
        Self {
            apply_defaults: false,
            ..Self::default()
        }
    }

    pub fn with_type(mut self, type_name: impl Into<String>) -> Self {
        self.type_override = Some(type_name.into());
        self
    }

    pub fn detached(mut self) -> Self {
        self.update_store = false;
        self
    }

    pub fn without_defaults(mut self) -> Self {
        self.apply_defaults = false;
        self
    }

    pub(crate) fn data_key(&self) -> &str {
        self.data_key.as_deref().unwrap_or("data")
    }
}

// ── request ──────────────────────────────────────────────────────────

/// A single request through [`Store::request`](crate::Store::request).
#[derive(Debug, Clone)]
pub struct RequestOptions {
    pub method: Method,
    pub url: String,
    pub headers: Headers,
    /// Serialized as the JSON body.
    pub data: Option<serde_json::Value>,
    /// Overrides the store's default timeout.
    pub timeout: Option<Duration>,
    pub depaginate: bool,
    pub credentials: Option<Credentials>,
}

impl RequestOptions {
    pub fn new(method: Method, url: impl Into<String>) -> Self {
        Self {
            method,
            url: url.into(),
            headers: Headers::new(),
            data: None,
            timeout: None,
            depaginate: true,
            credentials: None,
        }
    }

    pub fn get(url: impl Into<String>) -> Self {
        Self::new(Method::GET, url)
    }

    pub fn header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.insert(name.into(), value.into());
        self
    }

    pub fn data(mut self, data: serde_json::Value) -> Self {
        self.data = Some(data);
        self
    }

    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    pub fn no_depaginate(mut self) -> Self {
        self.depaginate = false;
        self
    }
}

// ── save / delete / links ────────────────────────────────────────────

/// Options for [`Store::save`](crate::Store::save).
#[derive(Debug, Clone, Default)]
pub struct SaveOptions {
    /// Override the method (default: `POST` for new records, `PUT` otherwise).
    pub method: Option<Method>,
    /// Override the target URL.
    pub url: Option<String>,
    /// Appended to the URL as a query string.
    pub qp: IndexMap<String, String>,
    /// Send this body instead of the serialized record.
    pub data: Option<serde_json::Value>,
}

/// Options for [`Store::delete`](crate::Store::delete).
#[derive(Debug, Clone, Default)]
pub struct DeleteOptions {
    pub url: Option<String>,
    /// Evict from the cache even when the server answered with a body.
    pub force_remove: bool,
}

/// Options for [`Store::follow_link`](crate::Store::follow_link) and
/// [`Store::import_link`](crate::Store::import_link).
#[derive(Debug, Clone, Default)]
pub struct LinkOptions {
    /// Field to store an imported link under (default: the link name).
    pub as_field: Option<String>,
    pub filter: IndexMap<String, serde_json::Value>,
    pub include: Vec<String>,
    pub limit: Option<usize>,
    pub sort_by: Option<String>,
    pub descending: bool,
    pub headers: Headers,
}

impl LinkOptions {
    pub fn as_field(mut self, field: impl Into<String>) -> Self {
        self.as_field = Some(field.into());
        self
    }

    pub fn filter(mut self, key: impl Into<String>, value: impl Into<serde_json::Value>) -> Self {
        self.filter.insert(key.into(), value.into());
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn find_defaults_are_cacheable() {
        let opts = FindOptions::default();
        assert!(opts.depaginate);
        assert!(opts.is_cacheable());
        assert!(!opts.clone().filter("state", "active").is_cacheable());
        assert!(!opts.clone().include("parts").is_cacheable());
        assert!(!opts.no_depaginate().is_cacheable());
    }

    #[test]
    fn response_records_skip_defaults() {
        let opts = RecordOptions::for_response();
        assert!(!opts.apply_defaults);
        assert!(opts.update_store);
        assert_eq!(opts.data_key(), "data");
    }
}
