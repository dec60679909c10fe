// ── Store configuration ──
//
// How a `Store` builds URLs and requests. Never touches disk: the CLI (or
// any other host) constructs a `StoreConfig` and hands it in.

use std::time::Duration;

use apistore_api::{Credentials, Headers};

use crate::model::DEFAULT_META_KEYS;

/// Page size requested when listing without an explicit limit.
pub const DEFAULT_PAGE_SIZE: usize = 1000;

/// Request timeout applied when neither the call nor the config overrides it.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

/// Configuration for a single store.
#[derive(Debug, Clone)]
pub struct StoreConfig {
    /// Prefix for relative request URLs (e.g. `/v1`).
    pub base_url: String,
    /// Request timeout. `None` disables it.
    pub default_timeout: Option<Duration>,
    /// `limit` sent with collection fetches that don't set one.
    pub default_page_size: usize,
    /// Headers sent with every request, before per-request headers.
    pub headers: Headers,
    /// Evict records from the cache after any successful delete.
    pub remove_after_delete: bool,
    /// Envelope keys copied onto typeified collections.
    pub meta_keys: Vec<String>,
    /// Cookie policy for requests that don't set one.
    pub credentials: Credentials,
}

impl StoreConfig {
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    pub fn with_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.default_timeout = timeout;
        self
    }

    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.insert(name.into(), value.into());
        self
    }

    pub fn with_remove_after_delete(mut self, enabled: bool) -> Self {
        self.remove_after_delete = enabled;
        self
    }
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            base_url: "/v1".into(),
            default_timeout: Some(DEFAULT_TIMEOUT),
            default_page_size: DEFAULT_PAGE_SIZE,
            headers: Headers::new(),
            remove_after_delete: false,
            meta_keys: DEFAULT_META_KEYS.iter().map(|k| (*k).to_owned()).collect(),
            credentials: Credentials::default(),
        }
    }
}
