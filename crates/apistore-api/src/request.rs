// ── Request / response shapes ──
//
// The normalized exchange the cache layer speaks. Transports translate
// these to and from their wire library.

use std::time::Duration;

use futures_util::future::BoxFuture;
use indexmap::IndexMap;

use crate::error::Error;

pub use reqwest::Method;

/// Ordered header map. Order matters: the cache layer serializes it into
/// request signatures.
pub type Headers = IndexMap<String, String>;

/// Cookie policy for a request.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum Credentials {
    /// Never send or store cookies.
    Omit,
    /// Send cookies only to the transport's own origin.
    #[default]
    SameOrigin,
    /// Send cookies to any origin.
    Include,
}

/// A single outgoing request.
#[derive(Debug, Clone)]
pub struct Request {
    pub method: Method,
    /// Absolute, root-relative, or relative to the transport origin.
    pub url: String,
    pub headers: Headers,
    /// Pre-serialized body.
    pub body: Option<String>,
    /// `None` disables the timeout.
    pub timeout: Option<Duration>,
    pub credentials: Credentials,
}

impl Request {
    pub fn new(method: Method, url: impl Into<String>) -> Self {
        Self {
            method,
            url: url.into(),
            headers: Headers::new(),
            body: None,
            timeout: None,
            credentials: Credentials::default(),
        }
    }

    pub fn get(url: impl Into<String>) -> Self {
        Self::new(Method::GET, url)
    }
}

/// A decoded response body.
#[derive(Debug, Clone, PartialEq)]
pub enum Body {
    Json(serde_json::Value),
    Text(String),
}

impl Body {
    pub fn as_json(&self) -> Option<&serde_json::Value> {
        match self {
            Self::Json(v) => Some(v),
            Self::Text(_) => None,
        }
    }
}

/// A successful (2xx) response. `204 No Content` always has `body: None`.
#[derive(Debug, Clone)]
pub struct Response {
    pub status: u16,
    /// Header names are lowercase.
    pub headers: Headers,
    pub body: Option<Body>,
}

impl Response {
    pub fn is_no_content(&self) -> bool {
        self.status == 204
    }
}

/// Something that can carry a [`Request`] to a server.
///
/// Non-2xx responses must be reported as [`Error::Status`] with the decoded
/// body; a lapsed timeout as [`Error::Timeout`].
pub trait Transport: Send + Sync {
    fn request(&self, request: Request) -> BoxFuture<'_, Result<Response, Error>>;
}
