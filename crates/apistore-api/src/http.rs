// reqwest-backed `Transport`.
//
// Resolves request URLs against a fixed origin, applies the per-request
// cookie policy, and decodes bodies by content type.

use futures_util::FutureExt;
use futures_util::future::BoxFuture;
use tracing::debug;
use url::Url;

use crate::error::Error;
use crate::request::{Body, Credentials, Headers, Request, Response, Transport};
use crate::transport::TransportConfig;

/// HTTP transport for a single API origin.
///
/// Holds two clients: one with a cookie jar for credentialed requests and
/// one without for `Credentials::Omit` and cross-origin `SameOrigin` calls.
pub struct HttpTransport {
    origin: Url,
    http: reqwest::Client,
    anonymous: reqwest::Client,
}

impl HttpTransport {
    /// Build both clients from a `TransportConfig`.
    ///
    /// `origin` is what relative and root-relative URLs resolve against,
    /// e.g. `https://api.example.com`.
    pub fn new(origin: Url, config: &TransportConfig) -> Result<Self, Error> {
        let config = if config.cookie_jar.is_some() {
            config.clone()
        } else {
            config.clone().with_cookie_jar()
        };
        Ok(Self {
            origin,
            http: config.build_client(true)?,
            anonymous: config.build_client(false)?,
        })
    }

    /// Wrap an existing `reqwest::Client` (caller manages cookies and TLS).
    pub fn from_reqwest(origin: &str, http: reqwest::Client) -> Result<Self, Error> {
        let origin = Url::parse(origin)?;
        Ok(Self {
            origin,
            anonymous: http.clone(),
            http,
        })
    }

    /// The origin relative URLs resolve against.
    pub fn origin(&self) -> &Url {
        &self.origin
    }

    fn resolve(&self, raw: &str) -> Result<Url, Error> {
        Ok(self.origin.join(raw)?)
    }

    fn client_for(&self, url: &Url, credentials: Credentials) -> &reqwest::Client {
        match credentials {
            Credentials::Include => &self.http,
            Credentials::SameOrigin if url.origin() == self.origin.origin() => &self.http,
            Credentials::SameOrigin | Credentials::Omit => &self.anonymous,
        }
    }

    async fn send(&self, request: Request) -> Result<Response, Error> {
        let url = self.resolve(&request.url)?;
        debug!(method = %request.method, %url, "sending request");

        let mut builder = self
            .client_for(&url, request.credentials)
            .request(request.method, url.clone());
        for (name, value) in &request.headers {
            builder = builder.header(name.as_str(), value.as_str());
        }
        if let Some(timeout) = request.timeout {
            builder = builder.timeout(timeout);
        }
        if let Some(body) = request.body {
            builder = builder.body(body);
        }

        let resp = builder.send().await.map_err(|e| {
            if e.is_timeout() {
                Error::Timeout {
                    url: url.to_string(),
                    timeout: request.timeout,
                }
            } else {
                Error::Transport(e)
            }
        })?;

        Self::decode(resp).await
    }

    // ── Response handling ────────────────────────────────────────────

    async fn decode(resp: reqwest::Response) -> Result<Response, Error> {
        let status = resp.status();
        let headers: Headers = resp
            .headers()
            .iter()
            .filter_map(|(name, value)| {
                value
                    .to_str()
                    .ok()
                    .map(|v| (name.as_str().to_owned(), v.to_owned()))
            })
            .collect();

        let body = if status == reqwest::StatusCode::NO_CONTENT {
            None
        } else {
            let is_json = headers
                .get("content-type")
                .is_some_and(|ct| ct.to_ascii_lowercase().contains("application/json"));
            let raw = resp.text().await?;
            Self::parse_body(raw, is_json)?
        };

        if status.is_success() {
            Ok(Response {
                status: status.as_u16(),
                headers,
                body,
            })
        } else {
            Err(Error::Status {
                status: status.as_u16(),
                body,
            })
        }
    }

    fn parse_body(raw: String, is_json: bool) -> Result<Option<Body>, Error> {
        if raw.is_empty() {
            return Ok(None);
        }
        if !is_json {
            return Ok(Some(Body::Text(raw)));
        }
        match serde_json::from_str(&raw) {
            Ok(value) => Ok(Some(Body::Json(value))),
            Err(e) => {
                let preview: String = raw.chars().take(200).collect();
                Err(Error::Deserialization {
                    message: format!("{e} (body preview: {preview:?})"),
                    body: raw,
                })
            }
        }
    }
}

impl Transport for HttpTransport {
    fn request(&self, request: Request) -> BoxFuture<'_, Result<Response, Error>> {
        self.send(request).boxed()
    }
}
