// ── Request pipeline ──
//
// One exchange with the server: URL normalization, header layering, the
// request hook, timeout defaulting, then success/failure normalization.
// Successful JSON bodies are typeified; failures become `StoreError`s.

use std::collections::HashSet;

use apistore_api::{Body, Error as ApiError, Headers, Request, Response};
use futures_util::FutureExt;
use futures_util::future::BoxFuture;
use tracing::{debug, warn};

use crate::error::StoreError;
use crate::model::{Entity, Paginatable, Value};
use crate::options::{RecordOptions, RequestOptions};

use super::Store;

impl Store {
    /// Send one request and typeify the response.
    ///
    /// `204 No Content` resolves to JSON `null`. Paginated collections are
    /// depaginated unless `options.depaginate` is off.
    pub async fn request(&self, options: RequestOptions) -> Result<Value, StoreError> {
        self.request_with_status(options)
            .await
            .map(|(_, value)| value)
    }

    /// Like [`request`](Self::request), also returning the HTTP status.
    pub(crate) fn request_with_status(
        &self,
        mut options: RequestOptions,
    ) -> BoxFuture<'_, Result<(u16, Value), StoreError>> {
        async move {
            options.url = self.normalize_url(&options.url);
            if let Some(hook) = &self.inner.request_hook {
                hook(&mut options);
            }
            if options.timeout.is_none() {
                options.timeout = self.inner.config.default_timeout;
            }

            let request = self.build_request(&options)?;
            debug!(method = %options.method, url = %options.url, "request");
            match self.inner.transport.request(request).await {
                Ok(response) => self.request_succeeded(response, &options).await,
                Err(err) => Err(self.request_failed(err, &options)),
            }
        }
        .boxed()
    }

    /// Make relative URLs root-relative by prefixing the base URL.
    pub(crate) fn normalize_url(&self, url: &str) -> String {
        if url.starts_with("http://") || url.starts_with("https://") || url.starts_with('/') {
            return url.to_owned();
        }
        format!("{}/{url}", self.inner.config.base_url.trim_end_matches('/'))
    }

    fn build_request(&self, options: &RequestOptions) -> Result<Request, StoreError> {
        let mut headers = Headers::new();
        headers.insert("Accept".into(), "application/json".into());
        headers.insert("Content-Type".into(), "application/json".into());
        headers.extend(self.inner.config.headers.clone());
        headers.extend(options.headers.clone());

        let body = options
            .data
            .as_ref()
            .map(serde_json::to_string)
            .transpose()
            .map_err(|e| StoreError::Transport {
                status: None,
                message: format!("cannot encode request body: {e}"),
            })?;

        Ok(Request {
            method: options.method.clone(),
            url: options.url.clone(),
            headers,
            body,
            timeout: options.timeout,
            credentials: options.credentials.unwrap_or(self.inner.config.credentials),
        })
    }

    // ── Response handling ────────────────────────────────────────────

    async fn request_succeeded(
        &self,
        response: Response,
        options: &RequestOptions,
    ) -> Result<(u16, Value), StoreError> {
        let status = response.status;
        let body = if response.is_no_content() {
            None
        } else {
            response.body
        };
        let value = match body {
            None => Value::null(),
            Some(Body::Json(json)) if json.is_object() || json.is_array() => {
                self.typeify(json, &RecordOptions::for_response())?
            }
            Some(Body::Json(json)) => Value::Json(json),
            Some(Body::Text(text)) => Value::Json(text.into()),
        };

        match value {
            Value::Collection(mut collection) if options.depaginate => {
                self.depaginate(&mut collection, options).await?;
                Ok((status, Value::Collection(collection)))
            }
            other => Ok((status, other)),
        }
    }

    /// Follow `next` links until exhausted, appending each page in order.
    async fn depaginate<P: Paginatable + Send>(
        &self,
        target: &mut P,
        options: &RequestOptions,
    ) -> Result<(), StoreError> {
        let mut visited = HashSet::from([options.url.clone()]);
        while let Some(next) = target.next_page() {
            let next = self.normalize_url(&next);
            if !visited.insert(next.clone()) {
                warn!(url = %next, "next page already fetched, stopping");
                break;
            }
            debug!(url = %next, "fetching next page");
            let mut page_options = RequestOptions::get(next).no_depaginate();
            page_options.headers = options.headers.clone();
            page_options.timeout = options.timeout;
            page_options.credentials = options.credentials;

            let (_, page) = self.request_with_status(page_options).await?;
            match page.into_collection() {
                Some(page) => target.append_page(page),
                None => break,
            }
        }
        Ok(())
    }

    fn request_failed(&self, err: ApiError, options: &RequestOptions) -> StoreError {
        if err.is_timeout() {
            let reported = if let ApiError::Timeout { timeout, .. } = &err {
                *timeout
            } else {
                None
            };
            return StoreError::Timeout {
                timeout: options.timeout.or(reported),
                method: options.method.to_string(),
                url: options.url.clone(),
            };
        }

        match err {
            ApiError::Status { status, body } => StoreError::Server {
                status,
                error: self.error_entity(status, body),
            },
            other => StoreError::Transport {
                status: other.status(),
                message: other.to_string(),
            },
        }
    }

    /// The typeified error body, or a synthesized `error` record when the
    /// body is missing, plain text or untyped.
    fn error_entity(&self, status: u16, body: Option<Body>) -> Entity {
        let mut fields = match body {
            Some(Body::Json(serde_json::Value::Object(map))) => {
                match self.typeify(
                    serde_json::Value::Object(map.clone()),
                    &RecordOptions::for_response(),
                ) {
                    Ok(Value::Entity(entity)) => return entity,
                    _ => map,
                }
            }
            Some(Body::Json(other)) => {
                let mut map = serde_json::Map::new();
                map.insert("message".into(), other);
                map
            }
            Some(Body::Text(text)) => {
                let mut map = serde_json::Map::new();
                map.insert("message".into(), text.into());
                map
            }
            None => {
                let mut map = serde_json::Map::new();
                map.insert("message".into(), format!("HTTP {status}").into());
                map
            }
        };
        fields.insert("type".into(), "error".into());
        fields.entry("status").or_insert_with(|| status.into());
        Entity::from_json(fields)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::super::tests::offline_store;
    use std::time::Duration;

    use super::*;
    use serde_json::json;

    #[test]
    fn relative_urls_get_the_base_url() {
        let store = offline_store();
        assert_eq!(store.normalize_url("widgets"), "/v1/widgets");
        assert_eq!(store.normalize_url("/v2/widgets"), "/v2/widgets");
        assert_eq!(
            store.normalize_url("https://api.test/x"),
            "https://api.test/x"
        );
    }

    #[test]
    fn headers_are_layered() {
        let store = Store::new(
            crate::StoreConfig::default().with_header("X-Store", "s"),
            std::sync::Arc::new(super::super::tests::Offline),
        );
        let options = RequestOptions::get("/v1/w")
            .header("Accept", "text/plain")
            .data(json!({"a": 1}));
        let request = store.build_request(&options).unwrap();

        assert_eq!(request.headers["Accept"], "text/plain");
        assert_eq!(request.headers["Content-Type"], "application/json");
        assert_eq!(request.headers["X-Store"], "s");
        assert_eq!(request.body.as_deref(), Some(r#"{"a":1}"#));
    }

    #[test]
    fn text_error_bodies_become_error_records() {
        let store = offline_store();
        let e = store.error_entity(502, Some(Body::Text("bad gateway".into())));
        assert_eq!(e.type_key(), "error");
        assert_eq!(e.get_str("message").as_deref(), Some("bad gateway"));
        assert_eq!(e.get("status").unwrap(), Value::from(502_i64));
    }

    #[test]
    fn untyped_json_error_bodies_are_tagged() {
        let store = offline_store();
        let e = store.error_entity(400, Some(Body::Json(json!({"message": "nope"}))));
        assert_eq!(e.type_key(), "error");
        assert_eq!(e.get_str("message").as_deref(), Some("nope"));
    }

    #[test]
    fn timeouts_fall_back_to_the_transport_limit() {
        let store = offline_store();
        let err = store.request_failed(
            ApiError::Timeout {
                url: "/v1/w".into(),
                timeout: Some(Duration::from_secs(7)),
            },
            &RequestOptions::get("/v1/w"),
        );
        assert!(matches!(
            err,
            StoreError::Timeout { timeout: Some(t), .. } if t == Duration::from_secs(7)
        ));
    }

    #[test]
    fn timeouts_without_any_limit_report_none() {
        let store = offline_store();
        let err = store.request_failed(
            ApiError::Timeout {
                url: "/v1/w".into(),
                timeout: None,
            },
            &RequestOptions::get("/v1/w"),
        );
        assert!(matches!(err, StoreError::Timeout { timeout: None, .. }));
        assert_eq!(err.to_string(), "API request timeout");
    }
}
