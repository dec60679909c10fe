// ── Fetch coordination ──
//
// `find` answers from the cache when it can, resolves a URL through the
// type's schema when it can't, and coalesces identical concurrent requests
// onto one shared future keyed by headers + URL.

use std::sync::Arc;
use std::sync::atomic::Ordering;

use dashmap::mapref::entry::Entry;
use futures_util::FutureExt;
use futures_util::future::BoxFuture;
use tracing::debug;

use crate::error::StoreError;
use crate::model::{TypeKey, Value, normalize_type};
use crate::options::{FindOptions, RequestOptions};

use super::{Group, Store};

impl Store {
    /// Find all records of a type (`id: None`) or one record by id.
    ///
    /// Cached results are returned without a request unless
    /// `options.force_reload` is set. Identical concurrent calls share one
    /// request and all observe its outcome.
    ///
    /// # Errors
    ///
    /// `MissingType` for an empty type, `SchemaUnresolved` when no URL can be
    /// derived, and the normalized transport/server errors otherwise.
    pub async fn find(
        &self,
        type_name: impl AsRef<str>,
        id: Option<&str>,
        options: FindOptions,
    ) -> Result<Value, StoreError> {
        self.find_boxed(normalize_type(type_name), id.map(str::to_owned), options)
            .await
    }

    /// Load every record of a type and return the live group.
    pub async fn find_all(
        &self,
        type_name: impl AsRef<str>,
        options: FindOptions,
    ) -> Result<Group, StoreError> {
        let type_key = normalize_type(type_name);
        if !options.force_reload && self.inner.cache.have_all(&type_key) {
            return Ok(self.inner.cache.group(&type_key));
        }
        self.find_boxed(type_key.clone(), None, options).await?;
        Ok(self.inner.cache.group(&type_key))
    }

    fn find_boxed(
        &self,
        type_key: TypeKey,
        id: Option<String>,
        mut options: FindOptions,
    ) -> BoxFuture<'_, Result<Value, StoreError>> {
        async move {
            if type_key.is_empty() {
                return Err(StoreError::MissingType { operation: "find" });
            }
            let id = id.filter(|id| !id.is_empty());
            if id.is_none() && options.limit.is_none() {
                options.limit = Some(self.inner.config.default_page_size);
            }

            let cacheable = options.is_cacheable();
            let for_all = id.is_none() && cacheable;

            if !options.force_reload {
                if for_all && self.inner.cache.have_all(&type_key) {
                    debug!(type_name = %type_key, "cached find all");
                    let members = self.inner.cache.group(&type_key).snapshot();
                    return Ok(Value::List(members.into_iter().map(Value::Entity).collect()));
                }
                if let (true, Some(id)) = (cacheable, &id) {
                    if let Some(existing) = self.inner.cache.get_by_id(&type_key, id) {
                        debug!(type_name = %type_key, %id, "cached find");
                        return Ok(Value::Entity(existing));
                    }
                }
            }

            let url = match options.url.take() {
                Some(url) => url,
                None => self.collection_url(&type_key, id.as_deref()).await?,
            };
            self.find_with_url(url, type_key, options, for_all).await
        }
        .boxed()
    }

    /// `links.collection` of the type's schema, plus `/<id>` when given.
    async fn collection_url(
        &self,
        type_key: &TypeKey,
        id: Option<&str>,
    ) -> Result<String, StoreError> {
        let unresolved = |source: Option<StoreError>| StoreError::SchemaUnresolved {
            type_name: type_key.to_string(),
            source: source.map(Arc::new),
        };

        let schema = self
            .find_boxed(
                TypeKey::new(TypeKey::SCHEMA),
                Some(type_key.to_string()),
                FindOptions::new().url(format!("schemas/{}", encode_component(type_key.as_str()))),
            )
            .await
            .map_err(|e| unresolved(Some(e)))?;

        let collection = schema
            .as_entity()
            .and_then(|schema| schema.link_for("collection"))
            .ok_or_else(|| unresolved(None))?;

        Ok(match id {
            Some(id) => format!("{collection}/{}", encode_component(id)),
            None => collection,
        })
    }

    async fn find_with_url(
        &self,
        url: String,
        type_key: TypeKey,
        options: FindOptions,
        for_all: bool,
    ) -> Result<Value, StoreError> {
        let model = self.model_for(&type_key);
        let url = with_url_options(&url, &options);

        let mut headers = model.headers().clone();
        headers.extend(options.headers.clone());
        let signature = format!(
            "{}{url}",
            serde_json::to_string(&headers).unwrap_or_default()
        );

        let shared = match self.inner.in_flight.entry(signature.clone()) {
            Entry::Occupied(entry) => {
                debug!(%url, "joining in-flight request");
                entry.get().1.clone()
            }
            Entry::Vacant(entry) => {
                let serial = self.inner.next_request.fetch_add(1, Ordering::Relaxed);
                let mut request = RequestOptions::get(url);
                request.headers = headers;
                request.timeout = options.timeout;
                request.depaginate = options.depaginate;

                let fetch = self
                    .clone()
                    .run_find(FindJob {
                        signature,
                        serial,
                        request,
                        type_key,
                        for_all,
                        remove_missing: options.remove_missing,
                        generation: self.generation(),
                    })
                    .boxed()
                    .shared();
                entry.insert((serial, fetch.clone()));
                fetch
            }
        };
        shared.await
    }

    /// The body of one coalesced request. Owns a store handle so the shared
    /// future is `'static`.
    async fn run_find(self, job: FindJob) -> Result<Value, StoreError> {
        let result = self.request(job.request).await;

        // A listing that straddles a reset doesn't prove the fresh cache complete.
        let complete = job.for_all && self.generation() == job.generation;
        if let (Ok(value), true) = (&result, complete) {
            self.inner.cache.set_have_all(&job.type_key, true);
            if job.remove_missing {
                if let Value::Collection(collection) = value {
                    let stale: Vec<_> = self
                        .inner
                        .cache
                        .group(&job.type_key)
                        .snapshot()
                        .into_iter()
                        .filter(|cached| !collection.contains_entity(cached))
                        .collect();
                    for entity in &stale {
                        self.cache_remove(&job.type_key, entity);
                    }
                    debug!(type_name = %job.type_key, removed = stale.len(), "removed missing records");
                }
            }
        }

        // A reset may have dropped this registration and a newer request
        // may now own the signature.
        self.inner
            .in_flight
            .remove_if(&job.signature, |_, (serial, _)| *serial == job.serial);
        result
    }
}

struct FindJob {
    signature: String,
    serial: u64,
    request: RequestOptions,
    type_key: TypeKey,
    for_all: bool,
    remove_missing: bool,
    generation: u64,
}

// ── URL helpers ──────────────────────────────────────────────────────

/// Percent-encode one URL component (spaces as `%20`).
pub(crate) fn encode_component(raw: &str) -> String {
    url::form_urlencoded::byte_serialize(raw.as_bytes())
        .collect::<String>()
        .replace('+', "%20")
}

fn query_value(value: &serde_json::Value) -> Option<String> {
    match value {
        serde_json::Value::Null => None,
        serde_json::Value::String(s) => Some(s.clone()),
        other => Some(other.to_string()),
    }
}

/// Append filter, include, limit and sort options as query parameters.
pub(crate) fn with_url_options(url: &str, options: &FindOptions) -> String {
    let mut pairs: Vec<(String, String)> = Vec::new();
    for (key, value) in &options.filter {
        match value {
            serde_json::Value::Array(values) => {
                pairs.extend(values.iter().filter_map(query_value).map(|v| (key.clone(), v)));
            }
            single => pairs.extend(query_value(single).map(|v| (key.clone(), v))),
        }
    }
    for relation in &options.include {
        pairs.push(("include".into(), relation.clone()));
    }
    if let Some(limit) = options.limit {
        pairs.push(("limit".into(), limit.to_string()));
    }
    if let Some(sort) = &options.sort_by {
        pairs.push(("sort".into(), sort.clone()));
        if options.descending {
            pairs.push(("order".into(), "desc".into()));
        }
    }

    append_query(url, &pairs)
}

pub(crate) fn append_query(url: &str, pairs: &[(String, String)]) -> String {
    let mut out = url.to_owned();
    for (key, value) in pairs {
        out.push(if out.contains('?') { '&' } else { '?' });
        out.push_str(&encode_component(key));
        out.push('=');
        out.push_str(&encode_component(value));
    }
    out
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::super::tests::offline_store;
    use super::*;
    use serde_json::json;

    #[test]
    fn url_options_are_encoded_in_order() {
        let options = FindOptions::new()
            .filter("state", "active")
            .filter("name", json!(["a b", "c"]))
            .include("parts")
            .limit(10)
            .sort_by("name", true);
        assert_eq!(
            with_url_options("/v1/widgets", &options),
            "/v1/widgets?state=active&name=a%20b&name=c&include=parts&limit=10&sort=name&order=desc"
        );
    }

    #[test]
    fn url_options_extend_existing_query() {
        let options = FindOptions::new().limit(5);
        assert_eq!(with_url_options("/v1/w?x=1", &options), "/v1/w?x=1&limit=5");
    }

    #[test]
    fn ids_are_component_encoded() {
        assert_eq!(encode_component("a/b c"), "a%2Fb%20c");
    }

    #[tokio::test]
    async fn empty_type_is_rejected() {
        let store = offline_store();
        let err = store.find("  ", None, FindOptions::default()).await.unwrap_err();
        assert!(matches!(err, StoreError::MissingType { operation: "find" }));
    }

    #[tokio::test]
    async fn cached_record_short_circuits() {
        let store = offline_store();
        let cached = store
            .typeify(json!({"type": "widget", "id": "1"}), &Default::default())
            .unwrap()
            .into_entity()
            .unwrap();

        let found = store
            .find("widget", Some("1"), FindOptions::default())
            .await
            .unwrap();
        assert!(crate::model::Entity::ptr_eq(found.as_entity().unwrap(), &cached));
    }

    #[tokio::test]
    async fn offline_schema_lookup_is_unresolved() {
        let store = offline_store();
        let err = store.find("widget", None, FindOptions::default()).await.unwrap_err();
        let StoreError::SchemaUnresolved { type_name, source } = err else {
            panic!("unexpected error: {err:?}")
        };
        assert_eq!(type_name, "widget");
        assert!(source.is_some());
        assert_eq!(store.in_flight_count(), 0);
    }
}
