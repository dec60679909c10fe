// ── Store ──
//
// The facade application code talks to. Owns the identity cache, the model
// registry, parsed-schema memos and the in-flight request table, and drives
// a `Transport` for everything that leaves the process.
//
// Operations are split across submodules by concern:
//   typeify   : JSON → entities / collections, cache writes
//   request   : the single-request pipeline
//   fetch     : find / find_all, URL resolution, request coalescing
//   reconcile : save / delete / reload and record-level helpers

mod cache;
mod fetch;
mod reconcile;
mod request;
mod typeify;

pub use cache::Group;
pub use typeify::MAX_TYPEIFY_DEPTH;

use std::sync::Arc;
use std::sync::atomic::AtomicU64;

use apistore_api::Transport;
use dashmap::DashMap;
use futures_util::future::{BoxFuture, Shared};
use tokio::sync::watch;

use crate::config::StoreConfig;
use crate::error::StoreError;
use crate::model::registry::ModelRegistry;
use crate::model::{Entity, ModelDescriptor, Schema, TypeKey, Value, normalize_type};
use crate::options::RequestOptions;

use cache::{Added, IdentityCache};

/// Rewrites every request just before it is sent.
pub type RequestHook = Arc<dyn Fn(&mut RequestOptions) + Send + Sync>;

type SharedFetch = Shared<BoxFuture<'static, Result<Value, StoreError>>>;

/// A parsed schema, valid while its entity's revision is unchanged.
struct SchemaMemo {
    entity: Entity,
    revision: u64,
    schema: Arc<Schema>,
}

// ── Store ────────────────────────────────────────────────────────────

/// Client-side cache and request coordinator for one API.
///
/// Cheaply cloneable via `Arc<StoreInner>`; clones share all state.
#[derive(Clone)]
pub struct Store {
    inner: Arc<StoreInner>,
}

struct StoreInner {
    config: StoreConfig,
    transport: Arc<dyn Transport>,
    cache: IdentityCache,
    models: ModelRegistry,
    schemas: DashMap<TypeKey, SchemaMemo>,
    /// signature → (request serial, shared outcome)
    in_flight: DashMap<String, (u64, SharedFetch)>,
    request_hook: Option<RequestHook>,
    next_request: AtomicU64,
}

impl Store {
    pub fn new(config: StoreConfig, transport: Arc<dyn Transport>) -> Self {
        StoreBuilder::new(transport).config(config).build()
    }

    pub fn builder(transport: Arc<dyn Transport>) -> StoreBuilder {
        StoreBuilder::new(transport)
    }

    pub fn config(&self) -> &StoreConfig {
        &self.inner.config
    }

    // ── Cache queries ────────────────────────────────────────────────

    /// The live group of every cached record of `type_name`.
    pub fn all(&self, type_name: impl AsRef<str>) -> Group {
        self.inner.cache.group(&normalize_type(type_name))
    }

    pub fn get_by_id(&self, type_name: impl AsRef<str>, id: &str) -> Option<Entity> {
        self.inner.cache.get_by_id(&normalize_type(type_name), id)
    }

    pub fn has_record_for(&self, type_name: impl AsRef<str>, id: &str) -> bool {
        self.get_by_id(type_name, id).is_some()
    }

    /// `true` if this exact instance is the cached representative of its `(type, id)`.
    pub fn has_record(&self, entity: &Entity) -> bool {
        let Some(id) = entity.id() else {
            return false;
        };
        self.inner
            .cache
            .get_by_id(&entity.type_key(), &id)
            .is_some_and(|cached| Entity::ptr_eq(&cached, entity))
    }

    /// Whether every record of `type_name` has been loaded.
    pub fn have_all(&self, type_name: impl AsRef<str>) -> bool {
        self.inner.cache.have_all(&normalize_type(type_name))
    }

    /// Number of distinct requests currently in flight.
    pub fn in_flight_count(&self) -> usize {
        self.inner.in_flight.len()
    }

    // ── Reset ────────────────────────────────────────────────────────

    /// Forget everything: records, "have all" flags, pending request
    /// registrations and parsed schemas. Bumps the generation.
    pub fn reset(&self) {
        self.inner.in_flight.clear();
        self.inner.schemas.clear();
        self.inner.cache.reset();
    }

    /// Forget the records of one type.
    pub fn reset_type(&self, type_name: impl AsRef<str>) {
        let key = normalize_type(type_name);
        self.inner.schemas.remove(&key);
        self.inner.cache.reset_type(&key);
    }

    /// Incremented on every `reset()`.
    pub fn generation(&self) -> u64 {
        self.inner.cache.generation()
    }

    pub fn subscribe_generation(&self) -> watch::Receiver<u64> {
        self.inner.cache.subscribe_generation()
    }

    // ── Schemas ──────────────────────────────────────────────────────

    /// The parsed schema for `type_name`, if its schema record is cached.
    pub fn schema_for(&self, type_name: impl AsRef<str>) -> Option<Arc<Schema>> {
        let key = normalize_type(type_name);
        let entity = self
            .inner
            .cache
            .get_by_id(&TypeKey::new(TypeKey::SCHEMA), key.as_str())?;

        if let Some(memo) = self.inner.schemas.get(&key) {
            if Entity::ptr_eq(&memo.entity, &entity) && memo.revision == entity.revision() {
                return Some(Arc::clone(&memo.schema));
            }
        }

        let schema = Arc::new(Schema::from_entity(&entity));
        self.inner.schemas.insert(
            key,
            SchemaMemo {
                revision: entity.revision(),
                entity,
                schema: Arc::clone(&schema),
            },
        );
        Some(schema)
    }

    // ── Models ───────────────────────────────────────────────────────

    pub fn register_model(&self, type_name: impl AsRef<str>, model: ModelDescriptor) {
        self.inner.models.register(type_name, model);
    }

    pub fn register_models<I, S>(&self, models: I)
    where
        I: IntoIterator<Item = (S, ModelDescriptor)>,
        S: AsRef<str>,
    {
        for (type_name, model) in models {
            self.register_model(type_name, model);
        }
    }

    /// Like `register_model`, for call chains.
    pub fn replace_model(&self, type_name: impl AsRef<str>, model: ModelDescriptor) -> &Self {
        self.register_model(type_name, model);
        self
    }

    pub fn unregister_model(&self, type_name: impl AsRef<str>) {
        self.inner.models.unregister(type_name);
    }

    pub fn unregister_models<I, S>(&self, types: I)
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        for type_name in types {
            self.unregister_model(type_name);
        }
    }

    pub fn model_for(&self, type_name: impl AsRef<str>) -> Arc<ModelDescriptor> {
        self.inner.models.model_for(type_name)
    }

    // ── Cache writes (hooks run outside every lock) ──────────────────

    pub(crate) fn cache_add(&self, type_key: &TypeKey, entity: &Entity) {
        if matches!(
            self.inner.cache.add(type_key, entity),
            Added::Inserted | Added::Replaced
        ) {
            self.model_for(entity.type_key()).notify_added(entity);
        }
    }

    /// Remove `entity` from `type_key`'s partition and, when distinct, its
    /// base type's.
    pub(crate) fn cache_remove(&self, type_key: &TypeKey, entity: &Entity) {
        if self.inner.cache.remove(type_key, entity) {
            self.model_for(entity.type_key()).notify_removed(entity);
        }
        let base = entity.base_type();
        if !base.is_empty() && &base != type_key {
            self.cache_remove(&base, entity);
        }
    }
}

impl std::fmt::Debug for Store {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Store")
            .field("base_url", &self.inner.config.base_url)
            .field("generation", &self.generation())
            .field("in_flight", &self.in_flight_count())
            .finish_non_exhaustive()
    }
}

// ── StoreBuilder ─────────────────────────────────────────────────────

/// Assembles a [`Store`] with optional extension points.
pub struct StoreBuilder {
    config: StoreConfig,
    transport: Arc<dyn Transport>,
    request_hook: Option<RequestHook>,
    models: Vec<(String, ModelDescriptor)>,
}

impl StoreBuilder {
    pub fn new(transport: Arc<dyn Transport>) -> Self {
        Self {
            config: StoreConfig::default(),
            transport,
            request_hook: None,
            models: Vec::new(),
        }
    }

    pub fn config(mut self, config: StoreConfig) -> Self {
        self.config = config;
        self
    }

    /// Install a hook that may rewrite every request before it is sent.
    pub fn request_hook(mut self, hook: impl Fn(&mut RequestOptions) + Send + Sync + 'static) -> Self {
        self.request_hook = Some(Arc::new(hook));
        self
    }

    pub fn model(mut self, type_name: impl Into<String>, model: ModelDescriptor) -> Self {
        self.models.push((type_name.into(), model));
        self
    }

    pub fn build(self) -> Store {
        let models = ModelRegistry::new();
        for (type_name, model) in self.models {
            models.register(type_name, model);
        }
        Store {
            inner: Arc::new(StoreInner {
                config: self.config,
                transport: self.transport,
                cache: IdentityCache::new(),
                models,
                schemas: DashMap::new(),
                in_flight: DashMap::new(),
                request_hook: self.request_hook,
                next_request: AtomicU64::new(0),
            }),
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
pub(crate) mod tests {
    use super::*;
    use apistore_api::{Error as ApiError, Request, Response};
    use futures_util::FutureExt;
    use serde_json::json;

    /// Transport that fails every request; for tests that never leave the cache.
    pub(crate) struct Offline;

    impl Transport for Offline {
        fn request(&self, request: Request) -> BoxFuture<'_, Result<Response, ApiError>> {
            async move {
                Err(ApiError::Network {
                    message: format!("offline: {}", request.url),
                })
            }
            .boxed()
        }
    }

    pub(crate) fn offline_store() -> Store {
        Store::new(StoreConfig::default(), Arc::new(Offline))
    }

    #[test]
    fn has_record_checks_identity() {
        let store = offline_store();
        let cached = store
            .typeify(json!({"type": "widget", "id": "1"}), &Default::default())
            .unwrap()
            .into_entity()
            .unwrap();
        let serde_json::Value::Object(map) = json!({"type": "widget", "id": "1"}) else {
            unreachable!()
        };
        let lookalike = Entity::from_json(map);

        assert!(store.has_record(&cached));
        assert!(!store.has_record(&lookalike));
        assert!(store.has_record_for("Widget", "1"));
    }

    #[test]
    fn schema_memo_tracks_revisions() {
        let store = offline_store();
        let schema = store
            .typeify(
                json!({
                    "type": "schema",
                    "id": "widget",
                    "links": {"collection": "/v1/widgets"},
                    "resourceFields": {"name": {"type": "string"}}
                }),
                &Default::default(),
            )
            .unwrap()
            .into_entity()
            .unwrap();

        let first = store.schema_for("widget").unwrap();
        assert!(Arc::ptr_eq(&first, &store.schema_for("WIDGET").unwrap()));

        schema.set("resourceFields", json!({"name": {"type": "string", "required": true}}));
        let second = store.schema_for("widget").unwrap();
        assert!(!Arc::ptr_eq(&first, &second));
        assert!(second.is_required("name"));
    }

    #[test]
    fn reset_type_keeps_other_types() {
        let store = offline_store();
        store
            .typeify(
                json!([{"type": "widget", "id": "1"}, {"type": "gadget", "id": "1"}]),
                &Default::default(),
            )
            .unwrap();
        store.reset_type("widget");
        assert!(store.all("widget").is_empty());
        assert_eq!(store.all("gadget").len(), 1);
    }

    #[test]
    fn model_registration_round_trip() {
        let store = offline_store();
        store.register_models([("widget", ModelDescriptor::new("widget"))]);
        assert_eq!(store.model_for("widget").name(), "widget");
        store.unregister_models(["widget"]);
        assert_eq!(store.model_for("widget").name(), "resource");
    }
}
