// ── Model registry ──
//
// Per-type behavior the store consults while typeifying and caching:
// default request headers, an input rewrite hook, and lifecycle hooks.
// Unregistered types fall back to the generic `resource` model.

use std::fmt;
use std::sync::Arc;

use apistore_api::Headers;
use dashmap::DashMap;
use tracing::debug;

use super::entity::Entity;
use super::type_key::{TypeKey, normalize_type};

/// Rewrites a raw record before it becomes an entity.
pub type MangleIn =
    Arc<dyn Fn(serde_json::Map<String, serde_json::Value>) -> serde_json::Map<String, serde_json::Value> + Send + Sync>;

/// Called with an entity as it enters or leaves the cache.
pub type EntityHook = Arc<dyn Fn(&Entity) + Send + Sync>;

/// Behavior attached to a type.
#[derive(Clone, Default)]
pub struct ModelDescriptor {
    name: String,
    headers: Headers,
    mangle_in: Option<MangleIn>,
    was_added: Option<EntityHook>,
    was_removed: Option<EntityHook>,
}

impl ModelDescriptor {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Self::default()
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Headers sent with every `find` for this type.
    pub fn headers(&self) -> &Headers {
        &self.headers
    }

    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.insert(name.into(), value.into());
        self
    }

    pub fn with_mangle_in(
        mut self,
        f: impl Fn(serde_json::Map<String, serde_json::Value>) -> serde_json::Map<String, serde_json::Value>
        + Send
        + Sync
        + 'static,
    ) -> Self {
        self.mangle_in = Some(Arc::new(f));
        self
    }

    pub fn on_added(mut self, f: impl Fn(&Entity) + Send + Sync + 'static) -> Self {
        self.was_added = Some(Arc::new(f));
        self
    }

    pub fn on_removed(mut self, f: impl Fn(&Entity) + Send + Sync + 'static) -> Self {
        self.was_removed = Some(Arc::new(f));
        self
    }

    pub(crate) fn mangle_in(
        &self,
        input: serde_json::Map<String, serde_json::Value>,
    ) -> serde_json::Map<String, serde_json::Value> {
        match &self.mangle_in {
            Some(f) => f(input),
            None => input,
        }
    }

    pub(crate) fn notify_added(&self, entity: &Entity) {
        if let Some(f) = &self.was_added {
            f(entity);
        }
    }

    pub(crate) fn notify_removed(&self, entity: &Entity) {
        if let Some(f) = &self.was_removed {
            f(entity);
        }
    }
}

impl fmt::Debug for ModelDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ModelDescriptor")
            .field("name", &self.name)
            .field("headers", &self.headers)
            .field("mangle_in", &self.mangle_in.is_some())
            .field("was_added", &self.was_added.is_some())
            .field("was_removed", &self.was_removed.is_some())
            .finish()
    }
}

/// The `schema` model: keeps the raw id under `_id` and normalizes `id`,
/// so schemas are found by normalized type.
fn schema_model() -> ModelDescriptor {
    ModelDescriptor::new(TypeKey::SCHEMA).with_mangle_in(|mut input| {
        if let Some(serde_json::Value::String(raw)) = input.get("id").cloned() {
            input.insert("id".into(), normalize_type(&raw).as_str().into());
            input.insert("_id".into(), raw.into());
        }
        input
    })
}

/// Type → model lookup table.
pub(crate) struct ModelRegistry {
    models: DashMap<TypeKey, Arc<ModelDescriptor>>,
}

impl ModelRegistry {
    /// A registry holding the built-in models.
    pub(crate) fn new() -> Self {
        let registry = Self {
            models: DashMap::new(),
        };
        registry.register(TypeKey::SCHEMA, schema_model());
        registry.register(TypeKey::RESOURCE, ModelDescriptor::new(TypeKey::RESOURCE));
        registry.register(TypeKey::COLLECTION, ModelDescriptor::new(TypeKey::COLLECTION));
        registry.register(TypeKey::ERROR, ModelDescriptor::new(TypeKey::ERROR));
        registry
    }

    pub(crate) fn register(&self, type_name: impl AsRef<str>, model: ModelDescriptor) {
        self.models
            .insert(normalize_type(type_name), Arc::new(model));
    }

    pub(crate) fn unregister(&self, type_name: impl AsRef<str>) {
        self.models.remove(&normalize_type(type_name));
    }

    #[cfg(test)]
    pub(crate) fn contains(&self, type_name: impl AsRef<str>) -> bool {
        self.models.contains_key(&normalize_type(type_name))
    }

    /// The model for `type_name`, falling back to (and remembering) the
    /// `resource` model.
    pub(crate) fn model_for(&self, type_name: impl AsRef<str>) -> Arc<ModelDescriptor> {
        let key = normalize_type(type_name);
        if let Some(model) = self.models.get(&key) {
            return Arc::clone(model.value());
        }

        debug!(type_name = %key, "no model registered, falling back to resource model");
        let fallback = self
            .models
            .get(&TypeKey::new(TypeKey::RESOURCE))
            .map(|m| Arc::clone(m.value()))
            .unwrap_or_else(|| Arc::new(ModelDescriptor::new(TypeKey::RESOURCE)));
        self.models.insert(key, Arc::clone(&fallback));
        fallback
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[test]
    fn builtins_are_registered() {
        let registry = ModelRegistry::new();
        for t in ["schema", "resource", "collection", "error"] {
            assert!(registry.contains(t), "missing builtin {t}");
        }
    }

    #[test]
    fn unknown_type_falls_back_and_is_remembered() {
        let registry = ModelRegistry::new();
        assert!(!registry.contains("widget"));
        let model = registry.model_for("Widget");
        assert_eq!(model.name(), "resource");
        assert!(registry.contains("widget"));
    }

    #[test]
    fn register_replaces_and_unregister_falls_back() {
        let registry = ModelRegistry::new();
        registry.register("widget", ModelDescriptor::new("widget").with_header("X-Kind", "w"));
        assert_eq!(registry.model_for("widget").headers()["X-Kind"], "w");

        registry.unregister("widget");
        assert_eq!(registry.model_for("widget").name(), "resource");
    }

    #[test]
    fn schema_model_normalizes_id() {
        let registry = ModelRegistry::new();
        let mut input = serde_json::Map::new();
        input.insert("id".into(), json!("Widget"));
        let out = registry.model_for("schema").mangle_in(input);
        assert_eq!(out["id"], json!("widget"));
        assert_eq!(out["_id"], json!("Widget"));
    }

    #[test]
    fn hooks_fire() {
        let count = Arc::new(AtomicUsize::new(0));
        let seen = Arc::clone(&count);
        let model = ModelDescriptor::new("widget").on_added(move |_| {
            seen.fetch_add(1, Ordering::SeqCst);
        });
        model.notify_added(&Entity::from_json(serde_json::Map::new()));
        model.notify_removed(&Entity::from_json(serde_json::Map::new()));
        assert_eq!(count.load(Ordering::SeqCst), 1);
    }
}
