// ── Entities ──
//
// Typed, mutable records handed out by the store. An `Entity` is a handle:
// clones share one field map, so a refresh applied by the store is seen by
// every holder.

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

use indexmap::IndexMap;

use super::type_key::{TypeKey, normalize_opt};
use super::value::Value;

/// Field name → value, in arrival order.
pub type Fields = IndexMap<String, Value>;

/// A shared, typed record.
///
/// Equality is identity: two `Entity` values are equal only when they are
/// handles to the same instance.
#[derive(Clone)]
pub struct Entity {
    inner: Arc<EntityInner>,
}

struct EntityInner {
    fields: RwLock<Fields>,
    /// Bumped on every mutation.
    revision: AtomicU64,
}

impl Entity {
    pub fn new(fields: Fields) -> Self {
        Self {
            inner: Arc::new(EntityInner {
                fields: RwLock::new(fields),
                revision: AtomicU64::new(0),
            }),
        }
    }

    /// Wrap a decoded JSON object without typeifying nested values.
    pub fn from_json(map: serde_json::Map<String, serde_json::Value>) -> Self {
        Self::new(map.into_iter().map(|(k, v)| (k, Value::Json(v))).collect())
    }

    /// `true` when both handles refer to the same instance.
    pub fn ptr_eq(a: &Self, b: &Self) -> bool {
        Arc::ptr_eq(&a.inner, &b.inner)
    }

    pub(crate) fn addr(&self) -> usize {
        Arc::as_ptr(&self.inner) as usize
    }

    pub fn revision(&self) -> u64 {
        self.inner.revision.load(Ordering::Acquire)
    }

    fn read(&self) -> RwLockReadGuard<'_, Fields> {
        self.inner
            .fields
            .read()
            .unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> RwLockWriteGuard<'_, Fields> {
        self.inner.revision.fetch_add(1, Ordering::AcqRel);
        self.inner
            .fields
            .write()
            .unwrap_or_else(PoisonError::into_inner)
    }

    // ── Identity ─────────────────────────────────────────────────────

    /// Normalized `type` field (empty when absent).
    pub fn type_key(&self) -> TypeKey {
        normalize_opt(self.get_str("type").as_deref())
    }

    /// Normalized `baseType` field (empty when absent).
    pub fn base_type(&self) -> TypeKey {
        normalize_opt(self.get_str("baseType").as_deref())
    }

    /// The record id. Numeric ids are rendered as strings; empty ids count as absent.
    pub fn id(&self) -> Option<String> {
        let fields = self.read();
        match fields.get("id")?.as_json()? {
            serde_json::Value::String(s) if !s.is_empty() => Some(s.clone()),
            serde_json::Value::Number(n) => Some(n.to_string()),
            _ => None,
        }
    }

    // ── Field access ─────────────────────────────────────────────────

    pub fn get(&self, field: &str) -> Option<Value> {
        self.read().get(field).cloned()
    }

    pub fn get_str(&self, field: &str) -> Option<String> {
        self.read()
            .get(field)
            .and_then(Value::as_str)
            .map(str::to_owned)
    }

    pub fn contains(&self, field: &str) -> bool {
        self.read().contains_key(field)
    }

    pub fn set(&self, field: impl Into<String>, value: impl Into<Value>) {
        self.write().insert(field.into(), value.into());
    }

    pub fn remove(&self, field: &str) -> Option<Value> {
        self.write().shift_remove(field)
    }

    pub fn keys(&self) -> Vec<String> {
        self.read().keys().cloned().collect()
    }

    /// Snapshot of every field.
    pub fn fields(&self) -> Fields {
        self.read().clone()
    }

    /// Run `f` against the live field map without cloning it.
    pub fn with_fields<R>(&self, f: impl FnOnce(&Fields) -> R) -> R {
        f(&self.read())
    }

    // ── Links, actions, pagination ───────────────────────────────────

    fn meta_entry(&self, map: &str, name: &str) -> Option<String> {
        let fields = self.read();
        fields
            .get(map)?
            .as_json()?
            .get(name)?
            .as_str()
            .filter(|s| !s.is_empty())
            .map(str::to_owned)
    }

    pub fn link_for(&self, name: &str) -> Option<String> {
        self.meta_entry("links", name)
    }

    pub fn has_link(&self, name: &str) -> bool {
        self.link_for(name).is_some()
    }

    pub fn action_for(&self, name: &str) -> Option<String> {
        self.meta_entry("actions", name)
    }

    pub fn has_action(&self, name: &str) -> bool {
        self.action_for(name).is_some()
    }

    pub fn page_for(&self, name: &str) -> Option<String> {
        self.meta_entry("pagination", name)
    }

    // ── Reconciliation ───────────────────────────────────────────────

    /// Overwrite this record's content with `source`'s.
    ///
    /// Fields present on `source` are copied; fields missing from it are
    /// cleared unless they name one of the (new) links.
    pub fn replace_with(&self, source: &Entity) {
        if Self::ptr_eq(self, source) {
            return;
        }
        let incoming = source.fields();
        let mut fields = self.write();
        for (k, v) in &incoming {
            fields.insert(k.clone(), v.clone());
        }
        let links = link_names(&fields);
        fields.retain(|k, _| incoming.contains_key(k) || links.iter().any(|l| l == k));
    }

    /// Copy every field of `source` onto this record.
    ///
    /// With `union_arrays`, sequence fields present on both sides keep their
    /// existing elements and gain the new ones not already present.
    pub fn merge(&self, source: &Entity, union_arrays: bool) {
        if Self::ptr_eq(self, source) {
            return;
        }
        let incoming = source.fields();
        let mut fields = self.write();
        for (k, v) in incoming {
            let merged = if union_arrays {
                fields.get(&k).and_then(|cur| union(cur, &v))
            } else {
                None
            };
            fields.insert(k, merged.unwrap_or(v));
        }
    }
}

fn link_names(fields: &Fields) -> Vec<String> {
    fields
        .get("links")
        .and_then(Value::as_json)
        .and_then(serde_json::Value::as_object)
        .map(|links| {
            links
                .iter()
                .filter(|(_, v)| v.as_str().is_some_and(|s| !s.is_empty()))
                .map(|(k, _)| k.clone())
                .collect()
        })
        .unwrap_or_default()
}

fn union(current: &Value, incoming: &Value) -> Option<Value> {
    let mut out = current.sequence_items()?;
    for item in incoming.sequence_items()? {
        if !out.contains(&item) {
            out.push(item);
        }
    }
    Some(Value::List(out))
}

impl PartialEq for Entity {
    fn eq(&self, other: &Self) -> bool {
        Self::ptr_eq(self, other)
    }
}

impl Eq for Entity {}

impl fmt::Debug for Entity {
    // Fields can reference other entities (or this one), so only identity is printed.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Entity")
            .field("type", &self.type_key().as_str())
            .field("id", &self.id())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use serde_json::json;

    fn entity(v: serde_json::Value) -> Entity {
        match v {
            serde_json::Value::Object(map) => Entity::from_json(map),
            _ => panic!("not an object"),
        }
    }

    #[test]
    fn identity_accessors() {
        let e = entity(json!({"type": "Dog", "baseType": "Animal", "id": 7}));
        assert_eq!(e.type_key(), "dog");
        assert_eq!(e.base_type(), "animal");
        assert_eq!(e.id().as_deref(), Some("7"));
    }

    #[test]
    fn empty_id_is_absent() {
        let e = entity(json!({"type": "widget", "id": ""}));
        assert!(e.id().is_none());
    }

    #[test]
    fn clones_share_state() {
        let a = entity(json!({"type": "widget"}));
        let b = a.clone();
        b.set("name", "gear");
        assert_eq!(a.get_str("name").as_deref(), Some("gear"));
        assert_eq!(a, b);
        assert_ne!(a, entity(json!({"type": "widget"})));
    }

    #[test]
    fn replace_with_clears_missing_fields_but_keeps_links() {
        let target = entity(json!({
            "type": "widget",
            "id": "1",
            "name": "old",
            "stale": true,
            "links": {"self": "/v1/widgets/1", "parts": "/v1/widgets/1/parts"},
            "parts": ["a"]
        }));
        let source = entity(json!({
            "type": "widget",
            "id": "1",
            "name": "new",
            "links": {"self": "/v1/widgets/1", "parts": "/v1/widgets/1/parts"}
        }));

        target.replace_with(&source);

        assert_eq!(target.get_str("name").as_deref(), Some("new"));
        assert!(!target.contains("stale"));
        assert!(target.contains("parts"), "link-named field survives");
    }

    #[test]
    fn replace_with_self_is_noop() {
        let e = entity(json!({"type": "widget", "id": "1"}));
        e.replace_with(&e.clone());
        assert_eq!(e.id().as_deref(), Some("1"));
    }

    #[test]
    fn merge_unions_arrays() {
        let target = entity(json!({"type": "widget", "tags": ["a", "b"], "keep": 1}));
        let source = entity(json!({"tags": ["b", "c"], "name": "n"}));

        target.merge(&source, true);

        assert_eq!(
            target.get("tags").unwrap(),
            Value::List(vec!["a".into(), "b".into(), "c".into()])
        );
        assert!(target.contains("keep"));
        assert_eq!(target.get_str("name").as_deref(), Some("n"));
    }

    #[test]
    fn merge_without_union_overwrites() {
        let target = entity(json!({"tags": ["a"]}));
        target.merge(&entity(json!({"tags": ["z"]})), false);
        assert_eq!(target.get("tags").unwrap(), Value::Json(json!(["z"])));
    }

    #[test]
    fn links_and_actions() {
        let e = entity(json!({
            "links": {"self": "/v1/widgets/1", "empty": ""},
            "actions": {"restart": "/v1/widgets/1?action=restart"},
            "pagination": {"next": "/v1/widgets?marker=2"}
        }));
        assert!(e.has_link("self"));
        assert!(!e.has_link("empty"));
        assert!(e.has_action("restart"));
        assert_eq!(e.page_for("next").as_deref(), Some("/v1/widgets?marker=2"));
    }

    #[test]
    fn mutations_bump_revision() {
        let e = entity(json!({}));
        let before = e.revision();
        e.set("a", 1_i64);
        assert!(e.revision() > before);
    }
}
