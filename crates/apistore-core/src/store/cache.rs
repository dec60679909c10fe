// ── Identity cache ──
//
// Per-type partitions holding the one live instance of every `(type, id)`
// seen so far. Partitions are created lazily and never replaced, so a
// `Group` handed out once keeps observing the partition across resets.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use dashmap::DashMap;
use tokio::sync::watch;
use tracing::warn;

use crate::model::{Entity, TypeKey};

#[derive(Default)]
struct Partition {
    /// Arrival order.
    members: Vec<Entity>,
    by_id: HashMap<String, Entity>,
}

impl Partition {
    fn clear(&mut self) {
        self.members.clear();
        self.by_id.clear();
    }
}

/// A live view of every cached record of one type, in arrival order.
///
/// Cloning is cheap and clones observe the same partition.
#[derive(Clone, Default)]
pub struct Group(Arc<Mutex<Partition>>);

impl Group {
    fn lock(&self) -> MutexGuard<'_, Partition> {
        self.0.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Current members.
    pub fn snapshot(&self) -> Vec<Entity> {
        self.lock().members.clone()
    }

    pub fn len(&self) -> usize {
        self.lock().members.len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().members.is_empty()
    }

    /// `true` if this exact instance is a member.
    pub fn contains(&self, entity: &Entity) -> bool {
        self.lock().members.iter().any(|m| Entity::ptr_eq(m, entity))
    }

    pub fn get(&self, id: &str) -> Option<Entity> {
        self.lock().by_id.get(id).cloned()
    }

    /// `true` when both handles view the same partition.
    pub fn ptr_eq(a: &Self, b: &Self) -> bool {
        Arc::ptr_eq(&a.0, &b.0)
    }
}

impl std::fmt::Debug for Group {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Group").field("len", &self.len()).finish()
    }
}

/// What `IdentityCache::add` did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Added {
    /// Appended as a new member.
    Inserted,
    /// Took the place of a different instance with the same id.
    Replaced,
    /// This instance was already the representative.
    Present,
    /// No id; nothing was stored.
    Refused,
}

pub(crate) struct IdentityCache {
    partitions: DashMap<TypeKey, Group>,
    found_all: DashMap<TypeKey, bool>,
    generation: watch::Sender<u64>,
}

impl IdentityCache {
    pub(crate) fn new() -> Self {
        let (generation, _) = watch::channel(0u64);
        Self {
            partitions: DashMap::new(),
            found_all: DashMap::new(),
            generation,
        }
    }

    /// The live partition for `type_key`, created on first use.
    pub(crate) fn group(&self, type_key: &TypeKey) -> Group {
        // Clone the handle out so the shard lock is released before locking the partition.
        self.partitions
            .entry(type_key.clone())
            .or_default()
            .value()
            .clone()
    }

    pub(crate) fn add(&self, type_key: &TypeKey, entity: &Entity) -> Added {
        let Some(id) = entity.id() else {
            warn!(type_name = %type_key, "refusing to cache a record without an id");
            return Added::Refused;
        };

        let group = self.group(type_key);
        let mut partition = group.lock();
        match partition.by_id.get(&id).cloned() {
            Some(existing) if Entity::ptr_eq(&existing, entity) => Added::Present,
            Some(stale) => {
                match partition
                    .members
                    .iter()
                    .position(|m| Entity::ptr_eq(m, &stale))
                {
                    Some(pos) => partition.members[pos] = entity.clone(),
                    None => partition.members.push(entity.clone()),
                }
                partition.by_id.insert(id, entity.clone());
                Added::Replaced
            }
            None => {
                partition.members.push(entity.clone());
                partition.by_id.insert(id, entity.clone());
                Added::Inserted
            }
        }
    }

    /// Remove this exact instance from one partition. Returns whether it was there.
    pub(crate) fn remove(&self, type_key: &TypeKey, entity: &Entity) -> bool {
        let group = self.group(type_key);
        let mut partition = group.lock();
        let before = partition.members.len();
        partition.members.retain(|m| !Entity::ptr_eq(m, entity));
        let removed = partition.members.len() != before;

        let mapped = entity.id().filter(|id| {
            partition
                .by_id
                .get(id)
                .is_some_and(|m| Entity::ptr_eq(m, entity))
        });
        match mapped {
            Some(id) => {
                partition.by_id.remove(&id);
                true
            }
            None => removed,
        }
    }

    pub(crate) fn get_by_id(&self, type_key: &TypeKey, id: &str) -> Option<Entity> {
        let group = self.partitions.get(type_key)?.value().clone();
        group.get(id)
    }

    pub(crate) fn have_all(&self, type_key: &TypeKey) -> bool {
        self.found_all.get(type_key).is_some_and(|v| *v.value())
    }

    pub(crate) fn set_have_all(&self, type_key: &TypeKey, value: bool) {
        self.found_all.insert(type_key.clone(), value);
    }

    /// Empty every partition in place and forget every "have all" flag.
    pub(crate) fn reset(&self) {
        let groups: Vec<Group> = self.partitions.iter().map(|g| g.value().clone()).collect();
        for group in groups {
            group.lock().clear();
        }
        for mut flag in self.found_all.iter_mut() {
            *flag.value_mut() = false;
        }
        self.generation.send_modify(|g| *g += 1);
    }

    pub(crate) fn reset_type(&self, type_key: &TypeKey) {
        self.set_have_all(type_key, false);
        self.group(type_key).lock().clear();
    }

    pub(crate) fn generation(&self) -> u64 {
        *self.generation.borrow()
    }

    pub(crate) fn subscribe_generation(&self) -> watch::Receiver<u64> {
        self.generation.subscribe()
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use serde_json::json;

    fn entity(v: serde_json::Value) -> Entity {
        let serde_json::Value::Object(map) = v else {
            panic!("not an object")
        };
        Entity::from_json(map)
    }

    fn widget() -> TypeKey {
        TypeKey::new("widget")
    }

    #[test]
    fn group_is_the_same_live_container() {
        let cache = IdentityCache::new();
        let a = cache.group(&widget());
        let b = cache.group(&widget());
        assert!(Group::ptr_eq(&a, &b));

        cache.add(&widget(), &entity(json!({"type": "widget", "id": "1"})));
        assert_eq!(a.len(), 1);
    }

    #[test]
    fn add_requires_an_id() {
        let cache = IdentityCache::new();
        let e = entity(json!({"type": "widget"}));
        assert_eq!(cache.add(&widget(), &e), Added::Refused);
        assert!(cache.group(&widget()).is_empty());
    }

    #[test]
    fn re_adding_is_a_noop_and_replacing_keeps_one_representative() {
        let cache = IdentityCache::new();
        let first = entity(json!({"type": "widget", "id": "1"}));
        let second = entity(json!({"type": "widget", "id": "1"}));

        assert_eq!(cache.add(&widget(), &first), Added::Inserted);
        assert_eq!(cache.add(&widget(), &first), Added::Present);
        assert_eq!(cache.add(&widget(), &second), Added::Replaced);

        let group = cache.group(&widget());
        assert_eq!(group.len(), 1);
        assert!(group.contains(&second));
        assert!(Entity::ptr_eq(
            &cache.get_by_id(&widget(), "1").unwrap(),
            &second
        ));
    }

    #[test]
    fn remove_is_by_identity() {
        let cache = IdentityCache::new();
        let cached = entity(json!({"type": "widget", "id": "1"}));
        let lookalike = entity(json!({"type": "widget", "id": "1"}));
        cache.add(&widget(), &cached);

        assert!(!cache.remove(&widget(), &lookalike));
        assert!(cache.get_by_id(&widget(), "1").is_some());
        assert!(cache.remove(&widget(), &cached));
        assert!(cache.get_by_id(&widget(), "1").is_none());
    }

    #[test]
    fn reset_clears_in_place_and_bumps_generation() {
        let cache = IdentityCache::new();
        let group = cache.group(&widget());
        cache.add(&widget(), &entity(json!({"type": "widget", "id": "1"})));
        cache.set_have_all(&widget(), true);
        let before = cache.generation();

        cache.reset();

        assert!(group.is_empty());
        assert!(!cache.have_all(&widget()));
        assert_eq!(cache.generation(), before + 1);
        assert!(Group::ptr_eq(&group, &cache.group(&widget())));
    }

    #[test]
    fn reset_type_is_scoped() {
        let cache = IdentityCache::new();
        let gadget = TypeKey::new("gadget");
        cache.add(&widget(), &entity(json!({"type": "widget", "id": "1"})));
        cache.add(&gadget, &entity(json!({"type": "gadget", "id": "1"})));
        cache.set_have_all(&widget(), true);

        cache.reset_type(&widget());

        assert!(cache.group(&widget()).is_empty());
        assert!(!cache.have_all(&widget()));
        assert_eq!(cache.group(&gadget).len(), 1);
    }
}
