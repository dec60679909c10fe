// ── Field values ──
//
// What typeification produces: raw JSON for untyped data, shared handles
// for typed records, and collections or lists of either.

use super::collection::Collection;
use super::entity::Entity;

/// A typeified value.
#[derive(Debug, Clone)]
pub enum Value {
    /// Scalars and untyped objects/arrays, kept exactly as decoded.
    Json(serde_json::Value),
    /// A typed record. Shared: clones point at the same instance.
    Entity(Entity),
    Collection(Collection),
    /// An array whose elements were typeified individually.
    List(Vec<Value>),
}

impl Value {
    pub fn null() -> Self {
        Self::Json(serde_json::Value::Null)
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Self::Json(serde_json::Value::Null))
    }

    pub fn as_json(&self) -> Option<&serde_json::Value> {
        match self {
            Self::Json(v) => Some(v),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        self.as_json().and_then(serde_json::Value::as_str)
    }

    pub fn as_entity(&self) -> Option<&Entity> {
        match self {
            Self::Entity(e) => Some(e),
            _ => None,
        }
    }

    pub fn into_entity(self) -> Option<Entity> {
        match self {
            Self::Entity(e) => Some(e),
            _ => None,
        }
    }

    pub fn as_collection(&self) -> Option<&Collection> {
        match self {
            Self::Collection(c) => Some(c),
            _ => None,
        }
    }

    pub fn into_collection(self) -> Option<Collection> {
        match self {
            Self::Collection(c) => Some(c),
            _ => None,
        }
    }

    pub fn as_list(&self) -> Option<&[Value]> {
        match self {
            Self::List(items) => Some(items),
            _ => None,
        }
    }

    /// Elements of a sequence value, whether typeified (`List`) or raw JSON.
    pub(crate) fn sequence_items(&self) -> Option<Vec<Value>> {
        match self {
            Self::List(items) => Some(items.clone()),
            Self::Json(serde_json::Value::Array(items)) => {
                Some(items.iter().cloned().map(Value::Json).collect())
            }
            _ => None,
        }
    }

    /// Truthiness in the payload sense: absent, null, `false`, `0` and `""` are falsy.
    pub(crate) fn is_truthy(&self) -> bool {
        match self {
            Self::Json(v) => match v {
                serde_json::Value::Null => false,
                serde_json::Value::Bool(b) => *b,
                serde_json::Value::Number(n) => n.as_f64().is_some_and(|f| f.abs() > f64::EPSILON),
                serde_json::Value::String(s) => !s.is_empty(),
                _ => true,
            },
            _ => true,
        }
    }
}

impl PartialEq for Value {
    /// Entities compare by identity, everything else structurally.
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Self::Json(a), Self::Json(b)) => a == b,
            (Self::Entity(a), Self::Entity(b)) => Entity::ptr_eq(a, b),
            (Self::Collection(a), Self::Collection(b)) => a == b,
            (Self::List(a), Self::List(b)) => a == b,
            _ => false,
        }
    }
}

impl From<serde_json::Value> for Value {
    fn from(v: serde_json::Value) -> Self {
        Self::Json(v)
    }
}

impl From<Entity> for Value {
    fn from(e: Entity) -> Self {
        Self::Entity(e)
    }
}

impl From<Collection> for Value {
    fn from(c: Collection) -> Self {
        Self::Collection(c)
    }
}

impl From<Vec<Value>> for Value {
    fn from(items: Vec<Value>) -> Self {
        Self::List(items)
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Self::Json(serde_json::Value::String(s.to_owned()))
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Self::Json(serde_json::Value::String(s))
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Self::Json(serde_json::Value::Bool(b))
    }
}

impl From<i64> for Value {
    fn from(n: i64) -> Self {
        Self::Json(serde_json::Value::from(n))
    }
}
