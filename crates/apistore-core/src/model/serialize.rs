// ── Serialization back to JSON ──
//
// Entities can reference each other (and themselves) through the cache,
// so the walk tracks the entities on the current path and fails on a
// revisit or when nesting exceeds `MAX_SERIALIZE_DEPTH`.

use crate::error::StoreError;

use super::entity::Entity;
use super::value::Value;

pub const MAX_SERIALIZE_DEPTH: usize = 32;

/// Which top-level fields of an entity to write.
#[derive(Debug, Clone, Copy, Default)]
pub struct FieldFilter<'a> {
    /// Only these fields, when set.
    pub allow: Option<&'a [String]>,
    /// Never these fields.
    pub exclude: &'a [&'a str],
}

impl FieldFilter<'_> {
    fn keeps(&self, field: &str) -> bool {
        // Underscore fields are store bookkeeping (e.g. a schema's raw `_id`).
        !field.starts_with('_')
            && !self.exclude.contains(&field)
            && self.allow.is_none_or(|allow| allow.iter().any(|a| a == field))
    }
}

/// Serialize any value. Nested entities write all their non-underscore fields.
pub fn to_json(value: &Value) -> Result<serde_json::Value, StoreError> {
    Walker::default().value(value, 0)
}

/// Serialize an entity, applying `filter` to its own top-level fields.
pub fn entity_to_json(
    entity: &Entity,
    filter: FieldFilter<'_>,
) -> Result<serde_json::Value, StoreError> {
    Walker::default().entity(entity, filter, 0)
}

#[derive(Default)]
struct Walker {
    path: Vec<usize>,
}

impl Walker {
    fn value(&mut self, value: &Value, depth: usize) -> Result<serde_json::Value, StoreError> {
        if depth > MAX_SERIALIZE_DEPTH {
            return Err(StoreError::CycleOrDepthExceeded { depth });
        }
        match value {
            Value::Json(v) => Ok(v.clone()),
            Value::Entity(e) => self.entity(e, FieldFilter::default(), depth),
            Value::List(items) => items
                .iter()
                .map(|item| self.value(item, depth + 1))
                .collect::<Result<Vec<_>, _>>()
                .map(serde_json::Value::Array),
            Value::Collection(c) => c
                .content()
                .iter()
                .map(|item| self.value(item, depth + 1))
                .collect::<Result<Vec<_>, _>>()
                .map(serde_json::Value::Array),
        }
    }

    fn entity(
        &mut self,
        entity: &Entity,
        filter: FieldFilter<'_>,
        depth: usize,
    ) -> Result<serde_json::Value, StoreError> {
        if depth > MAX_SERIALIZE_DEPTH || self.path.contains(&entity.addr()) {
            return Err(StoreError::CycleOrDepthExceeded { depth });
        }
        self.path.push(entity.addr());

        let fields = entity.fields();
        let mut out = serde_json::Map::new();
        for (k, v) in fields.iter().filter(|(k, _)| filter.keeps(k)) {
            out.insert(k.clone(), self.value(v, depth + 1)?);
        }

        self.path.pop();
        Ok(serde_json::Value::Object(out))
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

    #[test]
    fn nested_entities_are_flattened() {
        let trim = entity(json!({"type": "trim", "color": "red"}));
        let widget = entity(json!({"type": "widget", "id": "1", "_id": "W1"}));
        widget.set("trim", trim);
        widget.set("parts", Value::List(vec![Value::from("a")]));

        let out = to_json(&Value::Entity(widget)).unwrap();
        assert_eq!(
            out,
            json!({
                "type": "widget",
                "id": "1",
                "trim": {"type": "trim", "color": "red"},
                "parts": ["a"]
            })
        );
    }

    #[test]
    fn filter_applies_to_top_level_only() {
        let widget = entity(json!({
            "type": "widget",
            "name": "gear",
            "links": {"self": "/x"},
            "secret": 1
        }));
        let allow = vec!["type".to_owned(), "name".to_owned(), "links".to_owned()];
        let out = entity_to_json(
            &widget,
            FieldFilter {
                allow: Some(&allow),
                exclude: &["links"],
            },
        )
        .unwrap();
        assert_eq!(out, json!({"type": "widget", "name": "gear"}));
    }

    #[test]
    fn cycles_are_rejected() {
        let a = entity(json!({"type": "node"}));
        let b = entity(json!({"type": "node"}));
        a.set("next", b.clone());
        b.set("next", a.clone());

        let err = to_json(&Value::Entity(a)).unwrap_err();
        assert!(matches!(err, StoreError::CycleOrDepthExceeded { .. }));
    }

    #[test]
    fn shared_non_cyclic_references_are_fine() {
        let shared = entity(json!({"type": "tag", "name": "t"}));
        let holder = entity(json!({"type": "widget"}));
        holder.set(
            "tags",
            Value::List(vec![Value::Entity(shared.clone()), Value::Entity(shared)]),
        );
        let out = to_json(&Value::Entity(holder)).unwrap();
        assert_eq!(out["tags"].as_array().unwrap().len(), 2);
    }

    #[test]
    fn depth_is_bounded() {
        let mut value = Value::from("leaf");
        for _ in 0..=MAX_SERIALIZE_DEPTH + 1 {
            value = Value::List(vec![value]);
        }
        assert!(matches!(
            to_json(&value),
            Err(StoreError::CycleOrDepthExceeded { .. })
        ));
    }
}
