// ── Typeification ──
//
// Turns decoded JSON into entities and collections, consulting the cached
// schema for defaults and nested typed fields, and folds every typed record
// with an id into the identity cache.

use crate::error::StoreError;
use crate::model::{Collection, Entity, Fields, TypeKey, Value, normalize_type};
use crate::options::RecordOptions;

use super::Store;

/// Nesting beyond this depth is treated as a cycle.
pub const MAX_TYPEIFY_DEPTH: usize = 64;

type JsonMap = serde_json::Map<String, serde_json::Value>;

impl Store {
    /// Convert a raw payload into typed values.
    ///
    /// Scalars and untyped objects pass through unchanged; arrays are mapped
    /// element-wise; `collection` envelopes become [`Collection`]s; any other
    /// typed object becomes an [`Entity`], deduplicated against the cache.
    pub fn typeify(
        &self,
        raw: serde_json::Value,
        options: &RecordOptions,
    ) -> Result<Value, StoreError> {
        self.typeify_at(raw, options, 0)
    }

    /// Build a record from `data` without consulting the cache for an
    /// existing instance.
    ///
    /// # Errors
    ///
    /// `MissingType` when neither `options.type_override` nor `data.type` names a type.
    pub fn create_record(
        &self,
        data: JsonMap,
        options: &RecordOptions,
    ) -> Result<Entity, StoreError> {
        self.create_record_at(data, options, 0)
    }

    /// Build a collection from an envelope, typeifying each member of the
    /// data key and copying the configured meta keys.
    pub fn create_collection(
        &self,
        input: JsonMap,
        options: &RecordOptions,
    ) -> Result<Collection, StoreError> {
        self.create_collection_at(input, options, 0)
    }

    fn typeify_at(
        &self,
        raw: serde_json::Value,
        options: &RecordOptions,
        depth: usize,
    ) -> Result<Value, StoreError> {
        if depth > MAX_TYPEIFY_DEPTH {
            return Err(StoreError::CycleOrDepthExceeded { depth });
        }

        let map = match raw {
            serde_json::Value::Array(items) => {
                return items
                    .into_iter()
                    .map(|item| self.typeify_at(item, options, depth + 1))
                    .collect::<Result<Vec<_>, _>>()
                    .map(Value::List);
            }
            serde_json::Value::Object(map) => map,
            scalar => return Ok(Value::Json(scalar)),
        };

        let type_key = normalize_type(map.get("type").and_then(serde_json::Value::as_str).unwrap_or_default());
        if type_key == TypeKey::COLLECTION {
            return self
                .create_collection_at(map, options, depth)
                .map(Value::Collection);
        }
        if type_key.is_empty() {
            return Ok(Value::Json(serde_json::Value::Object(map)));
        }

        // Nested values never inherit a caller's type override.
        let nested = RecordOptions {
            type_override: None,
            ..options.clone()
        };
        let record = self.create_record_at(map, &nested, depth)?;
        let Some(id) = record.id() else {
            return Ok(Value::Entity(record));
        };
        if !options.update_store {
            return Ok(Value::Entity(record));
        }

        // After create_record, so mangle_in can change the base type.
        let base = Some(record.base_type()).filter(|b| !b.is_empty() && *b != type_key);

        if let Some(existing) = self.inner.cache.get_by_id(&type_key, &id) {
            existing.replace_with(&record);
            if let Some(base) = &base {
                self.cache_add(base, &existing);
            }
            return Ok(Value::Entity(existing));
        }

        self.cache_add(&type_key, &record);
        if let Some(base) = &base {
            self.cache_add(base, &record);
        }
        Ok(Value::Entity(record))
    }

    fn create_record_at(
        &self,
        mut data: JsonMap,
        options: &RecordOptions,
        depth: usize,
    ) -> Result<Entity, StoreError> {
        let type_key = match &options.type_override {
            Some(t) => normalize_type(t),
            None => normalize_type(data.get("type").and_then(serde_json::Value::as_str).unwrap_or_default()),
        };
        if type_key.is_empty() {
            return Err(StoreError::MissingType {
                operation: "create_record",
            });
        }
        if let Some(t) = &options.type_override {
            data.entry("type").or_insert_with(|| t.clone().into());
        }

        let schema = self.schema_for(&type_key);
        if options.apply_defaults {
            if let Some(schema) = &schema {
                schema.apply_create_defaults(&mut data);
            }
        }

        let data = self.model_for(&type_key).mangle_in(data);

        let typeify_fields = schema.as_ref().map(|s| s.typeify_fields()).unwrap_or_default();
        let mut fields = Fields::with_capacity(data.len());
        for (name, raw) in data {
            let value = if typeify_fields.contains(&name) && Value::Json(raw.clone()).is_truthy() {
                self.typeify_at(raw, options, depth + 1)?
            } else {
                Value::Json(raw)
            };
            fields.insert(name, value);
        }
        Ok(Entity::new(fields))
    }

    fn create_collection_at(
        &self,
        mut input: JsonMap,
        options: &RecordOptions,
        depth: usize,
    ) -> Result<Collection, StoreError> {
        let content = match input.remove(options.data_key()) {
            Some(serde_json::Value::Array(items)) => items
                .into_iter()
                .map(|item| self.typeify_at(item, options, depth + 1))
                .collect::<Result<Vec<_>, _>>()?,
            Some(serde_json::Value::Null) | None => Vec::new(),
            Some(other) => vec![self.typeify_at(other, options, depth + 1)?],
        };

        let mut collection = Collection::new(content);
        for key in &self.inner.config.meta_keys {
            if let Some(value) = input.remove(key) {
                collection.set_meta(key.clone(), value);
            }
        }
        Ok(collection)
    }
}
