// ── Schemas ──
//
// A schema arrives as an ordinary entity of type `schema`. `Schema` is the
// parsed view the typeifier and serializer consult; the store memoizes it
// per schema revision.

use indexmap::IndexMap;
use serde::Deserialize;
use tracing::warn;

use super::entity::Entity;
use super::type_key::{TypeKey, normalize_type};
use super::value::Value;

/// Field types that never need typeification.
const PRIMITIVE_FIELD_TYPES: &[&str] = &[
    "base64",
    "blob",
    "boolean",
    "certificate",
    "date",
    "dnslabel",
    "enum",
    "float",
    "hostname",
    "int",
    "json",
    "masked",
    "password",
    "string",
];

/// Fields every record serializes regardless of its schema.
const IDENTITY_FIELDS: &[&str] = &["id", "type", "baseType"];

/// One entry of a schema's `resourceFields`.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct FieldDef {
    #[serde(rename = "type", default)]
    pub kind: String,
    #[serde(default)]
    pub default: Option<serde_json::Value>,
    #[serde(default)]
    pub required: bool,
    #[serde(default)]
    pub nullable: bool,
    #[serde(default)]
    pub options: Vec<serde_json::Value>,
}

impl FieldDef {
    /// Whether values of this field hold nested typed objects.
    ///
    /// `array[x]` and `map[x]` unwrap to `x`; `reference[x]` fields hold ids.
    fn needs_typeify(&self) -> bool {
        let mut kind = self.kind.trim().to_lowercase();
        loop {
            if kind.starts_with("reference[") {
                return false;
            }
            let inner = ["array[", "map["]
                .iter()
                .find_map(|p| kind.strip_prefix(*p).and_then(|k| k.strip_suffix(']')))
                .map(str::to_owned);
            match inner {
                Some(inner) => kind = inner,
                None => break,
            }
        }
        !kind.is_empty() && !PRIMITIVE_FIELD_TYPES.contains(&kind.as_str())
    }
}

/// Parsed view of a `schema` entity.
#[derive(Debug, Clone)]
pub struct Schema {
    id: TypeKey,
    collection_link: Option<String>,
    fields: IndexMap<String, FieldDef>,
    typeify_fields: Vec<String>,
    serializable_fields: Vec<String>,
}

impl Schema {
    pub fn from_entity(entity: &Entity) -> Self {
        let id = normalize_type(entity.id().unwrap_or_default());
        let fields: IndexMap<String, FieldDef> = match entity.get("resourceFields") {
            Some(Value::Json(raw)) if !raw.is_null() => serde_json::from_value(raw)
                .unwrap_or_else(|e| {
                    warn!(schema = %id, error = %e, "unreadable resourceFields, ignoring");
                    IndexMap::new()
                }),
            _ => IndexMap::new(),
        };

        // Schemas describing schemas are never typeified further.
        let typeify_fields = if id == TypeKey::SCHEMA {
            Vec::new()
        } else {
            fields
                .iter()
                .filter(|(_, def)| def.needs_typeify())
                .map(|(name, _)| name.clone())
                .collect()
        };

        let mut serializable_fields: Vec<String> =
            IDENTITY_FIELDS.iter().map(|f| (*f).to_owned()).collect();
        for name in fields.keys() {
            if !serializable_fields.contains(name) {
                serializable_fields.push(name.clone());
            }
        }

        Self {
            id,
            collection_link: entity.link_for("collection"),
            fields,
            typeify_fields,
            serializable_fields,
        }
    }

    /// The type this schema describes.
    pub fn id(&self) -> &TypeKey {
        &self.id
    }

    pub fn collection_link(&self) -> Option<&str> {
        self.collection_link.as_deref()
    }

    pub fn fields(&self) -> &IndexMap<String, FieldDef> {
        &self.fields
    }

    pub fn field(&self, name: &str) -> Option<&FieldDef> {
        self.fields.get(name)
    }

    /// Fields whose values must be typeified recursively.
    pub fn typeify_fields(&self) -> &[String] {
        &self.typeify_fields
    }

    /// Fields written when serializing a record of this type.
    pub fn serializable_fields(&self) -> &[String] {
        &self.serializable_fields
    }

    pub fn is_required(&self, field: &str) -> bool {
        self.field(field).is_some_and(|f| f.required)
    }

    pub fn default_for(&self, field: &str) -> Option<&serde_json::Value> {
        self.field(field)?.default.as_ref()
    }

    pub fn options_for(&self, field: &str) -> &[serde_json::Value] {
        self.field(field).map_or(&[], |f| f.options.as_slice())
    }

    /// Fill fields missing from `data` with their schema defaults.
    pub fn apply_create_defaults(&self, data: &mut serde_json::Map<String, serde_json::Value>) {
        for (name, def) in &self.fields {
            let Some(default) = &def.default else {
                continue;
            };
            let missing = data.get(name).is_none_or(serde_json::Value::is_null);
            if missing {
                data.insert(name.clone(), default.clone());
            }
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use serde_json::json;

    fn schema(v: serde_json::Value) -> Schema {
        let serde_json::Value::Object(map) = v else {
            panic!("not an object")
        };
        Schema::from_entity(&Entity::from_json(map))
    }

    fn widget_schema() -> Schema {
        schema(json!({
            "type": "schema",
            "id": "Widget",
            "links": {"collection": "/v1/widgets"},
            "resourceFields": {
                "name": {"type": "string", "required": true},
                "size": {"type": "enum", "default": "small", "options": ["small", "large"]},
                "trim": {"type": "widgetTrim", "default": {"type": "widgetTrim", "color": "red"}},
                "parts": {"type": "array[part]"},
                "owner": {"type": "reference[user]"},
                "labels": {"type": "map[string]"}
            }
        }))
    }

    #[test]
    fn parses_identity_and_links() {
        let s = widget_schema();
        assert_eq!(s.id(), &normalize_type("widget"));
        assert_eq!(s.collection_link(), Some("/v1/widgets"));
    }

    #[test]
    fn typeify_fields_skip_primitives_and_references() {
        assert_eq!(widget_schema().typeify_fields(), ["trim", "parts"]);
    }

    #[test]
    fn field_helpers() {
        let s = widget_schema();
        assert!(s.is_required("name"));
        assert!(!s.is_required("size"));
        assert_eq!(s.default_for("size"), Some(&json!("small")));
        assert_eq!(s.options_for("size").len(), 2);
        assert!(s.options_for("missing").is_empty());
    }

    #[test]
    fn create_defaults_fill_only_missing() {
        let s = widget_schema();
        let mut data = serde_json::Map::new();
        data.insert("size".into(), json!("large"));
        s.apply_create_defaults(&mut data);

        assert_eq!(data["size"], json!("large"));
        assert_eq!(data["trim"]["color"], json!("red"));
        assert!(!data.contains_key("name"));
    }

    #[test]
    fn serializable_fields_include_identity() {
        let s = widget_schema();
        assert_eq!(&s.serializable_fields()[..3], ["id", "type", "baseType"]);
        assert!(s.serializable_fields().contains(&"labels".to_owned()));
    }

    #[test]
    fn schema_of_schema_has_no_typeify_fields() {
        let s = schema(json!({
            "type": "schema",
            "id": "schema",
            "resourceFields": {"resourceFields": {"type": "map[field]"}}
        }));
        assert!(s.typeify_fields().is_empty());
    }
}
