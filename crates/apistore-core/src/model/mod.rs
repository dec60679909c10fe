// ── Domain model ──
//
// Typed records, collections and schemas produced by the typeifier,
// plus the per-type model registry.

pub mod collection;
pub mod entity;
pub mod registry;
pub mod schema;
pub mod serialize;
pub mod type_key;
pub mod value;

pub use collection::{Collection, DEFAULT_META_KEYS, Paginatable};
pub use entity::{Entity, Fields};
pub use registry::{EntityHook, MangleIn, ModelDescriptor};
pub use schema::{FieldDef, Schema};
pub use serialize::{FieldFilter, MAX_SERIALIZE_DEPTH, entity_to_json, to_json};
pub use type_key::{TypeKey, normalize_opt, normalize_type};
pub use value::Value;
