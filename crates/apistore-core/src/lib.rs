//! Client-side resource cache and request coordinator for schema-described
//! REST APIs.
//!
//! - **[`Store`]**: Facade owning an identity map of typed records. Every
//!   `(type, id)` has exactly one live [`Entity`] instance; server responses
//!   refresh it in place. [`Store::find`] answers from the cache when it can
//!   and coalesces identical concurrent requests onto one network call.
//!
//! - **Typeification**: Raw JSON becomes [`Entity`] / [`Collection`] values
//!   according to the API's own `schema` records, which are fetched lazily
//!   and cached like any other record.
//!
//! - **Reconciliation**: [`Store::save`] folds a server-assigned identity
//!   back onto the caller's instance, so handles taken before the create
//!   stay valid.
//!
//! The network is reached through the [`apistore_api::Transport`] trait;
//! [`apistore_api::HttpTransport`] is the reqwest-backed default.

pub mod config;
pub mod error;
pub mod model;
pub mod options;
pub mod store;

// ── Primary re-exports ──────────────────────────────────────────────
pub use config::{DEFAULT_PAGE_SIZE, DEFAULT_TIMEOUT, StoreConfig};
pub use error::StoreError;
pub use options::{
    DeleteOptions, FindOptions, LinkOptions, RecordOptions, RequestOptions, SaveOptions,
};
pub use store::{Group, RequestHook, Store, StoreBuilder};

pub use model::{
    Collection, Entity, FieldDef, ModelDescriptor, Paginatable, Schema, TypeKey, Value,
    normalize_type,
};
