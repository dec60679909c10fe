//! `schemas` and `schema` commands.

use apistore_core::{FindOptions, Store, Value};

use crate::cli::GlobalOpts;
use crate::error::CliError;
use crate::output;

/// Bootstrap every schema from the `schemas` collection and print their ids.
pub async fn list(store: &Store, global: &GlobalOpts) -> Result<(), CliError> {
    store
        .find("schema", None, FindOptions::new().url("schemas"))
        .await?;

    let mut ids: Vec<String> = store
        .all("schema")
        .snapshot()
        .iter()
        .filter_map(apistore_core::Entity::id)
        .collect();
    ids.sort_unstable();
    tracing::info!(count = ids.len(), "schemas loaded");

    let value = Value::from(serde_json::Value::from(ids));
    output::print_output(&output::render(&value, global.compact)?)
}

pub async fn show(store: &Store, type_name: &str, global: &GlobalOpts) -> Result<(), CliError> {
    let encoded: String = url::form_urlencoded::byte_serialize(type_name.as_bytes()).collect();
    let value = store
        .find(
            "schema",
            Some(type_name),
            FindOptions::new().url(format!("schemas/{encoded}")),
        )
        .await?;
    output::print_output(&output::render(&value, global.compact)?)
}
