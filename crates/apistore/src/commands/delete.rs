//! `delete` command.

use apistore_core::{DeleteOptions, FindOptions, Store};

use crate::cli::GlobalOpts;
use crate::error::CliError;
use crate::output;

pub async fn handle(
    store: &Store,
    type_name: &str,
    id: &str,
    global: &GlobalOpts,
) -> Result<(), CliError> {
    let found = store.find(type_name, Some(id), FindOptions::default()).await?;
    let Some(record) = found.into_entity() else {
        return Err(CliError::NotFound {
            what: format!("{type_name} '{id}'"),
        });
    };

    let value = store.delete(&record, DeleteOptions::default()).await?;
    tracing::info!(type_name, id, "deleted");
    if value.is_null() {
        return Ok(());
    }
    output::print_output(&output::render(&value, global.compact)?)
}
