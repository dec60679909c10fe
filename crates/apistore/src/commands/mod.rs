//! Command dispatch: bridges CLI args -> store calls -> output formatting.

pub mod delete;
pub mod find;
pub mod schema;

use apistore_core::Store;

use crate::cli::{Command, GlobalOpts};
use crate::error::CliError;

/// Dispatch a command to the appropriate handler.
pub async fn dispatch(cmd: Command, store: &Store, global: &GlobalOpts) -> Result<(), CliError> {
    match cmd {
        Command::Find(args) => find::handle(store, &args, global).await,
        Command::Schemas => schema::list(store, global).await,
        Command::Schema { type_name } => schema::show(store, &type_name, global).await,
        Command::Delete { type_name, id } => delete::handle(store, &type_name, &id, global).await,
    }
}
