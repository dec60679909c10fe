//! `find` command.

use apistore_core::{FindOptions, Store};

use crate::cli::{FindArgs, GlobalOpts};
use crate::error::CliError;
use crate::output;

pub async fn handle(store: &Store, args: &FindArgs, global: &GlobalOpts) -> Result<(), CliError> {
    let options = find_options(args);
    let value = store
        .find(&args.type_name, args.id.as_deref(), options)
        .await?;
    output::print_output(&output::render(&value, global.compact)?)
}

/// Translate flags into `FindOptions`; a key given more than once becomes a
/// list filter.
fn find_options(args: &FindArgs) -> FindOptions {
    let mut options = FindOptions::new();
    for (key, value) in &args.filter {
        let merged = match options.filter.shift_remove(key) {
            None => serde_json::Value::String(value.clone()),
            Some(serde_json::Value::Array(mut values)) => {
                values.push(value.clone().into());
                serde_json::Value::Array(values)
            }
            Some(previous) => serde_json::Value::Array(vec![previous, value.clone().into()]),
        };
        options = options.filter(key.as_str(), merged);
    }
    for relation in &args.include {
        options = options.include(relation.as_str());
    }
    if let Some(limit) = args.limit {
        options = options.limit(limit);
    }
    if let Some(ref sort) = args.sort {
        options = options.sort_by(sort.as_str(), args.desc);
    }
    if args.no_depaginate {
        options = options.no_depaginate();
    }
    if args.force_reload {
        options = options.force_reload();
    }
    options
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::cli::{Cli, Command};
    use clap::Parser;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    fn args(argv: &[&str]) -> FindArgs {
        let cli = Cli::try_parse_from(argv).unwrap();
        let Command::Find(args) = cli.command else {
            panic!("expected find")
        };
        args
    }

    #[test]
    fn repeated_filters_become_lists() {
        let options = find_options(&args(&[
            "apistore", "find", "widget", "-f", "state=a", "-f", "state=b", "-f", "name=x",
        ]));
        assert_eq!(options.filter["state"], json!(["a", "b"]));
        assert_eq!(options.filter["name"], json!("x"));
    }

    #[test]
    fn flags_map_onto_options() {
        let options = find_options(&args(&[
            "apistore",
            "find",
            "widget",
            "--limit",
            "5",
            "--sort",
            "name",
            "--desc",
            "--no-depaginate",
            "--force-reload",
            "-i",
            "parts",
        ]));
        assert_eq!(options.limit, Some(5));
        assert_eq!(options.sort_by.as_deref(), Some("name"));
        assert!(options.descending);
        assert!(!options.depaginate);
        assert!(options.force_reload);
        assert_eq!(options.include, ["parts"]);
    }
}
