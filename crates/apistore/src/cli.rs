//! Clap derive structures for the `apistore` CLI.

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

// ── Top-Level CLI ────────────────────────────────────────────────────

/// apistore -- query schema-described REST APIs through a caching store
#[derive(Debug, Parser)]
#[command(
    name = "apistore",
    version,
    about = "Query schema-described REST APIs from the command line",
    propagate_version = true,
    subcommand_required = true,
    arg_required_else_help = true
)]
pub struct Cli {
    #[command(flatten)]
    pub global: GlobalOpts,

    #[command(subcommand)]
    pub command: Command,
}

// ── Global Options ───────────────────────────────────────────────────

#[derive(Debug, Args)]
pub struct GlobalOpts {
    /// Profile to use
    #[arg(long, short = 'p', env = "APISTORE_PROFILE", global = true)]
    pub profile: Option<String>,

    /// Config file (defaults to the platform config directory)
    #[arg(long, env = "APISTORE_CONFIG", global = true)]
    pub config: Option<PathBuf>,

    /// API origin (overrides the profile endpoint)
    #[arg(long, short = 'e', env = "APISTORE_ENDPOINT", global = true)]
    pub endpoint: Option<String>,

    /// Bearer token (overrides the profile token)
    #[arg(long, env = "APISTORE_TOKEN", global = true, hide_env_values = true)]
    pub token: Option<String>,

    /// Accept self-signed TLS certificates
    #[arg(long, short = 'k', global = true)]
    pub insecure: bool,

    /// Request timeout in seconds (0 disables it)
    #[arg(long, global = true)]
    pub timeout: Option<u64>,

    /// Print compact single-line JSON
    #[arg(long, global = true)]
    pub compact: bool,

    /// Increase verbosity (-v, -vv, -vvv)
    #[arg(long, short = 'v', action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,
}

// ── Commands ─────────────────────────────────────────────────────────

#[derive(Debug, Subcommand)]
pub enum Command {
    /// List records of a type, or fetch one by id
    #[command(alias = "get")]
    Find(FindArgs),

    /// List every schema the API publishes
    Schemas,

    /// Show the schema for one type
    Schema {
        /// Resource type
        type_name: String,
    },

    /// Delete a record
    #[command(alias = "rm")]
    Delete {
        /// Resource type
        type_name: String,
        /// Record id
        id: String,
    },
}

#[derive(Debug, Args)]
pub struct FindArgs {
    /// Resource type
    pub type_name: String,

    /// Record id (omit to list)
    pub id: Option<String>,

    /// Filter as key=value (repeatable; repeated keys are OR'd by the server)
    #[arg(long, short = 'f', value_parser = parse_key_val)]
    pub filter: Vec<(String, String)>,

    /// Relation to include (repeatable)
    #[arg(long, short = 'i')]
    pub include: Vec<String>,

    /// Page size
    #[arg(long, short = 'l')]
    pub limit: Option<usize>,

    /// Sort field
    #[arg(long)]
    pub sort: Option<String>,

    /// Sort descending
    #[arg(long, requires = "sort")]
    pub desc: bool,

    /// Return only the first page
    #[arg(long)]
    pub no_depaginate: bool,

    /// Bypass the cache
    #[arg(long)]
    pub force_reload: bool,
}

fn parse_key_val(raw: &str) -> Result<(String, String), String> {
    let (key, value) = raw
        .split_once('=')
        .ok_or_else(|| format!("expected key=value, got '{raw}'"))?;
    if key.is_empty() {
        return Err(format!("empty key in '{raw}'"));
    }
    Ok((key.to_owned(), value.to_owned()))
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn command_tree_is_consistent() {
        Cli::command().debug_assert();
    }

    #[test]
    fn filters_parse_as_pairs() {
        let cli = Cli::try_parse_from([
            "apistore", "find", "widget", "-f", "state=active", "-f", "name=a=b",
        ])
        .unwrap();
        let Command::Find(args) = cli.command else {
            panic!("expected find")
        };
        assert_eq!(
            args.filter,
            [
                ("state".to_owned(), "active".to_owned()),
                ("name".to_owned(), "a=b".to_owned())
            ]
        );
        assert!(args.id.is_none());
    }

    #[test]
    fn malformed_filter_is_rejected() {
        assert!(Cli::try_parse_from(["apistore", "find", "widget", "-f", "state"]).is_err());
        assert!(Cli::try_parse_from(["apistore", "find", "widget", "-f", "=x"]).is_err());
    }

    #[test]
    fn global_flags_follow_subcommands() {
        let cli =
            Cli::try_parse_from(["apistore", "schema", "widget", "-vv", "-p", "prod"]).unwrap();
        assert_eq!(cli.global.verbose, 2);
        assert_eq!(cli.global.profile.as_deref(), Some("prod"));
    }
}
