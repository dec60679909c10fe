//! CLI error types with miette diagnostics.
//!
//! Maps store and config errors into user-facing errors with help text and
//! process exit codes.

use miette::Diagnostic;
use thiserror::Error;

use apistore_config::ConfigError;
use apistore_core::StoreError;

pub mod exit_code {
    pub const GENERAL: i32 = 1;
    pub const USAGE: i32 = 2;
    pub const AUTH: i32 = 3;
    pub const NOT_FOUND: i32 = 4;
    pub const CONNECTION: i32 = 7;
    pub const TIMEOUT: i32 = 8;
}

#[derive(Debug, Error, Diagnostic)]
pub enum CliError {
    // ── Connection ───────────────────────────────────────────────────

    #[error("Could not reach the API: {message}")]
    #[diagnostic(
        code(apistore::connection_failed),
        help("Check the endpoint and network access, or use --insecure for self-signed certificates.")
    )]
    ConnectionFailed { message: String },

    #[error("Request timed out{after}: {method} {url}")]
    #[diagnostic(
        code(apistore::timeout),
        help("Increase the timeout with --timeout or check server responsiveness.")
    )]
    Timeout {
        after: String,
        method: String,
        url: String,
    },

    // ── Server responses ─────────────────────────────────────────────

    #[error("Authentication failed (HTTP {status})")]
    #[diagnostic(
        code(apistore::auth_failed),
        help("Set a token with --token, APISTORE_TOKEN, or token/token_env in your profile.")
    )]
    AuthFailed { status: u16 },

    #[error("{what} not found")]
    #[diagnostic(code(apistore::not_found), help("Run: apistore schemas to list known types"))]
    NotFound { what: String },

    #[error("API error (HTTP {status}): {message}")]
    #[diagnostic(code(apistore::api_error))]
    Api { status: u16, message: String },

    #[error(transparent)]
    #[diagnostic(code(apistore::store))]
    Store(StoreError),

    // ── Configuration ────────────────────────────────────────────────

    #[error("No endpoint configured")]
    #[diagnostic(
        code(apistore::no_config),
        help(
            "Pass --endpoint, or add a profile to the config file.\n\
             Expected at: {path}"
        )
    )]
    NoConfig { path: String },

    #[error(transparent)]
    #[diagnostic(code(apistore::config))]
    Config(#[from] ConfigError),

    #[error("Invalid value for {field}: {reason}")]
    #[diagnostic(code(apistore::validation))]
    Validation { field: String, reason: String },

    // ── IO / Serialization ────────────────────────────────────────────

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error("Cannot render output: {0}")]
    #[diagnostic(code(apistore::json))]
    Json(#[from] serde_json::Error),
}

impl CliError {
    /// Map this error to an exit code for process termination.
    pub fn exit_code(&self) -> i32 {
        match self {
            Self::ConnectionFailed { .. } => exit_code::CONNECTION,
            Self::Timeout { .. } => exit_code::TIMEOUT,
            Self::AuthFailed { .. } => exit_code::AUTH,
            Self::NotFound { .. } => exit_code::NOT_FOUND,
            Self::Validation { .. } | Self::NoConfig { .. } | Self::Config(_) => exit_code::USAGE,
            _ => exit_code::GENERAL,
        }
    }
}

// ── StoreError → CliError mapping ────────────────────────────────────

impl From<StoreError> for CliError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::Timeout {
                timeout,
                method,
                url,
            } => CliError::Timeout {
                after: timeout.map_or_else(String::new, |t| format!(" after {}s", t.as_secs())),
                method,
                url,
            },

            StoreError::Transport { status: None, message } => {
                CliError::ConnectionFailed { message }
            }

            StoreError::Server {
                status: 401 | 403,
                ..
            }
            | StoreError::Transport {
                status: Some(401 | 403),
                ..
            } => CliError::AuthFailed {
                status: err.status().unwrap_or_default(),
            },

            StoreError::SchemaUnresolved { type_name, .. } => CliError::NotFound {
                what: format!("schema for type '{type_name}'"),
            },

            StoreError::Server { status: 404, ref error } => CliError::NotFound {
                what: error
                    .get_str("message")
                    .unwrap_or_else(|| "resource".to_owned()),
            },

            StoreError::Server { status, ref error } => CliError::Api {
                status,
                message: error
                    .get_str("message")
                    .or_else(|| error.get_str("code"))
                    .unwrap_or_else(|| err.to_string()),
            },

            other => CliError::Store(other),
        }
    }
}
