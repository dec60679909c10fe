mod cli;
mod commands;
mod error;
mod output;

use std::sync::Arc;
use std::time::Duration;

use clap::Parser;
use tracing_subscriber::EnvFilter;

use apistore_api::{HttpTransport, TlsMode, TransportConfig};
use apistore_config::{Profile, config_path, load_config};
use apistore_core::{Store, StoreConfig};

use crate::cli::{Cli, GlobalOpts};
use crate::error::CliError;

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    init_tracing(cli.global.verbose);

    if let Err(err) = run(cli).await {
        let code = err.exit_code();
        eprintln!("{:?}", miette::Report::new(err));
        std::process::exit(code);
    }
}

fn init_tracing(verbosity: u8) {
    let filter = match verbosity {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter)),
        )
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();
}

async fn run(cli: Cli) -> Result<(), CliError> {
    let store = build_store(&cli.global)?;
    tracing::debug!(command = ?cli.command, "dispatching command");
    commands::dispatch(cli.command, &store, &cli.global).await
}

/// Build a `Store` from the config file, the selected profile, and CLI
/// overrides.
fn build_store(global: &GlobalOpts) -> Result<Store, CliError> {
    let cfg = load_config(global.config.as_deref())?;

    let (name, mut profile) = match cfg.profile(global.profile.as_deref()) {
        Ok((name, profile)) => (name.to_owned(), profile.clone()),
        // Flags alone are enough when no profile was asked for by name.
        Err(_) if global.profile.is_none() && global.endpoint.is_some() => {
            ("(flags)".to_owned(), Profile::default())
        }
        Err(_) if global.profile.is_none() => {
            return Err(CliError::NoConfig {
                path: global
                    .config
                    .clone()
                    .unwrap_or_else(config_path)
                    .display()
                    .to_string(),
            });
        }
        Err(err) => return Err(err.into()),
    };

    if let Some(ref endpoint) = global.endpoint {
        profile.endpoint.clone_from(endpoint);
    }
    if let Some(ref token) = global.token {
        profile.token = Some(token.clone());
        profile.token_env = None;
    }
    if global.insecure {
        profile.insecure = Some(true);
    }
    if let Some(timeout) = global.timeout {
        profile.timeout = Some(timeout);
    }

    let (store_config, transport_config, origin) = profile.to_store_parts(&name, &cfg.defaults)?;
    log_profile(&name, &store_config, &transport_config);

    let transport = HttpTransport::new(origin, &transport_config).map_err(|e| {
        CliError::ConnectionFailed {
            message: e.to_string(),
        }
    })?;
    Ok(Store::new(store_config, Arc::new(transport)))
}

fn log_profile(name: &str, store: &StoreConfig, transport: &TransportConfig) {
    tracing::debug!(
        profile = name,
        base_url = %store.base_url,
        timeout = ?store.default_timeout.map(|t: Duration| t.as_secs()),
        insecure = matches!(transport.tls, TlsMode::DangerAcceptInvalid),
        "store configured"
    );
}
