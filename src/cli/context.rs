//! Shared setup for commands that operate on an initialized ledger.

use super::config::{default_config_path, DispatchConfig, QuorumConfig};
use quorum::dispatch::{Dispatcher, HookDispatcher, NoopDispatcher};
use quorum::store::SqliteStore;
use quorum::{Ledger, LedgerOptions};
use std::path::PathBuf;
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

/// Ledger as opened by the CLI.
pub type CliLedger = Ledger<SqliteStore, Arc<dyn Dispatcher>>;

/// Use the `--config` flag if provided, the default location otherwise.
pub fn resolve_config_path(config: Option<String>) -> PathBuf {
    config.map(PathBuf::from).unwrap_or_else(default_config_path)
}

/// Install the global subscriber. `RUST_LOG` takes precedence over `level`.
///
/// Logs go to stderr so command output on stdout stays parseable.
pub fn init_logging(level: &str) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));
    // A second call (tests) keeps the first subscriber.
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .try_init();
}

pub fn dispatcher(config: &DispatchConfig) -> Arc<dyn Dispatcher> {
    match &config.hook {
        Some(program) => Arc::new(HookDispatcher::new(program.clone())),
        None => Arc::new(NoopDispatcher),
    }
}

pub fn ledger_options(config: &QuorumConfig) -> Result<LedgerOptions, Box<dyn std::error::Error>> {
    Ok(LedgerOptions {
        dispatch_timeout: config.dispatch.timeout()?,
        ..LedgerOptions::default()
    })
}

/// Load the config, set up logging, and open the ledger it points at.
pub async fn open_ledger(config: Option<String>) -> Result<CliLedger, Box<dyn std::error::Error>> {
    let config_path = resolve_config_path(config);
    if !config_path.exists() {
        return Err(format!(
            "No config file at '{}'. Run `quorum init` first.",
            config_path.display()
        )
        .into());
    }

    let config = QuorumConfig::load(&config_path)?;
    init_logging(&config.logging.level);

    let store = SqliteStore::open(&config.store.path).await?;
    let ledger = Ledger::open(store, dispatcher(&config.dispatch), ledger_options(&config)?).await?;
    Ok(ledger)
}
