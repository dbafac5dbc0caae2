//! Quorum configuration file handling
//!
//! Provides default configuration generation and loading for the operator
//! CLI. Configuration files are TOML and live next to the ledger database by
//! default.
//!
//! The `[vault]` section is only read by `init`. Once the store is
//! initialized the owner set and threshold come from the store, and editing
//! them here has no effect.

use quorum::Principal;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Default log level
const DEFAULT_LOG_LEVEL: &str = "info";

/// Default dispatch timeout
const DEFAULT_DISPATCH_TIMEOUT: &str = "30s";

/// Operator configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QuorumConfig {
    /// Owner set used to initialize the store
    pub vault: VaultConfig,

    /// Ledger database
    pub store: StoreConfig,

    /// Proposal dispatch
    #[serde(default)]
    pub dispatch: DispatchConfig,

    /// Logging configuration
    #[serde(default)]
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VaultConfig {
    pub owners: Vec<Principal>,
    pub threshold: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoreConfig {
    /// Path to the sqlite ledger database
    pub path: PathBuf,
}

/// Dispatch configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DispatchConfig {
    /// Upper bound on one dispatch, in humantime form ("30s", "2m")
    #[serde(default = "default_timeout")]
    pub timeout: String,

    /// Executable run for each executed proposal (optional; calls are only
    /// logged if not specified)
    pub hook: Option<PathBuf>,
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error)
    #[serde(default = "default_log_level")]
    pub level: String,
}

fn default_timeout() -> String {
    DEFAULT_DISPATCH_TIMEOUT.to_string()
}

fn default_log_level() -> String {
    DEFAULT_LOG_LEVEL.to_string()
}

impl Default for DispatchConfig {
    fn default() -> Self {
        Self {
            timeout: default_timeout(),
            hook: None,
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
        }
    }
}

impl DispatchConfig {
    /// Parsed dispatch timeout
    pub fn timeout(&self) -> Result<Duration, Box<dyn std::error::Error>> {
        humantime::parse_duration(&self.timeout)
            .map_err(|e| format!("Invalid dispatch timeout '{}': {}", self.timeout, e).into())
    }
}

impl QuorumConfig {
    /// Create a configuration for the given owners and store path
    #[allow(dead_code)]
    pub fn new(owners: Vec<Principal>, threshold: usize, store_path: PathBuf) -> Self {
        Self {
            vault: VaultConfig { owners, threshold },
            store: StoreConfig { path: store_path },
            dispatch: DispatchConfig::default(),
            logging: LoggingConfig::default(),
        }
    }

    /// Load configuration from a TOML file
    pub fn load(path: &Path) -> Result<Self, Box<dyn std::error::Error>> {
        let contents = fs::read_to_string(path)
            .map_err(|e| format!("Failed to read config file '{}': {}", path.display(), e))?;

        let config: QuorumConfig = toml::from_str(&contents)
            .map_err(|e| format!("Failed to parse config file '{}': {}", path.display(), e))?;

        // Fail at load time rather than on the first execute.
        config.dispatch.timeout()?;
        Ok(config)
    }

    /// Save configuration to a TOML file
    #[allow(dead_code)]
    pub fn save(&self, path: &Path) -> Result<(), Box<dyn std::error::Error>> {
        let contents = toml::to_string_pretty(self)
            .map_err(|e| format!("Failed to serialize config: {}", e))?;
        write_file(path, &contents)
    }

    /// Generate default configuration content as a string with comments
    pub fn generate_default_toml(owners: &[Principal], threshold: usize, store_path: &Path) -> String {
        let owners = owners
            .iter()
            .map(|owner| format!("    \"{}\",", owner))
            .collect::<Vec<_>>()
            .join("\n");

        format!(
            r#"# Quorum Ledger Configuration
#
# The [vault] section is read once, by `quorum init`. After that the owner
# set and threshold are fixed in the ledger database and cannot be changed.

[vault]
owners = [
{owners}
]
# Distinct owner confirmations required to execute a proposal
threshold = {threshold}

[store]
# Path to the sqlite ledger database
path = "{store_path}"

[dispatch]
# Maximum time one dispatch may take before it is abandoned and rolled back
timeout = "{timeout}"

# Executable invoked as `hook <target> <value> <payload-hex>` for each
# executed proposal. A non-zero exit rejects the call.
# Leave commented to log calls without dispatching them anywhere.
# hook = "/usr/local/bin/quorum-dispatch"

[logging]
# Log level: trace, debug, info, warn, error (RUST_LOG overrides)
level = "{level}"
"#,
            owners = owners,
            threshold = threshold,
            store_path = store_path.display(),
            timeout = DEFAULT_DISPATCH_TIMEOUT,
            level = DEFAULT_LOG_LEVEL,
        )
    }

    /// Create and save a default configuration file
    pub fn create_default(
        config_path: &Path,
        owners: &[Principal],
        threshold: usize,
        store_path: &Path,
    ) -> Result<(), Box<dyn std::error::Error>> {
        let contents = Self::generate_default_toml(owners, threshold, store_path);
        write_file(config_path, &contents)
    }
}

fn write_file(path: &Path, contents: &str) -> Result<(), Box<dyn std::error::Error>> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)
            .map_err(|e| format!("Failed to create config directory: {}", e))?;
    }

    fs::write(path, contents)
        .map_err(|e| format!("Failed to write config file '{}': {}", path.display(), e))?;
    Ok(())
}

/// Data directory holding the default config and database
///
/// - Config: ~/.local/share/quorum/config.toml
/// - Store: ~/.local/share/quorum/quorum.db
pub fn default_data_dir() -> PathBuf {
    dirs::data_local_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("quorum")
}

/// Get the default config file path
pub fn default_config_path() -> PathBuf {
    default_data_dir().join("config.toml")
}

/// Get the default store path, adjacent to the config file
pub fn default_store_path(config_path: &Path) -> PathBuf {
    config_path
        .parent()
        .map(Path::to_path_buf)
        .unwrap_or_else(default_data_dir)
        .join("quorum.db")
}
