use super::config::{default_store_path, QuorumConfig};
use super::context::{dispatcher, init_logging, ledger_options, resolve_config_path};
use quorum::store::SqliteStore;
use quorum::{Ledger, OwnerRegistry, Principal};
use std::fs;
use std::path::{Path, PathBuf};

/// Initialize a new ledger
///
/// Records the owner set and threshold in a fresh store, then writes a
/// default config (unless one exists and `force_config` is not set). A store
/// that is already initialized is never overwritten, and the config only
/// changes once the store accepted the new owner set.
pub async fn execute(
    owners: Vec<Principal>,
    threshold: usize,
    config: Option<String>,
    store_path: Option<String>,
    force_config: bool,
) -> Result<(), Box<dyn std::error::Error>> {
    // Validate before touching the filesystem.
    let registry = OwnerRegistry::new(owners.clone(), threshold)?;

    let config_path = resolve_config_path(config);
    let store_path = store_path
        .map(PathBuf::from)
        .unwrap_or_else(|| default_store_path(&config_path));

    if config_path.exists() && !force_config {
        return Err(format!(
            "Config file '{}' already exists (use --force-config to overwrite)",
            config_path.display()
        )
        .into());
    }

    // Staged next to the real config and moved into place on success.
    let staged = config_path.with_extension("toml.init");
    QuorumConfig::create_default(&staged, &owners, threshold, &store_path)?;
    if let Err(e) = create_ledger(registry, &staged).await {
        let _ = fs::remove_file(&staged);
        return Err(e);
    }
    fs::rename(&staged, &config_path).map_err(|e| {
        format!(
            "Failed to move config into '{}': {}",
            config_path.display(),
            e
        )
    })?;

    println!("Initialized ledger");
    println!("Config: {}", config_path.display());
    println!("Store: {}", store_path.display());
    println!("Owners: {}", owners.len());
    println!("Threshold: {}", threshold);
    Ok(())
}

async fn create_ledger(
    registry: OwnerRegistry,
    config_path: &Path,
) -> Result<(), Box<dyn std::error::Error>> {
    let config = QuorumConfig::load(config_path)?;
    init_logging(&config.logging.level);

    let store = SqliteStore::open(&config.store.path).await?;
    Ledger::create(
        registry,
        store,
        dispatcher(&config.dispatch),
        ledger_options(&config)?,
    )
    .await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn owners() -> Vec<Principal> {
        vec![Principal::repeat(1), Principal::repeat(2)]
    }

    fn config_arg(dir: &TempDir) -> Option<String> {
        Some(dir.path().join("config.toml").display().to_string())
    }

    #[tokio::test]
    async fn test_init_creates_config_and_store() {
        let dir = TempDir::new().unwrap();
        execute(owners(), 2, config_arg(&dir), None, false)
            .await
            .unwrap();

        assert!(dir.path().join("config.toml").exists());
        assert!(dir.path().join("quorum.db").exists());
    }

    #[tokio::test]
    async fn test_init_rejects_invalid_threshold() {
        let dir = TempDir::new().unwrap();
        let result = execute(owners(), 3, config_arg(&dir), None, false).await;

        assert!(result.is_err());
        assert!(!dir.path().join("config.toml").exists());
    }

    #[tokio::test]
    async fn test_init_refuses_existing_config() {
        let dir = TempDir::new().unwrap();
        execute(owners(), 1, config_arg(&dir), None, false)
            .await
            .unwrap();

        assert!(execute(owners(), 1, config_arg(&dir), None, false)
            .await
            .is_err());
    }

    #[tokio::test]
    async fn test_init_refuses_initialized_store() {
        let dir = TempDir::new().unwrap();
        execute(owners(), 1, config_arg(&dir), None, false)
            .await
            .unwrap();

        // Rewriting the config does not reset the owner set.
        let result = execute(owners(), 2, config_arg(&dir), None, true).await;
        assert!(result.unwrap_err().to_string().contains("already initialized"));
    }

    #[tokio::test]
    async fn test_refused_reinit_keeps_config() {
        let dir = TempDir::new().unwrap();
        execute(owners(), 1, config_arg(&dir), None, false)
            .await
            .unwrap();

        let other = vec![Principal::repeat(7), Principal::repeat(8)];
        assert!(execute(other, 2, config_arg(&dir), None, true)
            .await
            .is_err());

        let config = QuorumConfig::load(&dir.path().join("config.toml")).unwrap();
        assert_eq!(config.vault.owners, owners());
        assert_eq!(config.vault.threshold, 1);
        assert!(!dir.path().join("config.toml.init").exists());
    }

    #[tokio::test]
    async fn test_store_failure_writes_no_config() {
        let dir = TempDir::new().unwrap();
        // A directory cannot be opened as a database.
        let store_path = Some(dir.path().display().to_string());
        let result = execute(owners(), 1, config_arg(&dir), store_path, false).await;

        assert!(result.is_err());
        assert!(!dir.path().join("config.toml").exists());
        assert!(!dir.path().join("config.toml.init").exists());
    }
}
