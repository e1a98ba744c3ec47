//! Initialize the configuration directory: create ~/.hotline with a default config and an empty
//! alert group directory.

use anyhow::{Context, Result};
use std::path::{Path, PathBuf};

use crate::config;
use crate::domain::DirectorySnapshot;

/// Ensure the configuration directory has been initialized (config file exists).
pub fn require_initialized(config_path: &Path) -> Result<()> {
    if !config_path.exists() {
        anyhow::bail!(
            "configuration not initialized; run `hotline init` first (config file not found: {})",
            config_path.display()
        );
    }
    Ok(())
}

/// Create the config directory and default files if they do not exist.
/// - Creates the config directory (parent of config file path).
/// - Writes `config.json` with `{}` if missing.
/// - Writes an empty `directory.json` (no organizations, no alert groups) if missing.
pub fn init_config_dir(config_path: &Path) -> Result<PathBuf> {
    let config_dir = config_path
        .parent()
        .filter(|p| !p.as_os_str().is_empty())
        .unwrap_or_else(|| Path::new("."));
    std::fs::create_dir_all(config_dir)
        .with_context(|| format!("creating config directory {}", config_dir.display()))?;

    if !config_path.exists() {
        std::fs::write(config_path, b"{}")
            .with_context(|| format!("writing default config to {}", config_path.display()))?;
        log::info!("created default config at {}", config_path.display());
    }

    let directory = config::directory_file(config_path);
    if !directory.exists() {
        let empty = serde_json::to_string_pretty(&DirectorySnapshot::default())
            .context("serializing empty directory")?;
        std::fs::write(&directory, empty)
            .with_context(|| format!("writing empty directory to {}", directory.display()))?;
        log::info!("created empty directory at {}", directory.display());
    } else {
        log::debug!("directory already exists at {}, skipping", directory.display());
    }

    Ok(config_dir.to_path_buf())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn init_creates_config_and_directory_once() {
        let dir = std::env::temp_dir().join(format!("hotline-init-test-{}", uuid::Uuid::new_v4()));
        let config_path = dir.join("config.json");
        assert!(require_initialized(&config_path).is_err());

        assert_eq!(init_config_dir(&config_path).unwrap(), dir);
        require_initialized(&config_path).unwrap();
        let snapshot: DirectorySnapshot =
            serde_json::from_str(&std::fs::read_to_string(dir.join("directory.json")).unwrap())
                .unwrap();
        assert!(snapshot.organizations.is_empty());

        std::fs::write(&config_path, r#"{"gateway":{"port":1}}"#).unwrap();
        init_config_dir(&config_path).unwrap();
        assert_eq!(
            std::fs::read_to_string(&config_path).unwrap(),
            r#"{"gateway":{"port":1}}"#
        );
        let _ = std::fs::remove_dir_all(&dir);
    }
}
