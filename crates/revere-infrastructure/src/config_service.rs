//! Configuration service.
//!
//! Loads `config.toml`, writes a default file when it is missing and layers
//! `REVERE_*` environment variables on top.

use std::path::{Path, PathBuf};
use std::sync::{Arc, PoisonError, RwLock};

use revere_core::OperatingMode;
use revere_core::config::RevereConfig;
use revere_core::error::{RevereError, Result};

use crate::storage::AtomicTomlFile;

pub const ENV_MODE: &str = "REVERE_MODE";
pub const ENV_BACKEND_URL: &str = "REVERE_BACKEND_URL";
pub const ENV_ANON_KEY: &str = "REVERE_ANON_KEY";
pub const ENV_LOG_LEVEL: &str = "REVERE_LOG_LEVEL";

/// Loads and caches [`RevereConfig`].
#[derive(Debug, Clone)]
pub struct ConfigService {
    file: Arc<AtomicTomlFile<RevereConfig>>,
    config: Arc<RwLock<Option<RevereConfig>>>,
}

impl ConfigService {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            file: Arc::new(AtomicTomlFile::new(path)),
            config: Arc::new(RwLock::new(None)),
        }
    }

    pub fn path(&self) -> &Path {
        self.file.path()
    }

    /// Returns the configuration, loading it on first access.
    ///
    /// Environment overrides are applied on every load.
    pub fn get_config(&self) -> Result<RevereConfig> {
        if let Some(cached) = self
            .config
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .as_ref()
        {
            return Ok(cached.clone());
        }

        let mut loaded = self.load_or_create()?;
        apply_env_overrides(&mut loaded, |key| std::env::var(key).ok())?;

        *self.config.write().unwrap_or_else(PoisonError::into_inner) = Some(loaded.clone());
        Ok(loaded)
    }

    /// Forces a reload on next access.
    pub fn invalidate_cache(&self) {
        *self.config.write().unwrap_or_else(PoisonError::into_inner) = None;
    }

    fn load_or_create(&self) -> Result<RevereConfig> {
        match self.file.load()? {
            Some(config) => {
                tracing::debug!(path = %self.path().display(), "[Config] Loaded config");
                Ok(config)
            }
            None => {
                let config = RevereConfig::default();
                self.file.replace(&config)?;
                tracing::info!(path = %self.path().display(), "[Config] Created default config");
                Ok(config)
            }
        }
    }
}

/// Applies `REVERE_*` overrides read through `var`.
///
/// Blank values are ignored. An unknown mode is a configuration error rather
/// than a silent fallback.
pub fn apply_env_overrides<F>(config: &mut RevereConfig, var: F) -> Result<()>
where
    F: Fn(&str) -> Option<String>,
{
    let lookup = |key: &str| var(key).filter(|value| !value.trim().is_empty());

    if let Some(mode) = lookup(ENV_MODE) {
        config.mode = mode.trim().parse::<OperatingMode>().map_err(|_| {
            RevereError::config(format!("{} must be 'demo' or 'live', got '{}'", ENV_MODE, mode))
        })?;
    }
    if let Some(url) = lookup(ENV_BACKEND_URL) {
        config.backend.url = url;
    }
    if let Some(key) = lookup(ENV_ANON_KEY) {
        config.backend.anon_key = key;
    }
    if let Some(level) = lookup(ENV_LOG_LEVEL) {
        config.logging.level = level;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use tempfile::TempDir;

    fn env(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn test_missing_file_is_created_with_defaults() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("config.toml");
        let service = ConfigService::new(&path);

        let config = service.load_or_create().unwrap();
        assert_eq!(config, RevereConfig::default());
        assert!(path.exists());

        let text = std::fs::read_to_string(&path).unwrap();
        assert!(text.contains("placeholder_org_id"));
    }

    #[test]
    fn test_partial_file_uses_defaults() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("config.toml");
        std::fs::write(&path, "mode = \"live\"\n[backend]\nurl = \"https://db.example.co\"\n").unwrap();

        let config = ConfigService::new(&path).load_or_create().unwrap();
        assert_eq!(config.mode, OperatingMode::Live);
        assert_eq!(config.backend.url, "https://db.example.co");
        assert_eq!(config.backend.request_timeout_secs, 15);
        assert_eq!(config.demo.org_slug, "demo");
    }

    #[test]
    fn test_env_overrides() {
        let mut config = RevereConfig::default();
        apply_env_overrides(
            &mut config,
            env(&[
                (ENV_MODE, "LIVE"),
                (ENV_BACKEND_URL, "https://db.example.co"),
                (ENV_ANON_KEY, "anon"),
                (ENV_LOG_LEVEL, "   "),
            ]),
        )
        .unwrap();

        assert_eq!(config.mode, OperatingMode::Live);
        assert_eq!(config.backend.url, "https://db.example.co");
        assert_eq!(config.backend.anon_key, "anon");
        assert_eq!(config.logging.level, "info");
    }

    #[test]
    fn test_invalid_mode_is_config_error() {
        let mut config = RevereConfig::default();
        let err = apply_env_overrides(&mut config, env(&[(ENV_MODE, "staging")])).unwrap_err();
        assert!(matches!(err, RevereError::Config(_)));
    }
}
