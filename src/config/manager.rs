use super::{bounds::BoundsConfig, run::RunConfig, traits::ConfigSection};
use crate::error::GenomeError;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::sync::Arc;

/// Prefix for environment overrides, e.g. `CONVGENOME__BOUNDS__CHILD_DEPTH=2`.
pub const ENV_PREFIX: &str = "CONVGENOME";

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    pub bounds: BoundsConfig,
    #[serde(default)]
    pub run: RunConfig,
}

impl AppConfig {
    pub fn validate(&self) -> Result<(), GenomeError> {
        self.bounds.validate()?;
        self.run.validate()?;
        Ok(())
    }
}

/// Holds the process-wide configuration. Bounds are handed out as a shared
/// immutable value; there is no way to change them after loading.
#[derive(Debug, Clone)]
pub struct ConfigManager {
    bounds: Arc<BoundsConfig>,
    run: RunConfig,
}

impl ConfigManager {
    pub fn new(config: AppConfig) -> Result<Self, GenomeError> {
        config.validate()?;
        Ok(Self {
            bounds: Arc::new(config.bounds),
            run: config.run,
        })
    }

    /// Loads a TOML/JSON file layered with `CONVGENOME__*` environment overrides.
    /// Every bounds key must be present.
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self, GenomeError> {
        let settings = config::Config::builder()
            .add_source(config::File::from(path.as_ref()))
            .add_source(
                config::Environment::with_prefix(ENV_PREFIX)
                    .prefix_separator("__")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()
            .map_err(|e| GenomeError::Configuration(format!("Failed to read config: {}", e)))?;

        let config: AppConfig = settings
            .try_deserialize()
            .map_err(|e| GenomeError::Configuration(format!("Failed to parse config: {}", e)))?;

        log::info!("Loaded bounds from {}", path.as_ref().display());
        Self::new(config)
    }

    pub fn save_to_file<P: AsRef<Path>>(&self, path: P) -> Result<(), GenomeError> {
        let config = AppConfig {
            bounds: (*self.bounds).clone(),
            run: self.run.clone(),
        };
        let toml_str = toml::to_string_pretty(&config)
            .map_err(|e| GenomeError::Configuration(format!("Failed to serialize: {}", e)))?;

        std::fs::write(path, toml_str)
            .map_err(|e| GenomeError::Configuration(format!("Failed to write config: {}", e)))?;

        Ok(())
    }

    pub fn bounds(&self) -> Arc<BoundsConfig> {
        Arc::clone(&self.bounds)
    }

    pub fn run(&self) -> &RunConfig {
        &self.run
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_save_then_load_preserves_bounds() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("bounds.toml");

        let mut config = AppConfig::default();
        config.bounds.child_depth = 3;
        config.bounds.max_convolutions = 5;
        config.run.seed = Some(7);

        let manager = ConfigManager::new(config).unwrap();
        manager.save_to_file(&path).unwrap();

        let loaded = ConfigManager::load_from_file(&path).unwrap();
        assert_eq!(*loaded.bounds(), *manager.bounds());
        assert_eq!(loaded.run().seed, Some(7));
    }

    #[test]
    fn test_missing_key_is_configuration_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("partial.toml");
        std::fs::write(&path, "[bounds]\nchild_depth = 2\n").unwrap();

        let result = ConfigManager::load_from_file(&path);
        assert!(matches!(result, Err(GenomeError::Configuration(_))));
    }

    #[test]
    fn test_inconsistent_file_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("inverted.toml");

        let mut config = AppConfig::default();
        config.bounds.min_layers = 5;
        let toml_str = toml::to_string_pretty(&config).unwrap();
        std::fs::write(&path, toml_str).unwrap();

        let result = ConfigManager::load_from_file(&path);
        assert!(matches!(result, Err(GenomeError::Configuration(_))));
    }
}
