use super::traits::ConfigSection;
use crate::error::GenomeError;
use serde::{Deserialize, Serialize};

/// Settings for the command-line front end.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RunConfig {
    /// Fixed seed for reproducible runs; entropy when absent.
    pub seed: Option<u64>,
    pub population_size: usize,
}

impl Default for RunConfig {
    fn default() -> Self {
        Self {
            seed: None,
            population_size: 16,
        }
    }
}

impl ConfigSection for RunConfig {
    fn section_name() -> &'static str {
        "run"
    }

    fn validate(&self) -> Result<(), GenomeError> {
        if self.population_size == 0 {
            return Err(GenomeError::Configuration(
                "Population size must be at least 1".to_string()
            ));
        }
        Ok(())
    }
}
