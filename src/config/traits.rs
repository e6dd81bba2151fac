use crate::error::GenomeError;
use serde::{Deserialize, Serialize};

/// Trait for configuration sections
pub trait ConfigSection: Serialize + for<'de> Deserialize<'de> + Default + Clone {
    fn section_name() -> &'static str;
    fn validate(&self) -> Result<(), GenomeError>;
}

/// Fails with a configuration error unless `min <= max`.
pub(crate) fn check_range<T: PartialOrd + std::fmt::Display>(
    name: &str,
    min: T,
    max: T,
) -> Result<(), GenomeError> {
    if min > max {
        return Err(GenomeError::Configuration(format!(
            "min_{name} ({min}) exceeds max_{name} ({max})"
        )));
    }
    Ok(())
}

pub(crate) fn check_probability(name: &str, value: f64) -> Result<(), GenomeError> {
    if !(0.0..=1.0).contains(&value) {
        return Err(GenomeError::Configuration(format!(
            "{name} must be between 0 and 1, got {value}"
        )));
    }
    Ok(())
}
