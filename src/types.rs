use crate::error::{GenomeError, Result};
use serde::{Deserialize, Serialize};

/// One convolution stage ("type") at a given convolution level.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConvolutionProperties {
    pub rank: usize,
    /// Spatial extent per axis, always `rank` entries long.
    pub dimensions: Vec<usize>,
    /// Half-open range into the flattened upstream input space.
    pub input_range_begin: usize,
    pub input_range_end: usize,
    pub input_space_dimensions: Vec<usize>,
    pub num_layers: usize,
    pub nodes_per_layer: usize,
    pub stepfactor: f64,
    pub transfer_width: f64,
}

impl Default for ConvolutionProperties {
    fn default() -> Self {
        Self {
            rank: 1,
            dimensions: vec![1],
            input_range_begin: 0,
            input_range_end: 0,
            input_space_dimensions: vec![1],
            num_layers: 1,
            nodes_per_layer: 1,
            stepfactor: 1.0,
            transfer_width: 1.0,
        }
    }
}

impl ConvolutionProperties {
    /// Number of elements in the upstream input space.
    pub fn input_space_size(&self) -> usize {
        self.input_space_dimensions
            .iter()
            .fold(1usize, |acc, &d| acc.saturating_mul(d))
    }

    /// Checks the record's self-contained invariants (independent of any bounds).
    pub fn check_structure(&self) -> Result<()> {
        if self.rank == 0 {
            return Err(GenomeError::StructuralInvariant(
                "convolution rank must be at least 1".to_string(),
            ));
        }
        if self.dimensions.len() != self.rank {
            return Err(GenomeError::StructuralInvariant(format!(
                "convolution has rank {} but {} dimensions",
                self.rank,
                self.dimensions.len()
            )));
        }
        if self.dimensions.iter().any(|&d| d == 0) {
            return Err(GenomeError::StructuralInvariant(
                "convolution dimensions must be non-zero".to_string(),
            ));
        }
        if self.input_space_dimensions.is_empty()
            || self.input_space_dimensions.iter().any(|&d| d == 0)
        {
            return Err(GenomeError::StructuralInvariant(
                "input space dimensions must be non-empty and non-zero".to_string(),
            ));
        }
        if self.input_range_end < self.input_range_begin {
            return Err(GenomeError::StructuralInvariant(format!(
                "input range end {} precedes begin {}",
                self.input_range_end, self.input_range_begin
            )));
        }
        if self.input_range_end > self.input_space_size() {
            return Err(GenomeError::StructuralInvariant(format!(
                "input range end {} exceeds input space of size {}",
                self.input_range_end,
                self.input_space_size()
            )));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_template_is_consistent() {
        let props = ConvolutionProperties::default();
        assert!(props.check_structure().is_ok());
        assert_eq!(props.input_space_size(), 1);
    }

    #[test]
    fn test_rank_dimension_mismatch_detected() {
        let props = ConvolutionProperties {
            rank: 2,
            ..ConvolutionProperties::default()
        };
        assert!(matches!(
            props.check_structure(),
            Err(GenomeError::StructuralInvariant(_))
        ));
    }

    #[test]
    fn test_input_range_must_fit_input_space() {
        let props = ConvolutionProperties {
            input_range_begin: 2,
            input_range_end: 7,
            input_space_dimensions: vec![2, 3],
            ..ConvolutionProperties::default()
        };
        assert!(props.check_structure().is_err());

        let props = ConvolutionProperties {
            input_range_end: 6,
            ..props
        };
        assert!(props.check_structure().is_ok());
    }
}
