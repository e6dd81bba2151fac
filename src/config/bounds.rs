use super::traits::{check_probability, check_range, ConfigSection};
use crate::error::GenomeError;
use serde::{Deserialize, Serialize};

/// Structural and numeric limits for genome generation, mutation and loading.
///
/// Loaded once per process and shared read-only (usually behind an `Arc`)
/// by every genome operation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BoundsConfig {
    /// Number of cluster-parameter slots per genome.
    pub child_depth: usize,
    pub allow_side_weights: bool,
    pub allow_side_mems: bool,
    /// Recent turns retained for downstream consumers.
    pub num_turns_saved: usize,

    // Cluster stage
    pub min_layers: usize,
    pub max_layers: usize,
    pub min_nodes_per_layer: usize,
    pub max_nodes_per_layer: usize,
    pub min_step_factor: f64,
    pub max_step_factor: f64,
    pub min_mem_factor: f64,
    pub max_mem_factor: f64,
    pub min_mem_norm: f64,
    pub max_mem_norm: f64,
    pub min_transfer_width: f64,
    pub max_transfer_width: f64,
    pub num_learn_styles_side: usize,

    // Convolution stage. "Levels" are sequential convolutions the data passes
    // through before the cluster; "node layers" are layers within one convolution.
    pub min_convolution_levels: usize,
    pub max_convolution_levels: usize,
    pub min_convolutions: usize,
    pub max_convolutions: usize,
    pub min_convolution_rank: usize,
    pub max_convolution_rank: usize,
    pub min_convolution_node_layers: usize,
    pub max_convolution_node_layers: usize,
    pub min_convolution_nodes_per_layer: usize,
    pub max_convolution_nodes_per_layer: usize,
    pub min_convolution_dimension: usize,
    pub max_convolution_dimension: usize,
    /// Divisor applied to the maximum dimension once per deeper level.
    pub convolution_dimension_level_multiplier: f64,
    pub min_convolution_step_factor: f64,
    pub max_convolution_step_factor: f64,
    pub min_convolution_transfer_width: f64,
    pub max_convolution_transfer_width: f64,

    // Scalar genes
    pub max_extra_answer_turns: usize,
    pub max_perturb_runs: usize,
    pub min_perturb_factor: f64,
    pub max_perturb_factor: f64,

    // Mutation
    /// Per-gene perturbation probability for `mutate`.
    pub mutation_chance: f64,
    /// Gaussian step, as a fraction of the gene's legal span.
    pub mutation_stdev: f64,
    /// Probability that `rare_mutate` applies a structural change.
    pub rare_mutation_chance: f64,
}

impl Default for BoundsConfig {
    fn default() -> Self {
        Self {
            child_depth: 1,
            allow_side_weights: false,
            allow_side_mems: false,
            num_turns_saved: 15,

            min_layers: 1,
            max_layers: 2,
            min_nodes_per_layer: 1,
            max_nodes_per_layer: 200,
            min_step_factor: 0.001,
            max_step_factor: 1.0,
            min_mem_factor: 0.0,
            max_mem_factor: 1.0,
            min_mem_norm: 0.0,
            max_mem_norm: 1.0,
            min_transfer_width: 0.1,
            max_transfer_width: 10.0,
            num_learn_styles_side: 3,

            min_convolution_levels: 2,
            max_convolution_levels: 2,
            min_convolutions: 1,
            max_convolutions: 3,
            min_convolution_rank: 1,
            max_convolution_rank: 2,
            min_convolution_node_layers: 1,
            max_convolution_node_layers: 1,
            min_convolution_nodes_per_layer: 1,
            max_convolution_nodes_per_layer: 10,
            min_convolution_dimension: 2,
            max_convolution_dimension: 10,
            convolution_dimension_level_multiplier: 2.0,
            min_convolution_step_factor: 0.001,
            max_convolution_step_factor: 1.0,
            min_convolution_transfer_width: 0.1,
            max_convolution_transfer_width: 10.0,

            max_extra_answer_turns: 3,
            max_perturb_runs: 0,
            min_perturb_factor: 0.01,
            max_perturb_factor: 1.0,

            mutation_chance: 0.1,
            mutation_stdev: 0.1,
            rare_mutation_chance: 0.05,
        }
    }
}

impl BoundsConfig {
    /// Dimension range for convolutions at `level`. The upper bound shrinks
    /// by the level multiplier per level but never below the minimum.
    pub fn convolution_dimension_range(&self, level: usize) -> (usize, usize) {
        let exponent = i32::try_from(level).unwrap_or(i32::MAX);
        let scaled = self.max_convolution_dimension as f64
            / self.convolution_dimension_level_multiplier.powi(exponent);
        let max = if scaled.is_finite() {
            (scaled.floor() as usize).max(self.min_convolution_dimension)
        } else {
            self.min_convolution_dimension
        };
        (self.min_convolution_dimension, max)
    }

    pub fn num_turns_saved(&self) -> usize {
        self.num_turns_saved
    }

    /// Every stored count and extent is written as a 32-bit field.
    fn check_stream_width(&self) -> Result<(), GenomeError> {
        let limits = [
            ("child_depth", self.child_depth),
            ("max_layers", self.max_layers),
            ("max_nodes_per_layer", self.max_nodes_per_layer),
            ("num_learn_styles_side", self.num_learn_styles_side),
            ("max_convolution_levels", self.max_convolution_levels),
            ("max_convolutions", self.max_convolutions),
            ("max_convolution_rank", self.max_convolution_rank),
            ("max_convolution_node_layers", self.max_convolution_node_layers),
            ("max_convolution_nodes_per_layer", self.max_convolution_nodes_per_layer),
            ("max_convolution_dimension", self.max_convolution_dimension),
            ("max_extra_answer_turns", self.max_extra_answer_turns),
            ("max_perturb_runs", self.max_perturb_runs),
        ];
        for (name, value) in limits {
            if u32::try_from(value).is_err() {
                return Err(GenomeError::Configuration(format!(
                    "{name} {value} does not fit in 32 bits"
                )));
            }
        }
        Ok(())
    }

    fn check_finite(&self) -> Result<(), GenomeError> {
        let floats = [
            ("min_step_factor", self.min_step_factor),
            ("max_step_factor", self.max_step_factor),
            ("min_mem_factor", self.min_mem_factor),
            ("max_mem_factor", self.max_mem_factor),
            ("min_mem_norm", self.min_mem_norm),
            ("max_mem_norm", self.max_mem_norm),
            ("min_transfer_width", self.min_transfer_width),
            ("max_transfer_width", self.max_transfer_width),
            ("convolution_dimension_level_multiplier", self.convolution_dimension_level_multiplier),
            ("min_convolution_step_factor", self.min_convolution_step_factor),
            ("max_convolution_step_factor", self.max_convolution_step_factor),
            ("min_convolution_transfer_width", self.min_convolution_transfer_width),
            ("max_convolution_transfer_width", self.max_convolution_transfer_width),
            ("min_perturb_factor", self.min_perturb_factor),
            ("max_perturb_factor", self.max_perturb_factor),
            ("mutation_stdev", self.mutation_stdev),
        ];
        for (name, value) in floats {
            if !value.is_finite() {
                return Err(GenomeError::Configuration(format!(
                    "{name} must be finite, got {value}"
                )));
            }
        }
        Ok(())
    }
}

impl ConfigSection for BoundsConfig {
    fn section_name() -> &'static str {
        "bounds"
    }

    fn validate(&self) -> Result<(), GenomeError> {
        self.check_finite()?;
        self.check_stream_width()?;

        if self.child_depth == 0 {
            return Err(GenomeError::Configuration(
                "child_depth must be at least 1".to_string(),
            ));
        }
        if self.min_layers == 0 || self.min_nodes_per_layer == 0 {
            return Err(GenomeError::Configuration(
                "Cluster layer and node counts must be at least 1".to_string(),
            ));
        }
        check_range("layers", self.min_layers, self.max_layers)?;
        check_range("nodes_per_layer", self.min_nodes_per_layer, self.max_nodes_per_layer)?;
        check_range("step_factor", self.min_step_factor, self.max_step_factor)?;
        check_range("mem_factor", self.min_mem_factor, self.max_mem_factor)?;
        check_range("mem_norm", self.min_mem_norm, self.max_mem_norm)?;
        check_range("transfer_width", self.min_transfer_width, self.max_transfer_width)?;
        if self.num_learn_styles_side == 0 {
            return Err(GenomeError::Configuration(
                "num_learn_styles_side must be at least 1".to_string(),
            ));
        }

        check_range(
            "convolution_levels",
            self.min_convolution_levels,
            self.max_convolution_levels,
        )?;
        if self.min_convolutions == 0 {
            return Err(GenomeError::Configuration(
                "Every convolution level needs at least one convolution".to_string(),
            ));
        }
        check_range("convolutions", self.min_convolutions, self.max_convolutions)?;
        if self.min_convolution_rank == 0 {
            return Err(GenomeError::Configuration(
                "min_convolution_rank must be at least 1".to_string(),
            ));
        }
        check_range(
            "convolution_rank",
            self.min_convolution_rank,
            self.max_convolution_rank,
        )?;
        if self.min_convolution_node_layers == 0 || self.min_convolution_nodes_per_layer == 0 {
            return Err(GenomeError::Configuration(
                "Convolution layer and node counts must be at least 1".to_string(),
            ));
        }
        check_range(
            "convolution_node_layers",
            self.min_convolution_node_layers,
            self.max_convolution_node_layers,
        )?;
        check_range(
            "convolution_nodes_per_layer",
            self.min_convolution_nodes_per_layer,
            self.max_convolution_nodes_per_layer,
        )?;
        if self.min_convolution_dimension == 0 {
            return Err(GenomeError::Configuration(
                "min_convolution_dimension must be at least 1".to_string(),
            ));
        }
        check_range(
            "convolution_dimension",
            self.min_convolution_dimension,
            self.max_convolution_dimension,
        )?;
        if self.convolution_dimension_level_multiplier < 1.0 {
            return Err(GenomeError::Configuration(format!(
                "convolution_dimension_level_multiplier must be at least 1, got {}",
                self.convolution_dimension_level_multiplier
            )));
        }
        check_range(
            "convolution_step_factor",
            self.min_convolution_step_factor,
            self.max_convolution_step_factor,
        )?;
        check_range(
            "convolution_transfer_width",
            self.min_convolution_transfer_width,
            self.max_convolution_transfer_width,
        )?;
        check_range("perturb_factor", self.min_perturb_factor, self.max_perturb_factor)?;

        // Drawn log-uniformly
        let log_uniform_minimums = [
            ("min_step_factor", self.min_step_factor),
            ("min_convolution_step_factor", self.min_convolution_step_factor),
            ("min_perturb_factor", self.min_perturb_factor),
        ];
        for (name, value) in log_uniform_minimums {
            if value <= 0.0 {
                return Err(GenomeError::Configuration(format!(
                    "{name} must be positive, got {value}"
                )));
            }
        }

        check_probability("mutation_chance", self.mutation_chance)?;
        check_probability("rare_mutation_chance", self.rare_mutation_chance)?;
        if self.mutation_stdev < 0.0 {
            return Err(GenomeError::Configuration(
                "mutation_stdev must not be negative".to_string(),
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_bounds_are_valid() {
        assert!(BoundsConfig::default().validate().is_ok());
    }

    #[test]
    fn test_inverted_range_is_rejected() {
        let bounds = BoundsConfig {
            min_convolutions: 4,
            max_convolutions: 3,
            ..BoundsConfig::default()
        };
        match bounds.validate() {
            Err(GenomeError::Configuration(msg)) => assert!(msg.contains("convolutions")),
            other => panic!("expected configuration error, got {:?}", other),
        }
    }

    #[test]
    fn test_bad_probabilities_are_rejected() {
        let bounds = BoundsConfig {
            mutation_chance: 1.5,
            ..BoundsConfig::default()
        };
        assert!(bounds.validate().is_err());

        let bounds = BoundsConfig {
            rare_mutation_chance: f64::NAN,
            ..BoundsConfig::default()
        };
        assert!(bounds.validate().is_err());
    }

    #[cfg(target_pointer_width = "64")]
    #[test]
    fn test_limits_beyond_32_bits_are_rejected() {
        let bounds = BoundsConfig {
            max_nodes_per_layer: u32::MAX as usize + 1,
            ..BoundsConfig::default()
        };
        assert!(matches!(bounds.validate(), Err(GenomeError::Configuration(_))));

        let bounds = BoundsConfig {
            max_nodes_per_layer: u32::MAX as usize,
            ..BoundsConfig::default()
        };
        assert!(bounds.validate().is_ok());
    }

    #[test]
    fn test_dimension_range_shrinks_per_level() {
        let bounds = BoundsConfig::default();
        assert_eq!(bounds.convolution_dimension_range(0), (2, 10));
        assert_eq!(bounds.convolution_dimension_range(1), (2, 5));
        assert_eq!(bounds.convolution_dimension_range(2), (2, 2));
        assert_eq!(bounds.convolution_dimension_range(10), (2, 2));
    }
}
