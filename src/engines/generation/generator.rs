use super::cluster::ClusterParams;
use super::genome::Genome;
use super::random::{log_uniform_f64, uniform_f64, uniform_usize};
use crate::config::{traits::ConfigSection, BoundsConfig};
use crate::error::Result;
use crate::types::ConvolutionProperties;
use rand::Rng;

/// Generate a random genome using the default convolution template.
///
/// Fails only when `bounds` itself is inconsistent.
pub fn random_genome<P: ClusterParams, R: Rng>(bounds: &BoundsConfig, rng: &mut R) -> Result<Genome<P>> {
    random_genome_with_template(bounds, ConvolutionProperties::default(), rng)
}

/// Generate a random genome. Fields the generator does not draw (input range
/// and input space) are taken from `template`.
pub fn random_genome_with_template<P: ClusterParams, R: Rng>(
    bounds: &BoundsConfig,
    template: ConvolutionProperties,
    rng: &mut R,
) -> Result<Genome<P>> {
    bounds.validate()?;

    let mut genome = Genome::with_default_conv_prop(bounds.child_depth, template)?;

    let num_levels = random_num_convolution_levels(bounds, rng);
    for level in 0..num_levels {
        let types = random_convolution_level(bounds, level, genome.default_conv_prop(), rng);
        genome.push_level(types);
    }

    for slot in genome.cluster_slots_mut() {
        *slot = Some(P::random_create(bounds, rng));
    }

    let scalars = genome.scalars_mut();
    *scalars.extra_answer_turns = uniform_usize(rng, 0, bounds.max_extra_answer_turns);
    *scalars.num_perturb_runs = uniform_usize(rng, 0, bounds.max_perturb_runs);
    *scalars.perturb_chance = uniform_f64(rng, 0.0, 1.0);
    *scalars.perturb_factor =
        log_uniform_f64(rng, bounds.min_perturb_factor, bounds.max_perturb_factor);

    log::debug!(
        "Generated genome with {} convolution levels {:?}",
        genome.num_convolution_layers(),
        genome.num_convolution_types()
    );
    debug_assert!(genome.validate(bounds).is_ok());
    Ok(genome)
}

pub fn random_num_convolution_levels<R: Rng>(bounds: &BoundsConfig, rng: &mut R) -> usize {
    uniform_usize(rng, bounds.min_convolution_levels, bounds.max_convolution_levels)
}

pub fn random_num_convolutions<R: Rng>(bounds: &BoundsConfig, rng: &mut R) -> usize {
    uniform_usize(rng, bounds.min_convolutions, bounds.max_convolutions)
}

/// Type list for one level, sized uniformly within the per-level bounds.
pub fn random_convolution_level<R: Rng>(
    bounds: &BoundsConfig,
    level: usize,
    template: &ConvolutionProperties,
    rng: &mut R,
) -> Vec<ConvolutionProperties> {
    let count = random_num_convolutions(bounds, rng);
    (0..count)
        .map(|_| random_convolution_properties(bounds, level, template, rng))
        .collect()
}

/// A fully valid convolution record for `level`. Deeper levels draw from a
/// smaller dimension range.
pub fn random_convolution_properties<R: Rng>(
    bounds: &BoundsConfig,
    level: usize,
    template: &ConvolutionProperties,
    rng: &mut R,
) -> ConvolutionProperties {
    let rank = uniform_usize(rng, bounds.min_convolution_rank, bounds.max_convolution_rank);
    ConvolutionProperties {
        rank,
        dimensions: random_convolution_dimensions(bounds, rank, level, rng),
        num_layers: uniform_usize(
            rng,
            bounds.min_convolution_node_layers,
            bounds.max_convolution_node_layers,
        ),
        nodes_per_layer: uniform_usize(
            rng,
            bounds.min_convolution_nodes_per_layer,
            bounds.max_convolution_nodes_per_layer,
        ),
        stepfactor: log_uniform_f64(
            rng,
            bounds.min_convolution_step_factor,
            bounds.max_convolution_step_factor,
        ),
        transfer_width: uniform_f64(
            rng,
            bounds.min_convolution_transfer_width,
            bounds.max_convolution_transfer_width,
        ),
        ..template.clone()
    }
}

pub fn random_convolution_dimensions<R: Rng>(
    bounds: &BoundsConfig,
    rank: usize,
    level: usize,
    rng: &mut R,
) -> Vec<usize> {
    let (min, max) = bounds.convolution_dimension_range(level);
    (0..rank).map(|_| uniform_usize(rng, min, max)).collect()
}
