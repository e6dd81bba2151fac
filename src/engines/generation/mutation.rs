use super::cluster::ClusterParams;
use super::generator::{random_convolution_level, random_convolution_properties};
use super::genome::Genome;
use super::random::{gaussian_step, uniform_usize};
use crate::config::{traits::ConfigSection, BoundsConfig};
use crate::types::ConvolutionProperties;
use rand::seq::SliceRandom;
use rand::Rng;

/// Structural changes applied by [`rare_mutate`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StructuralMutation {
    AddLevel,
    RemoveLevel,
    AddType,
    RemoveType,
    /// Replace one cluster-parameter slot with a freshly randomized one.
    RegenerateCluster,
}

fn replace<T: PartialEq>(slot: &mut T, value: T) -> bool {
    if *slot == value {
        return false;
    }
    *slot = value;
    true
}

/// Perturb every gene independently with probability `bounds.mutation_chance`.
///
/// Continuous genes take a clipped Gaussian step, discrete genes are redrawn
/// uniformly, cluster slots delegate to their own mutator. Returns whether any
/// gene actually changed.
///
/// `bounds` must already be validated; probabilities outside `[0, 1]` panic.
pub fn mutate<P: ClusterParams, R: Rng>(genome: &mut Genome<P>, bounds: &BoundsConfig, rng: &mut R) -> bool {
    debug_assert!(bounds.validate().is_ok(), "unvalidated bounds: {:?}", bounds.validate());
    debug_assert_eq!(genome.child_depth(), bounds.child_depth);
    let chance = bounds.mutation_chance;
    let stdev = bounds.mutation_stdev;
    let mut changed = false;

    {
        let scalars = genome.scalars_mut();
        if rng.gen_bool(chance) {
            let value = uniform_usize(rng, 0, bounds.max_extra_answer_turns);
            changed |= replace(scalars.extra_answer_turns, value);
        }
        if rng.gen_bool(chance) {
            let value = uniform_usize(rng, 0, bounds.max_perturb_runs);
            changed |= replace(scalars.num_perturb_runs, value);
        }
        if rng.gen_bool(chance) {
            let value = gaussian_step(rng, *scalars.perturb_chance, 0.0, 1.0, stdev);
            changed |= replace(scalars.perturb_chance, value);
        }
        if rng.gen_bool(chance) {
            let value = gaussian_step(
                rng,
                *scalars.perturb_factor,
                bounds.min_perturb_factor,
                bounds.max_perturb_factor,
                stdev,
            );
            changed |= replace(scalars.perturb_factor, value);
        }
    }

    for params in genome.cluster_slots_mut().iter_mut().flatten() {
        changed |= params.mutate(bounds, rng);
    }

    for level in 0..genome.num_convolution_layers() {
        if let Some(types) = genome.level_mut(level) {
            for props in types.iter_mut() {
                changed |= mutate_convolution_properties(props, level, bounds, rng);
            }
        }
    }

    debug_assert!(genome.check_structure().is_ok());
    changed
}

/// Field-by-field perturbation of one convolution record at `level`.
/// A rank change resizes `dimensions`, drawing any new entries fresh.
pub fn mutate_convolution_properties<R: Rng>(
    props: &mut ConvolutionProperties,
    level: usize,
    bounds: &BoundsConfig,
    rng: &mut R,
) -> bool {
    let chance = bounds.mutation_chance;
    let stdev = bounds.mutation_stdev;
    let (min_dim, max_dim) = bounds.convolution_dimension_range(level);
    let mut changed = false;

    if rng.gen_bool(chance) {
        let rank = uniform_usize(rng, bounds.min_convolution_rank, bounds.max_convolution_rank);
        if replace(&mut props.rank, rank) {
            changed = true;
            props.dimensions.truncate(rank);
            while props.dimensions.len() < rank {
                props.dimensions.push(uniform_usize(rng, min_dim, max_dim));
            }
        }
    }
    for dim in props.dimensions.iter_mut() {
        if rng.gen_bool(chance) {
            let value = uniform_usize(rng, min_dim, max_dim);
            changed |= replace(dim, value);
        }
    }
    if rng.gen_bool(chance) {
        let value = uniform_usize(
            rng,
            bounds.min_convolution_node_layers,
            bounds.max_convolution_node_layers,
        );
        changed |= replace(&mut props.num_layers, value);
    }
    if rng.gen_bool(chance) {
        let value = uniform_usize(
            rng,
            bounds.min_convolution_nodes_per_layer,
            bounds.max_convolution_nodes_per_layer,
        );
        changed |= replace(&mut props.nodes_per_layer, value);
    }
    if rng.gen_bool(chance) {
        let value = gaussian_step(
            rng,
            props.stepfactor,
            bounds.min_convolution_step_factor,
            bounds.max_convolution_step_factor,
            stdev,
        );
        changed |= replace(&mut props.stepfactor, value);
    }
    if rng.gen_bool(chance) {
        let value = gaussian_step(
            rng,
            props.transfer_width,
            bounds.min_convolution_transfer_width,
            bounds.max_convolution_transfer_width,
            stdev,
        );
        changed |= replace(&mut props.transfer_width, value);
    }

    debug_assert_eq!(props.dimensions.len(), props.rank);
    changed
}

/// With probability `bounds.rare_mutation_chance`, apply one structural change
/// picked uniformly among those the bounds currently allow. Same precondition
/// on `bounds` as [`mutate`].
pub fn rare_mutate<P: ClusterParams, R: Rng>(genome: &mut Genome<P>, bounds: &BoundsConfig, rng: &mut R) -> bool {
    debug_assert!(bounds.validate().is_ok(), "unvalidated bounds: {:?}", bounds.validate());
    if !rng.gen_bool(bounds.rare_mutation_chance) {
        return false;
    }
    let candidates = applicable_structural_mutations(genome, bounds);
    match candidates.choose(rng) {
        Some(&kind) => apply_structural_mutation(genome, kind, bounds, rng),
        None => false,
    }
}

/// Structural changes that keep `genome` within `bounds`.
pub fn applicable_structural_mutations<P: ClusterParams>(
    genome: &Genome<P>,
    bounds: &BoundsConfig,
) -> Vec<StructuralMutation> {
    let mut candidates = Vec::with_capacity(5);
    let levels = genome.num_convolution_layers();
    if levels < bounds.max_convolution_levels {
        candidates.push(StructuralMutation::AddLevel);
    }
    if levels > bounds.min_convolution_levels {
        candidates.push(StructuralMutation::RemoveLevel);
    }
    if genome
        .num_convolution_types()
        .iter()
        .any(|&n| n < bounds.max_convolutions)
    {
        candidates.push(StructuralMutation::AddType);
    }
    if genome
        .num_convolution_types()
        .iter()
        .any(|&n| n > bounds.min_convolutions)
    {
        candidates.push(StructuralMutation::RemoveType);
    }
    if genome.child_depth() > 0 {
        candidates.push(StructuralMutation::RegenerateCluster);
    }
    candidates
}

/// Apply one structural change. Returns false when `kind` is not applicable.
///
/// New levels are appended after the deepest one, so existing levels keep
/// their index and their dimension bounds. Removing a level moves deeper
/// levels up, where dimension ranges are never narrower.
pub fn apply_structural_mutation<P: ClusterParams, R: Rng>(
    genome: &mut Genome<P>,
    kind: StructuralMutation,
    bounds: &BoundsConfig,
    rng: &mut R,
) -> bool {
    let levels = genome.num_convolution_layers();
    let applied = match kind {
        StructuralMutation::AddLevel => {
            if levels >= bounds.max_convolution_levels {
                return false;
            }
            let types = random_convolution_level(bounds, levels, genome.default_conv_prop(), rng);
            genome.push_level(types);
            true
        }
        StructuralMutation::RemoveLevel => {
            if levels <= bounds.min_convolution_levels || levels == 0 {
                return false;
            }
            let level = rng.gen_range(0..levels);
            genome.remove_level(level);
            true
        }
        StructuralMutation::AddType => {
            let eligible: Vec<usize> = genome
                .num_convolution_types()
                .iter()
                .enumerate()
                .filter(|&(_, &n)| n < bounds.max_convolutions)
                .map(|(level, _)| level)
                .collect();
            let Some(&level) = eligible.choose(rng) else {
                return false;
            };
            let props = random_convolution_properties(bounds, level, genome.default_conv_prop(), rng);
            genome.push_type(level, props);
            true
        }
        StructuralMutation::RemoveType => {
            let eligible: Vec<usize> = genome
                .num_convolution_types()
                .iter()
                .enumerate()
                .filter(|&(_, &n)| n > bounds.min_convolutions)
                .map(|(level, _)| level)
                .collect();
            let Some(&level) = eligible.choose(rng) else {
                return false;
            };
            let index = rng.gen_range(0..genome.num_convolution_types()[level]);
            genome.remove_type(level, index);
            true
        }
        StructuralMutation::RegenerateCluster => {
            let depth = genome.child_depth();
            if depth == 0 {
                return false;
            }
            let index = rng.gen_range(0..depth);
            let fresh = P::random_create(bounds, rng);
            let previous = genome.cluster_slot(index).cloned();
            genome.cluster_slots_mut()[index] = Some(fresh);
            previous.as_ref() != genome.cluster_slot(index)
        }
    };

    if applied {
        log::debug!(
            "Rare mutation {:?}: levels {:?}",
            kind,
            genome.num_convolution_types()
        );
    }
    debug_assert!(genome.check_structure().is_ok());
    applied
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engines::generation::cluster::ClusterParameters;
    use crate::engines::generation::generator::random_genome;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    fn wide_bounds() -> BoundsConfig {
        BoundsConfig {
            min_convolution_levels: 1,
            max_convolution_levels: 4,
            min_convolutions: 1,
            max_convolutions: 3,
            max_convolution_rank: 3,
            max_perturb_runs: 4,
            ..BoundsConfig::default()
        }
    }

    #[cfg(debug_assertions)]
    #[test]
    #[should_panic(expected = "unvalidated bounds")]
    fn test_out_of_range_chance_is_caught() {
        let bounds = BoundsConfig::default();
        let mut rng = StdRng::seed_from_u64(21);
        let mut genome: Genome<ClusterParameters> = random_genome(&bounds, &mut rng).unwrap();
        let broken = BoundsConfig {
            mutation_chance: 1.5,
            ..bounds
        };
        mutate(&mut genome, &broken, &mut rng);
    }

    #[test]
    fn test_rank_change_resizes_dimensions() {
        let bounds = BoundsConfig {
            mutation_chance: 1.0,
            min_convolution_rank: 1,
            max_convolution_rank: 4,
            ..BoundsConfig::default()
        };
        let mut rng = StdRng::seed_from_u64(17);
        let mut props = random_convolution_properties(&bounds, 0, &ConvolutionProperties::default(), &mut rng);
        for _ in 0..200 {
            mutate_convolution_properties(&mut props, 0, &bounds, &mut rng);
            assert_eq!(props.dimensions.len(), props.rank);
        }
    }

    #[test]
    fn test_every_structural_mutation_keeps_counts_in_step() {
        let bounds = wide_bounds();
        let mut rng = StdRng::seed_from_u64(23);
        let mut genome: Genome<ClusterParameters> = random_genome(&bounds, &mut rng).unwrap();

        let kinds = [
            StructuralMutation::AddLevel,
            StructuralMutation::AddType,
            StructuralMutation::RemoveType,
            StructuralMutation::RemoveLevel,
            StructuralMutation::RegenerateCluster,
        ];
        for i in 0..500 {
            let kind = kinds[i % kinds.len()];
            apply_structural_mutation(&mut genome, kind, &bounds, &mut rng);
            assert!(genome.check_structure().is_ok());
            assert!(genome.validate(&bounds).is_ok());
        }
    }

    #[test]
    fn test_structural_mutation_refused_at_limits() {
        let bounds = BoundsConfig {
            min_convolution_levels: 2,
            max_convolution_levels: 2,
            min_convolutions: 2,
            max_convolutions: 2,
            ..BoundsConfig::default()
        };
        let mut rng = StdRng::seed_from_u64(2);
        let mut genome: Genome<ClusterParameters> = random_genome(&bounds, &mut rng).unwrap();
        let before = genome.clone();

        assert_eq!(
            applicable_structural_mutations(&genome, &bounds),
            vec![StructuralMutation::RegenerateCluster]
        );
        assert!(!apply_structural_mutation(&mut genome, StructuralMutation::AddLevel, &bounds, &mut rng));
        assert!(!apply_structural_mutation(&mut genome, StructuralMutation::RemoveType, &bounds, &mut rng));
        assert_eq!(genome, before);
    }

    #[test]
    fn test_rare_mutation_never_fires_at_zero_chance() {
        let bounds = BoundsConfig {
            rare_mutation_chance: 0.0,
            ..wide_bounds()
        };
        let mut rng = StdRng::seed_from_u64(4);
        let mut genome: Genome<ClusterParameters> = random_genome(&bounds, &mut rng).unwrap();
        let before = genome.clone();
        for _ in 0..100 {
            assert!(!rare_mutate(&mut genome, &bounds, &mut rng));
        }
        assert_eq!(genome, before);
    }
}
