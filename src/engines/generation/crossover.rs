use super::cluster::ClusterParams;
use super::genome::Genome;
use super::random::{coinflip, uniform_f64, uniform_usize};
use crate::config::{traits::ConfigSection, BoundsConfig};
use crate::error::{GenomeError, Result};
use rand::Rng;

/// Combine two genomes into a child.
///
/// Parents may differ in shape, so structure is inherited in whole units:
/// - the level count comes from one parent
/// - each level's entire type list comes from one parent (the only one that
///   has it, or either, chosen per level)
/// - each cluster slot is copied wholesale from one parent, chosen per slot
///
/// Only the scalar genes are blended, each drawn uniformly between the
/// parents' values. Parents must have the same child depth, and invalid
/// `bounds` are refused with a configuration error.
pub fn mate<P: ClusterParams, R: Rng>(
    a: &Genome<P>,
    b: &Genome<P>,
    bounds: &BoundsConfig,
    rng: &mut R,
) -> Result<Genome<P>> {
    bounds.validate()?;
    if a.child_depth() != b.child_depth() {
        return Err(GenomeError::StructuralInvariant(format!(
            "cannot mate genomes with child depth {} and {}",
            a.child_depth(),
            b.child_depth()
        )));
    }

    let template = if coinflip(rng) { a.default_conv_prop() } else { b.default_conv_prop() };
    let mut child = Genome::with_default_conv_prop(a.child_depth(), template.clone())?;

    let num_levels = if coinflip(rng) {
        a.num_convolution_layers()
    } else {
        b.num_convolution_layers()
    };
    for level in 0..num_levels {
        let types = match (a.convolution_topology().get(level), b.convolution_topology().get(level)) {
            (Some(from_a), Some(from_b)) => {
                if coinflip(rng) {
                    from_a
                } else {
                    from_b
                }
            }
            (Some(from_a), None) => from_a,
            (None, Some(from_b)) => from_b,
            (None, None) => unreachable!("level {} exceeds both parents", level),
        };
        child.push_level(types.clone());
    }

    for (index, slot) in child.cluster_slots_mut().iter_mut().enumerate() {
        let parent = if coinflip(rng) { a } else { b };
        *slot = parent.cluster_slots()[index].clone();
    }

    {
        let scalars = child.scalars_mut();
        *scalars.extra_answer_turns = blend_usize(rng, a.extra_answer_turns(), b.extra_answer_turns());
        *scalars.num_perturb_runs = blend_usize(rng, a.num_perturb_runs(), b.num_perturb_runs());
        *scalars.perturb_chance = blend_f64(rng, a.perturb_chance(), b.perturb_chance());
        *scalars.perturb_factor = blend_f64(rng, a.perturb_factor(), b.perturb_factor());
    }

    log::debug!(
        "Mated genomes {:?} x {:?} -> {:?}",
        a.num_convolution_types(),
        b.num_convolution_types(),
        child.num_convolution_types()
    );
    debug_assert!(child.check_structure().is_ok());
    debug_assert!(
        a.validate(bounds).is_err() || b.validate(bounds).is_err() || child.validate(bounds).is_ok()
    );
    Ok(child)
}

fn blend_usize<R: Rng>(rng: &mut R, x: usize, y: usize) -> usize {
    uniform_usize(rng, x.min(y), x.max(y))
}

fn blend_f64<R: Rng>(rng: &mut R, x: f64, y: f64) -> f64 {
    uniform_f64(rng, x.min(y), x.max(y))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engines::generation::cluster::ClusterParameters;
    use crate::engines::generation::generator::random_genome;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    #[test]
    fn test_child_levels_come_whole_from_a_parent() {
        let bounds = BoundsConfig {
            min_convolution_levels: 1,
            max_convolution_levels: 5,
            ..BoundsConfig::default()
        };
        let mut rng = StdRng::seed_from_u64(31);
        for _ in 0..50 {
            let a: Genome<ClusterParameters> = random_genome(&bounds, &mut rng).unwrap();
            let b: Genome<ClusterParameters> = random_genome(&bounds, &mut rng).unwrap();
            let child = mate(&a, &b, &bounds, &mut rng).unwrap();

            assert!(
                child.num_convolution_layers() == a.num_convolution_layers()
                    || child.num_convolution_layers() == b.num_convolution_layers()
            );
            for (level, types) in child.convolution_topology().iter().enumerate() {
                let in_a = a.convolution_topology().get(level) == Some(types);
                let in_b = b.convolution_topology().get(level) == Some(types);
                assert!(in_a || in_b, "level {} is not inherited whole", level);
            }
            assert!(child.validate(&bounds).is_ok());
        }
    }

    #[test]
    fn test_scalars_lie_between_parents() {
        let bounds = BoundsConfig {
            max_perturb_runs: 10,
            ..BoundsConfig::default()
        };
        let mut rng = StdRng::seed_from_u64(12);
        let a: Genome<ClusterParameters> = random_genome(&bounds, &mut rng).unwrap();
        let b: Genome<ClusterParameters> = random_genome(&bounds, &mut rng).unwrap();
        for _ in 0..100 {
            let child = mate(&a, &b, &bounds, &mut rng).unwrap();
            let (lo, hi) = (
                a.perturb_chance().min(b.perturb_chance()),
                a.perturb_chance().max(b.perturb_chance()),
            );
            assert!(child.perturb_chance() >= lo && child.perturb_chance() <= hi);
            let (lo, hi) = (
                a.num_perturb_runs().min(b.num_perturb_runs()),
                a.num_perturb_runs().max(b.num_perturb_runs()),
            );
            assert!(child.num_perturb_runs() >= lo && child.num_perturb_runs() <= hi);
        }
    }

    #[test]
    fn test_mismatched_child_depth_is_rejected() {
        let bounds = BoundsConfig::default();
        let a: Genome<ClusterParameters> = Genome::new(1);
        let b: Genome<ClusterParameters> = Genome::new(2);
        let mut rng = StdRng::seed_from_u64(0);
        assert!(matches!(
            mate(&a, &b, &bounds, &mut rng),
            Err(GenomeError::StructuralInvariant(_))
        ));
    }

    #[test]
    fn test_invalid_bounds_are_refused() {
        let bounds = BoundsConfig {
            mutation_chance: 1.5,
            ..BoundsConfig::default()
        };
        let a: Genome<ClusterParameters> = Genome::new(1);
        let mut rng = StdRng::seed_from_u64(0);
        assert!(matches!(
            mate(&a, &a, &bounds, &mut rng),
            Err(GenomeError::Configuration(_))
        ));
    }
}
