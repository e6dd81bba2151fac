use super::cluster::ClusterParams;
use super::generator::random_genome;
use super::genome::Genome;
use super::mutation::{mutate, rare_mutate};
use super::random::{stream_rng, StreamPurpose};
use crate::config::BoundsConfig;
use crate::error::Result;
use rayon::prelude::*;

/// Outcome of one parallel mutation pass.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MutationSummary {
    pub mutated: usize,
    pub rare_mutated: usize,
}

/// Generate `size` genomes in parallel. Genome `i` draws from its own stream
/// derived from `seed` and `i`, so results do not depend on thread scheduling.
pub fn generate_population<P: ClusterParams>(
    bounds: &BoundsConfig,
    size: usize,
    seed: u64,
) -> Result<Vec<Genome<P>>> {
    let population = (0..size)
        .into_par_iter()
        .map(|index| {
            let mut rng = stream_rng(seed, StreamPurpose::Generation, index);
            random_genome(bounds, &mut rng)
        })
        .collect::<Result<Vec<_>>>()?;

    log::info!("Generated population of {} genomes", population.len());
    Ok(population)
}

/// Apply `mutate` then `rare_mutate` to every genome in parallel. Streams are
/// drawn apart from those of [`generate_population`], so reusing its seed is safe.
pub fn mutate_population<P: ClusterParams>(
    population: &mut [Genome<P>],
    bounds: &BoundsConfig,
    seed: u64,
) -> MutationSummary {
    let summary = population
        .par_iter_mut()
        .enumerate()
        .map(|(index, genome)| {
            let mut rng = stream_rng(seed, StreamPurpose::Mutation, index);
            MutationSummary {
                mutated: mutate(genome, bounds, &mut rng) as usize,
                rare_mutated: rare_mutate(genome, bounds, &mut rng) as usize,
            }
        })
        .reduce(MutationSummary::default, |acc, s| MutationSummary {
            mutated: acc.mutated + s.mutated,
            rare_mutated: acc.rare_mutated + s.rare_mutated,
        });

    log::debug!(
        "Mutated {} genomes ({} structurally) of {}",
        summary.mutated,
        summary.rare_mutated,
        population.len()
    );
    summary
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engines::generation::cluster::ClusterParameters;

    #[test]
    fn test_population_is_reproducible() {
        let bounds = BoundsConfig::default();
        let first: Vec<Genome<ClusterParameters>> = generate_population(&bounds, 24, 99).unwrap();
        let second: Vec<Genome<ClusterParameters>> = generate_population(&bounds, 24, 99).unwrap();
        assert_eq!(first, second);
        assert_ne!(first[0], first[1]);
    }

    #[test]
    fn test_mutation_pass_does_not_replay_generation_stream() {
        use crate::engines::generation::generator::random_genome;

        let bounds = BoundsConfig::default();
        let population: Vec<Genome<ClusterParameters>> = generate_population(&bounds, 8, 5).unwrap();
        for (index, genome) in population.iter().enumerate() {
            let mut rng = stream_rng(5, StreamPurpose::Mutation, index);
            let replay: Genome<ClusterParameters> = random_genome(&bounds, &mut rng).unwrap();
            assert_ne!(&replay, genome);
        }
    }

    #[test]
    fn test_parallel_mutation_keeps_genomes_valid() {
        let bounds = BoundsConfig {
            min_convolution_levels: 1,
            max_convolution_levels: 4,
            mutation_chance: 0.5,
            rare_mutation_chance: 0.5,
            ..BoundsConfig::default()
        };
        let mut population: Vec<Genome<ClusterParameters>> =
            generate_population(&bounds, 32, 1).unwrap();
        for round in 0..10 {
            mutate_population(&mut population, &bounds, round);
        }
        for genome in &population {
            assert!(genome.validate(&bounds).is_ok());
        }
    }
}
