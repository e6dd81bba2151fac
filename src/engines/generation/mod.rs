pub mod cluster;
pub mod genome;
pub mod random;
pub mod generator;
pub mod mutation;
pub mod crossover;
pub mod population;

pub use cluster::{ClusterParameters, ClusterParams};
pub use genome::Genome;
pub use generator::{random_genome, random_genome_with_template};
pub use mutation::{mutate, rare_mutate, StructuralMutation};
pub use crossover::mate;
pub use population::{generate_population, mutate_population, MutationSummary};
