pub mod config;
pub mod data;
pub mod engines;
pub mod error;
pub mod types;

pub use engines::generation::{ClusterParameters, ClusterParams, Genome};
pub use error::{GenomeError, Result};
pub use types::ConvolutionProperties;
