use super::codec;
use crate::config::BoundsConfig;
use crate::engines::generation::{ClusterParams, Genome};
use crate::error::Result;
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;

/// Write `genome` to `path`, replacing any existing file.
pub fn save_to_file<P: ClusterParams, Q: AsRef<Path>>(genome: &Genome<P>, path: Q) -> Result<()> {
    let path = path.as_ref();
    let mut writer = BufWriter::new(File::create(path)?);
    codec::encode(genome, &mut writer)?;
    writer.flush()?;
    log::info!("Saved genome to {}", path.display());
    Ok(())
}

/// Read and validate a genome from `path`. The file is closed before
/// validation runs, whatever the outcome.
pub fn load_from_file<P: ClusterParams, Q: AsRef<Path>>(path: Q, bounds: &BoundsConfig) -> Result<Genome<P>> {
    let path = path.as_ref();
    let bytes = std::fs::read(path)?;
    match codec::load(&bytes, bounds) {
        Ok(genome) => {
            log::info!("Loaded genome from {}", path.display());
            Ok(genome)
        }
        Err(e) => {
            log::warn!("Rejected genome file {}: {}", path.display(), e);
            Err(e)
        }
    }
}
