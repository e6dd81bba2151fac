use super::random::{gaussian_step, log_uniform_f64, uniform_f64, uniform_usize};
use crate::config::BoundsConfig;
use crate::error::{GenomeError, Result};
use byteorder::{LittleEndian, ReadBytesExt, WriteBytesExt};
use rand::Rng;
use serde::{Deserialize, Serialize};
use std::fmt::Debug;
use std::io::Cursor;

/// Contract for the per-depth cluster hyperparameter bundle a genome owns.
///
/// The genome never looks inside an implementation; it only creates, copies
/// (`Clone`), mutates and serializes through this trait.
pub trait ClusterParams: Clone + PartialEq + Debug + Send + Sync {
    fn random_create<R: Rng>(bounds: &BoundsConfig, rng: &mut R) -> Self;

    /// Perturbs in place; returns whether anything changed.
    fn mutate<R: Rng>(&mut self, bounds: &BoundsConfig, rng: &mut R) -> bool;

    /// Fails with a range error if any field lies outside `bounds`.
    fn validate(&self, bounds: &BoundsConfig) -> Result<()>;

    fn has_side_weights(&self) -> bool;

    fn to_bytes(&self) -> Vec<u8>;

    /// Parses a blob written by `to_bytes`; malformed input is a format error.
    fn from_bytes(bytes: &[u8]) -> Result<Self>;
}

/// Default cluster hyperparameters: network shape plus learning dynamics.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClusterParameters {
    pub num_layers: usize,
    pub nodes_per_layer: usize,
    pub step_factor: f64,
    pub mem_factor: f64,
    pub mem_norm: f64,
    pub learn_style_side: usize,
    pub transfer_width: f64,
    pub side_weights: bool,
    pub side_mems: bool,
}

fn truncated(e: std::io::Error) -> GenomeError {
    GenomeError::Format(format!("cluster parameter blob truncated: {}", e))
}

fn read_flag(cursor: &mut Cursor<&[u8]>) -> Result<bool> {
    match cursor.read_u8().map_err(truncated)? {
        0 => Ok(false),
        1 => Ok(true),
        other => Err(GenomeError::Format(format!("invalid cluster flag byte {}", other))),
    }
}

fn out_of_range<T: std::fmt::Display>(name: &str, value: T, min: T, max: T) -> GenomeError {
    GenomeError::Range(format!("cluster {name} {value} outside [{min}, {max}]"))
}

impl ClusterParams for ClusterParameters {
    fn random_create<R: Rng>(bounds: &BoundsConfig, rng: &mut R) -> Self {
        Self {
            num_layers: uniform_usize(rng, bounds.min_layers, bounds.max_layers),
            nodes_per_layer: uniform_usize(rng, bounds.min_nodes_per_layer, bounds.max_nodes_per_layer),
            step_factor: log_uniform_f64(rng, bounds.min_step_factor, bounds.max_step_factor),
            mem_factor: uniform_f64(rng, bounds.min_mem_factor, bounds.max_mem_factor),
            mem_norm: uniform_f64(rng, bounds.min_mem_norm, bounds.max_mem_norm),
            learn_style_side: rng.gen_range(0..bounds.num_learn_styles_side),
            transfer_width: uniform_f64(rng, bounds.min_transfer_width, bounds.max_transfer_width),
            side_weights: bounds.allow_side_weights && rng.gen_bool(0.5),
            side_mems: bounds.allow_side_mems && rng.gen_bool(0.5),
        }
    }

    fn mutate<R: Rng>(&mut self, bounds: &BoundsConfig, rng: &mut R) -> bool {
        let before = self.clone();
        let chance = bounds.mutation_chance;
        let stdev = bounds.mutation_stdev;

        if rng.gen_bool(chance) {
            self.num_layers = uniform_usize(rng, bounds.min_layers, bounds.max_layers);
        }
        if rng.gen_bool(chance) {
            self.nodes_per_layer =
                uniform_usize(rng, bounds.min_nodes_per_layer, bounds.max_nodes_per_layer);
        }
        if rng.gen_bool(chance) {
            self.step_factor = gaussian_step(
                rng,
                self.step_factor,
                bounds.min_step_factor,
                bounds.max_step_factor,
                stdev,
            );
        }
        if rng.gen_bool(chance) {
            self.mem_factor =
                gaussian_step(rng, self.mem_factor, bounds.min_mem_factor, bounds.max_mem_factor, stdev);
        }
        if rng.gen_bool(chance) {
            self.mem_norm =
                gaussian_step(rng, self.mem_norm, bounds.min_mem_norm, bounds.max_mem_norm, stdev);
        }
        if rng.gen_bool(chance) {
            self.learn_style_side = rng.gen_range(0..bounds.num_learn_styles_side);
        }
        if rng.gen_bool(chance) {
            self.transfer_width = gaussian_step(
                rng,
                self.transfer_width,
                bounds.min_transfer_width,
                bounds.max_transfer_width,
                stdev,
            );
        }
        if bounds.allow_side_weights && rng.gen_bool(chance) {
            self.side_weights = !self.side_weights;
        }
        if bounds.allow_side_mems && rng.gen_bool(chance) {
            self.side_mems = !self.side_mems;
        }

        *self != before
    }

    fn validate(&self, bounds: &BoundsConfig) -> Result<()> {
        if !(bounds.min_layers..=bounds.max_layers).contains(&self.num_layers) {
            return Err(out_of_range("num_layers", self.num_layers, bounds.min_layers, bounds.max_layers));
        }
        if !(bounds.min_nodes_per_layer..=bounds.max_nodes_per_layer).contains(&self.nodes_per_layer) {
            return Err(out_of_range(
                "nodes_per_layer",
                self.nodes_per_layer,
                bounds.min_nodes_per_layer,
                bounds.max_nodes_per_layer,
            ));
        }
        let floats = [
            ("step_factor", self.step_factor, bounds.min_step_factor, bounds.max_step_factor),
            ("mem_factor", self.mem_factor, bounds.min_mem_factor, bounds.max_mem_factor),
            ("mem_norm", self.mem_norm, bounds.min_mem_norm, bounds.max_mem_norm),
            (
                "transfer_width",
                self.transfer_width,
                bounds.min_transfer_width,
                bounds.max_transfer_width,
            ),
        ];
        for (name, value, min, max) in floats {
            if !(min..=max).contains(&value) {
                return Err(out_of_range(name, value, min, max));
            }
        }
        if self.learn_style_side >= bounds.num_learn_styles_side {
            return Err(GenomeError::Range(format!(
                "cluster learn_style_side {} not below {}",
                self.learn_style_side, bounds.num_learn_styles_side
            )));
        }
        if self.side_weights && !bounds.allow_side_weights {
            return Err(GenomeError::Range("side weights are disabled".to_string()));
        }
        if self.side_mems && !bounds.allow_side_mems {
            return Err(GenomeError::Range("side memories are disabled".to_string()));
        }
        Ok(())
    }

    fn has_side_weights(&self) -> bool {
        self.side_weights
    }

    fn to_bytes(&self) -> Vec<u8> {
        let mut buf = Vec::with_capacity(58);
        // Writing into a Vec cannot fail; validated bounds keep counts within u32
        let _ = buf.write_u32::<LittleEndian>(self.num_layers as u32);
        let _ = buf.write_u32::<LittleEndian>(self.nodes_per_layer as u32);
        let _ = buf.write_f64::<LittleEndian>(self.step_factor);
        let _ = buf.write_f64::<LittleEndian>(self.mem_factor);
        let _ = buf.write_f64::<LittleEndian>(self.mem_norm);
        let _ = buf.write_u32::<LittleEndian>(self.learn_style_side as u32);
        let _ = buf.write_f64::<LittleEndian>(self.transfer_width);
        let _ = buf.write_u8(self.side_weights as u8);
        let _ = buf.write_u8(self.side_mems as u8);
        buf
    }

    fn from_bytes(bytes: &[u8]) -> Result<Self> {
        let mut cursor = Cursor::new(bytes);

        let params = Self {
            num_layers: cursor.read_u32::<LittleEndian>().map_err(truncated)? as usize,
            nodes_per_layer: cursor.read_u32::<LittleEndian>().map_err(truncated)? as usize,
            step_factor: cursor.read_f64::<LittleEndian>().map_err(truncated)?,
            mem_factor: cursor.read_f64::<LittleEndian>().map_err(truncated)?,
            mem_norm: cursor.read_f64::<LittleEndian>().map_err(truncated)?,
            learn_style_side: cursor.read_u32::<LittleEndian>().map_err(truncated)? as usize,
            transfer_width: cursor.read_f64::<LittleEndian>().map_err(truncated)?,
            side_weights: read_flag(&mut cursor)?,
            side_mems: read_flag(&mut cursor)?,
        };

        if cursor.position() as usize != bytes.len() {
            return Err(GenomeError::Format(format!(
                "{} trailing bytes after cluster parameters",
                bytes.len() - cursor.position() as usize
            )));
        }
        Ok(params)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    #[test]
    fn test_random_create_respects_bounds() {
        let bounds = BoundsConfig {
            allow_side_weights: true,
            ..BoundsConfig::default()
        };
        let mut rng = StdRng::seed_from_u64(11);
        for _ in 0..200 {
            let params = ClusterParameters::random_create(&bounds, &mut rng);
            assert!(params.validate(&bounds).is_ok());
            assert!(!params.side_mems);
        }
    }

    #[test]
    fn test_side_weights_follow_feature_flag() {
        let bounds = BoundsConfig::default();
        let mut rng = StdRng::seed_from_u64(5);
        for _ in 0..100 {
            let mut params = ClusterParameters::random_create(&bounds, &mut rng);
            assert!(!params.has_side_weights());
            params.mutate(&BoundsConfig { mutation_chance: 1.0, ..bounds.clone() }, &mut rng);
            assert!(!params.has_side_weights());
        }
    }

    #[test]
    fn test_zero_chance_mutation_is_noop() {
        let bounds = BoundsConfig {
            mutation_chance: 0.0,
            ..BoundsConfig::default()
        };
        let mut rng = StdRng::seed_from_u64(9);
        let mut params = ClusterParameters::random_create(&bounds, &mut rng);
        let before = params.clone();
        assert!(!params.mutate(&bounds, &mut rng));
        assert_eq!(params, before);
    }

    #[test]
    fn test_blob_roundtrip_and_truncation() {
        let mut rng = StdRng::seed_from_u64(1);
        let params = ClusterParameters::random_create(&BoundsConfig::default(), &mut rng);
        let bytes = params.to_bytes();
        assert_eq!(ClusterParameters::from_bytes(&bytes).unwrap(), params);

        let result = ClusterParameters::from_bytes(&bytes[..bytes.len() / 2]);
        assert!(matches!(result, Err(GenomeError::Format(_))));

        let mut padded = bytes.clone();
        padded.push(0);
        assert!(matches!(ClusterParameters::from_bytes(&padded), Err(GenomeError::Format(_))));
    }
}
