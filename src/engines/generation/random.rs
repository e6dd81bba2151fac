//! Sampling helpers shared by generation, mutation and crossover.

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use rand_distr::{Distribution, Normal};

/// Seeded generator when a seed is given, otherwise one drawn from OS entropy.
pub fn seeded_or_entropy(seed: Option<u64>) -> StdRng {
    match seed {
        Some(seed) => StdRng::seed_from_u64(seed),
        None => StdRng::from_entropy(),
    }
}

/// What a batch of streams is used for. Passes with different purposes never
/// share a stream, even under the same seed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StreamPurpose {
    Generation,
    Mutation,
}

impl StreamPurpose {
    fn salt(self) -> u64 {
        match self {
            StreamPurpose::Generation => 0x6A09_E667_F3BC_C909,
            StreamPurpose::Mutation => 0xBB67_AE85_84CA_A73B,
        }
    }
}

/// SplitMix64 finalizer.
fn mix64(mut z: u64) -> u64 {
    z = (z ^ (z >> 30)).wrapping_mul(0xBF58_476D_1CE4_E5B9);
    z = (z ^ (z >> 27)).wrapping_mul(0x94D0_49BB_1331_11EB);
    z ^ (z >> 31)
}

/// Independent, reproducible stream for the `index`-th genome of a batch.
/// Each parallel worker gets its own generator so siblings never share state.
pub fn stream_rng(seed: u64, purpose: StreamPurpose, index: usize) -> StdRng {
    let base = mix64(seed ^ purpose.salt());
    let mixed = mix64(base ^ (index as u64).wrapping_add(1).wrapping_mul(0x9E37_79B9_7F4A_7C15));
    StdRng::seed_from_u64(mixed)
}

pub fn coinflip<R: Rng>(rng: &mut R) -> bool {
    rng.gen_bool(0.5)
}

/// Uniform integer in `[min, max]`.
pub fn uniform_usize<R: Rng>(rng: &mut R, min: usize, max: usize) -> usize {
    if min >= max {
        return min;
    }
    rng.gen_range(min..=max)
}

/// Uniform float in `[min, max]`.
pub fn uniform_f64<R: Rng>(rng: &mut R, min: f64, max: f64) -> f64 {
    if min >= max {
        return min;
    }
    rng.gen_range(min..=max)
}

/// Log-uniform float in `[min, max]`, for multiplicative factors. `min` must be positive.
pub fn log_uniform_f64<R: Rng>(rng: &mut R, min: f64, max: f64) -> f64 {
    if min >= max {
        return min;
    }
    let exponent = rng.gen_range(min.ln()..=max.ln());
    exponent.exp().clamp(min, max)
}

/// Gaussian step around `value`, clipped to `[min, max]`.
/// `stdev_fraction` scales the standard deviation by the width of the range.
pub fn gaussian_step<R: Rng>(rng: &mut R, value: f64, min: f64, max: f64, stdev_fraction: f64) -> f64 {
    let stdev = (max - min) * stdev_fraction;
    if stdev <= 0.0 {
        return value.clamp(min, max);
    }
    match Normal::new(value, stdev) {
        Ok(normal) => normal.sample(rng).clamp(min, max),
        Err(_) => value.clamp(min, max),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_streams_are_reproducible_and_distinct() {
        let a: u64 = stream_rng(42, StreamPurpose::Generation, 0).gen();
        let b: u64 = stream_rng(42, StreamPurpose::Generation, 0).gen();
        let c: u64 = stream_rng(42, StreamPurpose::Generation, 1).gen();
        assert_eq!(a, b);
        assert_ne!(a, c);
    }

    #[test]
    fn test_purposes_do_not_share_streams() {
        for index in 0..16 {
            let generation: u64 = stream_rng(7, StreamPurpose::Generation, index).gen();
            let mutation: u64 = stream_rng(7, StreamPurpose::Mutation, index).gen();
            assert_ne!(generation, mutation);
        }
    }

    #[test]
    fn test_samples_stay_in_range() {
        let mut rng = StdRng::seed_from_u64(3);
        for _ in 0..1000 {
            let v = log_uniform_f64(&mut rng, 0.001, 1.0);
            assert!((0.001..=1.0).contains(&v));

            let g = gaussian_step(&mut rng, 0.95, 0.0, 1.0, 0.5);
            assert!((0.0..=1.0).contains(&g));

            let u = uniform_usize(&mut rng, 2, 5);
            assert!((2..=5).contains(&u));
        }
    }

    #[test]
    fn test_degenerate_ranges() {
        let mut rng = StdRng::seed_from_u64(3);
        assert_eq!(uniform_usize(&mut rng, 4, 4), 4);
        assert_eq!(uniform_f64(&mut rng, 0.5, 0.5), 0.5);
        assert_eq!(gaussian_step(&mut rng, 0.5, 0.5, 0.5, 0.1), 0.5);
    }
}
