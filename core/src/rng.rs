use rand::{rngs::StdRng, Rng, SeedableRng};

/// Construct a deterministic RNG from a fixed seed.
pub fn seeded_rng(seed: u64) -> StdRng {
    StdRng::seed_from_u64(seed)
}

/// Half-width of the Glorot/Xavier uniform interval for a `fan_in x fan_out` matrix.
pub fn glorot_limit(fan_in: usize, fan_out: usize, gain: f64) -> f64 {
    gain * (6.0 / (fan_in + fan_out) as f64).sqrt()
}

/// Sample `fan_in * fan_out` values uniformly from `[-limit, limit)`, row-major.
pub fn glorot_uniform(rng: &mut StdRng, fan_in: usize, fan_out: usize, gain: f64) -> Vec<f64> {
    let limit = glorot_limit(fan_in, fan_out, gain);
    (0..fan_in * fan_out)
        .map(|_| rng.gen_range(-limit..limit))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn samples_stay_inside_the_glorot_bound() {
        let mut rng = seeded_rng(3);
        let limit = glorot_limit(784, 128, 1.0);
        let values = glorot_uniform(&mut rng, 784, 128, 1.0);

        assert_eq!(values.len(), 784 * 128);
        assert!(values.iter().all(|v| v.abs() <= limit));
        assert!((limit - (6.0f64 / 912.0).sqrt()).abs() < 1e-12);
    }

    #[test]
    fn same_seed_gives_same_weights() {
        let a = glorot_uniform(&mut seeded_rng(11), 64, 128, 1.0);
        let b = glorot_uniform(&mut seeded_rng(11), 64, 128, 1.0);
        assert_eq!(a, b);
    }
}
