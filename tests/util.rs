#![allow(dead_code)]
use heat_halo::prelude::*;
use rand::rngs::SmallRng;
use rand::{Rng, SeedableRng};

/// Size of the reference problem.
pub const N_REF: usize = 96;

/// Worker counts that divide `N_REF`.
pub const WORKERS: [usize; 6] = [1, 2, 3, 4, 6, 8];

/// Reproducible random state of length `n` with values in `[0, 1)`.
pub fn random_state(n: usize, seed: u64) -> Vec<f64> {
    let mut rng = SmallRng::seed_from_u64(seed);
    (0..n).map(|_| rng.r#gen::<f64>()).collect()
}

/// Short receive timeout so a broken test fails instead of hanging.
pub fn quick_config() -> SolverConfig {
    SolverConfig::default().with_comm_timeout_ms(5_000)
}

/// Assert two state vectors are identical bit for bit.
pub fn assert_bitwise_eq(got: &[f64], want: &[f64]) {
    assert_eq!(got.len(), want.len(), "length differs");
    for (i, (a, b)) in got.iter().zip(want).enumerate() {
        assert_eq!(
            a.to_bits(),
            b.to_bits(),
            "value at index {i} differs: {a:e} vs {b:e}"
        );
    }
}
