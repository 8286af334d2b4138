use crate::types::Hyperparameters;
use rand::distributions::Open01;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

/// Random number generator for hyperparameter initialization.
///
/// A fixed `seed` makes repeated fits bit-for-bit reproducible; `None` draws
/// fresh entropy so every fit restarts from a different point.
pub fn seeded_rng(seed: Option<u64>) -> StdRng {
    match seed {
        Some(value) => StdRng::seed_from_u64(value),
        None => StdRng::from_entropy(),
    }
}

/// Draws `alpha` and `beta` independently from the open interval `(0, 1)`.
pub fn initial_hyperparameters<R: Rng>(rng: &mut R) -> Hyperparameters {
    let alpha: f64 = rng.sample(Open01);
    let beta: f64 = rng.sample(Open01);
    Hyperparameters::new(alpha, beta)
}
