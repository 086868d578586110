//! Seeded random number generation.
//!
//! Every algorithm instance owns exactly one generator created here and
//! passes it explicitly to each sampling and operator call. Concurrent inner
//! runs never share a generator: each gets its own stream whose seed is
//! derived deterministically from the parent seed.

use rand::rngs::StdRng;
use rand::SeedableRng;

/// Generator type used throughout the crate.
pub type EvolutionRng = StdRng;

/// Creates a generator from a fixed seed.
pub fn create_rng(seed: u64) -> EvolutionRng {
    StdRng::seed_from_u64(seed)
}

/// Returns `seed` or, when absent, a fresh random seed.
pub fn resolve_seed(seed: Option<u64>) -> u64 {
    seed.unwrap_or_else(rand::random)
}

/// Derives an independent stream seed from a base seed and two indices.
///
/// Used for inner runs of the adaptive algorithm: `major` is the outer
/// iteration, `minor` the candidate index within that iteration.
pub fn derive_seed(base: u64, major: u64, minor: u64) -> u64 {
    let mut state = splitmix64(base);
    state = splitmix64(state ^ major.wrapping_mul(0x9E37_79B9_7F4A_7C15));
    splitmix64(state ^ minor.wrapping_mul(0xC2B2_AE3D_27D4_EB4F))
}

/// Folds a sequence of words into one seed.
pub(crate) fn hash_words(base: u64, words: impl IntoIterator<Item = u64>) -> u64 {
    words
        .into_iter()
        .fold(splitmix64(base), |acc, w| splitmix64(acc ^ w))
}

// SplitMix64 finalizer (Steele, Lea & Flood 2014).
fn splitmix64(mut z: u64) -> u64 {
    z = z.wrapping_add(0x9E37_79B9_7F4A_7C15);
    z = (z ^ (z >> 30)).wrapping_mul(0xBF58_476D_1CE4_E5B9);
    z = (z ^ (z >> 27)).wrapping_mul(0x94D0_49BB_1331_11EB);
    z ^ (z >> 31)
}
