//! Deterministic seed derivation for Monte-Carlo analyses (§4.9).
//!
//! Every seeded operation in the engine (failure-pattern sampling, iteration
//! RNGs) derives its seed from a single master seed plus a tag tuple rather
//! than drawing from a shared, order-dependent RNG stream. Two runs with the
//! same master seed and the same tags always draw the same sub-seed,
//! independent of how many other derivations happened first.

use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use sha2::{Digest, Sha256};

/// Derives a 64-bit sub-seed from `master_seed` and `tags`, or `None` if
/// `master_seed` is `None` (non-deterministic mode propagates unseeded).
///
/// The sub-seed is the leading 64 bits (big-endian) of
/// `SHA256(master_seed_be_bytes || "|" || tag1 || "|" || tag2 || ...)`.
pub fn derive(master_seed: Option<u64>, tags: &[&str]) -> Option<u64> {
    let master = master_seed?;

    let mut hasher = Sha256::new();
    hasher.update(master.to_be_bytes());
    for tag in tags {
        hasher.update(b"|");
        hasher.update(tag.as_bytes());
    }
    let digest = hasher.finalize();

    let mut leading = [0u8; 8];
    leading.copy_from_slice(&digest[..8]);
    Some(u64::from_be_bytes(leading))
}

/// The seed for iteration `index` of an analysis tagged `analysis_tag`.
pub fn derive_iteration_seed(master_seed: Option<u64>, analysis_tag: &str, index: u64) -> Option<u64> {
    derive(master_seed, &[analysis_tag, &index.to_string()])
}

/// The seed a named failure policy's own sampling draws from.
pub fn derive_failure_policy_seed(master_seed: Option<u64>, policy_name: &str) -> Option<u64> {
    derive(master_seed, &["failure_policy", policy_name])
}

/// Builds a seeded RNG from a derived seed, or a non-deterministic one
/// (seeded from OS entropy) when `seed` is `None`.
pub fn rng_from_seed(seed: Option<u64>) -> ChaCha8Rng {
    let s = seed.unwrap_or_else(rand::random);
    ChaCha8Rng::seed_from_u64(s)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::Rng;

    #[test]
    fn none_master_seed_propagates_none() {
        assert_eq!(derive(None, &["a"]), None);
    }

    #[test]
    fn same_inputs_derive_the_same_seed() {
        let a = derive(Some(42), &["failure_policy", "p1"]);
        let b = derive(Some(42), &["failure_policy", "p1"]);
        assert_eq!(a, b);
        assert!(a.is_some());
    }

    #[test]
    fn distinct_tags_derive_distinct_seeds() {
        let a = derive(Some(42), &["iteration", "0"]);
        let b = derive(Some(42), &["iteration", "1"]);
        assert_ne!(a, b);
    }

    #[test]
    fn iteration_seed_is_order_independent_of_other_derivations() {
        let first = derive_iteration_seed(Some(7), "mc", 3);
        // deriving unrelated seeds in between must not perturb this result
        let _ = derive_failure_policy_seed(Some(7), "policy_a");
        let _ = derive_iteration_seed(Some(7), "mc", 0);
        let second = derive_iteration_seed(Some(7), "mc", 3);
        assert_eq!(first, second);
    }

    #[test]
    fn rng_from_seed_is_reproducible_when_seeded() {
        let mut r1 = rng_from_seed(Some(99));
        let mut r2 = rng_from_seed(Some(99));
        let v1: u64 = r1.gen();
        let v2: u64 = r2.gen();
        assert_eq!(v1, v2);
    }
}
