// Probabilistic Sketches
//
// Fixed-memory estimators with bounded error:
// - HyperLogLog for cardinality estimation (distinct counts)
// - Count-Min Sketch for frequency estimation and heavy hitters
// - Bloom filter for set membership, plus a time-windowed rotating variant
//
// All sketches hash raw bytes; callers feed them the derived record key.

pub mod bloom;
pub mod countmin;
pub mod hyperloglog;

pub use bloom::{BloomFilter, MembershipStats, RotatingBloomFilter};
pub use countmin::CountMinSketch;
pub use hyperloglog::HyperLogLog;

use std::collections::hash_map::DefaultHasher;
use std::hash::Hasher;

/// 64-bit byte hash shared by the sketches.
///
/// SipHash via the std default hasher: deterministic for a given input, no
/// extra dependency, good enough dispersion for register indexing.
pub(crate) fn hash_bytes(bytes: &[u8]) -> u64 {
    let mut hasher = DefaultHasher::new();
    hasher.write(bytes);
    hasher.finish()
}

/// Seeded variant used where a sketch needs independent hash functions.
pub(crate) fn hash_bytes_seeded(bytes: &[u8], seed: u64) -> u64 {
    let mut hasher = DefaultHasher::new();
    hasher.write_u64(seed);
    hasher.write(bytes);
    hasher.finish()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hash_is_deterministic() {
        assert_eq!(hash_bytes(b"pod-a"), hash_bytes(b"pod-a"));
        assert_ne!(hash_bytes(b"pod-a"), hash_bytes(b"pod-b"));
    }

    #[test]
    fn test_seeds_give_independent_hashes() {
        assert_ne!(
            hash_bytes_seeded(b"pod-a", 1),
            hash_bytes_seeded(b"pod-a", 2)
        );
    }
}
