// Bloom filter for set membership
//
// Bit vector with k positions per key derived by double hashing. No false
// negatives; false-positive rate grows with fill. A rotating time-windowed
// variant holds W filters and expires the oldest on rotation.

use crate::error::{EngineError, Result};
use crate::sketch::hash_bytes_seeded;

/// Probabilistic set membership with bounded false-positive rate.
#[derive(Debug, Clone)]
pub struct BloomFilter {
    /// Bit vector, packed into 64-bit words
    bits: Vec<u64>,
    /// Number of addressable bits
    size: usize,
    /// Hash positions per key
    hashes: u32,
    /// Number of keys added
    inserted: u64,
    /// Hash seed
    seed: u64,
}

impl BloomFilter {
    pub fn new(size: usize, hashes: u32) -> Result<Self> {
        if size == 0 || hashes == 0 {
            return Err(EngineError::InvalidArgument(
                "membership sketch size and hash count must be > 0".to_string(),
            ));
        }

        let words = size.div_ceil(64);
        Ok(Self {
            bits: vec![0; words],
            size,
            hashes,
            inserted: 0,
            seed: fastrand::u64(..),
        })
    }

    /// Position of the i-th probe for a key: h1 + i*h2 mod size, with h2
    /// forced odd so the probe sequence covers the table.
    #[inline]
    fn positions(&self, bytes: &[u8]) -> (u64, u64) {
        let h1 = hash_bytes_seeded(bytes, self.seed);
        let h2 = hash_bytes_seeded(bytes, self.seed.wrapping_add(1)) | 1;
        (h1, h2)
    }

    /// Set all k positions for a key.
    pub fn add(&mut self, bytes: &[u8]) {
        let (h1, h2) = self.positions(bytes);
        for i in 0..self.hashes as u64 {
            let bit = (h1.wrapping_add(i.wrapping_mul(h2)) % self.size as u64) as usize;
            self.bits[bit / 64] |= 1u64 << (bit % 64);
        }
        self.inserted += 1;
    }

    /// True iff all k positions are set. Never false for an added key.
    pub fn contains(&self, bytes: &[u8]) -> bool {
        let (h1, h2) = self.positions(bytes);
        for i in 0..self.hashes as u64 {
            let bit = (h1.wrapping_add(i.wrapping_mul(h2)) % self.size as u64) as usize;
            if self.bits[bit / 64] & (1u64 << (bit % 64)) == 0 {
                return false;
            }
        }
        true
    }

    /// Bit-wise OR another filter into this one.
    ///
    /// The union reports `contains = true` whenever either input would.
    pub fn union(&mut self, other: &BloomFilter) -> Result<()> {
        if self.size != other.size || self.hashes != other.hashes {
            return Err(EngineError::ShapeMismatch(format!(
                "cannot union membership sketches {}x{} and {}x{}",
                self.size, self.hashes, other.size, other.hashes
            )));
        }
        if self.seed != other.seed {
            return Err(EngineError::ShapeMismatch(
                "cannot union membership sketches with different hash seeds".to_string(),
            ));
        }

        for (word, &other_word) in self.bits.iter_mut().zip(other.bits.iter()) {
            *word |= other_word;
        }
        self.inserted += other.inserted;
        Ok(())
    }

    /// Zero all bits and the inserted count.
    pub fn clear(&mut self) {
        self.bits.fill(0);
        self.inserted = 0;
    }

    /// Expected false-positive rate at the current fill:
    /// (1 - e^(-k*n/m))^k.
    pub fn false_positive_rate(&self) -> f64 {
        if self.inserted == 0 {
            return 0.0;
        }
        let k = self.hashes as f64;
        let n = self.inserted as f64;
        let m = self.size as f64;
        (1.0 - (-k * n / m).exp()).powf(k)
    }

    /// Estimate the number of distinct items from the set-bit fraction:
    /// -(m/k) * ln(1 - x/m).
    pub fn estimate_items(&self) -> f64 {
        let set_bits = self.count_set_bits() as f64;
        if set_bits == 0.0 {
            return 0.0;
        }
        let m = self.size as f64;
        let k = self.hashes as f64;
        -(m / k) * (1.0 - set_bits / m).ln()
    }

    /// Fraction of bits set.
    pub fn fill_ratio(&self) -> f64 {
        self.count_set_bits() as f64 / self.size as f64
    }

    /// Memory used by the bit vector, in bytes.
    pub fn memory_usage(&self) -> usize {
        self.bits.len() * 8
    }

    pub fn len(&self) -> u64 {
        self.inserted
    }

    pub fn is_empty(&self) -> bool {
        self.inserted == 0
    }

    pub fn size(&self) -> usize {
        self.size
    }

    pub fn hashes(&self) -> u32 {
        self.hashes
    }

    fn count_set_bits(&self) -> usize {
        self.bits.iter().map(|w| w.count_ones() as usize).sum()
    }

    /// Snapshot of filter health for diagnostics.
    pub fn stats(&self) -> MembershipStats {
        let bits_per_item = if self.inserted > 0 {
            self.size as f64 / self.inserted as f64
        } else {
            0.0
        };
        MembershipStats {
            inserted: self.inserted,
            size_bits: self.size,
            hashes: self.hashes,
            false_positive_rate: self.false_positive_rate(),
            fill_ratio: self.fill_ratio(),
            bits_per_item,
        }
    }
}

/// Membership sketch statistics snapshot.
#[derive(Debug, Clone)]
pub struct MembershipStats {
    pub inserted: u64,
    pub size_bits: usize,
    pub hashes: u32,
    pub false_positive_rate: f64,
    pub fill_ratio: f64,
    pub bits_per_item: f64,
}

/// Time-windowed membership: W filters with a rotating cursor.
///
/// Adds write the current filter; lookups test every window. Rotation
/// advances the cursor and clears the filter it lands on, expiring the
/// oldest window's keys.
#[derive(Debug, Clone)]
pub struct RotatingBloomFilter {
    filters: Vec<BloomFilter>,
    current: usize,
}

impl RotatingBloomFilter {
    pub fn new(windows: usize, size: usize, hashes: u32) -> Result<Self> {
        if windows == 0 {
            return Err(EngineError::InvalidArgument(
                "window count must be > 0".to_string(),
            ));
        }
        let filters = (0..windows)
            .map(|_| BloomFilter::new(size, hashes))
            .collect::<Result<Vec<_>>>()?;
        Ok(Self {
            filters,
            current: 0,
        })
    }

    pub fn add(&mut self, bytes: &[u8]) {
        self.filters[self.current].add(bytes);
    }

    pub fn contains(&self, bytes: &[u8]) -> bool {
        self.filters.iter().any(|f| f.contains(bytes))
    }

    /// Advance to the next window, clearing it.
    pub fn rotate(&mut self) {
        self.current = (self.current + 1) % self.filters.len();
        self.filters[self.current].clear();
    }

    pub fn window_count(&self) -> usize {
        self.filters.len()
    }

    pub fn len(&self) -> u64 {
        self.filters.iter().map(|f| f.len()).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn clear(&mut self) {
        for filter in &mut self.filters {
            filter.clear();
        }
        self.current = 0;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_no_false_negatives() {
        let mut bloom = BloomFilter::new(10_000, 5).unwrap();

        for i in 0..500u32 {
            bloom.add(format!("key_{}", i).as_bytes());
        }
        for i in 0..500u32 {
            assert!(bloom.contains(format!("key_{}", i).as_bytes()));
        }
    }

    #[test]
    fn test_measured_fpr_near_expected() {
        let mut bloom = BloomFilter::new(10_000, 5).unwrap();
        for i in 0..1000u32 {
            bloom.add(format!("key_{}", i).as_bytes());
        }

        let mut false_positives = 0;
        for i in 1000..3000u32 {
            if bloom.contains(format!("key_{}", i).as_bytes()) {
                false_positives += 1;
            }
        }
        let measured = false_positives as f64 / 2000.0;
        let expected = bloom.false_positive_rate();
        assert!(
            measured < expected * 3.0 + 0.02,
            "measured {} vs expected {}",
            measured,
            expected
        );
    }

    #[test]
    fn test_empty_filter_rejects_everything() {
        let bloom = BloomFilter::new(1000, 3).unwrap();
        assert!(!bloom.contains(b"anything"));
        assert_eq!(bloom.false_positive_rate(), 0.0);
        assert!(bloom.is_empty());
    }

    #[test]
    fn test_union_covers_both_inputs() {
        let mut left = BloomFilter::new(10_000, 5).unwrap();
        let mut right = left.clone();
        right.clear();

        left.add(b"left-key");
        right.add(b"right-key");

        left.union(&right).unwrap();
        assert!(left.contains(b"left-key"));
        assert!(left.contains(b"right-key"));
        assert_eq!(left.len(), 2);
    }

    #[test]
    fn test_union_is_idempotent() {
        let mut bloom = BloomFilter::new(10_000, 5).unwrap();
        for i in 0..100u32 {
            bloom.add(format!("key_{}", i).as_bytes());
        }

        let copy = bloom.clone();
        let bits_before = bloom.bits.clone();
        bloom.union(&copy).unwrap();
        assert_eq!(bloom.bits, bits_before);
    }

    #[test]
    fn test_union_rejects_shape_mismatch() {
        let mut left = BloomFilter::new(1000, 3).unwrap();
        let right = BloomFilter::new(2000, 3).unwrap();
        assert!(matches!(
            left.union(&right),
            Err(EngineError::ShapeMismatch(_))
        ));
    }

    #[test]
    fn test_estimate_items_tracks_inserts() {
        let mut bloom = BloomFilter::new(100_000, 5).unwrap();
        for i in 0..1000u32 {
            bloom.add(format!("key_{}", i).as_bytes());
        }
        let estimate = bloom.estimate_items();
        assert!(
            (estimate - 1000.0).abs() / 1000.0 < 0.1,
            "estimate: {}",
            estimate
        );
    }

    #[test]
    fn test_clear() {
        let mut bloom = BloomFilter::new(1000, 3).unwrap();
        bloom.add(b"key");
        bloom.clear();
        assert!(!bloom.contains(b"key"));
        assert_eq!(bloom.len(), 0);
        assert_eq!(bloom.fill_ratio(), 0.0);
    }

    #[test]
    fn test_stats_snapshot() {
        let mut bloom = BloomFilter::new(10_000, 5).unwrap();
        for i in 0..100u32 {
            bloom.add(format!("key_{}", i).as_bytes());
        }
        let stats = bloom.stats();
        assert_eq!(stats.inserted, 100);
        assert!(stats.fill_ratio > 0.0 && stats.fill_ratio < 1.0);
        assert!(stats.false_positive_rate < 0.01);
    }

    #[test]
    fn test_rotation_expires_oldest_window() {
        let mut rotating = RotatingBloomFilter::new(3, 10_000, 5).unwrap();

        rotating.add(b"oldest");
        rotating.rotate();
        rotating.add(b"middle");
        rotating.rotate();
        rotating.add(b"newest");

        assert!(rotating.contains(b"oldest"));
        assert!(rotating.contains(b"middle"));
        assert!(rotating.contains(b"newest"));

        // Cursor wraps onto the window holding "oldest" and clears it
        rotating.rotate();
        assert!(!rotating.contains(b"oldest"));
        assert!(rotating.contains(b"middle"));
        assert!(rotating.contains(b"newest"));
    }

    #[test]
    fn test_rotating_rejects_zero_windows() {
        assert!(RotatingBloomFilter::new(0, 1000, 3).is_err());
    }
}
