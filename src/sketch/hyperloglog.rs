// HyperLogLog for distinct count estimation
//
// Cardinality estimates with relative standard error 1.04/sqrt(2^precision)
// using 2^precision single-byte registers, regardless of actual cardinality.

use crate::error::{EngineError, Result};
use crate::sketch::hash_bytes;

/// Fixed-memory distinct-count estimator.
#[derive(Debug, Clone)]
pub struct HyperLogLog {
    /// Precision parameter (4-16)
    precision: u8,
    /// Number of registers: 2^precision
    num_registers: usize,
    /// Registers storing maximum rank seen
    registers: Vec<u8>,
    /// Bias correction constant
    alpha: f64,
}

impl HyperLogLog {
    /// Create a sketch with the given precision.
    ///
    /// Precision p gives 2^p registers and ~1.04/sqrt(2^p) standard error.
    pub fn new(precision: u8) -> Result<Self> {
        if !(4..=16).contains(&precision) {
            return Err(EngineError::InvalidArgument(format!(
                "cardinality precision must be between 4 and 16, got {}",
                precision
            )));
        }

        let num_registers = 1usize << precision;
        Ok(Self {
            precision,
            num_registers,
            registers: vec![0; num_registers],
            alpha: Self::alpha_for(num_registers),
        })
    }

    /// Add an element.
    ///
    /// The top `precision` bits of the hash pick the register; the rank of
    /// the leading one bit in the remainder is written if it exceeds the
    /// current register value.
    pub fn add(&mut self, bytes: &[u8]) {
        let hash = hash_bytes(bytes);

        let index = (hash >> (64 - self.precision)) as usize;

        // Remaining bits, shifted so their first bit is the word's MSB
        let rest = hash << self.precision;
        let rank = if rest == 0 {
            // Saturating cap: register width + 1
            64 - self.precision as u32 + 1
        } else {
            rest.leading_zeros() + 1
        } as u8;

        if rank > self.registers[index] {
            self.registers[index] = rank;
        }
    }

    /// Estimate the number of distinct elements seen.
    pub fn count(&self) -> u64 {
        let m = self.num_registers as f64;

        // Harmonic mean of 2^register values
        let raw_estimate = self.alpha * m * m
            / self
                .registers
                .iter()
                .map(|&r| 2.0f64.powi(-(r as i32)))
                .sum::<f64>();

        if raw_estimate <= 2.5 * m {
            // Small range correction: linear counting over empty registers
            let zeros = self.registers.iter().filter(|&&r| r == 0).count();
            if zeros > 0 {
                return (m * (m / zeros as f64).ln()) as u64;
            }
        }

        let two_pow_32 = (1u64 << 32) as f64;
        if raw_estimate <= two_pow_32 / 30.0 {
            return raw_estimate as u64;
        }

        // Large range correction
        (-two_pow_32 * (1.0 - raw_estimate / two_pow_32).ln()) as u64
    }

    /// Merge another sketch into this one (register-wise max).
    pub fn merge(&mut self, other: &HyperLogLog) -> Result<()> {
        if self.precision != other.precision {
            return Err(EngineError::ShapeMismatch(format!(
                "cannot merge cardinality sketches with precisions {} and {}",
                self.precision, other.precision
            )));
        }

        for (register, &other_value) in self.registers.iter_mut().zip(other.registers.iter()) {
            *register = (*register).max(other_value);
        }
        Ok(())
    }

    /// Reset all registers.
    pub fn clear(&mut self) {
        self.registers.fill(0);
    }

    /// Relative standard error of the estimate: 1.04/sqrt(m).
    pub fn estimated_error(&self) -> f64 {
        1.04 / (self.num_registers as f64).sqrt()
    }

    pub fn precision(&self) -> u8 {
        self.precision
    }

    pub fn num_registers(&self) -> usize {
        self.num_registers
    }

    fn alpha_for(num_registers: usize) -> f64 {
        match num_registers {
            16 => 0.673,
            32 => 0.697,
            64 => 0.709,
            _ => 0.7213 / (1.0 + 1.079 / num_registers as f64),
        }
    }
}

impl Default for HyperLogLog {
    fn default() -> Self {
        // Precision 14: 16KB of registers, ~0.8% standard error
        Self::new(14).unwrap_or_else(|_| unreachable!())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rejects_out_of_range_precision() {
        assert!(HyperLogLog::new(3).is_err());
        assert!(HyperLogLog::new(17).is_err());
        assert!(HyperLogLog::new(4).is_ok());
        assert!(HyperLogLog::new(16).is_ok());
    }

    #[test]
    fn test_estimate_within_error_bound() {
        let mut hll = HyperLogLog::new(12).unwrap();

        for i in 0..10_000u32 {
            hll.add(format!("key_{}", i).as_bytes());
        }

        let estimate = hll.count() as f64;
        let error = (estimate - 10_000.0).abs() / 10_000.0;
        // 3 sigma of 1.04/sqrt(4096) ~= 4.9%
        assert!(error < 0.05, "relative error too high: {}", error);
    }

    #[test]
    fn test_small_range_uses_linear_counting() {
        let mut hll = HyperLogLog::new(14).unwrap();
        for i in 0..50u32 {
            hll.add(format!("key_{}", i).as_bytes());
        }
        let estimate = hll.count();
        assert!((45..=55).contains(&estimate), "estimate: {}", estimate);
    }

    #[test]
    fn test_duplicates_do_not_inflate() {
        let mut hll = HyperLogLog::new(12).unwrap();
        for _ in 0..1000 {
            hll.add(b"same-key");
        }
        assert_eq!(hll.count(), 1);
    }

    #[test]
    fn test_merge_matches_union() {
        let mut left = HyperLogLog::new(12).unwrap();
        let mut right = HyperLogLog::new(12).unwrap();
        let mut both = HyperLogLog::new(12).unwrap();

        for i in 0..3000u32 {
            let key = format!("left_{}", i);
            left.add(key.as_bytes());
            both.add(key.as_bytes());
        }
        for i in 0..3000u32 {
            let key = format!("right_{}", i);
            right.add(key.as_bytes());
            both.add(key.as_bytes());
        }

        left.merge(&right).unwrap();
        assert_eq!(left.count(), both.count());
    }

    #[test]
    fn test_merge_rejects_precision_mismatch() {
        let mut left = HyperLogLog::new(12).unwrap();
        let right = HyperLogLog::new(14).unwrap();
        assert!(matches!(
            left.merge(&right),
            Err(EngineError::ShapeMismatch(_))
        ));
    }

    #[test]
    fn test_clear_and_re_add_is_deterministic() {
        let mut hll = HyperLogLog::new(12).unwrap();
        for i in 0..5000u32 {
            hll.add(format!("key_{}", i).as_bytes());
        }
        let first = hll.count();

        hll.clear();
        assert_eq!(hll.count(), 0);

        for i in 0..5000u32 {
            hll.add(format!("key_{}", i).as_bytes());
        }
        assert_eq!(hll.count(), first);
    }

    #[test]
    fn test_estimated_error() {
        let hll = HyperLogLog::new(14).unwrap();
        let expected = 1.04 / (16384.0f64).sqrt();
        assert!((hll.estimated_error() - expected).abs() < 1e-12);
    }
}
