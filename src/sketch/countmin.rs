// Count-Min Sketch for frequency estimation
//
// A width x depth table of counters with pairwise-independent row hashes.
// Estimates never underestimate the true post-sampling count; overestimation
// is bounded by e/width of the total with probability 1 - e^-depth.

use crate::error::{EngineError, Result};
use crate::model::TopKItem;
use crate::sketch::hash_bytes;

/// Frequency sketch with one-sided error.
#[derive(Debug, Clone)]
pub struct CountMinSketch {
    /// Width of each row (controls error: eps = e / width)
    width: usize,
    /// Number of hash rows (controls failure probability: delta = e^-depth)
    depth: usize,
    /// Counter matrix, row-major
    table: Vec<Vec<u64>>,
    /// Per-row hash constants (a_i, b_i), fixed at construction
    row_params: Vec<(u64, u64)>,
    /// Sum of all deltas seen
    total: u64,
}

impl CountMinSketch {
    pub fn new(width: usize, depth: usize) -> Result<Self> {
        if width == 0 || depth == 0 {
            return Err(EngineError::InvalidArgument(
                "frequency sketch dimensions must be > 0".to_string(),
            ));
        }

        // Odd multipliers so h_i permutes the full hash range
        let row_params = (0..depth)
            .map(|_| (fastrand::u64(..) | 1, fastrand::u64(..)))
            .collect();

        Ok(Self {
            width,
            depth,
            table: vec![vec![0; width]; depth],
            row_params,
            total: 0,
        })
    }

    /// Derive dimensions from a target error rate and failure probability.
    ///
    /// Width = ceil(e/epsilon), depth = ceil(ln(1/delta)).
    pub fn from_error_rate(epsilon: f64, delta: f64) -> Result<Self> {
        if epsilon <= 0.0 || epsilon >= 1.0 {
            return Err(EngineError::InvalidArgument(format!(
                "epsilon must be in (0, 1), got {}",
                epsilon
            )));
        }
        if delta <= 0.0 || delta >= 1.0 {
            return Err(EngineError::InvalidArgument(format!(
                "delta must be in (0, 1), got {}",
                delta
            )));
        }

        let width = (std::f64::consts::E / epsilon).ceil() as usize;
        let depth = (1.0 / delta).ln().ceil() as usize;
        Self::new(width, depth.max(1))
    }

    #[inline]
    fn bucket(&self, row: usize, hash: u64) -> usize {
        let (a, b) = self.row_params[row];
        (a.wrapping_mul(hash).wrapping_add(b) % self.width as u64) as usize
    }

    /// Add `delta` occurrences of an item.
    pub fn update(&mut self, bytes: &[u8], delta: u64) {
        let hash = hash_bytes(bytes);
        for row in 0..self.depth {
            let index = self.bucket(row, hash);
            self.table[row][index] = self.table[row][index].saturating_add(delta);
        }
        self.total = self.total.saturating_add(delta);
    }

    /// Estimate the count for an item: minimum across rows.
    pub fn estimate(&self, bytes: &[u8]) -> u64 {
        let hash = hash_bytes(bytes);
        (0..self.depth)
            .map(|row| self.table[row][self.bucket(row, hash)])
            .min()
            .unwrap_or(0)
    }

    /// Buckets in row 0 whose count is at least `threshold_fraction` of the
    /// total, sorted by count descending.
    ///
    /// This exposes bucket indices, not original keys; the sketch does not
    /// remember keys, so the result approximates the true heavy-hitter set.
    pub fn heavy_hitters(&self, threshold_fraction: f64) -> Vec<TopKItem> {
        let threshold = (threshold_fraction * self.total as f64).max(1.0) as u64;

        let mut hitters: Vec<TopKItem> = self.table[0]
            .iter()
            .enumerate()
            .filter(|(_, &count)| count >= threshold)
            .map(|(bucket, &count)| TopKItem { bucket, count })
            .collect();

        hitters.sort_by(|a, b| b.count.cmp(&a.count));
        hitters
    }

    /// The k most frequent buckets.
    pub fn top_k(&self, k: usize) -> Vec<TopKItem> {
        let mut hitters = self.heavy_hitters(0.0);
        hitters.truncate(k);
        hitters
    }

    /// Merge another sketch into this one (cell-wise sum).
    pub fn merge(&mut self, other: &CountMinSketch) -> Result<()> {
        if self.width != other.width || self.depth != other.depth {
            return Err(EngineError::ShapeMismatch(format!(
                "cannot merge frequency sketches {}x{} and {}x{}",
                self.width, self.depth, other.width, other.depth
            )));
        }

        for (row, other_row) in self.table.iter_mut().zip(other.table.iter()) {
            for (cell, &other_cell) in row.iter_mut().zip(other_row.iter()) {
                *cell = cell.saturating_add(other_cell);
            }
        }
        self.total = self.total.saturating_add(other.total);
        Ok(())
    }

    /// Zero all counters.
    pub fn clear(&mut self) {
        for row in &mut self.table {
            row.fill(0);
        }
        self.total = 0;
    }

    pub fn width(&self) -> usize {
        self.width
    }

    pub fn depth(&self) -> usize {
        self.depth
    }

    pub fn total(&self) -> u64 {
        self.total
    }

    /// Additive error bound as a fraction of the total: e / width.
    pub fn error_bound(&self) -> f64 {
        std::f64::consts::E / self.width as f64
    }

    /// Probability the error bound holds: 1 - e^-depth.
    pub fn confidence(&self) -> f64 {
        1.0 - (-(self.depth as f64)).exp()
    }
}
