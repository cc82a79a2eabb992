// Reservoir Sampling
//
// Fixed-size random samples over streams of unknown length:
// - `Reservoir`: uniform (algorithm R); after n >= K items every K-subset of
//   the stream is equally likely.
// - `WeightedReservoir`: A-Res weighted sampling, key u^(1/w).
// - `TimeWindowReservoir`: per-time-bucket reservoirs with oldest-bucket
//   eviction.
//
// Each instance owns its RNG; nothing here contends on a shared source.

use crate::error::{EngineError, Result};
use chrono::{DateTime, Utc};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::collections::BTreeMap;

/// Uniform fixed-size sample of a stream.
#[derive(Debug, Clone)]
pub struct Reservoir<T> {
    samples: Vec<T>,
    capacity: usize,
    items_seen: u64,
    rng: StdRng,
}

impl<T: Clone> Reservoir<T> {
    /// # Panics
    ///
    /// Panics if capacity is 0.
    pub fn new(capacity: usize) -> Self {
        assert!(capacity > 0, "reservoir capacity must be > 0");
        Self {
            samples: Vec::with_capacity(capacity),
            capacity,
            items_seen: 0,
            rng: StdRng::from_os_rng(),
        }
    }

    /// Deterministic variant for tests.
    pub fn with_seed(capacity: usize, seed: u64) -> Self {
        assert!(capacity > 0, "reservoir capacity must be > 0");
        Self {
            samples: Vec::with_capacity(capacity),
            capacity,
            items_seen: 0,
            rng: StdRng::seed_from_u64(seed),
        }
    }

    /// Offer an item; returns the slot it occupies, or `None` when the
    /// replacement draw discarded it.
    pub fn add(&mut self, item: T) -> Option<usize> {
        self.items_seen += 1;

        if self.samples.len() < self.capacity {
            self.samples.push(item);
            return Some(self.samples.len() - 1);
        }

        let j = self.rng.random_range(0..self.items_seen);
        if j < self.capacity as u64 {
            let slot = j as usize;
            self.samples[slot] = item;
            Some(slot)
        } else {
            None
        }
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn items_seen(&self) -> u64 {
        self.items_seen
    }

    pub fn samples(&self) -> &[T] {
        &self.samples
    }

    /// Copy of the current sample set.
    pub fn snapshot(&self) -> Vec<T> {
        self.samples.clone()
    }

    pub fn clear(&mut self) {
        self.samples.clear();
        self.items_seen = 0;
    }
}

/// Weighted reservoir sampling (A-Res): each item draws key u^(1/w) and the
/// K largest keys survive.
#[derive(Debug, Clone)]
pub struct WeightedReservoir<T> {
    entries: Vec<(f64, T)>,
    capacity: usize,
    items_seen: u64,
    rng: StdRng,
}

impl<T: Clone> WeightedReservoir<T> {
    pub fn new(capacity: usize) -> Self {
        assert!(capacity > 0, "reservoir capacity must be > 0");
        Self {
            entries: Vec::with_capacity(capacity),
            capacity,
            items_seen: 0,
            rng: StdRng::from_os_rng(),
        }
    }

    pub fn with_seed(capacity: usize, seed: u64) -> Self {
        assert!(capacity > 0, "reservoir capacity must be > 0");
        Self {
            entries: Vec::with_capacity(capacity),
            capacity,
            items_seen: 0,
            rng: StdRng::seed_from_u64(seed),
        }
    }

    /// Offer an item with the given weight; returns whether it was retained.
    pub fn add(&mut self, item: T, weight: f64) -> Result<bool> {
        if weight <= 0.0 || !weight.is_finite() {
            return Err(EngineError::InvalidArgument(format!(
                "reservoir weight must be positive and finite, got {}",
                weight
            )));
        }

        self.items_seen += 1;

        // u in (0, 1]; random() yields [0, 1)
        let u = 1.0 - self.rng.random::<f64>();
        let key = u.powf(1.0 / weight);

        if self.entries.len() < self.capacity {
            self.entries.push((key, item));
            return Ok(true);
        }

        let (min_index, min_key) = self
            .entries
            .iter()
            .enumerate()
            .map(|(i, (k, _))| (i, *k))
            .min_by(|a, b| a.1.total_cmp(&b.1))
            .unwrap_or((0, 0.0));

        if key > min_key {
            self.entries[min_index] = (key, item);
            Ok(true)
        } else {
            Ok(false)
        }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn items_seen(&self) -> u64 {
        self.items_seen
    }

    pub fn snapshot(&self) -> Vec<T> {
        self.entries.iter().map(|(_, item)| item.clone()).collect()
    }

    pub fn clear(&mut self) {
        self.entries.clear();
        self.items_seen = 0;
    }
}

/// Per-time-bucket reservoirs: records land in the bucket floor(t/window),
/// and the oldest bucket is evicted once more than `max_windows` exist.
#[derive(Debug, Clone)]
pub struct TimeWindowReservoir<T> {
    buckets: BTreeMap<i64, Reservoir<T>>,
    window: chrono::Duration,
    max_windows: usize,
    capacity_per_window: usize,
    items_seen: u64,
}

impl<T: Clone> TimeWindowReservoir<T> {
    pub fn new(window: chrono::Duration, max_windows: usize, capacity_per_window: usize) -> Self {
        assert!(max_windows > 0, "window count must be > 0");
        assert!(
            window.num_milliseconds() > 0,
            "window duration must be positive"
        );
        Self {
            buckets: BTreeMap::new(),
            window,
            max_windows,
            capacity_per_window,
            items_seen: 0,
        }
    }

    fn bucket_key(&self, timestamp: DateTime<Utc>) -> i64 {
        timestamp.timestamp_millis().div_euclid(self.window.num_milliseconds())
    }

    pub fn add(&mut self, item: T, timestamp: DateTime<Utc>) -> Option<usize> {
        self.items_seen += 1;
        let key = self.bucket_key(timestamp);
        let capacity = self.capacity_per_window;
        let slot = self
            .buckets
            .entry(key)
            .or_insert_with(|| Reservoir::new(capacity))
            .add(item);

        while self.buckets.len() > self.max_windows {
            let oldest = *self.buckets.keys().next().unwrap_or(&key);
            self.buckets.remove(&oldest);
        }
        slot
    }

    /// Samples from the bucket containing the given timestamp.
    pub fn samples_at(&self, timestamp: DateTime<Utc>) -> Vec<T> {
        self.buckets
            .get(&self.bucket_key(timestamp))
            .map(|r| r.snapshot())
            .unwrap_or_default()
    }

    /// Samples from the most recent `n` buckets.
    pub fn last_windows(&self, n: usize) -> Vec<T> {
        self.buckets
            .values()
            .rev()
            .take(n)
            .flat_map(|r| r.snapshot())
            .collect()
    }

    pub fn window_count(&self) -> usize {
        self.buckets.len()
    }

    pub fn len(&self) -> usize {
        self.buckets.values().map(|r| r.len()).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn items_seen(&self) -> u64 {
        self.items_seen
    }

    pub fn snapshot(&self) -> Vec<T> {
        self.buckets.values().flat_map(|r| r.snapshot()).collect()
    }

    pub fn clear(&mut self) {
        self.buckets.clear();
        self.items_seen = 0;
    }
}
