// Running Window Statistics
//
// Mean and population variance over a time-bounded window, maintained as
// parallel value/timestamp vectors with running sum and sum-of-squares.
// Eviction drops the expired prefix and subtracts its contributions; cost is
// linear in the evicted prefix, everything else is O(1).

use chrono::{DateTime, Utc};

#[derive(Debug, Clone)]
pub struct WindowStats {
    values: Vec<f64>,
    timestamps: Vec<DateTime<Utc>>,
    sum: f64,
    sum_squares: f64,
    window: chrono::Duration,
}

impl WindowStats {
    pub fn new(window: chrono::Duration) -> Self {
        Self {
            values: Vec::new(),
            timestamps: Vec::new(),
            sum: 0.0,
            sum_squares: 0.0,
            window,
        }
    }

    /// Push a value, then drop entries older than `now - window`.
    ///
    /// An out-of-order record older than the window still lands first and
    /// contributes to the sums until the same call's cleanup removes it.
    pub fn add(&mut self, value: f64, timestamp: DateTime<Utc>) {
        self.add_at(value, timestamp, Utc::now());
    }

    /// Same as `add` with an explicit clock, so callers control eviction.
    pub fn add_at(&mut self, value: f64, timestamp: DateTime<Utc>, now: DateTime<Utc>) {
        self.values.push(value);
        self.timestamps.push(timestamp);
        self.sum += value;
        self.sum_squares += value * value;
        self.evict_before(now - self.window);
    }

    /// Drop the prefix with timestamps strictly before `cutoff`.
    pub fn evict_before(&mut self, cutoff: DateTime<Utc>) {
        let expired = self
            .timestamps
            .iter()
            .take_while(|&&t| t < cutoff)
            .count();
        if expired == 0 {
            return;
        }
        for value in self.values.drain(..expired) {
            self.sum -= value;
            self.sum_squares -= value * value;
        }
        self.timestamps.drain(..expired);
    }

    pub fn mean(&self) -> f64 {
        if self.values.is_empty() {
            return 0.0;
        }
        self.sum / self.values.len() as f64
    }

    /// Population variance: sum_squares/n - mean^2, clamped against
    /// floating-point drift.
    pub fn variance(&self) -> f64 {
        if self.values.len() < 2 {
            return 0.0;
        }
        let n = self.values.len() as f64;
        let mean = self.sum / n;
        (self.sum_squares / n - mean * mean).max(0.0)
    }

    pub fn count(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn window(&self) -> chrono::Duration {
        self.window
    }

    pub fn clear(&mut self) {
        self.values.clear();
        self.timestamps.clear();
        self.sum = 0.0;
        self.sum_squares = 0.0;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn at(minute: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 6, 1, 12, minute, 0).unwrap()
    }

    #[test]
    fn test_mean_and_variance() {
        let mut stats = WindowStats::new(chrono::Duration::hours(1));
        let now = at(30);
        for (i, value) in [2.0, 4.0, 6.0, 8.0].iter().enumerate() {
            stats.add_at(*value, at(i as u32), now);
        }

        assert_eq!(stats.count(), 4);
        assert!((stats.mean() - 5.0).abs() < 1e-9);
        // Population variance of {2, 4, 6, 8} is 5
        assert!((stats.variance() - 5.0).abs() < 1e-9);
    }

    #[test]
    fn test_single_value_has_zero_variance() {
        let mut stats = WindowStats::new(chrono::Duration::hours(1));
        stats.add_at(42.0, at(0), at(0));
        assert_eq!(stats.variance(), 0.0);
        assert_eq!(stats.mean(), 42.0);
    }

    #[test]
    fn test_eviction_subtracts_contributions() {
        let mut stats = WindowStats::new(chrono::Duration::minutes(10));
        let now = at(20);
        stats.add_at(100.0, at(0), now); // expired on arrival's cleanup
        stats.add_at(1.0, at(15), now);
        stats.add_at(3.0, at(16), now);

        assert_eq!(stats.count(), 2);
        assert!((stats.mean() - 2.0).abs() < 1e-9);
        assert!((stats.variance() - 1.0).abs() < 1e-9);
    }

    #[test]
    fn test_old_record_contributes_until_cleanup() {
        let mut stats = WindowStats::new(chrono::Duration::minutes(10));
        // With a clock that has not moved past the window, the stale record
        // survives this call
        stats.add_at(7.0, at(0), at(5));
        assert_eq!(stats.count(), 1);

        // The next eviction pass removes it
        stats.evict_before(at(20) - chrono::Duration::minutes(10));
        assert!(stats.is_empty());
        assert_eq!(stats.mean(), 0.0);
    }

    #[test]
    fn test_clear() {
        let mut stats = WindowStats::new(chrono::Duration::hours(1));
        stats.add_at(1.0, at(0), at(0));
        stats.clear();
        assert!(stats.is_empty());
        assert_eq!(stats.mean(), 0.0);
        assert_eq!(stats.variance(), 0.0);
    }
}
