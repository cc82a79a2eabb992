// Stratified Reservoir Sampling
//
// One plain reservoir per stratum, created lazily on first observation.
// Per-stratum capacity derives from the total capacity and the stratum count
// at creation time.

use crate::sampling::reservoir::Reservoir;
use std::collections::HashMap;

/// How total capacity is split across strata.
///
/// All strategies currently derive the same equal split; the selector is the
/// extension point for proportional and Neyman-optimal allocation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum AllocationStrategy {
    Proportional,
    #[default]
    Equal,
    Optimal,
}

/// Mapping stratum -> uniform reservoir.
#[derive(Debug, Clone)]
pub struct StratifiedReservoir<T> {
    strata: HashMap<String, Reservoir<T>>,
    total_capacity: usize,
    strategy: AllocationStrategy,
    items_seen: u64,
}

impl<T: Clone> StratifiedReservoir<T> {
    pub fn new(total_capacity: usize, strategy: AllocationStrategy) -> Self {
        assert!(total_capacity > 0, "total capacity must be > 0");
        Self {
            strata: HashMap::new(),
            total_capacity,
            strategy,
            items_seen: 0,
        }
    }

    /// Capacity granted to a newly observed stratum.
    fn stratum_capacity(&self, stratum_count: usize) -> usize {
        match self.strategy {
            // Equal split for every strategy in this release
            AllocationStrategy::Proportional
            | AllocationStrategy::Equal
            | AllocationStrategy::Optimal => (self.total_capacity / stratum_count.max(1)).max(1),
        }
    }

    /// Offer an item to its stratum's reservoir, creating it on first sight.
    pub fn add(&mut self, stratum: &str, item: T) -> Option<usize> {
        self.items_seen += 1;
        if !self.strata.contains_key(stratum) {
            let capacity = self.stratum_capacity(self.strata.len() + 1);
            self.strata
                .insert(stratum.to_string(), Reservoir::new(capacity));
        }
        self.strata
            .get_mut(stratum)
            .and_then(|reservoir| reservoir.add(item))
    }

    pub fn stratum(&self, stratum: &str) -> Option<&Reservoir<T>> {
        self.strata.get(stratum)
    }

    pub fn snapshot(&self, stratum: &str) -> Vec<T> {
        self.strata
            .get(stratum)
            .map(|r| r.snapshot())
            .unwrap_or_default()
    }

    pub fn strata_names(&self) -> impl Iterator<Item = &String> {
        self.strata.keys()
    }

    pub fn stratum_count(&self) -> usize {
        self.strata.len()
    }

    pub fn len(&self) -> usize {
        self.strata.values().map(|r| r.len()).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn items_seen(&self) -> u64 {
        self.items_seen
    }

    pub fn strategy(&self) -> AllocationStrategy {
        self.strategy
    }

    pub fn clear(&mut self) {
        self.strata.clear();
        self.items_seen = 0;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_lazy_stratum_creation() {
        let mut sampler = StratifiedReservoir::new(1000, AllocationStrategy::Equal);
        assert_eq!(sampler.stratum_count(), 0);

        sampler.add("prod/default/cpu_usage", 1.0);
        sampler.add("prod/default/memory_usage", 2.0);
        sampler.add("prod/default/cpu_usage", 3.0);

        assert_eq!(sampler.stratum_count(), 2);
        assert_eq!(sampler.items_seen(), 3);
        assert_eq!(sampler.snapshot("prod/default/cpu_usage"), vec![1.0, 3.0]);
    }

    #[test]
    fn test_capacity_split_shrinks_with_strata() {
        let mut sampler = StratifiedReservoir::new(100, AllocationStrategy::Equal);
        sampler.add("a", 0);
        sampler.add("b", 0);

        // First stratum saw a solo split, the second a halved one
        assert_eq!(sampler.stratum("a").unwrap().capacity(), 100);
        assert_eq!(sampler.stratum("b").unwrap().capacity(), 50);
    }

    #[test]
    fn test_strategies_collapse_to_equal() {
        for strategy in [
            AllocationStrategy::Proportional,
            AllocationStrategy::Equal,
            AllocationStrategy::Optimal,
        ] {
            let mut sampler = StratifiedReservoir::new(60, strategy);
            sampler.add("a", 0);
            sampler.add("b", 0);
            sampler.add("c", 0);
            assert_eq!(sampler.stratum("c").unwrap().capacity(), 20);
        }
    }

    #[test]
    fn test_per_stratum_capacity_is_bounded() {
        let mut sampler = StratifiedReservoir::new(50, AllocationStrategy::Equal);
        for i in 0..500 {
            sampler.add("only", i);
        }
        let reservoir = sampler.stratum("only").unwrap();
        assert!(reservoir.len() <= reservoir.capacity());
        assert_eq!(reservoir.items_seen(), 500);
    }

    #[test]
    fn test_unknown_stratum_snapshot_is_empty() {
        let sampler: StratifiedReservoir<i32> =
            StratifiedReservoir::new(10, AllocationStrategy::Equal);
        assert!(sampler.snapshot("missing").is_empty());
        assert!(sampler.stratum("missing").is_none());
    }
}
