// Adaptive Sampler
//
// Decides per record whether it is kept and where it goes. The admission
// rate starts from the configured base rate and is adjusted by the anomaly
// gate, per-stratum weights, window variance, and hot resource metrics,
// then clamped to [0.001, 1.0].
//
// One exclusive section covers the rate decision, the counters, and both
// per-stratum maps; reservoir and window-stats entries carry their own locks
// for standalone readers.

use crate::config::SamplingConfig;
use crate::model::MetricRecord;
use crate::sampling::anomaly::AnomalyGate;
use crate::sampling::reservoir::Reservoir;
use crate::sampling::window_stats::WindowStats;
use parking_lot::{Mutex, RwLock};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, trace};

const MIN_RATE: f64 = 0.001;
const MAX_RATE: f64 = 1.0;

/// Outcome of offering a record to the sampler.
#[derive(Debug, Clone, PartialEq)]
pub enum SampleDecision {
    /// Rejected by the rate draw; the record reaches neither sketches nor
    /// reservoirs.
    Dropped,
    /// Admitted. Carries the surviving copy, or `None` when the reservoir's
    /// replacement draw discarded it after admission.
    Admitted(Option<MetricRecord>),
}

impl SampleDecision {
    pub fn is_admitted(&self) -> bool {
        matches!(self, SampleDecision::Admitted(_))
    }
}

struct SamplerInner {
    reservoirs: HashMap<String, Arc<RwLock<Reservoir<MetricRecord>>>>,
    window_stats: HashMap<String, Arc<RwLock<WindowStats>>>,
    rng: StdRng,
    total_processed: u64,
    total_sampled: u64,
    anomalies_seen: u64,
}

/// Rate-adaptive, stratum-routing sampler.
pub struct AdaptiveSampler {
    config: SamplingConfig,
    gate: AnomalyGate,
    inner: Mutex<SamplerInner>,
}

impl AdaptiveSampler {
    pub fn new(config: SamplingConfig) -> Self {
        Self::with_gate(config, AnomalyGate::new())
    }

    pub fn with_gate(config: SamplingConfig, gate: AnomalyGate) -> Self {
        Self {
            config,
            gate,
            inner: Mutex::new(SamplerInner {
                reservoirs: HashMap::new(),
                window_stats: HashMap::new(),
                rng: StdRng::from_os_rng(),
                total_processed: 0,
                total_sampled: 0,
                anomalies_seen: 0,
            }),
        }
    }

    /// Deterministic variant for tests.
    pub fn with_seed(config: SamplingConfig, seed: u64) -> Self {
        let sampler = Self::new(config);
        sampler.inner.lock().rng = StdRng::seed_from_u64(seed);
        sampler
    }

    /// Decide whether `record` is kept; if so, update the stratum's window
    /// statistics and offer the record to its reservoir.
    pub fn sample(&self, record: &MetricRecord) -> SampleDecision {
        let mut inner = self.inner.lock();
        inner.total_processed += 1;

        let stratum = record.stratum();
        let mut rate = self.config.base_rate;

        if self.gate.is_anomalous(record) {
            inner.anomalies_seen += 1;
            rate = rate.max(self.config.anomaly_rate);
            debug!(
                stratum = %stratum,
                metric = %record.metric_name,
                value = record.value,
                "anomalous record, raising sample rate"
            );
        }

        if let Some(weight) = self.config.stratum_weights.get(&stratum) {
            rate *= weight;
        }

        if let Some(stats) = inner.window_stats.get(&stratum) {
            rate *= 1.0 + stats.read().variance() / 100.0;
        }

        if matches!(record.metric_name.as_str(), "cpu_usage" | "memory_usage")
            && record.value > 0.8
        {
            rate *= 2.0;
        }

        let rate = rate.clamp(MIN_RATE, MAX_RATE);
        let draw: f64 = inner.rng.random();
        trace!(stratum = %stratum, rate, draw, "admission decision");

        if draw >= rate {
            return SampleDecision::Dropped;
        }
        inner.total_sampled += 1;

        let window = self.config.window();
        inner
            .window_stats
            .entry(stratum.clone())
            .or_insert_with(|| Arc::new(RwLock::new(WindowStats::new(window))))
            .write()
            .add(record.value, record.timestamp);

        let reservoir_size = self.config.reservoir_size;
        let slot = inner
            .reservoirs
            .entry(stratum)
            .or_insert_with(|| Arc::new(RwLock::new(Reservoir::new(reservoir_size))))
            .write()
            .add(record.clone());

        SampleDecision::Admitted(slot.map(|_| record.clone()))
    }

    /// Observed ratio of admitted to processed records.
    pub fn effective_rate(&self) -> f64 {
        let inner = self.inner.lock();
        if inner.total_processed == 0 {
            return 0.0;
        }
        inner.total_sampled as f64 / inner.total_processed as f64
    }

    pub fn total_processed(&self) -> u64 {
        self.inner.lock().total_processed
    }

    pub fn total_sampled(&self) -> u64 {
        self.inner.lock().total_sampled
    }

    pub fn anomalies_seen(&self) -> u64 {
        self.inner.lock().anomalies_seen
    }

    pub fn stratum_count(&self) -> usize {
        self.inner.lock().reservoirs.len()
    }

    /// Current window variance for a stratum, if observed.
    pub fn window_variance(&self, stratum: &str) -> Option<f64> {
        let stats = self.inner.lock().window_stats.get(stratum).cloned();
        stats.map(|s| s.read().variance())
    }

    /// Copy of a stratum's reservoir contents.
    pub fn reservoir_snapshot(&self, stratum: &str) -> Option<Vec<MetricRecord>> {
        let reservoir = self.inner.lock().reservoirs.get(stratum).cloned();
        reservoir.map(|r| r.read().snapshot())
    }

    pub fn config(&self) -> &SamplingConfig {
        &self.config
    }

    /// Drop all per-stratum state and counters.
    pub fn clear(&self) {
        let mut inner = self.inner.lock();
        inner.reservoirs.clear();
        inner.window_stats.clear();
        inner.total_processed = 0;
        inner.total_sampled = 0;
        inner.anomalies_seen = 0;
    }
}
