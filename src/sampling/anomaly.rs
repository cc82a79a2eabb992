// Anomaly Gate
//
// Flags records whose value falls outside configured per-metric bounds, or
// whose content trips the record-level rule. Presets cover the common
// resource metrics; callers can retune at runtime.

use crate::model::MetricRecord;
use once_cell::sync::Lazy;
use std::collections::HashMap;

/// Acceptable value band for one metric, plus an informational z-score used
/// by dashboards.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MetricThreshold {
    pub lower: f64,
    pub upper: f64,
    pub z_score: f64,
}

static DEFAULT_THRESHOLDS: Lazy<HashMap<&'static str, MetricThreshold>> = Lazy::new(|| {
    HashMap::from([
        (
            "cpu_usage",
            MetricThreshold {
                lower: 0.0,
                upper: 0.9,
                z_score: 3.0,
            },
        ),
        (
            "memory_usage",
            MetricThreshold {
                lower: 0.0,
                upper: 0.85,
                z_score: 3.0,
            },
        ),
        (
            "disk_usage",
            MetricThreshold {
                lower: 0.0,
                upper: 0.9,
                z_score: 3.0,
            },
        ),
        (
            "network_in",
            MetricThreshold {
                lower: 0.0,
                upper: 1e9,
                z_score: 3.0,
            },
        ),
        (
            "network_out",
            MetricThreshold {
                lower: 0.0,
                upper: 1e9,
                z_score: 3.0,
            },
        ),
        (
            "pod_restarts",
            MetricThreshold {
                lower: 0.0,
                upper: 3.0,
                z_score: 2.0,
            },
        ),
    ])
});

/// Predicate deciding whether a measurement is anomalous.
#[derive(Debug, Clone)]
pub struct AnomalyGate {
    thresholds: HashMap<String, MetricThreshold>,
}

impl Default for AnomalyGate {
    fn default() -> Self {
        Self {
            thresholds: DEFAULT_THRESHOLDS
                .iter()
                .map(|(name, threshold)| (name.to_string(), *threshold))
                .collect(),
        }
    }
}

impl AnomalyGate {
    pub fn new() -> Self {
        Self::default()
    }

    /// Gate with no presets; every metric passes until thresholds are set.
    pub fn empty() -> Self {
        Self {
            thresholds: HashMap::new(),
        }
    }

    /// A record is anomalous if its own content flags it, or its value falls
    /// outside the configured band for its metric.
    pub fn is_anomalous(&self, record: &MetricRecord) -> bool {
        if record.is_anomalous() {
            return true;
        }
        match self.thresholds.get(&record.metric_name) {
            Some(threshold) => record.value < threshold.lower || record.value > threshold.upper,
            None => false,
        }
    }

    pub fn set_threshold(&mut self, metric: impl Into<String>, threshold: MetricThreshold) {
        self.thresholds.insert(metric.into(), threshold);
    }

    pub fn threshold(&self, metric: &str) -> Option<&MetricThreshold> {
        self.thresholds.get(metric)
    }

    pub fn metric_count(&self) -> usize {
        self.thresholds.len()
    }
}
