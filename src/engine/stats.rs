// Engine Statistics
//
// Query counters and a rolling average latency, exposed as a serializable
// report. The error rate is computed externally (against ground truth or
// audits) and only stored here.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::time::Duration;

#[derive(Debug, Clone)]
pub struct EngineStats {
    total_queries: u64,
    approx_queries: u64,
    total_samples: u64,
    avg_latency_nanos: f64,
    error_rate: f64,
    last_update: DateTime<Utc>,
}

impl Default for EngineStats {
    fn default() -> Self {
        Self {
            total_queries: 0,
            approx_queries: 0,
            total_samples: 0,
            avg_latency_nanos: 0.0,
            error_rate: 0.0,
            last_update: Utc::now(),
        }
    }
}

impl EngineStats {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fold one query into the counters and the rolling latency average:
    /// avg' = (avg * (N-1) + latest) / N with post-increment N.
    pub fn record_query(&mut self, latency: Duration, approximate: bool) {
        self.total_queries += 1;
        if approximate {
            self.approx_queries += 1;
        }
        let n = self.total_queries as f64;
        self.avg_latency_nanos =
            (self.avg_latency_nanos * (n - 1.0) + latency.as_nanos() as f64) / n;
        self.last_update = Utc::now();
    }

    pub fn record_sample(&mut self) {
        self.total_samples += 1;
        self.last_update = Utc::now();
    }

    pub fn set_error_rate(&mut self, error_rate: f64) {
        self.error_rate = error_rate;
    }

    pub fn total_queries(&self) -> u64 {
        self.total_queries
    }

    pub fn approx_queries(&self) -> u64 {
        self.approx_queries
    }

    pub fn total_samples(&self) -> u64 {
        self.total_samples
    }

    pub fn avg_latency(&self) -> Duration {
        Duration::from_nanos(self.avg_latency_nanos as u64)
    }

    pub fn report(&self, effective_sampling_rate: f64) -> StatsReport {
        StatsReport {
            total_queries: self.total_queries,
            approx_queries: self.approx_queries,
            total_samples: self.total_samples,
            avg_latency_nanos: self.avg_latency_nanos as u64,
            effective_sampling_rate,
            error_rate: self.error_rate,
            last_update: self.last_update,
        }
    }
}

/// Point-in-time statistics snapshot for export.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StatsReport {
    pub total_queries: u64,
    pub approx_queries: u64,
    pub total_samples: u64,
    pub avg_latency_nanos: u64,
    pub effective_sampling_rate: f64,
    pub error_rate: f64,
    pub last_update: DateTime<Utc>,
}
