// Engine Configuration
//
// Typed configuration surface for the approximate query engine. Loading from
// files or the environment is the embedding application's concern; this module
// only defines the recognized options, their defaults, and validation.

use crate::error::{EngineError, Result};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Sampling subsystem configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SamplingConfig {
    /// Baseline admission probability for benign records
    pub base_rate: f64,
    /// Floor rate applied to records flagged by the anomaly gate
    pub anomaly_rate: f64,
    /// Width of the per-stratum statistics window, in seconds
    pub window_secs: u64,
    /// Capacity of each per-stratum reservoir
    pub reservoir_size: usize,
    /// Optional per-stratum rate multipliers
    #[serde(default)]
    pub stratum_weights: HashMap<String, f64>,
}

impl Default for SamplingConfig {
    fn default() -> Self {
        Self {
            base_rate: 0.05,
            anomaly_rate: 0.5,
            window_secs: 3600,
            reservoir_size: 10_000,
            stratum_weights: HashMap::new(),
        }
    }
}

impl SamplingConfig {
    /// Statistics window as a chrono duration.
    pub fn window(&self) -> chrono::Duration {
        chrono::Duration::seconds(self.window_secs as i64)
    }
}

/// Sketch sizing configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageConfig {
    /// Cardinality sketch precision (4-16); registers = 2^precision
    pub cardinality_precision: u8,
    /// Frequency sketch row width
    pub frequency_width: usize,
    /// Frequency sketch depth (number of hash rows)
    pub frequency_depth: usize,
    /// Membership sketch size in bits
    pub membership_bits: usize,
    /// Membership sketch hash count per key
    pub membership_hashes: u32,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            cardinality_precision: 14,
            frequency_width: 2048,
            frequency_depth: 5,
            membership_bits: 1_000_000,
            membership_hashes: 5,
        }
    }
}

/// Top-level engine configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct EngineConfig {
    #[serde(default)]
    pub sampling: SamplingConfig,
    #[serde(default)]
    pub storage: StorageConfig,
}

impl EngineConfig {
    /// Validate all recognized options, rejecting out-of-range values.
    pub fn validate(&self) -> Result<()> {
        let s = &self.sampling;
        if !(s.base_rate > 0.0 && s.base_rate <= 1.0) {
            return Err(EngineError::Configuration(format!(
                "base_rate must be in (0, 1], got {}",
                s.base_rate
            )));
        }
        if !(s.anomaly_rate > 0.0 && s.anomaly_rate <= 1.0) {
            return Err(EngineError::Configuration(format!(
                "anomaly_rate must be in (0, 1], got {}",
                s.anomaly_rate
            )));
        }
        if s.window_secs == 0 {
            return Err(EngineError::Configuration(
                "window_secs must be > 0".to_string(),
            ));
        }
        if s.reservoir_size == 0 {
            return Err(EngineError::Configuration(
                "reservoir_size must be > 0".to_string(),
            ));
        }
        for (stratum, weight) in &s.stratum_weights {
            if *weight < 0.0 || !weight.is_finite() {
                return Err(EngineError::Configuration(format!(
                    "stratum weight for '{}' must be finite and >= 0, got {}",
                    stratum, weight
                )));
            }
        }

        let st = &self.storage;
        if !(4..=16).contains(&st.cardinality_precision) {
            return Err(EngineError::Configuration(format!(
                "cardinality_precision must be between 4 and 16, got {}",
                st.cardinality_precision
            )));
        }
        if st.frequency_width == 0 || st.frequency_depth == 0 {
            return Err(EngineError::Configuration(
                "frequency sketch dimensions must be > 0".to_string(),
            ));
        }
        if st.membership_bits == 0 || st.membership_hashes == 0 {
            return Err(EngineError::Configuration(
                "membership sketch size and hash count must be > 0".to_string(),
            ));
        }
        Ok(())
    }
}
