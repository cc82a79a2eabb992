// Measurement Record
//
// The unit of ingestion: one numeric observation from a cluster object
// (pod/container metric or event). Field names are the stable wire contract;
// timestamps travel as RFC3339 strings.

use crate::error::Result;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// A single observability measurement.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MetricRecord {
    pub timestamp: DateTime<Utc>,
    pub cluster_id: String,
    pub namespace: String,
    pub pod_name: String,
    pub container_name: String,
    pub metric_name: String,
    pub value: f64,
    pub unit: String,
    /// Missing on the wire decodes as an empty mapping
    #[serde(default)]
    pub labels: HashMap<String, String>,
}

impl MetricRecord {
    /// Convenience constructor stamped with the current time.
    pub fn new(
        cluster_id: impl Into<String>,
        namespace: impl Into<String>,
        pod_name: impl Into<String>,
        container_name: impl Into<String>,
        metric_name: impl Into<String>,
        value: f64,
    ) -> Self {
        Self {
            timestamp: Utc::now(),
            cluster_id: cluster_id.into(),
            namespace: namespace.into(),
            pod_name: pod_name.into(),
            container_name: container_name.into(),
            metric_name: metric_name.into(),
            value,
            unit: String::new(),
            labels: HashMap::new(),
        }
    }

    /// Derived feature key: `cluster/namespace/pod/metric`.
    ///
    /// This is what the sketches see; two records with the same key are the
    /// same entity for cardinality, frequency, and membership purposes.
    pub fn key(&self) -> String {
        format!(
            "{}/{}/{}/{}",
            self.cluster_id, self.namespace, self.pod_name, self.metric_name
        )
    }

    /// Stratum discriminator: `cluster/namespace/metric`.
    pub fn stratum(&self) -> String {
        format!(
            "{}/{}/{}",
            self.cluster_id, self.namespace, self.metric_name
        )
    }

    /// Record-level anomaly rule, independent of any configured thresholds.
    pub fn is_anomalous(&self) -> bool {
        match self.metric_name.as_str() {
            "cpu_usage" => self.value > 0.9,
            "memory_usage" => self.value > 0.85,
            "pod_restarts" => self.value > 3.0,
            _ => false,
        }
    }

    pub fn from_json(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }

    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string(self)?)
    }
}
