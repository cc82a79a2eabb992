// Query Engine
//
// Owns one sketch of each kind, the adaptive sampler, and bounded
// per-stratum sample lists. Ingestion feeds admitted records to all three
// sketches and the sample lists; execution routes each request to the
// matching estimator.
//
// Locking: each sketch has its own reader/writer lock, the sampler carries
// its own exclusive section, the sample lists live in a concurrent map, and
// the engine-level lock only covers its counters. Queries may observe any
// linearization of committed updates, never torn state.

use crate::config::EngineConfig;
use crate::engine::parser;
use crate::engine::stats::{EngineStats, StatsReport};
use crate::error::{EngineError, Result};
use crate::model::{
    CountValue, MembershipValue, MetricRecord, PercentileValue, QueryRequest, QueryResult,
    QueryType, QueryValue,
};
use crate::sampling::adaptive::AdaptiveSampler;
use crate::sketch::{BloomFilter, CountMinSketch, HyperLogLog};
use chrono::Utc;
use dashmap::DashMap;
use parking_lot::RwLock;
use std::collections::HashMap;
use std::time::Instant;
use tracing::{debug, info};

/// Cap on each stratum's sample list; the oldest prefix is dropped beyond it.
const MAX_SAMPLES_PER_STRATUM: usize = 1000;

struct Outcome {
    value: QueryValue,
    error: Option<f64>,
    confidence: Option<f64>,
    sample_size: usize,
    approximate: bool,
}

/// Approximate query engine over a sampled measurement stream.
pub struct QueryEngine {
    cardinality: RwLock<HyperLogLog>,
    frequency: RwLock<CountMinSketch>,
    membership: RwLock<BloomFilter>,
    sampler: AdaptiveSampler,
    samples: DashMap<String, Vec<MetricRecord>>,
    stats: RwLock<EngineStats>,
}

impl QueryEngine {
    pub fn new(config: EngineConfig) -> Result<Self> {
        config.validate()?;
        let storage = &config.storage;

        let engine = Self {
            cardinality: RwLock::new(HyperLogLog::new(storage.cardinality_precision)?),
            frequency: RwLock::new(CountMinSketch::new(
                storage.frequency_width,
                storage.frequency_depth,
            )?),
            membership: RwLock::new(BloomFilter::new(
                storage.membership_bits,
                storage.membership_hashes,
            )?),
            sampler: AdaptiveSampler::new(config.sampling.clone()),
            samples: DashMap::new(),
            stats: RwLock::new(EngineStats::new()),
        };

        info!(
            precision = storage.cardinality_precision,
            frequency_width = storage.frequency_width,
            frequency_depth = storage.frequency_depth,
            membership_bits = storage.membership_bits,
            base_rate = config.sampling.base_rate,
            "query engine initialized"
        );
        Ok(engine)
    }

    /// Offer a record to the sampler; admitted records update every sketch
    /// and the stratum's bounded sample list. Returns whether the record was
    /// admitted.
    pub fn ingest(&self, record: MetricRecord) -> bool {
        let decision = self.sampler.sample(&record);
        if !decision.is_admitted() {
            return false;
        }

        let key = record.key();
        self.cardinality.write().add(key.as_bytes());
        self.frequency.write().update(key.as_bytes(), 1);
        self.membership.write().add(key.as_bytes());

        let stratum = record.stratum();
        let mut list = self.samples.entry(stratum).or_default();
        list.push(record);
        if list.len() > MAX_SAMPLES_PER_STRATUM {
            let excess = list.len() - MAX_SAMPLES_PER_STRATUM;
            list.drain(..excess);
        }
        drop(list);

        self.stats.write().record_sample();
        true
    }

    /// Route a request to its estimator and wrap the answer.
    pub fn execute(&self, request: &QueryRequest) -> Result<QueryResult> {
        let started = Instant::now();

        let outcome = match request.query_type {
            QueryType::CountDistinct => self.execute_count_distinct(),
            QueryType::FrequencyCount => self.execute_frequency_count(request),
            QueryType::Membership => self.execute_membership(request),
            QueryType::TopK => self.execute_top_k(request),
            QueryType::Percentile => self.execute_percentile(request),
            QueryType::Sum => self.execute_sum(request),
            QueryType::Average => self.execute_average(request),
        }?;

        let elapsed = started.elapsed();
        self.stats
            .write()
            .record_query(elapsed, outcome.approximate);
        debug!(
            query_type = %request.query_type,
            sample_size = outcome.sample_size,
            elapsed_nanos = elapsed.as_nanos() as u64,
            "query executed"
        );

        Ok(QueryResult {
            id: request.assigned_id(),
            query: request.query.clone(),
            result: outcome.value,
            error: outcome.error,
            confidence: outcome.confidence,
            sample_size: outcome.sample_size,
            processing_time: elapsed.as_nanos() as u64,
            is_approximate: outcome.approximate,
            timestamp: Utc::now(),
        })
    }

    /// Decode a JSON request, execute it, and encode the result.
    pub fn execute_json(&self, json: &str) -> Result<String> {
        let request = QueryRequest::from_json(json)?;
        let result = self.execute(&request)?;
        result.to_json()
    }

    fn execute_count_distinct(&self) -> Result<Outcome> {
        let sketch = self.cardinality.read();
        Ok(Outcome {
            value: QueryValue::Number(sketch.count() as f64),
            error: Some(sketch.estimated_error()),
            confidence: None,
            sample_size: 0,
            approximate: true,
        })
    }

    fn execute_frequency_count(&self, request: &QueryRequest) -> Result<Outcome> {
        let item = parser::extract_quoted_item(&request.query).ok_or_else(|| {
            EngineError::InvalidArgument(
                "frequency_count requires a quoted item in the query text".to_string(),
            )
        })?;
        let count = self.frequency.read().estimate(item.as_bytes());
        Ok(Outcome {
            value: QueryValue::Count(CountValue { item, count }),
            error: None,
            confidence: None,
            sample_size: 0,
            approximate: true,
        })
    }

    fn execute_membership(&self, request: &QueryRequest) -> Result<Outcome> {
        let item = parser::extract_quoted_item(&request.query).ok_or_else(|| {
            EngineError::InvalidArgument(
                "membership requires a quoted item in the query text".to_string(),
            )
        })?;
        let sketch = self.membership.read();
        let member = sketch.contains(item.as_bytes());
        let false_positive_rate = sketch.false_positive_rate();
        Ok(Outcome {
            value: QueryValue::Membership(MembershipValue {
                item,
                member,
                false_positive_rate,
            }),
            error: None,
            confidence: None,
            sample_size: 0,
            approximate: true,
        })
    }

    fn execute_top_k(&self, request: &QueryRequest) -> Result<Outcome> {
        let k = parser::extract_top_k(&request.query);
        let items = self.frequency.read().top_k(k);
        Ok(Outcome {
            value: QueryValue::TopK(items),
            error: None,
            confidence: None,
            sample_size: 0,
            approximate: true,
        })
    }

    fn execute_percentile(&self, request: &QueryRequest) -> Result<Outcome> {
        let percentile = parser::extract_percentile(&request.query);
        if !(0.0..=100.0).contains(&percentile) {
            return Err(EngineError::InvalidArgument(format!(
                "percentile must be between 0 and 100, got {}",
                percentile
            )));
        }

        let mut values: Vec<f64> = self
            .matching_samples(request)
            .iter()
            .map(|r| r.value)
            .collect();
        if values.is_empty() {
            return Ok(Outcome {
                value: QueryValue::Null,
                error: None,
                confidence: None,
                sample_size: 0,
                approximate: false,
            });
        }
        values.sort_by(|a, b| a.total_cmp(b));

        // Linear-interpolated order statistic at rank (p/100)*(n-1)
        let rank = percentile / 100.0 * (values.len() - 1) as f64;
        let lower = rank.floor() as usize;
        let fraction = rank - lower as f64;
        let value = if lower + 1 < values.len() {
            values[lower] + fraction * (values[lower + 1] - values[lower])
        } else {
            values[lower]
        };

        Ok(Outcome {
            sample_size: values.len(),
            value: QueryValue::Percentile(PercentileValue { percentile, value }),
            error: None,
            confidence: None,
            approximate: true,
        })
    }

    fn execute_sum(&self, request: &QueryRequest) -> Result<Outcome> {
        let values: Vec<f64> = self
            .matching_samples(request)
            .iter()
            .map(|r| r.value)
            .collect();
        if values.is_empty() {
            return Ok(Outcome {
                value: QueryValue::Number(0.0),
                error: None,
                confidence: None,
                sample_size: 0,
                approximate: false,
            });
        }

        let n = values.len() as f64;
        let raw_sum: f64 = values.iter().sum();
        let rate = self.sampler.effective_rate().max(f64::MIN_POSITIVE);

        // Divide by the effective sampling rate for an unbiased estimate
        let estimate = raw_sum / rate;
        let standard_error = (sample_variance(&values) / n).sqrt() / rate;

        Ok(Outcome {
            value: QueryValue::Number(estimate),
            error: Some(1.96 * standard_error),
            confidence: Some(0.95),
            sample_size: values.len(),
            approximate: true,
        })
    }

    fn execute_average(&self, request: &QueryRequest) -> Result<Outcome> {
        let values: Vec<f64> = self
            .matching_samples(request)
            .iter()
            .map(|r| r.value)
            .collect();
        if values.is_empty() {
            return Ok(Outcome {
                value: QueryValue::Null,
                error: None,
                confidence: None,
                sample_size: 0,
                approximate: false,
            });
        }

        let n = values.len() as f64;
        let mean = values.iter().sum::<f64>() / n;
        let standard_error = (sample_variance(&values) / n).sqrt();

        Ok(Outcome {
            value: QueryValue::Number(mean),
            error: Some(1.96 * standard_error),
            confidence: Some(0.95),
            sample_size: values.len(),
            // Large samples make the mean effectively exact
            approximate: values.len() < 1000,
        })
    }

    /// Samples passing the request's time range and facet filters.
    fn matching_samples(&self, request: &QueryRequest) -> Vec<MetricRecord> {
        let mut matched = Vec::new();
        for entry in self.samples.iter() {
            for record in entry.value() {
                if let Some(range) = &request.time_range {
                    if !range.contains(record.timestamp) {
                        continue;
                    }
                }
                if Self::matches_filters(record, &request.filters) {
                    matched.push(record.clone());
                }
            }
        }
        matched
    }

    fn matches_filters(record: &MetricRecord, filters: &HashMap<String, String>) -> bool {
        for (key, expected) in filters {
            let actual = match key.as_str() {
                "cluster_id" => &record.cluster_id,
                "namespace" => &record.namespace,
                "metric_name" => &record.metric_name,
                "pod_name" => &record.pod_name,
                // unknown filter keys are ignored
                _ => continue,
            };
            if actual != expected {
                return false;
            }
        }
        true
    }

    /// Observed admitted/processed ratio from the sampler.
    pub fn effective_sampling_rate(&self) -> f64 {
        self.sampler.effective_rate()
    }

    pub fn stats(&self) -> StatsReport {
        self.stats.read().report(self.sampler.effective_rate())
    }

    pub fn set_error_rate(&self, error_rate: f64) {
        self.stats.write().set_error_rate(error_rate);
    }

    pub fn sampler(&self) -> &AdaptiveSampler {
        &self.sampler
    }

    /// Copy of one stratum's bounded sample list.
    pub fn stratum_samples(&self, stratum: &str) -> Vec<MetricRecord> {
        self.samples
            .get(stratum)
            .map(|list| list.clone())
            .unwrap_or_default()
    }
}

fn sample_variance(values: &[f64]) -> f64 {
    if values.len() < 2 {
        return 0.0;
    }
    let n = values.len() as f64;
    let mean = values.iter().sum::<f64>() / n;
    values.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / (n - 1.0)
}
