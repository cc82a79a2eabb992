// rusty-aqp - Approximate Query Processing for Observability Streams
//
// Answers aggregate queries over high-volume measurement streams with
// bounded error and fixed memory: probabilistic sketches for cardinality,
// frequency, and membership; adaptive stratified reservoir sampling; and a
// dispatcher for a small fixed set of query types.
//
// The ingestion boundary and HTTP surface are external callers; their whole
// contract with this crate is `QueryEngine::ingest` for records and
// `QueryEngine::execute` (or `execute_json`) for queries.

pub mod config;
pub mod engine;
pub mod error;
pub mod model;
pub mod sampling;
pub mod sketch;

pub use error::{EngineError, Result};

// Configuration
pub use config::{EngineConfig, SamplingConfig, StorageConfig};

// Data model
pub use model::{
    CountValue, MembershipValue, MetricRecord, PercentileValue, QueryRequest, QueryResult,
    QueryType, QueryValue, TimeRange, TopKItem,
};

// Sketches
pub use sketch::{BloomFilter, CountMinSketch, HyperLogLog, RotatingBloomFilter};

// Sampling
pub use sampling::{
    AdaptiveSampler, AllocationStrategy, AnomalyGate, MetricThreshold, Reservoir, SampleDecision,
    StratifiedReservoir, TimeWindowReservoir, WeightedReservoir, WindowStats,
};

// Engine
pub use engine::{EngineStats, QueryEngine, StatsReport};
