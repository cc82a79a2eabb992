// Query Request and Result Types
//
// The closed set of supported query types plus the request/result wire
// contract. The typed `query_type` field is authoritative; the free-form
// `query` text only carries incidental parameters (percentile, k, quoted
// items) extracted by the permissive parser.

use crate::error::{EngineError, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;

/// Supported aggregate query types.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum QueryType {
    CountDistinct,
    Sum,
    Average,
    Percentile,
    TopK,
    Membership,
    FrequencyCount,
}

impl QueryType {
    pub const ALL: [QueryType; 7] = [
        QueryType::CountDistinct,
        QueryType::Sum,
        QueryType::Average,
        QueryType::Percentile,
        QueryType::TopK,
        QueryType::Membership,
        QueryType::FrequencyCount,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            QueryType::CountDistinct => "count_distinct",
            QueryType::Sum => "sum",
            QueryType::Average => "average",
            QueryType::Percentile => "percentile",
            QueryType::TopK => "top_k",
            QueryType::Membership => "membership",
            QueryType::FrequencyCount => "frequency_count",
        }
    }
}

impl fmt::Display for QueryType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for QueryType {
    type Err = EngineError;

    fn from_str(s: &str) -> Result<Self> {
        QueryType::ALL
            .iter()
            .find(|t| t.as_str() == s)
            .copied()
            .ok_or_else(|| EngineError::InvalidArgument(format!("unknown query type: {}", s)))
    }
}

/// Half-open time range: inclusive start, exclusive end. Either bound may be
/// absent.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TimeRange {
    #[serde(default)]
    pub start: Option<DateTime<Utc>>,
    #[serde(default)]
    pub end: Option<DateTime<Utc>>,
}

impl TimeRange {
    pub fn contains(&self, timestamp: DateTime<Utc>) -> bool {
        if let Some(start) = self.start {
            if timestamp < start {
                return false;
            }
        }
        if let Some(end) = self.end {
            if timestamp >= end {
                return false;
            }
        }
        true
    }
}

/// An aggregate query submitted to the engine.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QueryRequest {
    /// Auto-generated when absent
    #[serde(default)]
    pub id: Option<String>,
    pub query: String,
    pub query_type: QueryType,
    #[serde(default)]
    pub time_range: Option<TimeRange>,
    #[serde(default)]
    pub filters: HashMap<String, String>,
    #[serde(default)]
    pub error_bound: Option<f64>,
    #[serde(default)]
    pub confidence: Option<f64>,
}

impl QueryRequest {
    pub fn new(query_type: QueryType, query: impl Into<String>) -> Self {
        Self {
            id: None,
            query: query.into(),
            query_type,
            time_range: None,
            filters: HashMap::new(),
            error_bound: None,
            confidence: None,
        }
    }

    pub fn with_filter(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.filters.insert(key.into(), value.into());
        self
    }

    pub fn with_time_range(mut self, time_range: TimeRange) -> Self {
        self.time_range = Some(time_range);
        self
    }

    /// Decode a request from its JSON wire form.
    ///
    /// Malformed requests (including unknown `query_type` names) are invalid
    /// arguments, so shim callers see one stable error taxonomy.
    pub fn from_json(json: &str) -> Result<Self> {
        serde_json::from_str(json)
            .map_err(|e| EngineError::InvalidArgument(format!("malformed query request: {}", e)))
    }

    /// The request id, or a freshly generated one.
    pub fn assigned_id(&self) -> String {
        self.id
            .clone()
            .unwrap_or_else(|| uuid::Uuid::new_v4().to_string())
    }
}

/// One heavy-hitter entry: a frequency-sketch bucket index and its estimated
/// count. Bucket indices, not original keys; the sketch does not remember
/// keys.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TopKItem {
    pub bucket: usize,
    pub count: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PercentileValue {
    pub percentile: f64,
    pub value: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MembershipValue {
    pub item: String,
    pub member: bool,
    pub false_positive_rate: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CountValue {
    pub item: String,
    pub count: u64,
}

/// Polymorphic result payload.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum QueryValue {
    Number(f64),
    TopK(Vec<TopKItem>),
    Percentile(PercentileValue),
    Membership(MembershipValue),
    Count(CountValue),
    Null,
}

/// The answer to a query request.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QueryResult {
    pub id: String,
    pub query: String,
    pub result: QueryValue,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub confidence: Option<f64>,
    pub sample_size: usize,
    /// Processing duration in nanoseconds
    pub processing_time: u64,
    pub is_approximate: bool,
    pub timestamp: DateTime<Utc>,
}

impl QueryResult {
    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string(self)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_query_type_round_trip() {
        for t in QueryType::ALL {
            assert_eq!(QueryType::from_str(t.as_str()).unwrap(), t);
        }
    }

    #[test]
    fn test_unknown_query_type_is_invalid_argument() {
        let err = QueryType::from_str("foo").unwrap_err();
        assert!(matches!(err, EngineError::InvalidArgument(_)));
    }

    #[test]
    fn test_request_decodes_with_defaults() {
        let request = QueryRequest::from_json(
            r#"{"query": "SELECT COUNT(DISTINCT pod)", "query_type": "count_distinct"}"#,
        )
        .unwrap();
        assert!(request.id.is_none());
        assert!(request.filters.is_empty());
        assert!(request.time_range.is_none());
        assert_eq!(request.query_type, QueryType::CountDistinct);
        // ids are generated on demand
        assert!(!request.assigned_id().is_empty());
    }

    #[test]
    fn test_unknown_wire_query_type_is_invalid_argument() {
        let err = QueryRequest::from_json(r#"{"query": "x", "query_type": "foo"}"#).unwrap_err();
        assert!(matches!(err, EngineError::InvalidArgument(_)));
    }

    #[test]
    fn test_time_range_half_open() {
        let start = Utc.with_ymd_and_hms(2025, 6, 1, 0, 0, 0).unwrap();
        let end = Utc.with_ymd_and_hms(2025, 6, 2, 0, 0, 0).unwrap();
        let range = TimeRange {
            start: Some(start),
            end: Some(end),
        };

        assert!(range.contains(start));
        assert!(!range.contains(end));
        assert!(range.contains(start + chrono::Duration::hours(12)));

        let open = TimeRange::default();
        assert!(open.contains(start));
    }

    #[test]
    fn test_result_serializes_polymorphic_payload() {
        let result = QueryResult {
            id: "q-1".to_string(),
            query: "TOP_K(2)".to_string(),
            result: QueryValue::TopK(vec![TopKItem { bucket: 7, count: 42 }]),
            error: None,
            confidence: None,
            sample_size: 0,
            processing_time: 1200,
            is_approximate: true,
            timestamp: Utc.with_ymd_and_hms(2025, 6, 1, 0, 0, 0).unwrap(),
        };
        let json = result.to_json().unwrap();
        assert!(json.contains(r#""bucket":7"#));
        // optional fields are omitted entirely
        assert!(!json.contains("\"error\""));
    }

    #[test]
    fn test_null_payload_serializes_as_null() {
        let json = serde_json::to_string(&QueryValue::Null).unwrap();
        assert_eq!(json, "null");
    }
}
