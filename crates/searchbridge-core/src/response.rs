//! Responses returned to callers: search hits, aggregation counts, and
//! per-document indexing outcomes.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// One retrieved document. `fields` holds the stored values keyed by the
/// physical field name: multi-valued fields come back as JSON arrays,
/// single values as scalars, date-times as RFC 3339 strings.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SearchDocument {
    pub id: String,
    pub fields: BTreeMap<String, serde_json::Value>,
}

impl SearchDocument {
    pub fn field(&self, name: &str) -> Option<&serde_json::Value> {
        self.fields.get(name)
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AggregationResponseValue {
    pub id: String,
    pub count: u64,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AggregationResponse {
    pub id: String,
    pub values: Vec<AggregationResponseValue>,
}

impl AggregationResponse {
    pub fn value_count(&self, value_id: &str) -> u64 {
        self.values.iter().find(|v| v.id == value_id).map_or(0, |v| v.count)
    }
}

/// Result of a search: the requested window of documents plus the total
/// number of matches and any aggregation counts.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SearchResponse {
    pub documents: Vec<SearchDocument>,
    pub total_count: u64,
    pub aggregations: Vec<AggregationResponse>,
}

impl SearchResponse {
    pub fn aggregation(&self, id: &str) -> Option<&AggregationResponse> {
        self.aggregations.iter().find(|a| a.id == id)
    }
}

/// Outcome for one document of an index or remove batch. Items keep the
/// submission order and are independent of each other.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct IndexingResultItem {
    pub id: String,
    pub succeeded: bool,
    pub error_message: Option<String>,
}

impl IndexingResultItem {
    pub fn succeeded(id: impl Into<String>) -> Self {
        Self { id: id.into(), succeeded: true, error_message: None }
    }

    pub fn failed(id: impl Into<String>, message: impl Into<String>) -> Self {
        Self { id: id.into(), succeeded: false, error_message: Some(message.into()) }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct IndexingResult {
    pub items: Vec<IndexingResultItem>,
}
