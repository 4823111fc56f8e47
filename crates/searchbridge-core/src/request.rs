//! Search and aggregation request types.

use serde::{Deserialize, Serialize};

use crate::filter::{Filter, RangeValue};

/// One sort key. `field_name == "score"` is the reserved relevance
/// pseudo-field.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SortingField {
    pub field_name: String,
    #[serde(default)]
    pub is_descending: bool,
}

impl SortingField {
    pub fn ascending(field_name: impl Into<String>) -> Self {
        Self { field_name: field_name.into(), is_descending: false }
    }

    pub fn descending(field_name: impl Into<String>) -> Self {
        Self { field_name: field_name.into(), is_descending: true }
    }
}

/// Per-field term aggregation: count documents per distinct value, or per
/// value of an explicit list. An aggregation with only a filter and an id
/// produces a single count bucket keyed by the id.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TermAggregationRequest {
    pub id: Option<String>,
    pub field_name: Option<String>,
    /// When present, only these values are counted; values that match no
    /// document are omitted from the response.
    pub values: Option<Vec<String>>,
    /// Keep at most this many buckets, by descending count. Zero or absent
    /// means all.
    pub size: Option<usize>,
    /// Counted independently of the request's top-level filter.
    pub filter: Option<Filter>,
}

/// One labelled bucket of a range aggregation.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RangeAggregationValue {
    pub id: String,
    #[serde(flatten)]
    pub range: RangeValue,
}

/// Per-field range aggregation: count documents per labelled range bucket.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RangeAggregationRequest {
    pub id: Option<String>,
    pub field_name: String,
    pub values: Vec<RangeAggregationValue>,
    pub filter: Option<Filter>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum AggregationRequest {
    Term(TermAggregationRequest),
    Range(RangeAggregationRequest),
}

impl AggregationRequest {
    /// Response key: explicit id first, field name otherwise.
    pub fn result_id(&self) -> Option<&str> {
        match self {
            AggregationRequest::Term(t) => t.id.as_deref().or(t.field_name.as_deref()),
            AggregationRequest::Range(r) => r.id.as_deref().or(Some(&r.field_name)),
        }
    }
}

/// A search over one logical index.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SearchRequest {
    /// Free-text keywords; absent or empty means match-all.
    pub keywords: Option<String>,
    /// Logical field names to search; absent means the cross-field mirror.
    pub search_fields: Option<Vec<String>>,
    #[serde(default)]
    pub is_fuzzy: bool,
    pub filter: Option<Filter>,
    #[serde(default)]
    pub sorting: Vec<SortingField>,
    #[serde(default)]
    pub skip: usize,
    #[serde(default)]
    pub take: usize,
    #[serde(default)]
    pub aggregations: Vec<AggregationRequest>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn aggregation_result_id_prefers_explicit_id() {
        let agg = AggregationRequest::Term(TermAggregationRequest {
            id: Some("Filtered".into()),
            field_name: Some("Color".into()),
            ..TermAggregationRequest::default()
        });
        assert_eq!(agg.result_id(), Some("Filtered"));

        let agg = AggregationRequest::Term(TermAggregationRequest {
            field_name: Some("Color".into()),
            ..TermAggregationRequest::default()
        });
        assert_eq!(agg.result_id(), Some("Color"));
    }
}
