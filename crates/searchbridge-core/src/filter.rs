//! Recursive filter tree compiled by the engine adapter into native
//! filter expressions.

use serde::{Deserialize, Serialize};

use crate::document::GeoPoint;

/// One range tuple of a `Filter::Range`. Bounds are raw strings; the
/// compiler re-encodes them by probing the index for the field's type.
/// A tuple with both bounds absent contributes no constraint.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RangeValue {
    pub lower: Option<String>,
    pub upper: Option<String>,
    #[serde(default)]
    pub include_lower: bool,
    #[serde(default)]
    pub include_upper: bool,
}

impl RangeValue {
    pub fn new(lower: Option<&str>, upper: Option<&str>) -> Self {
        Self {
            lower: lower.map(str::to_owned),
            upper: upper.map(str::to_owned),
            include_lower: false,
            include_upper: false,
        }
    }

    pub fn including(mut self, lower: bool, upper: bool) -> Self {
        self.include_lower = lower;
        self.include_upper = upper;
        self
    }

    /// True when neither bound is present (empty strings count as absent).
    pub fn is_unbounded(&self) -> bool {
        let absent = |b: &Option<String>| b.as_deref().map_or(true, str::is_empty);
        absent(&self.lower) && absent(&self.upper)
    }
}

/// A caller's filtering intent, compiled recursively by the adapter.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Filter {
    /// Exact match on the identity field. An empty id list is no filter.
    Ids { values: Vec<String> },
    /// Exact match of any of `values` against a field, re-encoded to the
    /// field's indexed type when the index knows one.
    Term { field_name: String, values: Vec<String> },
    /// One or more range tuples, OR-joined.
    Range { field_name: String, values: Vec<RangeValue> },
    /// Documents whose geo field intersects a circle of `distance_km`
    /// around `location`.
    GeoDistance { field_name: String, location: GeoPoint, distance_km: f64 },
    /// Exact term match with `*`/`?` wildcards, unanalyzed.
    WildcardTerm { field_name: String, value: String },
    // The recursive variants are struct-shaped: internally tagged newtype
    // variants make serde instantiate a tagged serializer per nesting
    // level, which never terminates for a recursive type.
    Not { child: Box<Filter> },
    And { children: Vec<Filter> },
    Or { children: Vec<Filter> },
}

impl Filter {
    pub fn term(field_name: impl Into<String>, values: &[&str]) -> Self {
        Filter::Term {
            field_name: field_name.into(),
            values: values.iter().map(|v| (*v).to_owned()).collect(),
        }
    }

    pub fn range(field_name: impl Into<String>, values: Vec<RangeValue>) -> Self {
        Filter::Range { field_name: field_name.into(), values }
    }

    pub fn not(self) -> Self {
        Filter::Not { child: Box::new(self) }
    }

    pub fn and(children: Vec<Filter>) -> Self {
        Filter::And { children }
    }

    pub fn or(children: Vec<Filter>) -> Self {
        Filter::Or { children }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unbounded_range_value() {
        assert!(RangeValue::new(None, None).is_unbounded());
        assert!(RangeValue::new(Some(""), Some("")).is_unbounded());
        assert!(!RangeValue::new(Some("4"), None).is_unbounded());
        assert!(!RangeValue::new(None, Some("10")).is_unbounded());
    }

    #[test]
    fn filter_serde_tagging() {
        let filter = Filter::term("Color", &["Red"]).not();
        let json = serde_json::to_value(&filter).expect("serialize");
        assert_eq!(json["type"], "not");
        assert_eq!(json["child"]["type"], "term");
        let back: Filter = serde_json::from_value(json).expect("deserialize");
        assert_eq!(back, filter);
    }

    #[test]
    fn deeply_nested_trees_round_trip() {
        let filter = Filter::and(vec![
            Filter::or(vec![
                Filter::term("Color", &["Red"]),
                Filter::range("Size", vec![RangeValue::new(Some("5"), None)]),
            ]),
            Filter::Ids { values: vec!["Item-1".to_string()] }.not(),
        ]);
        let json = serde_json::to_string(&filter).expect("serialize");
        let back: Filter = serde_json::from_str(&json).expect("deserialize");
        assert_eq!(back, filter);
    }
}
