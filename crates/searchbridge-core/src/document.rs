//! Typed document model, independent of how fields are physically indexed.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A geographic point in degrees.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GeoPoint {
    pub latitude: f64,
    pub longitude: f64,
}

impl GeoPoint {
    pub fn new(latitude: f64, longitude: f64) -> Self {
        Self { latitude, longitude }
    }
}

/// One typed value of a logical field.
///
/// `Integer` is 32-bit and `Float`/`Decimal` are 64-bit floats, matching the
/// sortable encodings the projector emits for them.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum FieldValue {
    String(String),
    Boolean(bool),
    DateTime(DateTime<Utc>),
    Integer(i32),
    Float(f64),
    Decimal(f64),
    GeoPoint(GeoPoint),
    Complex(serde_json::Value),
}

/// A typed, possibly multi-valued attribute of a document.
///
/// A field whose `values` is empty carries no information and is dropped
/// before projection.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DocumentField {
    pub name: String,
    pub values: Vec<FieldValue>,
    pub is_retrievable: bool,
    pub is_searchable: bool,
    pub is_filterable: bool,
}

impl DocumentField {
    pub fn new(name: impl Into<String>, value: FieldValue) -> Self {
        Self::multi(name, vec![value])
    }

    pub fn multi(name: impl Into<String>, values: Vec<FieldValue>) -> Self {
        Self {
            name: name.into(),
            values,
            is_retrievable: true,
            is_searchable: false,
            is_filterable: true,
        }
    }

    pub fn searchable(mut self) -> Self {
        self.is_searchable = true;
        self
    }

    pub fn not_retrievable(mut self) -> Self {
        self.is_retrievable = false;
        self
    }

    /// First value, if any. Single-valued accessors mirror how geo and
    /// complex fields are consumed.
    pub fn first_value(&self) -> Option<&FieldValue> {
        self.values.first()
    }
}

/// A document handed to the provider for indexing or removal.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IndexDocument {
    pub id: String,
    pub fields: Vec<DocumentField>,
}

impl IndexDocument {
    pub fn new(id: impl Into<String>) -> Self {
        Self { id: id.into(), fields: Vec::new() }
    }

    pub fn with_field(mut self, field: DocumentField) -> Self {
        self.fields.push(field);
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builder_accumulates_fields() {
        let doc = IndexDocument::new("Item-1")
            .with_field(DocumentField::new("Name", FieldValue::String("Sox".into())))
            .with_field(DocumentField::new("Size", FieldValue::Integer(2)).searchable());
        assert_eq!(doc.id, "Item-1");
        assert_eq!(doc.fields.len(), 2);
        assert!(doc.fields[1].is_searchable);
        assert!(doc.fields[0].is_retrievable);
    }

    #[test]
    fn field_value_round_trips_through_json() {
        let value = FieldValue::GeoPoint(GeoPoint::new(53.9, 27.56));
        let json = serde_json::to_string(&value).expect("serialize");
        let back: FieldValue = serde_json::from_str(&json).expect("deserialize");
        assert_eq!(back, value);
    }
}
