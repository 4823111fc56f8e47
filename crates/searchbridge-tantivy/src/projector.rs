//! Document projection: one typed `IndexDocument` becomes the set of
//! physical fields the engine writer accepts.
//!
//! Projection is a pure function of the document. Each logical field
//! expands to a primary physical field plus, depending on its type, a
//! typed-suffix mirror (so query-time code can probe the field's type) and
//! a `__all` mirror (so searchable strings take part in cross-field
//! keyword search).

use anyhow::Result;
use serde::{Deserialize, Serialize};

use searchbridge_core::document::{DocumentField, FieldValue, IndexDocument};

use crate::field_name::{
    boolean_field_name, complex_field_name, date_time_field_name, double_field_name,
    geo_x_field_name, geo_y_field_name, integer_field_name, to_physical_name, KEY_FIELD_NAME,
    SEARCHABLE_FIELD_NAME,
};

/// Logical string fields holding free text; their primary physical field is
/// analyzed instead of indexed as one raw term.
const TEXT_FIELDS: [&str; 2] = ["__content", "content"];

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum PhysicalValue {
    Str(String),
    I64(i64),
    F64(f64),
}

/// One real index field produced by projection.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PhysicalField {
    pub name: String,
    pub value: PhysicalValue,
    pub stored: bool,
    pub indexed: bool,
    /// Tokenized free text rather than one raw term. Only meaningful for
    /// `Str` values.
    pub analyzed: bool,
}

impl PhysicalField {
    fn term(name: String, value: PhysicalValue, stored: bool) -> Self {
        Self { name, value, stored, indexed: true, analyzed: false }
    }

    fn mirror(name: String, value: PhysicalValue) -> Self {
        Self { name, value, stored: false, indexed: true, analyzed: false }
    }

    fn stored_only(name: String, value: PhysicalValue) -> Self {
        Self { name, value, stored: true, indexed: false, analyzed: false }
    }
}

/// Sortable 64-bit encoding of a date-time: microseconds since the Unix
/// epoch.
pub fn date_time_ticks(value: &chrono::DateTime<chrono::Utc>) -> i64 {
    value.timestamp_micros()
}

/// Project one document. The identity field is synthesized and prepended;
/// remaining fields are sorted by name so the physical field order is
/// deterministic; fields without values are dropped.
pub fn project(document: &IndexDocument) -> Result<Vec<PhysicalField>> {
    let identity = DocumentField::new(KEY_FIELD_NAME, FieldValue::String(document.id.clone()));

    let mut fields: Vec<&DocumentField> = document
        .fields
        .iter()
        .filter(|f| !f.values.is_empty() && f.name != KEY_FIELD_NAME)
        .collect();
    fields.sort_by(|a, b| a.name.cmp(&b.name));

    let mut result = Vec::new();
    project_field(&identity, &mut result)?;
    for field in fields {
        project_field(field, &mut result)?;
    }
    Ok(result)
}

fn project_field(field: &DocumentField, out: &mut Vec<PhysicalField>) -> Result<()> {
    let name = to_physical_name(&field.name);

    match field.first_value() {
        Some(FieldValue::String(_)) => {
            let analyzed = TEXT_FIELDS.iter().any(|t| t.eq_ignore_ascii_case(&field.name));
            for value in string_values(field)? {
                out.push(PhysicalField {
                    name: name.clone(),
                    value: PhysicalValue::Str(value.clone()),
                    stored: field.is_retrievable,
                    indexed: true,
                    analyzed,
                });
                if field.is_searchable {
                    out.push(PhysicalField {
                        name: SEARCHABLE_FIELD_NAME.to_string(),
                        value: PhysicalValue::Str(value),
                        stored: false,
                        indexed: true,
                        analyzed: true,
                    });
                }
            }
        }
        Some(FieldValue::Boolean(_)) => {
            for value in field.values.iter().filter_map(as_bool) {
                let text = value.to_string();
                out.push(PhysicalField::term(
                    name.clone(),
                    PhysicalValue::Str(text.clone()),
                    field.is_retrievable,
                ));
                out.push(PhysicalField::mirror(
                    boolean_field_name(&field.name),
                    PhysicalValue::Str(text),
                ));
            }
        }
        Some(FieldValue::DateTime(_)) => {
            for value in &field.values {
                if let FieldValue::DateTime(dt) = value {
                    out.push(PhysicalField::term(
                        name.clone(),
                        PhysicalValue::I64(date_time_ticks(dt)),
                        field.is_retrievable,
                    ));
                    out.push(PhysicalField::mirror(
                        date_time_field_name(&field.name),
                        PhysicalValue::Str(dt.to_rfc3339()),
                    ));
                }
            }
        }
        Some(FieldValue::Integer(_)) => {
            for value in &field.values {
                if let FieldValue::Integer(v) = value {
                    out.push(PhysicalField::term(
                        name.clone(),
                        PhysicalValue::I64(i64::from(*v)),
                        field.is_retrievable,
                    ));
                    out.push(PhysicalField::mirror(
                        integer_field_name(&field.name),
                        PhysicalValue::Str(v.to_string()),
                    ));
                }
            }
        }
        Some(FieldValue::Float(_) | FieldValue::Decimal(_)) => {
            for value in &field.values {
                if let FieldValue::Float(v) | FieldValue::Decimal(v) = value {
                    out.push(PhysicalField::term(
                        name.clone(),
                        PhysicalValue::F64(*v),
                        field.is_retrievable,
                    ));
                    out.push(PhysicalField::mirror(
                        double_field_name(&field.name),
                        PhysicalValue::Str(v.to_string()),
                    ));
                }
            }
        }
        Some(FieldValue::GeoPoint(point)) => {
            // Spatial strategy sub-fields plus a human-readable stored form.
            // Single-valued, like the original spatial integration.
            out.push(PhysicalField::mirror(
                geo_x_field_name(&field.name),
                PhysicalValue::F64(point.longitude),
            ));
            out.push(PhysicalField::mirror(
                geo_y_field_name(&field.name),
                PhysicalValue::F64(point.latitude),
            ));
            out.push(PhysicalField::stored_only(
                name,
                PhysicalValue::Str(format!("{} {}", point.longitude, point.latitude)),
            ));
        }
        Some(FieldValue::Complex(value)) => {
            out.push(PhysicalField::stored_only(
                name,
                PhysicalValue::Str(serde_json::to_string(value)?),
            ));
            out.push(PhysicalField::mirror(
                complex_field_name(&field.name),
                PhysicalValue::Str(String::new()),
            ));
        }
        None => {}
    }

    Ok(())
}

fn string_values(field: &DocumentField) -> Result<Vec<String>> {
    field
        .values
        .iter()
        .map(|v| match v {
            FieldValue::String(s) => Ok(s.clone()),
            other => anyhow::bail!(
                "field '{}' mixes string and non-string values: {other:?}",
                field.name
            ),
        })
        .collect()
}

fn as_bool(value: &FieldValue) -> Option<bool> {
    match value {
        FieldValue::Boolean(b) => Some(*b),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};
    use searchbridge_core::document::GeoPoint;

    fn names(fields: &[PhysicalField]) -> Vec<&str> {
        fields.iter().map(|f| f.name.as_str()).collect()
    }

    #[test]
    fn identity_field_is_prepended() {
        let doc = IndexDocument::new("Item-1")
            .with_field(DocumentField::new("Name", FieldValue::String("Sox".into())));
        let fields = project(&doc).expect("project");
        assert_eq!(fields[0].name, "__id");
        assert_eq!(fields[0].value, PhysicalValue::Str("Item-1".into()));
        assert!(fields[0].stored);
    }

    #[test]
    fn fields_are_sorted_by_name() {
        let doc = IndexDocument::new("Item-1")
            .with_field(DocumentField::new("Size", FieldValue::Integer(4)))
            .with_field(DocumentField::new("Color", FieldValue::String("Red".into())));
        let fields = project(&doc).expect("project");
        assert_eq!(names(&fields), vec!["__id", "color", "size", "size.integer"]);
    }

    #[test]
    fn searchable_strings_mirror_into_all() {
        let doc = IndexDocument::new("Item-1").with_field(
            DocumentField::new("Color", FieldValue::String("Red".into())).searchable(),
        );
        let fields = project(&doc).expect("project");
        let all: Vec<_> = fields.iter().filter(|f| f.name == "__all").collect();
        assert_eq!(all.len(), 1);
        assert!(all[0].analyzed);
        assert!(!all[0].stored);
    }

    #[test]
    fn content_field_is_analyzed() {
        let doc = IndexDocument::new("Item-1").with_field(
            DocumentField::new("Content", FieldValue::String("red shirt".into())).searchable(),
        );
        let fields = project(&doc).expect("project");
        let primary = fields.iter().find(|f| f.name == "content").expect("content");
        assert!(primary.analyzed);
    }

    #[test]
    fn boolean_gets_suffix_mirror() {
        let doc = IndexDocument::new("Item-1")
            .with_field(DocumentField::new("HasMultiplePrices", FieldValue::Boolean(true)));
        let fields = project(&doc).expect("project");
        let mirror = fields
            .iter()
            .find(|f| f.name == "hasmultipleprices.boolean")
            .expect("mirror");
        assert_eq!(mirror.value, PhysicalValue::Str("true".into()));
        assert!(!mirror.stored);
        let primary = fields.iter().find(|f| f.name == "hasmultipleprices").expect("primary");
        assert_eq!(primary.value, PhysicalValue::Str("true".into()));
    }

    #[test]
    fn date_time_projects_ticks_and_string_mirror() {
        let date = Utc.with_ymd_and_hms(2017, 4, 28, 15, 24, 31).single().expect("date");
        let doc = IndexDocument::new("Item-1")
            .with_field(DocumentField::new("Date", FieldValue::DateTime(date)));
        let fields = project(&doc).expect("project");
        let primary = fields.iter().find(|f| f.name == "date").expect("primary");
        assert_eq!(primary.value, PhysicalValue::I64(date.timestamp_micros()));
        assert!(fields.iter().any(|f| f.name == "date.datetime"));
    }

    #[test]
    fn geo_point_projects_sub_fields_and_stored_form() {
        let doc = IndexDocument::new("Item-1").with_field(DocumentField::new(
            "Location",
            FieldValue::GeoPoint(GeoPoint::new(0.0, 15.0)),
        ));
        let fields = project(&doc).expect("project");
        assert!(fields.iter().any(|f| f.name == "location__x"
            && f.value == PhysicalValue::F64(15.0)));
        assert!(fields.iter().any(|f| f.name == "location__y"
            && f.value == PhysicalValue::F64(0.0)));
        let stored = fields.iter().find(|f| f.name == "location").expect("stored");
        assert_eq!(stored.value, PhysicalValue::Str("15 0".into()));
        assert!(!stored.indexed);
    }

    #[test]
    fn complex_is_stored_with_presence_marker() {
        let doc = IndexDocument::new("Item-1").with_field(DocumentField::new(
            "Variation",
            FieldValue::Complex(serde_json::json!({"sku": "A-1"})),
        ));
        let fields = project(&doc).expect("project");
        let primary = fields.iter().find(|f| f.name == "variation").expect("primary");
        assert!(!primary.indexed);
        let marker = fields.iter().find(|f| f.name == "variation.complex").expect("marker");
        assert_eq!(marker.value, PhysicalValue::Str(String::new()));
    }

    #[test]
    fn empty_fields_are_dropped() {
        let doc = IndexDocument::new("Item-1")
            .with_field(DocumentField::multi("Empty", vec![]))
            .with_field(DocumentField::new("Size", FieldValue::Integer(2)));
        let fields = project(&doc).expect("project");
        assert!(!names(&fields).contains(&"empty"));
    }

    #[test]
    fn projection_is_deterministic() {
        let doc = IndexDocument::new("Item-1")
            .with_field(DocumentField::new("B", FieldValue::Integer(1)))
            .with_field(DocumentField::new("A", FieldValue::String("x".into())));
        let first = project(&doc).expect("project");
        let second = project(&doc).expect("project");
        assert_eq!(first, second);
    }
}
