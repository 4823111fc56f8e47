//! Physical field naming: the pure codec mapping logical names to index
//! field names, and the read-path inventory used to probe field types
//! against a schema-less index.
//!
//! The codec is consulted on both paths: the projector uses it when writing
//! documents, and the filter compiler and request builder use it to recover
//! type information by checking which typed-suffix mirrors exist in the
//! open snapshot. That dual use is what lets the untyped engine behave as
//! if it had a schema.

use std::collections::HashSet;

use tantivy::schema::{Field, Schema};

/// Identity key field, always present and stored.
pub const KEY_FIELD_NAME: &str = "__id";
/// Cross-field full-text mirror fed by every searchable string value.
pub const SEARCHABLE_FIELD_NAME: &str = "__all";
/// Stored-only physical form of each document, used to rebuild the index
/// when a batch introduces new fields.
pub const SOURCE_FIELD_NAME: &str = "__source";

pub const BOOLEAN_FIELD_SUFFIX: &str = ".boolean";
pub const DATE_TIME_FIELD_SUFFIX: &str = ".datetime";
pub const DOUBLE_FIELD_SUFFIX: &str = ".double";
pub const INTEGER_FIELD_SUFFIX: &str = ".integer";
pub const COMPLEX_FIELD_SUFFIX: &str = ".complex";

/// Map a logical field name to its physical primary name.
pub fn to_physical_name(original: &str) -> String {
    original.to_lowercase()
}

pub fn boolean_field_name(original: &str) -> String {
    to_physical_name(&format!("{original}{BOOLEAN_FIELD_SUFFIX}"))
}

pub fn date_time_field_name(original: &str) -> String {
    to_physical_name(&format!("{original}{DATE_TIME_FIELD_SUFFIX}"))
}

pub fn double_field_name(original: &str) -> String {
    to_physical_name(&format!("{original}{DOUBLE_FIELD_SUFFIX}"))
}

pub fn integer_field_name(original: &str) -> String {
    to_physical_name(&format!("{original}{INTEGER_FIELD_SUFFIX}"))
}

pub fn complex_field_name(original: &str) -> String {
    to_physical_name(&format!("{original}{COMPLEX_FIELD_SUFFIX}"))
}

/// Geo sub-fields carry longitude/latitude as numeric columns next to the
/// stored "lon lat" primary value.
pub fn geo_x_field_name(original: &str) -> String {
    to_physical_name(&format!("{original}__x"))
}

pub fn geo_y_field_name(original: &str) -> String {
    to_physical_name(&format!("{original}__y"))
}

/// The live physical field inventory of one open snapshot.
///
/// Wraps the snapshot's schema: `has` answers type probes ("does the
/// `.integer` mirror of this field exist?") and `field` resolves a physical
/// name to an engine handle for term construction.
pub struct FieldInventory {
    schema: Schema,
    names: HashSet<String>,
}

impl FieldInventory {
    pub fn new(schema: Schema) -> Self {
        let names = schema
            .fields()
            .map(|(_, entry)| entry.name().to_string())
            .collect();
        Self { schema, names }
    }

    pub fn has(&self, physical_name: &str) -> bool {
        self.names.contains(physical_name)
    }

    pub fn field(&self, physical_name: &str) -> Option<Field> {
        self.schema.get_field(physical_name).ok()
    }

    pub fn schema(&self) -> &Schema {
        &self.schema
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn physical_names_are_lowercased() {
        assert_eq!(to_physical_name("Color"), "color");
        assert_eq!(to_physical_name("HasMultiplePrices"), "hasmultipleprices");
        assert_eq!(to_physical_name("__id"), "__id");
    }

    #[test]
    fn suffix_names_are_deterministic() {
        for _ in 0..3 {
            assert_eq!(boolean_field_name("HasMultiplePrices"), "hasmultipleprices.boolean");
            assert_eq!(date_time_field_name("Date"), "date.datetime");
            assert_eq!(double_field_name("Price"), "price.double");
            assert_eq!(integer_field_name("Size"), "size.integer");
            assert_eq!(complex_field_name("Variation"), "variation.complex");
        }
    }

    #[test]
    fn geo_sub_field_names() {
        assert_eq!(geo_x_field_name("Location"), "location__x");
        assert_eq!(geo_y_field_name("Location"), "location__y");
    }
}
