//! Filter tree compilation against a live field inventory.
//!
//! `compile` returns `None` for "no constraint"; callers treat that as
//! match-all. A filter that names a field the index has never seen
//! compiles to `EmptyQuery` instead, which matches nothing. The compiler
//! never errors; values that cannot be re-encoded under the probed type
//! are dropped.

use std::ops::Bound;

use chrono::{DateTime, NaiveDate, Utc};
use tantivy::query::{
    AllQuery, BooleanQuery, EmptyQuery, Occur, Query, RangeQuery, RegexQuery, TermSetQuery,
};
use tantivy::Term;

use searchbridge_core::filter::{Filter, RangeValue};

use crate::field_name::{
    boolean_field_name, date_time_field_name, double_field_name, geo_x_field_name,
    geo_y_field_name, integer_field_name, to_physical_name, FieldInventory, KEY_FIELD_NAME,
};
use crate::projector::date_time_ticks;
use crate::spatial::GeoDistanceQuery;

pub fn compile(filter: &Filter, inventory: &FieldInventory) -> Option<Box<dyn Query>> {
    match filter {
        Filter::Ids { values } => compile_ids(values, inventory),
        Filter::Term { field_name, values } => compile_term(field_name, values, inventory),
        Filter::Range { field_name, values } => compile_range(field_name, values, inventory),
        Filter::GeoDistance { field_name, location, distance_km } => {
            compile_geo(field_name, *location, *distance_km, inventory)
        }
        Filter::WildcardTerm { field_name, value } => {
            compile_wildcard(field_name, value, inventory)
        }
        Filter::Not { child } => compile(child, inventory).map(|q| {
            Box::new(BooleanQuery::new(vec![
                (Occur::Must, Box::new(AllQuery) as Box<dyn Query>),
                (Occur::MustNot, q),
            ])) as Box<dyn Query>
        }),
        Filter::And { children } => compile_group(children, Occur::Must, inventory),
        Filter::Or { children } => compile_group(children, Occur::Should, inventory),
    }
}

fn compile_ids(values: &[String], inventory: &FieldInventory) -> Option<Box<dyn Query>> {
    if values.is_empty() {
        return None;
    }
    let Some(field) = inventory.field(KEY_FIELD_NAME) else {
        return Some(Box::new(EmptyQuery));
    };
    let terms = values.iter().map(|id| Term::from_field_text(field, id));
    Some(Box::new(TermSetQuery::new(terms)))
}

/// Encoded representation of one logical field's term values, recovered by
/// probing which typed-suffix mirror exists.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum TermEncoding {
    Boolean,
    DateTime,
    Double,
    Integer,
    Text,
}

fn probe_term_encoding(field_name: &str, inventory: &FieldInventory) -> TermEncoding {
    if inventory.has(&boolean_field_name(field_name)) {
        TermEncoding::Boolean
    } else if inventory.has(&date_time_field_name(field_name)) {
        TermEncoding::DateTime
    } else if inventory.has(&double_field_name(field_name)) {
        TermEncoding::Double
    } else if inventory.has(&integer_field_name(field_name)) {
        TermEncoding::Integer
    } else {
        TermEncoding::Text
    }
}

fn encode_term(field: tantivy::schema::Field, encoding: TermEncoding, value: &str) -> Option<Term> {
    match encoding {
        TermEncoding::Boolean => {
            let literal = parse_boolean(value)?;
            Some(Term::from_field_text(field, literal))
        }
        TermEncoding::DateTime => {
            let ticks = date_time_ticks(&parse_date_time(value)?);
            Some(Term::from_field_i64(field, ticks))
        }
        TermEncoding::Double => value.parse::<f64>().ok().map(|v| Term::from_field_f64(field, v)),
        TermEncoding::Integer => value
            .parse::<i32>()
            .ok()
            .map(|v| Term::from_field_i64(field, i64::from(v))),
        TermEncoding::Text => Some(Term::from_field_text(field, value)),
    }
}

fn compile_term(
    field_name: &str,
    values: &[String],
    inventory: &FieldInventory,
) -> Option<Box<dyn Query>> {
    let physical = to_physical_name(field_name);
    let Some(field) = inventory.field(&physical) else {
        return Some(Box::new(EmptyQuery));
    };
    let encoding = probe_term_encoding(field_name, inventory);
    let terms: Vec<Term> = values
        .iter()
        .filter_map(|v| encode_term(field, encoding, v))
        .collect();
    Some(Box::new(TermSetQuery::new(terms)))
}

fn compile_range(
    field_name: &str,
    values: &[RangeValue],
    inventory: &FieldInventory,
) -> Option<Box<dyn Query>> {
    let physical = to_physical_name(field_name);
    let Some(field) = inventory.field(&physical) else {
        return Some(Box::new(EmptyQuery));
    };

    let mut clauses: Vec<Box<dyn Query>> = Vec::new();
    for value in values {
        if let Some(query) = compile_range_value(field, field_name, value, inventory) {
            clauses.push(query);
        }
    }
    join(clauses, Occur::Should)
}

fn compile_range_value(
    field: tantivy::schema::Field,
    field_name: &str,
    value: &RangeValue,
    inventory: &FieldInventory,
) -> Option<Box<dyn Query>> {
    let lower = bound_text(value.lower.as_deref());
    let upper = bound_text(value.upper.as_deref());
    if lower.is_none() && upper.is_none() {
        return None;
    }

    // Probe typed suffixes in fixed priority order; a type only applies
    // when at least one present bound parses under it.
    if inventory.has(&date_time_field_name(field_name)) {
        let lo = lower.and_then(parse_date_time).map(|d| date_time_ticks(&d));
        let hi = upper.and_then(parse_date_time).map(|d| date_time_ticks(&d));
        if lo.is_some() || hi.is_some() {
            return range_query(
                bound(lo.map(|v| Term::from_field_i64(field, v)), value.include_lower),
                bound(hi.map(|v| Term::from_field_i64(field, v)), value.include_upper),
            );
        }
    }
    if inventory.has(&double_field_name(field_name)) {
        let lo = lower.and_then(|v| v.parse::<f64>().ok());
        let hi = upper.and_then(|v| v.parse::<f64>().ok());
        if lo.is_some() || hi.is_some() {
            return range_query(
                bound(lo.map(|v| Term::from_field_f64(field, v)), value.include_lower),
                bound(hi.map(|v| Term::from_field_f64(field, v)), value.include_upper),
            );
        }
    }
    if inventory.has(&integer_field_name(field_name)) {
        let lo = lower.and_then(|v| v.parse::<i32>().ok()).map(i64::from);
        let hi = upper.and_then(|v| v.parse::<i32>().ok()).map(i64::from);
        if lo.is_some() || hi.is_some() {
            return range_query(
                bound(lo.map(|v| Term::from_field_i64(field, v)), value.include_lower),
                bound(hi.map(|v| Term::from_field_i64(field, v)), value.include_upper),
            );
        }
    }
    // String fallback only applies to text primaries; a typed primary
    // whose bounds failed every parse contributes nothing.
    let is_text = matches!(
        inventory.schema().get_field_entry(field).field_type(),
        tantivy::schema::FieldType::Str(_)
    );
    if !is_text {
        return None;
    }
    range_query(
        bound(lower.map(|v| Term::from_field_text(field, v)), value.include_lower),
        bound(upper.map(|v| Term::from_field_text(field, v)), value.include_upper),
    )
}

fn bound_text(value: Option<&str>) -> Option<&str> {
    value.filter(|v| !v.is_empty())
}

fn bound(term: Option<Term>, include: bool) -> Bound<Term> {
    match term {
        None => Bound::Unbounded,
        Some(t) if include => Bound::Included(t),
        Some(t) => Bound::Excluded(t),
    }
}

fn range_query(lower: Bound<Term>, upper: Bound<Term>) -> Option<Box<dyn Query>> {
    if matches!((&lower, &upper), (Bound::Unbounded, Bound::Unbounded)) {
        return None;
    }
    Some(Box::new(RangeQuery::new(lower, upper)))
}

fn compile_geo(
    field_name: &str,
    location: searchbridge_core::document::GeoPoint,
    distance_km: f64,
    inventory: &FieldInventory,
) -> Option<Box<dyn Query>> {
    let x_field = geo_x_field_name(field_name);
    let y_field = geo_y_field_name(field_name);
    if !inventory.has(&x_field) || !inventory.has(&y_field) {
        return Some(Box::new(EmptyQuery));
    }
    Some(Box::new(GeoDistanceQuery::new(x_field, y_field, location, distance_km)))
}

fn compile_wildcard(
    field_name: &str,
    value: &str,
    inventory: &FieldInventory,
) -> Option<Box<dyn Query>> {
    let physical = to_physical_name(field_name);
    let Some(field) = inventory.field(&physical) else {
        return Some(Box::new(EmptyQuery));
    };
    let pattern = wildcard_to_regex(value);
    match RegexQuery::from_pattern(&pattern, field) {
        Ok(query) => Some(Box::new(query)),
        Err(_) => None,
    }
}

fn wildcard_to_regex(value: &str) -> String {
    let mut pattern = String::with_capacity(value.len() * 2);
    for ch in value.chars() {
        match ch {
            '*' => pattern.push_str(".*"),
            '?' => pattern.push('.'),
            '.' | '+' | '(' | ')' | '[' | ']' | '{' | '}' | '|' | '^' | '$' | '\\' | '-' | '&'
            | '~' | '#' | '@' | '"' | '<' | '>' => {
                pattern.push('\\');
                pattern.push(ch);
            }
            other => pattern.push(other),
        }
    }
    pattern
}

fn compile_group(
    children: &[Filter],
    occur: Occur,
    inventory: &FieldInventory,
) -> Option<Box<dyn Query>> {
    let clauses: Vec<Box<dyn Query>> = children
        .iter()
        .filter_map(|child| compile(child, inventory))
        .collect();
    join(clauses, occur)
}

fn join(mut clauses: Vec<Box<dyn Query>>, occur: Occur) -> Option<Box<dyn Query>> {
    match clauses.len() {
        0 => None,
        1 => clauses.pop(),
        _ => Some(Box::new(BooleanQuery::new(
            clauses.into_iter().map(|q| (occur, q)).collect(),
        ))),
    }
}

fn parse_boolean(value: &str) -> Option<&'static str> {
    if value.eq_ignore_ascii_case("true") {
        Some("true")
    } else if value.eq_ignore_ascii_case("false") {
        Some("false")
    } else {
        None
    }
}

pub(crate) fn parse_date_time(value: &str) -> Option<DateTime<Utc>> {
    if let Ok(parsed) = DateTime::parse_from_rfc3339(value) {
        return Some(parsed.with_timezone(&Utc));
    }
    NaiveDate::parse_from_str(value, "%Y-%m-%d")
        .ok()
        .and_then(|d| d.and_hms_opt(0, 0, 0))
        .map(|d| d.and_utc())
}

#[cfg(test)]
mod tests {
    use super::*;
    use searchbridge_core::document::GeoPoint;
    use tantivy::schema::{Schema, INDEXED, STORED, STRING};

    fn inventory() -> FieldInventory {
        let mut builder = Schema::builder();
        builder.add_text_field("__id", STRING | STORED);
        builder.add_text_field("color", STRING | STORED);
        builder.add_i64_field("size", INDEXED | STORED);
        builder.add_text_field("size.integer", STRING);
        builder.add_i64_field("date", INDEXED | STORED);
        builder.add_text_field("date.datetime", STRING);
        builder.add_text_field("hasmultipleprices", STRING | STORED);
        builder.add_text_field("hasmultipleprices.boolean", STRING);
        builder.add_f64_field("location__x", INDEXED);
        builder.add_f64_field("location__y", INDEXED);
        FieldInventory::new(builder.build())
    }

    #[test]
    fn empty_ids_list_is_no_constraint() {
        assert!(compile(&Filter::Ids { values: vec![] }, &inventory()).is_none());
        assert!(compile(&Filter::Ids { values: vec!["Item-1".into()] }, &inventory()).is_some());
    }

    #[test]
    fn term_on_unknown_field_matches_nothing() {
        let query = compile(&Filter::term("Brand", &["Acme"]), &inventory()).expect("query");
        assert!(query.is::<EmptyQuery>());
    }

    #[test]
    fn term_probes_integer_mirror() {
        let query = compile(&Filter::term("Size", &["4"]), &inventory()).expect("query");
        assert!(query.is::<TermSetQuery>());
    }

    #[test]
    fn boolean_values_are_parsed_case_insensitively() {
        let lower = format!(
            "{:?}",
            compile(&Filter::term("HasMultiplePrices", &["true"]), &inventory()).expect("query")
        );
        let mixed = format!(
            "{:?}",
            compile(&Filter::term("HasMultiplePrices", &["tRue"]), &inventory()).expect("query")
        );
        assert_eq!(lower, mixed);
    }

    #[test]
    fn fully_open_range_tuple_is_dropped() {
        let filter = Filter::range("Size", vec![RangeValue::new(None, None)]);
        assert!(compile(&filter, &inventory()).is_none());
    }

    #[test]
    fn range_tuples_or_join() {
        let filter = Filter::range(
            "Size",
            vec![RangeValue::new(Some("0"), Some("4")), RangeValue::new(Some("4"), Some("10"))],
        );
        let query = compile(&filter, &inventory()).expect("query");
        assert!(query.is::<BooleanQuery>());
    }

    #[test]
    fn string_ranges_apply_to_text_primaries() {
        let filter = Filter::range("Color", vec![RangeValue::new(Some("a"), Some("z"))]);
        let query = compile(&filter, &inventory()).expect("query");
        assert!(query.is::<RangeQuery>());
    }

    #[test]
    fn unparseable_bounds_on_a_typed_primary_contribute_nothing() {
        let filter = Filter::range("Date", vec![RangeValue::new(Some("a"), Some("z"))]);
        assert!(compile(&filter, &inventory()).is_none());
    }

    #[test]
    fn not_of_nothing_is_nothing() {
        let inner = Filter::Ids { values: vec![] };
        assert!(compile(&inner.not(), &inventory()).is_none());
        let some = Filter::term("Color", &["Red"]).not();
        assert!(compile(&some, &inventory()).expect("query").is::<BooleanQuery>());
    }

    #[test]
    fn single_surviving_child_is_unwrapped() {
        let group = Filter::and(vec![Filter::Ids { values: vec![] }, Filter::term("Size", &["4"])]);
        let direct = compile(&Filter::term("Size", &["4"]), &inventory()).expect("direct");
        let grouped = compile(&group, &inventory()).expect("grouped");
        assert_eq!(format!("{direct:?}"), format!("{grouped:?}"));
    }

    #[test]
    fn empty_group_is_no_constraint() {
        assert!(compile(&Filter::and(vec![]), &inventory()).is_none());
        assert!(compile(&Filter::or(vec![]), &inventory()).is_none());
    }

    #[test]
    fn geo_filter_requires_sub_fields() {
        let known = Filter::GeoDistance {
            field_name: "Location".into(),
            location: GeoPoint::new(0.0, 14.0),
            distance_km: 1110.0,
        };
        assert!(!compile(&known, &inventory()).expect("query").is::<EmptyQuery>());
        let unknown = Filter::GeoDistance {
            field_name: "Elsewhere".into(),
            location: GeoPoint::new(0.0, 14.0),
            distance_km: 1110.0,
        };
        assert!(compile(&unknown, &inventory()).expect("query").is::<EmptyQuery>());
    }

    #[test]
    fn wildcards_translate_to_anchored_regex() {
        assert_eq!(wildcard_to_regex("*ed"), ".*ed");
        assert_eq!(wildcard_to_regex("b?g"), "b.g");
        assert_eq!(wildcard_to_regex("a.b*"), "a\\.b.*");
    }

    #[test]
    fn parses_dates_with_and_without_time() {
        assert!(parse_date_time("2017-04-28T15:24:31Z").is_some());
        assert!(parse_date_time("2017-04-28").is_some());
        assert!(parse_date_time("not a date").is_none());
    }
}
