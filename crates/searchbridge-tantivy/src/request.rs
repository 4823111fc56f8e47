//! Assembly of one engine-level request from a caller's `SearchRequest`.

use tantivy::query::{AllQuery, EmptyQuery, Query, QueryParser};
use tantivy::tokenizer::TokenizerManager;

use searchbridge_core::request::{SearchRequest, SortingField};

use crate::field_name::{
    date_time_field_name, double_field_name, integer_field_name, to_physical_name, FieldInventory,
    SEARCHABLE_FIELD_NAME,
};
use crate::filter::compile;

/// Distance 1 covers the original fuzziness coefficient of 0.7 for
/// typical term lengths.
const FUZZY_DISTANCE: u8 = 1;

/// How one sort key is read back from stored values.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SortBy {
    /// Relevance pseudo-field.
    Score,
    Double(String),
    Integer(String),
    DateTime(String),
    Str(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SortSpec {
    pub by: SortBy,
    pub descending: bool,
}

/// Everything the snapshot needs to execute one search.
pub struct EngineRequest {
    pub query: Box<dyn Query>,
    pub filter: Option<Box<dyn Query>>,
    pub sort: Vec<SortSpec>,
    pub window: usize,
}

pub fn build(request: &SearchRequest, inventory: &FieldInventory) -> EngineRequest {
    EngineRequest {
        query: keyword_query(request, inventory),
        filter: request.filter.as_ref().and_then(|f| compile(f, inventory)),
        sort: sort_specs(&request.sorting, inventory),
        window: request.skip.saturating_add(request.take).max(1),
    }
}

/// Keyword part only: the top-level filter is deliberately left out so
/// aggregations can reuse this with their own filters.
pub fn keyword_query(request: &SearchRequest, inventory: &FieldInventory) -> Box<dyn Query> {
    let Some(keywords) = request.keywords.as_deref() else {
        return Box::new(AllQuery);
    };
    let escaped = escape_keywords(keywords);
    if escaped.trim().is_empty() {
        return Box::new(AllQuery);
    }

    let field_names: Vec<String> = match request.search_fields.as_deref() {
        Some(fields) if !fields.is_empty() => {
            fields.iter().map(|f| to_physical_name(f)).collect()
        }
        _ => vec![SEARCHABLE_FIELD_NAME.to_string()],
    };
    let fields: Vec<tantivy::schema::Field> = field_names
        .iter()
        .filter_map(|name| inventory.field(name))
        .collect();
    if fields.is_empty() {
        // Keywords against an index with none of the requested fields.
        return Box::new(EmptyQuery);
    }

    let mut parser = QueryParser::new(
        inventory.schema().clone(),
        fields.clone(),
        TokenizerManager::default(),
    );
    parser.set_conjunction_by_default();
    if request.is_fuzzy {
        for field in fields {
            parser.set_field_fuzzy(field, false, FUZZY_DISTANCE, true);
        }
    }
    parser
        .parse_query(&escaped)
        .map_or_else(|_| Box::new(AllQuery) as Box<dyn Query>, |q| q)
}

/// Replace the query parser's metacharacters with whitespace so user
/// keywords are always plain terms.
pub fn escape_keywords(keywords: &str) -> String {
    keywords
        .chars()
        .map(|ch| match ch {
            '+' | '-' | '&' | '|' | '!' | '(' | ')' | '{' | '}' | '[' | ']' | '^' | '"' | '~'
            | '*' | '?' | ':' | '\\' | '/' => ' ',
            other => other,
        })
        .collect()
}

fn sort_specs(sorting: &[SortingField], inventory: &FieldInventory) -> Vec<SortSpec> {
    sorting
        .iter()
        .map(|field| SortSpec {
            by: sort_by(&field.field_name, inventory),
            descending: field.is_descending,
        })
        .collect()
}

fn sort_by(field_name: &str, inventory: &FieldInventory) -> SortBy {
    if field_name.eq_ignore_ascii_case("score") {
        return SortBy::Score;
    }
    let physical = to_physical_name(field_name);
    if inventory.has(&double_field_name(field_name)) {
        SortBy::Double(physical)
    } else if inventory.has(&integer_field_name(field_name)) {
        SortBy::Integer(physical)
    } else if inventory.has(&date_time_field_name(field_name)) {
        SortBy::DateTime(physical)
    } else {
        SortBy::Str(physical)
    }
}
