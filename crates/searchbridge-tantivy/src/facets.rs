//! Aggregation counting. Counts run against the keyword query plus each
//! aggregation's own filter; the request's top-level filter deliberately
//! plays no part, so facet counts stay stable while the caller drills
//! down.

use std::collections::{HashMap, HashSet};

use anyhow::Result;

use searchbridge_core::filter::Filter;
use searchbridge_core::request::{
    AggregationRequest, RangeAggregationRequest, SearchRequest, TermAggregationRequest,
};
use searchbridge_core::response::{AggregationResponse, AggregationResponseValue};

use crate::field_name::to_physical_name;
use crate::filter::compile;
use crate::request::keyword_query;
use crate::search::{combine, Snapshot};

pub fn reduce(snapshot: &Snapshot, request: &SearchRequest) -> Result<Vec<AggregationResponse>> {
    let mut responses = Vec::new();
    for aggregation in &request.aggregations {
        let Some(id) = aggregation.result_id() else {
            continue;
        };
        let id = id.to_string();
        let response = match aggregation {
            AggregationRequest::Term(term) => reduce_term(snapshot, request, term, id)?,
            AggregationRequest::Range(range) => reduce_range(snapshot, request, range, id)?,
        };
        if let Some(response) = response {
            responses.push(response);
        }
    }
    Ok(responses)
}

fn base_query(
    snapshot: &Snapshot,
    request: &SearchRequest,
    filter: Option<&Filter>,
) -> Box<dyn tantivy::query::Query> {
    let keyword = keyword_query(request, snapshot.inventory());
    let compiled = filter.and_then(|f| compile(f, snapshot.inventory()));
    combine(keyword, compiled.as_deref())
}

fn reduce_term(
    snapshot: &Snapshot,
    request: &SearchRequest,
    aggregation: &TermAggregationRequest,
    id: String,
) -> Result<Option<AggregationResponse>> {
    let base = base_query(snapshot, request, aggregation.filter.as_ref());

    let Some(field_name) = aggregation.field_name.as_deref() else {
        // Filter-only aggregation: one bucket keyed by the aggregation id.
        let count = snapshot.count(&*base)? as u64;
        return Ok(Some(AggregationResponse {
            id: id.clone(),
            values: vec![AggregationResponseValue { id, count }],
        }));
    };

    let physical = to_physical_name(field_name);
    if !snapshot.inventory().has(&physical) {
        return Ok(None);
    }

    let mut counts: HashMap<String, u64> = HashMap::new();
    for address in snapshot.matching_docs(&*base)? {
        let distinct: HashSet<String> =
            snapshot.stored_strings(address, &physical)?.into_iter().collect();
        for value in distinct {
            *counts.entry(value).or_insert(0) += 1;
        }
    }

    let values = match &aggregation.values {
        Some(requested) => requested
            .iter()
            .filter_map(|value| {
                counts
                    .get(value)
                    .map(|&count| AggregationResponseValue { id: value.clone(), count })
            })
            .collect(),
        None => {
            let mut values: Vec<AggregationResponseValue> = counts
                .into_iter()
                .map(|(value, count)| AggregationResponseValue { id: value, count })
                .collect();
            values.sort_by(|a, b| b.count.cmp(&a.count).then_with(|| a.id.cmp(&b.id)));
            if let Some(size) = aggregation.size.filter(|&s| s > 0) {
                values.truncate(size);
            }
            values
        }
    };
    Ok(Some(AggregationResponse { id, values }))
}

fn reduce_range(
    snapshot: &Snapshot,
    request: &SearchRequest,
    aggregation: &RangeAggregationRequest,
    id: String,
) -> Result<Option<AggregationResponse>> {
    let physical = to_physical_name(&aggregation.field_name);
    if !snapshot.inventory().has(&physical) {
        return Ok(None);
    }

    let base = base_query(snapshot, request, aggregation.filter.as_ref());
    let mut values = Vec::with_capacity(aggregation.values.len());
    for bucket in &aggregation.values {
        let range_filter = Filter::Range {
            field_name: aggregation.field_name.clone(),
            values: vec![bucket.range.clone()],
        };
        let compiled = compile(&range_filter, snapshot.inventory());
        let query = combine(base.box_clone(), compiled.as_deref());
        let count = snapshot.count(&*query)? as u64;
        values.push(AggregationResponseValue { id: bucket.id.clone(), count });
    }
    Ok(Some(AggregationResponse { id, values }))
}
