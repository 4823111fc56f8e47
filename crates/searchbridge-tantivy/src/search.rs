//! Read path: committed snapshots, hit collection, adapter-side sorting
//! and conversion of stored fields back into retrieved documents.
//!
//! Sorting happens here rather than in the engine because sort fields are
//! only known at query time; keys are read from the stored primary values
//! of each hit.

use std::cmp::Ordering;
use std::path::Path;

use anyhow::{Context, Result};
use tantivy::collector::{Collector, Count, DocSetCollector, SegmentCollector};
use tantivy::query::{BooleanQuery, Occur, Query};
use tantivy::schema::{FieldType, Value};
use tantivy::{DocAddress, DocId, Index, Score, Searcher, SegmentOrdinal, SegmentReader,
    TantivyDocument};

use searchbridge_core::response::SearchDocument;

use crate::field_name::{
    date_time_field_name, FieldInventory, KEY_FIELD_NAME, SOURCE_FIELD_NAME,
};
use crate::request::{EngineRequest, SortBy, SortSpec};

/// A committed read snapshot of one index. Opening never touches the
/// writer registry.
pub struct Snapshot {
    searcher: Searcher,
    inventory: FieldInventory,
}

impl Snapshot {
    /// `None` when no index exists at `path` yet.
    pub fn open(path: &Path) -> Result<Option<Self>> {
        if !path.join("meta.json").exists() {
            return Ok(None);
        }
        let index = Index::open_in_dir(path)
            .with_context(|| format!("open index at {}", path.display()))?;
        let searcher = index.reader()?.searcher();
        let inventory = FieldInventory::new(index.schema());
        Ok(Some(Self { searcher, inventory }))
    }

    pub fn inventory(&self) -> &FieldInventory {
        &self.inventory
    }

    /// Run the request: rank, sort, and return the leading `window` hits
    /// plus the total match count.
    pub fn execute(&self, request: &EngineRequest) -> Result<(Vec<SearchDocument>, u64)> {
        let query = combine(request.query.box_clone(), request.filter.as_deref());
        let mut hits = self.searcher.search(&*query, &AllHitsCollector)?;
        let total = hits.len() as u64;

        if request.sort.is_empty() {
            hits.sort_by(|a, b| {
                b.0.total_cmp(&a.0).then_with(|| a.1.cmp(&b.1))
            });
        } else {
            self.sort_hits(&mut hits, &request.sort)?;
        }
        hits.truncate(request.window);

        let mut documents = Vec::with_capacity(hits.len());
        for (_, address) in hits {
            documents.push(self.to_search_document(address)?);
        }
        Ok((documents, total))
    }

    pub fn count(&self, query: &dyn Query) -> Result<usize> {
        Ok(self.searcher.search(query, &Count)?)
    }

    pub fn matching_docs(&self, query: &dyn Query) -> Result<Vec<DocAddress>> {
        let addresses = self.searcher.search(query, &DocSetCollector)?;
        Ok(addresses.into_iter().collect())
    }

    /// Stored values of one physical field, stringified for bucketing.
    pub fn stored_strings(&self, address: DocAddress, physical_name: &str) -> Result<Vec<String>> {
        let Some(field) = self.inventory.field(physical_name) else {
            return Ok(Vec::new());
        };
        let doc: TantivyDocument = self.searcher.doc(address)?;
        Ok(doc
            .get_all(field)
            .filter_map(|value| {
                value
                    .as_str()
                    .map(str::to_owned)
                    .or_else(|| value.as_i64().map(|v| v.to_string()))
                    .or_else(|| value.as_f64().map(|v| v.to_string()))
            })
            .collect())
    }

    fn sort_hits(&self, hits: &mut [(Score, DocAddress)], specs: &[SortSpec]) -> Result<()> {
        let mut keyed = Vec::with_capacity(hits.len());
        for (score, address) in hits.iter() {
            let doc: TantivyDocument = self.searcher.doc(*address)?;
            let keys: Vec<SortKey> = specs
                .iter()
                .map(|spec| self.sort_key(&doc, *score, &spec.by))
                .collect();
            keyed.push((keys, *score, *address));
        }
        keyed.sort_by(|a, b| {
            for (i, spec) in specs.iter().enumerate() {
                let mut ordering = a.0[i].cmp(&b.0[i]);
                if spec.descending {
                    ordering = ordering.reverse();
                }
                if ordering != Ordering::Equal {
                    return ordering;
                }
            }
            a.2.cmp(&b.2)
        });
        for (slot, (_, score, address)) in hits.iter_mut().zip(keyed) {
            *slot = (score, address);
        }
        Ok(())
    }

    fn sort_key(&self, doc: &TantivyDocument, score: Score, by: &SortBy) -> SortKey {
        let first = |name: &str| self.inventory.field(name).and_then(|f| doc.get_first(f));
        match by {
            SortBy::Score => SortKey::F64(Some(f64::from(score))),
            SortBy::Double(name) => SortKey::F64(first(name).and_then(|v| v.as_f64())),
            SortBy::Integer(name) | SortBy::DateTime(name) => {
                SortKey::I64(first(name).and_then(|v| v.as_i64()))
            }
            SortBy::Str(name) => {
                SortKey::Str(first(name).and_then(|v| v.as_str().map(str::to_owned)))
            }
        }
    }

    /// Convert stored fields back into a retrieved document. Date-times
    /// come back as RFC 3339 strings, multi-valued fields as arrays.
    pub fn to_search_document(&self, address: DocAddress) -> Result<SearchDocument> {
        let doc: TantivyDocument = self.searcher.doc(address)?;
        let mut result = SearchDocument::default();

        for (field, entry) in self.inventory.schema().fields() {
            let name = entry.name();
            if name == SOURCE_FIELD_NAME || !entry.is_stored() {
                continue;
            }
            let values: Vec<serde_json::Value> = doc
                .get_all(field)
                .filter_map(|value| self.to_json(name, entry.field_type(), value))
                .collect();
            if values.is_empty() {
                continue;
            }
            if name == KEY_FIELD_NAME {
                if let Some(serde_json::Value::String(id)) = values.first() {
                    result.id = id.clone();
                }
                continue;
            }
            let value = if values.len() == 1 {
                values.into_iter().next().unwrap_or(serde_json::Value::Null)
            } else {
                serde_json::Value::Array(values)
            };
            result.fields.insert(name.to_string(), value);
        }
        Ok(result)
    }

    fn to_json<'a>(
        &self,
        name: &str,
        field_type: &FieldType,
        value: impl Value<'a>,
    ) -> Option<serde_json::Value> {
        match field_type {
            FieldType::Str(_) => value.as_str().map(|s| serde_json::Value::String(s.to_owned())),
            FieldType::I64(_) => {
                let raw = value.as_i64()?;
                if self.inventory.has(&date_time_field_name(name)) {
                    let date = chrono::DateTime::from_timestamp_micros(raw)?;
                    Some(serde_json::Value::String(date.to_rfc3339()))
                } else {
                    Some(serde_json::Value::from(raw))
                }
            }
            FieldType::F64(_) => value.as_f64().map(serde_json::Value::from),
            _ => None,
        }
    }
}

/// AND the compiled filter onto the keyword query.
pub fn combine(query: Box<dyn Query>, filter: Option<&dyn Query>) -> Box<dyn Query> {
    match filter {
        None => query,
        Some(filter) => Box::new(BooleanQuery::new(vec![
            (Occur::Must, query),
            (Occur::Must, filter.box_clone()),
        ])),
    }
}

/// Sort key read from one hit's stored values. Missing values order last
/// in ascending direction.
#[derive(Debug, Clone, PartialEq)]
enum SortKey {
    I64(Option<i64>),
    F64(Option<f64>),
    Str(Option<String>),
}

impl SortKey {
    fn cmp(&self, other: &Self) -> Ordering {
        match (self, other) {
            (SortKey::I64(a), SortKey::I64(b)) => cmp_options(a.as_ref(), b.as_ref(), Ord::cmp),
            (SortKey::F64(a), SortKey::F64(b)) => {
                cmp_options(a.as_ref(), b.as_ref(), |x, y| x.total_cmp(y))
            }
            (SortKey::Str(a), SortKey::Str(b)) => cmp_options(a.as_ref(), b.as_ref(), Ord::cmp),
            _ => Ordering::Equal,
        }
    }
}

fn cmp_options<T>(a: Option<&T>, b: Option<&T>, cmp: impl Fn(&T, &T) -> Ordering) -> Ordering {
    match (a, b) {
        (Some(a), Some(b)) => cmp(a, b),
        (Some(_), None) => Ordering::Less,
        (None, Some(_)) => Ordering::Greater,
        (None, None) => Ordering::Equal,
    }
}

/// Collects every hit with its score; ranking and windowing happen after
/// the adapter-side sort.
struct AllHitsCollector;

impl Collector for AllHitsCollector {
    type Fruit = Vec<(Score, DocAddress)>;
    type Child = AllHitsSegmentCollector;

    fn for_segment(
        &self,
        segment_local_id: SegmentOrdinal,
        _segment: &SegmentReader,
    ) -> tantivy::Result<Self::Child> {
        Ok(AllHitsSegmentCollector { ordinal: segment_local_id, hits: Vec::new() })
    }

    fn requires_scoring(&self) -> bool {
        true
    }

    fn merge_fruits(&self, segment_fruits: Vec<Self::Fruit>) -> tantivy::Result<Self::Fruit> {
        Ok(segment_fruits.into_iter().flatten().collect())
    }
}

struct AllHitsSegmentCollector {
    ordinal: SegmentOrdinal,
    hits: Vec<(Score, DocAddress)>,
}

impl SegmentCollector for AllHitsSegmentCollector {
    type Fruit = Vec<(Score, DocAddress)>;

    fn collect(&mut self, doc: DocId, score: Score) {
        self.hits.push((score, DocAddress::new(self.ordinal, doc)));
    }

    fn harvest(self) -> Self::Fruit {
        self.hits
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_sort_values_order_last_ascending() {
        let present = SortKey::I64(Some(3));
        let absent = SortKey::I64(None);
        assert_eq!(present.cmp(&absent), Ordering::Less);
        assert_eq!(absent.cmp(&present), Ordering::Greater);
        assert_eq!(absent.cmp(&SortKey::I64(None)), Ordering::Equal);
    }

    #[test]
    fn float_keys_use_total_order() {
        let a = SortKey::F64(Some(1.5));
        let b = SortKey::F64(Some(2.5));
        assert_eq!(a.cmp(&b), Ordering::Less);
        assert_eq!(b.cmp(&a), Ordering::Greater);
    }

    #[test]
    fn string_keys_compare_lexically() {
        let a = SortKey::Str(Some("apple".into()));
        let b = SortKey::Str(Some("pear".into()));
        assert_eq!(a.cmp(&b), Ordering::Less);
    }
}
