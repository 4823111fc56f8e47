//! Index lifecycle: schema derivation, the writer handle map, and the
//! merged-schema rebuild that lets later batches introduce new fields.
//!
//! Tantivy fixes a schema at index creation. To keep the write model
//! open-ended, every document's full physical form is also persisted in a
//! reserved stored-only `__source` field; when a batch needs fields the
//! on-disk schema lacks, the handle commits, drains `__source`, recreates
//! the index under the merged schema and re-adds everything.

use std::collections::{BTreeMap, HashMap};
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use anyhow::{anyhow, bail, Context, Result};
use serde::{Deserialize, Serialize};
use tantivy::collector::{Count, DocSetCollector};
use tantivy::query::{AllQuery, TermQuery};
use tantivy::schema::{
    IndexRecordOption, NumericOptions, Schema, TextFieldIndexing, TextOptions, Value, STORED,
};
use tantivy::{Index, IndexWriter, TantivyDocument, Term};
use tracing::{debug, info};

use crate::field_name::{KEY_FIELD_NAME, SOURCE_FIELD_NAME};
use crate::projector::{PhysicalField, PhysicalValue};

const WRITER_MEMORY_BYTES: usize = 50_000_000;

/// Engine-level shape of one physical field name.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldKind {
    Str { analyzed: bool },
    I64,
    F64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FieldSpec {
    pub kind: FieldKind,
    pub stored: bool,
    pub indexed: bool,
}

pub type FieldSpecs = BTreeMap<String, FieldSpec>;

/// Physical form of one document, as persisted under `__source`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SourceDoc {
    pub id: String,
    pub fields: Vec<PhysicalField>,
}

/// Derive the field specs one projected document requires. Fails when the
/// document uses one name with conflicting value kinds.
pub fn specs_for_fields(fields: &[PhysicalField]) -> Result<FieldSpecs> {
    let mut specs = FieldSpecs::new();
    for field in fields {
        let kind = match &field.value {
            PhysicalValue::Str(_) => FieldKind::Str { analyzed: field.analyzed },
            PhysicalValue::I64(_) => FieldKind::I64,
            PhysicalValue::F64(_) => FieldKind::F64,
        };
        let spec = FieldSpec { kind, stored: field.stored, indexed: field.indexed };
        merge_spec(&mut specs, &field.name, spec)?;
    }
    Ok(specs)
}

/// Union `from` into `into`. Returns whether `into` changed. A kind
/// conflict on one name is an error and leaves `into` only partially
/// updated, so callers merge into a scratch copy.
pub fn merge_specs(into: &mut FieldSpecs, from: &FieldSpecs) -> Result<bool> {
    let mut changed = false;
    for (name, spec) in from {
        changed |= merge_spec(into, name, *spec)?;
    }
    Ok(changed)
}

fn merge_spec(specs: &mut FieldSpecs, name: &str, spec: FieldSpec) -> Result<bool> {
    match specs.get_mut(name) {
        None => {
            specs.insert(name.to_string(), spec);
            Ok(true)
        }
        Some(existing) => {
            if existing.kind != spec.kind {
                bail!(
                    "field '{name}' is already indexed as {:?}, cannot re-index as {:?}",
                    existing.kind,
                    spec.kind
                );
            }
            let merged = FieldSpec {
                kind: existing.kind,
                stored: existing.stored || spec.stored,
                indexed: existing.indexed || spec.indexed,
            };
            let changed = merged != *existing;
            *existing = merged;
            Ok(changed)
        }
    }
}

fn build_schema(specs: &FieldSpecs) -> Schema {
    let mut builder = Schema::builder();
    for (name, spec) in specs {
        match spec.kind {
            FieldKind::Str { analyzed } => {
                let mut options = TextOptions::default();
                if spec.indexed {
                    let indexing = if analyzed {
                        TextFieldIndexing::default()
                            .set_tokenizer("default")
                            .set_index_option(IndexRecordOption::WithFreqsAndPositions)
                    } else {
                        TextFieldIndexing::default()
                            .set_tokenizer("raw")
                            .set_index_option(IndexRecordOption::Basic)
                    };
                    options = options.set_indexing_options(indexing);
                }
                if spec.stored {
                    options = options.set_stored();
                }
                builder.add_text_field(name, options);
            }
            FieldKind::I64 => {
                let mut options = NumericOptions::default();
                if spec.indexed {
                    options = options.set_indexed();
                }
                if spec.stored {
                    options = options.set_stored();
                }
                builder.add_i64_field(name, options);
            }
            FieldKind::F64 => {
                // Fast columns back the spatial scans.
                let mut options = NumericOptions::default().set_fast();
                if spec.indexed {
                    options = options.set_indexed();
                }
                if spec.stored {
                    options = options.set_stored();
                }
                builder.add_f64_field(name, options);
            }
        }
    }
    builder.add_text_field(SOURCE_FIELD_NAME, STORED);
    builder.build()
}

fn specs_from_schema(schema: &Schema) -> FieldSpecs {
    let mut specs = FieldSpecs::new();
    for (_, entry) in schema.fields() {
        if entry.name() == SOURCE_FIELD_NAME {
            continue;
        }
        let spec = match entry.field_type() {
            tantivy::schema::FieldType::Str(options) => FieldSpec {
                kind: FieldKind::Str {
                    analyzed: options
                        .get_indexing_options()
                        .map_or(false, |i| i.tokenizer() != "raw"),
                },
                stored: options.is_stored(),
                indexed: options.get_indexing_options().is_some(),
            },
            tantivy::schema::FieldType::I64(options) => FieldSpec {
                kind: FieldKind::I64,
                stored: options.is_stored(),
                indexed: options.is_indexed(),
            },
            tantivy::schema::FieldType::F64(options) => FieldSpec {
                kind: FieldKind::F64,
                stored: options.is_stored(),
                indexed: options.is_indexed(),
            },
            _ => continue,
        };
        specs.insert(entry.name().to_string(), spec);
    }
    specs
}

/// An open index with its single writer. Held in the registry map; all
/// mutation goes through here.
pub struct IndexHandle {
    name: String,
    path: PathBuf,
    index: Index,
    writer: Option<IndexWriter>,
    specs: FieldSpecs,
}

impl IndexHandle {
    /// Open the on-disk index, or create an empty one when absent.
    pub fn open(name: &str, path: &Path) -> Result<Self> {
        let index = if path.join("meta.json").exists() {
            debug!(index = name, path = %path.display(), "opening index");
            Index::open_in_dir(path)
                .with_context(|| format!("open index '{name}' at {}", path.display()))?
        } else {
            info!(index = name, path = %path.display(), "creating index");
            std::fs::create_dir_all(path)
                .with_context(|| format!("create index directory {}", path.display()))?;
            Index::create_in_dir(path, build_schema(&FieldSpecs::new()))
                .with_context(|| format!("create index '{name}'"))?
        };
        let specs = specs_from_schema(&index.schema());
        // One indexing thread keeps document order stable, which the
        // adapter-side sort uses as its final tie-break.
        let writer = index.writer_with_num_threads(1, WRITER_MEMORY_BYTES)?;
        Ok(Self {
            name: name.to_string(),
            path: path.to_path_buf(),
            index,
            writer: Some(writer),
            specs,
        })
    }

    pub fn index(&self) -> &Index {
        &self.index
    }

    pub fn specs(&self) -> &FieldSpecs {
        &self.specs
    }

    fn writer_mut(&mut self) -> Result<&mut IndexWriter> {
        self.writer
            .as_mut()
            .ok_or_else(|| anyhow!("writer for index '{}' already closed", self.name))
    }

    /// Make sure the schema covers `specs`, rebuilding the index under the
    /// merged schema when it does not.
    pub fn ensure_fields(&mut self, specs: &FieldSpecs) -> Result<()> {
        let mut merged = self.specs.clone();
        if merge_specs(&mut merged, specs)? {
            self.rebuild(merged)?;
        }
        Ok(())
    }

    fn rebuild(&mut self, specs: FieldSpecs) -> Result<()> {
        info!(
            index = %self.name,
            fields = specs.len(),
            "rebuilding index under merged schema"
        );
        self.writer_mut()?.commit()?;
        let sources = self.read_sources()?;
        if let Some(writer) = self.writer.take() {
            writer.wait_merging_threads()?;
        }

        std::fs::remove_dir_all(&self.path)
            .with_context(|| format!("clear index directory {}", self.path.display()))?;
        std::fs::create_dir_all(&self.path)?;
        let index = Index::create_in_dir(&self.path, build_schema(&specs))?;
        let mut writer: IndexWriter = index.writer_with_num_threads(1, WRITER_MEMORY_BYTES)?;
        let schema = index.schema();
        for source in &sources {
            writer.add_document(physical_to_doc(&schema, source)?)?;
        }
        writer.commit()?;
        debug!(index = %self.name, documents = sources.len(), "re-added documents");

        self.index = index;
        self.writer = Some(writer);
        self.specs = specs;
        Ok(())
    }

    /// Physical forms of every live document in the committed state.
    fn read_sources(&self) -> Result<Vec<SourceDoc>> {
        let source_field = self.index.schema().get_field(SOURCE_FIELD_NAME)?;
        let searcher = self.index.reader()?.searcher();
        let mut addresses: Vec<_> = searcher
            .search(&AllQuery, &DocSetCollector)?
            .into_iter()
            .collect();
        addresses.sort_unstable();
        let mut sources = Vec::with_capacity(addresses.len());
        for address in addresses {
            let doc: TantivyDocument = searcher.doc(address)?;
            let raw = doc
                .get_first(source_field)
                .and_then(|v| v.as_str())
                .ok_or_else(|| anyhow!("document without a source form in '{}'", self.name))?;
            sources.push(serde_json::from_str(raw)?);
        }
        Ok(sources)
    }

    /// Replace any existing document with the same id.
    pub fn upsert(&mut self, source: &SourceDoc) -> Result<()> {
        let schema = self.index.schema();
        let key_field = schema.get_field(KEY_FIELD_NAME)?;
        let doc = physical_to_doc(&schema, source)?;
        let writer = self.writer_mut()?;
        writer.delete_term(Term::from_field_text(key_field, &source.id));
        writer.add_document(doc)?;
        Ok(())
    }

    /// Queue a delete for `id`. Returns how many documents matched in the
    /// committed state, which is what the caller reports on.
    pub fn delete_by_id(&mut self, id: &str) -> Result<usize> {
        let key_field = self.index.schema().get_field(KEY_FIELD_NAME)?;
        let term = Term::from_field_text(key_field, id);
        let searcher = self.index.reader()?.searcher();
        let matched = searcher.search(
            &TermQuery::new(term.clone(), IndexRecordOption::Basic),
            &Count,
        )?;
        self.writer_mut()?.delete_term(term);
        Ok(matched)
    }

    pub fn commit(&mut self) -> Result<()> {
        self.writer_mut()?.commit()?;
        Ok(())
    }

    /// Commit and shut the writer down. The handle is unusable afterwards.
    pub fn close(mut self) -> Result<()> {
        debug!(index = %self.name, "closing writer");
        if let Some(mut writer) = self.writer.take() {
            writer.commit()?;
            writer.wait_merging_threads()?;
        }
        Ok(())
    }
}

fn physical_to_doc(schema: &Schema, source: &SourceDoc) -> Result<TantivyDocument> {
    let mut doc = TantivyDocument::default();
    for field in &source.fields {
        // Field names absent from the schema can only appear while a
        // rebuild is in flight; skipping keeps re-adds total.
        let Ok(handle) = schema.get_field(&field.name) else {
            continue;
        };
        match &field.value {
            PhysicalValue::Str(v) => doc.add_text(handle, v),
            PhysicalValue::I64(v) => doc.add_i64(handle, *v),
            PhysicalValue::F64(v) => doc.add_f64(handle, *v),
        }
    }
    let source_field = schema.get_field(SOURCE_FIELD_NAME)?;
    doc.add_text(source_field, serde_json::to_string(source)?);
    Ok(doc)
}

/// Keeps at most one open writer per logical index, all under one mutex.
/// Batch writes hold the lock end to end, so writes are globally
/// serialized across indexes.
pub struct WriterRegistry {
    root: PathBuf,
    writers: Mutex<HashMap<String, IndexHandle>>,
}

impl WriterRegistry {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into(), writers: Mutex::new(HashMap::new()) }
    }

    pub fn index_path(&self, name: &str) -> PathBuf {
        self.root.join(name)
    }

    fn lock(&self) -> Result<std::sync::MutexGuard<'_, HashMap<String, IndexHandle>>> {
        self.writers
            .lock()
            .map_err(|_| anyhow!("writer registry mutex poisoned"))
    }

    /// Run `f` against the named index's handle, opening it first when
    /// needed. The registry lock is held for the whole call.
    pub fn with_writer<T>(
        &self,
        name: &str,
        f: impl FnOnce(&mut IndexHandle) -> Result<T>,
    ) -> Result<T> {
        let mut writers = self.lock()?;
        if !writers.contains_key(name) {
            let handle = IndexHandle::open(name, &self.index_path(name))?;
            writers.insert(name.to_string(), handle);
        }
        let handle = writers
            .get_mut(name)
            .ok_or_else(|| anyhow!("writer for '{name}' vanished under lock"))?;
        f(handle)
    }

    /// Commit and evict the named handle. No-op when it is not open.
    pub fn release(&self, name: &str) -> Result<()> {
        let mut writers = self.lock()?;
        if let Some(handle) = writers.remove(name) {
            handle.close()?;
        }
        Ok(())
    }

    /// Truncate the index and leave an empty one behind.
    pub fn recreate(&self, name: &str) -> Result<()> {
        let mut writers = self.lock()?;
        if let Some(handle) = writers.remove(name) {
            handle.close()?;
        }
        let path = self.index_path(name);
        if path.exists() {
            std::fs::remove_dir_all(&path)
                .with_context(|| format!("remove index directory {}", path.display()))?;
        }
        info!(index = name, "recreating empty index");
        IndexHandle::open(name, &path)?.close()?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn raw(name: &str, value: &str) -> PhysicalField {
        PhysicalField {
            name: name.to_string(),
            value: PhysicalValue::Str(value.to_string()),
            stored: true,
            indexed: true,
            analyzed: false,
        }
    }

    fn source(id: &str, fields: Vec<PhysicalField>) -> SourceDoc {
        let mut all = vec![raw(KEY_FIELD_NAME, id)];
        all.extend(fields);
        SourceDoc { id: id.to_string(), fields: all }
    }

    #[test]
    fn conflicting_kinds_fail_spec_derivation() {
        let fields = vec![
            raw("size", "2"),
            PhysicalField {
                name: "size".to_string(),
                value: PhysicalValue::I64(2),
                stored: true,
                indexed: true,
                analyzed: false,
            },
        ];
        assert!(specs_for_fields(&fields).is_err());
    }

    #[test]
    fn merge_reports_changes_only_for_new_information() {
        let base = specs_for_fields(&[raw("color", "Red")]).expect("specs");
        let mut target = base.clone();
        assert!(!merge_specs(&mut target, &base).expect("merge"));
        let wider = specs_for_fields(&[raw("size", "2")]).expect("specs");
        assert!(merge_specs(&mut target, &wider).expect("merge"));
    }

    #[test]
    fn new_fields_trigger_a_rebuild_that_keeps_documents() {
        let dir = tempfile::tempdir().expect("tempdir");
        let mut handle = IndexHandle::open("test-product", dir.path()).expect("open");

        let first = source("Item-1", vec![raw("color", "Red")]);
        handle
            .ensure_fields(&specs_for_fields(&first.fields).expect("specs"))
            .expect("ensure");
        handle.upsert(&first).expect("upsert");
        handle.commit().expect("commit");

        let second = source("Item-2", vec![raw("color", "Blue"), raw("brand", "Acme")]);
        handle
            .ensure_fields(&specs_for_fields(&second.fields).expect("specs"))
            .expect("ensure");
        handle.upsert(&second).expect("upsert");
        handle.commit().expect("commit");

        assert!(handle.index().schema().get_field("brand").is_ok());
        let searcher = handle.index().reader().expect("reader").searcher();
        assert_eq!(searcher.num_docs(), 2);
    }

    #[test]
    fn upsert_replaces_by_id() {
        let dir = tempfile::tempdir().expect("tempdir");
        let mut handle = IndexHandle::open("test-product", dir.path()).expect("open");
        let doc = source("Item-1", vec![raw("color", "Red")]);
        handle
            .ensure_fields(&specs_for_fields(&doc.fields).expect("specs"))
            .expect("ensure");
        handle.upsert(&doc).expect("upsert");
        handle.upsert(&doc).expect("upsert again");
        handle.commit().expect("commit");

        let searcher = handle.index().reader().expect("reader").searcher();
        assert_eq!(searcher.num_docs(), 1);
    }

    #[test]
    fn delete_counts_committed_matches() {
        let dir = tempfile::tempdir().expect("tempdir");
        let mut handle = IndexHandle::open("test-product", dir.path()).expect("open");
        let doc = source("Item-1", vec![raw("color", "Red")]);
        handle
            .ensure_fields(&specs_for_fields(&doc.fields).expect("specs"))
            .expect("ensure");
        handle.upsert(&doc).expect("upsert");
        handle.commit().expect("commit");

        assert_eq!(handle.delete_by_id("Item-1").expect("delete"), 1);
        assert_eq!(handle.delete_by_id("Item-9").expect("delete"), 0);
    }

    #[test]
    fn recreate_leaves_an_empty_index() {
        let dir = tempfile::tempdir().expect("tempdir");
        let registry = WriterRegistry::new(dir.path());
        registry
            .with_writer("test-product", |handle| {
                let doc = source("Item-1", vec![raw("color", "Red")]);
                handle.ensure_fields(&specs_for_fields(&doc.fields)?)?;
                handle.upsert(&doc)?;
                handle.commit()
            })
            .expect("write");
        registry.release("test-product").expect("release");

        registry.recreate("test-product").expect("recreate");
        let index = Index::open_in_dir(registry.index_path("test-product")).expect("open");
        let searcher = index.reader().expect("reader").searcher();
        assert_eq!(searcher.num_docs(), 0);
    }
}
