//! The provider: typed documents in, typed responses out, one Tantivy
//! index per `{scope}-{document_type}`.

use anyhow::Result;
use tracing::{debug, info, instrument};

use searchbridge_core::config::SearchOptions;
use searchbridge_core::document::IndexDocument;
use searchbridge_core::error::{Error, Result as CoreResult};
use searchbridge_core::request::SearchRequest;
use searchbridge_core::response::{IndexingResult, IndexingResultItem, SearchResponse};
use searchbridge_core::traits::SearchProvider;

use crate::facets;
use crate::projector::project;
use crate::request::build;
use crate::search::Snapshot;
use crate::writer::{merge_specs, specs_for_fields, SourceDoc, WriterRegistry};

pub struct TantivySearchProvider {
    options: SearchOptions,
    registry: WriterRegistry,
}

impl TantivySearchProvider {
    pub fn new(options: SearchOptions) -> Self {
        let registry = WriterRegistry::new(options.root_dir.clone());
        Self { options, registry }
    }

    fn index_name(&self, document_type: &str) -> String {
        format!(
            "{}-{}",
            self.options.scope_for(document_type).to_lowercase(),
            document_type.to_lowercase()
        )
    }

    fn index_batch(&self, name: &str, documents: &[IndexDocument]) -> Result<IndexingResult> {
        let items = self.registry.with_writer(name, |handle| {
            // Projection and schema merging happen up front so one rebuild
            // covers the whole batch. Each document merges into a scratch
            // copy first: a kind conflict must not leak the document's
            // other fields into the schema.
            let mut batch_specs = handle.specs().clone();
            let mut prepared: Vec<std::result::Result<SourceDoc, (String, String)>> =
                Vec::with_capacity(documents.len());
            for document in documents {
                if document.id.is_empty() {
                    prepared.push(Err((
                        document.id.clone(),
                        "document id is empty".to_string(),
                    )));
                    continue;
                }
                let outcome = project(document).and_then(|fields| {
                    let specs = specs_for_fields(&fields)?;
                    let mut merged = batch_specs.clone();
                    merge_specs(&mut merged, &specs)?;
                    batch_specs = merged;
                    Ok(SourceDoc { id: document.id.clone(), fields })
                });
                prepared.push(outcome.map_err(|e| (document.id.clone(), e.to_string())));
            }
            handle.ensure_fields(&batch_specs)?;

            let mut items = Vec::with_capacity(prepared.len());
            for source in prepared {
                items.push(match source {
                    Ok(source) => match handle.upsert(&source) {
                        Ok(()) => IndexingResultItem::succeeded(source.id),
                        Err(e) => IndexingResultItem::failed(source.id, e.to_string()),
                    },
                    Err((id, message)) => IndexingResultItem::failed(id, message),
                });
            }
            Ok(items)
        })?;
        self.registry.release(name)?;
        Ok(IndexingResult { items })
    }

    fn remove_batch(&self, name: &str, documents: &[IndexDocument]) -> Result<IndexingResult> {
        let items = self.registry.with_writer(name, |handle| {
            let mut items = Vec::with_capacity(documents.len());
            for document in documents {
                if document.id.is_empty() {
                    items.push(IndexingResultItem::failed(
                        &document.id,
                        "document id is empty",
                    ));
                    continue;
                }
                items.push(match handle.delete_by_id(&document.id) {
                    Ok(1) => IndexingResultItem::succeeded(&document.id),
                    Ok(matched) => IndexingResultItem::failed(
                        &document.id,
                        format!("{matched} documents matched instead of 1"),
                    ),
                    Err(e) => IndexingResultItem::failed(&document.id, e.to_string()),
                });
            }
            Ok(items)
        })?;
        self.registry.release(name)?;
        Ok(IndexingResult { items })
    }

    fn run_search(&self, name: &str, request: &SearchRequest) -> Result<SearchResponse> {
        let Some(snapshot) = Snapshot::open(&self.registry.index_path(name))? else {
            debug!(index = name, "search against a missing index");
            return Ok(SearchResponse::default());
        };

        let engine_request = build(request, snapshot.inventory());
        let (window, total_count) = snapshot.execute(&engine_request)?;
        let documents = window
            .into_iter()
            .skip(request.skip)
            .take(request.take)
            .collect();
        let aggregations = facets::reduce(&snapshot, request)?;
        Ok(SearchResponse { documents, total_count, aggregations })
    }
}

impl SearchProvider for TantivySearchProvider {
    #[instrument(skip(self, documents), fields(count = documents.len()))]
    fn index(&self, document_type: &str, documents: &[IndexDocument]) -> CoreResult<IndexingResult> {
        let name = self.index_name(document_type);
        let result = self.index_batch(&name, documents).map_err(Error::operation)?;
        info!(
            index = %name,
            succeeded = result.items.iter().filter(|i| i.succeeded).count(),
            failed = result.items.iter().filter(|i| !i.succeeded).count(),
            "indexed batch"
        );
        Ok(result)
    }

    #[instrument(skip(self, documents), fields(count = documents.len()))]
    fn remove(&self, document_type: &str, documents: &[IndexDocument]) -> CoreResult<IndexingResult> {
        let name = self.index_name(document_type);
        self.remove_batch(&name, documents).map_err(Error::operation)
    }

    #[instrument(skip(self))]
    fn delete_index(&self, document_type: &str) -> CoreResult<()> {
        let name = self.index_name(document_type);
        info!(index = %name, "deleting index");
        self.registry.recreate(&name).map_err(Error::operation)
    }

    #[instrument(skip(self, request))]
    fn search(&self, document_type: &str, request: &SearchRequest) -> CoreResult<SearchResponse> {
        let name = self.index_name(document_type);
        self.run_search(&name, request).map_err(Error::search)
    }
}
