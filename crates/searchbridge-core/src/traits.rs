use crate::document::IndexDocument;
use crate::error::Result;
use crate::request::SearchRequest;
use crate::response::{IndexingResult, SearchResponse};

/// One logical index per document type: index/remove report per-document
/// outcomes, delete truncates, search executes against the last committed
/// state. Operations are synchronous and blocking; async wrapping is a
/// caller concern.
pub trait SearchProvider: Send + Sync {
    fn index(&self, document_type: &str, documents: &[IndexDocument]) -> Result<IndexingResult>;

    fn remove(&self, document_type: &str, documents: &[IndexDocument]) -> Result<IndexingResult>;

    fn delete_index(&self, document_type: &str) -> Result<()>;

    fn search(&self, document_type: &str, request: &SearchRequest) -> Result<SearchResponse>;
}
