//! searchbridge-tantivy
//!
//! Serves the typed document/query model of `searchbridge-core` from a
//! Tantivy index that only understands untyped terms. The interesting part
//! is the translation layer: each typed field is projected onto one or more
//! physical index fields (typed-suffix mirrors make field types recoverable
//! at query time by probing the live field inventory), and the recursive
//! filter tree is compiled into Tantivy's boolean query primitives.
//!
//! See `provider` for the entry point and `tests/provider_flow.rs` for
//! end-to-end usage.

pub mod facets;
pub mod field_name;
pub mod filter;
pub mod projector;
pub mod provider;
pub mod request;
pub mod search;
pub mod spatial;
pub mod writer;

pub use provider::TantivySearchProvider;
