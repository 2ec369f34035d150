//! Indexing pipeline
//!
//! Contextual chunking of extracted page text and embedding into the
//! vector index.

mod chunker;
mod indexer;

pub use chunker::{build_contextual_chunks, table_row_chunks, MAX_PAGE_CHUNKS};
pub use indexer::{IndexProgress, IndexReport, Indexer};
