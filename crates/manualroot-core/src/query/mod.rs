//! Retrieval query construction
//!
//! Provides:
//! - History-aware enrichment with identifier preservation
//! - Brand-specific thematic expansion

mod enricher;
mod expansion;

pub use enricher::{
    contains_identifier, enrich_query, heuristic_query, identifier_tokens, preserve_identifiers,
    valid_rewrite, EnrichedQuery, EnrichmentSource,
};
pub use expansion::{expand_query, ExpandedQuery};
