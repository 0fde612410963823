//! Citation ranking for vector-search results.
//!
//! Turns raw index matches into a deduplicated, precedence-ordered list of
//! sources plus the snippets and titles that go into the prompt:
//! - `types`: typed match metadata (the only place that touches raw JSON)
//! - `title`: display-title cleanup
//! - `dedup`: identity-key deduplication and tier/score ordering
//! - `snippet`: text extraction from match metadata
//! - `citations`: unique title list
//!
//! Everything here is pure and synchronous.

mod citations;
mod dedup;
mod snippet;
mod title;
mod types;

pub use citations::titles_only;
pub use dedup::{dedup_and_rank, precedence_tier, UNRANKED_TIER};
pub use snippet::extract_snippet;
pub use title::clean_title;
pub use types::{
    MatchMetadata, RankedSource, RawMatch, SourceKey, SNIPPET_KEYS, UNKNOWN_LEVEL, UNKNOWN_PAGE,
    UNKNOWN_TITLE,
};
