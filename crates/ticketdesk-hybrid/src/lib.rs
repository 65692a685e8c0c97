//! ticketdesk-hybrid
//!
//! Score fusion over the lexical and semantic indexes. [`fusion`] holds the
//! pure ranking math, [`engine`] the adapter orchestration around it.

pub mod engine;
pub mod fusion;

pub use engine::{HybridSearchEngine, DEFAULT_CANDIDATE_MULTIPLIER};
pub use fusion::min_max_normalize;
