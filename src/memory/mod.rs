//! Fact memory: the categorized key/value store with hybrid retrieval.
//!
//! [`FactStore`] owns the `facts` table. Its operations are split by concern:
//! writes and point reads in [`store`], keyword and vector search in [`search`],
//! soft deletion in [`forget`], counts in [`stats`]. The async entry points used
//! by the agent's tools (remember, recall, forget, embedding backfill) live in
//! [`remember`].

pub mod forget;
pub mod remember;
pub mod search;
pub mod stats;
pub mod store;
pub mod types;

pub use remember::{backfill_embeddings, generate_missing_embeddings, recall, remember, BackfillReport, RecallHit};
pub use store::FactStore;
pub use types::{Category, Fact, FactStats, NewFact, ScoredFact};
