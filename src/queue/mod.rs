//! Embedding update queue.
//!
//! Mutations in the system of record reach the index through this queue:
//!
//! ```text
//! on_profile_update ─┐
//! on_project_update ─┼─▶ EmbeddingQueue ──▶ DocumentIndexer ──▶ VectorStore
//! bulk_update_*     ─┘   (priority list,     (preprocess,
//!                         ≤ max_concurrent)    embed, upsert)
//! ```
//!
//! The index is eventually consistent: hooks return once the job is queued.

mod hooks;
mod indexer;
mod item;
mod worker;

pub use hooks::{bulk_priority, MutationHooks, DEFAULT_PRIORITY};
pub use indexer::DocumentIndexer;
pub use item::{PendingSummary, QueueItem, QueuePayload};
pub use worker::{EmbeddingQueue, JobHandler, QueueStats};
