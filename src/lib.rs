//! Memory and wake-context core for a home assistant agent.
//!
//! Hearth persists what the agent learns and decides what to show it each time
//! it wakes:
//!
//! | Piece | Purpose |
//! |-------|---------|
//! | **Facts** | Categorized key/value memory with subject tags, soft delete, BM25 and vector search |
//! | **Anticipations** | "Wake me when X" rules with time/entity/zone/event triggers and cooldowns |
//! | **State window** | The last few dozen entity state transitions, in memory |
//! | **Composer** | Joins subject facts, semantic facts, recent changes, and matched anticipations into one block |
//!
//! # Architecture
//!
//! - **Storage**: one SQLite file; FTS5 for keyword search when available, `LIKE` otherwise
//! - **Embeddings**: any OpenAI-compatible `/embeddings` endpoint; vectors are stored as
//!   little-endian `f32` blobs and searched by linear cosine scan
//! - **Cancellation**: every call takes a [`RequestContext`]; cancelling it fails pending
//!   work fast and interrupts running SQLite statements
//!
//! # Modules
//!
//! - [`config`] - Configuration loading from TOML files and environment variables
//! - [`db`] - SQLite handle, schema, and additive migrations
//! - [`embedding`] - Vector codec, cosine/top-k, and the [`embedding::Embedder`] trait
//! - [`memory`] - Fact store plus the remember/recall/forget entry points
//! - [`anticipation`] - Anticipation store and wake matching
//! - [`state_window`] - Ring buffer of recent state changes
//! - [`compose`] - Context composer and its providers

pub mod anticipation;
pub mod compose;
pub mod config;
pub mod context;
pub mod db;
pub mod embedding;
pub mod error;
pub mod memory;
pub mod state_window;
pub mod time;

pub use context::RequestContext;
pub use error::{Error, Result};
