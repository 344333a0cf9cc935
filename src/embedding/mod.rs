//! Text-to-vector embedding.
//!
//! Provides the blob [`codec`], the [`Embedder`] trait the core consumes, and an
//! HTTP implementation for OpenAI-compatible `/embeddings` endpoints. The
//! embedder is created via [`create_embedder`] from configuration.

pub mod codec;
pub mod http;

use std::sync::Arc;

use async_trait::async_trait;

use crate::context::RequestContext;
use crate::error::Result;

pub use codec::{cosine, decode, encode, top_k};

/// Turns text into a vector.
///
/// Output is not assumed deterministic; retries may return a different vector.
/// Implementations must return [`crate::Error::Cancelled`] promptly once `ctx`
/// is cancelled and report remote failures as [`crate::Error::Integration`].
#[async_trait]
pub trait Embedder: Send + Sync {
    async fn generate(&self, ctx: &RequestContext, text: &str) -> Result<Vec<f32>>;

    /// Identifier of the model behind the vectors, recorded in `schema_meta`.
    fn model(&self) -> &str;
}

/// Create an embedder from config. `"none"` yields `Ok(None)`.
pub fn create_embedder(
    config: &crate::config::EmbeddingConfig,
) -> anyhow::Result<Option<Arc<dyn Embedder>>> {
    match config.provider.as_str() {
        "none" => Ok(None),
        "http" => {
            let embedder = http::HttpEmbedder::new(config)?;
            Ok(Some(Arc::new(embedder)))
        }
        other => anyhow::bail!("unknown embedding provider: {other}. Supported: http, none"),
    }
}
