//! OpenAI-compatible HTTP embedder.
//!
//! Posts `{"model", "input"}` to `<url>/embeddings` and reads
//! `data[0].embedding`. Works against OpenAI, Ollama's `/v1` shim, and most
//! self-hosted inference servers.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use super::Embedder;
use crate::config::EmbeddingConfig;
use crate::context::RequestContext;
use crate::error::{Error, Result};

pub struct HttpEmbedder {
    client: reqwest::Client,
    endpoint: String,
    model: String,
    api_key: Option<String>,
}

#[derive(Serialize)]
struct EmbeddingRequest<'a> {
    model: &'a str,
    input: &'a str,
}

#[derive(Deserialize)]
struct EmbeddingResponse {
    data: Vec<EmbeddingData>,
}

#[derive(Deserialize)]
struct EmbeddingData {
    embedding: Vec<f32>,
}

impl HttpEmbedder {
    pub fn new(config: &EmbeddingConfig) -> anyhow::Result<Self> {
        anyhow::ensure!(!config.url.is_empty(), "embedding.url must be set for the http provider");
        anyhow::ensure!(!config.model.is_empty(), "embedding.model must be set for the http provider");

        let api_key = config
            .api_key_env
            .as_deref()
            .and_then(|var| std::env::var(var).ok())
            .filter(|key| !key.is_empty());

        Ok(Self {
            client: reqwest::Client::new(),
            endpoint: embeddings_endpoint(&config.url),
            model: config.model.clone(),
            api_key,
        })
    }

    async fn request(&self, text: &str) -> Result<Vec<f32>> {
        let mut request = self.client.post(&self.endpoint).json(&EmbeddingRequest {
            model: &self.model,
            input: text,
        });
        if let Some(key) = &self.api_key {
            request = request.bearer_auth(key);
        }

        let response = request
            .send()
            .await
            .map_err(|e| Error::Integration(format!("embedding request failed: {e}")))?;
        let status = response.status();
        if !status.is_success() {
            return Err(Error::Integration(format!(
                "embedding endpoint returned HTTP {status}"
            )));
        }

        let body: EmbeddingResponse = response
            .json()
            .await
            .map_err(|e| Error::Integration(format!("malformed embedding response: {e}")))?;
        body.data
            .into_iter()
            .next()
            .map(|d| d.embedding)
            .filter(|v| !v.is_empty())
            .ok_or_else(|| Error::Integration("embedding response had no vectors".into()))
    }
}

#[async_trait]
impl Embedder for HttpEmbedder {
    async fn generate(&self, ctx: &RequestContext, text: &str) -> Result<Vec<f32>> {
        ctx.check()?;
        tokio::select! {
            _ = ctx.token().cancelled() => Err(Error::Cancelled),
            result = self.request(text) => result,
        }
    }

    fn model(&self) -> &str {
        &self.model
    }
}

fn embeddings_endpoint(base: &str) -> String {
    let base = base.trim_end_matches('/');
    if base.ends_with("/embeddings") {
        base.to_string()
    } else {
        format!("{base}/embeddings")
    }
}
