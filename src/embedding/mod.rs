//! Embedding & chunking provider (C1): given text, produce semantic chunks and dense vectors.

pub mod chunking;

pub use chunking::{chunk_document, chunk_document_code_aware, ChunkConfig};

use async_trait::async_trait;

use crate::error::EmbeddingError;

/// A dense-vector embedding provider, implemented once per vendor.
#[async_trait]
pub trait EmbeddingProvider: Send + Sync {
    fn dimensions(&self) -> usize;

    async fn embed(&self, text: &str) -> Result<Vec<f32>, EmbeddingError>;

    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, EmbeddingError> {
        let mut out = Vec::with_capacity(texts.len());
        for text in texts {
            out.push(self.embed(text).await?);
        }
        Ok(out)
    }
}

/// An HTTP-backed embedding provider speaking the OpenAI-style `embeddings` endpoint shape.
pub struct HttpEmbeddingProvider {
    client: reqwest::Client,
    endpoint: String,
    api_key: secrecy::SecretString,
    model: String,
    dimensions: usize,
}

impl HttpEmbeddingProvider {
    pub fn new(
        endpoint: impl Into<String>,
        api_key: secrecy::SecretString,
        model: impl Into<String>,
        dimensions: usize,
    ) -> Self {
        Self {
            client: reqwest::Client::new(),
            endpoint: endpoint.into(),
            api_key,
            model: model.into(),
            dimensions,
        }
    }
}

#[derive(serde::Serialize)]
struct EmbeddingRequestBody<'a> {
    model: &'a str,
    input: &'a [String],
}

#[derive(serde::Deserialize)]
struct EmbeddingResponseBody {
    data: Vec<EmbeddingDatum>,
}

#[derive(serde::Deserialize)]
struct EmbeddingDatum {
    embedding: Vec<f32>,
}

#[async_trait]
impl EmbeddingProvider for HttpEmbeddingProvider {
    fn dimensions(&self) -> usize {
        self.dimensions
    }

    async fn embed(&self, text: &str) -> Result<Vec<f32>, EmbeddingError> {
        let vectors = self.embed_batch(std::slice::from_ref(&text.to_string())).await?;
        vectors
            .into_iter()
            .next()
            .ok_or_else(|| EmbeddingError::Request("empty embedding response".to_string()))
    }

    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, EmbeddingError> {
        use secrecy::ExposeSecret;

        let body = EmbeddingRequestBody {
            model: &self.model,
            input: texts,
        };

        let response = self
            .client
            .post(&self.endpoint)
            .bearer_auth(self.api_key.expose_secret())
            .json(&body)
            .send()
            .await
            .map_err(|e| EmbeddingError::Request(e.to_string()))?;

        if !response.status().is_success() {
            return Err(EmbeddingError::Request(format!(
                "embedding provider returned {}",
                response.status()
            )));
        }

        let parsed: EmbeddingResponseBody = response
            .json()
            .await
            .map_err(|e| EmbeddingError::Request(e.to_string()))?;

        for datum in &parsed.data {
            if datum.embedding.len() != self.dimensions {
                return Err(EmbeddingError::DimensionMismatch {
                    expected: self.dimensions,
                    actual: datum.embedding.len(),
                });
            }
        }

        Ok(parsed.data.into_iter().map(|d| d.embedding).collect())
    }
}
