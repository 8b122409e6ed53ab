//! Embedding provider used for workspace memory search. Kept separate from
//! `crate::embedding::EmbeddingProvider` so the memory subsystem has no dependency on the
//! ingestion pipeline's provider wiring.

use async_trait::async_trait;
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};

use crate::error::WorkspaceError;

#[async_trait]
pub trait EmbeddingProvider: Send + Sync {
    async fn embed(&self, text: &str) -> Result<Vec<f32>, WorkspaceError>;
}

pub struct OpenAiEmbeddings {
    client: reqwest::Client,
    endpoint: String,
    api_key: SecretString,
    model: String,
}

impl OpenAiEmbeddings {
    pub fn new(endpoint: impl Into<String>, api_key: SecretString, model: impl Into<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            endpoint: endpoint.into(),
            api_key,
            model: model.into(),
        }
    }
}

#[derive(Serialize)]
struct RequestBody<'a> {
    model: &'a str,
    input: &'a str,
}

#[derive(Deserialize)]
struct Datum {
    embedding: Vec<f32>,
}

#[derive(Deserialize)]
struct ResponseBody {
    data: Vec<Datum>,
}

#[async_trait]
impl EmbeddingProvider for OpenAiEmbeddings {
    async fn embed(&self, text: &str) -> Result<Vec<f32>, WorkspaceError> {
        let response = self
            .client
            .post(&self.endpoint)
            .bearer_auth(self.api_key.expose_secret())
            .json(&RequestBody {
                model: &self.model,
                input: text,
            })
            .send()
            .await
            .map_err(|e| WorkspaceError::EmbeddingFailed {
                reason: e.to_string(),
            })?;

        let parsed: ResponseBody = response.json().await.map_err(|e| WorkspaceError::EmbeddingFailed {
            reason: e.to_string(),
        })?;

        parsed
            .data
            .into_iter()
            .next()
            .map(|d| d.embedding)
            .ok_or_else(|| WorkspaceError::EmbeddingFailed {
                reason: "empty embedding response".to_string(),
            })
    }
}
