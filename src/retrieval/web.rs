//! Web search providers (Tavily, Linkup, SearxNG, Baidu, ...), mapped onto the same citable
//! result shape as indexed-source hits.
//!
//! Ordering from some providers (Baidu in particular) is not stable for identical queries; this
//! is treated as an open question resolved in favor of set-equivalence (see DESIGN.md).

use async_trait::async_trait;
use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;

use crate::error::RetrievalError;

#[derive(Debug, Clone)]
pub struct WebResult {
    pub title: String,
    pub url: String,
    pub snippet: String,
}

#[async_trait]
pub trait WebSearchProvider: Send + Sync {
    fn name(&self) -> &'static str;

    async fn search(&self, query: &str, top_k: usize) -> Result<Vec<WebResult>, RetrievalError>;
}

pub struct TavilyProvider {
    client: reqwest::Client,
    api_key: SecretString,
}

impl TavilyProvider {
    pub fn new(api_key: SecretString) -> Self {
        Self {
            client: reqwest::Client::new(),
            api_key,
        }
    }
}

#[derive(Deserialize)]
struct TavilyResponseItem {
    title: String,
    url: String,
    content: String,
}

#[derive(Deserialize)]
struct TavilyResponse {
    results: Vec<TavilyResponseItem>,
}

#[async_trait]
impl WebSearchProvider for TavilyProvider {
    fn name(&self) -> &'static str {
        "tavily"
    }

    async fn search(&self, query: &str, top_k: usize) -> Result<Vec<WebResult>, RetrievalError> {
        let response = self
            .client
            .post("https://api.tavily.com/search")
            .json(&serde_json::json!({
                "api_key": self.api_key.expose_secret(),
                "query": query,
                "max_results": top_k,
            }))
            .send()
            .await
            .map_err(|e| RetrievalError::WebSearch {
                provider: self.name().to_string(),
                reason: e.to_string(),
            })?;

        let parsed: TavilyResponse = response.json().await.map_err(|e| RetrievalError::WebSearch {
            provider: self.name().to_string(),
            reason: e.to_string(),
        })?;

        Ok(parsed
            .results
            .into_iter()
            .map(|r| WebResult {
                title: r.title,
                url: r.url,
                snippet: r.content,
            })
            .collect())
    }
}

/// A generic key/endpoint-based provider for the remaining vendors (Linkup, SearxNG, Baidu),
/// which share the same request/response shape modulo field names.
pub struct GenericWebSearchProvider {
    name: &'static str,
    client: reqwest::Client,
    endpoint: String,
    api_key: Option<SecretString>,
}

impl GenericWebSearchProvider {
    pub fn new(name: &'static str, endpoint: impl Into<String>, api_key: Option<SecretString>) -> Self {
        Self {
            name,
            client: reqwest::Client::new(),
            endpoint: endpoint.into(),
            api_key,
        }
    }
}

#[derive(Deserialize)]
struct GenericResponseItem {
    title: String,
    url: String,
    #[serde(default)]
    snippet: String,
}

#[derive(Deserialize)]
struct GenericResponse {
    #[serde(default)]
    results: Vec<GenericResponseItem>,
}

#[async_trait]
impl WebSearchProvider for GenericWebSearchProvider {
    fn name(&self) -> &'static str {
        self.name
    }

    async fn search(&self, query: &str, top_k: usize) -> Result<Vec<WebResult>, RetrievalError> {
        let mut request = self
            .client
            .get(&self.endpoint)
            .query(&[("q", query), ("limit", &top_k.to_string())]);
        if let Some(key) = &self.api_key {
            request = request.bearer_auth(key.expose_secret());
        }

        let response = request.send().await.map_err(|e| RetrievalError::WebSearch {
            provider: self.name().to_string(),
            reason: e.to_string(),
        })?;

        let parsed: GenericResponse = response.json().await.map_err(|e| RetrievalError::WebSearch {
            provider: self.name().to_string(),
            reason: e.to_string(),
        })?;

        Ok(parsed
            .results
            .into_iter()
            .map(|r| WebResult {
                title: r.title,
                url: r.url,
                snippet: r.snippet,
            })
            .collect())
    }
}
