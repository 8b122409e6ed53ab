//! Process configuration and the service-locator that builds long-lived handles from it.
//!
//! Configuration is layered: defaults, then an optional TOML file, then environment
//! variables (loaded via `dotenvy` in development), matching the teacher's `dotenvy` + `toml`
//! dependency pair. The locator is built once at startup and injected into workers rather than
//! reached for as a hidden singleton.

use std::sync::Arc;

use serde::Deserialize;
use thiserror::Error;

use crate::embedding::EmbeddingProvider;
use crate::llm::LlmRouter;
use crate::store::Repository;
use crate::tasklog::TaskLog;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file {path}: {source}")]
    Read {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse config file {path}: {source}")]
    Parse {
        path: String,
        #[source]
        source: toml::de::Error,
    },

    #[error("missing required environment variable {0}")]
    MissingEnv(String),
}

/// Retrieval ranking weights, tunable per deployment.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct RetrievalWeights {
    pub dense: f32,
    pub lexical: f32,
}

impl Default for RetrievalWeights {
    fn default() -> Self {
        Self {
            dense: 0.6,
            lexical: 0.4,
        }
    }
}

/// Timeouts for external collaborators, in seconds.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct Timeouts {
    pub http_scrape_secs: u64,
    pub mcp_tool_secs: u64,
    pub heartbeat_interval_secs: u64,
}

impl Default for Timeouts {
    fn default() -> Self {
        Self {
            http_scrape_secs: 10,
            mcp_tool_secs: 30,
            heartbeat_interval_secs: 30,
        }
    }
}

/// The static (file + env) portion of process configuration.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub database_url: String,
    pub llm_model: String,
    pub embedding_model: String,
    pub embedding_dimensions: usize,
    pub retrieval_weights: RetrievalWeights,
    pub timeouts: Timeouts,
    pub podcast_lock_ttl_secs: u64,
    pub max_concurrent_embeddings: usize,
    pub connector_lookback_days: i64,
    pub citations_enabled: bool,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            database_url: String::new(),
            llm_model: "gpt-4o-mini".to_string(),
            embedding_model: "text-embedding-3-small".to_string(),
            embedding_dimensions: 1536,
            retrieval_weights: RetrievalWeights::default(),
            timeouts: Timeouts::default(),
            podcast_lock_ttl_secs: 1800,
            max_concurrent_embeddings: 4,
            connector_lookback_days: 365,
            citations_enabled: true,
        }
    }
}

impl AppConfig {
    /// Load configuration: start from defaults, overlay an optional TOML file, overlay
    /// environment variables. Missing file is not an error; missing `DATABASE_URL` is.
    pub fn load(toml_path: Option<&str>) -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok();

        let mut cfg = Self::default();

        if let Some(path) = toml_path {
            match std::fs::read_to_string(path) {
                Ok(contents) => {
                    cfg = toml::from_str(&contents).map_err(|source| ConfigError::Parse {
                        path: path.to_string(),
                        source,
                    })?;
                }
                Err(source) if source.kind() == std::io::ErrorKind::NotFound => {}
                Err(source) => {
                    return Err(ConfigError::Read {
                        path: path.to_string(),
                        source,
                    });
                }
            }
        }

        if let Ok(url) = std::env::var("DATABASE_URL") {
            cfg.database_url = url;
        }
        if cfg.database_url.is_empty() {
            return Err(ConfigError::MissingEnv("DATABASE_URL".to_string()));
        }
        if let Ok(model) = std::env::var("LLM_MODEL") {
            cfg.llm_model = model;
        }
        if let Ok(model) = std::env::var("EMBEDDING_MODEL") {
            cfg.embedding_model = model;
        }

        Ok(cfg)
    }
}

/// The long-lived service handles every worker is constructed from. Built once at process
/// startup; passed down by `Arc` rather than reached for globally.
#[derive(Clone)]
pub struct Services {
    pub config: Arc<AppConfig>,
    pub repository: Arc<Repository>,
    pub llm: Arc<LlmRouter>,
    pub embeddings: Arc<dyn EmbeddingProvider>,
    pub tasklog: Arc<TaskLog>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_weights_sum_to_one() {
        let w = RetrievalWeights::default();
        assert!((w.dense + w.lexical - 1.0).abs() < 1e-6);
    }

    #[test]
    fn missing_database_url_errors() {
        // SAFETY: test-local env mutation, no concurrent access in this process during the test.
        unsafe {
            std::env::remove_var("DATABASE_URL");
        }
        let result = AppConfig::load(None);
        assert!(matches!(result, Err(ConfigError::MissingEnv(_))));
    }
}
