//! Crate-wide error taxonomy.
//!
//! Each subsystem owns a `thiserror` enum scoped to the failures it can raise; this module
//! composes them into a single [`Error`] so binary entry points can bubble failures with `?`
//! while internal APIs stay precisely typed.

use thiserror::Error;

/// Errors raised by the connector registry and scheduler (C5).
#[derive(Debug, Error)]
pub enum ConnectorError {
    #[error("connector {id} not found")]
    NotFound { id: String },

    #[error("connector {id} is missing required credentials")]
    MissingCredentials { id: String },

    #[error("connector {id} credentials have expired and require re-authentication")]
    AuthExpired { id: String },

    #[error("connector {id} was rate limited, retry after {retry_after_secs}s")]
    RateLimited { id: String, retry_after_secs: u64 },

    #[error("upstream request failed: {0}")]
    TransientUpstream(String),

    #[error("connector run was cancelled")]
    Cancelled,
}

/// Errors raised while running the ingestion pipeline (C6).
#[derive(Debug, Error)]
pub enum IngestError {
    #[error("failed to persist document: {0}")]
    Persistence(#[from] StoreError),

    #[error("summarization failed: {0}")]
    Summarization(#[from] LlmError),

    #[error("embedding failed: {0}")]
    Embedding(#[from] EmbeddingError),

    #[error("document content was empty after normalization")]
    EmptyContent,
}

/// Errors raised by the document store (C3).
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("database error: {0}")]
    Database(String),

    #[error("document {id} not found")]
    DocumentNotFound { id: String },

    #[error("connector {id} not found")]
    ConnectorNotFound { id: String },

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Errors raised by an LLM provider call.
#[derive(Debug, Error)]
pub enum LlmError {
    #[error("provider request failed: {0}")]
    Request(String),

    #[error("provider returned an unparseable response: {0}")]
    InvalidResponse(String),

    #[error("no provider configured for model {model}")]
    NoProvider { model: String },

    #[error("request timed out")]
    Timeout,
}

/// Errors raised by an embedding provider call.
#[derive(Debug, Error)]
pub enum EmbeddingError {
    #[error("embedding request failed: {0}")]
    Request(String),

    #[error("embedding dimension mismatch: expected {expected}, got {actual}")]
    DimensionMismatch { expected: usize, actual: usize },
}

/// Errors raised by the retrieval engine (C7).
#[derive(Debug, Error)]
pub enum RetrievalError {
    #[error("store error: {0}")]
    Store(#[from] StoreError),

    #[error("embedding error: {0}")]
    Embedding(#[from] EmbeddingError),

    #[error("web search provider {provider} failed: {reason}")]
    WebSearch { provider: String, reason: String },
}

/// Errors raised by the agent runtime (C8).
#[derive(Debug, Error)]
pub enum AgentError {
    #[error("llm error: {0}")]
    Llm(#[from] LlmError),

    #[error("tool error: {0}")]
    Tool(#[from] ToolError),

    #[error("store error: {0}")]
    Store(#[from] StoreError),

    #[error("no pending approval with id {id}")]
    NoPendingApproval { id: String },

    #[error("thread {id} not found")]
    ThreadNotFound { id: String },
}

/// Errors raised by an individual tool invocation.
#[derive(Debug, Error, Clone)]
pub enum ToolError {
    #[error("invalid parameters: {0}")]
    InvalidParameters(String),

    #[error("execution failed: {0}")]
    ExecutionFailed(String),

    #[error("external service error: {0}")]
    ExternalService(String),

    #[error("tool timed out after {0:?}")]
    Timeout(std::time::Duration),

    #[error("tool call was rejected by the user")]
    Rejected,

    #[error("referenced item not found: {0}")]
    NotFound(String),
}

/// Errors raised by the workspace / user-memory subsystem.
#[derive(Debug, Error)]
pub enum WorkspaceError {
    #[error("database error: {0}")]
    Database(String),

    #[error("document not found: {doc_type}/{title:?}")]
    DocumentNotFound {
        doc_type: String,
        title: Option<String>,
    },

    #[error("invalid document type: {doc_type}")]
    InvalidDocType { doc_type: String },

    #[error("embedding failed: {reason}")]
    EmbeddingFailed { reason: String },
}

/// Errors raised by background jobs (C9).
#[derive(Debug, Error)]
pub enum JobError {
    #[error("a podcast is already being generated for this search space: {podcast_id}")]
    AlreadyGenerating { podcast_id: String },

    #[error("llm error: {0}")]
    Llm(#[from] LlmError),

    #[error("tts provider error: {0}")]
    Tts(String),

    #[error("store error: {0}")]
    Store(#[from] StoreError),
}

/// Crate-level error composing every subsystem's taxonomy, for binary entry points.
#[derive(Debug, Error)]
pub enum Error {
    #[error(transparent)]
    Connector(#[from] ConnectorError),

    #[error(transparent)]
    Ingest(#[from] IngestError),

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error(transparent)]
    Llm(#[from] LlmError),

    #[error(transparent)]
    Embedding(#[from] EmbeddingError),

    #[error(transparent)]
    Retrieval(#[from] RetrievalError),

    #[error(transparent)]
    Agent(#[from] AgentError),

    #[error(transparent)]
    Tool(#[from] ToolError),

    #[error(transparent)]
    Workspace(#[from] WorkspaceError),

    #[error(transparent)]
    Job(#[from] JobError),

    #[error(transparent)]
    Config(#[from] crate::config::ConfigError),
}
