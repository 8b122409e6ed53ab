//! Document store (C3): transactional persistence for documents, chunks, connectors, chats,
//! reports, and podcasts, with hybrid lexical + vector search support.

pub mod hash;
pub mod models;
pub mod repository;

pub use hash::{content_hash, unique_identifier_hash};
pub use models::{
    ChatMessageRecord, ChatRole, Chunk, ConnectorDescriptor, ConnectorType, Document, DocumentType,
    Podcast, PodcastStatus, Report, SearchSourceConnector, Thread,
};
pub use repository::{IngestLookup, Repository};
