//! Ingestion pipeline (C6): normalize → dedupe → summarize → chunk → embed → persist.
//!
//! Every connector and the direct-upload/extension paths funnel through
//! [`IngestionPipeline::ingest`], so dedupe, summarization, and chunking behave identically
//! regardless of where a document came from.

pub mod canonical;

pub use canonical::CanonicalDocument;

use std::sync::Arc;

use chrono::Utc;
use uuid::Uuid;

use crate::embedding::{chunk_document, chunk_document_code_aware, ChunkConfig, EmbeddingProvider};
use crate::error::IngestError;
use crate::llm::{summarization_prompt, LlmRouter};
use crate::store::{content_hash, unique_identifier_hash, Chunk, Document, DocumentType, IngestLookup, Repository};

/// Outcome of a single `ingest` call, used by callers to report accurate
/// indexed/skipped/updated counters.
#[derive(Debug, Clone)]
pub enum IngestOutcome {
    Inserted(Document),
    Updated(Document),
    Unchanged(Document),
}

impl IngestOutcome {
    pub fn document(&self) -> &Document {
        match self {
            Self::Inserted(d) | Self::Updated(d) | Self::Unchanged(d) => d,
        }
    }

    pub fn is_new_work(&self) -> bool {
        !matches!(self, Self::Unchanged(_))
    }
}

const CODE_EXTENSIONS: &[&str] = &[".rs", ".py", ".ts", ".tsx", ".js", ".jsx", ".go", ".java", ".rb"];

pub struct IngestionPipeline {
    repo: Arc<Repository>,
    llm: Arc<LlmRouter>,
    embeddings: Arc<dyn EmbeddingProvider>,
    summarization_model: String,
    embed_concurrency: usize,
}

impl IngestionPipeline {
    pub fn new(
        repo: Arc<Repository>,
        llm: Arc<LlmRouter>,
        embeddings: Arc<dyn EmbeddingProvider>,
        summarization_model: impl Into<String>,
        embed_concurrency: usize,
    ) -> Self {
        Self {
            repo,
            llm,
            embeddings,
            summarization_model: summarization_model.into(),
            embed_concurrency: embed_concurrency.max(1),
        }
    }

    pub async fn ingest(
        &self,
        search_space_id: Uuid,
        document_type: DocumentType,
        doc: CanonicalDocument,
    ) -> Result<IngestOutcome, IngestError> {
        let canonical = doc.render();
        if canonical.trim().is_empty() {
            return Err(IngestError::EmptyContent);
        }

        let new_content_hash = content_hash(&canonical, search_space_id);
        let uid_hash = doc
            .source_id
            .as_deref()
            .map(|sid| unique_identifier_hash(document_type.as_str(), sid, search_space_id));

        let lookup = self
            .repo
            .resolve_ingest(search_space_id, &new_content_hash, uid_hash.as_deref())
            .await?;

        match lookup {
            IngestLookup::Unchanged(existing) => Ok(IngestOutcome::Unchanged(existing)),
            IngestLookup::New => {
                let document = self
                    .process_and_insert(search_space_id, document_type, &doc, &canonical, new_content_hash, uid_hash)
                    .await?;
                Ok(IngestOutcome::Inserted(document))
            }
            IngestLookup::UpdateInPlace(mut existing) => {
                self.process_and_update(&mut existing, &doc, &canonical, &new_content_hash).await?;
                Ok(IngestOutcome::Updated(existing))
            }
        }
    }

    async fn process_and_insert(
        &self,
        search_space_id: Uuid,
        document_type: DocumentType,
        doc: &CanonicalDocument,
        canonical: &str,
        new_content_hash: String,
        uid_hash: Option<String>,
    ) -> Result<Document, IngestError> {
        let summary = self.summarize(canonical).await?;
        let summary_embedding = self.embeddings.embed(&summary).await?;
        let chunks = self.build_chunks(&doc.title, &doc.body_markdown).await?;

        let now = Utc::now();
        let document = Document {
            id: Uuid::new_v4(),
            search_space_id,
            document_type,
            title: doc.title.clone(),
            metadata: metadata_to_json(&doc.metadata),
            summary,
            summary_embedding: Some(summary_embedding),
            content_hash: new_content_hash,
            unique_identifier_hash: uid_hash,
            connector_id: None,
            created_at: now,
            updated_at: now,
        };

        self.repo.insert_document_with_chunks(&document, &chunks).await?;
        Ok(document)
    }

    async fn process_and_update(
        &self,
        existing: &mut Document,
        doc: &CanonicalDocument,
        canonical: &str,
        new_content_hash: &str,
    ) -> Result<(), IngestError> {
        let summary = self.summarize(canonical).await?;
        let summary_embedding = self.embeddings.embed(&summary).await?;
        let chunks = self.build_chunks(&doc.title, &doc.body_markdown).await?;
        let metadata = metadata_to_json(&doc.metadata);

        self.repo
            .update_document_content_with_chunks(
                existing.id,
                &doc.title,
                &metadata,
                &summary,
                &summary_embedding,
                new_content_hash,
                &chunks,
            )
            .await?;

        existing.title = doc.title.clone();
        existing.metadata = metadata;
        existing.summary = summary;
        existing.summary_embedding = Some(summary_embedding);
        existing.content_hash = new_content_hash.to_string();
        existing.updated_at = Utc::now();
        Ok(())
    }

    /// Update only title and metadata, skipping summarization/chunking/embedding entirely.
    /// Used by the Google Drive rename-only path (§4.1) and analogous metadata-only syncs.
    pub async fn update_metadata_only(
        &self,
        document_id: Uuid,
        title: &str,
        metadata: &std::collections::BTreeMap<String, String>,
    ) -> Result<(), IngestError> {
        self.repo
            .update_title_and_metadata(document_id, title, &metadata_to_json(metadata))
            .await?;
        Ok(())
    }

    async fn summarize(&self, canonical: &str) -> Result<String, IngestError> {
        let messages = summarization_prompt(canonical);
        let response = self
            .llm
            .complete(crate::llm::CompletionRequest {
                model: self.summarization_model.clone(),
                messages,
                temperature: Some(0.2),
                max_tokens: Some(512),
            })
            .await?;
        Ok(response.content)
    }

    async fn build_chunks(&self, title: &str, body: &str) -> Result<Vec<Chunk>, IngestError> {
        let is_code = CODE_EXTENSIONS.iter().any(|ext| title.ends_with(ext));
        let texts = if is_code {
            chunk_document_code_aware(body, ChunkConfig::default())
        } else {
            chunk_document(body, ChunkConfig::default())
        };

        let mut chunks = Vec::with_capacity(texts.len());
        for batch in texts.chunks(self.embed_concurrency) {
            let futures = batch.iter().map(|text| self.embeddings.embed(text));
            let embeddings = futures::future::try_join_all(futures).await?;
            for (content, embedding) in batch.iter().zip(embeddings) {
                chunks.push(Chunk {
                    id: Uuid::new_v4(),
                    document_id: Uuid::nil(),
                    chunk_index: chunks.len() as i32,
                    content: content.clone(),
                    embedding: Some(embedding),
                });
            }
        }
        Ok(chunks)
    }
}

fn metadata_to_json(metadata: &std::collections::BTreeMap<String, String>) -> serde_json::Value {
    serde_json::Value::Object(
        metadata
            .iter()
            .map(|(k, v)| (k.clone(), serde_json::Value::String(v.clone())))
            .collect(),
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ingest_outcome_is_new_work_for_insert_and_update_only() {
        let now = Utc::now();
        let doc = Document {
            id: Uuid::new_v4(),
            search_space_id: Uuid::new_v4(),
            document_type: DocumentType::File,
            title: "t".into(),
            metadata: serde_json::Value::Null,
            summary: String::new(),
            summary_embedding: None,
            content_hash: "h".into(),
            unique_identifier_hash: None,
            connector_id: None,
            created_at: now,
            updated_at: now,
        };
        assert!(IngestOutcome::Inserted(doc.clone()).is_new_work());
        assert!(IngestOutcome::Updated(doc.clone()).is_new_work());
        assert!(!IngestOutcome::Unchanged(doc).is_new_work());
    }
}
