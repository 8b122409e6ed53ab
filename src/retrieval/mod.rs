//! Hybrid retrieval engine (C7): fans out a query across enabled indexed sources and the open
//! web, then returns a deduplicated, source-tagged set of citable chunks.

pub mod chunk_id;
pub mod web;

pub use chunk_id::ChunkIdSequence;
pub use web::{GenericWebSearchProvider, TavilyProvider, WebResult, WebSearchProvider};

use std::collections::HashMap;
use std::sync::Arc;

use serde::Serialize;
use uuid::Uuid;

use crate::config::RetrievalWeights;
use crate::embedding::EmbeddingProvider;
use crate::error::RetrievalError;
use crate::store::{Document, DocumentType, Repository};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RetrievalMode {
    Chunks,
    Documents,
}

/// A single citable hit, carrying enough to both render and verify a `[citation:id]` token.
#[derive(Debug, Clone, Serialize)]
pub struct CitableChunk {
    pub chunk_id: u64,
    pub content: String,
    pub score: f32,
    pub document_id: Uuid,
    pub document_title: String,
    pub document_type: DocumentType,
}

#[derive(Debug, Clone, Serialize)]
pub struct SourceEnvelope {
    pub id: String,
    pub name: String,
    pub source_type: String,
    pub sources: Vec<SourceDescriptor>,
}

#[derive(Debug, Clone, Serialize)]
pub struct SourceDescriptor {
    pub id: String,
    pub title: String,
    pub description: String,
    pub url: Option<String>,
}

pub struct SearchRequest<'a> {
    pub user_id: &'a str,
    pub search_space_id: Uuid,
    pub query: &'a str,
    pub top_k: usize,
    pub mode: RetrievalMode,
    pub enabled_document_types: Option<Vec<DocumentType>>,
    pub web_providers: Vec<Arc<dyn WebSearchProvider>>,
}

pub struct SearchResponse {
    pub envelopes: Vec<SourceEnvelope>,
    pub citable_chunks: Vec<CitableChunk>,
}

pub struct RetrievalEngine {
    repo: Arc<Repository>,
    embeddings: Arc<dyn EmbeddingProvider>,
    weights: RetrievalWeights,
    sequence: ChunkIdSequence,
}

impl RetrievalEngine {
    pub async fn new(
        repo: Arc<Repository>,
        embeddings: Arc<dyn EmbeddingProvider>,
        weights: RetrievalWeights,
        user_id: &str,
    ) -> Result<Self, RetrievalError> {
        let seed = repo.count_chunks_for_user(user_id).await?;
        Ok(Self {
            repo,
            embeddings,
            weights,
            sequence: ChunkIdSequence::seeded(seed),
        })
    }

    pub async fn search(&self, request: SearchRequest<'_>) -> Result<SearchResponse, RetrievalError> {
        let query_embedding = self.embeddings.embed(request.query).await?;

        let (indexed_task, web_tasks): (_, Vec<_>) = (
            self.repo.hybrid_search_chunks(
                request.search_space_id,
                &query_embedding,
                request.query,
                request.enabled_document_types.as_deref(),
                self.weights.dense,
                self.weights.lexical,
                request.top_k as i64,
            ),
            request
                .web_providers
                .iter()
                .map(|p| {
                    let provider = p.clone();
                    let query = request.query.to_string();
                    let top_k = request.top_k;
                    async move { (provider.name(), provider.search(&query, top_k).await) }
                })
                .collect(),
        );

        let (indexed_rows, web_results) =
            futures::future::join(indexed_task, futures::future::join_all(web_tasks)).await;
        let indexed_rows = indexed_rows?;

        let reserved_start = self.sequence.reserve(indexed_rows.len() as u64);
        let mut by_key: HashMap<(Uuid, i32), CitableChunk> = HashMap::new();

        for (offset, (chunk, document, score)) in indexed_rows.into_iter().enumerate() {
            let chunk_id = reserved_start + offset as u64;
            let key = (document.id, chunk.chunk_index);
            let candidate = CitableChunk {
                chunk_id,
                content: chunk.content,
                score,
                document_id: document.id,
                document_title: document.title,
                document_type: document.document_type,
            };
            by_key
                .entry(key)
                .and_modify(|existing| {
                    if candidate.score > existing.score {
                        *existing = candidate.clone();
                    }
                })
                .or_insert(candidate);
        }

        let mut citable_chunks: Vec<CitableChunk> = by_key.into_values().collect();
        citable_chunks.sort_by(|a, b| b.score.partial_cmp(&a.score).unwrap_or(std::cmp::Ordering::Equal));

        if request.mode == RetrievalMode::Documents {
            citable_chunks = aggregate_to_documents(citable_chunks);
        }

        let mut envelopes = Vec::new();
        if !citable_chunks.is_empty() {
            envelopes.push(SourceEnvelope {
                id: "knowledge_base".to_string(),
                name: "Knowledge Base".to_string(),
                source_type: "indexed".to_string(),
                sources: citable_chunks
                    .iter()
                    .map(|c| SourceDescriptor {
                        id: c.document_id.to_string(),
                        title: c.document_title.clone(),
                        description: truncate(&c.content, 200),
                        url: None,
                    })
                    .collect(),
            });
        }

        for (provider_name, result) in web_results {
            let results = match result {
                Ok(r) => r,
                Err(_) => continue,
            };
            if results.is_empty() {
                continue;
            }
            envelopes.push(SourceEnvelope {
                id: provider_name.to_string(),
                name: provider_name.to_string(),
                source_type: "web".to_string(),
                sources: results
                    .iter()
                    .map(|r| SourceDescriptor {
                        id: r.url.clone(),
                        title: r.title.clone(),
                        description: truncate(&r.snippet, 200),
                        url: Some(r.url.clone()),
                    })
                    .collect(),
            });
        }

        Ok(SearchResponse {
            envelopes,
            citable_chunks,
        })
    }
}

/// Reusable, unscoped search over a fixed documentation corpus — demonstrates that hybrid
/// search is not user-data-specific by scoping to a reserved, non-user search-space id.
pub async fn search_docs_corpus(
    engine: &RetrievalEngine,
    docs_search_space_id: Uuid,
    query: &str,
    top_k: usize,
) -> Result<SearchResponse, RetrievalError> {
    engine
        .search(SearchRequest {
            user_id: "",
            search_space_id: docs_search_space_id,
            query,
            top_k,
            mode: RetrievalMode::Chunks,
            enabled_document_types: None,
            web_providers: vec![],
        })
        .await
}

fn aggregate_to_documents(chunks: Vec<CitableChunk>) -> Vec<CitableChunk> {
    let mut by_doc: HashMap<Uuid, CitableChunk> = HashMap::new();
    for chunk in chunks {
        by_doc
            .entry(chunk.document_id)
            .and_modify(|existing| {
                existing.content.push_str("\n\n");
                existing.content.push_str(&chunk.content);
                if chunk.score > existing.score {
                    existing.score = chunk.score;
                }
            })
            .or_insert(chunk);
    }
    let mut docs: Vec<CitableChunk> = by_doc.into_values().collect();
    docs.sort_by(|a, b| b.score.partial_cmp(&a.score).unwrap_or(std::cmp::Ordering::Equal));
    docs
}

fn truncate(s: &str, max_chars: usize) -> String {
    if s.chars().count() <= max_chars {
        s.to_string()
    } else {
        format!("{}...", s.chars().take(max_chars).collect::<String>())
    }
}

fn _assert_document_field_used(doc: &Document) -> &str {
    &doc.title
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn aggregate_to_documents_merges_by_document_id() {
        let doc_id = Uuid::new_v4();
        let chunks = vec![
            CitableChunk {
                chunk_id: 1,
                content: "first".to_string(),
                score: 0.5,
                document_id: doc_id,
                document_title: "Doc".to_string(),
                document_type: DocumentType::File,
            },
            CitableChunk {
                chunk_id: 2,
                content: "second".to_string(),
                score: 0.9,
                document_id: doc_id,
                document_title: "Doc".to_string(),
                document_type: DocumentType::File,
            },
        ];
        let aggregated = aggregate_to_documents(chunks);
        assert_eq!(aggregated.len(), 1);
        assert!(aggregated[0].content.contains("first"));
        assert!(aggregated[0].content.contains("second"));
        assert_eq!(aggregated[0].score, 0.9);
    }

    #[test]
    fn truncate_respects_char_boundary() {
        let s = "hello world";
        assert_eq!(truncate(s, 5), "hello...");
        assert_eq!(truncate(s, 100), "hello world");
    }
}
