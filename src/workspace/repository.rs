//! PostgreSQL-backed storage for workspace memory documents and their search chunks.

use deadpool_postgres::Pool;
use pgvector::Vector;
use tokio_postgres::Row;
use uuid::Uuid;

use crate::error::WorkspaceError;
use crate::workspace::document::{DocType, MemoryChunk, MemoryDocument};
use crate::workspace::search::{SearchConfig, SearchResult};

pub struct Repository {
    pool: Pool,
}

impl Repository {
    pub fn new(pool: Pool) -> Self {
        Self { pool }
    }

    pub async fn get_document(
        &self,
        user_id: &str,
        agent_id: Option<Uuid>,
        doc_type: DocType,
        title: Option<&str>,
    ) -> Result<MemoryDocument, WorkspaceError> {
        let client = self
            .pool
            .get()
            .await
            .map_err(|e| WorkspaceError::Database(e.to_string()))?;

        let row = client
            .query_opt(
                "SELECT id, user_id, agent_id, doc_type, title, content, created_at, updated_at, \
                 metadata FROM memory_documents \
                 WHERE user_id = $1 AND agent_id IS NOT DISTINCT FROM $2 \
                 AND doc_type = $3 AND title IS NOT DISTINCT FROM $4",
                &[&user_id, &agent_id, &doc_type.as_str(), &title],
            )
            .await
            .map_err(|e| WorkspaceError::Database(e.to_string()))?;

        row.map(|r| document_from_row(&r))
            .transpose()?
            .ok_or_else(|| WorkspaceError::DocumentNotFound {
                doc_type: doc_type.to_string(),
                title: title.map(str::to_string),
            })
    }

    pub async fn get_document_by_id(&self, document_id: Uuid) -> Result<MemoryDocument, WorkspaceError> {
        let client = self
            .pool
            .get()
            .await
            .map_err(|e| WorkspaceError::Database(e.to_string()))?;

        let row = client
            .query_opt(
                "SELECT id, user_id, agent_id, doc_type, title, content, created_at, updated_at, \
                 metadata FROM memory_documents WHERE id = $1",
                &[&document_id],
            )
            .await
            .map_err(|e| WorkspaceError::Database(e.to_string()))?;

        row.map(|r| document_from_row(&r))
            .transpose()?
            .ok_or_else(|| WorkspaceError::DocumentNotFound {
                doc_type: "unknown".to_string(),
                title: Some(document_id.to_string()),
            })
    }

    /// Fetch the document, creating an empty one if it doesn't exist yet.
    pub async fn get_or_create_document(
        &self,
        user_id: &str,
        agent_id: Option<Uuid>,
        doc_type: DocType,
        title: Option<&str>,
    ) -> Result<MemoryDocument, WorkspaceError> {
        match self.get_document(user_id, agent_id, doc_type, title).await {
            Ok(doc) => Ok(doc),
            Err(WorkspaceError::DocumentNotFound { .. }) => {
                let doc = MemoryDocument::new(user_id, agent_id, doc_type, title.map(str::to_string));
                let client = self
                    .pool
                    .get()
                    .await
                    .map_err(|e| WorkspaceError::Database(e.to_string()))?;
                client
                    .execute(
                        "INSERT INTO memory_documents (id, user_id, agent_id, doc_type, title, \
                         content, created_at, updated_at, metadata) \
                         VALUES ($1,$2,$3,$4,$5,$6,$7,$8,$9)",
                        &[
                            &doc.id,
                            &doc.user_id,
                            &doc.agent_id,
                            &doc.doc_type.as_str(),
                            &doc.title,
                            &doc.content,
                            &doc.created_at,
                            &doc.updated_at,
                            &doc.metadata,
                        ],
                    )
                    .await
                    .map_err(|e| WorkspaceError::Database(e.to_string()))?;
                Ok(doc)
            }
            Err(e) => Err(e),
        }
    }

    pub async fn update_document(&self, document_id: Uuid, content: &str) -> Result<(), WorkspaceError> {
        let client = self
            .pool
            .get()
            .await
            .map_err(|e| WorkspaceError::Database(e.to_string()))?;
        client
            .execute(
                "UPDATE memory_documents SET content = $2, updated_at = now() WHERE id = $1",
                &[&document_id, &content],
            )
            .await
            .map_err(|e| WorkspaceError::Database(e.to_string()))?;
        Ok(())
    }

    pub async fn delete_chunks(&self, document_id: Uuid) -> Result<(), WorkspaceError> {
        let client = self
            .pool
            .get()
            .await
            .map_err(|e| WorkspaceError::Database(e.to_string()))?;
        client
            .execute("DELETE FROM memory_chunks WHERE document_id = $1", &[&document_id])
            .await
            .map_err(|e| WorkspaceError::Database(e.to_string()))?;
        Ok(())
    }

    pub async fn insert_chunk(
        &self,
        document_id: Uuid,
        chunk_index: i32,
        content: &str,
        embedding: Option<&[f32]>,
    ) -> Result<(), WorkspaceError> {
        let client = self
            .pool
            .get()
            .await
            .map_err(|e| WorkspaceError::Database(e.to_string()))?;
        client
            .execute(
                "INSERT INTO memory_chunks (id, document_id, chunk_index, content, embedding, created_at) \
                 VALUES ($1,$2,$3,$4,$5,now())",
                &[
                    &Uuid::new_v4(),
                    &document_id,
                    &chunk_index,
                    &content,
                    &embedding.map(|e| Vector::from(e.to_vec())),
                ],
            )
            .await
            .map_err(|e| WorkspaceError::Database(e.to_string()))?;
        Ok(())
    }

    pub async fn get_chunks_without_embeddings(
        &self,
        user_id: &str,
        agent_id: Option<Uuid>,
        limit: i64,
    ) -> Result<Vec<MemoryChunk>, WorkspaceError> {
        let client = self
            .pool
            .get()
            .await
            .map_err(|e| WorkspaceError::Database(e.to_string()))?;

        let rows = client
            .query(
                "SELECT c.id, c.document_id, c.chunk_index, c.content, c.embedding, c.created_at \
                 FROM memory_chunks c JOIN memory_documents d ON d.id = c.document_id \
                 WHERE d.user_id = $1 AND d.agent_id IS NOT DISTINCT FROM $2 \
                 AND c.embedding IS NULL LIMIT $3",
                &[&user_id, &agent_id, &limit],
            )
            .await
            .map_err(|e| WorkspaceError::Database(e.to_string()))?;

        Ok(rows.iter().map(chunk_from_row).collect())
    }

    pub async fn update_chunk_embedding(&self, chunk_id: Uuid, embedding: &[f32]) -> Result<(), WorkspaceError> {
        let client = self
            .pool
            .get()
            .await
            .map_err(|e| WorkspaceError::Database(e.to_string()))?;
        let embedding = Vector::from(embedding.to_vec());
        client
            .execute(
                "UPDATE memory_chunks SET embedding = $2 WHERE id = $1",
                &[&chunk_id, &embedding],
            )
            .await
            .map_err(|e| WorkspaceError::Database(e.to_string()))?;
        Ok(())
    }

    /// Hybrid full-text + vector search across a user's (optionally agent-scoped) memory chunks.
    pub async fn hybrid_search(
        &self,
        user_id: &str,
        agent_id: Option<Uuid>,
        query: &str,
        embedding: Option<&[f32]>,
        config: &SearchConfig,
    ) -> Result<Vec<SearchResult>, WorkspaceError> {
        let client = self
            .pool
            .get()
            .await
            .map_err(|e| WorkspaceError::Database(e.to_string()))?;

        let limit = config.limit as i64;
        let rows = if let Some(embedding) = embedding {
            let embedding = Vector::from(embedding.to_vec());
            client
                .query(
                    "SELECT c.id, c.document_id, c.content, \
                     (1 - (c.embedding <=> $4)) AS dense_score, \
                     ts_rank_cd(to_tsvector('english', c.content), plainto_tsquery('english', $3)) AS lexical_score \
                     FROM memory_chunks c JOIN memory_documents d ON d.id = c.document_id \
                     WHERE d.user_id = $1 AND d.agent_id IS NOT DISTINCT FROM $2 AND c.embedding IS NOT NULL \
                     ORDER BY ($5::float4 * dense_score) + ($6::float4 * lexical_score) DESC LIMIT $7",
                    &[
                        &user_id,
                        &agent_id,
                        &query,
                        &embedding,
                        &config.dense_weight,
                        &config.lexical_weight,
                        &limit,
                    ],
                )
                .await
                .map_err(|e| WorkspaceError::Database(e.to_string()))?
        } else {
            client
                .query(
                    "SELECT c.id, c.document_id, c.content, NULL::float4 AS dense_score, \
                     ts_rank_cd(to_tsvector('english', c.content), plainto_tsquery('english', $3)) AS lexical_score \
                     FROM memory_chunks c JOIN memory_documents d ON d.id = c.document_id \
                     WHERE d.user_id = $1 AND d.agent_id IS NOT DISTINCT FROM $2 \
                     ORDER BY lexical_score DESC LIMIT $4",
                    &[&user_id, &agent_id, &query, &limit],
                )
                .await
                .map_err(|e| WorkspaceError::Database(e.to_string()))?
        };

        Ok(rows
            .iter()
            .map(|row| {
                let dense_score: Option<f32> = row.get(3);
                let lexical_score: Option<f32> = row.get(4);
                SearchResult {
                    chunk_id: row.get(0),
                    document_id: row.get(1),
                    content: row.get(2),
                    score: dense_score.unwrap_or(0.0) * config.dense_weight
                        + lexical_score.unwrap_or(0.0) * config.lexical_weight,
                    dense_score,
                    lexical_score,
                }
            })
            .collect())
    }
}

fn document_from_row(row: &Row) -> Result<MemoryDocument, WorkspaceError> {
    let doc_type_str: String = row.get(3);
    let doc_type = DocType::try_from(doc_type_str.as_str())?;
    Ok(MemoryDocument {
        id: row.get(0),
        user_id: row.get(1),
        agent_id: row.get(2),
        doc_type,
        title: row.get(4),
        content: row.get(5),
        created_at: row.get(6),
        updated_at: row.get(7),
        metadata: row.get(8),
    })
}

fn chunk_from_row(row: &Row) -> MemoryChunk {
    MemoryChunk {
        id: row.get(0),
        document_id: row.get(1),
        chunk_index: row.get(2),
        content: row.get(3),
        embedding: row.get::<_, Option<Vector>>(4).map(Vector::to_vec),
        created_at: row.get(5),
    }
}
