//! PostgreSQL-backed document store.
//!
//! Mirrors the workspace subsystem's repository shape (`get_or_create`-style helpers, a single
//! connection borrowed per call rather than held across awaits) generalized from one document
//! type to the full document/chunk/connector/report/podcast model.

use chrono::{DateTime, Utc};
use deadpool_postgres::Pool;
use pgvector::Vector;
use serde_json::Value;
use uuid::Uuid;

use crate::error::StoreError;
use crate::store::models::{
    ChatMessageRecord, ChatRole, Chunk, ConnectorDescriptor, Document, DocumentType, Podcast,
    PodcastStatus, Report, SearchSourceConnector, Thread,
};

/// Outcome of running a document through the dedupe/update lookup.
#[derive(Debug, Clone)]
pub enum IngestLookup {
    /// No existing document matched; caller should insert.
    New,
    /// An existing document with the same unique-identifier hash has different content;
    /// caller should update it in place, retaining its id.
    UpdateInPlace(Document),
    /// An existing document is byte-identical (by content hash or unchanged unique id);
    /// caller should no-op and return it.
    Unchanged(Document),
}

pub struct Repository {
    pool: Pool,
}

impl Repository {
    pub fn new(pool: Pool) -> Self {
        Self { pool }
    }

    /// Resolve whether an incoming (content_hash, unique_identifier_hash) pair is new, an
    /// update, or a no-op duplicate. Mirrors the two-stage lookup: unique id first, content
    /// hash second.
    pub async fn resolve_ingest(
        &self,
        search_space_id: Uuid,
        new_content_hash: &str,
        unique_id_hash: Option<&str>,
    ) -> Result<IngestLookup, StoreError> {
        let client = self
            .pool
            .get()
            .await
            .map_err(|e| StoreError::Database(e.to_string()))?;

        if let Some(uid) = unique_id_hash {
            let row = client
                .query_opt(
                    "SELECT id, search_space_id, document_type, title, metadata, summary, \
                     summary_embedding, content_hash, unique_identifier_hash, connector_id, \
                     created_at, updated_at FROM documents \
                     WHERE unique_identifier_hash = $1 AND search_space_id = $2",
                    &[&uid, &search_space_id],
                )
                .await
                .map_err(|e| StoreError::Database(e.to_string()))?;

            if let Some(row) = row {
                let existing = document_from_row(&row)?;
                return Ok(if existing.content_hash == new_content_hash {
                    IngestLookup::Unchanged(existing)
                } else {
                    IngestLookup::UpdateInPlace(existing)
                });
            }
        }

        let row = client
            .query_opt(
                "SELECT id, search_space_id, document_type, title, metadata, summary, \
                 summary_embedding, content_hash, unique_identifier_hash, connector_id, \
                 created_at, updated_at FROM documents \
                 WHERE content_hash = $1 AND search_space_id = $2",
                &[&new_content_hash, &search_space_id],
            )
            .await
            .map_err(|e| StoreError::Database(e.to_string()))?;

        Ok(match row {
            Some(row) => IngestLookup::Unchanged(document_from_row(&row)?),
            None => IngestLookup::New,
        })
    }

    pub async fn insert_document(&self, doc: &Document) -> Result<(), StoreError> {
        let client = self
            .pool
            .get()
            .await
            .map_err(|e| StoreError::Database(e.to_string()))?;
        let summary_embedding = doc.summary_embedding.clone().map(Vector::from);
        client
            .execute(
                "INSERT INTO documents (id, search_space_id, document_type, title, metadata, \
                 summary, summary_embedding, content_hash, unique_identifier_hash, connector_id, \
                 created_at, updated_at) VALUES ($1,$2,$3,$4,$5,$6,$7,$8,$9,$10,$11,$12)",
                &[
                    &doc.id,
                    &doc.search_space_id,
                    &doc.document_type.as_str(),
                    &doc.title,
                    &doc.metadata,
                    &doc.summary,
                    &summary_embedding,
                    &doc.content_hash,
                    &doc.unique_identifier_hash,
                    &doc.connector_id,
                    &doc.created_at,
                    &doc.updated_at,
                ],
            )
            .await
            .map_err(|e| StoreError::Database(e.to_string()))?;
        Ok(())
    }

    /// Insert a document and its chunks in one transaction: a failure partway through rolls
    /// back the document insert too, so a chunking/embedding failure never leaves an orphan
    /// document with no chunks.
    pub async fn insert_document_with_chunks(&self, doc: &Document, chunks: &[Chunk]) -> Result<(), StoreError> {
        let mut client = self
            .pool
            .get()
            .await
            .map_err(|e| StoreError::Database(e.to_string()))?;
        let tx = client
            .transaction()
            .await
            .map_err(|e| StoreError::Database(e.to_string()))?;

        let summary_embedding = doc.summary_embedding.clone().map(Vector::from);
        tx.execute(
            "INSERT INTO documents (id, search_space_id, document_type, title, metadata, \
             summary, summary_embedding, content_hash, unique_identifier_hash, connector_id, \
             created_at, updated_at) VALUES ($1,$2,$3,$4,$5,$6,$7,$8,$9,$10,$11,$12)",
            &[
                &doc.id,
                &doc.search_space_id,
                &doc.document_type.as_str(),
                &doc.title,
                &doc.metadata,
                &doc.summary,
                &summary_embedding,
                &doc.content_hash,
                &doc.unique_identifier_hash,
                &doc.connector_id,
                &doc.created_at,
                &doc.updated_at,
            ],
        )
        .await
        .map_err(|e| StoreError::Database(e.to_string()))?;

        for chunk in chunks {
            let embedding = chunk.embedding.clone().map(Vector::from);
            tx.execute(
                "INSERT INTO chunks (id, document_id, chunk_index, content, embedding) \
                 VALUES ($1,$2,$3,$4,$5)",
                &[
                    &chunk.id,
                    &doc.id,
                    &chunk.chunk_index,
                    &chunk.content,
                    &embedding,
                ],
            )
            .await
            .map_err(|e| StoreError::Database(e.to_string()))?;
        }

        tx.commit()
            .await
            .map_err(|e| StoreError::Database(e.to_string()))?;
        Ok(())
    }

    /// Update only title and metadata, leaving summary/content/chunks untouched — the
    /// rename-only path for Google Drive (and similarly minimal metadata-only syncs).
    pub async fn update_title_and_metadata(
        &self,
        document_id: Uuid,
        title: &str,
        metadata: &Value,
    ) -> Result<(), StoreError> {
        let client = self
            .pool
            .get()
            .await
            .map_err(|e| StoreError::Database(e.to_string()))?;
        client
            .execute(
                "UPDATE documents SET title = $2, metadata = $3, updated_at = now() WHERE id = $1",
                &[&document_id, &title, metadata],
            )
            .await
            .map_err(|e| StoreError::Database(e.to_string()))?;
        Ok(())
    }

    /// Update a document's content fields and replace its chunks in one transaction, matching
    /// `insert_document_with_chunks`'s atomicity: a chunk/embedding failure rolls back the
    /// content update too, rather than leaving stale chunks under a new summary.
    pub async fn update_document_content_with_chunks(
        &self,
        document_id: Uuid,
        title: &str,
        metadata: &Value,
        summary: &str,
        summary_embedding: &[f32],
        new_content_hash: &str,
        chunks: &[Chunk],
    ) -> Result<(), StoreError> {
        let mut client = self
            .pool
            .get()
            .await
            .map_err(|e| StoreError::Database(e.to_string()))?;
        let tx = client
            .transaction()
            .await
            .map_err(|e| StoreError::Database(e.to_string()))?;

        let summary_embedding = Vector::from(summary_embedding.to_vec());
        tx.execute(
            "UPDATE documents SET title = $2, metadata = $3, summary = $4, \
             summary_embedding = $5, content_hash = $6, updated_at = now() WHERE id = $1",
            &[
                &document_id,
                &title,
                metadata,
                &summary,
                &summary_embedding,
                &new_content_hash,
            ],
        )
        .await
        .map_err(|e| StoreError::Database(e.to_string()))?;

        tx.execute("DELETE FROM chunks WHERE document_id = $1", &[&document_id])
            .await
            .map_err(|e| StoreError::Database(e.to_string()))?;

        for chunk in chunks {
            let embedding = chunk.embedding.clone().map(Vector::from);
            tx.execute(
                "INSERT INTO chunks (id, document_id, chunk_index, content, embedding) \
                 VALUES ($1,$2,$3,$4,$5)",
                &[
                    &chunk.id,
                    &document_id,
                    &chunk.chunk_index,
                    &chunk.content,
                    &embedding,
                ],
            )
            .await
            .map_err(|e| StoreError::Database(e.to_string()))?;
        }

        tx.commit()
            .await
            .map_err(|e| StoreError::Database(e.to_string()))?;
        Ok(())
    }

    pub async fn count_chunks_for_user(&self, user_id: &str) -> Result<u64, StoreError> {
        let client = self
            .pool
            .get()
            .await
            .map_err(|e| StoreError::Database(e.to_string()))?;
        let row = client
            .query_one(
                "SELECT COUNT(*) FROM chunks c JOIN documents d ON d.id = c.document_id \
                 JOIN search_spaces s ON s.id = d.search_space_id WHERE s.user_id = $1",
                &[&user_id],
            )
            .await
            .map_err(|e| StoreError::Database(e.to_string()))?;
        let count: i64 = row.get(0);
        Ok(count as u64)
    }

    pub async fn hybrid_search_chunks(
        &self,
        search_space_id: Uuid,
        query_embedding: &[f32],
        lexical_query: &str,
        document_types: Option<&[DocumentType]>,
        dense_weight: f32,
        lexical_weight: f32,
        limit: i64,
    ) -> Result<Vec<(Chunk, Document, f32)>, StoreError> {
        let client = self
            .pool
            .get()
            .await
            .map_err(|e| StoreError::Database(e.to_string()))?;

        let type_filter: Vec<&'static str> = document_types
            .map(|ts| ts.iter().map(|t| t.as_str()).collect())
            .unwrap_or_default();
        let query_embedding = Vector::from(query_embedding.to_vec());

        let rows = client
            .query(
                "SELECT c.id, c.document_id, c.chunk_index, c.content, c.embedding, \
                 d.id, d.search_space_id, d.document_type, d.title, d.metadata, d.summary, \
                 d.summary_embedding, d.content_hash, d.unique_identifier_hash, d.connector_id, \
                 d.created_at, d.updated_at, \
                 ($5::float4 * (1 - (c.embedding <=> $2))) + \
                 ($6::float4 * ts_rank_cd(to_tsvector('english', c.content), plainto_tsquery('english', $3))) \
                 AS score \
                 FROM chunks c JOIN documents d ON d.id = c.document_id \
                 WHERE d.search_space_id = $1 \
                 AND ($4::text[] IS NULL OR d.document_type = ANY($4)) \
                 ORDER BY score DESC LIMIT $7",
                &[
                    &search_space_id,
                    &query_embedding,
                    &lexical_query,
                    &if type_filter.is_empty() { None } else { Some(&type_filter) },
                    &dense_weight,
                    &lexical_weight,
                    &limit,
                ],
            )
            .await
            .map_err(|e| StoreError::Database(e.to_string()))?;

        rows.iter()
            .map(|row| {
                let chunk = Chunk {
                    id: row.get(0),
                    document_id: row.get(1),
                    chunk_index: row.get(2),
                    content: row.get(3),
                    embedding: row.get::<_, Option<Vector>>(4).map(Vector::to_vec),
                };
                let doc = document_from_offset(row, 5)?;
                let score: f32 = row.get(17);
                Ok((chunk, doc, score))
            })
            .collect()
    }

    pub async fn get_connector(&self, connector_id: Uuid) -> Result<SearchSourceConnector, StoreError> {
        let client = self
            .pool
            .get()
            .await
            .map_err(|e| StoreError::Database(e.to_string()))?;
        let row = client
            .query_opt(
                "SELECT id, user_id, search_space_id, connector_type, config, last_indexed_at, \
                 cursor, created_at FROM search_source_connectors WHERE id = $1",
                &[&connector_id],
            )
            .await
            .map_err(|e| StoreError::Database(e.to_string()))?
            .ok_or_else(|| StoreError::ConnectorNotFound {
                id: connector_id.to_string(),
            })?;

        Ok(SearchSourceConnector {
            id: row.get(0),
            user_id: row.get(1),
            search_space_id: row.get(2),
            connector_type: serde_json::from_value(Value::String(row.get::<_, String>(3)))
                .map_err(StoreError::Serialization)?,
            config: row.get(4),
            last_indexed_at: row.get(5),
            cursor: row.get(6),
            created_at: row.get(7),
        })
    }

    /// List connector descriptors for a user within one search space, omitting `config` so
    /// credential material never rides along with a listing call.
    pub async fn list_connectors(
        &self,
        user_id: &str,
        search_space_id: Uuid,
    ) -> Result<Vec<ConnectorDescriptor>, StoreError> {
        let client = self
            .pool
            .get()
            .await
            .map_err(|e| StoreError::Database(e.to_string()))?;
        let rows = client
            .query(
                "SELECT id, search_space_id, connector_type, last_indexed_at, cursor, created_at \
                 FROM search_source_connectors WHERE user_id = $1 AND search_space_id = $2 \
                 ORDER BY created_at",
                &[&user_id, &search_space_id],
            )
            .await
            .map_err(|e| StoreError::Database(e.to_string()))?;

        rows.iter()
            .map(|row| {
                Ok(ConnectorDescriptor {
                    id: row.get(0),
                    search_space_id: row.get(1),
                    connector_type: serde_json::from_value(Value::String(row.get::<_, String>(2)))
                        .map_err(StoreError::Serialization)?,
                    last_indexed_at: row.get(3),
                    has_cursor: row.get::<_, Option<String>>(4).is_some(),
                    created_at: row.get(5),
                })
            })
            .collect()
    }

    /// Update the cursor and `last_indexed_at` only; called after a successful run. A fatal
    /// run failure must never call this, leaving the previous cursor in place.
    pub async fn advance_connector_cursor(
        &self,
        connector_id: Uuid,
        new_cursor: Option<&str>,
        indexed_at: DateTime<Utc>,
    ) -> Result<(), StoreError> {
        let client = self
            .pool
            .get()
            .await
            .map_err(|e| StoreError::Database(e.to_string()))?;
        client
            .execute(
                "UPDATE search_source_connectors SET cursor = $2, last_indexed_at = $3 WHERE id = $1",
                &[&connector_id, &new_cursor, &indexed_at],
            )
            .await
            .map_err(|e| StoreError::Database(e.to_string()))?;
        Ok(())
    }

    /// Row-locks a connector (`SELECT ... FOR UPDATE`), runs `refresh` against the locked row,
    /// merges the returned patch into `config`, and commits — all in one transaction, so
    /// concurrent `refresh_credentials` calls for the same connector serialize on the row lock
    /// rather than racing to merge stale reads into `config`.
    pub async fn refresh_connector_credentials<F, Fut>(
        &self,
        connector_id: Uuid,
        refresh: F,
    ) -> Result<(), StoreError>
    where
        F: FnOnce(SearchSourceConnector) -> Fut,
        Fut: std::future::Future<Output = Result<Value, StoreError>>,
    {
        let mut client = self
            .pool
            .get()
            .await
            .map_err(|e| StoreError::Database(e.to_string()))?;
        let tx = client
            .transaction()
            .await
            .map_err(|e| StoreError::Database(e.to_string()))?;

        let row = tx
            .query_opt(
                "SELECT id, user_id, search_space_id, connector_type, config, last_indexed_at, \
                 cursor, created_at FROM search_source_connectors WHERE id = $1 FOR UPDATE",
                &[&connector_id],
            )
            .await
            .map_err(|e| StoreError::Database(e.to_string()))?
            .ok_or_else(|| StoreError::ConnectorNotFound {
                id: connector_id.to_string(),
            })?;

        let connector = SearchSourceConnector {
            id: row.get(0),
            user_id: row.get(1),
            search_space_id: row.get(2),
            connector_type: serde_json::from_value(Value::String(row.get::<_, String>(3)))
                .map_err(StoreError::Serialization)?,
            config: row.get(4),
            last_indexed_at: row.get(5),
            cursor: row.get(6),
            created_at: row.get(7),
        };

        let patch = refresh(connector).await?;

        tx.execute(
            "UPDATE search_source_connectors SET config = config || $2 WHERE id = $1",
            &[&connector_id, &patch],
        )
        .await
        .map_err(|e| StoreError::Database(e.to_string()))?;

        tx.commit()
            .await
            .map_err(|e| StoreError::Database(e.to_string()))?;
        Ok(())
    }

    pub async fn insert_chat_message(&self, msg: &ChatMessageRecord) -> Result<(), StoreError> {
        let client = self
            .pool
            .get()
            .await
            .map_err(|e| StoreError::Database(e.to_string()))?;
        let role = match msg.role {
            ChatRole::User => "user",
            ChatRole::Assistant => "assistant",
            ChatRole::Tool => "tool",
        };
        client
            .execute(
                "INSERT INTO chat_messages (id, thread_id, role, content, citations, created_at) \
                 VALUES ($1,$2,$3,$4,$5,$6)",
                &[
                    &msg.id,
                    &msg.thread_id,
                    &role,
                    &msg.content,
                    &msg.citations,
                    &msg.created_at,
                ],
            )
            .await
            .map_err(|e| StoreError::Database(e.to_string()))?;
        Ok(())
    }

    pub async fn create_thread(&self, thread: &Thread) -> Result<(), StoreError> {
        let client = self
            .pool
            .get()
            .await
            .map_err(|e| StoreError::Database(e.to_string()))?;
        client
            .execute(
                "INSERT INTO threads (id, search_space_id, title, created_at) VALUES ($1,$2,$3,$4)",
                &[&thread.id, &thread.search_space_id, &thread.title, &thread.created_at],
            )
            .await
            .map_err(|e| StoreError::Database(e.to_string()))?;
        Ok(())
    }

    pub async fn insert_report(&self, report: &Report) -> Result<(), StoreError> {
        let client = self
            .pool
            .get()
            .await
            .map_err(|e| StoreError::Database(e.to_string()))?;
        client
            .execute(
                "INSERT INTO reports (id, report_group_id, search_space_id, title, content, created_at) \
                 VALUES ($1,$2,$3,$4,$5,$6)",
                &[
                    &report.id,
                    &report.report_group_id,
                    &report.search_space_id,
                    &report.title,
                    &report.content,
                    &report.created_at,
                ],
            )
            .await
            .map_err(|e| StoreError::Database(e.to_string()))?;
        Ok(())
    }

    pub async fn get_report(&self, id: Uuid) -> Result<Report, StoreError> {
        let client = self
            .pool
            .get()
            .await
            .map_err(|e| StoreError::Database(e.to_string()))?;
        let row = client
            .query_opt(
                "SELECT id, report_group_id, search_space_id, title, content, created_at \
                 FROM reports WHERE id = $1",
                &[&id],
            )
            .await
            .map_err(|e| StoreError::Database(e.to_string()))?
            .ok_or_else(|| StoreError::DocumentNotFound { id: id.to_string() })?;
        Ok(Report {
            id: row.get(0),
            report_group_id: row.get(1),
            search_space_id: row.get(2),
            title: row.get(3),
            content: row.get(4),
            created_at: row.get(5),
        })
    }

    pub async fn insert_podcast(&self, podcast: &Podcast) -> Result<(), StoreError> {
        let client = self
            .pool
            .get()
            .await
            .map_err(|e| StoreError::Database(e.to_string()))?;
        let status = podcast_status_str(podcast.status);
        client
            .execute(
                "INSERT INTO podcasts (id, search_space_id, title, status, audio_location, created_at) \
                 VALUES ($1,$2,$3,$4,$5,$6)",
                &[
                    &podcast.id,
                    &podcast.search_space_id,
                    &podcast.title,
                    &status,
                    &podcast.audio_location,
                    &podcast.created_at,
                ],
            )
            .await
            .map_err(|e| StoreError::Database(e.to_string()))?;
        Ok(())
    }

    pub async fn update_podcast_status(
        &self,
        id: Uuid,
        status: PodcastStatus,
        audio_location: Option<&str>,
    ) -> Result<(), StoreError> {
        let client = self
            .pool
            .get()
            .await
            .map_err(|e| StoreError::Database(e.to_string()))?;
        client
            .execute(
                "UPDATE podcasts SET status = $2, audio_location = $3 WHERE id = $1",
                &[&id, &podcast_status_str(status), &audio_location],
            )
            .await
            .map_err(|e| StoreError::Database(e.to_string()))?;
        Ok(())
    }
}

fn podcast_status_str(status: PodcastStatus) -> &'static str {
    match status {
        PodcastStatus::Pending => "PENDING",
        PodcastStatus::Generating => "GENERATING",
        PodcastStatus::Ready => "READY",
        PodcastStatus::Failed => "FAILED",
    }
}

fn document_from_row(row: &tokio_postgres::Row) -> Result<Document, StoreError> {
    document_from_offset(row, 0)
}

fn document_from_offset(row: &tokio_postgres::Row, offset: usize) -> Result<Document, StoreError> {
    let type_str: String = row.get(offset + 2);
    Ok(Document {
        id: row.get(offset),
        search_space_id: row.get(offset + 1),
        document_type: document_type_from_str(&type_str),
        title: row.get(offset + 3),
        metadata: row.get(offset + 4),
        summary: row.get(offset + 5),
        summary_embedding: row.get::<_, Option<Vector>>(offset + 6).map(Vector::to_vec),
        content_hash: row.get(offset + 7),
        unique_identifier_hash: row.get(offset + 8),
        connector_id: row.get(offset + 9),
        created_at: row.get(offset + 10),
        updated_at: row.get(offset + 11),
    })
}

fn document_type_from_str(s: &str) -> DocumentType {
    use DocumentType::*;
    match s {
        "CRAWLED_URL" => CrawledUrl,
        "FILE" => File,
        "EXTENSION" => Extension,
        "YOUTUBE_VIDEO" => YoutubeVideo,
        "SLACK_CONNECTOR" => Slack,
        "NOTION_CONNECTOR" => Notion,
        "GITHUB_CONNECTOR" => Github,
        "LINEAR_CONNECTOR" => Linear,
        "JIRA_CONNECTOR" => Jira,
        "DISCORD_CONNECTOR" => Discord,
        "CONFLUENCE_CONNECTOR" => Confluence,
        "CLICKUP_CONNECTOR" => Clickup,
        "GMAIL_CONNECTOR" => Gmail,
        "GOOGLE_CALENDAR_CONNECTOR" => GoogleCalendar,
        "GOOGLE_DRIVE_CONNECTOR" => GoogleDriveFile,
        "AIRTABLE_CONNECTOR" => Airtable,
        "LUMA_CONNECTOR" => Luma,
        _ => Circleback,
    }
}

/// Document-type discriminant string, re-exported here so ingestion doesn't depend on the
/// repository's row-mapping internals.
pub fn document_type_tag(doc_type: DocumentType) -> &'static str {
    doc_type.as_str()
}
