//! Connector registry & scheduler (C5): owns per-user per-source connector records and drives
//! delta-sync runs against them.

pub mod credentials;
pub mod github;
pub mod google_drive;
pub mod paged;
pub mod slack_like;

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Duration as ChronoDuration, Utc};
use governor::{Quota, RateLimiter};
use governor::clock::DefaultClock;
use governor::state::{InMemoryState, NotKeyed};
use nonzero_ext::nonzero;
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

use credentials::TokenCipher;

use crate::error::ConnectorError;
use crate::ingestion::CanonicalDocument;
use crate::store::{ConnectorType, Repository, SearchSourceConnector};
use crate::tasklog::TaskLog;

/// A single fetch of new/changed items, plus the opaque cursor to resume from next time.
pub struct FetchWindow {
    pub items: Vec<CanonicalDocument>,
    pub next_cursor: Option<String>,
    /// True when a fatal error aborted the window before it finished; the caller must not
    /// advance the connector's cursor.
    pub fatal: bool,
}

/// The uniform contract every connector implements.
#[async_trait]
pub trait SourceCapability: Send + Sync {
    fn connector_type(&self) -> ConnectorType;

    async fn fetch_window(
        &self,
        cursor: Option<&str>,
        window: (DateTime<Utc>, DateTime<Utc>),
        cancel: CancellationToken,
    ) -> Result<FetchWindow, ConnectorError>;
}

/// Resolve the [start, end] fetch window per the uniform date-window rules (§4.1): explicit
/// dates win; otherwise derive from the connector's cursor clamped to a lookback window.
pub fn resolve_window(
    start_date: Option<DateTime<Utc>>,
    end_date: Option<DateTime<Utc>>,
    last_indexed_at: Option<DateTime<Utc>>,
    lookback_days: i64,
) -> (DateTime<Utc>, DateTime<Utc>) {
    let now = Utc::now();
    let end = end_date.unwrap_or(now);
    let start = start_date.unwrap_or_else(|| {
        let floor = now - ChronoDuration::days(lookback_days);
        match last_indexed_at {
            Some(cursor) if cursor <= now && cursor >= floor => cursor,
            _ => floor,
        }
    });
    (start, end)
}

/// Options for a single connector run.
#[derive(Debug, Clone, Default)]
pub struct RunOptions {
    pub start_date: Option<DateTime<Utc>>,
    pub end_date: Option<DateTime<Utc>>,
    pub update_cursor: bool,
}

/// Outcome of one connector run, for TaskLog and caller reporting.
#[derive(Debug, Clone, Default)]
pub struct RunReport {
    pub documents_indexed: usize,
    pub documents_skipped: usize,
    pub documents_updated: usize,
    pub items_failed: usize,
}

/// Registry of configured connectors and their runtime capabilities, built once per process
/// from the persisted `SearchSourceConnector` rows.
pub struct ConnectorRegistry {
    repo: Arc<Repository>,
    tasklog: Arc<TaskLog>,
    ingestion: Arc<crate::ingestion::IngestionPipeline>,
    capabilities: HashMap<Uuid, Arc<dyn SourceCapability>>,
    limiters: HashMap<Uuid, Arc<RateLimiter<NotKeyed, InMemoryState, DefaultClock>>>,
    lookback_days: i64,
    http: reqwest::Client,
    cipher: Arc<TokenCipher>,
}

impl ConnectorRegistry {
    pub fn new(
        repo: Arc<Repository>,
        tasklog: Arc<TaskLog>,
        ingestion: Arc<crate::ingestion::IngestionPipeline>,
        lookback_days: i64,
        secret_key: &secrecy::SecretString,
    ) -> Self {
        Self {
            repo,
            tasklog,
            ingestion,
            capabilities: HashMap::new(),
            limiters: HashMap::new(),
            lookback_days,
            http: reqwest::Client::new(),
            cipher: Arc::new(TokenCipher::new(secret_key)),
        }
    }

    /// Register a capability for a connector id, with a requests-per-second rate limit.
    pub fn register(&mut self, connector_id: Uuid, capability: Arc<dyn SourceCapability>, rps: u32) {
        self.capabilities.insert(connector_id, capability);
        let quota = Quota::per_second(std::num::NonZeroU32::new(rps.max(1)).unwrap_or(nonzero!(1u32)));
        self.limiters
            .insert(connector_id, Arc::new(RateLimiter::direct(quota)));
    }

    /// List the connectors configured for a user within one search space.
    pub async fn list_connectors(
        &self,
        user_id: &str,
        search_space_id: Uuid,
    ) -> Result<Vec<crate::store::ConnectorDescriptor>, ConnectorError> {
        self.repo
            .list_connectors(user_id, search_space_id)
            .await
            .map_err(|e| ConnectorError::TransientUpstream(e.to_string()))
    }

    /// Idempotent OAuth credential refresh for a connector: row-locks the connector, performs
    /// the OAuth2 refresh-token grant, and atomically merges the re-encrypted fields into
    /// `config`. `invalid_grant` (or an equivalently revoked/expired refresh token) from the
    /// provider surfaces as `ConnectorError::AuthExpired`, user-actionable re-authentication.
    pub async fn refresh_credentials(&self, connector_id: Uuid) -> Result<(), ConnectorError> {
        let http = self.http.clone();
        let cipher = self.cipher.clone();

        let result = self
            .repo
            .refresh_connector_credentials(connector_id, move |connector| async move {
                credentials::refresh_oauth_credentials(&http, &connector, &cipher)
                    .await
                    .map_err(crate::error::StoreError::Database)
            })
            .await;

        result.map_err(|e| match e {
            crate::error::StoreError::ConnectorNotFound { id } => ConnectorError::NotFound { id },
            crate::error::StoreError::Database(msg) => {
                let lower = msg.to_lowercase();
                if lower.contains("invalid_grant") || lower.contains("token has been expired or revoked") {
                    ConnectorError::AuthExpired {
                        id: connector_id.to_string(),
                    }
                } else {
                    ConnectorError::TransientUpstream(msg)
                }
            }
            other => ConnectorError::TransientUpstream(other.to_string()),
        })
    }

    pub async fn run_connector(
        &self,
        connector_id: Uuid,
        options: RunOptions,
        cancel: CancellationToken,
    ) -> Result<RunReport, ConnectorError> {
        let connector = self.repo.get_connector(connector_id).await.map_err(|_| {
            ConnectorError::NotFound {
                id: connector_id.to_string(),
            }
        })?;
        let capability = self
            .capabilities
            .get(&connector_id)
            .ok_or_else(|| ConnectorError::NotFound {
                id: connector_id.to_string(),
            })?
            .clone();
        let limiter = self.limiters.get(&connector_id).cloned();

        self.tasklog
            .log_start("connector_run", connector.connector_type_label())
            .await
            .ok();

        let window = resolve_window(
            options.start_date,
            options.end_date,
            connector.last_indexed_at,
            self.lookback_days,
        );

        let mut report = RunReport::default();
        let mut cursor = connector.cursor.clone();

        loop {
            if cancel.is_cancelled() {
                return Err(ConnectorError::Cancelled);
            }
            if let Some(limiter) = &limiter {
                limiter.until_ready().await;
            }

            let fetched = capability
                .fetch_window(cursor.as_deref(), window, cancel.clone())
                .await?;

            if fetched.fatal {
                self.tasklog
                    .log_failure(
                        "connector_run",
                        connector.connector_type_label(),
                        "FetchError",
                        serde_json::json!({ "connector_id": connector_id.to_string() }),
                    )
                    .await
                    .ok();
                return Err(ConnectorError::TransientUpstream(
                    "fetch window reported a fatal error".to_string(),
                ));
            }

            for mut item in fetched.items {
                let rename_only = item.metadata.remove("rename_only").is_some();

                if rename_only {
                    // Google Drive's rename-only path: update title/metadata only, never
                    // touching summary/chunks/embeddings (§4.1, invariant 2).
                    let uid = item.source_id.as_deref().map(|sid| {
                        crate::store::unique_identifier_hash(
                            document_type_for(connector.connector_type).as_str(),
                            sid,
                            connector.search_space_id,
                        )
                    });
                    let existing = match uid {
                        Some(uid) => self
                            .repo
                            .resolve_ingest(connector.search_space_id, "", Some(&uid))
                            .await
                            .ok(),
                        None => None,
                    };
                    match existing {
                        Some(crate::store::IngestLookup::UpdateInPlace(doc))
                        | Some(crate::store::IngestLookup::Unchanged(doc)) => {
                            match self
                                .ingestion
                                .update_metadata_only(doc.id, &item.title, &item.metadata)
                                .await
                            {
                                Ok(()) => report.documents_updated += 1,
                                Err(_) => report.items_failed += 1,
                            }
                        }
                        _ => report.items_failed += 1,
                    }
                    continue;
                }

                match self
                    .ingestion
                    .ingest(connector.search_space_id, document_type_for(connector.connector_type), item)
                    .await
                {
                    Ok(outcome) => match outcome {
                        crate::ingestion::IngestOutcome::Inserted(_) => report.documents_indexed += 1,
                        crate::ingestion::IngestOutcome::Updated(_) => report.documents_updated += 1,
                        crate::ingestion::IngestOutcome::Unchanged(_) => report.documents_skipped += 1,
                    },
                    Err(_) => report.items_failed += 1,
                }
            }

            cursor = fetched.next_cursor;
            if cursor.is_none() {
                break;
            }
        }

        if options.update_cursor {
            self.repo
                .advance_connector_cursor(connector_id, cursor.as_deref(), Utc::now())
                .await
                .map_err(|e| ConnectorError::TransientUpstream(e.to_string()))?;
        }

        self.tasklog
            .log_success(
                "connector_run",
                connector.connector_type_label(),
                serde_json::json!({
                    "documents_indexed": report.documents_indexed,
                    "documents_updated": report.documents_updated,
                    "documents_skipped": report.documents_skipped,
                    "items_failed": report.items_failed,
                }),
            )
            .await
            .ok();

        Ok(report)
    }
}

fn document_type_for(connector_type: ConnectorType) -> crate::store::DocumentType {
    use crate::store::DocumentType as D;
    match connector_type {
        ConnectorType::Slack => D::Slack,
        ConnectorType::Notion => D::Notion,
        ConnectorType::Github => D::Github,
        ConnectorType::Linear => D::Linear,
        ConnectorType::Jira => D::Jira,
        ConnectorType::Discord => D::Discord,
        ConnectorType::Confluence => D::Confluence,
        ConnectorType::Clickup => D::Clickup,
        ConnectorType::Gmail => D::Gmail,
        ConnectorType::GoogleCalendar => D::GoogleCalendar,
        ConnectorType::GoogleDrive => D::GoogleDriveFile,
        ConnectorType::Airtable => D::Airtable,
        ConnectorType::Luma => D::Luma,
        ConnectorType::Circleback => D::Circleback,
        ConnectorType::Mcp => D::Extension,
    }
}

trait ConnectorLabel {
    fn connector_type_label(&self) -> &'static str;
}

impl ConnectorLabel for SearchSourceConnector {
    fn connector_type_label(&self) -> &'static str {
        match self.connector_type {
            ConnectorType::Slack => "slack",
            ConnectorType::Notion => "notion",
            ConnectorType::Github => "github",
            ConnectorType::Linear => "linear",
            ConnectorType::Jira => "jira",
            ConnectorType::Discord => "discord",
            ConnectorType::Confluence => "confluence",
            ConnectorType::Clickup => "clickup",
            ConnectorType::Gmail => "gmail",
            ConnectorType::GoogleCalendar => "google_calendar",
            ConnectorType::GoogleDrive => "google_drive",
            ConnectorType::Airtable => "airtable",
            ConnectorType::Luma => "luma",
            ConnectorType::Circleback => "circleback",
            ConnectorType::Mcp => "mcp",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn resolve_window_uses_explicit_dates_verbatim() {
        let start = Utc::now() - ChronoDuration::days(3);
        let end = Utc::now();
        let (s, e) = resolve_window(Some(start), Some(end), None, 365);
        assert_eq!(s, start);
        assert_eq!(e, end);
    }

    #[test]
    fn resolve_window_falls_back_to_lookback_with_no_cursor() {
        let (start, end) = resolve_window(None, None, None, 30);
        assert!((end - start).num_days() >= 29);
    }

    #[test]
    fn resolve_window_clamps_future_cursor() {
        let future = Utc::now() + ChronoDuration::days(10);
        let (start, end) = resolve_window(None, None, Some(future), 365);
        assert!(start < end);
        assert_ne!(start, future);
    }

    #[test]
    fn resolve_window_uses_cursor_when_within_lookback() {
        let cursor = Utc::now() - ChronoDuration::days(5);
        let (start, _end) = resolve_window(None, None, Some(cursor), 365);
        assert_eq!(start, cursor);
    }
}
