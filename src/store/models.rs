//! Persisted data model: documents, chunks, connectors, chats, reports, podcasts, task log.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// One value per connector kind plus the direct-ingest kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum DocumentType {
    CrawledUrl,
    File,
    Extension,
    YoutubeVideo,
    Slack,
    Notion,
    Github,
    Linear,
    Jira,
    Discord,
    Confluence,
    Clickup,
    Gmail,
    GoogleCalendar,
    GoogleDriveFile,
    Airtable,
    Luma,
    Circleback,
}

impl DocumentType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::CrawledUrl => "CRAWLED_URL",
            Self::File => "FILE",
            Self::Extension => "EXTENSION",
            Self::YoutubeVideo => "YOUTUBE_VIDEO",
            Self::Slack => "SLACK_CONNECTOR",
            Self::Notion => "NOTION_CONNECTOR",
            Self::Github => "GITHUB_CONNECTOR",
            Self::Linear => "LINEAR_CONNECTOR",
            Self::Jira => "JIRA_CONNECTOR",
            Self::Discord => "DISCORD_CONNECTOR",
            Self::Confluence => "CONFLUENCE_CONNECTOR",
            Self::Clickup => "CLICKUP_CONNECTOR",
            Self::Gmail => "GMAIL_CONNECTOR",
            Self::GoogleCalendar => "GOOGLE_CALENDAR_CONNECTOR",
            Self::GoogleDriveFile => "GOOGLE_DRIVE_CONNECTOR",
            Self::Airtable => "AIRTABLE_CONNECTOR",
            Self::Luma => "LUMA_CONNECTOR",
            Self::Circleback => "CIRCLEBACK_CONNECTOR",
        }
    }
}

impl std::fmt::Display for DocumentType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// An ingested item, the unit of retrieval at document granularity.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Document {
    pub id: Uuid,
    pub search_space_id: Uuid,
    pub document_type: DocumentType,
    pub title: String,
    pub metadata: serde_json::Value,
    pub summary: String,
    pub summary_embedding: Option<Vec<f32>>,
    pub content_hash: String,
    pub unique_identifier_hash: Option<String>,
    pub connector_id: Option<Uuid>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// A semantic fragment of a document's body.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Chunk {
    pub id: Uuid,
    pub document_id: Uuid,
    pub chunk_index: i32,
    pub content: String,
    pub embedding: Option<Vec<f32>>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ConnectorType {
    Slack,
    Notion,
    Github,
    Linear,
    Jira,
    Discord,
    Confluence,
    Clickup,
    Gmail,
    GoogleCalendar,
    GoogleDrive,
    Airtable,
    Luma,
    Circleback,
    Mcp,
}

/// Per-user configuration for one external source.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchSourceConnector {
    pub id: Uuid,
    pub user_id: String,
    pub search_space_id: Uuid,
    pub connector_type: ConnectorType,
    /// Opaque config blob; sensitive fields are individually encrypted when
    /// `_token_encrypted` is set true within it.
    pub config: serde_json::Value,
    pub last_indexed_at: Option<DateTime<Utc>>,
    pub cursor: Option<String>,
    pub created_at: DateTime<Utc>,
}

/// Summary view of a connector for listing, deliberately omitting `config` so credential
/// material never rides along with a listing call.
#[derive(Debug, Clone, Serialize)]
pub struct ConnectorDescriptor {
    pub id: Uuid,
    pub search_space_id: Uuid,
    pub connector_type: ConnectorType,
    pub last_indexed_at: Option<DateTime<Utc>>,
    pub has_cursor: bool,
    pub created_at: DateTime<Utc>,
}

impl From<&SearchSourceConnector> for ConnectorDescriptor {
    fn from(connector: &SearchSourceConnector) -> Self {
        Self {
            id: connector.id,
            search_space_id: connector.search_space_id,
            connector_type: connector.connector_type,
            last_indexed_at: connector.last_indexed_at,
            has_cursor: connector.cursor.is_some(),
            created_at: connector.created_at,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChatRole {
    User,
    Assistant,
    Tool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatMessageRecord {
    pub id: Uuid,
    pub thread_id: Uuid,
    pub role: ChatRole,
    pub content: String,
    pub citations: Vec<Uuid>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Thread {
    pub id: Uuid,
    pub search_space_id: Uuid,
    pub title: Option<String>,
    pub created_at: DateTime<Utc>,
}

/// A generated report, revisioned via `report_group_id` lineage.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Report {
    pub id: Uuid,
    pub report_group_id: Uuid,
    pub search_space_id: Uuid,
    pub title: String,
    pub content: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PodcastStatus {
    Pending,
    Generating,
    Ready,
    Failed,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Podcast {
    pub id: Uuid,
    pub search_space_id: Uuid,
    pub title: String,
    pub status: PodcastStatus,
    pub audio_location: Option<String>,
    pub created_at: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn document_type_strings_are_stable() {
        assert_eq!(DocumentType::GoogleDriveFile.as_str(), "GOOGLE_DRIVE_CONNECTOR");
        assert_eq!(DocumentType::YoutubeVideo.as_str(), "YOUTUBE_VIDEO");
    }
}
