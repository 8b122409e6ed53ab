//! Paged REST connectors built directly on [`super::paged::run_paged_source`]: Slack, Discord,
//! Notion, Confluence, and Jira each page through their source and canonicalize one unit
//! (a channel window, a page, an issue+comments) at a time.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Deserialize;
use tokio_util::sync::CancellationToken;

use crate::error::ConnectorError;
use crate::ingestion::CanonicalDocument;
use crate::store::ConnectorType;

use super::paged::{run_paged_source, Page};
use super::{FetchWindow, SourceCapability};

/// A generic JSON unit fetched from a REST API: enough fields for any of the paged sources
/// below to build a canonical document without a dedicated struct per vendor.
#[derive(Debug, Clone, Deserialize)]
pub struct RestUnit {
    pub id: String,
    pub title: String,
    pub body: String,
    #[serde(default)]
    pub url: Option<String>,
    #[serde(default)]
    pub author: Option<String>,
    #[serde(default)]
    pub accessible: bool,
}

/// Shared REST-paged connector; `base_url` + `bearer_token` select the vendor, `connector_type`
/// picks the document-type tag and unit terminology used in canonicalization.
pub struct RestPagedConnector {
    pub connector_type: ConnectorType,
    pub client: reqwest::Client,
    pub base_url: String,
    pub bearer_token: secrecy::SecretString,
}

impl RestPagedConnector {
    pub fn new(
        connector_type: ConnectorType,
        base_url: impl Into<String>,
        bearer_token: secrecy::SecretString,
    ) -> Self {
        Self {
            connector_type,
            client: reqwest::Client::new(),
            base_url: base_url.into(),
            bearer_token,
        }
    }

    async fn fetch_page(
        &self,
        page_token: Option<String>,
        window: (DateTime<Utc>, DateTime<Utc>),
    ) -> Result<Page<RestUnit>, ConnectorError> {
        use secrecy::ExposeSecret;

        #[derive(Deserialize)]
        struct PageResponse {
            units: Vec<RestUnit>,
            next_page_token: Option<String>,
        }

        let response = self
            .client
            .get(&self.base_url)
            .bearer_auth(self.bearer_token.expose_secret())
            .query(&[
                ("since", window.0.to_rfc3339()),
                ("until", window.1.to_rfc3339()),
                ("page_token", page_token.unwrap_or_default()),
            ])
            .send()
            .await
            .map_err(|e| ConnectorError::TransientUpstream(e.to_string()))?;

        if response.status() == reqwest::StatusCode::TOO_MANY_REQUESTS {
            return Err(ConnectorError::RateLimited {
                id: self.base_url.clone(),
                retry_after_secs: 30,
            });
        }
        if response.status() == reqwest::StatusCode::UNAUTHORIZED {
            return Err(ConnectorError::AuthExpired {
                id: self.base_url.clone(),
            });
        }

        let parsed: PageResponse = response
            .json()
            .await
            .map_err(|e| ConnectorError::TransientUpstream(e.to_string()))?;

        Ok(Page {
            units: parsed.units,
            next_page_token: parsed.next_page_token,
        })
    }

    fn canonicalize(&self, unit: &RestUnit) -> Option<CanonicalDocument> {
        if !unit.accessible {
            // Private channel/space the bot isn't a member of: skip, not a failure (§4.1).
            return None;
        }

        let mut doc = CanonicalDocument::new(unit.title.clone(), self.connector_type_tag(), unit.body.clone())
            .with_source_id(unit.id.clone());
        if let Some(url) = &unit.url {
            doc = doc.with_metadata("url", url.clone());
        }
        if let Some(author) = &unit.author {
            doc = doc.with_metadata("author", author.clone());
        }
        Some(doc)
    }

    fn connector_type_tag(&self) -> &'static str {
        match self.connector_type {
            ConnectorType::Slack => "SLACK_CONNECTOR",
            ConnectorType::Discord => "DISCORD_CONNECTOR",
            ConnectorType::Notion => "NOTION_CONNECTOR",
            ConnectorType::Confluence => "CONFLUENCE_CONNECTOR",
            ConnectorType::Jira => "JIRA_CONNECTOR",
            ConnectorType::Clickup => "CLICKUP_CONNECTOR",
            ConnectorType::Airtable => "AIRTABLE_CONNECTOR",
            ConnectorType::Luma => "LUMA_CONNECTOR",
            ConnectorType::Circleback => "CIRCLEBACK_CONNECTOR",
            _ => "EXTENSION",
        }
    }
}

#[async_trait]
impl SourceCapability for RestPagedConnector {
    fn connector_type(&self) -> ConnectorType {
        self.connector_type
    }

    async fn fetch_window(
        &self,
        cursor: Option<&str>,
        window: (DateTime<Utc>, DateTime<Utc>),
        cancel: CancellationToken,
    ) -> Result<FetchWindow, ConnectorError> {
        run_paged_source(
            cursor,
            window,
            cancel,
            |token, win| Box::pin(self.fetch_page(token, win)),
            |unit| self.canonicalize(unit),
        )
        .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn inaccessible_unit_is_skipped_not_failed() {
        let connector = RestPagedConnector::new(
            ConnectorType::Slack,
            "https://example.invalid",
            secrecy::SecretString::from("token".to_string()),
        );
        let unit = RestUnit {
            id: "C1".into(),
            title: "general".into(),
            body: "hi".into(),
            url: None,
            author: None,
            accessible: false,
        };
        assert!(connector.canonicalize(&unit).is_none());
    }

    #[test]
    fn accessible_unit_becomes_canonical_document() {
        let connector = RestPagedConnector::new(
            ConnectorType::Linear,
            "https://example.invalid",
            secrecy::SecretString::from("token".to_string()),
        );
        let unit = RestUnit {
            id: "ENG-1".into(),
            title: "Fix bug".into(),
            body: "details".into(),
            url: Some("https://linear.app/ENG-1".into()),
            author: Some("alice".into()),
            accessible: true,
        };
        let doc = connector.canonicalize(&unit).unwrap();
        assert_eq!(doc.source_id.as_deref(), Some("ENG-1"));
    }
}
