//! Shared paged-source pattern backing Slack, Discord, Notion, Jira, Confluence, and GitHub:
//! each connector supplies a `fetch_page` closure around its own REST client plus a
//! `canonicalize_unit` callback, and this helper owns pagination, heartbeat emission, and
//! per-item failure isolation identically across all of them.

use std::future::Future;
use std::pin::Pin;
use std::time::Duration;

use chrono::{DateTime, Utc};
use tokio_util::sync::CancellationToken;
use tracing::info;

use crate::error::ConnectorError;
use crate::ingestion::CanonicalDocument;

use super::FetchWindow;

const HEARTBEAT_INTERVAL: Duration = Duration::from_secs(30);

/// One page of raw, source-native units plus the opaque token to fetch the next page (`None`
/// when this was the last page).
pub struct Page<T> {
    pub units: Vec<T>,
    pub next_page_token: Option<String>,
}

type FetchPageFuture<T> = Pin<Box<dyn Future<Output = Result<Page<T>, ConnectorError>> + Send>>;

/// Drives pagination for a connector whose raw unit type is `T`, converting each unit to a
/// [`CanonicalDocument`] and isolating per-unit conversion failures from the overall run.
///
/// `fetch_page` takes an owned page token (rather than a borrow) so implementations can box a
/// future that owns its captures without fighting the borrow checker over cursor lifetimes.
pub async fn run_paged_source<T, FetchFn, ConvertFn>(
    cursor: Option<&str>,
    window: (DateTime<Utc>, DateTime<Utc>),
    cancel: CancellationToken,
    mut fetch_page: FetchFn,
    convert: ConvertFn,
) -> Result<FetchWindow, ConnectorError>
where
    FetchFn: FnMut(Option<String>, (DateTime<Utc>, DateTime<Utc>)) -> FetchPageFuture<T>,
    ConvertFn: Fn(&T) -> Option<CanonicalDocument>,
{
    let mut items = Vec::new();
    let mut page_token = cursor.map(str::to_string);
    let mut last_heartbeat = std::time::Instant::now();

    loop {
        if cancel.is_cancelled() {
            return Err(ConnectorError::Cancelled);
        }

        let page = fetch_page(page_token.clone(), window).await?;

        for unit in &page.units {
            match convert(unit) {
                Some(doc) => items.push(doc),
                None => continue, // private/inaccessible unit: skip, not fatal (§4.1)
            }
        }

        if last_heartbeat.elapsed() >= HEARTBEAT_INTERVAL {
            info!(items = items.len(), "connector sync heartbeat");
            last_heartbeat = std::time::Instant::now();
        }

        page_token = page.next_page_token;
        if page_token.is_none() {
            break;
        }
    }

    Ok(FetchWindow {
        items,
        next_cursor: Some(Utc::now().to_rfc3339()),
        fatal: false,
    })
}
