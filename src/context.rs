//! Per-call context threaded through tool execution and connector runs.

use std::sync::Arc;

use tokio_util::sync::CancellationToken;
use uuid::Uuid;

use crate::config::Services;

/// Context handed to every tool invocation and connector run.
///
/// Carries the scoping identifiers (user, search-space), the shared service handles, and a
/// cancellation token so long-running work can be aborted without leaving partial state.
#[derive(Clone)]
pub struct JobContext {
    pub user_id: String,
    pub search_space_id: Uuid,
    pub services: Arc<Services>,
    pub cancellation: CancellationToken,
}

impl JobContext {
    pub fn new(user_id: impl Into<String>, search_space_id: Uuid, services: Arc<Services>) -> Self {
        Self {
            user_id: user_id.into(),
            search_space_id,
            services,
            cancellation: CancellationToken::new(),
        }
    }

    pub fn child_token(&self) -> CancellationToken {
        self.cancellation.child_token()
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancellation.is_cancelled()
    }
}
