//! Tool wrapper around `jobs::start_podcast_generation`: enqueues background audio synthesis
//! and returns immediately so the caller can poll `podcast_id` for completion.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde_json::{json, Value};

use crate::context::JobContext;
use crate::jobs::{self, JobRunner, PodcastLock};
use crate::store::PodcastStatus;
use crate::tools::tool::{Tool, ToolError, ToolOutput};

pub struct GeneratePodcastTool {
    runner: JobRunner,
    lock: Arc<dyn PodcastLock>,
}

impl GeneratePodcastTool {
    pub fn new(runner: JobRunner, lock: Arc<dyn PodcastLock>) -> Self {
        Self { runner, lock }
    }
}

#[async_trait]
impl Tool for GeneratePodcastTool {
    fn name(&self) -> &str {
        "generate_podcast"
    }

    fn description(&self) -> &str {
        "Generate a podcast from the provided content. Use when the user asks to create, \
         generate, or turn something into a podcast. Only one podcast can generate at a time \
         per search space; a duplicate request while one is in flight is reported back."
    }

    fn parameters_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "source_content": {"type": "string", "description": "The text content to convert into a podcast"},
                "podcast_title": {"type": "string", "description": "Title for the podcast"},
                "user_prompt": {"type": "string", "description": "Optional instructions for podcast style, tone, or format"}
            },
            "required": ["source_content"]
        })
    }

    async fn execute(&self, params: Value, ctx: &JobContext) -> Result<ToolOutput, ToolError> {
        let start = std::time::Instant::now();
        let source_content = params
            .get("source_content")
            .and_then(Value::as_str)
            .ok_or_else(|| ToolError::InvalidParameters("missing 'source_content' parameter".to_string()))?
            .to_string();
        let title = params.get("podcast_title").and_then(Value::as_str).unwrap_or("Research Podcast").to_string();
        let user_prompt = params.get("user_prompt").and_then(Value::as_str).map(str::to_string);

        let outcome = jobs::start_podcast_generation(
            &ctx.services,
            &self.runner,
            &self.lock,
            ctx.search_space_id,
            title.clone(),
            source_content,
            user_prompt,
        )
        .await;

        let result = match outcome {
            Ok(podcast) => json!({
                "status": "PENDING",
                "podcast_id": podcast.id,
                "title": podcast.title,
                "message": "Podcast generation started. This may take a few minutes.",
            }),
            Err(crate::error::JobError::AlreadyGenerating { podcast_id }) => json!({
                "status": "GENERATING",
                "podcast_id": podcast_id,
                "title": title,
                "message": "A podcast is already being generated. Please wait for it to complete.",
            }),
            Err(e) => {
                return Ok(ToolOutput::success(
                    json!({
                        "status": status_str(PodcastStatus::Failed),
                        "error": e.to_string(),
                        "title": title,
                        "podcast_id": Value::Null,
                    }),
                    start.elapsed(),
                ));
            }
        };
        Ok(ToolOutput::success(result, start.elapsed()))
    }

    fn estimated_duration(&self, _params: &Value) -> Option<Duration> {
        Some(Duration::from_millis(500))
    }
}

fn status_str(status: PodcastStatus) -> &'static str {
    match status {
        PodcastStatus::Pending => "PENDING",
        PodcastStatus::Generating => "GENERATING",
        PodcastStatus::Ready => "READY",
        PodcastStatus::Failed => "FAILED",
    }
}
