//! Background job runner (C9): a bounded worker pool for work that must not block an agent
//! turn — currently just podcast generation, but shaped to take more job kinds later.
//!
//! Workers never hold a DB connection across an LLM or TTS call: each job borrows the pool only
//! for the read/write either side of the external call, per the connector-run discipline the
//! rest of the crate follows.

pub mod podcast;

pub use podcast::{HttpPodcastSynthesizer, InMemoryPodcastLock, PodcastAudioSynthesizer, PodcastLock};

use std::sync::Arc;

use chrono::Utc;
use tokio::sync::mpsc;
use tracing::{error, info, warn};
use uuid::Uuid;

use crate::config::Services;
use crate::error::JobError;
use crate::llm::{ChatMessage, CompletionRequest};
use crate::store::{Podcast, PodcastStatus};

const WORKER_COUNT: usize = 4;
const QUEUE_CAPACITY: usize = 256;

/// One unit of background work.
pub enum Job {
    GeneratePodcast {
        podcast_id: Uuid,
        search_space_id: Uuid,
        source_content: String,
        user_prompt: Option<String>,
    },
}

/// Owns the job queue and spawns `WORKER_COUNT` tasks to drain it.
#[derive(Clone)]
pub struct JobRunner {
    tx: mpsc::Sender<Job>,
}

impl JobRunner {
    pub fn spawn(services: Arc<Services>, synthesizer: Arc<dyn PodcastAudioSynthesizer>, lock: Arc<dyn PodcastLock>) -> Self {
        let (tx, rx) = mpsc::channel(QUEUE_CAPACITY);
        let rx = Arc::new(tokio::sync::Mutex::new(rx));

        for worker_id in 0..WORKER_COUNT {
            let services = services.clone();
            let synthesizer = synthesizer.clone();
            let lock = lock.clone();
            let rx = rx.clone();
            tokio::spawn(async move {
                loop {
                    let job = {
                        let mut rx = rx.lock().await;
                        rx.recv().await
                    };
                    let Some(job) = job else {
                        info!(worker_id, "job queue closed, worker exiting");
                        return;
                    };
                    run_job(&services, &synthesizer, &lock, job).await;
                }
            });
        }

        Self { tx }
    }

    pub async fn submit(&self, job: Job) -> Result<(), JobError> {
        self.tx
            .send(job)
            .await
            .map_err(|_| JobError::Tts("job queue is closed".to_string()))
    }
}

async fn run_job(services: &Services, synthesizer: &Arc<dyn PodcastAudioSynthesizer>, lock: &Arc<dyn PodcastLock>, job: Job) {
    match job {
        Job::GeneratePodcast {
            podcast_id,
            search_space_id,
            source_content,
            user_prompt,
        } => {
            let outcome = generate_podcast(services, synthesizer.as_ref(), &source_content, user_prompt.as_deref()).await;
            lock.release(search_space_id);

            match outcome {
                Ok(audio_location) => {
                    if let Err(e) = services
                        .repository
                        .update_podcast_status(podcast_id, PodcastStatus::Ready, Some(audio_location.as_str()))
                        .await
                    {
                        error!(%podcast_id, error = %e, "failed to record completed podcast");
                    }
                }
                Err(e) => {
                    warn!(%podcast_id, error = %e, "podcast generation failed");
                    if let Err(store_err) = services
                        .repository
                        .update_podcast_status(podcast_id, PodcastStatus::Failed, None)
                        .await
                    {
                        error!(%podcast_id, error = %store_err, "failed to record failed podcast");
                    }
                }
            }
        }
    }
}

async fn generate_podcast(
    services: &Services,
    synthesizer: &dyn PodcastAudioSynthesizer,
    source_content: &str,
    user_prompt: Option<&str>,
) -> Result<String, JobError> {
    let script = generate_script(services, source_content, user_prompt).await?;
    synthesizer.synthesize(&script, None).await
}

async fn generate_script(services: &Services, source_content: &str, user_prompt: Option<&str>) -> Result<String, JobError> {
    let mut instructions = "You write natural, conversational two-host podcast scripts from \
         source material. Keep it engaging, accurate, and under five minutes of spoken audio. \
         Format as alternating HOST A / HOST B lines."
        .to_string();
    if let Some(prompt) = user_prompt {
        instructions.push_str("\n\nAdditional instructions from the user: ");
        instructions.push_str(prompt);
    }

    let messages = vec![ChatMessage::system(instructions), ChatMessage::user(source_content.to_string())];
    let response = services
        .llm
        .complete(CompletionRequest {
            model: services.config.llm_model.clone(),
            messages,
            temperature: Some(0.7),
            max_tokens: None,
        })
        .await?;
    Ok(response.content)
}

/// Pre-creates a pending podcast record so its id is available for polling immediately, then
/// either enqueues generation or reports that one is already running for this search space.
pub async fn start_podcast_generation(
    services: &Services,
    runner: &JobRunner,
    lock: &Arc<dyn PodcastLock>,
    search_space_id: Uuid,
    title: String,
    source_content: String,
    user_prompt: Option<String>,
) -> Result<Podcast, JobError> {
    let podcast = Podcast {
        id: Uuid::new_v4(),
        search_space_id,
        title,
        status: PodcastStatus::Pending,
        audio_location: None,
        created_at: Utc::now(),
    };

    if let Some(existing) = lock.try_acquire(search_space_id, podcast.id) {
        return Err(JobError::AlreadyGenerating {
            podcast_id: existing.to_string(),
        });
    }

    services.repository.insert_podcast(&podcast).await?;

    if let Err(e) = runner
        .submit(Job::GeneratePodcast {
            podcast_id: podcast.id,
            search_space_id,
            source_content,
            user_prompt,
        })
        .await
    {
        lock.release(search_space_id);
        return Err(e);
    }

    Ok(podcast)
}
