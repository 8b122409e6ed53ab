//! Per-search-space podcast generation lock (C9) and the pluggable audio synthesis backend.
//!
//! Only one podcast may be generating per search space at a time. The lock mirrors the Redis
//! `SETEX` pattern: acquire sets a TTL'd marker, release clears it, and an expired marker is
//! indistinguishable from no marker at all.

use std::sync::Arc;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use secrecy::{ExposeSecret, SecretString};
use uuid::Uuid;

use crate::error::JobError;

struct LockEntry {
    podcast_id: Uuid,
    expires_at: Instant,
}

/// Tracks the in-flight podcast generation per search space.
pub trait PodcastLock: Send + Sync {
    /// Attempts to claim the lock for `search_space_id`. Returns `None` on success, or the id
    /// of the podcast that is already generating.
    fn try_acquire(&self, search_space_id: Uuid, podcast_id: Uuid) -> Option<Uuid>;

    fn release(&self, search_space_id: Uuid);
}

/// In-process lock keyed by search space, backed by a `DashMap` rather than Redis since this
/// crate runs as a single process per deployment.
pub struct InMemoryPodcastLock {
    ttl: Duration,
    entries: DashMap<Uuid, LockEntry>,
}

impl InMemoryPodcastLock {
    pub fn new(ttl: Duration) -> Self {
        Self {
            ttl,
            entries: DashMap::new(),
        }
    }

    fn is_live(entry: &LockEntry) -> bool {
        Instant::now() < entry.expires_at
    }
}

impl PodcastLock for InMemoryPodcastLock {
    fn try_acquire(&self, search_space_id: Uuid, podcast_id: Uuid) -> Option<Uuid> {
        match self.entries.entry(search_space_id) {
            Entry::Occupied(mut occupied) => {
                if Self::is_live(occupied.get()) {
                    return Some(occupied.get().podcast_id);
                }
                occupied.insert(LockEntry {
                    podcast_id,
                    expires_at: Instant::now() + self.ttl,
                });
                None
            }
            Entry::Vacant(vacant) => {
                vacant.insert(LockEntry {
                    podcast_id,
                    expires_at: Instant::now() + self.ttl,
                });
                None
            }
        }
    }

    fn release(&self, search_space_id: Uuid) {
        self.entries.remove(&search_space_id);
    }
}

/// Produces audio from a podcast script. Implemented once per TTS vendor, the same pattern
/// `embedding::EmbeddingProvider` uses for embedding vendors.
#[async_trait]
pub trait PodcastAudioSynthesizer: Send + Sync {
    /// Synthesizes `script` to audio and returns a location (URL or storage path) for it.
    async fn synthesize(&self, script: &str, voice: Option<&str>) -> Result<String, JobError>;
}

/// An HTTP-backed synthesizer speaking a generic text-to-speech endpoint shape: POST the script
/// and voice, receive a location for the resulting audio.
pub struct HttpPodcastSynthesizer {
    client: reqwest::Client,
    endpoint: String,
    api_key: SecretString,
}

impl HttpPodcastSynthesizer {
    pub fn new(endpoint: impl Into<String>, api_key: SecretString) -> Self {
        Self {
            client: reqwest::Client::new(),
            endpoint: endpoint.into(),
            api_key,
        }
    }
}

#[derive(serde::Serialize)]
struct SynthesizeRequestBody<'a> {
    script: &'a str,
    voice: Option<&'a str>,
}

#[derive(serde::Deserialize)]
struct SynthesizeResponseBody {
    audio_location: String,
}

#[async_trait]
impl PodcastAudioSynthesizer for HttpPodcastSynthesizer {
    async fn synthesize(&self, script: &str, voice: Option<&str>) -> Result<String, JobError> {
        let response = self
            .client
            .post(&self.endpoint)
            .bearer_auth(self.api_key.expose_secret())
            .json(&SynthesizeRequestBody { script, voice })
            .send()
            .await
            .map_err(|e| JobError::Tts(e.to_string()))?;

        if !response.status().is_success() {
            return Err(JobError::Tts(format!("tts provider returned {}", response.status())));
        }

        let body: SynthesizeResponseBody = response.json().await.map_err(|e| JobError::Tts(e.to_string()))?;
        Ok(body.audio_location)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn try_acquire_blocks_until_released() {
        let lock = InMemoryPodcastLock::new(Duration::from_secs(60));
        let space = Uuid::new_v4();
        let first = Uuid::new_v4();
        let second = Uuid::new_v4();

        assert_eq!(lock.try_acquire(space, first), None);
        assert_eq!(lock.try_acquire(space, second), Some(first));

        lock.release(space);
        assert_eq!(lock.try_acquire(space, second), None);
    }

    #[test]
    fn try_acquire_allows_reclaim_after_ttl_expiry() {
        let lock = InMemoryPodcastLock::new(Duration::from_millis(1));
        let space = Uuid::new_v4();
        let first = Uuid::new_v4();
        let second = Uuid::new_v4();

        assert_eq!(lock.try_acquire(space, first), None);
        std::thread::sleep(Duration::from_millis(5));
        assert_eq!(lock.try_acquire(space, second), None);
    }

    #[test]
    fn try_acquire_is_independent_per_search_space() {
        let lock = InMemoryPodcastLock::new(Duration::from_secs(60));
        let first_space = Uuid::new_v4();
        let second_space = Uuid::new_v4();
        let podcast = Uuid::new_v4();

        assert_eq!(lock.try_acquire(first_space, podcast), None);
        assert_eq!(lock.try_acquire(second_space, podcast), None);
    }
}
