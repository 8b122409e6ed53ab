mod agent;
mod config;
mod context;
mod embedding;
mod error;
mod ingestion;
mod connectors;
mod jobs;
mod llm;
mod retrieval;
mod store;
mod tasklog;
mod tools;
mod workspace;

use std::io::BufRead;
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;

use deadpool_postgres::{Manager, ManagerConfig, Pool, RecyclingMethod};
use secrecy::SecretString;
use tokio_postgres::{Config as PgConfig, NoTls};
use tracing_subscriber::EnvFilter;
use uuid::Uuid;

use crate::agent::{Agent, ReportGenerator, Submission, SubmissionResult};
use crate::config::{AppConfig, Services};
use crate::embedding::{EmbeddingProvider, HttpEmbeddingProvider};
use crate::jobs::{HttpPodcastSynthesizer, InMemoryPodcastLock, JobRunner, PodcastAudioSynthesizer, PodcastLock};
use crate::llm::{HttpLlmProvider, LlmRouter};
use crate::retrieval::RetrievalEngine;
use crate::store::Repository;
use crate::tasklog::TaskLog;
use crate::tools::builtin::{
    GenerateReportTool, GeneratePodcastTool, LinkPreviewTool, MemoryReadTool, MemorySearchTool, MemoryWriteTool,
    ScrapeWebpageTool, SearchKnowledgeBaseTool,
};
use crate::tools::tool::Tool;
use crate::workspace::{OpenAiEmbeddings, Workspace};

fn build_pool(database_url: &str) -> Result<Pool, Box<dyn std::error::Error>> {
    let pg_config = PgConfig::from_str(database_url)?;
    let manager = Manager::from_config(
        pg_config,
        NoTls,
        ManagerConfig {
            recycling_method: RecyclingMethod::Fast,
        },
    );
    Ok(Pool::builder(manager).max_size(16).build()?)
}

fn required_env(name: &str) -> String {
    std::env::var(name).unwrap_or_default()
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt().with_env_filter(EnvFilter::from_default_env()).init();

    let config = AppConfig::load(std::env::var("CONFIG_PATH").ok().as_deref())?;
    let pool = build_pool(&config.database_url)?;

    let repository = Arc::new(Repository::new(pool.clone()));
    let tasklog = Arc::new(TaskLog::new(pool.clone()));

    let llm_api_key = SecretString::from(required_env("LLM_API_KEY"));
    let llm_endpoint = std::env::var("LLM_ENDPOINT").unwrap_or_else(|_| "https://api.openai.com/v1".to_string());
    let llm = Arc::new(LlmRouter::new(config.llm_model.clone()).register(Arc::new(HttpLlmProvider::new(
        llm_endpoint,
        llm_api_key,
        vec!["gpt-".to_string(), "o1-".to_string(), "o3-".to_string()],
    ))));

    let embedding_api_key = SecretString::from(required_env("EMBEDDING_API_KEY"));
    let embedding_endpoint =
        std::env::var("EMBEDDING_ENDPOINT").unwrap_or_else(|_| "https://api.openai.com/v1/embeddings".to_string());
    let embeddings: Arc<dyn EmbeddingProvider> = Arc::new(HttpEmbeddingProvider::new(
        embedding_endpoint,
        embedding_api_key,
        config.embedding_model.clone(),
        config.embedding_dimensions,
    ));

    let config = Arc::new(config);
    let services = Arc::new(Services {
        config: config.clone(),
        repository: repository.clone(),
        llm: llm.clone(),
        embeddings: embeddings.clone(),
        tasklog: tasklog.clone(),
    });

    let tts_endpoint = std::env::var("TTS_ENDPOINT").unwrap_or_default();
    let tts_api_key = SecretString::from(required_env("TTS_API_KEY"));
    let synthesizer: Arc<dyn PodcastAudioSynthesizer> = Arc::new(HttpPodcastSynthesizer::new(tts_endpoint, tts_api_key));
    let podcast_lock: Arc<dyn PodcastLock> = Arc::new(InMemoryPodcastLock::new(Duration::from_secs(config.podcast_lock_ttl_secs)));
    let job_runner = JobRunner::spawn(services.clone(), synthesizer, podcast_lock.clone());

    // `user_id`/`search_space_id` would ordinarily come from an inbound request; a single
    // operator session is assumed for this entry point.
    let user_id = required_env("USER_ID");
    let search_space_id = std::env::var("SEARCH_SPACE_ID")
        .ok()
        .and_then(|s| Uuid::parse_str(&s).ok())
        .unwrap_or_else(Uuid::new_v4);

    let retrieval = Arc::new(RetrievalEngine::new(repository.clone(), embeddings.clone(), config.retrieval_weights.clone(), &user_id).await?);
    let report_generator = ReportGenerator::new(repository.clone(), llm.clone(), retrieval.clone());

    // The workspace/memory subsystem embeds against its own `EmbeddingProvider` trait, kept
    // dependency-free from the ingestion pipeline's provider wiring (see workspace/embeddings.rs).
    let memory_embeddings = Arc::new(OpenAiEmbeddings::new(
        std::env::var("EMBEDDING_ENDPOINT").unwrap_or_else(|_| "https://api.openai.com/v1/embeddings".to_string()),
        SecretString::from(required_env("EMBEDDING_API_KEY")),
        config.embedding_model.clone(),
    ));
    let workspace = Arc::new(Workspace::new(user_id.clone(), pool.clone()).with_embeddings(memory_embeddings));
    let user_instructions = workspace.system_prompt().await.ok();

    let tools: Vec<Arc<dyn Tool>> = vec![
        Arc::new(ScrapeWebpageTool::new()),
        Arc::new(LinkPreviewTool::new()),
        Arc::new(SearchKnowledgeBaseTool::new(retrieval.clone())),
        Arc::new(GenerateReportTool::new(report_generator)),
        Arc::new(GeneratePodcastTool::new(job_runner.clone(), podcast_lock.clone())),
        Arc::new(MemorySearchTool::new(workspace.clone())),
        Arc::new(MemoryReadTool::new(workspace.clone())),
        Arc::new(MemoryWriteTool::new(workspace.clone())),
    ];

    let mut agent = Agent::new(user_id, search_space_id, services, tools, user_instructions.as_deref());

    let stdin = std::io::stdin();
    let mut lines = stdin.lock().lines();
    println!("ready.");
    while let Some(Ok(line)) = lines.next() {
        if line.trim().is_empty() {
            continue;
        }
        let result = agent
            .submit(Submission::UserInput { content: line })
            .await?;
        print_result(&result);
    }

    Ok(())
}

fn print_result(result: &SubmissionResult) {
    match result {
        SubmissionResult::Response { content } => println!("{content}"),
        SubmissionResult::NeedApproval { tool_name, parameters, .. } => {
            println!("approval needed for {tool_name}: {parameters}")
        }
        SubmissionResult::Ok { message } => {
            if let Some(message) = message {
                println!("{message}");
            }
        }
        SubmissionResult::Interrupted => println!("(interrupted)"),
        SubmissionResult::Error { message } => eprintln!("error: {message}"),
    }
}
