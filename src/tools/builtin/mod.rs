//! Built-in tools that come with the agent.

mod connector_mutation;
mod knowledge_base;
mod memory;
mod podcast;
mod report;
mod web;

pub use connector_mutation::{CreateLinearIssueTool, DeleteLinearIssueTool, UpdateLinearIssueTool};
pub use knowledge_base::SearchKnowledgeBaseTool;
pub use memory::{MemoryReadTool, MemorySearchTool, MemoryWriteTool};
pub use podcast::GeneratePodcastTool;
pub use report::GenerateReportTool;
pub use web::{LinkPreviewTool, ScrapeWebpageTool};
