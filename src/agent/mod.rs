//! Core agent logic: the turn-based chat loop, tool-approval suspension, system-prompt
//! construction, citation validation, and Markdown report generation.

mod agent_loop;
mod approval;
mod citation;
mod report;
mod submission;
mod system_prompt;

pub use agent_loop::Agent;
pub use approval::{ApprovalRequest, PendingApprovals, PendingCall, ToolOutcome};
pub use citation::{extract_citations, invalid_citations};
pub use report::{
    GenerateReportRequest, GeneratedReport, ReportGenerator, ReportMetadata, ReportStyle, SourceStrategy,
};
pub use submission::{Submission, SubmissionResult};
pub use system_prompt::build_system_prompt;
