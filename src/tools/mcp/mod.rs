//! Model Context Protocol client: materializes a remote MCP server's tools as agent-callable
//! [`crate::tools::tool::Tool`] implementations.

mod client;
mod protocol;

pub use client::McpClient;
pub use protocol::{CallToolResult, ContentBlock, ListToolsResult, McpError, McpRequest, McpResponse, McpTool};
