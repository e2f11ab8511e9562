//! MCP server bridging: spawns/connects configured external MCP
//! servers and exposes their tools and resources as `mcp_<server>`
//! namespaces alongside locally discovered tool files.

pub mod client;
pub mod error;
pub mod registry;
pub mod sanitize;
pub mod types;

pub use error::McpError;
pub use registry::{McpRegistry, DEFAULT_MCP_TIMEOUT_SECS, RESOURCE_FUNCTION_PREFIX};
pub use sanitize::{sanitize_server_name, substitute_template};
pub use types::{McpResourceSchema, McpServerConfig, McpToolSchema, McpTransport, ResourceUri};
