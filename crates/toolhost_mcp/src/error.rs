use thiserror::Error;

#[derive(Debug, Error)]
pub enum McpError {
    #[error("unknown mcp server: {0}")]
    UnknownServer(String),
    #[error("unknown tool {tool} on server {server}")]
    UnknownTool { server: String, tool: String },
    #[error("unknown resource {resource} on server {server}")]
    UnknownResource { server: String, resource: String },
    #[error("resource {0} has no static uri or template")]
    ResourceHasNoUri(String),
    #[error("missing template variable: {0}")]
    MissingTemplateVariable(String),
    #[error("mcp call timed out after {0}s")]
    Timeout(u64),
    #[error("failed to connect to mcp server {server}: {source}")]
    Connect {
        server: String,
        #[source]
        source: anyhow::Error,
    },
    #[error("mcp call failed: {0}")]
    Call(#[from] anyhow::Error),
}
