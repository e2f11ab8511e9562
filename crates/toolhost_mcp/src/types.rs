use serde::{Deserialize, Serialize};
use std::collections::HashMap;

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(tag = "transport", rename_all = "snake_case")]
pub enum McpTransport {
    ChildProcess {
        command: String,
        #[serde(default)]
        args: Vec<String>,
        #[serde(default)]
        env: HashMap<String, String>,
    },
    StreamingHttp {
        url: String,
        #[serde(default)]
        headers: HashMap<String, String>,
    },
    ServerSentEvents {
        url: String,
        #[serde(default)]
        headers: HashMap<String, String>,
    },
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct McpServerConfig {
    pub name: String,
    #[serde(flatten)]
    pub transport: McpTransport,
    /// Per-server call timeout override; falls back to the global 30s
    /// default when absent.
    #[serde(default)]
    pub timeout_secs: Option<u64>,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct McpToolSchema {
    pub name: String,
    pub description: Option<String>,
    pub input_schema: serde_json::Value,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub enum ResourceUri {
    Static(String),
    Template(String),
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct McpResourceSchema {
    pub name: String,
    pub description: Option<String>,
    pub uri: ResourceUri,
}
