use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use serde_json::Value;
use tokio::time::timeout;

use crate::client::McpClient;
use crate::error::McpError;
use crate::sanitize::{sanitize_server_name, substitute_template};
use crate::types::{McpResourceSchema, McpServerConfig, McpToolSchema, McpTransport, ResourceUri};

pub const DEFAULT_MCP_TIMEOUT_SECS: u64 = 30;
pub const RESOURCE_FUNCTION_PREFIX: &str = "resource_";

struct ServerEntry {
    client: Arc<dyn McpClient>,
    tools: Vec<McpToolSchema>,
    resources: Vec<McpResourceSchema>,
    timeout_secs: u64,
}

/// Owns every connected MCP server and its cached schemas. Method strings
/// of the form `mcp_<sanitisedServer>.<operation>` are routed here by the
/// request router.
#[derive(Default)]
pub struct McpRegistry {
    servers: HashMap<String, ServerEntry>,
    failed: Vec<(String, String)>,
}

impl McpRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers an already-connected client under its sanitised name,
    /// fetching and caching its tool/resource schemas. Configs whose
    /// resolved command is the current executable (the self-bridge
    /// sentinel) must be filtered out by the caller before this is
    /// invoked, to prevent a server from bridging back into itself.
    pub async fn register(
        &mut self,
        config: &McpServerConfig,
        client: Arc<dyn McpClient>,
    ) -> Result<(), McpError> {
        let tools = client.list_tools().await.map_err(McpError::Call)?;
        let resources = client.list_resources().await.unwrap_or_default();
        let sanitised = sanitize_server_name(&config.name);
        self.servers.insert(
            sanitised,
            ServerEntry {
                client,
                tools,
                resources,
                timeout_secs: config.timeout_secs.unwrap_or(DEFAULT_MCP_TIMEOUT_SECS),
            },
        );
        Ok(())
    }

    pub fn record_connect_failure(&mut self, server_name: &str, error: impl ToString) {
        self.failed.push((server_name.to_string(), error.to_string()));
    }

    pub fn connect_failures(&self) -> &[(String, String)] {
        &self.failed
    }

    /// True when `config`'s command resolves to this process's own
    /// executable, in which case bridging it would recurse into this
    /// server.
    pub fn is_self_bridge(config: &McpServerConfig, current_exe: &std::path::Path) -> bool {
        match &config.transport {
            McpTransport::ChildProcess { command, .. } => {
                std::path::Path::new(command)
                    .canonicalize()
                    .map(|p| p == current_exe)
                    .unwrap_or(false)
            }
            _ => false,
        }
    }

    pub fn server_names(&self) -> impl Iterator<Item = &str> {
        self.servers.keys().map(|s| s.as_str())
    }

    pub fn tools_for(&self, server: &str) -> Option<&[McpToolSchema]> {
        self.servers.get(server).map(|e| e.tools.as_slice())
    }

    pub fn resources_for(&self, server: &str) -> Option<&[McpResourceSchema]> {
        self.servers.get(server).map(|e| e.resources.as_slice())
    }

    /// Dispatches `mcp_<server>.<operation>`. Operation names starting
    /// with `resource_` are routed to resource reads; everything else is
    /// a tool call.
    pub async fn dispatch(
        &self,
        sanitised_server: &str,
        operation: &str,
        args: Value,
    ) -> Result<Value, McpError> {
        let entry = self
            .servers
            .get(sanitised_server)
            .ok_or_else(|| McpError::UnknownServer(sanitised_server.to_string()))?;

        toolhost_protocol::METRICS.inc_mcp_calls();
        tracing::debug!(server = %sanitised_server, operation = %operation, "dispatching mcp call");
        if let Some(resource_name) = operation.strip_prefix(RESOURCE_FUNCTION_PREFIX) {
            self.read_resource(sanitised_server, entry, resource_name, args).await
        } else {
            self.call_tool(sanitised_server, entry, operation, args).await
        }
    }

    async fn call_tool(
        &self,
        server: &str,
        entry: &ServerEntry,
        tool_name: &str,
        args: Value,
    ) -> Result<Value, McpError> {
        if !entry.tools.iter().any(|t| t.name == tool_name) {
            return Err(McpError::UnknownTool {
                server: server.to_string(),
                tool: tool_name.to_string(),
            });
        }
        let fut = entry.client.call_tool(tool_name, args);
        match timeout(Duration::from_secs(entry.timeout_secs), fut).await {
            Ok(Ok(v)) => Ok(v),
            Ok(Err(e)) => Err(McpError::Call(e)),
            Err(_) => Err(McpError::Timeout(entry.timeout_secs)),
        }
    }

    async fn read_resource(
        &self,
        server: &str,
        entry: &ServerEntry,
        resource_name: &str,
        args: Value,
    ) -> Result<Value, McpError> {
        let schema = entry
            .resources
            .iter()
            .find(|r| r.name == resource_name)
            .ok_or_else(|| McpError::UnknownResource {
                server: server.to_string(),
                resource: resource_name.to_string(),
            })?;

        let uri = match &schema.uri {
            ResourceUri::Static(uri) => uri.clone(),
            ResourceUri::Template(template) => {
                substitute_template(template, &args).map_err(McpError::MissingTemplateVariable)?
            }
        };

        let fut = entry.client.read_resource(&uri);
        match timeout(Duration::from_secs(entry.timeout_secs), fut).await {
            Ok(Ok(v)) => Ok(v),
            Ok(Err(e)) => Err(McpError::Call(e)),
            Err(_) => Err(McpError::Timeout(entry.timeout_secs)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::client::McpClient;
    use async_trait::async_trait;

    struct FakeClient {
        tools: Vec<McpToolSchema>,
        resources: Vec<McpResourceSchema>,
    }

    #[async_trait]
    impl McpClient for FakeClient {
        async fn list_tools(&self) -> anyhow::Result<Vec<McpToolSchema>> {
            Ok(self.tools.clone())
        }
        async fn list_resources(&self) -> anyhow::Result<Vec<McpResourceSchema>> {
            Ok(self.resources.clone())
        }
        async fn call_tool(&self, name: &str, args: Value) -> anyhow::Result<Value> {
            Ok(serde_json::json!({"called": name, "args": args}))
        }
        async fn read_resource(&self, uri: &str) -> anyhow::Result<Value> {
            Ok(serde_json::json!({"uri": uri}))
        }
    }

    fn fake_config(name: &str) -> McpServerConfig {
        McpServerConfig {
            name: name.to_string(),
            transport: McpTransport::ChildProcess {
                command: "does-not-matter".into(),
                args: vec![],
                env: Default::default(),
            },
            timeout_secs: None,
        }
    }

    #[tokio::test]
    async fn dispatches_tool_call_by_sanitised_name() {
        let mut registry = McpRegistry::new();
        let client = Arc::new(FakeClient {
            tools: vec![McpToolSchema {
                name: "search".into(),
                description: None,
                input_schema: Value::Null,
            }],
            resources: vec![],
        });
        registry
            .register(&fake_config("github-mcp"), client)
            .await
            .unwrap();

        let result = registry
            .dispatch("github_mcp", "search", serde_json::json!({"q": "rust"}))
            .await
            .unwrap();
        assert_eq!(result["called"], "search");
    }

    #[tokio::test]
    async fn resource_operation_substitutes_template() {
        let mut registry = McpRegistry::new();
        let client = Arc::new(FakeClient {
            tools: vec![],
            resources: vec![McpResourceSchema {
                name: "repo".into(),
                description: None,
                uri: ResourceUri::Template("repo://{owner}/{name}".into()),
            }],
        });
        registry.register(&fake_config("git"), client).await.unwrap();

        let result = registry
            .dispatch(
                "git",
                "resource_repo",
                serde_json::json!({"owner": "acme", "name": "widgets"}),
            )
            .await
            .unwrap();
        assert_eq!(result["uri"], "repo://acme/widgets");
    }

    #[tokio::test]
    async fn unknown_tool_errors() {
        let mut registry = McpRegistry::new();
        let client = Arc::new(FakeClient {
            tools: vec![],
            resources: vec![],
        });
        registry.register(&fake_config("git"), client).await.unwrap();
        let err = registry
            .dispatch("git", "missing", Value::Null)
            .await
            .unwrap_err();
        assert!(matches!(err, McpError::UnknownTool { .. }));
    }

    #[tokio::test]
    async fn unknown_server_errors() {
        let registry = McpRegistry::new();
        let err = registry
            .dispatch("nope", "anything", Value::Null)
            .await
            .unwrap_err();
        assert!(matches!(err, McpError::UnknownServer(_)));
    }
}
