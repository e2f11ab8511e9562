use async_trait::async_trait;
use serde_json::Value;

use crate::types::{McpResourceSchema, McpToolSchema};

/// Thin seam over a single connected MCP server so the registry can be
/// exercised against a fake in tests without spawning a real child
/// process or network connection.
#[async_trait]
pub trait McpClient: Send + Sync {
    async fn list_tools(&self) -> anyhow::Result<Vec<McpToolSchema>>;
    async fn list_resources(&self) -> anyhow::Result<Vec<McpResourceSchema>>;
    async fn call_tool(&self, name: &str, args: Value) -> anyhow::Result<Value>;
    async fn read_resource(&self, uri: &str) -> anyhow::Result<Value>;
}

pub mod rmcp_backed {
    use super::*;
    use crate::types::McpTransport;
    use rmcp::model::{CallToolRequestParam, ReadResourceRequestParam};
    use rmcp::service::RunningService;
    use rmcp::transport::sse_client::SseClientTransport;
    use rmcp::transport::streamable_http_client::StreamableHttpClientTransportConfig;
    use rmcp::transport::StreamableHttpClientTransport;
    use rmcp::{transport::TokioChildProcess, RoleClient, ServiceExt};
    use std::collections::HashMap;
    use tokio::process::Command;

    /// An MCP server reached over stdio (child process), streaming HTTP,
    /// or server-sent events.
    pub struct RmcpClient {
        service: RunningService<RoleClient, ()>,
    }

    impl RmcpClient {
        pub async fn connect(transport: &McpTransport) -> anyhow::Result<Self> {
            match transport {
                McpTransport::ChildProcess { command, args, env } => {
                    let mut cmd = Command::new(command);
                    cmd.args(args);
                    for (k, v) in env {
                        cmd.env(k, v);
                    }
                    let child = TokioChildProcess::new(cmd)?;
                    let service = ().serve(child).await?;
                    Ok(Self { service })
                }
                McpTransport::StreamingHttp { url, headers } => {
                    let mut config = StreamableHttpClientTransportConfig::with_uri(url.as_str());
                    if let Some(token) = bearer_token(headers) {
                        config = config.auth_header(token);
                    }
                    let transport = StreamableHttpClientTransport::from_config(config);
                    let service = ().serve(transport).await?;
                    Ok(Self { service })
                }
                McpTransport::ServerSentEvents { url, headers } => {
                    warn_unsupported_headers(headers, &[]);
                    let transport = SseClientTransport::start(url.clone()).await?;
                    let service = ().serve(transport).await?;
                    Ok(Self { service })
                }
            }
        }
    }

    /// Pulls a bearer token out of a configured `Authorization` header.
    /// The HTTP transport config only supports bearer auth; anything else
    /// is reported as unsupported rather than silently dropped.
    fn bearer_token(headers: &HashMap<String, String>) -> Option<String> {
        let token = headers.iter().find_map(|(name, value)| {
            name.eq_ignore_ascii_case("authorization")
                .then(|| value.strip_prefix("Bearer ").map(str::to_string))
                .flatten()
        });
        warn_unsupported_headers(headers, &["authorization"]);
        token
    }

    fn warn_unsupported_headers(headers: &HashMap<String, String>, supported: &[&str]) {
        for name in headers.keys() {
            if !supported.iter().any(|s| name.eq_ignore_ascii_case(s)) {
                tracing::warn!(header = %name, "header is not supported by this transport; ignoring");
            }
        }
    }

    #[cfg(test)]
    mod tests {
        use super::*;

        #[test]
        fn extracts_bearer_token_case_insensitively() {
            let mut headers = HashMap::new();
            headers.insert("authorization".to_string(), "Bearer tok123".to_string());
            assert_eq!(bearer_token(&headers).as_deref(), Some("tok123"));
        }

        #[test]
        fn non_bearer_authorization_yields_no_token() {
            let mut headers = HashMap::new();
            headers.insert("Authorization".to_string(), "Basic abc".to_string());
            assert!(bearer_token(&headers).is_none());
        }
    }

    #[async_trait]
    impl McpClient for RmcpClient {
        async fn list_tools(&self) -> anyhow::Result<Vec<McpToolSchema>> {
            let tools = self.service.list_tools(Default::default()).await?;
            Ok(tools
                .tools
                .into_iter()
                .map(|t| McpToolSchema {
                    name: t.name.to_string(),
                    description: t.description.map(|d| d.to_string()),
                    input_schema: serde_json::to_value(t.input_schema.as_ref())
                        .unwrap_or(Value::Null),
                })
                .collect())
        }

        async fn list_resources(&self) -> anyhow::Result<Vec<McpResourceSchema>> {
            let resources = self.service.list_resources(Default::default()).await?;
            let mut out: Vec<McpResourceSchema> = resources
                .resources
                .into_iter()
                .map(|r| crate::types::McpResourceSchema {
                    name: r.name.to_string(),
                    description: r.description.clone().map(|d| d.to_string()),
                    uri: crate::types::ResourceUri::Static(r.uri.to_string()),
                })
                .collect();

            // Templated resources are listed separately by the protocol;
            // they join the same set with their `{var}` template intact so
            // the registry can substitute call arguments into it.
            if let Ok(templates) = self.service.list_resource_templates(Default::default()).await {
                out.extend(templates.resource_templates.into_iter().map(|t| {
                    crate::types::McpResourceSchema {
                        name: t.name.to_string(),
                        description: t.description.clone().map(|d| d.to_string()),
                        uri: crate::types::ResourceUri::Template(t.uri_template.to_string()),
                    }
                }));
            }
            Ok(out)
        }

        async fn call_tool(&self, name: &str, args: Value) -> anyhow::Result<Value> {
            let result = self
                .service
                .call_tool(CallToolRequestParam {
                    name: name.to_string().into(),
                    arguments: args.as_object().cloned(),
                })
                .await?;
            Ok(serde_json::to_value(result)?)
        }

        async fn read_resource(&self, uri: &str) -> anyhow::Result<Value> {
            let result = self
                .service
                .read_resource(ReadResourceRequestParam {
                    uri: uri.to_string().into(),
                })
                .await?;
            Ok(serde_json::to_value(result)?)
        }
    }
}
