//! Classifies one inbound duplex-channel frame and decides which executor
//! should handle it. Performing the call is left to the caller, which
//! owns the worker supervisor, MCP registry and sandbox executor.

use toolhost_protocol::{ClientRequest, ProtocolError};

const MCP_PREFIX: &str = "mcp_";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Route {
    RunScript,
    Mcp { server: String, operation: String },
    Rpc { namespace: String, function: String },
    Invalid(String),
}

pub fn classify(request: &ClientRequest) -> Route {
    match request {
        ClientRequest::RunScript { .. } => Route::RunScript,
        ClientRequest::Call { method, .. } => classify_method(method),
    }
}

fn classify_method(method: &str) -> Route {
    if let Some(rest) = method.strip_prefix(MCP_PREFIX) {
        return match rest.split_once('.') {
            Some((server, operation)) if !server.is_empty() && !operation.is_empty() => {
                Route::Mcp {
                    server: server.to_string(),
                    operation: operation.to_string(),
                }
            }
            _ => Route::Invalid(ProtocolError::InvalidMethod(method.to_string()).to_string()),
        };
    }

    match method.split_once('.') {
        Some((namespace, function)) if !namespace.is_empty() && !function.is_empty() => {
            Route::Rpc {
                namespace: namespace.to_string(),
                function: function.to_string(),
            }
        }
        _ => Route::Invalid(ProtocolError::InvalidMethod(method.to_string()).to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn call(method: &str) -> ClientRequest {
        ClientRequest::Call {
            method: method.to_string(),
            args: json!({}),
            id: "x".to_string(),
        }
    }

    #[test]
    fn script_frames_route_to_sandbox() {
        let req = ClientRequest::RunScript {
            script: "1+1".into(),
            session_id: None,
            stdin: None,
            id: "a".into(),
        };
        assert_eq!(classify(&req), Route::RunScript);
    }

    #[test]
    fn dotted_method_routes_to_rpc() {
        assert_eq!(
            classify(&call("file.add")),
            Route::Rpc {
                namespace: "file".into(),
                function: "add".into(),
            }
        );
    }

    #[test]
    fn mcp_prefixed_method_routes_to_mcp() {
        assert_eq!(
            classify(&call("mcp_github.search")),
            Route::Mcp {
                server: "github".into(),
                operation: "search".into(),
            }
        );
    }

    #[test]
    fn mcp_resource_operation_still_routes_as_mcp() {
        assert_eq!(
            classify(&call("mcp_git.resource_repo")),
            Route::Mcp {
                server: "git".into(),
                operation: "resource_repo".into(),
            }
        );
    }

    #[test]
    fn method_with_no_dot_is_invalid() {
        assert!(matches!(classify(&call("noop")), Route::Invalid(_)));
    }

    #[test]
    fn mcp_prefix_with_no_operation_is_invalid() {
        assert!(matches!(classify(&call("mcp_github")), Route::Invalid(_)));
    }
}
