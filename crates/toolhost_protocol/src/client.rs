//! Frames carried on the external client-facing duplex channel.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// An inbound frame from a connected client.
///
/// The two shapes are told apart structurally (one carries `script`, the
/// other carries `method`) rather than by an explicit tag, matching the
/// frame shapes fixed by the external interface.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ClientRequest {
    RunScript {
        script: String,
        #[serde(rename = "sessionId", skip_serializing_if = "Option::is_none")]
        session_id: Option<String>,
        /// Raw input piped through to the script; the router prepends a
        /// `stdin` helper binding over it when present.
        #[serde(skip_serializing_if = "Option::is_none")]
        stdin: Option<String>,
        id: String,
    },
    Call {
        method: String,
        args: Value,
        id: String,
    },
}

impl ClientRequest {
    pub fn id(&self) -> &str {
        match self {
            ClientRequest::RunScript { id, .. } => id,
            ClientRequest::Call { id, .. } => id,
        }
    }
}

/// A single namespace entry as listed in `welcome`/`functions_updated`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NamespaceSummary {
    pub namespace: String,
    pub functions: Vec<String>,
}

/// An outbound frame to a connected client.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ClientResponse {
    Welcome {
        #[serde(rename = "type")]
        kind: WelcomeTag,
        functions: Vec<NamespaceSummary>,
    },
    FunctionsUpdated {
        #[serde(rename = "type")]
        kind: FunctionsUpdatedTag,
        functions: Vec<NamespaceSummary>,
    },
    Result {
        result: Value,
        id: String,
    },
    Error {
        error: String,
        #[serde(skip_serializing_if = "Option::is_none")]
        id: Option<String>,
    },
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub enum WelcomeTag {
    #[serde(rename = "welcome")]
    Welcome,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub enum FunctionsUpdatedTag {
    #[serde(rename = "functions_updated")]
    FunctionsUpdated,
}

impl ClientResponse {
    pub fn welcome(functions: Vec<NamespaceSummary>) -> Self {
        ClientResponse::Welcome {
            kind: WelcomeTag::Welcome,
            functions,
        }
    }

    pub fn functions_updated(functions: Vec<NamespaceSummary>) -> Self {
        ClientResponse::FunctionsUpdated {
            kind: FunctionsUpdatedTag::FunctionsUpdated,
            functions,
        }
    }

    pub fn result(id: impl Into<String>, result: Value) -> Self {
        ClientResponse::Result {
            result,
            id: id.into(),
        }
    }

    pub fn error(id: Option<String>, error: impl Into<String>) -> Self {
        ClientResponse::Error {
            error: error.into(),
            id,
        }
    }
}
