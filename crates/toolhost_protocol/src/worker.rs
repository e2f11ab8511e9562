//! Frames carried on the internal worker-attachment plane.
//!
//! Unlike the client plane these are explicitly tagged: no external
//! compatibility constraint pins their shape, and a `type` discriminant
//! keeps the match arms in the supervisor obvious.

use serde::{Deserialize, Serialize};
use serde_json::Value;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum WorkerToServer {
    Identify {
        #[serde(rename = "workerId")]
        worker_id: String,
    },
    Ready {
        #[serde(rename = "workerId")]
        worker_id: String,
    },
    Result {
        id: String,
        data: Value,
    },
    Error {
        id: String,
        error: String,
    },
    Crash {
        error: String,
    },
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ServerToWorker {
    Call {
        id: String,
        #[serde(rename = "functionName")]
        function_name: String,
        args: Value,
    },
    Shutdown,
}
