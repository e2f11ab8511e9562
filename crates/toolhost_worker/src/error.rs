use thiserror::Error;

#[derive(Debug, Error, Clone)]
pub enum WorkerError {
    #[error("unknown namespace: {0}")]
    UnknownNamespace(String),
    #[error("worker for {0} is not ready yet")]
    NotReady(String),
    #[error("worker for {namespace} has permanently failed: {stderr}")]
    PermanentlyFailed { namespace: String, stderr: String },
    /// A ready worker answered the call with `{type:"error"}`: the tool
    /// function itself failed, not the worker process.
    #[error("{0}")]
    CallFailed(String),
    #[error("worker crashed while handling the call")]
    Crashed,
    #[error("call timed out after 30s")]
    Timeout,
    #[error("failed to spawn worker for {namespace}: {reason}")]
    SpawnFailed { namespace: String, reason: String },
}
