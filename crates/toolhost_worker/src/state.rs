use std::collections::HashMap;

use tokio::process::Child;
use tokio::sync::{mpsc, oneshot};

use toolhost_protocol::ServerToWorker;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WorkerStatus {
    Starting,
    Ready,
    Crashed,
    Failed,
}

pub type CallResult = Result<serde_json::Value, String>;

pub struct PendingCall {
    pub namespace: String,
    pub reply: oneshot::Sender<CallResult>,
}

/// Everything the supervisor tracks for one namespace's persistent
/// worker. `outbound` is `None` until the spawned process completes its
/// identify/ready handshake.
pub struct WorkerState {
    pub namespace: String,
    pub child: Option<Child>,
    pub outbound: Option<mpsc::UnboundedSender<ServerToWorker>>,
    pub status: WorkerStatus,
    pub restart_count: u32,
    pub ever_ready: bool,
    pub last_stderr: String,
    /// Bumped on every `spawn_worker` for this namespace; lets the
    /// background exit-watcher tell its own process apart from one that
    /// has since replaced it (hot reload, crash-restart).
    pub generation: u64,
}

impl WorkerState {
    pub fn starting(namespace: String, child: Child) -> Self {
        Self {
            namespace,
            child: Some(child),
            outbound: None,
            status: WorkerStatus::Starting,
            restart_count: 0,
            ever_ready: false,
            last_stderr: String::new(),
            generation: 0,
        }
    }
}

#[derive(Default)]
pub struct PendingCalls {
    calls: HashMap<String, PendingCall>,
}

impl PendingCalls {
    pub fn insert(&mut self, call_id: String, namespace: String, reply: oneshot::Sender<CallResult>) {
        self.calls.insert(call_id, PendingCall { namespace, reply });
    }

    pub fn remove(&mut self, call_id: &str) -> Option<PendingCall> {
        self.calls.remove(call_id)
    }

    #[cfg(test)]
    pub fn ids(&self) -> Vec<String> {
        self.calls.keys().cloned().collect()
    }

    /// Rejects and drops every pending call belonging to `namespace`.
    /// Runs on process exit, hot reload and removal, with a message
    /// naming which of those ended the call.
    pub fn fail_namespace(&mut self, namespace: &str, message: &str) {
        let ids: Vec<String> = self
            .calls
            .iter()
            .filter(|(_, c)| c.namespace == namespace)
            .map(|(id, _)| id.clone())
            .collect();
        for id in ids {
            if let Some(call) = self.calls.remove(&id) {
                let _ = call.reply.send(Err(message.to_string()));
            }
        }
    }
}
