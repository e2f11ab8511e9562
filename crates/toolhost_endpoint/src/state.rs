use std::collections::HashMap;
use std::sync::Arc;

use axum::extract::ws::Message;
use tokio::sync::{Mutex, RwLock};
use uuid::Uuid;

use toolhost_mcp::McpRegistry;
use toolhost_sandbox::SandboxExecutor;
use toolhost_synth::Synthesiser;
use toolhost_worker::WorkerSupervisor;

/// Everything a duplex or HTTP handler needs to answer a request. Owned by
/// the `toolhost` binary and shared across every axum handler behind an
/// `Arc`.
pub struct EndpointState {
    pub synthesiser: Mutex<Synthesiser>,
    pub supervisor: Arc<WorkerSupervisor>,
    pub mcp: RwLock<McpRegistry>,
    pub sandbox: Arc<SandboxExecutor>,
    pub client_module_url: String,
    pub clients: RwLock<HashMap<Uuid, tokio::sync::mpsc::UnboundedSender<Message>>>,
}

impl EndpointState {
    pub fn new(
        synthesiser: Synthesiser,
        supervisor: Arc<WorkerSupervisor>,
        mcp: McpRegistry,
        sandbox: Arc<SandboxExecutor>,
        client_module_url: impl Into<String>,
    ) -> Arc<Self> {
        Arc::new(Self {
            synthesiser: Mutex::new(synthesiser),
            supervisor,
            mcp: RwLock::new(mcp),
            sandbox,
            client_module_url: client_module_url.into(),
            clients: RwLock::new(HashMap::new()),
        })
    }

    /// Broadcasts `frame` to every connected client, dropping any whose
    /// send fails (the socket's own read loop will notice the close and
    /// remove it from the map).
    pub async fn broadcast(&self, frame: &toolhost_protocol::ClientResponse) {
        let Ok(text) = serde_json::to_string(frame) else {
            return;
        };
        let mut dead = Vec::new();
        let clients = self.clients.read().await;
        for (id, tx) in clients.iter() {
            if tx.send(Message::Text(text.clone())).is_err() {
                dead.push(*id);
            }
        }
        drop(clients);
        if !dead.is_empty() {
            tracing::debug!(count = dead.len(), "dropping disconnected clients from broadcast set");
            let mut clients = self.clients.write().await;
            for id in dead {
                clients.remove(&id);
            }
        }
    }

    /// Called after a tool-index reconcile changes the namespace set:
    /// refreshes the synthesiser cache and notifies every connected
    /// client.
    pub async fn notify_functions_updated(&self) {
        let summaries = {
            let synth = self.synthesiser.lock().await;
            synth.namespace_summaries()
        };
        self.broadcast(&toolhost_protocol::ClientResponse::functions_updated(summaries))
            .await;
    }
}
