//! The worker-attachment plane: a ROUTER socket the supervisor binds,
//! against which every spawned worker's DEALER socket connects. Frames
//! are plain JSON, demultiplexed by call id rather than message order.

use std::sync::Arc;

use tokio::sync::mpsc;
use zeromq::{RouterSocket, Socket, SocketRecv, SocketSend, ZmqMessage};

use toolhost_protocol::{ServerToWorker, WorkerToServer};

use crate::supervisor::WorkerSupervisor;

pub async fn run_attachment_loop(
    supervisor: Arc<WorkerSupervisor>,
    bind_addr: &str,
) -> Result<(), zeromq::ZmqError> {
    let mut router = RouterSocket::new();
    router.bind(bind_addr).await?;

    // identity -> channel the per-namespace outbound forwarder reads from.
    let (outbound_tx, mut outbound_rx) = mpsc::unbounded_channel::<(Vec<u8>, ServerToWorker)>();

    loop {
        tokio::select! {
            incoming = router.recv() => {
                let message = match incoming {
                    Ok(m) => m,
                    Err(e) => {
                        tracing::warn!(error = %e, "attachment router recv failed");
                        continue;
                    }
                };
                handle_incoming(&supervisor, message, outbound_tx.clone()).await;
            }
            Some((identity, frame)) = outbound_rx.recv() => {
                if let Err(e) = send_to_identity(&mut router, identity, frame).await {
                    tracing::warn!(error = %e, "attachment router send failed");
                }
            }
        }
    }
}

async fn handle_incoming(
    supervisor: &Arc<WorkerSupervisor>,
    message: ZmqMessage,
    outbound_tx: mpsc::UnboundedSender<(Vec<u8>, ServerToWorker)>,
) {
    let frames: Vec<_> = message.into_vec();
    let Some(identity) = frames.first() else {
        return;
    };
    let Some(payload) = frames.get(1) else {
        return;
    };
    let identity = identity.to_vec();

    let parsed: Result<WorkerToServer, _> = serde_json::from_slice(payload);
    let Ok(parsed) = parsed else {
        tracing::warn!("dropping malformed frame on attachment plane");
        return;
    };

    match parsed {
        WorkerToServer::Identify { worker_id } => {
            let (tx, mut rx) = mpsc::unbounded_channel();
            supervisor.attach(&worker_id, tx).await;
            let forward_identity = identity.clone();
            let forward_tx = outbound_tx.clone();
            tokio::spawn(async move {
                while let Some(frame) = rx.recv().await {
                    if forward_tx.send((forward_identity.clone(), frame)).is_err() {
                        break;
                    }
                }
            });
        }
        WorkerToServer::Ready { worker_id } => {
            supervisor.mark_ready(&worker_id).await;
        }
        WorkerToServer::Result { id, data } => {
            supervisor.resolve_call(&id, Ok(data)).await;
        }
        WorkerToServer::Error { id, error } => {
            supervisor.resolve_call(&id, Err(error)).await;
        }
        WorkerToServer::Crash { error } => {
            tracing::warn!(error = %error, "worker reported a crash over the attachment plane");
        }
    }
}

async fn send_to_identity(
    router: &mut RouterSocket,
    identity: Vec<u8>,
    frame: ServerToWorker,
) -> Result<(), zeromq::ZmqError> {
    let payload = serde_json::to_vec(&frame).unwrap_or_default();
    // Multipart so the ROUTER's peer sees [identity, payload].
    let mut message = ZmqMessage::from(identity);
    message.push_back(payload.into());
    router.send(message).await
}
