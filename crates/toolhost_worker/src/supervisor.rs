use std::collections::HashMap;
use std::process::Stdio;
use std::sync::Arc;
use std::time::{Duration, Instant};

use serde_json::Value;
use tokio::process::Command;
use tokio::sync::{mpsc, oneshot, Mutex};
use tokio::time::timeout;

use toolhost_protocol::ServerToWorker;

use crate::backoff::restart_backoff;
use crate::error::WorkerError;
use crate::state::{PendingCalls, WorkerState, WorkerStatus};

pub const CALL_TIMEOUT: Duration = Duration::from_secs(30);
pub const RESTART_GRACE: Duration = Duration::from_secs(2);

/// How to spawn the persistent worker subprocess for one namespace. The
/// worker runtime itself (what imports the tool module and speaks the
/// attachment protocol) is an external collaborator; this only names
/// the command used to start it and the environment it reads to find its
/// namespace, tool file and attachment address.
#[derive(Clone)]
pub struct WorkerCommand {
    pub program: String,
    pub args: Vec<String>,
}

pub struct WorkerSupervisor {
    workers: Mutex<HashMap<String, WorkerState>>,
    pending: Mutex<PendingCalls>,
    pending_restarts: Mutex<Vec<String>>,
    command: WorkerCommand,
    attach_addr: String,
}

impl WorkerSupervisor {
    pub fn new(command: WorkerCommand, attach_addr: impl Into<String>) -> Arc<Self> {
        Arc::new(Self {
            workers: Mutex::new(HashMap::new()),
            pending: Mutex::new(PendingCalls::default()),
            pending_restarts: Mutex::new(Vec::new()),
            command,
            attach_addr: attach_addr.into(),
        })
    }

    /// Spawns (or respawns) the worker for `namespace` against `tool_path`.
    pub async fn spawn_worker(
        self: &Arc<Self>,
        namespace: &str,
        tool_path: &str,
    ) -> Result<(), WorkerError> {
        let mut cmd = Command::new(&self.command.program);
        cmd.args(&self.command.args)
            .env("TOOLHOST_NAMESPACE", namespace)
            .env("TOOLHOST_TOOL_FILE", tool_path)
            .env("TOOLHOST_ATTACH_ADDR", &self.attach_addr)
            .stdin(Stdio::null())
            .stdout(Stdio::inherit())
            .stderr(Stdio::piped());

        let mut child = cmd.spawn().map_err(|e| WorkerError::SpawnFailed {
            namespace: namespace.to_string(),
            reason: e.to_string(),
        })?;

        let stderr = child.stderr.take();
        let generation = {
            let mut workers = self.workers.lock().await;
            let previous = workers.get(namespace).map(|prev| {
                let carried = (prev.status == WorkerStatus::Crashed)
                    .then(|| (prev.restart_count, prev.ever_ready, prev.last_stderr.clone()));
                (prev.generation + 1, carried)
            });
            let (generation, carried) = previous.unwrap_or((0, None));
            let mut state = WorkerState::starting(namespace.to_string(), child);
            state.generation = generation;
            // A crash respawn keeps its escalating backoff counter and
            // its ever-ready credit; a hot reload or first spawn starts
            // from a clean slate.
            if let Some((restart_count, ever_ready, last_stderr)) = carried {
                state.restart_count = restart_count;
                state.ever_ready = ever_ready;
                state.last_stderr = last_stderr;
            }
            workers.insert(namespace.to_string(), state);
            generation
        };

        let this = Arc::clone(self);
        let ns = namespace.to_string();
        tokio::spawn(async move {
            this.watch_worker(ns, generation, stderr).await;
        });

        Ok(())
    }

    /// Waits for one spawned process to exit and reports the crash, but
    /// only if `generation` still names the live entry for `namespace`.
    /// `restart_worker` replaces an entry in place (new generation) while
    /// this task is still draining the old process's stderr pipe; without
    /// the generation check this task would go on to `.wait()` on the
    /// *new* child and misattribute its eventual exit to the old one.
    async fn watch_worker(
        self: Arc<Self>,
        namespace: String,
        generation: u64,
        stderr: Option<tokio::process::ChildStderr>,
    ) {
        use tokio::io::AsyncReadExt;
        let mut captured = String::new();
        if let Some(mut pipe) = stderr {
            let _ = pipe.read_to_string(&mut captured).await;
        }

        // Take the child out before waiting: holding the workers lock
        // across `wait()` would stall every other supervisor operation if
        // a worker closed stderr while still running.
        let child = {
            let mut workers = self.workers.lock().await;
            match workers.get_mut(&namespace) {
                Some(state) if state.generation == generation => state.child.take(),
                _ => {
                    tracing::debug!(namespace = %namespace, "stale worker generation exited; ignoring");
                    return;
                }
            }
        };
        let exit_status = match child {
            Some(mut child) => child.wait().await.ok(),
            None => None,
        };
        tracing::warn!(namespace = %namespace, status = ?exit_status, "worker process exited");
        self.handle_crash(&namespace, generation, captured).await;
    }

    async fn handle_crash(self: &Arc<Self>, namespace: &str, generation: u64, stderr: String) {
        self.pending
            .lock()
            .await
            .fail_namespace(namespace, "worker crashed");

        let (ever_ready, restart_count) = {
            let mut workers = self.workers.lock().await;
            let Some(state) = workers.get_mut(namespace) else {
                return;
            };
            // A replacement spawned between the exit watcher's check and
            // here must not have its state clobbered by the old process's
            // death.
            if state.generation != generation {
                return;
            }
            state.last_stderr = stderr;
            state.outbound = None;
            if state.ever_ready {
                state.status = WorkerStatus::Crashed;
                state.restart_count += 1;
                (true, state.restart_count)
            } else {
                state.status = WorkerStatus::Failed;
                (false, state.restart_count)
            }
        };

        if !ever_ready {
            tracing::error!(namespace = %namespace, "worker never became ready; marking permanently failed");
            return;
        }

        let delay = restart_backoff(restart_count - 1);
        tracing::info!(namespace = %namespace, delay_secs = delay.as_secs(), "scheduling worker restart");
        toolhost_protocol::METRICS.inc_worker_restarts();
        let this = Arc::clone(self);
        let ns = namespace.to_string();
        tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            let still_tracked = this.workers.lock().await.contains_key(&ns);
            if still_tracked {
                this.pending_restarts.lock().await.push(ns);
            }
        });
    }

    /// Namespaces whose backoff delay has elapsed and are waiting for the
    /// caller (the `toolhost` binary's reconcile loop, which owns the
    /// current tool path for each namespace) to call `spawn_worker` again.
    pub async fn take_pending_restarts(&self) -> Vec<String> {
        std::mem::take(&mut *self.pending_restarts.lock().await)
    }

    /// Hot-reloads `namespace` against `tool_path`: sends a shutdown
    /// frame to the current worker, waits a grace period, force-kills
    /// anything still running, then spawns a fresh process. Used when a
    /// tool file's content changes without its name changing. Unlike a
    /// crash, this is not counted against the restart backoff, and any
    /// calls in flight are rejected immediately rather than left to time
    /// out.
    pub async fn restart_worker(
        self: &Arc<Self>,
        namespace: &str,
        tool_path: &str,
    ) -> Result<(), WorkerError> {
        {
            let workers = self.workers.lock().await;
            if let Some(state) = workers.get(namespace) {
                if let Some(outbound) = &state.outbound {
                    let _ = outbound.send(ServerToWorker::Shutdown);
                }
            }
        }
        tokio::time::sleep(RESTART_GRACE).await;
        {
            // Kill the process in place rather than removing the map entry:
            // `spawn_worker` derives the next generation from whatever entry
            // is already there, and a premature removal would reset the
            // counter to 0, letting the old watcher's stale generation
            // collide with the new one.
            let mut workers = self.workers.lock().await;
            if let Some(state) = workers.get_mut(namespace) {
                // Retire this generation before killing: closes the window
                // where the old watcher wakes on the closed stderr pipe and
                // re-reads a generation that `spawn_worker` hasn't bumped yet.
                state.generation += 1;
                if let Some(child) = state.child.as_mut() {
                    let _ = child.start_kill();
                }
            }
        }
        self.pending
            .lock()
            .await
            .fail_namespace(namespace, "worker restarted for hot reload");

        tracing::info!(namespace = %namespace, "hot-reloading worker for content change");
        self.spawn_worker(namespace, tool_path).await
    }

    /// Tears down the worker for a namespace whose tool file disappeared:
    /// shutdown frame, grace period, force-kill, drop the entry entirely
    /// (no respawn).
    pub async fn remove_worker(self: &Arc<Self>, namespace: &str) {
        {
            let workers = self.workers.lock().await;
            if let Some(state) = workers.get(namespace) {
                if let Some(outbound) = &state.outbound {
                    let _ = outbound.send(ServerToWorker::Shutdown);
                }
            }
        }
        tokio::time::sleep(RESTART_GRACE).await;
        let mut workers = self.workers.lock().await;
        if let Some(mut state) = workers.remove(namespace) {
            state.generation += 1;
            if let Some(child) = state.child.as_mut() {
                let _ = child.start_kill();
            }
        }
        drop(workers);
        self.pending
            .lock()
            .await
            .fail_namespace(namespace, "worker removed: tool file no longer present");
    }

    /// Called by the attachment router when a worker sends `identify`.
    pub async fn attach(&self, namespace: &str, outbound: mpsc::UnboundedSender<ServerToWorker>) {
        let mut workers = self.workers.lock().await;
        if let Some(state) = workers.get_mut(namespace) {
            state.outbound = Some(outbound);
        }
    }

    /// Called by the attachment router when a worker sends `ready`.
    pub async fn mark_ready(&self, namespace: &str) {
        let mut workers = self.workers.lock().await;
        if let Some(state) = workers.get_mut(namespace) {
            state.status = WorkerStatus::Ready;
            state.ever_ready = true;
            state.restart_count = 0;
        }
    }

    /// Called by the attachment router for `result`/`error` frames. The
    /// call id is searched for across every worker's pending map rather
    /// than assumed to arrive on the channel the call went out on.
    pub async fn resolve_call(&self, call_id: &str, result: Result<Value, String>) {
        if let Some(call) = self.pending.lock().await.remove(call_id) {
            let _ = call.reply.send(result);
        }
    }

    pub async fn call_function(
        &self,
        namespace: &str,
        function_name: &str,
        args: Value,
    ) -> Result<Value, WorkerError> {
        let outbound = {
            let workers = self.workers.lock().await;
            let state = workers
                .get(namespace)
                .ok_or_else(|| WorkerError::UnknownNamespace(namespace.to_string()))?;
            match state.status {
                WorkerStatus::Failed => {
                    return Err(WorkerError::PermanentlyFailed {
                        namespace: namespace.to_string(),
                        stderr: state.last_stderr.clone(),
                    })
                }
                WorkerStatus::Starting | WorkerStatus::Crashed => {
                    return Err(WorkerError::NotReady(namespace.to_string()))
                }
                WorkerStatus::Ready => {}
            }
            state
                .outbound
                .clone()
                .ok_or_else(|| WorkerError::NotReady(namespace.to_string()))?
        };

        let call_id = toolhost_ids::CallId::new().to_string();
        let (tx, rx) = oneshot::channel();
        self.pending
            .lock()
            .await
            .insert(call_id.clone(), namespace.to_string(), tx);

        let frame = ServerToWorker::Call {
            id: call_id.clone(),
            function_name: function_name.to_string(),
            args,
        };
        if outbound.send(frame).is_err() {
            self.pending.lock().await.remove(&call_id);
            return Err(WorkerError::Crashed);
        }

        toolhost_protocol::METRICS.call_started();
        let outcome = match timeout(CALL_TIMEOUT, rx).await {
            Ok(Ok(Ok(value))) => Ok(value),
            Ok(Ok(Err(message))) => Err(WorkerError::CallFailed(message)),
            Ok(Err(_)) => Err(WorkerError::Crashed),
            Err(_) => {
                self.pending.lock().await.remove(&call_id);
                Err(WorkerError::Timeout)
            }
        };
        toolhost_protocol::METRICS.call_finished();
        outcome
    }

    /// Sends a shutdown frame to every attached worker and returns once
    /// every worker has either acknowledged disconnect or the grace
    /// period elapses; callers then force-kill stragglers.
    pub async fn shutdown_all(&self, grace: Duration) {
        {
            let workers = self.workers.lock().await;
            for state in workers.values() {
                if let Some(outbound) = &state.outbound {
                    let _ = outbound.send(ServerToWorker::Shutdown);
                }
            }
        }
        tokio::time::sleep(grace).await;
        let mut workers = self.workers.lock().await;
        for state in workers.values_mut() {
            if let Some(child) = state.child.as_mut() {
                let _ = child.start_kill();
            }
        }
    }

    /// Polls until every known worker has settled into `Ready` or
    /// `Failed`, or `deadline` elapses.
    pub async fn wait_for_ready(&self, deadline: Duration) {
        let start = Instant::now();
        loop {
            let settled = {
                let workers = self.workers.lock().await;
                workers
                    .values()
                    .all(|s| matches!(s.status, WorkerStatus::Ready | WorkerStatus::Failed))
            };
            if settled || start.elapsed() >= deadline {
                return;
            }
            tokio::time::sleep(Duration::from_millis(25)).await;
        }
    }

    pub async fn status_snapshot(&self) -> Vec<(String, WorkerStatus)> {
        self.workers
            .lock()
            .await
            .iter()
            .map(|(ns, s)| (ns.clone(), s.status))
            .collect()
    }

    #[cfg(test)]
    async fn pending_ids(&self) -> Vec<String> {
        self.pending.lock().await.ids()
    }

    #[cfg(test)]
    async fn generation_of(&self, namespace: &str) -> u64 {
        self.workers.lock().await.get(namespace).unwrap().generation
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    // A worker command that stays alive for the whole test, so status
    // transitions happen only when a test drives them.
    fn supervisor() -> Arc<WorkerSupervisor> {
        WorkerSupervisor::new(
            WorkerCommand {
                program: "sleep".into(),
                args: vec!["60".into()],
            },
            "tcp://127.0.0.1:0",
        )
    }

    #[tokio::test]
    async fn call_to_unknown_namespace_errors() {
        let sup = supervisor();
        let err = sup
            .call_function("missing", "fn", Value::Null)
            .await
            .unwrap_err();
        assert!(matches!(err, WorkerError::UnknownNamespace(_)));
    }

    #[tokio::test]
    async fn call_before_ready_is_rejected_synchronously() {
        let sup = supervisor();
        sup.spawn_worker("file", "/tmp/file.ts").await.unwrap();
        let err = sup.call_function("file", "add", Value::Null).await.unwrap_err();
        assert!(matches!(err, WorkerError::NotReady(_)));
    }

    #[tokio::test]
    async fn resolves_pending_call_on_result_frame() {
        let sup = supervisor();
        sup.spawn_worker("file", "/tmp/file.ts").await.unwrap();
        let (tx, _rx) = mpsc::unbounded_channel();
        sup.attach("file", tx).await;
        sup.mark_ready("file").await;

        let sup2 = Arc::clone(&sup);
        let call = tokio::spawn(async move {
            sup2.call_function("file", "add", serde_json::json!({"a": 1})).await
        });

        let call_id = loop {
            let ids = sup.pending_ids().await;
            if let Some(id) = ids.into_iter().next() {
                break id;
            }
            tokio::time::sleep(Duration::from_millis(5)).await;
        };

        sup.resolve_call(&call_id, Ok(serde_json::json!(2))).await;
        let result = call.await.unwrap().unwrap();
        assert_eq!(result, serde_json::json!(2));
    }

    #[tokio::test]
    async fn call_error_from_a_ready_worker_is_call_failed_not_permanent() {
        let sup = supervisor();
        sup.spawn_worker("file", "/tmp/file.ts").await.unwrap();
        let (tx, _rx) = mpsc::unbounded_channel();
        sup.attach("file", tx).await;
        sup.mark_ready("file").await;

        let sup2 = Arc::clone(&sup);
        let call = tokio::spawn(async move {
            sup2.call_function("file", "add", Value::Null).await
        });

        let call_id = loop {
            let ids = sup.pending_ids().await;
            if let Some(id) = ids.into_iter().next() {
                break id;
            }
            tokio::time::sleep(Duration::from_millis(5)).await;
        };

        sup.resolve_call(&call_id, Err("boom: bad args".to_string())).await;
        let err = call.await.unwrap().unwrap_err();
        assert!(matches!(err, WorkerError::CallFailed(ref m) if m == "boom: bad args"));
        // A single call failure must not flip a Ready worker to Failed/Crashed.
        let statuses = sup.status_snapshot().await;
        assert_eq!(statuses[0].1 as u8, WorkerStatus::Ready as u8);
    }

    #[tokio::test(start_paused = true)]
    async fn restart_worker_bumps_generation_and_replaces_the_process() {
        let sup = supervisor();
        sup.spawn_worker("file", "/tmp/file.ts").await.unwrap();
        let initial_generation = sup.workers.lock().await.get("file").unwrap().generation;

        let sup2 = Arc::clone(&sup);
        let restart = tokio::spawn(async move { sup2.restart_worker("file", "/tmp/file.ts").await });
        tokio::time::advance(RESTART_GRACE + Duration::from_millis(10)).await;
        restart.await.unwrap().unwrap();

        let statuses = sup.status_snapshot().await;
        assert_eq!(statuses.len(), 1);
        let new_generation = sup.workers.lock().await.get("file").unwrap().generation;
        assert!(new_generation > initial_generation);
    }

    #[tokio::test]
    async fn crash_respawn_keeps_ever_ready_credit() {
        let sup = supervisor();
        sup.spawn_worker("file", "/tmp/file.ts").await.unwrap();
        let (tx, _rx) = mpsc::unbounded_channel();
        sup.attach("file", tx).await;
        sup.mark_ready("file").await;
        sup.handle_crash("file", sup.generation_of("file").await, "first".into()).await;

        // The respawned process keeps its ever-ready credit, so a second
        // crash before a new ready handshake schedules another restart
        // instead of marking the namespace permanently failed.
        sup.spawn_worker("file", "/tmp/file.ts").await.unwrap();
        sup.handle_crash("file", sup.generation_of("file").await, "second".into()).await;
        let statuses = sup.status_snapshot().await;
        assert_eq!(statuses[0].1, WorkerStatus::Crashed);
    }

    #[tokio::test]
    async fn permanently_failed_worker_never_restarts() {
        let sup = supervisor();
        sup.spawn_worker("file", "/tmp/file.ts").await.unwrap();
        sup.handle_crash("file", sup.generation_of("file").await, "boom".into()).await;
        let statuses = sup.status_snapshot().await;
        assert_eq!(statuses[0].1 as u8, WorkerStatus::Failed as u8);
        let err = sup.call_function("file", "add", Value::Null).await.unwrap_err();
        assert!(matches!(err, WorkerError::PermanentlyFailed { .. }));
    }
}
