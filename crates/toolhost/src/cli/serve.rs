use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::Args;

use toolhost_extract::extract_source;
use toolhost_index::{FileWatcher, ToolIndex};
use toolhost_mcp::client::rmcp_backed::RmcpClient;
use toolhost_mcp::{McpRegistry, McpResourceSchema, McpToolSchema};
use toolhost_runlog::RunLog;
use toolhost_sandbox::{SandboxCommand, SandboxExecutor};
use toolhost_synth::Synthesiser;
use toolhost_worker::{run_attachment_loop, WorkerCommand, WorkerSupervisor};

use crate::config::Config;

const SHUTDOWN_GRACE: Duration = Duration::from_secs(5);
const STARTUP_DEADLINE: Duration = Duration::from_secs(10);
const RECONCILE_POLL: Duration = Duration::from_millis(250);

#[derive(Args, Debug)]
pub struct ServeArgs {
    /// Override the config file's port.
    #[arg(long)]
    pub port: Option<u16>,
}

pub async fn run(args: ServeArgs, mut config: Config) -> Result<()> {
    if let Some(port) = args.port {
        config.port = port;
    }
    std::fs::create_dir_all(&config.data_dir)
        .with_context(|| format!("failed to create data directory {}", config.data_dir.display()))?;

    let mut index = ToolIndex::new(config.user_tool_dir(), config.tool_dir.clone());
    index.reconcile().context("failed initial tool directory scan")?;

    let mcp_registry = connect_mcp_servers(&config).await;

    let run_log = Arc::new(RunLog::new(config.run_log_path()));
    let retention = chrono::Duration::days(i64::from(config.retention_days));
    let prune_log = Arc::clone(&run_log);
    tokio::spawn(async move {
        let mut daily = tokio::time::interval(Duration::from_secs(24 * 60 * 60));
        loop {
            daily.tick().await;
            prune_log.prune_older_than(chrono::Utc::now() - retention).await;
        }
    });
    let sandbox = Arc::new(SandboxExecutor::new(
        SandboxCommand {
            program: config.sandbox_command.clone(),
            args: config.sandbox_args.clone(),
        },
        run_log,
    ));

    let supervisor = WorkerSupervisor::new(
        WorkerCommand {
            program: config.worker_command.clone(),
            args: config.worker_args.clone(),
        },
        config.attach_addr(),
    );
    for file in index.files().values() {
        supervisor
            .spawn_worker(&file.name, &file.path.to_string_lossy())
            .await
            .with_context(|| format!("failed to spawn worker for namespace {}", file.name))?;
    }

    let attach_addr = config.attach_addr();
    let attach_supervisor = Arc::clone(&supervisor);
    tokio::spawn(async move {
        if let Err(e) = run_attachment_loop(attach_supervisor, &attach_addr).await {
            tracing::error!(error = %e, "worker attachment loop exited");
        }
    });

    supervisor.wait_for_ready(STARTUP_DEADLINE).await;
    for (namespace, status) in supervisor.status_snapshot().await {
        tracing::info!(namespace = %namespace, status = ?status, "worker settled");
    }

    let mut synthesiser = Synthesiser::new(config.client_base_url());
    let extractions = extract_all(&index);
    let mcp_snapshot = mcp_snapshot(&mcp_registry).await;
    synthesiser.update(&extractions, &mcp_snapshot);

    let state = toolhost_endpoint::EndpointState::new(
        synthesiser,
        Arc::clone(&supervisor),
        mcp_registry,
        Arc::clone(&sandbox),
        config.client_module_url(),
    );

    let router = toolhost_endpoint::build_router(Arc::clone(&state));
    let listener = tokio::net::TcpListener::bind(("127.0.0.1", config.port))
        .await
        .with_context(|| format!("failed to bind server port {}", config.port))?;
    tracing::info!(port = config.port, "toolhost listening");

    let watcher = FileWatcher::new(&[config.tool_dir.as_path(), config.user_tool_dir().as_path()])
        .context("failed to start file watcher")?;

    let reconcile_state = Arc::clone(&state);
    let reconcile_supervisor = Arc::clone(&supervisor);
    tokio::spawn(reconcile_loop(index, reconcile_state, reconcile_supervisor, watcher));

    let shutdown_supervisor = Arc::clone(&supervisor);
    axum::serve(listener, router)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("server loop exited with an error")?;

    tracing::info!("shutting down: notifying workers");
    shutdown_supervisor.shutdown_all(SHUTDOWN_GRACE).await;
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        let _ = tokio::signal::ctrl_c().await;
    };

    #[cfg(unix)]
    let terminate = async {
        let mut sigterm = tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("failed to install SIGTERM handler");
        sigterm.recv().await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {}
        _ = terminate => {}
    }
}

/// Connects every configured MCP server concurrently; a server that
/// fails to connect is reported and left out rather than blocking the
/// rest, and a server whose command resolves to this binary is skipped
/// to prevent the bridge from recursing into itself.
async fn connect_mcp_servers(config: &Config) -> McpRegistry {
    let mut registry = McpRegistry::new();
    let current_exe = std::env::current_exe().ok();

    let connects = config
        .mcp_servers
        .iter()
        .filter(|server| {
            let is_self = current_exe
                .as_deref()
                .is_some_and(|exe| McpRegistry::is_self_bridge(server, exe));
            if is_self {
                tracing::warn!(server = %server.name, "refusing to bridge to self; skipping");
            }
            !is_self
        })
        .map(|server| async move { (server, RmcpClient::connect(&server.transport).await) });

    for (server, connected) in futures::future::join_all(connects).await {
        match connected {
            Ok(client) => {
                let client: Arc<dyn toolhost_mcp::client::McpClient> = Arc::new(client);
                if let Err(e) = registry.register(server, client).await {
                    tracing::warn!(server = %server.name, error = %e, "failed to register mcp server");
                    registry.record_connect_failure(&server.name, e);
                }
            }
            Err(e) => {
                tracing::warn!(server = %server.name, error = %e, "failed to connect to mcp server");
                registry.record_connect_failure(&server.name, e);
            }
        }
    }

    registry
}

fn extract_all(index: &ToolIndex) -> Vec<toolhost_extract::ExtractionResult> {
    let mut extractions = Vec::new();
    for file in index.files().values() {
        match std::fs::read_to_string(&file.path) {
            Ok(source) => match extract_source(&file.name, &source) {
                Ok(result) => {
                    for w in &result.warnings {
                        tracing::warn!(
                            namespace = %file.name,
                            line = w.line,
                            "{}", w.message
                        );
                    }
                    extractions.push(result);
                }
                Err(e) => tracing::warn!(namespace = %file.name, error = %e, "failed to extract tool file"),
            },
            Err(e) => tracing::warn!(namespace = %file.name, error = %e, "failed to read tool file"),
        }
    }
    extractions
}

async fn mcp_snapshot(
    registry: &McpRegistry,
) -> Vec<(String, Vec<McpToolSchema>, Vec<McpResourceSchema>)> {
    registry
        .server_names()
        .map(|name| {
            (
                name.to_string(),
                registry.tools_for(name).unwrap_or(&[]).to_vec(),
                registry.resources_for(name).unwrap_or(&[]).to_vec(),
            )
        })
        .collect()
}

/// Drives the watcher, index, synthesiser and supervisor together:
/// re-scans the tool directories whenever
/// the watcher ticks or a crashed worker's backoff elapses, refreshes
/// the synthesiser cache, and notifies connected clients when the
/// namespace set actually changed.
async fn reconcile_loop(
    mut index: ToolIndex,
    state: Arc<toolhost_endpoint::EndpointState>,
    supervisor: Arc<WorkerSupervisor>,
    mut watcher: FileWatcher,
) {
    let mut restart_poll = tokio::time::interval(RECONCILE_POLL);

    loop {
        tokio::select! {
            tick = watcher.ticks.recv() => {
                if tick.is_none() {
                    break;
                }
                reconcile_once(&mut index, &state, &supervisor).await;
            }
            _ = restart_poll.tick() => {
                for namespace in supervisor.take_pending_restarts().await {
                    if let Some(file) = index.files().get(&namespace) {
                        let path = file.path.to_string_lossy().to_string();
                        if let Err(e) = supervisor.spawn_worker(&namespace, &path).await {
                            tracing::error!(namespace = %namespace, error = %e, "failed to restart worker");
                        }
                    }
                }
            }
        }
    }
}

async fn reconcile_once(
    index: &mut ToolIndex,
    state: &Arc<toolhost_endpoint::EndpointState>,
    supervisor: &Arc<WorkerSupervisor>,
) {
    let outcome = match index.reconcile() {
        Ok(outcome) => outcome,
        Err(e) => {
            tracing::warn!(error = %e, "tool directory reconcile failed");
            return;
        }
    };

    for name in &outcome.added {
        let Some(file) = index.files().get(name) else { continue };
        let path = file.path.to_string_lossy().to_string();
        if let Err(e) = supervisor.spawn_worker(name, &path).await {
            tracing::error!(namespace = %name, error = %e, "failed to spawn new worker");
        }
    }
    for name in &outcome.modified {
        let Some(file) = index.files().get(name) else { continue };
        let path = file.path.to_string_lossy().to_string();
        tracing::info!(namespace = %name, "tool file content changed; hot-reloading worker");
        if let Err(e) = supervisor.restart_worker(name, &path).await {
            tracing::error!(namespace = %name, error = %e, "failed to hot-reload worker");
        }
    }
    for name in &outcome.removed {
        tracing::info!(namespace = %name, "tool file removed; tearing down worker");
        supervisor.remove_worker(name).await;
    }

    // A rescan that found nothing different must leave the synthesised
    // artifacts byte-identical; only a real change re-extracts and
    // notifies connected clients.
    if !outcome.changed {
        return;
    }

    let extractions = extract_all(index);
    {
        let mut synth = state.synthesiser.lock().await;
        let mcp_snapshot: Vec<(String, Vec<McpToolSchema>, Vec<McpResourceSchema>)> = {
            let registry = state.mcp.read().await;
            registry
                .server_names()
                .map(|name| {
                    (
                        name.to_string(),
                        registry.tools_for(name).unwrap_or(&[]).to_vec(),
                        registry.resources_for(name).unwrap_or(&[]).to_vec(),
                    )
                })
                .collect()
        };
        synth.update(&extractions, &mcp_snapshot);
    }

    state.notify_functions_updated().await;
}
