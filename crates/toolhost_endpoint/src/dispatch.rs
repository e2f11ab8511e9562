use serde_json::Value;

use toolhost_ids::SessionId;
use toolhost_protocol::ClientRequest;
use toolhost_protocol::ClientResponse;
use toolhost_router::{classify, Route};

use crate::state::EndpointState;

/// Routes one inbound frame to the sandbox, a worker, or the MCP
/// registry, and builds the reply frame. Never panics on a malformed
/// request; every branch produces an `error` frame instead.
pub async fn dispatch(state: &EndpointState, request: ClientRequest) -> ClientResponse {
    let id = request.id().to_string();
    let route = classify(&request);

    match route {
        Route::Invalid(message) => ClientResponse::error(Some(id), message),
        Route::RunScript => {
            let ClientRequest::RunScript { script, session_id, stdin, .. } = request else {
                unreachable!("classify only returns RunScript for RunScript frames");
            };
            let session = session_id.and_then(|raw| SessionId::parse(&raw).ok());
            run_script(state, &id, &script, session, stdin).await
        }
        Route::Rpc { namespace, function } => {
            let args = call_args(&request);
            match state.supervisor.call_function(&namespace, &function, args).await {
                Ok(value) => ClientResponse::result(id, value),
                Err(err) => ClientResponse::error(Some(id), err.to_string()),
            }
        }
        Route::Mcp { server, operation } => {
            let args = call_args(&request);
            let registry = state.mcp.read().await;
            match registry.dispatch(&server, &operation, args).await {
                Ok(value) => ClientResponse::result(id, value),
                Err(err) => ClientResponse::error(Some(id), err.to_string()),
            }
        }
    }
}

fn call_args(request: &ClientRequest) -> Value {
    match request {
        ClientRequest::Call { args, .. } => args.clone(),
        ClientRequest::RunScript { .. } => Value::Null,
    }
}

/// Views over piped input, prepended to any script that arrives with a
/// `stdin` string so `stdin.text()`/`.json()`/`.lines()`/`.raw()` work
/// without the script wiring anything up itself. The raw string is
/// embedded as a JSON literal, so the binding works the same in any
/// script runtime regardless of how it exposes real OS stdin.
fn stdin_prelude(raw: &str) -> String {
    let literal = serde_json::to_string(raw).unwrap_or_else(|_| "\"\"".to_string());
    format!(
        "const stdin = ((raw) => ({{\n  raw: () => raw,\n  text: () => raw,\n  json: () => JSON.parse(raw),\n  lines: () => raw.split(\"\\n\").filter((line) => line.length > 0),\n}}))({literal});\n"
    )
}

async fn run_script(
    state: &EndpointState,
    id: &str,
    script: &str,
    session: Option<SessionId>,
    stdin: Option<String>,
) -> ClientResponse {
    let composed;
    let script = match &stdin {
        Some(raw) => {
            composed = format!("{}{script}", stdin_prelude(raw));
            composed.as_str()
        }
        None => script,
    };
    // The import URL carries the synthesiser's version counter so a
    // freshly reloaded tool set busts the runtime's module cache.
    let module_url = {
        let synth = state.synthesiser.lock().await;
        format!("{}?v={}", state.client_module_url, synth.version())
    };
    match state
        .sandbox
        .execute(script, &module_url, session, stdin.as_deref())
        .await
    {
        Ok(outcome) if outcome.success => {
            if let Some(warnings) = &outcome.warnings {
                tracing::warn!(id = %id, warnings = %warnings, "script succeeded with stderr output");
            }
            ClientResponse::result(id.to_string(), Value::String(outcome.output))
        }
        Ok(outcome) => ClientResponse::error(
            Some(id.to_string()),
            outcome.error.unwrap_or_else(|| "script execution failed".to_string()),
        ),
        Err(err) => ClientResponse::error(Some(id.to_string()), err.to_string()),
    }
}
