//! Integration tests over the whole endpoint: extraction feeding the
//! synthesiser, the axum HTTP surface reading its caches, and the
//! dispatch path running a real sandbox subprocess.

use std::sync::Arc;

use axum::body::Body;
use axum::http::{header, Request, StatusCode};
use tower::ServiceExt;

use toolhost_endpoint::{build_router, dispatch, EndpointState};
use toolhost_extract::extract_source;
use toolhost_mcp::McpRegistry;
use toolhost_protocol::{ClientRequest, ClientResponse};
use toolhost_runlog::RunLog;
use toolhost_sandbox::{SandboxCommand, SandboxExecutor};
use toolhost_synth::Synthesiser;
use toolhost_worker::{WorkerCommand, WorkerSupervisor};

const ADD_TOOL: &str = r#"
export interface AddArgs {
  a: number;
  b: number;
}

export function add(args: AddArgs): number {
  return args.a + args.b;
}
"#;

/// A fully wired state with one extracted namespace and a sandbox that
/// prints the composed temp file back, so tests can observe exactly what
/// a script subprocess would be handed.
fn populated_state(sandbox_args: &[&str]) -> Arc<EndpointState> {
    let extraction = extract_source("file", ADD_TOOL).unwrap();
    let mut synthesiser = Synthesiser::new("ws://127.0.0.1:9000/client");
    synthesiser.update(&[extraction], &[]);

    let run_log = Arc::new(RunLog::new(
        tempfile::tempdir().unwrap().path().join("runs.jsonl"),
    ));
    let sandbox = Arc::new(SandboxExecutor::new(
        SandboxCommand {
            program: "/bin/sh".into(),
            args: sandbox_args.iter().map(|s| s.to_string()).collect(),
        },
        run_log,
    ));
    let supervisor = WorkerSupervisor::new(
        WorkerCommand {
            program: "sleep".into(),
            args: vec!["60".into()],
        },
        "tcp://127.0.0.1:0",
    );
    EndpointState::new(
        synthesiser,
        supervisor,
        McpRegistry::new(),
        sandbox,
        "http://127.0.0.1:9000/client.ts",
    )
}

async fn get(state: Arc<EndpointState>, uri: &str) -> (StatusCode, String, Option<String>) {
    let app = build_router(state);
    let response = app
        .oneshot(Request::builder().uri(uri).body(Body::empty()).unwrap())
        .await
        .unwrap();
    let status = response.status();
    let content_type = response
        .headers()
        .get(header::CONTENT_TYPE)
        .map(|v| v.to_str().unwrap().to_string());
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    (status, String::from_utf8(bytes.to_vec()).unwrap(), content_type)
}

#[tokio::test]
async fn types_document_lists_the_extracted_namespace() {
    let (status, body, _) = get(populated_state(&["-c", "true"]), "/types").await;
    assert_eq!(status, StatusCode::OK);
    assert!(body.contains("interface FileAddArgs"));
    assert!(body.contains("add(args: FileAddArgs): number;"));
    assert!(body.contains("interface Tools"));
}

#[tokio::test]
async fn filtered_types_document_excludes_other_namespaces() {
    let state = populated_state(&["-c", "true"]);
    let (_, full, _) = get(Arc::clone(&state), "/types/file").await;
    assert!(full.contains("file:"));
    let (_, empty, _) = get(state, "/types/nonexistent").await;
    assert!(!empty.contains("file:"));
}

#[tokio::test]
async fn client_module_is_served_as_javascript() {
    let (status, body, content_type) =
        get(populated_state(&["-c", "true"]), "/client.ts").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(content_type.as_deref(), Some("application/javascript"));
    assert!(body.contains("export const tools"));
    assert!(body.contains("file.add"));
}

#[tokio::test]
async fn namespaces_catalogue_counts_functions() {
    let (_, body, _) = get(populated_state(&["-c", "true"]), "/namespaces").await;
    assert!(body.contains("## file (1 functions)"));
}

#[tokio::test]
async fn openapi_descriptor_names_each_namespace() {
    let (status, body, _) = get(populated_state(&["-c", "true"]), "/openapi.json").await;
    assert_eq!(status, StatusCode::OK);
    let doc: serde_json::Value = serde_json::from_str(&body).unwrap();
    assert!(doc["paths"].get("/rpc/file").is_some());
}

#[tokio::test]
async fn doc_page_renders_the_catalogue_as_html() {
    let (_, body, content_type) = get(populated_state(&["-c", "true"]), "/doc").await;
    assert_eq!(content_type.as_deref(), Some("text/html"));
    assert!(body.contains("<pre>"));
    assert!(body.contains("file (1 functions)"));
}

#[tokio::test]
async fn script_dispatch_returns_captured_stdout_as_result() {
    let state = populated_state(&["-c", "echo 30"]);
    let request = ClientRequest::RunScript {
        script: "console.log(await tools.file.add({a: 10, b: 20}))".into(),
        session_id: None,
        stdin: None,
        id: "y".into(),
    };
    match dispatch(&state, request).await {
        ClientResponse::Result { result, id } => {
            assert_eq!(id, "y");
            assert_eq!(result, serde_json::json!("30\n"));
        }
        other => panic!("expected a result frame, got {other:?}"),
    }
}

#[tokio::test]
async fn piped_stdin_gets_a_helper_binding_prepended() {
    // `cat "$0"` prints the composed temp file, exposing what the script
    // subprocess is actually handed.
    let state = populated_state(&["-c", r#"cat "$0""#]);
    let request = ClientRequest::RunScript {
        script: "console.log(stdin.lines().length)".into(),
        session_id: None,
        stdin: Some("a,b\n1,2\n".into()),
        id: "z".into(),
    };
    match dispatch(&state, request).await {
        ClientResponse::Result { result, .. } => {
            let composed = result.as_str().unwrap();
            assert!(composed.starts_with("import { tools } from"));
            assert!(composed.contains("const stdin = ((raw)"));
            assert!(composed.contains(r#""a,b\n1,2\n""#));
            assert!(composed.contains("console.log(stdin.lines().length)"));
        }
        other => panic!("expected a result frame, got {other:?}"),
    }
}

#[tokio::test]
async fn failed_script_surfaces_stderr_in_the_error_frame() {
    let state = populated_state(&["-c", "echo boom 1>&2; exit 1"]);
    let request = ClientRequest::RunScript {
        script: "throw new Error()".into(),
        session_id: None,
        stdin: None,
        id: "f".into(),
    };
    match dispatch(&state, request).await {
        ClientResponse::Error { error, id } => {
            assert_eq!(id.as_deref(), Some("f"));
            assert!(error.contains("boom"));
        }
        other => panic!("expected an error frame, got {other:?}"),
    }
}
