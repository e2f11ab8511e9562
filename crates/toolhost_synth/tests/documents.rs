//! Pipeline tests: tool source text and MCP schemas in, the three
//! derived artifacts out, checked for cross-artifact consistency.

use toolhost_extract::extract_source;
use toolhost_mcp::{McpResourceSchema, McpToolSchema, ResourceUri};
use toolhost_synth::Synthesiser;

const FILE_TOOL: &str = r#"
export interface Args {
  path: string;
  limit?: number;
}

/**
 * Reads a file's head.
 */
export async function head(args: Args): Promise<string> {
  return args.path;
}

export const meta = {
  description: "file helpers",
  useWhen: "working with files",
  tags: ["fs"],
};
"#;

const MATH_TOOL: &str = r#"
export interface Args {
  a: number;
  b: number;
}

export function add(args: Args): number {
  return args.a + args.b;
}
"#;

fn synthesiser_with_local_tools() -> Synthesiser {
    let extractions = vec![
        extract_source("file", FILE_TOOL).unwrap(),
        extract_source("math", MATH_TOOL).unwrap(),
    ];
    let mut synth = Synthesiser::new("ws://127.0.0.1:9000/client");
    synth.update(&extractions, &[]);
    synth
}

#[test]
fn colliding_type_names_are_disambiguated_per_namespace() {
    let mut synth = synthesiser_with_local_tools();
    let types = synth.types_document();
    // Both namespaces declare `Args`; each must get its own declaration
    // and each signature must point at its own.
    assert!(types.contains("interface FileArgs"));
    assert!(types.contains("interface MathArgs"));
    assert!(types.contains("head(args: FileArgs): Promise<string>;"));
    assert!(types.contains("add(args: MathArgs): number;"));
}

#[test]
fn catalogue_carries_namespace_metadata() {
    let mut synth = synthesiser_with_local_tools();
    let catalogue = synth.catalogue();
    assert!(catalogue.contains("## file (1 functions)"));
    assert!(catalogue.contains("file helpers"));
    assert!(catalogue.contains("Use when: working with files"));
    assert!(catalogue.contains("Tags: fs"));
    assert!(catalogue.contains("## math (1 functions)"));
}

#[test]
fn client_module_binds_every_catalogued_function() {
    let mut synth = synthesiser_with_local_tools();
    let module = synth.client_module().to_string();
    assert!(module.contains("callRpc(\"file.head\", args)"));
    assert!(module.contains("callRpc(\"math.add\", args)"));
    // The module connects to the plain websocket URL; only the sandbox's
    // HTTP import of the module itself is version-stamped.
    assert!(module.contains("const ENDPOINT_URL = \"ws://127.0.0.1:9000/client\";"));
}

#[test]
fn mcp_servers_appear_as_prefixed_namespaces() {
    let mut synth = Synthesiser::new("ws://127.0.0.1:9000/client");
    synth.update(
        &[],
        &[(
            "github_mcp".to_string(),
            vec![McpToolSchema {
                name: "search".into(),
                description: Some("search issues".into()),
                input_schema: serde_json::json!({"type": "object"}),
            }],
            vec![McpResourceSchema {
                name: "repo".into(),
                description: None,
                uri: ResourceUri::Template("repo://{owner}/{name}".into()),
            }],
        )],
    );

    let catalogue = synth.catalogue().to_string();
    assert!(catalogue.contains("## mcp_github_mcp (2 functions)"));

    let types = synth.types_document().to_string();
    assert!(types.contains("mcp_github_mcp:"));
    assert!(types.contains("search(args: object): Promise<ToolResult>;"));
    assert!(types.contains("resource_repo(args: object): Promise<ToolResult>;"));

    let module = synth.client_module().to_string();
    assert!(module.contains("callRpc(\"mcp_github_mcp.search\", args)"));
    assert!(module.contains("callRpc(\"mcp_github_mcp.resource_repo\", args)"));
}

#[test]
fn filtered_document_restricts_to_the_requested_namespaces() {
    let synth = synthesiser_with_local_tools();
    let filtered = synth.filtered_types_document(&["math".to_string()]);
    assert!(filtered.contains("math:"));
    assert!(filtered.contains("interface MathArgs"));
    assert!(!filtered.contains("file:"));
    assert!(!filtered.contains("interface FileArgs"));
}
