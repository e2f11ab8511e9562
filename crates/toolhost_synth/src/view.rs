use toolhost_extract::{ExtractionResult, TypeDefinition};
use toolhost_mcp::{McpResourceSchema, McpToolSchema, RESOURCE_FUNCTION_PREFIX};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FunctionView {
    pub name: String,
    pub args_type: String,
    pub return_type: String,
    pub is_async: bool,
    pub description: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct NamespaceView {
    pub name: String,
    pub description: Option<String>,
    pub use_when: Option<String>,
    pub tags: Vec<String>,
    pub functions: Vec<FunctionView>,
    pub types: Vec<TypeDefinition>,
}

/// Builds one local-namespace view per extraction result. Extraction
/// warnings are dropped here; they are surfaced to the operator
/// elsewhere, not in synthesised client-facing artifacts.
pub fn local_namespaces(extractions: &[ExtractionResult]) -> Vec<NamespaceView> {
    extractions
        .iter()
        .map(|result| NamespaceView {
            name: result.source_name.clone(),
            description: result.metadata.as_ref().and_then(|m| m.description.clone()),
            use_when: result.metadata.as_ref().and_then(|m| m.use_when.clone()),
            tags: result.metadata.as_ref().map(|m| m.tags.clone()).unwrap_or_default(),
            functions: result
                .signatures
                .iter()
                .map(|sig| FunctionView {
                    name: sig.name.clone(),
                    args_type: sig.args_type.clone(),
                    return_type: sig.return_type.clone(),
                    is_async: sig.is_async,
                    description: sig.doc.description.clone(),
                })
                .collect(),
            types: result.types.clone(),
        })
        .collect()
}

/// Builds one `mcp_<server>` namespace view per connected MCP server.
/// Tools become plain async functions; resources become
/// `resource_<name>` functions taking the template's variables as args.
pub fn mcp_namespaces(
    servers: &[(String, Vec<McpToolSchema>, Vec<McpResourceSchema>)],
) -> Vec<NamespaceView> {
    servers
        .iter()
        .map(|(sanitised_name, tools, resources)| {
            let mut functions: Vec<FunctionView> = tools
                .iter()
                .map(|tool| FunctionView {
                    name: tool.name.clone(),
                    args_type: "object".to_string(),
                    return_type: "Promise<ToolResult>".to_string(),
                    is_async: true,
                    description: tool.description.clone(),
                })
                .collect();

            functions.extend(resources.iter().map(|resource| FunctionView {
                name: format!("{RESOURCE_FUNCTION_PREFIX}{}", resource.name),
                args_type: "object".to_string(),
                return_type: "Promise<ToolResult>".to_string(),
                is_async: true,
                description: resource.description.clone(),
            }));

            NamespaceView {
                name: format!("mcp_{sanitised_name}"),
                description: None,
                use_when: None,
                tags: vec![],
                functions,
                types: vec![],
            }
        })
        .collect()
}
