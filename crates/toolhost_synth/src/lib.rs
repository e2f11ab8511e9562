//! Client synthesiser: turns the current extraction results and MCP
//! schemas into three cached, strictly-derived artifacts (a namespace
//! catalogue, a types document, and a runnable client module) plus a
//! namespace-filtered types document computed on demand.

mod catalogue;
mod client_module;
mod types_doc;
mod view;

pub use catalogue::build_catalogue;
pub use client_module::build_client_module;
pub use types_doc::{build_filtered_types_document, build_types_document, qualified_type_name};
pub use view::{mcp_namespaces, local_namespaces, FunctionView, NamespaceView};

use toolhost_extract::ExtractionResult;
use toolhost_mcp::{McpResourceSchema, McpToolSchema};
use toolhost_protocol::NamespaceSummary;

/// Owns the current set of namespace views and memoises the three
/// derived documents; `update` (driven by tool-index reconcile
/// notifications) replaces the views and drops every cache.
pub struct Synthesiser {
    endpoint_url: String,
    namespaces: Vec<NamespaceView>,
    version: u64,
    cached_catalogue: Option<String>,
    cached_types: Option<String>,
    cached_client_module: Option<String>,
}

impl Synthesiser {
    pub fn new(endpoint_url: impl Into<String>) -> Self {
        Self {
            endpoint_url: endpoint_url.into(),
            namespaces: Vec::new(),
            version: 0,
            cached_catalogue: None,
            cached_types: None,
            cached_client_module: None,
        }
    }

    /// Replaces the namespace set from fresh extraction results and MCP
    /// schema snapshots. A rebuild that produces the same namespace set
    /// is a no-op: the caches stay valid and the version counter does
    /// not move, keeping repeated reconciles with no filesystem change
    /// byte-identical across all three artifacts.
    pub fn update(
        &mut self,
        extractions: &[ExtractionResult],
        mcp_servers: &[(String, Vec<McpToolSchema>, Vec<McpResourceSchema>)],
    ) {
        let mut namespaces = local_namespaces(extractions);
        namespaces.extend(mcp_namespaces(mcp_servers));
        if namespaces == self.namespaces {
            return;
        }
        self.namespaces = namespaces;
        self.version += 1;
        self.cached_catalogue = None;
        self.cached_types = None;
        self.cached_client_module = None;
    }

    /// Cache-busting counter for the sandbox's module-import URL. Only
    /// bumped when the namespace set actually changes; the client module
    /// itself connects to the plain websocket endpoint URL.
    pub fn version(&self) -> u64 {
        self.version
    }

    pub fn namespace_names(&self) -> Vec<String> {
        self.namespaces.iter().map(|ns| ns.name.clone()).collect()
    }

    /// The `functions` list sent verbatim in `welcome`/`functions_updated`
    /// frames.
    pub fn namespace_summaries(&self) -> Vec<NamespaceSummary> {
        self.namespaces
            .iter()
            .map(|ns| NamespaceSummary {
                namespace: ns.name.clone(),
                functions: ns.functions.iter().map(|f| f.name.clone()).collect(),
            })
            .collect()
    }

    pub fn catalogue(&mut self) -> &str {
        if self.cached_catalogue.is_none() {
            self.cached_catalogue = Some(build_catalogue(&self.namespaces));
        }
        self.cached_catalogue.as_deref().unwrap()
    }

    pub fn types_document(&mut self) -> &str {
        if self.cached_types.is_none() {
            self.cached_types = Some(build_types_document(&self.namespaces));
        }
        self.cached_types.as_deref().unwrap()
    }

    pub fn filtered_types_document(&self, only: &[String]) -> String {
        build_filtered_types_document(&self.namespaces, only)
    }

    pub fn client_module(&mut self) -> &str {
        if self.cached_client_module.is_none() {
            self.cached_client_module =
                Some(build_client_module(&self.namespaces, &self.endpoint_url));
        }
        self.cached_client_module.as_deref().unwrap()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use toolhost_extract::extract_source;

    #[test]
    fn reconcile_with_no_change_is_byte_identical() {
        let extraction = extract_source(
            "file",
            "export function add(args: { a: number; b: number }): number { return args.a + args.b; }",
        )
        .unwrap();

        let mut synth = Synthesiser::new("ws://localhost:9000/client");
        synth.update(&[extraction.clone()], &[]);
        let first_catalogue = synth.catalogue().to_string();
        let first_types = synth.types_document().to_string();
        let first_module = synth.client_module().to_string();

        synth.update(&[extraction], &[]);
        let second_catalogue = synth.catalogue().to_string();
        let second_types = synth.types_document().to_string();
        let second_module = synth.client_module().to_string();

        assert_eq!(first_catalogue, second_catalogue);
        assert_eq!(first_types, second_types);
        assert_eq!(first_module, second_module);
    }

    #[test]
    fn version_moves_only_when_the_namespace_set_changes() {
        let extraction = extract_source(
            "file",
            "export function add(args: { a: number; b: number }): number { return args.a + args.b; }",
        )
        .unwrap();

        let mut synth = Synthesiser::new("ws://localhost:9000/client");
        synth.update(&[extraction.clone()], &[]);
        let after_first = synth.version();

        synth.update(&[extraction], &[]);
        assert_eq!(synth.version(), after_first);

        synth.update(&[], &[]);
        assert_eq!(synth.version(), after_first + 1);
    }
}
