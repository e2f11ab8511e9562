//! Static extraction of function signatures and type definitions from tool
//! source files.
//!
//! Tool files are TypeScript modules. We parse them with `tree-sitter`
//! rather than loading and executing them: the server never runs
//! arbitrary tool-author code outside a worker subprocess, extraction
//! included.

mod doc;
mod types;

pub use types::{
    Doc, ExtractionResult, ExtractionWarning, NamespaceMetadata, PropertyDef, Signature,
    TypeDefinition,
};

use thiserror::Error;
use tree_sitter::{Node, Parser};

#[derive(Debug, Error)]
pub enum ExtractError {
    #[error("failed to initialise parser: {0}")]
    Language(String),
    #[error("failed to parse source as TypeScript")]
    Parse,
}

/// Extract signatures, types and namespace metadata from one tool file's
/// source text. `source_name` is the namespace this file will become.
pub fn extract_source(source_name: &str, source: &str) -> Result<ExtractionResult, ExtractError> {
    let mut parser = Parser::new();
    let language = tree_sitter_typescript::language_typescript();
    parser
        .set_language(&language)
        .map_err(|e| ExtractError::Language(e.to_string()))?;

    let tree = parser.parse(source, None).ok_or(ExtractError::Parse)?;
    let root = tree.root_node();

    let mut result = ExtractionResult {
        source_name: source_name.to_string(),
        ..Default::default()
    };

    let mut cursor = root.walk();
    for child in root.children(&mut cursor) {
        visit_top_level(child, source, &mut result);
    }

    if !result.warnings.is_empty() {
        tracing::debug!(
            source = %source_name,
            warnings = result.warnings.len(),
            "extraction completed with rejected definitions"
        );
    }

    Ok(result)
}

fn visit_top_level(node: Node, src: &str, result: &mut ExtractionResult) {
    match node.kind() {
        "export_statement" => {
            if let Some(inner) = node.child_by_field_name("declaration") {
                visit_export_declaration(node, inner, src, result);
            }
        }
        "interface_declaration" | "type_alias_declaration" => {
            if let Some(def) = parse_type_definition(node, src) {
                result.types.push(def);
            }
        }
        _ => {}
    }
}

fn visit_export_declaration(export_node: Node, decl: Node, src: &str, result: &mut ExtractionResult) {
    match decl.kind() {
        "function_declaration" => match parse_function(export_node, decl, src) {
            Ok(Some(sig)) => result.signatures.push(sig),
            Ok(None) => {}
            Err(w) => result.warnings.push(w),
        },
        "interface_declaration" | "type_alias_declaration" => {
            if let Some(def) = parse_type_definition(decl, src) {
                result.types.push(def);
            }
        }
        "lexical_declaration" => {
            if let Some(meta) = parse_meta_export(decl, src) {
                result.metadata = Some(meta);
            }
        }
        _ => {}
    }
}

fn parse_function(
    export_node: Node,
    decl: Node,
    src: &str,
) -> Result<Option<Signature>, ExtractionWarning> {
    let line = export_node.start_position().row + 1;
    let name = decl
        .child_by_field_name("name")
        .map(|n| normalize_identifier(&text(n, src)))
        .ok_or_else(|| warn("anonymous exported function skipped", line))?;

    let is_async = decl
        .children(&mut decl.walk())
        .any(|c| c.kind() == "async");

    let params = decl
        .child_by_field_name("parameters")
        .ok_or_else(|| warn(&format!("{name}: missing parameter list"), line))?;

    let param_nodes: Vec<Node> = params
        .children(&mut params.walk())
        .filter(|c| c.kind() == "required_parameter" || c.kind() == "optional_parameter")
        .collect();

    if param_nodes.len() != 1 {
        return Err(warn(
            &format!("{name}: must take exactly one parameter named `args`"),
            line,
        ));
    }

    let param = param_nodes[0];
    let param_name = param
        .child_by_field_name("pattern")
        .map(|n| text(n, src))
        .unwrap_or_default();
    if param_name != "args" {
        return Err(warn(
            &format!("{name}: parameter must be named `args`, found `{param_name}`"),
            line,
        ));
    }

    // An explicit annotation is preferred; without one the parameter is
    // still accepted, typed as a bare object.
    let args_type = param
        .child_by_field_name("type")
        .map(|n| type_annotation_text(n, src))
        .unwrap_or_else(|| "object".to_string());

    let return_type = decl
        .child_by_field_name("return_type")
        .map(|n| type_annotation_text(n, src))
        .unwrap_or_else(|| "void".to_string());

    let doc = doc::extract_leading_doc(export_node, src);

    Ok(Some(Signature {
        name,
        args_type,
        return_type,
        is_async,
        doc,
    }))
}

fn parse_type_definition(decl: Node, src: &str) -> Option<TypeDefinition> {
    let name = decl.child_by_field_name("name").map(|n| text(n, src))?;
    let body = decl.child_by_field_name("body")?;

    let mut properties = Vec::new();
    let mut cursor = body.walk();
    for member in body.children(&mut cursor) {
        if member.kind() != "property_signature" {
            continue;
        }
        let Some(prop_name) = member.child_by_field_name("name").map(|n| text(n, src)) else {
            continue;
        };
        let optional = member
            .children(&mut member.walk())
            .any(|c| c.kind() == "?");
        let type_text = member
            .child_by_field_name("type")
            .map(|n| type_annotation_text(n, src))
            .unwrap_or_else(|| "unknown".to_string());
        properties.push(PropertyDef {
            name: prop_name,
            type_text,
            optional,
            doc: None,
        });
    }

    Some(TypeDefinition { name, properties })
}

/// Recognises `export const meta = { description: "...", useWhen: "...",
/// tags: [...] };` as namespace metadata.
fn parse_meta_export(decl: Node, src: &str) -> Option<NamespaceMetadata> {
    let mut cursor = decl.walk();
    let declarator = decl
        .children(&mut cursor)
        .find(|c| c.kind() == "variable_declarator")?;
    let name_node = declarator.child_by_field_name("name")?;
    if text(name_node, src) != "meta" {
        return None;
    }
    let value = declarator.child_by_field_name("value")?;
    if value.kind() != "object" {
        return None;
    }

    let mut meta = NamespaceMetadata::default();
    let mut vcursor = value.walk();
    for pair in value.children(&mut vcursor) {
        if pair.kind() != "pair" {
            continue;
        }
        let Some(key_node) = pair.child_by_field_name("key") else {
            continue;
        };
        let Some(val_node) = pair.child_by_field_name("value") else {
            continue;
        };
        let key = text(key_node, src).trim_matches('"').trim_matches('\'').to_string();
        match key.as_str() {
            "description" => meta.description = Some(string_literal_text(val_node, src)),
            "useWhen" => meta.use_when = Some(string_literal_text(val_node, src)),
            "tags" => {
                if val_node.kind() == "array" {
                    let mut acursor = val_node.walk();
                    meta.tags = val_node
                        .children(&mut acursor)
                        .filter(|c| c.kind() == "string")
                        .map(|c| string_literal_text(c, src))
                        .collect();
                }
            }
            _ => {}
        }
    }
    Some(meta)
}

fn string_literal_text(node: Node, src: &str) -> String {
    text(node, src).trim_matches('"').trim_matches('\'').to_string()
}

fn type_annotation_text(node: Node, src: &str) -> String {
    let raw = text(node, src);
    raw.trim_start_matches(':').trim().to_string()
}

fn text(node: Node, src: &str) -> String {
    node.utf8_text(src.as_bytes()).unwrap_or_default().to_string()
}

/// Method-string segments allow only `[A-Za-z0-9_]`; a source identifier
/// using anything else (TypeScript permits `$`) has each disallowed
/// character replaced with `_`.
fn normalize_identifier(name: &str) -> String {
    name.chars()
        .map(|ch| if ch.is_ascii_alphanumeric() || ch == '_' { ch } else { '_' })
        .collect()
}

fn warn(message: &str, line: usize) -> ExtractionWarning {
    ExtractionWarning {
        message: message.to_string(),
        line,
    }
}
