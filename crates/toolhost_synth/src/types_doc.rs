use crate::view::NamespaceView;

fn capitalize(s: &str) -> String {
    let mut chars = s.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().collect::<String>() + chars.as_str(),
        None => String::new(),
    }
}

/// A record-type name prefixed by its namespace, avoiding collisions
/// between two namespaces that both declare e.g. `Args`.
pub fn qualified_type_name(namespace: &str, type_name: &str) -> String {
    format!("{}{}", capitalize(namespace), type_name)
}

/// Rewrites every reference to one of `ns`'s own record types inside a
/// type expression to its qualified name, so signatures stay consistent
/// with the renamed declarations. Longest name first, so `ArgsList` is
/// not mangled by a namespace that also declares `Args`.
fn qualify_type_refs(type_text: &str, ns: &NamespaceView) -> String {
    let mut names: Vec<&str> = ns.types.iter().map(|t| t.name.as_str()).collect();
    names.sort_by_key(|name| std::cmp::Reverse(name.len()));

    let mut out = String::with_capacity(type_text.len());
    let mut rest = type_text;
    'scan: while !rest.is_empty() {
        let boundary_before = out
            .chars()
            .last()
            .map_or(true, |c| !c.is_ascii_alphanumeric() && c != '_');
        if boundary_before {
            for name in &names {
                if !rest.starts_with(name) {
                    continue;
                }
                let boundary_after = rest[name.len()..]
                    .chars()
                    .next()
                    .map_or(true, |c| !c.is_ascii_alphanumeric() && c != '_');
                if boundary_after {
                    out.push_str(&qualified_type_name(&ns.name, name));
                    rest = &rest[name.len()..];
                    continue 'scan;
                }
            }
        }
        let ch = rest.chars().next().unwrap();
        out.push(ch);
        rest = &rest[ch.len_utf8()..];
    }
    out
}

/// The types document: every namespace's record-type declarations,
/// followed by one interface enumerating all callable functions grouped
/// by namespace.
pub fn build_types_document(namespaces: &[NamespaceView]) -> String {
    let mut out = String::new();

    for ns in namespaces {
        for t in &ns.types {
            out.push_str(&format!("interface {} {{\n", qualified_type_name(&ns.name, &t.name)));
            for prop in &t.properties {
                let optional = if prop.optional { "?" } else { "" };
                out.push_str(&format!(
                    "  {}{optional}: {};\n",
                    prop.name,
                    qualify_type_refs(&prop.type_text, ns)
                ));
            }
            out.push_str("}\n\n");
        }
    }

    out.push_str("interface Tools {\n");
    for ns in namespaces {
        out.push_str(&format!("  {}: {{\n", ns.name));
        for f in &ns.functions {
            let ret = qualify_type_refs(&f.return_type, ns);
            let ret = if f.is_async && !ret.starts_with("Promise<") {
                format!("Promise<{ret}>")
            } else {
                ret
            };
            out.push_str(&format!(
                "    {}(args: {}): {};\n",
                f.name,
                qualify_type_refs(&f.args_type, ns),
                ret
            ));
        }
        out.push_str("  };\n");
    }
    out.push_str("}\n");

    out
}

/// Same shape as `build_types_document`, restricted to a caller-supplied
/// namespace list.
pub fn build_filtered_types_document(namespaces: &[NamespaceView], only: &[String]) -> String {
    let filtered: Vec<NamespaceView> = namespaces
        .iter()
        .filter(|ns| only.iter().any(|name| name == &ns.name))
        .cloned()
        .collect();
    build_types_document(&filtered)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::view::FunctionView;

    #[test]
    fn qualifies_type_names_by_namespace() {
        assert_eq!(qualified_type_name("file", "Args"), "FileArgs");
    }

    #[test]
    fn signature_references_follow_the_qualified_declaration() {
        let namespaces = vec![NamespaceView {
            name: "file".into(),
            functions: vec![FunctionView {
                name: "add".into(),
                args_type: "AddArgs".into(),
                return_type: "Promise<AddArgs[]>".into(),
                is_async: true,
                description: None,
            }],
            types: vec![toolhost_extract::TypeDefinition {
                name: "AddArgs".into(),
                properties: vec![],
            }],
            ..Default::default()
        }];
        let doc = build_types_document(&namespaces);
        assert!(doc.contains("interface FileAddArgs"));
        assert!(doc.contains("add(args: FileAddArgs): Promise<FileAddArgs[]>;"));
        assert!(!doc.contains("args: AddArgs"));
    }

    #[test]
    fn does_not_mangle_longer_names_sharing_a_prefix() {
        let ns = NamespaceView {
            name: "file".into(),
            types: vec![
                toolhost_extract::TypeDefinition {
                    name: "Args".into(),
                    properties: vec![],
                },
                toolhost_extract::TypeDefinition {
                    name: "ArgsList".into(),
                    properties: vec![],
                },
            ],
            ..Default::default()
        };
        assert_eq!(qualify_type_refs("ArgsList", &ns), "FileArgsList");
        assert_eq!(qualify_type_refs("Args | ArgsList", &ns), "FileArgs | FileArgsList");
    }

    #[test]
    fn filtered_document_only_contains_requested_namespaces() {
        let namespaces = vec![
            NamespaceView {
                name: "file".into(),
                functions: vec![FunctionView {
                    name: "add".into(),
                    args_type: "AddArgs".into(),
                    return_type: "number".into(),
                    is_async: false,
                    description: None,
                }],
                ..Default::default()
            },
            NamespaceView {
                name: "net".into(),
                ..Default::default()
            },
        ];
        let doc = build_filtered_types_document(&namespaces, &["file".to_string()]);
        assert!(doc.contains("file:"));
        assert!(!doc.contains("net:"));
    }
}
