use crate::view::NamespaceView;

/// Human-readable namespace catalogue: one entry per namespace with its
/// function count and any declared description/useWhen/tags.
pub fn build_catalogue(namespaces: &[NamespaceView]) -> String {
    let mut out = String::new();
    for ns in namespaces {
        out.push_str(&format!("## {} ({} functions)\n", ns.name, ns.functions.len()));
        if let Some(desc) = &ns.description {
            out.push_str(&format!("{desc}\n"));
        }
        if let Some(use_when) = &ns.use_when {
            out.push_str(&format!("Use when: {use_when}\n"));
        }
        if !ns.tags.is_empty() {
            out.push_str(&format!("Tags: {}\n", ns.tags.join(", ")));
        }
        for f in &ns.functions {
            let async_marker = if f.is_async { "async " } else { "" };
            out.push_str(&format!(
                "- {async_marker}{}(args: {}): {}\n",
                f.name, f.args_type, f.return_type
            ));
        }
        out.push('\n');
    }
    out
}
