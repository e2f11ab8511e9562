use tree_sitter::Node;

use crate::types::Doc;

/// Looks at the sibling immediately preceding `node` for a `/** ... */`
/// block comment and parses it into a `Doc`. Returns an empty `Doc` if
/// none is present; undocumented exports are valid, just undocumented.
pub fn extract_leading_doc(node: Node, src: &str) -> Doc {
    let Some(prev) = node.prev_sibling() else {
        return Doc::default();
    };
    if prev.kind() != "comment" {
        return Doc::default();
    }
    let raw = prev.utf8_text(src.as_bytes()).unwrap_or_default();
    if !raw.starts_with("/**") {
        return Doc::default();
    }
    parse_jsdoc(raw)
}

fn parse_jsdoc(raw: &str) -> Doc {
    let body = raw
        .trim_start_matches("/**")
        .trim_end_matches("*/")
        .lines()
        .map(|line| line.trim().trim_start_matches('*').trim())
        .collect::<Vec<_>>();

    let mut doc = Doc::default();
    let mut description_lines = Vec::new();
    let mut i = 0;
    while i < body.len() {
        let line = body[i];
        if let Some(rest) = line.strip_prefix('@') {
            let mut parts = rest.splitn(2, char::is_whitespace);
            let tag = parts.next().unwrap_or_default();
            let value = parts.next().unwrap_or_default().trim().to_string();
            match tag {
                "param" => {
                    let mut pparts = value.splitn(2, char::is_whitespace);
                    let pname = pparts.next().unwrap_or_default().to_string();
                    let pdesc = pparts.next().unwrap_or_default().trim().to_string();
                    doc.param_doc.push((pname, pdesc));
                }
                "returns" | "return" => doc.returns = Some(value),
                "example" => doc.examples.push(value),
                "deprecated" => doc.deprecated = Some(if value.is_empty() { "deprecated".into() } else { value }),
                other => doc.tags.push((other.to_string(), value)),
            }
        } else if !line.is_empty() {
            description_lines.push(line);
        }
        i += 1;
    }

    if !description_lines.is_empty() {
        doc.description = Some(description_lines.join(" ").trim().to_string());
    }
    doc
}
