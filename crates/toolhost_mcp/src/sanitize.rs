use regex::Regex;
use std::sync::OnceLock;

fn unsafe_chars() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"[^A-Za-z0-9_]").unwrap())
}

/// Every non-alphanumeric/underscore character in a configured server name
/// becomes `_`, so it is always safe to embed as `mcp_<name>` in a method
/// string.
pub fn sanitize_server_name(name: &str) -> String {
    unsafe_chars().replace_all(name, "_").to_string()
}

/// Substitutes every `{var}` in a URI template from `args`. Returns the
/// name of the first missing variable on failure.
pub fn substitute_template(template: &str, args: &serde_json::Value) -> Result<String, String> {
    let mut out = String::with_capacity(template.len());
    let bytes = template.as_bytes();
    let mut i = 0;
    while i < bytes.len() {
        if bytes[i] == b'{' {
            if let Some(end) = template[i..].find('}') {
                let var = &template[i + 1..i + end];
                let value = args
                    .get(var)
                    .and_then(|v| v.as_str().map(String::from).or_else(|| Some(v.to_string())))
                    .ok_or_else(|| var.to_string())?;
                out.push_str(&value);
                i += end + 1;
                continue;
            }
        }
        let ch = template[i..].chars().next().unwrap();
        out.push(ch);
        i += ch.len_utf8();
    }
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sanitizes_hyphens_and_dots() {
        assert_eq!(sanitize_server_name("github-mcp.server"), "github_mcp_server");
    }

    #[test]
    fn leaves_clean_names_alone() {
        assert_eq!(sanitize_server_name("filesystem"), "filesystem");
    }

    #[test]
    fn substitutes_present_variables() {
        let args = serde_json::json!({"owner": "acme", "repo": "widgets"});
        let out = substitute_template("repo://{owner}/{repo}", &args).unwrap();
        assert_eq!(out, "repo://acme/widgets");
    }

    #[test]
    fn reports_missing_variable() {
        let args = serde_json::json!({"owner": "acme"});
        let err = substitute_template("repo://{owner}/{repo}", &args).unwrap_err();
        assert_eq!(err, "repo");
    }
}
