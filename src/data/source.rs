use serde_json::{Map, Value};

/// Rebuild a verified contract's source into one readable text blob.
///
/// Single-file sources are returned unchanged. Multi-file bundles (a JSON
/// object of `path -> content` or `path -> {content}`, optionally wrapped in
/// an extra pair of braces) become `// File: <path>` sections separated by a
/// blank line, in the order the bundle lists them. Anything that does not
/// parse is returned as-is.
pub fn reconstruct(raw: &str) -> String {
    if !raw.starts_with('{') {
        return raw.to_string();
    }

    let parsed = unwrap_double_braces(raw)
        .and_then(|inner| serde_json::from_str::<Value>(inner).ok())
        .or_else(|| serde_json::from_str::<Value>(raw).ok());

    let Some(Value::Object(root)) = parsed else {
        return raw.to_string();
    };

    // Standard-JSON input keeps the files under `sources`.
    let files = match root.get("sources") {
        Some(Value::Object(sources)) if root.contains_key("language") => sources,
        _ => &root,
    };

    let mut sections = Vec::new();
    collect_files(files, "", &mut sections);
    sections.join("\n\n")
}

/// `{{ ... }}` is how the explorer flags standard-JSON input.
fn unwrap_double_braces(raw: &str) -> Option<&str> {
    let trimmed = raw.trim_end();
    if trimmed.starts_with("{{") && trimmed.ends_with("}}") {
        Some(&trimmed[1..trimmed.len() - 1])
    } else {
        None
    }
}

fn collect_files(node: &Map<String, Value>, prefix: &str, out: &mut Vec<String>) {
    for (key, value) in node {
        let path = if prefix.is_empty() {
            key.clone()
        } else {
            format!("{prefix}/{key}")
        };
        match value {
            Value::String(content) => out.push(format!("// File: {path}\n{content}")),
            Value::Object(obj) => match obj.get("content") {
                Some(Value::String(content)) => out.push(format!("// File: {path}\n{content}")),
                _ => collect_files(obj, &path, out),
            },
            _ => {}
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_plain_source_unchanged() {
        let src = "pragma solidity ^0.4.17;\ncontract TetherToken {}";
        assert_eq!(reconstruct(src), src);
    }

    #[test]
    fn test_content_leaves_in_encounter_order() {
        let raw = r#"{"contracts/Z.sol":{"content":"contract Z {}"},"contracts/A.sol":{"content":"contract A {}"}}"#;
        assert_eq!(
            reconstruct(raw),
            "// File: contracts/Z.sol\ncontract Z {}\n\n// File: contracts/A.sol\ncontract A {}"
        );
    }

    #[test]
    fn test_nested_and_plain_string_leaves() {
        let raw = r#"{"lib":{"Math.sol":"library Math {}","token":{"ERC20.sol":{"content":"contract ERC20 {}"}}},"Main.sol":"contract Main {}"}"#;
        assert_eq!(
            reconstruct(raw),
            "// File: lib/Math.sol\nlibrary Math {}\n\n\
             // File: lib/token/ERC20.sol\ncontract ERC20 {}\n\n\
             // File: Main.sol\ncontract Main {}"
        );
    }

    #[test]
    fn test_double_braced_standard_json() {
        let raw = r#"{{"language":"Solidity","sources":{"src/Vault.sol":{"content":"contract Vault {}"}},"settings":{"optimizer":{"enabled":true}}}}"#;
        assert_eq!(reconstruct(raw), "// File: src/Vault.sol\ncontract Vault {}");
    }

    #[test]
    fn test_malformed_json_falls_back() {
        let raw = r#"{"a.sol": {"content": "unterminated"#;
        assert_eq!(reconstruct(raw), raw);
    }

    #[test]
    fn test_non_object_json_falls_back() {
        assert_eq!(reconstruct("{"), "{");
    }

    #[test]
    fn test_non_string_leaves_ignored() {
        let raw = r#"{"a.sol":"contract A {}","runs":200,"flags":[1,2]}"#;
        assert_eq!(reconstruct(raw), "// File: a.sol\ncontract A {}");
    }
}
