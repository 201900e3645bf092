use serde_json::Value;

/// Renders a scalar configuration value as a string.
/// Returns `None` for `null`, arrays and tables.
pub fn scalar_to_string(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        Value::Null | Value::Array(_) | Value::Object(_) => None,
    }
}

/// Interprets the usual spellings of an enabled flag.
pub fn parse_flag(raw: &str) -> bool {
    matches!(
        raw.trim().to_lowercase().as_str(),
        "1" | "true" | "yes" | "on"
    )
}

/// Joins a key prefix and a path with exactly one `/` between them.
pub fn join_path(prefix: &str, path: &str) -> String {
    let prefix = prefix.trim_end_matches('/');
    let path = path.trim_start_matches('/');
    if prefix.is_empty() {
        path.to_string()
    } else {
        format!("{}/{}", prefix, path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn scalars_render_as_strings() {
        assert_eq!(scalar_to_string(&json!("fs")), Some("fs".to_string()));
        assert_eq!(scalar_to_string(&json!(6379)), Some("6379".to_string()));
        assert_eq!(scalar_to_string(&json!(true)), Some("true".to_string()));
        assert_eq!(scalar_to_string(&json!({"a": 1})), None);
        assert_eq!(scalar_to_string(&Value::Null), None);
    }

    #[test]
    fn flags() {
        assert!(parse_flag("TRUE"));
        assert!(parse_flag(" on "));
        assert!(!parse_flag("0"));
        assert!(!parse_flag(""));
    }

    #[test]
    fn join_path_normalizes_slashes() {
        assert_eq!(join_path("http://img.example.com/", "/a/b.png"), "http://img.example.com/a/b.png");
        assert_eq!(join_path("", "a.png"), "a.png");
        assert_eq!(join_path("cache", "a.png"), "cache/a.png");
    }
}
