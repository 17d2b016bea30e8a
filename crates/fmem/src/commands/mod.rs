//! Command implementations.

pub mod knowledge;
pub mod memory;
pub mod prefs;
pub mod status;

use serde_json::Value;

/// Parse a command-line value as JSON, falling back to a plain string.
pub fn parse_value(raw: &str) -> Value {
    serde_json::from_str(raw).unwrap_or_else(|_| Value::String(raw.to_string()))
}

/// Render a value for terminal output: strings bare, everything else as JSON.
pub fn display_value(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

/// Shorten text to `max` characters for list output.
pub fn truncate(text: &str, max: usize) -> String {
    let flat = text.replace('\n', " ");
    if flat.chars().count() <= max {
        flat
    } else {
        let cut: String = flat.chars().take(max.saturating_sub(3)).collect();
        format!("{}...", cut)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_parse_value() {
        assert_eq!(parse_value("42"), json!(42));
        assert_eq!(parse_value("{\"a\": [1, 2]}"), json!({"a": [1, 2]}));
        assert_eq!(parse_value("\"quoted\""), json!("quoted"));
        assert_eq!(parse_value("metric"), json!("metric"));
        assert_eq!(parse_value(""), json!(""));
    }

    #[test]
    fn test_display_value() {
        assert_eq!(display_value(&json!("dark")), "dark");
        assert_eq!(display_value(&json!({"x": 1})), "{\"x\":1}");
        assert_eq!(display_value(&json!(null)), "null");
    }

    #[test]
    fn test_truncate() {
        assert_eq!(truncate("short", 10), "short");
        assert_eq!(truncate("line one\nline two", 100), "line one line two");
        assert_eq!(truncate("abcdefghijkl", 8), "abcde...");
        assert_eq!(truncate("héllo wörld", 7), "héll...");
    }
}
