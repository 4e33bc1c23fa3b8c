//! Small helpers for URL building and lenient JSON reading

use serde_json::Value;

/// Percent-encode one path segment
pub fn encode_segment(segment: &str) -> String {
    urlencoding::encode(segment).into_owned()
}

/// Append encoded path segments to a base URL
///
/// # Examples
///
/// ```
/// use anaplan_tasks::utils::join_path;
///
/// let url = join_path("https://api.example.com/2/0/", &["workspaces", "ws 1"]);
/// assert_eq!(url, "https://api.example.com/2/0/workspaces/ws%201");
/// ```
pub fn join_path(base: &str, segments: &[&str]) -> String {
    let mut url = base.trim_end_matches('/').to_string();
    for segment in segments {
        url.push('/');
        url.push_str(&encode_segment(segment));
    }
    url
}

/// Read a flag that may arrive as a JSON boolean or as text
///
/// Accepts `true`/`false`, and case-insensitive `"true"`, `"false"`, `"yes"`,
/// `"no"`, `"y"`, `"n"`, `"on"`, `"off"`, `"1"`, `"0"`.
pub fn lenient_bool(value: &Value) -> Option<bool> {
    match value {
        Value::Bool(b) => Some(*b),
        Value::String(s) => parse_bool_text(s),
        Value::Number(n) => n.as_i64().and_then(|i| match i {
            0 => Some(false),
            1 => Some(true),
            _ => None,
        }),
        _ => None,
    }
}

pub(crate) fn parse_bool_text(text: &str) -> Option<bool> {
    match text.trim().to_ascii_lowercase().as_str() {
        "y" | "yes" | "t" | "true" | "on" | "1" => Some(true),
        "n" | "no" | "f" | "false" | "off" | "0" => Some(false),
        _ => None,
    }
}
