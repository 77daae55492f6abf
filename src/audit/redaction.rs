use std::collections::BTreeMap;

use axum::http::HeaderMap;

const REDACTED: &str = "****";

/// Flatten headers for an audit record, masking credentials.
///
/// Repeated headers are joined with `", "`.
pub fn header_snapshot(headers: &HeaderMap) -> BTreeMap<String, String> {
    let mut output: BTreeMap<String, String> = BTreeMap::new();
    for (name, value) in headers.iter() {
        let value_str = String::from_utf8_lossy(value.as_bytes());
        let value_str = if is_sensitive_header(name.as_str()) {
            mask_value(&value_str)
        } else {
            value_str.into_owned()
        };
        output
            .entry(name.as_str().to_string())
            .and_modify(|existing| {
                existing.push_str(", ");
                existing.push_str(&value_str);
            })
            .or_insert(value_str);
    }
    output
}

fn is_sensitive_header(name: &str) -> bool {
    matches!(
        name.to_ascii_lowercase().as_str(),
        "authorization" | "proxy-authorization" | "x-api-key" | "cookie" | "set-cookie"
    )
}

/// Keep only the last four characters of a secret.
pub fn mask_value(value: &str) -> String {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return REDACTED.to_string();
    }

    let last = trimmed.chars().rev().take(4).collect::<String>();
    format!("{}{}", REDACTED, last.chars().rev().collect::<String>())
}
