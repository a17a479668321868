use crate::utils::text::truncate_utf8_prefix;
use once_cell::sync::Lazy;
use regex::Regex;
use serde_json::Value;

const DEFAULT_REDACTION: &str = "[REDACTED]";
const INLINE_REDACTION: &str = "***REDACTED***";

const SENSITIVE_KEYS: &[&str] = &[
    "access_token",
    "refresh_token",
    "client_secret",
    "client_id",
    "api_key",
    "authorization",
    "password",
];

static INLINE_REDACTION_PATTERNS: Lazy<Vec<(Regex, &'static str)>> = Lazy::new(|| {
    vec![
        (
            Regex::new(r"\b(Bearer)\s+([A-Za-z0-9._~+/-]{10,}=*)").expect("inline redaction regex"),
            "$1 ***REDACTED***",
        ),
        (
            Regex::new(r#"("?(?:access_token|refresh_token|client_secret|api_key)"?\s*[:=]\s*"?)([^\s"&,}]+)"#)
                .expect("inline redaction regex"),
            "${1}***REDACTED***",
        ),
    ]
});

pub fn is_sensitive_key(key: &str) -> bool {
    let normalized = key.trim().to_lowercase();
    if normalized.is_empty() {
        return false;
    }
    SENSITIVE_KEYS.contains(&normalized.as_str())
        || normalized.contains("secret")
        || normalized.ends_with("token")
}

/// Masks bearer tokens and `key=value` secrets embedded in free text, then
/// caps the result at `max_bytes`.
pub fn redact_text(value: &str, max_bytes: usize) -> String {
    let mut out = value.to_string();
    for (re, replacement) in INLINE_REDACTION_PATTERNS.iter() {
        if re.is_match(&out) {
            out = re.replace_all(&out, *replacement).into_owned();
        }
    }
    if out.len() > max_bytes {
        out = format!("{}...", truncate_utf8_prefix(&out, max_bytes));
    }
    out
}

/// Masks the given literal secrets wherever they occur in `value`.
pub fn redact_literals(value: &str, secrets: &[&str]) -> String {
    let mut out = value.to_string();
    for secret in secrets {
        let needle = secret.trim();
        if needle.len() < 6 {
            continue;
        }
        out = out.replace(needle, INLINE_REDACTION);
    }
    out
}

pub fn redact_object(value: &Value, max_bytes: usize) -> Value {
    match value {
        Value::String(text) => Value::String(redact_text(text, max_bytes)),
        Value::Array(items) => Value::Array(
            items
                .iter()
                .map(|item| redact_object(item, max_bytes))
                .collect(),
        ),
        Value::Object(map) => Value::Object(
            map.iter()
                .map(|(key, entry)| {
                    let redacted = if is_sensitive_key(key) && !entry.is_null() {
                        Value::String(DEFAULT_REDACTION.to_string())
                    } else {
                        redact_object(entry, max_bytes)
                    };
                    (key.clone(), redacted)
                })
                .collect(),
        ),
        _ => value.clone(),
    }
}
