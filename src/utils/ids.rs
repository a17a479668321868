use crate::errors::ToolError;
use once_cell::sync::Lazy;
use regex::Regex;

static ID_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[A-Za-z0-9._-]+$").expect("id regex"));

/// Accepts a bare id or a `spotify:<kind>:<id>` uri and returns the id,
/// checked to be safe as a single URL path segment.
pub fn resolve_id<'a>(field: &str, raw: &'a str, kind: &str) -> Result<&'a str, ToolError> {
    let trimmed = raw.trim();
    let id = trimmed
        .strip_prefix("spotify:")
        .and_then(|rest| rest.strip_prefix(kind))
        .and_then(|rest| rest.strip_prefix(':'))
        .unwrap_or(trimmed);
    // "." and ".." are dot segments and would be resolved away in the URL path.
    if !ID_RE.is_match(id) || id.chars().all(|c| c == '.') {
        return Err(ToolError::invalid_parameter(
            field,
            format!("'{}' is not a valid spotify {} id", raw, kind),
        )
        .with_hint("Pass the 'id' (or 'uri') field returned by a search or listing tool."));
    }
    Ok(id)
}
