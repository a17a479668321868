use crate::errors::ToolError;

/// Splits a comma-separated list of identifiers, trimming each entry.
///
/// Empty entries (`"a,,b"`, trailing commas) are rejected rather than
/// skipped so that a malformed list never reaches the upstream.
pub fn split_delimited(field: &str, raw: &str) -> Result<Vec<String>, ToolError> {
    if raw.trim().is_empty() {
        return Err(ToolError::invalid_parameter(
            field,
            "expected a comma-separated list with at least one entry",
        ));
    }
    let mut out = Vec::new();
    for (idx, part) in raw.split(',').enumerate() {
        let trimmed = part.trim();
        if trimmed.is_empty() {
            return Err(ToolError::invalid_parameter(
                field,
                format!("entry {} is empty", idx + 1),
            ));
        }
        out.push(trimmed.to_string());
    }
    Ok(out)
}
