pub fn truncate_utf8_prefix(value: &str, max_bytes: usize) -> &str {
    if value.len() <= max_bytes {
        return value;
    }
    let mut end = max_bytes;
    while end > 0 && !value.is_char_boundary(end) {
        end -= 1;
    }
    &value[..end]
}

/// Cuts `value` to at most `max_bytes` and records how much was dropped.
pub fn clip_body(value: &str, max_bytes: usize) -> String {
    let clipped = truncate_utf8_prefix(value, max_bytes);
    if clipped.len() == value.len() {
        return value.to_string();
    }
    format!("{}... [+{} bytes]", clipped, value.len() - clipped.len())
}

#[cfg(test)]
mod tests {
    use super::{clip_body, truncate_utf8_prefix};

    #[test]
    fn truncate_utf8_prefix_does_not_split_utf8() {
        assert_eq!(truncate_utf8_prefix("añb", 2), "a");
        assert_eq!(truncate_utf8_prefix("añb", 3), "añ");
        assert_eq!(truncate_utf8_prefix("abc", 10), "abc");
    }

    #[test]
    fn clip_body_marks_dropped_bytes() {
        assert_eq!(clip_body("hello world", 5), "hello... [+6 bytes]");
        assert_eq!(clip_body("short", 64), "short");
    }
}
