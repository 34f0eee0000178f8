pub fn truncate_utf8_suffix(value: &str, max_bytes: usize) -> String {
    if max_bytes == 0 {
        return String::new();
    }
    let bytes = value.as_bytes();
    if bytes.len() <= max_bytes {
        return value.to_string();
    }
    let mut start = bytes.len().saturating_sub(max_bytes);
    while start < bytes.len() && !value.is_char_boundary(start) {
        start += 1;
    }
    value[start..].to_string()
}

/// Collapses whitespace runs so multi-line remote output fits on one log line.
pub fn single_line(value: &str) -> String {
    value.split_whitespace().collect::<Vec<_>>().join(" ")
}
