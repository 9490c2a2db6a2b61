//! Dot-separated path addressing.

/// Separator between path segments.
pub const SEPARATOR: char = '.';

/// Split a path into its segments.
///
/// Returns `None` for an empty path or when any segment is empty
/// (`".a"`, `"a..b"`, `"a."`).
pub fn segments(path: &str) -> Option<Vec<&str>> {
    if path.is_empty() {
        return None;
    }
    let parts: Vec<&str> = path.split(SEPARATOR).collect();
    if parts.iter().any(|part| part.is_empty()) {
        return None;
    }
    Some(parts)
}

/// Join a base path and a child key.
pub fn join(base: &str, key: &str) -> String {
    if base.is_empty() {
        key.to_string()
    } else {
        format!("{}{}{}", base, SEPARATOR, key)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_segments() {
        assert_eq!(segments("a"), Some(vec!["a"]));
        assert_eq!(segments("a.b.c"), Some(vec!["a", "b", "c"]));
    }

    #[test]
    fn test_malformed_paths() {
        assert_eq!(segments(""), None);
        assert_eq!(segments("."), None);
        assert_eq!(segments(".a"), None);
        assert_eq!(segments("a."), None);
        assert_eq!(segments("a..b"), None);
    }

    #[test]
    fn test_join() {
        assert_eq!(join("", "x"), "x");
        assert_eq!(join("config.sources", "env"), "config.sources.env");
    }
}
