//! Small string helpers shared by the protocol mappers.

/// Returns `url` with exactly one trailing slash appended if missing.
pub fn with_slash(url: &str) -> String {
    if url.ends_with('/') {
        url.to_string()
    } else {
        format!("{url}/")
    }
}

/// Joins `segment` onto `base` with a single slash, keeping a trailing slash.
///
/// `join_path("https://a/bob", "inbox")` and `join_path("https://a/bob/", "inbox")`
/// both yield `https://a/bob/inbox/`.
pub fn join_path(base: &str, segment: &str) -> String {
    format!("{}{}/", with_slash(base), segment.trim_matches('/'))
}

/// Returns `scheme://host[:port]` of a URL, or `None` if it has no scheme.
pub fn origin(url: &str) -> Option<&str> {
    let scheme_end = url.find("://")?;
    let rest = &url[scheme_end + 3..];
    let host_end = rest.find(['/', '?', '#']).unwrap_or(rest.len());
    if host_end == 0 {
        return None;
    }
    Some(&url[..scheme_end + 3 + host_end])
}

/// Returns the domain of a `user@domain` handle.
pub fn handle_domain(handle: &str) -> Option<&str> {
    let (user, domain) = handle.split_once('@')?;
    if user.is_empty() || domain.is_empty() || domain.contains('@') {
        return None;
    }
    Some(domain)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn with_slash_appends_once() {
        assert_eq!(with_slash("https://a/b"), "https://a/b/");
        assert_eq!(with_slash("https://a/b/"), "https://a/b/");
    }

    #[test]
    fn join_path_single_slash() {
        assert_eq!(join_path("https://a/bob", "inbox"), "https://a/bob/inbox/");
        assert_eq!(join_path("https://a/bob/", "/inbox/"), "https://a/bob/inbox/");
    }

    #[test]
    fn origin_strips_path() {
        assert_eq!(origin("https://example.com/bob"), Some("https://example.com"));
        assert_eq!(origin("http://h:8000/p/1/"), Some("http://h:8000"));
        assert_eq!(origin("https://example.com"), Some("https://example.com"));
        assert_eq!(origin("bob@example.com"), None);
        assert_eq!(origin("https:///x"), None);
    }

    #[test]
    fn handle_domain_parses() {
        assert_eq!(handle_domain("bob@example.org"), Some("example.org"));
        assert_eq!(handle_domain("bob"), None);
        assert_eq!(handle_domain("@example.org"), None);
        assert_eq!(handle_domain("a@b@c"), None);
    }
}
