/// Builds the full upstream request URL (C10, §4.9): the route's upstream
/// origin, the already prefix-stripped forwarded path, and the original
/// query string untouched.
///
/// # Examples
///
/// ```rust
/// use kairos_rs::utils::path::build_upstream_url;
///
/// let url = build_upstream_url("http://user-service:8080", "/users/42", Some("active=true"));
/// assert_eq!(url, "http://user-service:8080/users/42?active=true");
///
/// let url = build_upstream_url("http://user-service:8080", "/users/42", None);
/// assert_eq!(url, "http://user-service:8080/users/42");
/// ```
pub fn build_upstream_url(upstream_origin: &str, forwarded_path: &str, query_string: Option<&str>) -> String {
    let origin = upstream_origin.trim_end_matches('/');
    match query_string {
        Some(q) if !q.is_empty() => format!("{origin}{forwarded_path}?{q}"),
        _ => format!("{origin}{forwarded_path}"),
    }
}

/// Validates an incoming `X-Request-ID` value against the "opaque printable
/// pattern, ≤128 chars" rule from §4.1: every byte must be a printable ASCII
/// character (`0x20..=0x7e`) and the value must be non-empty.
pub fn is_valid_request_id(candidate: &str) -> bool {
    !candidate.is_empty()
        && candidate.len() <= 128
        && candidate.bytes().all(|b| (0x20..=0x7e).contains(&b))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builds_url_with_and_without_query() {
        assert_eq!(
            build_upstream_url("http://svc:8080/", "/a/b", Some("x=1")),
            "http://svc:8080/a/b?x=1"
        );
        assert_eq!(build_upstream_url("http://svc:8080", "/a/b", None), "http://svc:8080/a/b");
    }

    #[test]
    fn request_id_validation() {
        assert!(is_valid_request_id("abc-123_DEF"));
        assert!(!is_valid_request_id(""));
        assert!(!is_valid_request_id(&"a".repeat(129)));
        assert!(!is_valid_request_id("has\ncontrol\tchars"));
    }
}
