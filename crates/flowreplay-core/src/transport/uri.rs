//! Request-target normalization.

/// Reduce a recorded request target to origin-form (`/path?query`).
///
/// Absolute-form targets (`http://host/path?q`) lose their scheme and
/// authority, fragments are dropped, and an empty, blank or `*` target
/// becomes `/`.
pub fn normalize_uri(uri: &str) -> String {
    let uri = uri.trim();
    if uri.is_empty() || uri == "*" {
        return "/".to_string();
    }

    if let Some(rest) = strip_http_scheme(uri) {
        let rest = rest.split('#').next().unwrap_or_default();
        return match rest.find(|c: char| c == '/' || c == '?') {
            Some(idx) if rest[idx..].starts_with('?') => {
                let query = &rest[idx + 1..];
                if query.is_empty() {
                    "/".to_string()
                } else {
                    format!("/?{query}")
                }
            }
            Some(idx) => {
                let path_and_query = &rest[idx..];
                path_and_query
                    .strip_suffix('?')
                    .unwrap_or(path_and_query)
                    .to_string()
            }
            None => "/".to_string(),
        };
    }

    if uri.starts_with('/') {
        uri.to_string()
    } else {
        format!("/{uri}")
    }
}

/// Compose the outbound URL for `uri` on `target`.
///
/// `target` may omit its scheme (`localhost:9090`), in which case `http://`
/// is assumed. A path prefix on the target is preserved.
pub fn join_target(target: &str, uri: &str) -> String {
    let target = target.trim();
    let base = if strip_http_scheme(target).is_some() {
        target.to_string()
    } else {
        format!("http://{target}")
    };

    let path = normalize_uri(uri);
    match base.strip_suffix('/') {
        Some(trimmed) => format!("{trimmed}{path}"),
        None => format!("{base}{path}"),
    }
}

fn strip_http_scheme(uri: &str) -> Option<&str> {
    let lower = uri.get(..8).map(str::to_ascii_lowercase).unwrap_or_default();
    if lower.starts_with("http://") {
        Some(&uri[7..])
    } else if lower.starts_with("https://") {
        Some(&uri[8..])
    } else {
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_origin_form_unchanged() {
        assert_eq!(normalize_uri("/api/test?x=1"), "/api/test?x=1");
    }

    #[test]
    fn test_normalize_absolute_form() {
        assert_eq!(
            normalize_uri("http://localhost:8081/api/test?x=1"),
            "/api/test?x=1"
        );
        assert_eq!(normalize_uri("https://example.com/a/b"), "/a/b");
        assert_eq!(normalize_uri("http://example.com"), "/");
        assert_eq!(normalize_uri("http://example.com/"), "/");
        assert_eq!(normalize_uri("http://example.com?q=1"), "/?q=1");
        assert_eq!(normalize_uri("http://example.com/p#frag"), "/p");
    }

    #[test]
    fn test_normalize_degenerate_targets() {
        assert_eq!(normalize_uri(""), "/");
        assert_eq!(normalize_uri("   "), "/");
        assert_eq!(normalize_uri("*"), "/");
        assert_eq!(normalize_uri("api/test"), "/api/test");
    }

    #[test]
    fn test_join_target_adds_scheme() {
        assert_eq!(
            join_target("localhost:9090", "/api/test"),
            "http://localhost:9090/api/test"
        );
    }

    #[test]
    fn test_join_target_with_absolute_recorded_uri() {
        assert_eq!(
            join_target("http://localhost:9090", "http://localhost:8081/api/test?x=1"),
            "http://localhost:9090/api/test?x=1"
        );
    }

    #[test]
    fn test_join_target_avoids_double_slash() {
        assert_eq!(
            join_target("http://localhost:9090/", "/api/test"),
            "http://localhost:9090/api/test"
        );
        assert_eq!(
            join_target("https://new.example.com/v2", "items"),
            "https://new.example.com/v2/items"
        );
    }
}
