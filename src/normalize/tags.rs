//! Tag inference.

/// Path segments that never make a good tag
const SKIPPED_SEGMENTS: &[&str] = &["api", "v1", "v2", "v3"];

/// CRUD verbs stripped from endpoint class names before they become tags
const CRUD_PREFIXES: &[&str] = &["Get", "Create", "Update", "Delete", "List"];

/// Infer at most one tag from the first meaningful path segment.
///
/// Returns an empty vector when nothing survives filtering; callers treat it the
/// same as "no tags".
pub fn infer_tags(path: &str) -> Vec<String> {
    path.trim_start_matches('/')
        .split('/')
        .filter(|segment| !segment.is_empty())
        .filter(|segment| !SKIPPED_SEGMENTS.contains(segment))
        .find(|segment| !is_placeholder(segment))
        .map(|segment| vec![segment.to_string()])
        .unwrap_or_default()
}

/// Infer a tag from an endpoint class name (`GetUserEndpoint` -> `User`),
/// falling back to [`infer_tags`].
pub fn infer_tags_from_handler(handler: &str, path: &str) -> Vec<String> {
    let name = handler.strip_suffix("Endpoint").unwrap_or(handler);
    let name = CRUD_PREFIXES
        .iter()
        .find_map(|prefix| {
            name.strip_prefix(prefix)
                .filter(|rest| rest.starts_with(|c: char| c.is_ascii_uppercase()))
        })
        .unwrap_or(name);

    if name.is_empty() {
        infer_tags(path)
    } else {
        vec![name.to_string()]
    }
}

fn is_placeholder(segment: &str) -> bool {
    segment.starts_with('{') || segment.starts_with(':') || segment.starts_with('<')
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_infer_tags() {
        assert_eq!(infer_tags("/api/v1/users/{id}"), vec!["users"]);
        assert_eq!(infer_tags("/orders"), vec!["orders"]);
        assert!(infer_tags("/").is_empty());
        assert!(infer_tags("/{id}").is_empty());
        assert!(infer_tags("/api/v2").is_empty());
        assert_eq!(infer_tags("/:tenant/projects"), vec!["projects"]);
        assert_eq!(infer_tags("/<id>/files"), vec!["files"]);
    }

    #[test]
    fn test_infer_tags_from_handler() {
        assert_eq!(infer_tags_from_handler("GetUserEndpoint", "/users/{id}"), vec!["User"]);
        assert_eq!(infer_tags_from_handler("ListOrdersEndpoint", "/orders"), vec!["Orders"]);
        assert_eq!(infer_tags_from_handler("HealthEndpoint", "/health"), vec!["Health"]);
        // "Getaway" is not a Get-prefixed verb
        assert_eq!(infer_tags_from_handler("GetawayEndpoint", "/x"), vec!["Getaway"]);
    }

    #[test]
    fn test_infer_tags_from_handler_falls_back_to_path() {
        assert_eq!(infer_tags_from_handler("", "/api/widgets"), vec!["widgets"]);
        assert_eq!(infer_tags_from_handler("Endpoint", "/api/widgets"), vec!["widgets"]);
    }
}
