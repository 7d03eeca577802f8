//! Operation-ID synthesis.

use crate::model::HttpMethod;
use once_cell::sync::Lazy;
use regex::Regex;
use std::collections::HashSet;

/// Handler names that mean "no usable name"
const ANONYMOUS_HANDLERS: &[&str] = &["", "anonymous", "<anonymous>", "unknown", "closure"];

static PLACEHOLDER: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\{([^{}]+)\}").expect("valid placeholder regex"));

/// Derive a camelCase operation ID from method, canonical path and handler name.
///
/// With a handler name the result is `lower(method)` followed by the last
/// qualifier segment of the handler with only its first letter upper-cased. Without
/// one, the path is turned into title-cased words (`{id}` becomes `Byid`).
pub fn synthesize(method: HttpMethod, path: &str, handler: &str) -> String {
    synthesize_with_suffix(method, path, handler, None)
}

/// Like [`synthesize`], stripping a conventional handler suffix such as `Endpoint`.
pub fn synthesize_with_suffix(
    method: HttpMethod,
    path: &str,
    handler: &str,
    suffix: Option<&str>,
) -> String {
    let method = method.as_str().to_ascii_lowercase();
    let handler = handler.trim();

    if !ANONYMOUS_HANDLERS.contains(&handler) {
        let name = last_segment(handler);
        let name = match suffix {
            Some(suffix) => name
                .strip_suffix(suffix)
                .filter(|rest| !rest.is_empty())
                .unwrap_or(name),
            None => name,
        };
        if !name.is_empty() {
            return format!("{}{}", method, upper_first(name));
        }
    }

    from_path(&method, path)
}

/// Make operation IDs unique by suffixing repeats with `_2`, `_3`, ...
pub fn deduplicate(ids: &[String]) -> Vec<String> {
    let mut seen: HashSet<String> = HashSet::new();
    let mut result = Vec::with_capacity(ids.len());

    for id in ids {
        let mut candidate = id.clone();
        let mut counter = 2;
        while seen.contains(&candidate) {
            candidate = format!("{}_{}", id, counter);
            counter += 1;
        }
        seen.insert(candidate.clone());
        result.push(candidate);
    }

    result
}

fn from_path(method: &str, path: &str) -> String {
    let replaced = PLACEHOLDER.replace_all(path, "By${1}");
    let spaced: String = replaced
        .chars()
        .map(|c| if matches!(c, '/' | '-' | '_') { ' ' } else { c })
        .collect();

    let mut id = method.to_string();
    for word in spaced.split_whitespace() {
        id.push_str(&title_case(word));
    }
    id
}

fn last_segment(handler: &str) -> &str {
    let after_colons = handler.rsplit("::").next().unwrap_or(handler);
    after_colons.rsplit('.').next().unwrap_or(after_colons)
}

fn upper_first(word: &str) -> String {
    let mut chars = word.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}

fn title_case(word: &str) -> String {
    let mut chars = word.chars();
    match chars.next() {
        Some(first) => first
            .to_uppercase()
            .chain(chars.flat_map(|c| c.to_lowercase()))
            .collect(),
        None => String::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_path_based_ids() {
        assert_eq!(synthesize(HttpMethod::Get, "/users/{id}", ""), "getUsersByid");
        assert_eq!(synthesize(HttpMethod::Post, "/user-groups", ""), "postUserGroups");
        assert_eq!(
            synthesize(HttpMethod::Delete, "/orders/{orderId}/line_items", ""),
            "deleteOrdersByorderidLineItems"
        );
        assert_eq!(synthesize(HttpMethod::Get, "/", ""), "get");
    }

    #[test]
    fn test_handler_based_ids_keep_case() {
        assert_eq!(synthesize(HttpMethod::Get, "/users", "get_users"), "getGet_users");
        assert_eq!(synthesize(HttpMethod::Put, "/x", "updateUserName"), "putUpdateUserName");
        assert_eq!(synthesize(HttpMethod::All, "/x", "catchAll"), "allCatchAll");
    }

    #[test]
    fn test_handler_qualifiers_are_stripped() {
        assert_eq!(synthesize(HttpMethod::Get, "/u", "handlers::list_users"), "getList_users");
        assert_eq!(synthesize(HttpMethod::Get, "/u", "UserController.index"), "getIndex");
        assert_eq!(synthesize(HttpMethod::Get, "/u", "Api::UserCtrl::show"), "getShow");
    }

    #[test]
    fn test_anonymous_handlers_fall_back_to_path() {
        assert_eq!(synthesize(HttpMethod::Get, "/health", "anonymous"), "getHealth");
        assert_eq!(synthesize(HttpMethod::Get, "/health", "<anonymous>"), "getHealth");
        assert_eq!(synthesize(HttpMethod::Get, "/health", "unknown"), "getHealth");
    }

    #[test]
    fn test_suffix_stripping() {
        assert_eq!(
            synthesize_with_suffix(HttpMethod::Get, "/u", "GetUserEndpoint", Some("Endpoint")),
            "getGetUser"
        );
        // A handler that is only the suffix keeps its name
        assert_eq!(
            synthesize_with_suffix(HttpMethod::Get, "/u", "Endpoint", Some("Endpoint")),
            "getEndpoint"
        );
    }

    #[test]
    fn test_deduplicate() {
        let ids = vec![
            "getUsers".to_string(),
            "getUsers".to_string(),
            "postUsers".to_string(),
            "getUsers".to_string(),
        ];
        assert_eq!(
            deduplicate(&ids),
            vec!["getUsers", "getUsers_2", "postUsers", "getUsers_3"]
        );
    }
}
