//! Path-parameter conversion.
//!
//! Every framework spells path parameters differently (`:id`, `<id>`, `<path..>`,
//! `{id:int}`, `*rest`). [`convert`] rewrites any of them into the canonical
//! `{name}` form; [`extract_path_params`] turns a canonical path into parameters.

use crate::model::Parameter;
use once_cell::sync::Lazy;
use regex::Regex;

/// `<name>`, `<name..>` and Django's `<conv:name>`
static ANGLE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"<(?:[A-Za-z_][A-Za-z0-9_]*:)?([A-Za-z_][A-Za-z0-9_]*)(?:\.\.)?>")
        .expect("valid angle-parameter regex")
});

/// `{*name}` catch-all
static BRACE_STAR: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\{\*([^{}]+)\}").expect("valid catch-all regex"));

/// `{name:constraint}`
static BRACE_CONSTRAINT: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\{([^{}:]+):[^{}]*\}").expect("valid constraint regex"));

/// `:name`, `:name(\d+)`, `:name?`
static COLON: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r":([A-Za-z_][A-Za-z0-9_]*)(?:\([^)]*\))?\??").expect("valid colon regex")
});

/// `*name` segment
static STAR_NAMED: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(^|/)\*([A-Za-z_][A-Za-z0-9_]*)").expect("valid named-wildcard regex")
});

/// Bare `*` segment
static STAR_BARE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(^|/)\*(/|$)").expect("valid wildcard regex"));

static PLACEHOLDER: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\{([^{}]+)\}").expect("valid placeholder regex"));

/// Convert a framework path template into the canonical `{name}` form.
///
/// Constraint suffixes (`:int`, `(\d+)`, `..`) are stripped, not validated. The
/// result always starts with `/`, and converting a canonical path is the identity.
pub fn convert(path: &str) -> String {
    let path = path.trim();
    let path = ANGLE.replace_all(path, "{$1}");
    let path = BRACE_STAR.replace_all(&path, "{$1}");
    let path = BRACE_CONSTRAINT.replace_all(&path, "{$1}");
    let path = COLON.replace_all(&path, "{$1}");
    let path = STAR_NAMED.replace_all(&path, "${1}{$2}");
    let path = STAR_BARE.replace_all(&path, "${1}{path}${2}");
    ensure_leading_slash(&path)
}

/// Extract one required string parameter per `{name}` occurrence, left to right.
///
/// Duplicates are kept; a name carrying a leftover `:constraint` is cut at the colon.
pub fn extract_path_params(path: &str) -> Vec<Parameter> {
    PLACEHOLDER
        .captures_iter(path)
        .filter_map(|caps| caps.get(1))
        .map(|m| {
            let name = m.as_str().split(':').next().unwrap_or_default().trim();
            Parameter::path(name)
        })
        .collect()
}

/// Join a prefix and a path with exactly one `/` between them
pub fn join(prefix: &str, path: &str) -> String {
    let prefix = prefix.trim().trim_end_matches('/');
    let path = path.trim().trim_start_matches('/');

    if path.is_empty() {
        return ensure_leading_slash(prefix);
    }
    if prefix.is_empty() {
        return ensure_leading_slash(path);
    }
    ensure_leading_slash(&format!("{}/{}", prefix, path))
}

/// Split `path?query` into its two halves
pub fn split_query(path: &str) -> (&str, Option<&str>) {
    match path.split_once('?') {
        Some((path, query)) => (path, Some(query)),
        None => (path, None),
    }
}

fn ensure_leading_slash(path: &str) -> String {
    if path.starts_with('/') {
        path.to_string()
    } else {
        format!("/{}", path)
    }
}
