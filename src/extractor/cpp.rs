//! Text helpers shared by the C++ plugins (Drogon, Oat++).
//!
//! All functions take comment-masked source, so offsets map straight back to
//! lines of the original file.

use crate::text::{find_closing, is_ident_char};
use once_cell::sync::Lazy;
use regex::Regex;

static CLASS: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"\b(?:class|struct)\s+(\w+)\s*(?:final\s*)?(?::\s*([^{;()]*))?\{")
        .expect("valid class regex")
});

static NAMESPACE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\bnamespace\s+([\w:]+)\s*\{").expect("valid namespace regex"));

/// A `class` or `struct` definition with a body
#[derive(Debug, Clone, PartialEq)]
pub struct ClassBlock<'a> {
    pub name: &'a str,
    /// Base clause, e.g. `public drogon::HttpController<UserCtrl>`
    pub bases: &'a str,
    /// Offset of the `class`/`struct` keyword
    pub start: usize,
    /// Offset of the first byte inside the braces
    pub body_start: usize,
    pub body: &'a str,
}

impl ClassBlock<'_> {
    pub fn contains(&self, offset: usize) -> bool {
        offset >= self.body_start && offset <= self.body_start + self.body.len()
    }
}

/// Every class or struct definition in the file, outer ones first
pub fn classes(masked: &str) -> Vec<ClassBlock<'_>> {
    CLASS
        .captures_iter(masked)
        .filter_map(|caps| {
            let whole = caps.get(0)?;
            if masked[..whole.start()].trim_end().ends_with("enum") {
                return None;
            }
            let open = whole.end() - 1;
            let close = find_closing(masked, open)?;
            Some(ClassBlock {
                name: caps.get(1)?.as_str(),
                bases: caps.get(2).map(|m| m.as_str().trim()).unwrap_or_default(),
                start: whole.start(),
                body_start: open + 1,
                body: &masked[open + 1..close],
            })
        })
        .collect()
}

/// The innermost class whose body contains `offset`
pub fn enclosing_class<'a, 'b>(classes: &'b [ClassBlock<'a>], offset: usize) -> Option<&'b ClassBlock<'a>> {
    classes
        .iter()
        .filter(|c| c.contains(offset))
        .min_by_key(|c| c.body.len())
}

/// Namespaces enclosing `offset`, outermost first (`a::b` counts as two)
pub fn namespaces_at(masked: &str, offset: usize) -> Vec<String> {
    NAMESPACE
        .captures_iter(masked)
        .filter_map(|caps| {
            let whole = caps.get(0)?;
            let close = find_closing(masked, whole.end() - 1)?;
            (whole.end() <= offset && offset < close).then(|| caps[1].to_string())
        })
        .flat_map(|ns| ns.split("::").map(str::to_string).collect::<Vec<_>>())
        .filter(|ns| !ns.is_empty())
        .collect()
}

/// Whether the file includes a header from `lib` (`#include <lib/...>` or `"lib/..."`)
pub fn includes(content: &str, lib: &str) -> bool {
    content.lines().any(|line| {
        let line = line.trim_start();
        line.starts_with("#include")
            && (line.contains(&format!("<{}/", lib)) || line.contains(&format!("\"{}/", lib)))
    })
}

/// The declaration statements at the top level of a class body.
///
/// Function bodies are dropped, access labels are removed and brace initializers
/// (`int n{0};`) are kept with their statement.
pub fn member_statements(body: &str) -> Vec<String> {
    let bytes = body.as_bytes();
    let mut statements = Vec::new();
    let mut current = String::new();
    let mut i = 0;

    while i < bytes.len() {
        match bytes[i] {
            b'{' => {
                let Some(close) = find_closing(body, i) else {
                    break;
                };
                let head = current.trim_end();
                let is_function = head.ends_with(')')
                    || head.ends_with("const")
                    || head.ends_with("override")
                    || head.ends_with("noexcept")
                    || head.contains('(') && !head.contains('=');
                if is_function || head.is_empty() {
                    current.clear();
                } else {
                    current.push_str(&body[i..=close]);
                }
                i = close + 1;
            }
            b';' => {
                push_statement(&mut statements, &current);
                current.clear();
                i += 1;
            }
            b':' if is_access_label(&current, bytes.get(i + 1)) => {
                current.clear();
                i += 1;
            }
            _ => {
                let ch = body[i..].chars().next().unwrap_or(' ');
                current.push(ch);
                i += ch.len_utf8();
            }
        }
    }
    statements
}

fn is_access_label(current: &str, next: Option<&u8>) -> bool {
    next != Some(&b':')
        && matches!(
            current.split_whitespace().last(),
            Some("public" | "private" | "protected")
        )
}

fn push_statement(statements: &mut Vec<String>, raw: &str) {
    let statement = raw.split_whitespace().collect::<Vec<_>>().join(" ");
    if !statement.is_empty() {
        statements.push(statement);
    }
}

/// A data member declaration
#[derive(Debug, Clone, PartialEq)]
pub struct Member {
    pub name: String,
    pub ty: String,
    /// Declared with `= value` or `{value}`
    pub has_init: bool,
}

/// Parse `Type name;`, `Type name = init;` or `Type name{init};`.
///
/// Function declarations, static members, type aliases and nested type
/// declarations give `None`.
pub fn parse_member(statement: &str) -> Option<Member> {
    const SKIP: [&str; 10] = [
        "using", "typedef", "friend", "static", "static_assert", "enum", "struct", "class",
        "template", "return",
    ];
    let first = statement.split_whitespace().next()?;
    if SKIP.contains(&first) || statement.contains('~') {
        return None;
    }

    let (decl, has_init) = match top_level_initializer(statement) {
        Some(split) => (statement[..split].trim(), true),
        None => (statement.trim(), false),
    };
    if decl.contains('(') {
        return None;
    }

    let decl = decl.trim_start_matches("mutable ").trim();
    let name_start = decl
        .char_indices()
        .rev()
        .find(|(_, c)| !is_ident_char(*c))
        .map(|(i, c)| i + c.len_utf8())
        .unwrap_or(0);
    let name = &decl[name_start..];
    let ty = decl[..name_start].trim();
    if name.is_empty() || ty.is_empty() || name.starts_with(|c: char| c.is_ascii_digit()) {
        return None;
    }

    Some(Member {
        name: name.to_string(),
        ty: ty.to_string(),
        has_init,
    })
}

/// Offset of the `=` or `{` starting an initializer, outside template brackets
fn top_level_initializer(statement: &str) -> Option<usize> {
    let mut angle = 0i32;
    for (i, c) in statement.char_indices() {
        match c {
            '<' => angle += 1,
            '>' => angle -= 1,
            '=' | '{' if angle == 0 => return Some(i),
            _ => {}
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_classes_and_enclosing() {
        let src = r#"
            namespace api { namespace v1 {
            class User : public drogon::HttpController<User> {
              public:
                struct Inner { int x; };
                METHOD_LIST_BEGIN
            };
            enum class Color { Red };
            } }
        "#;
        let found = classes(src);
        let names: Vec<_> = found.iter().map(|c| c.name).collect();
        assert_eq!(names, vec!["User", "Inner"]);
        assert_eq!(found[0].bases, "public drogon::HttpController<User>");

        let offset = src.find("METHOD_LIST_BEGIN").unwrap();
        assert_eq!(enclosing_class(&found, offset).map(|c| c.name), Some("User"));
        assert_eq!(namespaces_at(src, offset), vec!["api", "v1"]);
    }

    #[test]
    fn test_member_statements_skip_methods() {
        let body = r#"
          public:
            std::string name;
            int age = 0;
            std::vector<std::string> tags{};
            Json::Value toJson() const { Json::Value v; v["a"] = 1; return v; }
            void reset();
          private:
            std::optional<std::string> nickname;
        "#;
        let statements = member_statements(body);
        assert_eq!(
            statements,
            vec![
                "std::string name",
                "int age = 0",
                "std::vector<std::string> tags{}",
                "void reset()",
                "std::optional<std::string> nickname",
            ]
        );
    }

    #[test]
    fn test_parse_member() {
        let member = parse_member("std::map<std::string, int> counts{}").unwrap();
        assert_eq!(member.name, "counts");
        assert_eq!(member.ty, "std::map<std::string, int>");
        assert!(member.has_init);

        assert_eq!(parse_member("int age").unwrap().ty, "int");
        assert!(parse_member("void reset()").is_none());
        assert!(parse_member("static int count").is_none());
        assert!(parse_member("using Ptr = std::shared_ptr<X>").is_none());
    }

    #[test]
    fn test_includes() {
        assert!(includes("#include <drogon/HttpController.h>", "drogon"));
        assert!(includes("#include \"oatpp/core/Types.hpp\"", "oatpp"));
        assert!(!includes("// drogon/HttpController.h", "drogon"));
    }
}
