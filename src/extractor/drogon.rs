//! Drogon route extraction.
//!
//! Drogon declares routes with macros inside controller classes
//! (`METHOD_ADD`, `ADD_METHOD_TO`, `PATH_ADD`) or at runtime through
//! `app().registerHandler(...)`. All four are matched on comment-masked text.

use crate::detector::{ManifestKind, ManifestMarker};
use crate::error::Result;
use crate::extractor::cpp::{self, ClassBlock};
use crate::extractor::{ExtractContext, Framework, FrameworkPlugin};
use crate::model::{HttpMethod, Parameter, RequestBody, Route, Schema};
use crate::normalize::{convert, join, split_query};
use crate::source::{Language, SourceFile};
use crate::text::{find_calls, split_top_level, unquote, LineIndex};
use crate::type_mapper::{self, last_segment, TypeContext};
use log::debug;
use once_cell::sync::Lazy;
use regex::Regex;

const MARKERS: &[ManifestMarker] = &[
    ManifestMarker::new(ManifestKind::CMake, "drogon"),
    ManifestMarker::new(ManifestKind::Conan, "drogon"),
    ManifestMarker::new(ManifestKind::Vcpkg, "drogon"),
];

/// Class-name suffixes that mark a plain C++ type as a DTO
const DTO_SUFFIXES: [&str; 5] = ["Dto", "DTO", "Request", "Response", "Model"];

static PLACEHOLDER: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\{([^{}]*)\}").expect("valid drogon placeholder regex"));

/// Drogon route extractor
pub struct DrogonPlugin;

impl FrameworkPlugin for DrogonPlugin {
    fn framework(&self) -> Framework {
        Framework::Drogon
    }

    fn languages(&self) -> &'static [Language] {
        &[Language::Cpp]
    }

    fn manifest_markers(&self) -> &'static [ManifestMarker] {
        MARKERS
    }

    fn detect_file(&self, file: &SourceFile) -> bool {
        cpp::includes(&file.content, "drogon") || file.content.contains("drogon::")
    }

    fn declared_types(&self, file: &SourceFile) -> Vec<String> {
        let masked = file.masked();
        cpp::classes(&masked)
            .iter()
            .filter(|class| is_dto(class))
            .map(|class| class.name.to_string())
            .collect()
    }

    fn file_routes(&self, file: &SourceFile, cx: &ExtractContext) -> Result<Vec<Route>> {
        let masked = file.masked();
        let lines = LineIndex::new(&masked);
        let classes = cpp::classes(&masked);
        let mut anchors = Vec::new();

        for kind in [Anchor::MethodAdd, Anchor::AddMethodTo, Anchor::PathAdd, Anchor::RegisterHandler] {
            for (offset, args) in find_calls(&masked, kind.name()) {
                anchors.push((offset, kind, args));
            }
        }
        anchors.sort_by_key(|(offset, _, _)| *offset);

        let mut routes = Vec::new();
        for (offset, kind, args) in anchors {
            let class = cpp::enclosing_class(&classes, offset);
            let Some(declared) = parse_anchor(kind, args, &masked, offset, class) else {
                debug!("Abandoned malformed {} at offset {}", kind.name(), offset);
                continue;
            };
            let line = lines.line_of(offset);
            let signature = class
                .map(|c| c.body)
                .and_then(|body| handler_signature(body, &declared.handler))
                .or_else(|| handler_signature(&masked, &declared.handler));
            for method in &declared.methods {
                routes.push(build_route(*method, &declared, signature.as_ref(), file, line, &cx.types));
            }
        }

        debug!("Found {} Drogon routes in {}", routes.len(), file.path.display());
        Ok(routes)
    }

    fn file_schemas(&self, file: &SourceFile, cx: &ExtractContext) -> Result<Vec<Schema>> {
        let masked = file.masked();
        Ok(cpp::classes(&masked)
            .iter()
            .filter(|class| is_dto(class))
            .map(|class| class_schema(class, &cx.types))
            .collect())
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
enum Anchor {
    /// `METHOD_ADD(Ctrl::fn, "/p", Get)`, relative to the controller path
    MethodAdd,
    /// `ADD_METHOD_TO(Ctrl::fn, "/abs", Get)`
    AddMethodTo,
    /// `PATH_ADD("/p", Get)` in a simple controller
    PathAdd,
    /// `registerHandler("/p", handler, {Get, Post})`
    RegisterHandler,
}

impl Anchor {
    fn name(self) -> &'static str {
        match self {
            Anchor::MethodAdd => "METHOD_ADD",
            Anchor::AddMethodTo => "ADD_METHOD_TO",
            Anchor::PathAdd => "PATH_ADD",
            Anchor::RegisterHandler => "registerHandler",
        }
    }
}

/// One route declaration, before typing
#[derive(Debug)]
struct Declared {
    handler: String,
    /// Raw path template, query part included
    template: String,
    methods: Vec<HttpMethod>,
}

fn parse_anchor(
    kind: Anchor,
    args: &str,
    masked: &str,
    offset: usize,
    class: Option<&ClassBlock<'_>>,
) -> Option<Declared> {
    let parts = split_top_level(args, ',');
    let (handler, template, rest) = match kind {
        Anchor::MethodAdd | Anchor::AddMethodTo => {
            let handler = parts.first()?.trim().trim_start_matches('&').to_string();
            let path = unquote(parts.get(1)?)?;
            let template = if kind == Anchor::MethodAdd {
                join(&controller_prefix(masked, offset, class, &handler), path)
            } else {
                path.to_string()
            };
            (handler, template, &parts[2..])
        }
        Anchor::PathAdd => {
            let path = unquote(parts.first()?)?;
            let handler = class.map(|c| c.name.to_string()).unwrap_or_default();
            (handler, path.to_string(), &parts[1..])
        }
        Anchor::RegisterHandler => {
            let path = unquote(parts.first()?)?;
            let handler = parts
                .get(1)
                .map(|h| h.trim().trim_start_matches('&'))
                .filter(|h| h.chars().all(|c| c.is_alphanumeric() || c == '_' || c == ':'))
                .map(|h| h.to_string())
                .unwrap_or_default();
            let rest = parts.get(2..).unwrap_or_default();
            (handler, path.to_string(), rest)
        }
    };

    let mut methods: Vec<HttpMethod> = rest
        .iter()
        .flat_map(|arg| {
            let arg = arg.trim();
            let inner = arg
                .strip_prefix('{')
                .and_then(|a| a.strip_suffix('}'))
                .unwrap_or(arg);
            split_top_level(inner, ',')
        })
        .filter_map(verb)
        .collect();
    methods.dedup();
    if methods.is_empty() {
        methods.push(HttpMethod::Get);
    }

    Some(Declared {
        handler,
        template,
        methods,
    })
}

/// A Drogon method constraint such as `Get` or `drogon::Post`
fn verb(token: &str) -> Option<HttpMethod> {
    match last_segment(token.trim()) {
        "Get" => Some(HttpMethod::Get),
        "Post" => Some(HttpMethod::Post),
        "Put" => Some(HttpMethod::Put),
        "Delete" => Some(HttpMethod::Delete),
        "Patch" => Some(HttpMethod::Patch),
        "Head" => Some(HttpMethod::Head),
        "Options" => Some(HttpMethod::Options),
        _ => None,
    }
}

/// `/<namespaces>/<Class>`, the path Drogon mounts an `HttpController` at
fn controller_prefix(masked: &str, offset: usize, class: Option<&ClassBlock<'_>>, handler: &str) -> String {
    let segments: Vec<String> = match class {
        Some(class) => {
            let mut segments = cpp::namespaces_at(masked, class.start);
            segments.push(class.name.to_string());
            segments
        }
        None => {
            let mut qualifier: Vec<String> = handler.split("::").map(str::to_string).collect();
            qualifier.pop();
            let mut segments = cpp::namespaces_at(masked, offset);
            segments.extend(qualifier);
            segments
        }
    };
    format!("/{}", segments.join("/"))
}

/// Where a placeholder appears, and which handler argument feeds it
#[derive(Debug, PartialEq)]
struct Placeholder {
    name: String,
    query: bool,
    /// 1-based position among the handler's value arguments
    position: usize,
}

/// Canonical path plus every placeholder of a Drogon template, in order
fn parse_template(template: &str) -> (String, Vec<Placeholder>) {
    let (path, query) = split_query(template);
    let mut placeholders = Vec::new();
    let mut sequence = 0;

    let path = PLACEHOLDER.replace_all(path, |caps: &regex::Captures<'_>| {
        sequence += 1;
        let inner = caps[1].trim();
        let (position, name) = match inner.parse::<usize>() {
            Ok(n) => (n, format!("p{}", n)),
            Err(_) if inner.is_empty() => (sequence, format!("p{}", sequence)),
            Err(_) => (sequence, inner.split(':').next().unwrap_or(inner).to_string()),
        };
        placeholders.push(Placeholder {
            name: name.clone(),
            query: false,
            position,
        });
        format!("{{{}}}", name)
    });

    for pair in query.unwrap_or_default().split('&') {
        let Some((key, value)) = pair.split_once('=') else {
            continue;
        };
        if !value.contains('{') || key.is_empty() {
            continue;
        }
        sequence += 1;
        let position = PLACEHOLDER
            .captures(value)
            .and_then(|caps| caps[1].trim().parse::<usize>().ok())
            .unwrap_or(sequence);
        placeholders.push(Placeholder {
            name: key.to_string(),
            query: true,
            position,
        });
    }

    (convert(&path), placeholders)
}

/// The typed arguments of a handler method declaration
#[derive(Debug, Default)]
struct HandlerSignature {
    /// A custom request type taken in place of `HttpRequestPtr`
    body: Option<String>,
    /// Value argument types, after the request and callback
    values: Vec<String>,
}

fn handler_signature(src: &str, handler: &str) -> Option<HandlerSignature> {
    let name = last_segment(handler);
    if name.is_empty() {
        return None;
    }
    let (_, args) = find_calls(src, name)
        .into_iter()
        .find(|(_, args)| args.contains("HttpRequestPtr") || args.contains("std::function"))?;

    let mut signature = HandlerSignature::default();
    for (i, arg) in split_top_level(args, ',').into_iter().enumerate() {
        if arg.contains("std::function") || arg.contains("HttpRequestPtr") {
            continue;
        }
        let Some(member) = cpp::parse_member(arg) else {
            continue;
        };
        if i == 0 {
            signature.body = Some(member.ty);
        } else {
            signature.values.push(member.ty);
        }
    }
    Some(signature)
}

fn build_route(
    method: HttpMethod,
    declared: &Declared,
    signature: Option<&HandlerSignature>,
    file: &SourceFile,
    line: usize,
    types: &TypeContext,
) -> Route {
    let (path, placeholders) = parse_template(&declared.template);
    let mut route = Route::new(method, path, declared.handler.clone(), &file.path, line);

    let typed = |position: usize| {
        signature
            .and_then(|s| s.values.get(position.wrapping_sub(1)))
            .map(|ty| type_mapper::cpp(ty, types))
    };

    for placeholder in &placeholders {
        let schema = typed(placeholder.position).unwrap_or_else(Schema::string);
        if placeholder.query {
            route.push_parameter(Parameter::query(&placeholder.name, schema));
        } else {
            let mut parameter = Parameter::path(&placeholder.name);
            parameter.schema = schema;
            route.push_parameter(parameter);
        }
    }

    if let Some(body) = signature.and_then(|s| s.body.as_deref()) {
        route = route.with_request_body(RequestBody::json(type_mapper::cpp(body, types)));
    }
    route
}

fn is_dto(class: &ClassBlock<'_>) -> bool {
    DTO_SUFFIXES.iter().any(|suffix| class.name.ends_with(suffix))
        && !class.body.contains("DTO_INIT")
        && !class.body.contains("METHOD_LIST_BEGIN")
}

fn class_schema(class: &ClassBlock<'_>, types: &TypeContext) -> Schema {
    let mut schema = Schema::titled_object(class.name);
    for member in cpp::member_statements(class.body)
        .iter()
        .filter_map(|statement| cpp::parse_member(statement))
    {
        let property = type_mapper::cpp(&member.ty, types);
        let required = !member.has_init && !property.nullable;
        schema.add_property(member.name, property, required);
    }
    schema
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ExtractConfig;
    use crate::model::ParameterLocation;

    fn routes(code: &str) -> Vec<Route> {
        let file = SourceFile::new("src/UserController.h", Language::Cpp, code);
        DrogonPlugin
            .extract_routes(&[file], &ExtractConfig::default())
            .items
    }

    #[test]
    fn test_method_add_uses_controller_path() {
        let code = r#"
#include <drogon/HttpController.h>
namespace api {
namespace v1 {
class User : public drogon::HttpController<User> {
  public:
    METHOD_LIST_BEGIN
    METHOD_ADD(User::getInfo, "/{id}", Get, "LoginFilter");
    METHOD_ADD(User::newUser, "/", Post);
    METHOD_LIST_END

    void getInfo(const HttpRequestPtr &req,
                 std::function<void(const HttpResponsePtr &)> &&callback,
                 int64_t id) const;
    void newUser(UserRequest &&user,
                 std::function<void(const HttpResponsePtr &)> &&callback);
};
}
}
"#;
        let found = routes(code);
        assert_eq!(found.len(), 2);

        assert_eq!(found[0].method, HttpMethod::Get);
        assert_eq!(found[0].path, "/api/v1/User/{id}");
        assert_eq!(found[0].handler, "User::getInfo");
        assert_eq!(found[0].operation_id, "getGetInfo");
        assert_eq!(found[0].source_line, 8);
        assert_eq!(found[0].parameters[0].schema.format.as_deref(), Some("int64"));

        assert_eq!(found[1].method, HttpMethod::Post);
        assert_eq!(found[1].path, "/api/v1/User");
        assert!(found[1].request_body.is_some());
    }

    #[test]
    fn test_add_method_to_and_placeholders() {
        let code = r#"
#include "drogon/HttpController.h"
class Items : public drogon::HttpController<Items> {
  public:
    METHOD_LIST_BEGIN
    ADD_METHOD_TO(Items::find, "/items/{}/parts/{}?sort={}", Get, Head);
    ADD_METHOD_TO(Items::byNumber, "/numbered/{2}/{1}");
    METHOD_LIST_END
};
"#;
        let found = routes(code);
        assert_eq!(found.len(), 3);
        assert_eq!(found[0].path, "/items/{p1}/parts/{p2}");
        assert_eq!(found[0].method, HttpMethod::Get);
        assert_eq!(found[1].method, HttpMethod::Head);

        let query: Vec<_> = found[0]
            .parameters
            .iter()
            .filter(|p| p.location == ParameterLocation::Query)
            .map(|p| p.name.as_str())
            .collect();
        assert_eq!(query, vec!["sort"]);

        assert_eq!(found[2].path, "/numbered/{p2}/{p1}");
        assert_eq!(found[2].method, HttpMethod::Get);
    }

    #[test]
    fn test_path_add_and_register_handler() {
        let code = r#"
#include <drogon/HttpSimpleController.h>
class Health : public drogon::HttpSimpleController<Health> {
  public:
    PATH_LIST_BEGIN
    PATH_ADD("/health", Get, Post);
    PATH_LIST_END
};

int main() {
    // registerHandler("/commented", handler);
    drogon::app().registerHandler("/hello/{name}",
        [](const HttpRequestPtr &req, std::function<void(const HttpResponsePtr &)> &&callback,
           const std::string &name) { callback(HttpResponse::newHttpResponse()); },
        {Get, Options});
    drogon::app().registerHandler("/plain", &plainHandler);
}
"#;
        let found = routes(code);
        let summary: Vec<_> = found.iter().map(|r| (r.method, r.path.as_str())).collect();
        assert_eq!(
            summary,
            vec![
                (HttpMethod::Get, "/health"),
                (HttpMethod::Post, "/health"),
                (HttpMethod::Get, "/hello/{name}"),
                (HttpMethod::Options, "/hello/{name}"),
                (HttpMethod::Get, "/plain"),
            ]
        );
        assert_eq!(found[0].handler, "Health");
        assert_eq!(found[2].handler, "");
        assert_eq!(found[4].handler, "plainHandler");
    }

    #[test]
    fn test_malformed_anchor_is_abandoned() {
        let code = r#"
#include <drogon/HttpController.h>
class A : public drogon::HttpController<A> {
    METHOD_ADD(A::broken, missing_quote, Get);
    METHOD_ADD(A::ok, "/ok", Get);
};
"#;
        let found = routes(code);
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].path, "/A/ok");
    }

    #[test]
    fn test_non_drogon_file_has_no_routes() {
        assert!(routes("int main() { METHOD_ADD(X::y, \"/y\", Get); }").is_empty());
    }

    #[test]
    fn test_dto_schemas() {
        let code = r#"
#include <optional>
struct CreateUserRequest {
    std::string name;
    int age = 0;
    std::optional<std::string> nickname;
    std::vector<std::string> tags{};
    AddressDto address;
    Json::Value toJson() const { return {}; }
};
struct AddressDto {
    std::string street;
};
class Helper {
    int counter;
};
"#;
        let file = SourceFile::new("dto.h", Language::Cpp, code);
        let schemas = DrogonPlugin
            .extract_schemas(&[file], &ExtractConfig::default())
            .items;
        assert_eq!(schemas.len(), 2);

        let user = &schemas[0];
        assert_eq!(user.title.as_deref(), Some("CreateUserRequest"));
        assert_eq!(user.required, vec!["name", "address"]);
        assert!(user.properties["nickname"].nullable);
        assert!(user.properties["tags"].is_array());
        assert_eq!(user.properties["address"].ref_name(), Some("AddressDto"));
        assert!(!user.properties.contains_key("toJson"));
    }

    #[test]
    fn test_parse_template() {
        let (path, placeholders) = parse_template("/users/{id}?page={2}");
        assert_eq!(path, "/users/{id}");
        assert_eq!(
            placeholders,
            vec![
                Placeholder {
                    name: "id".to_string(),
                    query: false,
                    position: 1
                },
                Placeholder {
                    name: "page".to_string(),
                    query: true,
                    position: 2
                },
            ]
        );
    }
}
