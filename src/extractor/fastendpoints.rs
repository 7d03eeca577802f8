//! FastEndpoints route and DTO extraction.
//!
//! An endpoint is a class deriving one of the FastEndpoints base types. Its
//! request and response types come from the base's generic arguments, and its
//! routes from the verb calls in `Configure()`.

use crate::detector::{ManifestKind, ManifestMarker};
use crate::error::Result;
use crate::extractor::{ExtractContext, Framework, FrameworkPlugin};
use crate::model::{HttpMethod, RequestBody, Response, Route, Schema};
use crate::normalize::{convert, infer_tags_from_handler, synthesize_with_suffix};
use crate::source::{Language, SourceFile};
use crate::text::{
    call_blocks, find_calls, find_closing, find_closing_angle, split_generics, split_top_level, string_literals,
    unquote, LineIndex,
};
use crate::type_mapper::{self, generic_parts, last_segment, TypeContext};
use log::debug;
use once_cell::sync::Lazy;
use regex::Regex;

const MARKERS: &[ManifestMarker] = &[ManifestMarker::new(ManifestKind::CsProj, "FastEndpoints")];

const DTO_SUFFIXES: [&str; 5] = ["Dto", "DTO", "Request", "Response", "Model"];

const VERBS: [(&str, HttpMethod); 5] = [
    ("Get", HttpMethod::Get),
    ("Post", HttpMethod::Post),
    ("Put", HttpMethod::Put),
    ("Delete", HttpMethod::Delete),
    ("Patch", HttpMethod::Patch),
];

static TYPE_HEAD: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"\b(record\s+class|record\s+struct|record|class|struct)\s+([A-Za-z_]\w*)")
        .expect("valid C# type regex")
});

static ENUM_HEAD: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"\benum\s+([A-Za-z_]\w*)\s*(?::\s*\w+\s*)?\{").expect("valid C# enum regex")
});

static PROPERTY: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"(?m)^\s*((?:\[[^\]]*\]\s*)*)public\s+((?:(?:required|virtual|override|new|static)\s+)*)([A-Za-z_][\w.]*(?:<[^{};=]*>)?(?:\[\])?\??)\s+([A-Za-z_]\w*)\s*\{",
    )
    .expect("valid C# property regex")
});

static ATTRIBUTE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\[\s*(?:\w+\s*:\s*)?([^\]]*)\]").expect("valid C# attribute regex"));

/// FastEndpoints route extractor
pub struct FastEndpointsPlugin;

impl FrameworkPlugin for FastEndpointsPlugin {
    fn framework(&self) -> Framework {
        Framework::FastEndpoints
    }

    fn languages(&self) -> &'static [Language] {
        &[Language::CSharp]
    }

    fn manifest_markers(&self) -> &'static [ManifestMarker] {
        MARKERS
    }

    fn detect_file(&self, file: &SourceFile) -> bool {
        file.content.contains("using FastEndpoints") || file.content.contains("FastEndpoints.")
    }

    fn declared_types(&self, file: &SourceFile) -> Vec<String> {
        let masked = file.masked();
        let mut names: Vec<String> = type_declarations(&masked)
            .into_iter()
            .filter(|decl| is_dto(decl.name))
            .map(|decl| decl.name.to_string())
            .collect();
        names.extend(ENUM_HEAD.captures_iter(&masked).map(|caps| caps[1].to_string()));
        names
    }

    fn file_routes(&self, file: &SourceFile, cx: &ExtractContext) -> Result<Vec<Route>> {
        let masked = file.masked();
        let lines = LineIndex::new(&masked);
        let mut routes = Vec::new();

        for decl in type_declarations(&masked) {
            let Some(body) = decl.body else {
                continue;
            };
            let Some((matcher, shape)) = endpoint_shape(decl.bases) else {
                continue;
            };
            debug!("{} matched {}", decl.name, matcher);

            let (scope_start, scope) = call_blocks(body, "Configure")
                .into_iter()
                .find(|block| block.args.trim().is_empty())
                .map(|block| (decl.body_start + block.body_start, block.body))
                .unwrap_or((decl.body_start, body));

            for (offset, method, raw_path) in declared_routes(scope) {
                let line = lines.line_of(scope_start + offset);
                routes.push(build_route(method, &raw_path, decl.name, &shape, file, line, &cx.types));
            }
        }

        debug!("Found {} FastEndpoints routes in {}", routes.len(), file.path.display());
        Ok(routes)
    }

    fn file_schemas(&self, file: &SourceFile, cx: &ExtractContext) -> Result<Vec<Schema>> {
        let masked = file.masked();
        let mut schemas: Vec<Schema> = type_declarations(&masked)
            .iter()
            .filter(|decl| is_dto(decl.name))
            .map(|decl| type_schema(decl, &cx.types))
            .collect();
        schemas.extend(enum_schemas(&masked));
        Ok(schemas)
    }
}

/// A C# class, struct or record declaration
#[derive(Debug)]
struct TypeDecl<'a> {
    name: &'a str,
    /// Positional record parameters or a primary constructor
    parameters: Option<&'a str>,
    bases: &'a str,
    body_start: usize,
    body: Option<&'a str>,
}

fn type_declarations(masked: &str) -> Vec<TypeDecl<'_>> {
    let bytes = masked.as_bytes();
    let skip_space = |mut i: usize| {
        while bytes.get(i).is_some_and(u8::is_ascii_whitespace) {
            i += 1;
        }
        i
    };

    let mut found = Vec::new();
    for caps in TYPE_HEAD.captures_iter(masked) {
        let (Some(whole), Some(name)) = (caps.get(0), caps.get(2)) else {
            continue;
        };
        let mut i = skip_space(whole.end());
        if bytes.get(i) == Some(&b'<') {
            match find_closing_angle(masked, i) {
                Some(close) => i = skip_space(close + 1),
                None => continue,
            }
        }

        let mut parameters = None;
        if bytes.get(i) == Some(&b'(') {
            let Some(close) = find_closing(masked, i) else {
                continue;
            };
            parameters = Some(&masked[i + 1..close]);
            i = skip_space(close + 1);
        }

        let mut bases = "";
        if bytes.get(i) == Some(&b':') {
            let end = masked[i..]
                .find(|c: char| c == '{' || c == ';')
                .map(|e| i + e)
                .unwrap_or(masked.len());
            let clause = &masked[i + 1..end];
            bases = clause.split(" where ").next().unwrap_or(clause).trim();
            i = end;
        } else {
            i = skip_space(i);
            if masked[i..].starts_with("where ") {
                i = masked[i..]
                    .find(|c: char| c == '{' || c == ';')
                    .map(|e| i + e)
                    .unwrap_or(masked.len());
            }
        }

        let (body_start, body) = match bytes.get(i) {
            Some(b'{') => match find_closing(masked, i) {
                Some(close) => (i + 1, Some(&masked[i + 1..close])),
                None => continue,
            },
            _ => (i, None),
        };

        found.push(TypeDecl {
            name: name.as_str(),
            parameters,
            bases,
            body_start,
            body,
        });
    }
    found
}

fn is_dto(name: &str) -> bool {
    DTO_SUFFIXES.iter().any(|suffix| name.ends_with(suffix))
}

/// Request and response types of an endpoint base class
#[derive(Debug, Default, PartialEq)]
struct EndpointShape {
    request: Option<String>,
    response: Option<String>,
}

type Matcher = fn(&[(&str, Vec<&str>)]) -> Option<EndpointShape>;

/// Base class shapes, tried in order until one matches
const MATCHERS: [(&str, Matcher); 8] = [
    ("Endpoint<TReq, TResp>", endpoint_request_response),
    ("Endpoint<TReq>", endpoint_request),
    ("EndpointWithoutRequest<TResp>", without_request_response),
    ("EndpointWithoutRequest", without_request),
    ("Ep.Req<TReq>.Res<TResp>", ep_request_response),
    ("Ep.NoReq.Res<TResp>", ep_response),
    ("Ep.Req<TReq>.NoRes", ep_request),
    ("Ep.NoReq.NoRes", ep_nothing),
];

fn endpoint_shape(bases: &str) -> Option<(&'static str, EndpointShape)> {
    let base = split_generics(bases).into_iter().next()?;
    let base = base.trim_start_matches("global::").trim_start_matches("FastEndpoints.");
    let chain = dotted_segments(base);
    MATCHERS
        .iter()
        .find_map(|(name, matcher)| matcher(&chain).map(|shape| (*name, shape)))
}

/// `Ep.Req<A>.Res<B>` as `[("Ep", []), ("Req", ["A"]), ("Res", ["B"])]`
fn dotted_segments(base: &str) -> Vec<(&str, Vec<&str>)> {
    let mut segments = Vec::new();
    let mut depth = 0i32;
    let mut start = 0;
    for (i, c) in base.char_indices() {
        match c {
            '<' => depth += 1,
            '>' => depth -= 1,
            '.' if depth == 0 => {
                segments.push(&base[start..i]);
                start = i + 1;
            }
            _ => {}
        }
    }
    segments.push(&base[start..]);

    segments
        .into_iter()
        .map(|segment| {
            let segment = segment.trim();
            generic_parts(segment).unwrap_or((segment, Vec::new()))
        })
        .collect()
}

fn shape(request: Option<&str>, response: Option<&str>) -> EndpointShape {
    EndpointShape {
        request: request.map(str::to_string),
        response: response.map(str::to_string),
    }
}

fn endpoint_request_response(chain: &[(&str, Vec<&str>)]) -> Option<EndpointShape> {
    match chain {
        [("Endpoint", args)] if args.len() >= 2 => Some(shape(Some(args[0]), Some(args[1]))),
        _ => None,
    }
}

fn endpoint_request(chain: &[(&str, Vec<&str>)]) -> Option<EndpointShape> {
    match chain {
        [("Endpoint", args)] if args.len() == 1 => Some(shape(Some(args[0]), None)),
        _ => None,
    }
}

fn without_request_response(chain: &[(&str, Vec<&str>)]) -> Option<EndpointShape> {
    match chain {
        [("EndpointWithoutRequest", args)] if args.len() == 1 => Some(shape(None, Some(args[0]))),
        _ => None,
    }
}

fn without_request(chain: &[(&str, Vec<&str>)]) -> Option<EndpointShape> {
    match chain {
        [("EndpointWithoutRequest", args)] if args.is_empty() => Some(shape(None, None)),
        _ => None,
    }
}

fn ep_request_response(chain: &[(&str, Vec<&str>)]) -> Option<EndpointShape> {
    match chain {
        [("Ep", _), ("Req", req), ("Res", res)] if req.len() == 1 && res.len() == 1 => {
            Some(shape(Some(req[0]), Some(res[0])))
        }
        _ => None,
    }
}

fn ep_response(chain: &[(&str, Vec<&str>)]) -> Option<EndpointShape> {
    match chain {
        [("Ep", _), ("NoReq", _), ("Res", res)] if res.len() == 1 => Some(shape(None, Some(res[0]))),
        _ => None,
    }
}

fn ep_request(chain: &[(&str, Vec<&str>)]) -> Option<EndpointShape> {
    match chain {
        [("Ep", _), ("Req", req), ("NoRes", _)] if req.len() == 1 => Some(shape(Some(req[0]), None)),
        _ => None,
    }
}

fn ep_nothing(chain: &[(&str, Vec<&str>)]) -> Option<EndpointShape> {
    match chain {
        [("Ep", _), ("NoReq", _), ("NoRes", _)] => Some(shape(None, None)),
        _ => None,
    }
}

/// `(offset, method, raw path)` for every verb call and `Routes` × `Verbs` pair in `scope`
fn declared_routes(scope: &str) -> Vec<(usize, HttpMethod, String)> {
    let mut declared = Vec::new();

    for (name, method) in VERBS {
        for (offset, args) in find_calls(scope, name) {
            for path in string_literals(args) {
                declared.push((offset, method, path.to_string()));
            }
        }
    }

    let verbs: Vec<HttpMethod> = find_calls(scope, "Verbs")
        .into_iter()
        .flat_map(|(_, args)| split_top_level(args, ','))
        .filter_map(|token| {
            let token = unquote(token).unwrap_or(token);
            HttpMethod::from_name(last_segment(token))
        })
        .collect();
    for (offset, args) in find_calls(scope, "Routes") {
        if verbs.is_empty() {
            debug!("Routes(...) without Verbs(...) at offset {}", offset);
        }
        for path in string_literals(args) {
            for method in &verbs {
                declared.push((offset, *method, path.to_string()));
            }
        }
    }

    declared.sort_by_key(|(offset, _, _)| *offset);
    declared
}

fn build_route(
    method: HttpMethod,
    raw_path: &str,
    class: &str,
    shape: &EndpointShape,
    file: &SourceFile,
    line: usize,
    types: &TypeContext,
) -> Route {
    let path = convert(raw_path);
    let mut route = Route::new(method, path.as_str(), class, &file.path, line)
        .with_operation_id(synthesize_with_suffix(method, &path, class, Some("Endpoint")))
        .with_tags(infer_tags_from_handler(class, &path));

    if let Some(request) = shape.request.as_deref() {
        if method.has_body() && last_segment(request) != "EmptyRequest" {
            route = route.with_request_body(RequestBody::json(type_mapper::csharp(request, types)));
        }
    }
    if let Some(response) = shape.response.as_deref() {
        if !matches!(last_segment(response), "EmptyResponse" | "object" | "Object") {
            route = route.with_response(Response::ok(type_mapper::csharp(response, types)));
        }
    }
    route
}

/// What the attributes in front of a member say about it
#[derive(Debug, Default)]
struct MemberAttributes {
    required: bool,
    rename: Option<String>,
    allowed: Vec<String>,
}

fn member_attributes(attrs: &str) -> MemberAttributes {
    let mut parsed = MemberAttributes::default();
    for caps in ATTRIBUTE.captures_iter(attrs) {
        for attribute in split_top_level(&caps[1], ',') {
            let name = attribute.split('(').next().unwrap_or(attribute).trim();
            match last_segment(name).trim_end_matches("Attribute") {
                "Required" => parsed.required = true,
                "JsonPropertyName" => {
                    parsed.rename = string_literals(attribute).first().map(|s| s.to_string())
                }
                "AllowedValues" => {
                    parsed.allowed = string_literals(attribute).iter().map(|s| s.to_string()).collect()
                }
                _ => {}
            }
        }
    }
    parsed
}

fn type_schema(decl: &TypeDecl<'_>, types: &TypeContext) -> Schema {
    let mut schema = Schema::titled_object(decl.name);

    for parameter in decl.parameters.map(|p| split_top_level(p, ',')).unwrap_or_default() {
        let (attrs, rest) = split_attributes(parameter);
        let (declaration, has_default) = match rest.split_once('=') {
            Some((declaration, _)) => (declaration.trim(), true),
            None => (rest.trim(), false),
        };
        let Some((ty, name)) = declaration.rsplit_once(char::is_whitespace) else {
            continue;
        };
        let attributes = member_attributes(attrs);
        let property = member_schema(ty, &attributes, types);
        let required = attributes.required || (!has_default && !property.nullable);
        schema.add_property(attributes.rename.unwrap_or_else(|| name.to_string()), property, required);
    }

    if let Some(body) = decl.body {
        for caps in PROPERTY.captures_iter(body) {
            let (Some(whole), Some(ty), Some(name)) = (caps.get(0), caps.get(3), caps.get(4)) else {
                continue;
            };
            let modifiers = caps.get(2).map(|m| m.as_str()).unwrap_or_default();
            if modifiers.contains("static")
                || matches!(ty.as_str(), "class" | "record" | "struct" | "interface" | "enum")
            {
                continue;
            }
            let attributes = member_attributes(caps.get(1).map(|m| m.as_str()).unwrap_or_default());
            let initialized = find_closing(body, whole.end() - 1)
                .map(|close| body[close + 1..].trim_start().starts_with('='))
                .unwrap_or(false);
            let property = member_schema(ty.as_str(), &attributes, types);
            let required = (attributes.required || modifiers.contains("required")) && !initialized;
            schema.add_property(
                attributes.rename.clone().unwrap_or_else(|| name.as_str().to_string()),
                property,
                required,
            );
        }
    }
    schema
}

fn member_schema(ty: &str, attributes: &MemberAttributes, types: &TypeContext) -> Schema {
    let schema = type_mapper::csharp(ty, types);
    if attributes.allowed.is_empty() {
        schema
    } else {
        schema.with_enum(attributes.allowed.clone())
    }
}

/// Split leading `[...]` attributes off a record parameter
fn split_attributes(parameter: &str) -> (&str, &str) {
    let mut end = 0;
    let trimmed = parameter.trim_start();
    let offset = parameter.len() - trimmed.len();
    while parameter[offset + end..].starts_with('[') {
        match find_closing(parameter, offset + end) {
            Some(close) => {
                let rest = &parameter[close + 1..];
                end = close + 1 + (rest.len() - rest.trim_start().len()) - offset;
            }
            None => break,
        }
    }
    (&parameter[offset..offset + end], &parameter[offset + end..])
}

fn enum_schemas(masked: &str) -> Vec<Schema> {
    ENUM_HEAD
        .captures_iter(masked)
        .filter_map(|caps| {
            let whole = caps.get(0)?;
            let close = find_closing(masked, whole.end() - 1)?;
            let values = split_top_level(&masked[whole.end()..close], ',')
                .into_iter()
                .map(|member| member.split('=').next().unwrap_or(member).trim())
                .map(|member| member.rsplit(']').next().unwrap_or(member).trim().to_string())
                .filter(|member| !member.is_empty())
                .collect();
            let mut schema = Schema::string().with_enum(values);
            schema.title = Some(caps[1].to_string());
            Some(schema)
        })
        .collect()
}
