//! Micronaut route and bean extraction, for Java and Kotlin sources.
//!
//! Routes are found by a line-oriented state machine. A verb annotation
//! (`@Get("/x")`) moves it to [`State::Pending`], and the next method or `fun`
//! declaration consumes the pending annotation and emits a route under the
//! enclosing `@Controller` base path. A second verb annotation before any
//! declaration replaces the first.

use crate::detector::{ManifestKind, ManifestMarker};
use crate::error::Result;
use crate::extractor::{cpp, ExtractContext, Framework, FrameworkPlugin};
use crate::model::{HttpMethod, Parameter, ParameterLocation, RequestBody, Response, Route, Schema};
use crate::normalize::{convert, join};
use crate::source::{Language, SourceFile};
use crate::text::{find_closing, find_closing_angle, split_top_level, string_literals, unquote};
use crate::type_mapper::{self, generic_parts, last_segment, TypeContext};
use log::debug;
use once_cell::sync::Lazy;
use regex::Regex;

const MARKERS: &[ManifestMarker] = &[
    ManifestMarker::new(ManifestKind::Maven, "io.micronaut"),
    ManifestMarker::new(ManifestKind::Gradle, "io.micronaut"),
];

const DTO_SUFFIXES: [&str; 5] = ["Dto", "DTO", "Request", "Response", "Model"];

/// Return-type wrappers looked through for the response body
const SINGLE_WRAPPERS: [&str; 8] = [
    "HttpResponse",
    "MutableHttpResponse",
    "Mono",
    "Single",
    "Maybe",
    "Optional",
    "CompletableFuture",
    "CompletionStage",
];

/// Wrappers whose body is a stream of items
const STREAM_WRAPPERS: [&str; 4] = ["Flux", "Flowable", "Publisher", "Flow"];

static CONTROLLER: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"@Controller\b").expect("valid controller annotation regex"));

static VERB_ANNOTATION: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"@(Get|Post|Put|Delete|Patch|Head|Options|Trace)\b").expect("valid verb annotation regex")
});

static CLASS_NAME: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\b(?:class|object|interface)\s+(\w+)").expect("valid class name regex"));

static JAVA_METHOD: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"^\s*(?:@[\w.]+(?:\([^)]*\))?\s*)*(?:(?:public|protected|private|static|final|synchronized|abstract|default)\s+)*(?:<[^>]*>\s+)?([\w.]+(?:<[^()]*>)?(?:\[\])?)\s+(\w+)\s*\(",
    )
    .expect("valid java method regex")
});

static KOTLIN_FUN: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"^\s*(?:@[\w.]+(?:\([^)]*\))?\s*)*(?:(?:public|private|protected|internal|open|override|suspend|inline|operator)\s+)*fun\s+(?:<[^>]*>\s*)?(?:[\w.]+\.)?(\w+)\s*\(",
    )
    .expect("valid kotlin fun regex")
});

static QUERY_TEMPLATE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\{[?&]([^}]*)\}").expect("valid query template regex"));

static TYPE_DECL: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"\b(data\s+class|enum\s+class|class|record|enum|interface)\s+([A-Za-z_]\w*)")
        .expect("valid type declaration regex")
});

static KOTLIN_PROPERTY: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"^((?:(?:private|public|protected|internal|override|open|lateinit|const)\s+)*)(val|var)\s+(\w+)\s*:\s*([^=]+?)\s*(=.*)?$",
    )
    .expect("valid kotlin property regex")
});

static PATTERN_REGEXP: Lazy<Regex> =
    Lazy::new(|| Regex::new(r#"regexp\s*=\s*"([^"]*)""#).expect("valid pattern regexp regex"));

/// Micronaut route extractor
pub struct MicronautPlugin;

impl FrameworkPlugin for MicronautPlugin {
    fn framework(&self) -> Framework {
        Framework::Micronaut
    }

    fn languages(&self) -> &'static [Language] {
        &[Language::Java, Language::Kotlin]
    }

    fn manifest_markers(&self) -> &'static [ManifestMarker] {
        MARKERS
    }

    fn detect_file(&self, file: &SourceFile) -> bool {
        file.content.contains("import io.micronaut") || file.content.contains("@Controller")
    }

    fn declared_types(&self, file: &SourceFile) -> Vec<String> {
        let masked = file.masked();
        type_declarations(&masked, file.language)
            .into_iter()
            .filter(|decl| decl.is_schema())
            .map(|decl| decl.name.to_string())
            .collect()
    }

    fn file_routes(&self, file: &SourceFile, cx: &ExtractContext) -> Result<Vec<Route>> {
        let masked = file.masked();
        let routes = RouteScanner::new(&masked, file, &cx.types).scan();
        debug!("Found {} Micronaut routes in {}", routes.len(), file.path.display());
        Ok(routes)
    }

    fn file_schemas(&self, file: &SourceFile, cx: &ExtractContext) -> Result<Vec<Schema>> {
        let masked = file.masked();
        Ok(type_declarations(&masked, file.language)
            .iter()
            .filter(|decl| decl.is_schema())
            .map(|decl| decl.schema(file.language, &cx.types))
            .collect())
    }
}

/// A verb annotation waiting for its method declaration
#[derive(Debug, Clone, PartialEq)]
struct PendingRoute {
    method: HttpMethod,
    path: String,
    line: usize,
}

#[derive(Debug, Clone, PartialEq)]
enum State {
    Idle,
    Pending(PendingRoute),
}

struct RouteScanner<'a> {
    masked: &'a str,
    file: &'a SourceFile,
    types: &'a TypeContext,
    state: State,
    base: String,
    class: String,
    routes: Vec<Route>,
}

impl<'a> RouteScanner<'a> {
    fn new(masked: &'a str, file: &'a SourceFile, types: &'a TypeContext) -> Self {
        Self {
            masked,
            file,
            types,
            state: State::Idle,
            base: String::new(),
            class: String::new(),
            routes: Vec::new(),
        }
    }

    fn scan(mut self) -> Vec<Route> {
        let mut line_start = 0;
        for (idx, line) in self.masked.split_inclusive('\n').enumerate() {
            self.step(idx + 1, line_start, line);
            line_start += line.len();
        }
        if let State::Pending(pending) = &self.state {
            debug!("Verb annotation at line {} has no declaration", pending.line);
        }
        self.routes
    }

    fn step(&mut self, line_no: usize, line_start: usize, line: &str) {
        let mut cursor = 0;

        if let Some(found) = CONTROLLER.find(line) {
            let (args, end) = annotation_args(self.masked, line_start + found.end());
            self.base = args.map(annotation_path).unwrap_or_default();
            cursor = end - line_start;
        }
        if let Some(caps) = CLASS_NAME.captures(line) {
            self.class = caps[1].to_string();
        }

        for found in VERB_ANNOTATION.find_iter(line) {
            let Some(method) = HttpMethod::from_name(&found.as_str()[1..]) else {
                continue;
            };
            let (args, end) = annotation_args(self.masked, line_start + found.end());
            if let State::Pending(previous) = &self.state {
                debug!(
                    "{} annotation at line {} replaced by {} at line {}",
                    previous.method, previous.line, method, line_no
                );
            }
            self.state = State::Pending(PendingRoute {
                method,
                path: args.map(annotation_path).unwrap_or_default(),
                line: line_no,
            });
            cursor = cursor.max(end - line_start);
        }

        let State::Pending(pending) = &self.state else {
            return;
        };
        let Some(rest) = line.get(cursor..) else {
            return;
        };
        if let Some(declaration) = Declaration::parse(self.masked, line_start + cursor, rest, self.file.language) {
            let route = self.build_route(pending.clone(), &declaration);
            self.routes.push(route);
            self.state = State::Idle;
        }
    }

    fn build_route(&self, pending: PendingRoute, declaration: &Declaration<'_>) -> Route {
        let (base, mut query) = expand_template(&self.base);
        let (sub, sub_query) = expand_template(&pending.path);
        query.extend(sub_query);

        let path = convert(&join(&base, &sub));
        let handler = if self.class.is_empty() {
            declaration.name.to_string()
        } else {
            format!("{}.{}", self.class, declaration.name)
        };
        let mut route = Route::new(pending.method, path, handler, &self.file.path, pending.line);
        for name in &query {
            route.push_parameter(Parameter::query(name, Schema::string()));
        }

        let language = self.file.language;
        for param in declaration.params() {
            let schema = map_type(&param.ty, language, self.types);
            let named = |annotation: &Annotation<'_>| {
                annotation
                    .args
                    .and_then(annotation_value)
                    .unwrap_or_else(|| param.name.to_string())
            };

            if let Some(body) = param.annotation("Body") {
                if body.args.is_none() {
                    route.request_body = Some(RequestBody::json(schema));
                }
            } else if let Some(query_value) = param.annotation("QueryValue") {
                route.push_parameter(Parameter::query(named(query_value), schema));
            } else if let Some(header) = param.annotation("Header") {
                route.push_parameter(Parameter::header(named(header), schema));
            } else if let Some(cookie) = param.annotation("CookieValue") {
                route.push_parameter(Parameter {
                    name: named(cookie),
                    location: ParameterLocation::Cookie,
                    required: false,
                    schema,
                });
            } else {
                let name = param
                    .annotation("PathVariable")
                    .map(named)
                    .unwrap_or_else(|| param.name.to_string());
                let location = route
                    .parameters
                    .iter()
                    .find(|p| p.name == name)
                    .map(|p| p.location);
                match location {
                    Some(ParameterLocation::Path) => {
                        let mut parameter = Parameter::path(name);
                        parameter.schema = schema;
                        route.push_parameter(parameter);
                    }
                    Some(ParameterLocation::Query) => route.push_parameter(Parameter::query(name, schema)),
                    _ => {}
                }
            }
        }

        if let Some(schema) = declaration
            .return_type
            .and_then(|ty| response_schema(ty, language, self.types))
        {
            route = route.with_response(Response::ok(schema));
        }
        route
    }
}

/// The `(...)` right after an annotation name, and the offset just past it
fn annotation_args(masked: &str, after_name: usize) -> (Option<&str>, usize) {
    let rest = &masked[after_name..];
    let open = after_name + (rest.len() - rest.trim_start_matches([' ', '\t']).len());
    if masked.as_bytes().get(open) != Some(&b'(') {
        return (None, after_name);
    }
    match find_closing(masked, open) {
        Some(close) => (Some(&masked[open + 1..close]), close + 1),
        None => (None, after_name),
    }
}

/// The path of `("/p")`, `(value = "/p")`, `(uri = "/p")` or `(uris = {"/p", ...})`
fn annotation_path(args: &str) -> String {
    for part in split_top_level(args, ',') {
        match part.split_once('=') {
            Some((key, value)) if matches!(key.trim(), "value" | "uri" | "uris") => {
                if let Some(path) = string_literals(value).first() {
                    return path.to_string();
                }
            }
            Some(_) => {}
            None => {
                if let Some(path) = unquote(part) {
                    return path.to_string();
                }
            }
        }
    }
    String::new()
}

/// The single value of `("x")` or `(value = "x")`
fn annotation_value(args: &str) -> Option<String> {
    let path = annotation_path(args);
    (!path.is_empty()).then_some(path)
}

/// Expand RFC 6570 forms Micronaut accepts: `{+p}` and `{/p}` stay path
/// variables, `{?a,b}` and `{&a}` become query parameters.
fn expand_template(template: &str) -> (String, Vec<String>) {
    let mut query = Vec::new();
    for caps in QUERY_TEMPLATE.captures_iter(template) {
        query.extend(
            caps[1]
                .split(',')
                .map(|name| name.trim().trim_end_matches('*'))
                .filter(|name| !name.is_empty())
                .map(str::to_string),
        );
    }
    let path = QUERY_TEMPLATE
        .replace_all(template, "")
        .replace("{+", "{")
        .replace("{/", "/{");
    (path, query)
}

/// A method or `fun` declaration following a verb annotation
#[derive(Debug)]
struct Declaration<'a> {
    name: &'a str,
    params: &'a str,
    return_type: Option<&'a str>,
}

impl<'a> Declaration<'a> {
    /// Parse a declaration starting in `line`, which begins at `offset` of `masked`
    fn parse(masked: &'a str, offset: usize, line: &'a str, language: Language) -> Option<Self> {
        let (caps, name) = match language {
            Language::Kotlin => {
                let caps = KOTLIN_FUN.captures(line)?;
                let name = caps.get(1)?;
                (caps.get(0)?, name)
            }
            _ => {
                let caps = JAVA_METHOD.captures(line)?;
                let ty = caps.get(1)?.as_str();
                if matches!(ty, "return" | "new" | "throw" | "else") {
                    return None;
                }
                (caps.get(0)?, caps.get(2)?)
            }
        };
        let open = offset + caps.end() - 1;
        let close = find_closing(masked, open)?;

        let return_type = match language {
            Language::Kotlin => {
                let tail = masked[close + 1..].trim_start_matches([' ', '\t']);
                tail.strip_prefix(':').map(|rest| {
                    let end = rest.find(['{', '=', '\n']).unwrap_or(rest.len());
                    rest[..end].trim()
                })
            }
            _ => JAVA_METHOD
                .captures(line)
                .and_then(|c| c.get(1))
                .map(|m| &masked[offset + m.start()..offset + m.end()]),
        };

        Some(Declaration {
            name: &masked[offset + name.start()..offset + name.end()],
            params: &masked[open + 1..close],
            return_type,
        })
    }

    fn params(&self) -> Vec<Param<'a>> {
        split_top_level(self.params, ',')
            .into_iter()
            .filter_map(Param::parse)
            .collect()
    }
}

/// An annotation such as `@QueryValue("q")`
#[derive(Debug, Clone, Copy)]
struct Annotation<'a> {
    /// Simple name, without package or use-site target
    name: &'a str,
    args: Option<&'a str>,
}

/// Split leading annotations off a parameter or member declaration
fn strip_annotations(text: &str) -> (Vec<Annotation<'_>>, &str) {
    let mut annotations = Vec::new();
    let mut rest = text.trim_start();
    while let Some(after_at) = rest.strip_prefix('@') {
        let name_len = after_at
            .find(|c: char| !(c.is_alphanumeric() || c == '_' || c == '.' || c == ':'))
            .unwrap_or(after_at.len());
        let full_name = &after_at[..name_len];
        let name = last_segment(full_name.rsplit(':').next().unwrap_or(full_name));
        let mut tail = &after_at[name_len..];

        let mut args = None;
        if tail.starts_with('(') {
            match find_closing(tail, 0) {
                Some(close) => {
                    args = Some(&tail[1..close]);
                    tail = &tail[close + 1..];
                }
                None => break,
            }
        }
        annotations.push(Annotation { name, args });
        rest = tail.trim_start();
    }
    (annotations, rest)
}

fn has_annotation(annotations: &[Annotation<'_>], names: &[&str]) -> bool {
    annotations.iter().any(|a| names.contains(&a.name))
}

/// A method parameter: `@QueryValue Long page` (Java) or `@Body book: Book` (Kotlin)
#[derive(Debug)]
struct Param<'a> {
    annotations: Vec<Annotation<'a>>,
    name: &'a str,
    ty: String,
}

impl<'a> Param<'a> {
    fn parse(text: &'a str) -> Option<Self> {
        let (annotations, rest) = strip_annotations(text);
        let rest = rest.trim_start_matches("final ").trim();
        let (name, ty) = match rest.split_once(':') {
            Some((name, ty)) if !name.contains(' ') => {
                let ty = ty.split('=').next().unwrap_or(ty);
                (name.trim(), ty.trim())
            }
            _ => {
                let (ty, name) = rest.rsplit_once(char::is_whitespace)?;
                (name.trim(), ty.trim())
            }
        };
        if name.is_empty() || ty.is_empty() {
            return None;
        }
        Some(Param {
            annotations,
            name,
            ty: ty.to_string(),
        })
    }

    fn annotation(&self, name: &str) -> Option<&Annotation<'a>> {
        self.annotations.iter().find(|a| a.name == name)
    }
}

fn map_type(ty: &str, language: Language, types: &TypeContext) -> Schema {
    match language {
        Language::Kotlin => type_mapper::kotlin(ty, types),
        _ => type_mapper::java(ty, types),
    }
}

/// Response body schema of a declared return type, looking through reactive and
/// HTTP wrappers. `void`, `Unit` and bare `HttpResponse` give none.
fn response_schema(ty: &str, language: Language, types: &TypeContext) -> Option<Schema> {
    let ty = ty.trim();
    let nullable = ty.ends_with('?');
    let ty = ty.trim_end_matches('?');
    if matches!(ty, "" | "void" | "Void" | "Unit" | "?" | "*" | "HttpStatus") || last_segment(ty) == "HttpResponse" {
        return None;
    }

    let schema = match generic_parts(ty) {
        Some((outer, args)) if SINGLE_WRAPPERS.contains(&last_segment(outer)) => {
            return response_schema(args.first()?, language, types);
        }
        Some((outer, args)) if STREAM_WRAPPERS.contains(&last_segment(outer)) => {
            Schema::array(response_schema(args.first()?, language, types)?)
        }
        _ => map_type(ty, language, types),
    };
    Some(if nullable { schema.nullable() } else { schema })
}

/// A class, record or enum declaration
#[derive(Debug)]
struct TypeDecl<'a> {
    kind: &'a str,
    name: &'a str,
    /// Annotations in front of the declaration
    header: &'a str,
    /// Primary constructor (Kotlin) or record components (Java)
    parameters: Option<&'a str>,
    body: Option<&'a str>,
}

impl TypeDecl<'_> {
    fn is_enum(&self) -> bool {
        self.kind.starts_with("enum")
    }

    fn is_schema(&self) -> bool {
        if self.kind == "interface" {
            return false;
        }
        self.is_enum()
            || DTO_SUFFIXES.iter().any(|suffix| self.name.ends_with(suffix))
            || self.header.contains("@Introspected")
            || self.header.contains("@Serdeable")
    }

    fn schema(&self, language: Language, types: &TypeContext) -> Schema {
        if self.is_enum() {
            let mut schema = Schema::string().with_enum(self.enum_constants());
            schema.title = Some(self.name.to_string());
            return schema;
        }

        let mut schema = Schema::titled_object(self.name);
        let is_record = self.kind == "record";

        for parameter in self.parameters.map(|p| split_top_level(p, ',')).unwrap_or_default() {
            let (annotations, rest) = strip_annotations(parameter);
            let member = match language {
                Language::Kotlin => kotlin_property(&annotations, rest.trim(), types),
                _ if is_record => java_member(&annotations, rest.trim(), true, types),
                _ => None,
            };
            if let Some((name, property, required)) = member {
                schema.add_property(name, property, required);
            }
        }

        if let Some(body) = self.body {
            let members: Vec<String> = match language {
                Language::Kotlin => top_level_lines(body),
                _ => cpp::member_statements(body),
            };
            for statement in &members {
                let (annotations, rest) = strip_annotations(statement);
                let member = match language {
                    Language::Kotlin => kotlin_property(&annotations, rest.trim(), types),
                    _ => java_member(&annotations, rest.trim(), false, types),
                };
                if let Some((name, property, required)) = member {
                    schema.add_property(name, property, required);
                }
            }
        }
        schema
    }

    fn enum_constants(&self) -> Vec<String> {
        let body = self.body.unwrap_or_default();
        let constants = body.split(';').next().unwrap_or(body);
        split_top_level(constants, ',')
            .into_iter()
            .map(|constant| {
                let (_, rest) = strip_annotations(constant);
                rest.split(['(', '{']).next().unwrap_or(rest).trim().to_string()
            })
            .filter(|constant| !constant.is_empty() && constant.chars().all(|c| c.is_alphanumeric() || c == '_'))
            .collect()
    }
}

fn type_declarations(masked: &str, language: Language) -> Vec<TypeDecl<'_>> {
    let bytes = masked.as_bytes();
    let mut found = Vec::new();

    for caps in TYPE_DECL.captures_iter(masked) {
        let (Some(whole), Some(kind), Some(name)) = (caps.get(0), caps.get(1), caps.get(2)) else {
            continue;
        };
        let header_start = masked[..whole.start()]
            .rfind(['{', '}', ';'])
            .map(|i| i + 1)
            .unwrap_or(0);

        let mut i = whole.end();
        let skip_space = |mut i: usize| {
            while bytes.get(i).is_some_and(|b| *b == b' ' || *b == b'\t') {
                i += 1;
            }
            i
        };
        i = skip_space(i);
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
            i = close + 1;
        }

        let mut body = None;
        while let Some(&b) = bytes.get(i) {
            match b {
                b'{' => {
                    body = find_closing(masked, i).map(|close| &masked[i + 1..close]);
                    break;
                }
                b'(' => match find_closing(masked, i) {
                    Some(close) => i = close + 1,
                    None => break,
                },
                b';' => break,
                b'\n' if language == Language::Kotlin => {
                    let next = masked[i..].trim_start();
                    if !next.starts_with(':') && !next.starts_with('{') && !next.starts_with(',') {
                        break;
                    }
                    i += 1;
                }
                _ => i += 1,
            }
        }

        found.push(TypeDecl {
            kind: kind.as_str(),
            name: name.as_str(),
            header: &masked[header_start..whole.start()],
            parameters,
            body,
        });
    }
    found
}

/// Lines of a Kotlin class body at brace depth zero
fn top_level_lines(body: &str) -> Vec<String> {
    let mut lines = Vec::new();
    let mut depth = 0i32;
    for line in body.lines() {
        if depth == 0 {
            lines.push(line.trim().to_string());
        }
        for c in line.chars() {
            match c {
                '{' => depth += 1,
                '}' => depth -= 1,
                _ => {}
            }
        }
    }
    lines.retain(|line| !line.is_empty());
    lines
}

/// Whether validation annotations force the member to be present
fn forced_required(annotations: &[Annotation<'_>]) -> bool {
    has_annotation(annotations, &["NotNull", "NonNull", "NotBlank", "NotEmpty"])
}

/// `@Pattern(regexp = "a|b")` made of literal alternatives, as enum values
fn pattern_enum(annotations: &[Annotation<'_>]) -> Option<Vec<String>> {
    let pattern = annotations.iter().find(|a| a.name == "Pattern")?.args?;
    let regexp = PATTERN_REGEXP.captures(pattern)?.get(1)?.as_str();
    let regexp = regexp.trim_start_matches('^').trim_end_matches('$');
    let regexp = regexp
        .strip_prefix('(')
        .and_then(|r| r.strip_suffix(')'))
        .unwrap_or(regexp);
    let values: Vec<String> = regexp.split('|').map(str::to_string).collect();
    let literal = values
        .iter()
        .all(|v| !v.is_empty() && v.chars().all(|c| c.is_alphanumeric() || c == '_' || c == '-'));
    (literal && values.len() > 1).then_some(values)
}

fn annotated_schema(mut schema: Schema, annotations: &[Annotation<'_>]) -> Schema {
    if has_annotation(annotations, &["Nullable"]) {
        schema.nullable = true;
    }
    if let Some(values) = pattern_enum(annotations) {
        schema = schema.with_enum(values);
    }
    schema
}

/// A Java field (`private String name;`) or record component (`String name`)
fn java_member(
    annotations: &[Annotation<'_>],
    declaration: &str,
    is_component: bool,
    types: &TypeContext,
) -> Option<(String, Schema, bool)> {
    let mut rest = declaration;
    loop {
        let word = rest.split_whitespace().next()?;
        match word {
            "static" | "class" | "enum" | "interface" | "record" | "abstract" | "return" => return None,
            "private" | "public" | "protected" | "final" | "transient" | "volatile" => {
                rest = rest[word.len()..].trim_start();
            }
            _ => break,
        }
    }
    if rest.contains('(') && !rest.contains('=') {
        return None;
    }
    let declaration = rest.split('=').next().unwrap_or(rest).trim();
    let (ty, name) = declaration.rsplit_once(char::is_whitespace)?;

    let schema = annotated_schema(type_mapper::java(ty, types), annotations);
    let required = forced_required(annotations) || (is_component && !schema.nullable);
    Some((name.trim().to_string(), schema, required))
}

/// A Kotlin `val`/`var` property, from a constructor or class body
fn kotlin_property(
    annotations: &[Annotation<'_>],
    declaration: &str,
    types: &TypeContext,
) -> Option<(String, Schema, bool)> {
    let caps = KOTLIN_PROPERTY.captures(declaration)?;
    if caps.get(1).is_some_and(|m| m.as_str().contains("private")) {
        return None;
    }
    let name = caps.get(3)?.as_str();
    let ty = caps.get(4)?.as_str();
    let has_default = caps.get(5).is_some();

    let schema = annotated_schema(type_mapper::kotlin(ty, types), annotations);
    let required = forced_required(annotations) || (!schema.nullable && !has_default);
    Some((name.to_string(), schema, required))
}
