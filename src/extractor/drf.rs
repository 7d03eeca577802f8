//! Django REST Framework route and serializer extraction.
//!
//! Paths come from the URL confs of the whole file set: router registrations,
//! `path()`/`re_path()` entries and `include()` prefixes. Views resolve against
//! that table by name and fall back to a path derived from the view's name.
//!
//! - `@api_view([...])` functions: one route per listed method
//! - ViewSets: CRUD routes implied by the base classes and defined methods,
//!   plus `@action` routes
//! - `APIView` and generic views: one route per handler method or implied verb

use crate::config::ExtractConfig;
use crate::detector::{ManifestKind, ManifestMarker};
use crate::error::Result;
use crate::extractor::python::{self, LogicalLine, PyClass};
use crate::extractor::serde_schema::rename_case;
use crate::extractor::{ExtractContext, Extraction, Framework, FrameworkPlugin};
use crate::model::{HttpMethod, RequestBody, Response, Route, Schema};
use crate::normalize::{convert, join};
use crate::source::{Language, SourceFile};
use crate::text::{find_calls, find_closing, string_literals, unquote};
use crate::type_mapper::{self, last_segment, TypeContext};
use log::debug;
use once_cell::sync::Lazy;
use regex::Regex;
use std::collections::HashMap;

const MARKERS: &[ManifestMarker] = &[
    ManifestMarker::new(ManifestKind::Requirements, "djangorestframework"),
    ManifestMarker::new(ManifestKind::PyProject, "djangorestframework"),
    ManifestMarker::new(ManifestKind::SetupPy, "djangorestframework"),
    ManifestMarker::new(ManifestKind::Pipfile, "djangorestframework"),
];

/// ViewSet actions in route order, with whether they address one object
const CRUD_ACTIONS: [(&str, HttpMethod, bool); 6] = [
    ("list", HttpMethod::Get, false),
    ("create", HttpMethod::Post, false),
    ("retrieve", HttpMethod::Get, true),
    ("update", HttpMethod::Put, true),
    ("partial_update", HttpMethod::Patch, true),
    ("destroy", HttpMethod::Delete, true),
];

const MIXINS: [(&str, &[&str]); 5] = [
    ("ListModelMixin", &["list"]),
    ("CreateModelMixin", &["create"]),
    ("RetrieveModelMixin", &["retrieve"]),
    ("UpdateModelMixin", &["update", "partial_update"]),
    ("DestroyModelMixin", &["destroy"]),
];

/// Verbs implied by the words of a generic view name, e.g. `ListCreateAPIView`
const GENERIC_VERBS: [(&str, &[HttpMethod]); 5] = [
    ("List", &[HttpMethod::Get]),
    ("Retrieve", &[HttpMethod::Get]),
    ("Create", &[HttpMethod::Post]),
    ("Update", &[HttpMethod::Put, HttpMethod::Patch]),
    ("Destroy", &[HttpMethod::Delete]),
];

static IMPORT: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?m)^\s*(?:from\s+rest_framework\b|import\s+rest_framework\b)").expect("valid drf import regex")
});

static REGISTER: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(\w+)\.register\s*\(").expect("valid router register regex"));

static SERIALIZER_FIELD: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^(\w+)\s*=\s*([\w.]+)\s*\((.*)\)$").expect("valid serializer field regex"));

static ANNOTATED: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^(\w+)\s*:\s*([^=]+?)\s*(?:=\s*(.+))?$").expect("valid annotation regex"));

/// Django REST Framework extractor
pub struct DrfPlugin;

impl FrameworkPlugin for DrfPlugin {
    fn framework(&self) -> Framework {
        Framework::Drf
    }

    fn languages(&self) -> &'static [Language] {
        &[Language::Python]
    }

    fn manifest_markers(&self) -> &'static [ManifestMarker] {
        MARKERS
    }

    fn detect_file(&self, file: &SourceFile) -> bool {
        IMPORT.is_match(&file.content)
    }

    fn declared_types(&self, file: &SourceFile) -> Vec<String> {
        let lines = python::logical_lines(&file.masked());
        python::classes(&lines)
            .into_iter()
            .filter(|c| c.indent == 0 && (is_serializer(c) || is_pydantic(c)))
            .map(|c| c.name)
            .collect()
    }

    fn file_routes(&self, file: &SourceFile, cx: &ExtractContext) -> Result<Vec<Route>> {
        let mut table = UrlTable::default();
        table.add_file(&file.masked(), cx.config.propagate_prefixes);
        Ok(routes_in(file, cx, &table))
    }

    fn file_schemas(&self, file: &SourceFile, cx: &ExtractContext) -> Result<Vec<Schema>> {
        let lines = python::logical_lines(&file.masked());
        let constants: HashMap<&str, &str> = python::module_assignments(&lines).into_iter().collect();

        let schemas = python::classes(&lines)
            .iter()
            .filter(|c| c.indent == 0)
            .filter_map(|class| {
                if is_serializer(class) {
                    Some(serializer_schema(class, &constants, &cx.types))
                } else if is_pydantic(class) {
                    Some(pydantic_schema(class, &cx.types))
                } else {
                    None
                }
            })
            .collect();
        Ok(schemas)
    }

    fn extract_routes(&self, files: &[SourceFile], config: &ExtractConfig) -> Extraction<Route> {
        let cx = self.context(files, config);
        let python_files: Vec<&SourceFile> = files.iter().filter(|f| self.handles(f)).collect();

        // URL confs need not import rest_framework, so every Python file feeds the table
        let mut table = UrlTable::default();
        for file in &python_files {
            table.add_file(&file.masked(), config.propagate_prefixes);
        }

        let mut routes = Vec::new();
        for file in python_files.into_iter().filter(|f| self.detect_file(f)) {
            debug!("[drf] extracting routes from {}", file.path.display());
            routes.extend(routes_in(file, &cx, &table));
        }

        Extraction {
            items: routes,
            skipped: Vec::new(),
        }
    }
}

/// Paths declared by URL confs, keyed by view name
#[derive(Debug, Default)]
struct UrlTable {
    /// ViewSet name to the router registration's base path
    viewsets: HashMap<String, String>,
    /// View class or function name to its `path()` route
    views: HashMap<String, String>,
}

impl UrlTable {
    /// Record one file's URL conf entries; `include()` prefixes only when `propagate`
    fn add_file(&mut self, masked: &str, propagate: bool) {
        let mut router_prefixes: HashMap<String, String> = HashMap::new();

        for name in ["path", "re_path", "url"] {
            for (_, args) in find_calls(masked, name) {
                let parts = python::positional_args(args);
                let (Some(route), Some(view)) = (parts.first().and_then(|r| unquote(r)), parts.get(1)) else {
                    continue;
                };
                let route = if name == "path" {
                    route.to_string()
                } else {
                    regex_route(route)
                };

                let view = view.trim();
                if let Some(included) = view.strip_prefix("include") {
                    // `include(router.urls)` mounts a router under this prefix
                    let target = included.trim_start_matches(|c: char| c == '(' || c.is_whitespace());
                    if let Some((router, _)) = target.split_once(".urls").filter(|_| propagate) {
                        router_prefixes.insert(router.trim().to_string(), route);
                    }
                    continue;
                }

                let view = view.split(".as_view").next().unwrap_or(view);
                self.views.insert(last_segment(view).to_string(), django_path(&route));
            }
        }

        for caps in REGISTER.captures_iter(masked) {
            let (Some(whole), Some(router)) = (caps.get(0), caps.get(1)) else {
                continue;
            };
            let open = whole.end() - 1;
            let Some(close) = find_closing(masked, open) else {
                continue;
            };
            let parts = python::positional_args(&masked[open + 1..close]);
            let (Some(prefix), Some(viewset)) = (parts.first().and_then(|p| unquote(p)), parts.get(1)) else {
                continue;
            };
            let base = router_prefixes.get(router.as_str()).map_or("", String::as_str);
            self.viewsets
                .insert(last_segment(viewset).to_string(), django_path(&join(base, prefix)));
        }
    }
}

/// Canonical path for a Django route, without the trailing slash
fn django_path(route: &str) -> String {
    let path = convert(route);
    let trimmed = path.trim_end_matches('/');
    if trimmed.is_empty() {
        "/".to_string()
    } else {
        trimmed.to_string()
    }
}

/// Turn a `re_path` pattern into a route: `(?P<pk>\d+)` becomes `{pk}`
fn regex_route(pattern: &str) -> String {
    let pattern = pattern.trim_start_matches('^').trim_end_matches('$');
    let mut out = String::with_capacity(pattern.len());
    let mut i = 0;
    while i < pattern.len() {
        let rest = &pattern[i..];
        if let Some(named) = rest.strip_prefix("(?P<") {
            let name_end = named.find('>').unwrap_or(named.len());
            out.push('{');
            out.push_str(&named[..name_end]);
            out.push('}');
            i = find_closing(pattern, i).map_or(pattern.len(), |close| close + 1);
            continue;
        }
        let Some(c) = rest.chars().next() else {
            break;
        };
        match c {
            '\\' => {
                if let Some(escaped) = rest[1..].chars().next() {
                    out.push(escaped);
                    i += escaped.len_utf8();
                }
            }
            '?' | '$' | '^' => {}
            _ => out.push(c),
        }
        i += c.len_utf8();
    }
    out
}

fn is_viewset(class: &PyClass<'_>) -> bool {
    class.has_base(|b| b.contains("ViewSet"))
}

fn is_api_view(class: &PyClass<'_>) -> bool {
    class.has_base(|b| b.ends_with("APIView"))
}

fn is_serializer(class: &PyClass<'_>) -> bool {
    class.has_base(|b| b.contains("Serializer"))
}

fn is_pydantic(class: &PyClass<'_>) -> bool {
    class.has_base(|b| b == "BaseModel")
}

fn routes_in(file: &SourceFile, cx: &ExtractContext, table: &UrlTable) -> Vec<Route> {
    let lines = python::logical_lines(&file.masked());
    let mut routes = Vec::new();

    for function in python::functions(&lines, 0) {
        let Some(decorator) = function.decorator("api_view") else {
            continue;
        };
        let mut methods: Vec<HttpMethod> = decorator
            .args
            .as_deref()
            .map(|args| string_literals(args).into_iter().filter_map(HttpMethod::from_name).collect())
            .unwrap_or_default();
        if methods.is_empty() {
            methods.push(HttpMethod::Get);
        }
        let path = table
            .views
            .get(&function.name)
            .cloned()
            .unwrap_or_else(|| format!("/{}", function.name));
        for method in methods {
            routes.push(Route::new(method, path.clone(), function.name.clone(), &file.path, decorator.line));
        }
    }

    for class in python::classes(&lines).iter().filter(|c| c.indent == 0) {
        if is_viewset(class) {
            routes.extend(viewset_routes(class, file, cx, table));
        } else if is_api_view(class) {
            routes.extend(api_view_routes(class, file, cx, table));
        }
    }

    routes.sort_by_key(|r| r.source_line);
    debug!("Found {} DRF routes in {}", routes.len(), file.path.display());
    routes
}

/// `serializer_class` of a view as a schema reference
fn serializer_of(value: Option<&str>, types: &TypeContext) -> Option<Schema> {
    let name = value?.trim();
    let is_name = !name.is_empty() && name.chars().all(|c| c.is_alphanumeric() || c == '_' || c == '.');
    is_name.then(|| types.named(name))
}

fn viewset_routes(class: &PyClass<'_>, file: &SourceFile, cx: &ExtractContext, table: &UrlTable) -> Vec<Route> {
    let methods = class.methods();
    let actions: Vec<&str> = if class.has_base(|b| b == "ModelViewSet") {
        CRUD_ACTIONS.iter().map(|(name, _, _)| *name).collect()
    } else if class.has_base(|b| b == "ReadOnlyModelViewSet") {
        vec!["list", "retrieve"]
    } else {
        CRUD_ACTIONS
            .iter()
            .map(|(name, _, _)| *name)
            .filter(|action| {
                methods.iter().any(|m| m.name == *action)
                    || MIXINS
                        .iter()
                        .any(|(mixin, provided)| provided.contains(action) && class.has_base(|b| b == *mixin))
            })
            .collect()
    };

    let base = table.viewsets.get(&class.name).cloned().unwrap_or_else(|| {
        let stem = class.name.strip_suffix("ViewSet").unwrap_or(&class.name);
        format!("/{}s", stem.to_lowercase())
    });
    let lookup = class
        .assignment("lookup_url_kwarg")
        .or_else(|| class.assignment("lookup_field"))
        .and_then(unquote)
        .unwrap_or("id");
    let detail_base = join(&base, &format!("{{{}}}", lookup));
    let serializer = serializer_of(class.assignment("serializer_class"), &cx.types);

    let mut routes = Vec::new();
    for (action, method, detail) in CRUD_ACTIONS.iter().filter(|(name, _, _)| actions.contains(name)) {
        let path = if *detail { detail_base.clone() } else { base.clone() };
        let line = methods.iter().find(|m| m.name == *action).map_or(class.line, |m| m.anchor_line());
        let mut route = Route::new(*method, path, format!("{}.{}", class.name, action), &file.path, line);

        if let Some(schema) = &serializer {
            if method.has_body() {
                route.request_body = Some(RequestBody::json(schema.clone()));
            }
        }
        let response = match *action {
            "destroy" => Response::with_status("204", None),
            "create" => Response::with_status("201", serializer.clone()),
            "list" => Response::with_status("200", serializer.clone().map(Schema::array)),
            _ => Response::with_status("200", serializer.clone()),
        };
        routes.push(route.with_response(response));
    }

    for function in &methods {
        let Some(decorator) = function.decorator("action") else {
            continue;
        };
        let mut verbs: Vec<HttpMethod> = decorator
            .keyword("methods")
            .map(|m| string_literals(m).into_iter().filter_map(HttpMethod::from_name).collect())
            .unwrap_or_default();
        if verbs.is_empty() {
            verbs.push(HttpMethod::Get);
        }
        let url_path = decorator
            .keyword("url_path")
            .and_then(unquote)
            .unwrap_or(&function.name);
        let path = if python::is_true(decorator.keyword("detail")) {
            join(&detail_base, url_path)
        } else {
            join(&base, url_path)
        };
        let schema = serializer_of(decorator.keyword("serializer_class"), &cx.types).or_else(|| serializer.clone());

        for verb in verbs {
            let mut route = Route::new(
                verb,
                path.clone(),
                format!("{}.{}", class.name, function.name),
                &file.path,
                decorator.line,
            );
            if let Some(schema) = &schema {
                if verb.has_body() {
                    route.request_body = Some(RequestBody::json(schema.clone()));
                }
                if verb != HttpMethod::Delete {
                    route = route.with_response(Response::ok(schema.clone()));
                }
            }
            routes.push(route);
        }
    }
    routes
}

fn api_view_routes(class: &PyClass<'_>, file: &SourceFile, cx: &ExtractContext, table: &UrlTable) -> Vec<Route> {
    let methods = class.methods();
    let generic_words: Vec<&str> = GENERIC_VERBS
        .iter()
        .map(|(word, _)| *word)
        .filter(|word| class.has_base(|b| b.ends_with("APIView") && b.contains(*word)))
        .collect();
    let mixin_actions: Vec<&str> = MIXINS
        .iter()
        .filter(|(mixin, _)| class.has_base(|b| b == *mixin))
        .flat_map(|(_, provided)| provided.iter().copied())
        .collect();

    let implied = |method: HttpMethod| -> bool {
        GENERIC_VERBS
            .iter()
            .any(|(word, verbs)| generic_words.contains(word) && verbs.contains(&method))
            || CRUD_ACTIONS
                .iter()
                .any(|(action, verb, _)| *verb == method && mixin_actions.contains(action))
    };
    let defined = |method: HttpMethod| methods.iter().find(|m| m.name == method.as_str().to_lowercase());

    let path = table.views.get(&class.name).cloned().unwrap_or_else(|| {
        let stem = class.name.strip_suffix("APIView").unwrap_or(&class.name);
        let stem = stem.strip_suffix("View").unwrap_or(stem);
        format!("/{}", rename_case(stem, Some("snake_case")))
    });
    let serializer = serializer_of(class.assignment("serializer_class"), &cx.types);
    let lists = generic_words.contains(&"List") && !generic_words.contains(&"Retrieve");

    let mut routes = Vec::new();
    let verbs = [
        HttpMethod::Get,
        HttpMethod::Post,
        HttpMethod::Put,
        HttpMethod::Patch,
        HttpMethod::Delete,
        HttpMethod::Head,
        HttpMethod::Options,
    ];
    for method in verbs {
        let handler = defined(method);
        if handler.is_none() && !implied(method) {
            continue;
        }
        let line = handler.map_or(class.line, |h| h.anchor_line());
        let mut route = Route::new(
            method,
            path.clone(),
            format!("{}.{}", class.name, method.as_str().to_lowercase()),
            &file.path,
            line,
        );
        if let Some(schema) = &serializer {
            if method.has_body() {
                route.request_body = Some(RequestBody::json(schema.clone()));
            }
            route = match method {
                HttpMethod::Delete => route.with_response(Response::with_status("204", None)),
                HttpMethod::Post => route.with_response(Response::with_status("201", Some(schema.clone()))),
                HttpMethod::Get if lists => route.with_response(Response::ok(Schema::array(schema.clone()))),
                _ => route.with_response(Response::ok(schema.clone())),
            };
        }
        routes.push(route);
    }
    routes
}

fn serializer_schema(class: &PyClass<'_>, constants: &HashMap<&str, &str>, types: &TypeContext) -> Schema {
    let mut schema = Schema::titled_object(class.name.as_str());

    for line in class.members() {
        let Some(caps) = SERIALIZER_FIELD.captures(&line.text) else {
            continue;
        };
        let name = &caps[1];
        let kind = last_segment(&caps[2]);
        let args = caps.get(3).map_or("", |m| m.as_str());

        let relaxed = python::keyword_arg(args, "required").is_some_and(|v| v.trim() == "False")
            || python::is_true(python::keyword_arg(args, "read_only"))
            || python::is_true(python::keyword_arg(args, "allow_null"))
            || python::keyword_arg(args, "default").is_some()
            || matches!(kind, "SerializerMethodField" | "ReadOnlyField" | "HiddenField");

        let mut field = serializer_field(kind, args, constants, types);
        if python::is_true(python::keyword_arg(args, "many")) {
            field = Schema::array(field);
        }
        if python::is_true(python::keyword_arg(args, "allow_null")) {
            field = field.nullable();
        }
        schema.add_property(name, field, !relaxed);
    }

    if let Some(meta) = class.nested_class("Meta") {
        let listed = meta.assignment("fields").map(string_literals).unwrap_or_default();
        for name in listed.into_iter().filter(|n| *n != "__all__") {
            if !schema.properties.contains_key(name) {
                schema.add_property(name, Schema::default(), false);
            }
        }
    }
    schema
}

/// Schema of one serializer field call such as `CharField(max_length=20)`
fn serializer_field(kind: &str, args: &str, constants: &HashMap<&str, &str>, types: &TypeContext) -> Schema {
    match kind {
        "CharField" | "SlugField" | "RegexField" | "IPAddressField" | "StringRelatedField" | "SlugRelatedField"
        | "DurationField" | "HiddenField" => Schema::string(),
        "EmailField" => Schema::string().with_format("email"),
        "URLField" | "FileField" | "ImageField" | "HyperlinkedRelatedField" | "HyperlinkedIdentityField" => {
            Schema::string().with_format("uri")
        }
        "UUIDField" => Schema::string().with_format("uuid"),
        "IntegerField" | "PrimaryKeyRelatedField" => Schema::integer(),
        "FloatField" => Schema::number().with_format("float"),
        "DecimalField" => Schema::string().with_format("decimal"),
        "BooleanField" | "NullBooleanField" => Schema::boolean(),
        "DateField" => Schema::string().with_format("date"),
        "DateTimeField" => Schema::string().with_format("date-time"),
        "TimeField" => Schema::string().with_format("time"),
        "ChoiceField" => Schema::string().with_enum(choices(args, constants)),
        "MultipleChoiceField" => Schema::array(Schema::string().with_enum(choices(args, constants))),
        "ListField" => {
            let child = python::keyword_arg(args, "child")
                .and_then(|child| SERIALIZER_FIELD.captures(&format!("child = {}", child)).map(|caps| {
                    let inner = caps.get(3).map_or("", |m| m.as_str());
                    serializer_field(last_segment(&caps[2]), inner, constants, types)
                }))
                .unwrap_or_else(Schema::object);
            Schema::array(child)
        }
        "DictField" | "JSONField" | "HStoreField" => Schema::object(),
        "SerializerMethodField" | "ReadOnlyField" => Schema::default(),
        other if other.ends_with("Serializer") => types.named(other),
        _ => Schema::object(),
    }
}

/// `choices=` values, resolving a module-level constant
fn choices(args: &str, constants: &HashMap<&str, &str>) -> Vec<String> {
    let positional = python::positional_args(args);
    let Some(value) = python::keyword_arg(args, "choices").or_else(|| positional.first().copied()) else {
        return Vec::new();
    };
    let literal = constants.get(value.trim()).copied().unwrap_or(value);
    python::string_items(literal)
}

fn pydantic_schema(class: &PyClass<'_>, types: &TypeContext) -> Schema {
    let mut schema = Schema::titled_object(class.name.as_str());
    for line in class.members() {
        let Some(field) = annotated_field(line) else {
            continue;
        };
        let (name, ty, default) = field;
        if name == "model_config" || ty.starts_with("ClassVar") {
            continue;
        }
        let required = match default {
            None => true,
            Some(default) => default.starts_with("Field(...") || default.starts_with("Field( ..."),
        };
        schema.add_property(name, type_mapper::python(ty, types), required);
    }
    schema
}

fn annotated_field(line: &LogicalLine) -> Option<(&str, &str, Option<&str>)> {
    let caps = ANNOTATED.captures(&line.text)?;
    Some((
        caps.get(1)?.as_str(),
        caps.get(2)?.as_str(),
        caps.get(3).map(|m| m.as_str().trim()),
    ))
}
