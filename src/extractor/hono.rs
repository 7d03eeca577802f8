//! Hono route extraction.
//!
//! Routers are `new Hono()` variables, optionally narrowed with `.basePath()`
//! and mounted with `parent.route("/p", child)`. Validator middleware such as
//! `zValidator('json', Schema)` supplies request bodies and typed parameters.

use crate::detector::{ManifestKind, ManifestMarker};
use crate::error::Result;
use crate::extractor::js::{self, Dialect, SymbolTable, Token};
use crate::extractor::{ExtractContext, Framework, FrameworkPlugin};
use crate::model::{Parameter, ParameterLocation, RequestBody, Route, Schema};
use crate::normalize::convert;
use crate::source::{Language, SourceFile};
use crate::type_mapper::{last_segment, TypeContext};
use log::debug;
use once_cell::sync::Lazy;
use regex::Regex;

const MARKERS: &[ManifestMarker] = &[ManifestMarker::new(ManifestKind::PackageJson, "\"hono\"")];

const VALIDATORS: [&str; 6] = [
    "zValidator",
    "validator",
    "tbValidator",
    "vValidator",
    "arktypeValidator",
    "typiaValidator",
];

static IMPORT: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#"(?:from\s*|require\(\s*)['"]hono(?:/[\w/-]+)?['"]"#).expect("valid hono import regex")
});

/// `:id{[0-9]+}` regex constraint on a path parameter
static CONSTRAINT: Lazy<Regex> =
    Lazy::new(|| Regex::new(r":(\w+)\{[^}]*\}").expect("valid hono constraint regex"));

/// Hono route extractor
pub struct HonoPlugin;

impl FrameworkPlugin for HonoPlugin {
    fn framework(&self) -> Framework {
        Framework::Hono
    }

    fn languages(&self) -> &'static [Language] {
        &[Language::TypeScript, Language::JavaScript]
    }

    fn manifest_markers(&self) -> &'static [ManifestMarker] {
        MARKERS
    }

    fn detect_file(&self, file: &SourceFile) -> bool {
        IMPORT.is_match(&file.content)
    }

    fn declared_types(&self, file: &SourceFile) -> Vec<String> {
        js::declared_types(&file.masked())
    }

    fn file_routes(&self, file: &SourceFile, cx: &ExtractContext) -> Result<Vec<Route>> {
        let masked = file.masked();
        let tokens = js::tokenize(&masked);
        let table = SymbolTable::build(&masked, &tokens, Dialect::Hono);

        let mut routes = Vec::new();
        for call in js::route_calls(&tokens, &table, Dialect::Hono, cx.config.propagate_prefixes) {
            let path = convert(&CONSTRAINT.replace_all(&call.path, ":$1"));
            for method in &call.methods {
                let mut route = Route::new(*method, path.clone(), call.handler.clone(), &file.path, call.line);
                for arg in &call.middleware {
                    apply_validator(&mut route, arg, &masked, &table, &cx.types);
                }
                routes.push(route);
            }
        }
        debug!("Found {} Hono routes in {}", routes.len(), file.path.display());
        Ok(routes)
    }

    fn file_schemas(&self, file: &SourceFile, cx: &ExtractContext) -> Result<Vec<Schema>> {
        Ok(js::file_schemas(&file.masked(), &cx.types))
    }
}

/// Apply `validator(target, schema)` middleware to the route
fn apply_validator(route: &mut Route, arg: &[Token<'_>], src: &str, table: &SymbolTable<'_>, types: &TypeContext) {
    let Some((name, open)) = js::callee(arg) else {
        return;
    };
    if !VALIDATORS.contains(&last_segment(&name)) {
        return;
    }
    let Some(close) = js::matching(arg, open) else {
        return;
    };
    let inner = js::call_args(arg, open, close);
    let Some(target) = inner.first().and_then(|a| table.string_arg(a)) else {
        return;
    };
    let schema_arg = inner.get(1).copied().unwrap_or_default();

    match target.as_str() {
        "json" => route.request_body = Some(RequestBody::json(js::schema_of(schema_arg, src, table, types))),
        "form" => route.request_body = Some(RequestBody::form(js::schema_of(schema_arg, src, table, types))),
        "query" | "header" | "param" => {
            for field in js::fields_of(schema_arg, src, table, types) {
                let parameter = match target.as_str() {
                    "query" => Parameter::query(field.name, field.schema).required(field.required),
                    "header" => Parameter::header(field.name, field.schema).required(field.required),
                    _ => {
                        if !route
                            .parameters
                            .iter()
                            .any(|p| p.location == ParameterLocation::Path && p.name == field.name)
                        {
                            continue;
                        }
                        let mut parameter = Parameter::path(field.name);
                        parameter.schema = field.schema;
                        parameter
                    }
                };
                route.push_parameter(parameter);
            }
        }
        other => debug!("Ignoring {} validator target '{}'", name, other),
    }
}
