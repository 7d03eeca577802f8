//! Express route extraction.
//!
//! Routers are `express()`, `express.Router()` and `Router()` variables, mounted
//! with `parent.use("/p", child)`. Besides `.get(path, ...)` style calls, the
//! `.route(path).get(h).post(h)` chain registers every verb under one path.

use crate::detector::{ManifestKind, ManifestMarker};
use crate::error::Result;
use crate::extractor::js::{self, Dialect, SymbolTable, Token};
use crate::extractor::{ExtractContext, Framework, FrameworkPlugin};
use crate::model::{Parameter, RequestBody, Route, Schema};
use crate::normalize::convert;
use crate::source::{Language, SourceFile};
use crate::type_mapper::{last_segment, TypeContext};
use log::debug;
use once_cell::sync::Lazy;
use regex::Regex;

const MARKERS: &[ManifestMarker] = &[ManifestMarker::new(ManifestKind::PackageJson, "\"express\"")];

/// Middleware whose first argument describes the request body
const BODY_VALIDATORS: [&str; 4] = ["validate", "validateBody", "validateRequest", "celebrate"];

static IMPORT: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#"require\(\s*['"]express['"]\s*\)|from\s*['"]express['"]"#).expect("valid express import regex")
});

/// Express route extractor
pub struct ExpressPlugin;

impl FrameworkPlugin for ExpressPlugin {
    fn framework(&self) -> Framework {
        Framework::Express
    }

    fn languages(&self) -> &'static [Language] {
        &[Language::JavaScript, Language::TypeScript]
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
        let table = SymbolTable::build(&masked, &tokens, Dialect::Express);

        let mut routes = Vec::new();
        for call in js::route_calls(&tokens, &table, Dialect::Express, cx.config.propagate_prefixes) {
            let path = convert(&call.path);
            for method in &call.methods {
                let mut route = Route::new(*method, path.clone(), call.handler.clone(), &file.path, call.line);
                for arg in &call.middleware {
                    apply_middleware(&mut route, arg, &masked, &table, &cx.types);
                }
                routes.push(route);
            }
        }
        debug!("Found {} Express routes in {}", routes.len(), file.path.display());
        Ok(routes)
    }

    fn file_schemas(&self, file: &SourceFile, cx: &ExtractContext) -> Result<Vec<Schema>> {
        Ok(js::file_schemas(&file.masked(), &cx.types))
    }
}

fn apply_middleware(route: &mut Route, arg: &[Token<'_>], src: &str, table: &SymbolTable<'_>, types: &TypeContext) {
    let Some((name, open)) = js::callee(arg) else {
        return;
    };
    let Some(close) = js::matching(arg, open) else {
        return;
    };
    let inner = js::call_args(arg, open, close);

    match name.as_str() {
        "express.json" | "bodyParser.json" => {
            if route.request_body.is_none() && route.method.has_body() {
                route.request_body = Some(RequestBody::json(Schema::object()));
            }
        }
        "express.urlencoded" | "bodyParser.urlencoded" => {
            if route.request_body.is_none() && route.method.has_body() {
                route.request_body = Some(RequestBody::form(Schema::object()));
            }
        }
        _ if BODY_VALIDATORS.contains(&last_segment(&name)) => {
            let Some(first) = inner.first().copied() else {
                return;
            };
            let is_object = first.first().is_some_and(|t| t.is_punct("{"));
            if !is_object {
                route.request_body = Some(RequestBody::json(js::schema_of(first, src, table, types)));
                return;
            }
            if let Some(body) = js::object_entry(first, "body") {
                route.request_body = Some(RequestBody::json(js::schema_of(body, src, table, types)));
            }
            if let Some(query) = js::object_entry(first, "query") {
                for field in js::fields_of(query, src, table, types) {
                    route.push_parameter(Parameter::query(field.name, field.schema).required(field.required));
                }
            }
        }
        _ => {}
    }
}
