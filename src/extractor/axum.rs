use crate::config::ExtractConfig;
use crate::detector::{ManifestKind, ManifestMarker};
use crate::error::Result;
use crate::extractor::rust_support::{
    self, generic_arg, json_payload, line_of, path_string, string_lit, type_name, type_segment,
};
use crate::extractor::serde_schema;
use crate::extractor::{ExtractContext, Extraction, Framework, FrameworkPlugin};
use crate::model::{HttpMethod, Parameter, ParameterLocation, RequestBody, Response, Route, Schema};
use crate::normalize::{convert, join};
use crate::parser::{AstParser, ParsedFile};
use crate::source::{Language, SourceFile};
use crate::type_mapper::TypeContext;
use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};
use syn::visit::{self, Visit};
use syn::{Block, Expr, ExprMethodCall, FnArg, ItemStruct, ReturnType, Signature, Stmt, Type};

use log::debug;

const MARKERS: &[ManifestMarker] = &[ManifestMarker::new(ManifestKind::Cargo, "axum")];

/// Axum route extractor
pub struct AxumPlugin;

impl FrameworkPlugin for AxumPlugin {
    fn framework(&self) -> Framework {
        Framework::Axum
    }

    fn languages(&self) -> &'static [Language] {
        &[Language::Rust]
    }

    fn manifest_markers(&self) -> &'static [ManifestMarker] {
        MARKERS
    }

    fn detect_file(&self, file: &SourceFile) -> bool {
        rust_support::mentions_crate(&file.content, "axum")
    }

    fn declared_types(&self, file: &SourceFile) -> Vec<String> {
        syn::parse_file(&file.content)
            .map(|tree| serde_schema::declared_names(&tree))
            .unwrap_or_default()
    }

    fn file_routes(&self, file: &SourceFile, cx: &ExtractContext) -> Result<Vec<Route>> {
        let parsed = AstParser::parse_source(file)?;
        let handlers = HandlerTable::build(std::slice::from_ref(&parsed));
        Ok(walk_file(&parsed, &handlers, cx))
    }

    fn file_schemas(&self, file: &SourceFile, cx: &ExtractContext) -> Result<Vec<Schema>> {
        let parsed = AstParser::parse_source(file)?;
        Ok(serde_schema::file_schemas(
            &parsed.syntax_tree,
            &cx.types,
            cx.config.option_precedence,
        ))
    }

    /// Routes from every Axum file, with handlers looked up across the whole set
    fn extract_routes(&self, files: &[SourceFile], config: &ExtractConfig) -> Extraction<Route> {
        let (parsed, skipped) = rust_support::parse_all(files, Framework::Axum);

        // First pass: collect handler signatures and types from all files
        let handlers = HandlerTable::build(&parsed);
        let cx = ExtractContext::new(
            *config,
            TypeContext::from_names(parsed.iter().flat_map(|p| serde_schema::declared_names(&p.syntax_tree))),
        );

        let detected: HashSet<&Path> = files
            .iter()
            .filter(|f| self.handles(f) && self.detect_file(f))
            .map(|f| f.path.as_path())
            .collect();

        let mut routes = Vec::new();
        for file in parsed.iter().filter(|p| detected.contains(p.path.as_path())) {
            debug!("[axum] extracting routes from {}", file.path.display());
            routes.extend(walk_file(file, &handlers, &cx));
        }

        Extraction { items: routes, skipped }
    }

    fn extract_schemas(&self, files: &[SourceFile], config: &ExtractConfig) -> Extraction<Schema> {
        serde_schema::extract(files, Framework::Axum, config)
    }
}

fn walk_file<'ast>(
    file: &'ast ParsedFile,
    handlers: &HandlerTable<'ast>,
    cx: &ExtractContext,
) -> Vec<Route> {
    let tree = &file.syntax_tree;
    if !rust_support::uses_crate(tree, "axum") {
        debug!("{} does not use axum", file.path.display());
        return Vec::new();
    }
    let functions: HashMap<String, &Block> = rust_support::collect_functions(tree)
        .into_iter()
        .map(|(sig, _, block)| (sig.ident.to_string(), block))
        .collect();

    let nested_only = if cx.config.propagate_prefixes {
        nested_only_functions(&functions)
    } else {
        HashSet::new()
    };

    let mut walker = RouteWalker {
        file: &file.path,
        functions,
        nested_only,
        handlers,
        cx,
        prefix: String::new(),
        locals: HashMap::new(),
        skipped_locals: HashSet::new(),
        active: HashSet::new(),
        routes: Vec::new(),
    };
    walker.visit_file(tree);
    walker.routes
}

/// Visitor for traversing the AST and finding Axum routes
struct RouteWalker<'ast, 'a> {
    file: &'a PathBuf,
    /// Functions of this file by name
    functions: HashMap<String, &'ast Block>,
    /// Functions reached only through `.nest`, walked from their call site
    nested_only: HashSet<String>,
    handlers: &'a HandlerTable<'ast>,
    cx: &'a ExtractContext,
    prefix: String,
    /// `let` bindings of the function being walked
    locals: HashMap<String, &'ast Expr>,
    /// Bindings walked from the `.nest` that uses them
    skipped_locals: HashSet<String>,
    /// Functions on the current nest path, to stop recursion
    active: HashSet<String>,
    routes: Vec<Route>,
}

impl<'ast, 'a> RouteWalker<'ast, 'a> {
    fn walk_fn(&mut self, name: &str, block: &'ast Block) {
        if self.active.is_empty() && self.nested_only.contains(name) {
            debug!("Skipping {} at top level: walked from its .nest call", name);
            return;
        }
        self.walk_body(block);
    }

    fn walk_body(&mut self, block: &'ast Block) {
        let locals = local_bindings(block);
        let skipped = if self.cx.config.propagate_prefixes {
            nest_target_locals(block, &locals)
        } else {
            HashSet::new()
        };
        let saved_locals = std::mem::replace(&mut self.locals, locals);
        let saved_skipped = std::mem::replace(&mut self.skipped_locals, skipped);

        visit::visit_block(self, block);

        self.locals = saved_locals;
        self.skipped_locals = saved_skipped;
    }

    /// Walk the router a `.nest` or `.merge` points at, under `prefix`
    fn walk_target(&mut self, target: &'ast Expr, prefix: String) {
        let saved = std::mem::replace(&mut self.prefix, prefix);

        match target {
            Expr::Paren(paren) => self.walk_target(&paren.expr, self.prefix.clone()),
            Expr::Reference(reference) => self.walk_target(&reference.expr, self.prefix.clone()),
            Expr::MethodCall(call) if is_transparent(&call.method.to_string()) => {
                self.walk_target(&call.receiver, self.prefix.clone());
            }
            Expr::Path(path) if self.local_target(path).is_some() => {
                if let Some(init) = self.local_target(path) {
                    self.visit_expr(init);
                }
            }
            Expr::Call(call) => match called_function(call) {
                Some(name) if self.functions.contains_key(&name) => {
                    if let Some(block) = self.functions.get(&name).copied() {
                        if self.active.insert(name.clone()) {
                            self.walk_body(block);
                            self.active.remove(&name);
                        } else {
                            debug!("Recursive router function {} not walked again", name);
                        }
                    }
                }
                Some(name) => debug!("Router function {} is not defined in this file", name),
                None => self.visit_expr(target),
            },
            _ => self.visit_expr(target),
        }

        self.prefix = saved;
    }

    fn local_target(&self, path: &syn::ExprPath) -> Option<&'ast Expr> {
        let ident = path.path.get_ident()?.to_string();
        self.locals.get(&ident).copied()
    }

    fn parse_route(&mut self, node: &'ast ExprMethodCall) {
        if node.args.len() < 2 {
            return;
        }
        let Some(raw) = string_lit(&node.args[0]) else {
            debug!("Skipping .route with a non-literal path");
            return;
        };
        let path = convert(&join(&self.prefix, &raw));
        let line = line_of(&node.method);

        let mut pairs = Vec::new();
        method_router(&node.args[1], &mut pairs);
        if pairs.is_empty() {
            debug!("No method router recognised for {}", path);
        }

        for (method, handler) in pairs {
            debug!("Found route: {} {} -> {}", method, path, handler);
            let mut route = Route::new(method, path.clone(), handler, self.file.clone(), line);
            self.handlers.apply(&mut route, self.cx);
            self.routes.push(route);
        }
    }
}

impl<'ast, 'a> Visit<'ast> for RouteWalker<'ast, 'a> {
    fn visit_expr_method_call(&mut self, node: &'ast ExprMethodCall) {
        let method_name = node.method.to_string();
        let propagate = self.cx.config.propagate_prefixes;

        match method_name.as_str() {
            "route" => {
                // Receiver first so chained routes come out in source order
                self.visit_expr(&node.receiver);
                self.parse_route(node);
            }
            "nest" | "nest_service" if propagate && node.args.len() == 2 => {
                self.visit_expr(&node.receiver);
                match string_lit(&node.args[0]) {
                    Some(sub) => {
                        let prefix = join(&self.prefix, &sub);
                        self.walk_target(&node.args[1], prefix);
                    }
                    None => self.visit_expr(&node.args[1]),
                }
            }
            "merge" if propagate && node.args.len() == 1 => {
                self.visit_expr(&node.receiver);
                let target = &node.args[0];
                let nested_fn = match target {
                    Expr::Call(call) => {
                        called_function(call).filter(|name| self.nested_only.contains(name))
                    }
                    _ => None,
                };
                if nested_fn.is_some() {
                    self.walk_target(target, self.prefix.clone());
                } else {
                    self.visit_expr(target);
                }
            }
            _ => visit::visit_expr_method_call(self, node),
        }
    }

    fn visit_item_fn(&mut self, node: &'ast syn::ItemFn) {
        self.walk_fn(&node.sig.ident.to_string(), &node.block);
    }

    fn visit_impl_item_fn(&mut self, node: &'ast syn::ImplItemFn) {
        self.walk_fn(&node.sig.ident.to_string(), &node.block);
    }

    fn visit_local(&mut self, node: &'ast syn::Local) {
        if let Some(name) = rust_support::pattern_ident(&node.pat) {
            if self.skipped_locals.contains(&name) {
                return;
            }
        }
        visit::visit_local(self, node);
    }
}

/// Links of a router chain that do not add routes
fn is_transparent(method: &str) -> bool {
    matches!(method, "layer" | "route_layer" | "with_state" | "fallback" | "into")
}

/// Method/handler pairs of a method router such as `get(a).post(b)`, in order
fn method_router(expr: &Expr, out: &mut Vec<(HttpMethod, String)>) {
    match expr {
        Expr::Paren(paren) => method_router(&paren.expr, out),
        Expr::Group(group) => method_router(&group.expr, out),
        Expr::Call(call) => {
            let Expr::Path(func) = &*call.func else {
                return;
            };
            let Some(name) = rust_support::last_ident(&func.path) else {
                return;
            };
            let args: Vec<&Expr> = call.args.iter().collect();
            push_method(&name, &args, out);
        }
        Expr::MethodCall(call) => {
            method_router(&call.receiver, out);
            let args: Vec<&Expr> = call.args.iter().collect();
            push_method(&call.method.to_string(), &args, out);
        }
        _ => {}
    }
}

fn push_method(name: &str, args: &[&Expr], out: &mut Vec<(HttpMethod, String)>) {
    if name == "on" || name == "on_service" {
        // on(MethodFilter::GET, handler)
        let method = args.first().and_then(|filter| match filter {
            Expr::Path(p) => rust_support::last_ident(&p.path).and_then(|m| HttpMethod::from_name(&m)),
            _ => None,
        });
        if let Some(method) = method {
            out.push((method, args.get(1).map(|h| handler_name(h)).unwrap_or_default()));
        }
        return;
    }

    let base = name.strip_suffix("_service").unwrap_or(name);
    let method = match base {
        "get" | "post" | "put" | "delete" | "patch" | "head" | "options" | "trace" | "any" => {
            HttpMethod::from_name(base)
        }
        _ => None,
    };
    if let Some(method) = method {
        let handler = if name.ends_with("_service") {
            String::new()
        } else {
            args.first().map(|h| handler_name(h)).unwrap_or_default()
        };
        out.push((method, handler));
    }
}

/// Handler name of a method router argument; closures have none
fn handler_name(expr: &Expr) -> String {
    match expr {
        Expr::Path(path) => path_string(&path.path),
        Expr::MethodCall(call) => handler_name(&call.receiver),
        Expr::Reference(reference) => handler_name(&reference.expr),
        _ => String::new(),
    }
}

/// Name of a same-file function called as `f()` or `module::f()`
fn called_function(call: &syn::ExprCall) -> Option<String> {
    let Expr::Path(func) = &*call.func else {
        return None;
    };
    let type_qualified = func
        .path
        .segments
        .iter()
        .any(|s| s.ident.to_string().starts_with(|c: char| c.is_ascii_uppercase()));
    if type_qualified {
        return None;
    }
    rust_support::last_ident(&func.path)
}

/// Top-level `let name = expr;` bindings of a block
fn local_bindings(block: &Block) -> HashMap<String, &Expr> {
    block
        .stmts
        .iter()
        .filter_map(|stmt| match stmt {
            Stmt::Local(local) => {
                let name = rust_support::pattern_ident(&local.pat)?;
                let init = local.init.as_ref()?;
                Some((name, &*init.expr))
            }
            _ => None,
        })
        .collect()
}

/// Local bindings of `block` used as `.nest` targets
fn nest_target_locals(block: &Block, locals: &HashMap<String, &Expr>) -> HashSet<String> {
    let mut collector = NestCollector::default();
    collector.visit_block(block);
    collector
        .nest_targets
        .into_iter()
        .filter_map(bound_local)
        .filter(|name| locals.contains_key(name))
        .collect()
}

/// The binding a nest target names, through `.layer(..)` and similar links
fn bound_local(expr: &Expr) -> Option<String> {
    match expr {
        Expr::Path(path) => path.path.get_ident().map(|i| i.to_string()),
        Expr::Paren(paren) => bound_local(&paren.expr),
        Expr::Reference(reference) => bound_local(&reference.expr),
        Expr::MethodCall(call) if is_transparent(&call.method.to_string()) => {
            bound_local(&call.receiver)
        }
        _ => None,
    }
}

/// Functions reachable only through `.nest`: direct nest targets plus everything
/// they nest or merge in turn
fn nested_only_functions(functions: &HashMap<String, &Block>) -> HashSet<String> {
    let mut edges: HashMap<String, Vec<String>> = HashMap::new();
    let mut roots = Vec::new();

    for (name, block) in functions {
        let mut collector = NestCollector::default();
        collector.visit_block(block);
        let locals = local_bindings(block);

        let resolve = |expr: &Expr| target_function(expr, &locals);
        roots.extend(collector.nest_targets.iter().copied().filter_map(|e| resolve(e)));
        edges.entry(name.clone()).or_default().extend(
            collector
                .nest_targets
                .iter()
                .chain(collector.merge_targets.iter())
                .copied()
                .filter_map(|e| resolve(e)),
        );
    }

    let mut nested = HashSet::new();
    let mut pending: Vec<String> = roots.into_iter().filter(|r| functions.contains_key(r)).collect();
    while let Some(name) = pending.pop() {
        if nested.insert(name.clone()) {
            if let Some(next) = edges.get(&name) {
                pending.extend(next.iter().filter(|n| functions.contains_key(*n)).cloned());
            }
        }
    }
    nested
}

fn target_function(expr: &Expr, locals: &HashMap<String, &Expr>) -> Option<String> {
    match expr {
        Expr::Call(call) => called_function(call),
        Expr::Paren(paren) => target_function(&paren.expr, locals),
        Expr::Reference(reference) => target_function(&reference.expr, locals),
        Expr::MethodCall(call) if is_transparent(&call.method.to_string()) => {
            target_function(&call.receiver, locals)
        }
        Expr::Path(path) => {
            let ident = path.path.get_ident()?.to_string();
            locals.get(&ident).and_then(|init| match init {
                Expr::Path(_) => None,
                other => target_function(other, locals),
            })
        }
        _ => None,
    }
}

/// Collects the targets of `.nest` and `.merge` calls
#[derive(Default)]
struct NestCollector<'ast> {
    nest_targets: Vec<&'ast Expr>,
    merge_targets: Vec<&'ast Expr>,
}

impl<'ast> Visit<'ast> for NestCollector<'ast> {
    fn visit_expr_method_call(&mut self, node: &'ast ExprMethodCall) {
        match node.method.to_string().as_str() {
            "nest" | "nest_service" if node.args.len() == 2 => self.nest_targets.push(&node.args[1]),
            "merge" if node.args.len() == 1 => self.merge_targets.push(&node.args[0]),
            _ => {}
        }
        visit::visit_expr_method_call(self, node);
    }

    // Nested fns have their own targets
    fn visit_item_fn(&mut self, _node: &'ast syn::ItemFn) {}
}

/// Cross-file table of handler signatures and the structs their extractors use
struct HandlerTable<'ast> {
    functions: HashMap<String, &'ast Signature>,
    structs: HashMap<String, ItemStruct>,
}

impl<'ast> HandlerTable<'ast> {
    fn build(files: &'ast [ParsedFile]) -> Self {
        let mut functions = HashMap::new();
        let mut structs = HashMap::new();
        for file in files {
            for (sig, _, _) in rust_support::collect_functions(&file.syntax_tree) {
                functions.entry(sig.ident.to_string()).or_insert(sig);
            }
            for (name, item) in serde_schema::struct_table(&file.syntax_tree) {
                structs.entry(name).or_insert(item);
            }
        }
        debug!(
            "Handler table: {} functions, {} structs",
            functions.len(),
            structs.len()
        );
        Self { functions, structs }
    }

    /// Fill in parameters, body and response from the handler's signature
    fn apply(&self, route: &mut Route, cx: &ExtractContext) {
        let name = route.handler.rsplit("::").next().unwrap_or_default();
        if name.is_empty() {
            return;
        }
        let Some(sig) = self.functions.get(name) else {
            debug!("Unknown handler: {}", route.handler);
            return;
        };
        let precedence = cx.config.option_precedence;

        for input in &sig.inputs {
            let FnArg::Typed(pat_type) = input else {
                continue;
            };
            let Some(segment) = type_segment(&pat_type.ty) else {
                continue;
            };
            let Some(inner) = generic_arg(segment, 0) else {
                continue;
            };

            match segment.ident.to_string().as_str() {
                "Json" => {
                    let schema = serde_schema::map_type(inner, &cx.types, precedence);
                    route.request_body = Some(RequestBody::json(schema));
                }
                "Form" => {
                    let schema = serde_schema::map_type(inner, &cx.types, precedence);
                    route.request_body = Some(RequestBody::form(schema));
                }
                "Query" => {
                    if let Some(item) = type_name(inner).and_then(|n| self.structs.get(&n)) {
                        for field in serde_schema::struct_fields(item, &cx.types, precedence) {
                            route.push_parameter(
                                Parameter::query(field.key, field.schema).required(field.required),
                            );
                        }
                    }
                }
                "Path" => self.apply_path(route, inner, cx),
                _ => {}
            }
        }

        if let ReturnType::Type(_, ty) = &sig.output {
            if let Some(schema) = response_schema(ty, cx) {
                route.responses.push(Response::ok(schema));
            }
        }
    }

    /// Refine path parameter schemas from a `Path<T>` extractor
    fn apply_path(&self, route: &mut Route, inner: &Type, cx: &ExtractContext) {
        let precedence = cx.config.option_precedence;
        let names: Vec<String> = route
            .parameters
            .iter()
            .filter(|p| p.location == ParameterLocation::Path)
            .map(|p| p.name.clone())
            .collect();

        let typed: Vec<(String, Schema)> = match inner {
            Type::Tuple(tuple) => names
                .iter()
                .cloned()
                .zip(tuple.elems.iter().map(|t| serde_schema::map_type(t, &cx.types, precedence)))
                .collect(),
            _ => match type_name(inner).and_then(|n| self.structs.get(&n)) {
                Some(item) => serde_schema::struct_fields(item, &cx.types, precedence)
                    .into_iter()
                    .filter(|f| names.contains(&f.key))
                    .map(|f| (f.key, f.schema))
                    .collect(),
                None => names
                    .first()
                    .map(|n| (n.clone(), serde_schema::map_type(inner, &cx.types, precedence)))
                    .into_iter()
                    .collect(),
            },
        };

        for (name, schema) in typed {
            route.push_parameter(Parameter {
                name,
                location: ParameterLocation::Path,
                required: true,
                schema,
            });
        }
    }
}

/// Response body of a handler return type
fn response_schema(ty: &Type, cx: &ExtractContext) -> Option<Schema> {
    if let Some(payload) = json_payload(ty) {
        return Some(serde_schema::map_type(payload, &cx.types, cx.config.option_precedence));
    }
    match ty {
        Type::Reference(reference) => response_schema(&reference.elem, cx),
        _ => match type_name(ty)?.as_str() {
            "str" | "String" | "Html" => Some(Schema::string()),
            _ => None,
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::OptionPrecedence;
    use crate::model::SchemaType;

    fn rust_file(code: &str) -> SourceFile {
        SourceFile::new("test.rs", Language::Rust, code)
    }

    fn extract(code: &str) -> Vec<Route> {
        extract_with(code, ExtractConfig::default())
    }

    fn extract_with(code: &str, config: ExtractConfig) -> Vec<Route> {
        let extraction = AxumPlugin.extract_routes(&[rust_file(code)], &config);
        assert!(extraction.skipped.is_empty(), "unexpected skip: {:?}", extraction.skipped);
        extraction.items
    }

    fn paths(routes: &[Route]) -> Vec<(HttpMethod, &str)> {
        routes.iter().map(|r| (r.method, r.path.as_str())).collect()
    }

    #[test]
    fn test_simple_route_extraction() {
        let code = r#"
            use axum::{Router, routing::get};

            async fn handler() -> &'static str {
                "Hello, World!"
            }

            fn app() -> Router {
                Router::new().route("/hello", get(handler))
            }
        "#;
        let routes = extract(code);

        assert_eq!(routes.len(), 1);
        assert_eq!(routes[0].path, "/hello");
        assert_eq!(routes[0].method, HttpMethod::Get);
        assert_eq!(routes[0].handler, "handler");
        assert_eq!(routes[0].operation_id, "getHandler");
        assert_eq!(routes[0].source_line, 9);
        assert_eq!(routes[0].responses[0].schema, Some(Schema::string()));
    }

    #[test]
    fn test_chained_method_router_shares_route_line() {
        let code = r#"use axum::{Router, routing::get};
async fn list_users() {}
async fn create_user() {}
fn app() -> Router {
    Router::new()
        .route("/users", get(list_users).post(create_user))
}
"#;
        let routes = extract(code);

        assert_eq!(routes.len(), 2);
        assert_eq!(routes[0].method, HttpMethod::Get);
        assert_eq!(routes[0].handler, "list_users");
        assert_eq!(routes[1].method, HttpMethod::Post);
        assert_eq!(routes[1].handler, "create_user");
        assert!(routes.iter().all(|r| r.source_line == 6));
    }

    #[test]
    fn test_routes_in_source_order_with_layers() {
        let code = r#"
            use axum::{Router, routing::{get, delete, any, on, MethodFilter}};

            fn app() -> Router {
                Router::new()
                    .route("/a", get(a).layer(TraceLayer::new()))
                    .route("/b/:id", delete(b))
                    .route("/c", any(c))
                    .route("/d", on(MethodFilter::PUT, d))
                    .route("/e", get(|| async { "closure" }))
                    .with_state(state)
            }
        "#;
        let routes = extract(code);

        assert_eq!(
            paths(&routes),
            vec![
                (HttpMethod::Get, "/a"),
                (HttpMethod::Delete, "/b/{id}"),
                (HttpMethod::All, "/c"),
                (HttpMethod::Put, "/d"),
                (HttpMethod::Get, "/e"),
            ]
        );
        assert_eq!(routes[4].handler, "");
        assert_eq!(routes[4].operation_id, "getE");
    }

    #[test]
    fn test_path_parameter_conventions() {
        let code = r#"
            use axum::{Router, routing::get};

            fn app() -> Router {
                Router::new()
                    .route("/posts/:post_id/comments/:comment_id", get(get_comment))
                    .route("/files/{*path}", get(get_file))
            }
        "#;
        let routes = extract(code);

        assert_eq!(routes[0].path, "/posts/{post_id}/comments/{comment_id}");
        let names: Vec<_> = routes[0].parameters.iter().map(|p| p.name.as_str()).collect();
        assert_eq!(names, vec!["post_id", "comment_id"]);
        assert_eq!(routes[1].path, "/files/{path}");
    }

    #[test]
    fn test_nested_function_router_is_prefixed() {
        let code = r#"
            use axum::{Router, routing::get};

            async fn list_users() {}
            async fn get_user() {}

            fn users_router() -> Router {
                Router::new()
                    .route("/", get(list_users))
                    .route("/:id", get(get_user))
            }

            fn app() -> Router {
                Router::new()
                    .route("/health", get(health))
                    .nest("/api/users", users_router())
            }
        "#;
        let routes = extract(code);

        assert_eq!(
            paths(&routes),
            vec![
                (HttpMethod::Get, "/health"),
                (HttpMethod::Get, "/api/users"),
                (HttpMethod::Get, "/api/users/{id}"),
            ]
        );
        assert_eq!(routes[1].tags, vec!["users".to_string()]);
    }

    #[test]
    fn test_nested_local_and_inline_routers() {
        let code = r#"
            use axum::{Router, routing::{get, post}};

            fn app() -> Router {
                let admin = Router::new().route("/stats", get(stats));
                Router::new()
                    .nest("/admin", admin.layer(auth))
                    .nest("/v1", Router::new().route("/items", post(create_item)))
            }
        "#;
        let routes = extract(code);

        assert_eq!(
            paths(&routes),
            vec![(HttpMethod::Get, "/admin/stats"), (HttpMethod::Post, "/v1/items")]
        );
    }

    #[test]
    fn test_merge_inside_nested_router() {
        let code = r#"
            use axum::{Router, routing::get};

            fn orders() -> Router { Router::new().route("/orders", get(list_orders)) }
            fn api() -> Router { Router::new().merge(orders()) }
            fn app() -> Router { Router::new().nest("/api", api()) }
        "#;
        let routes = extract(code);
        assert_eq!(paths(&routes), vec![(HttpMethod::Get, "/api/orders")]);
    }

    #[test]
    fn test_prefix_propagation_disabled() {
        let code = r#"
            use axum::{Router, routing::get};

            fn users_router() -> Router {
                Router::new().route("/:id", get(get_user))
            }

            fn app() -> Router {
                Router::new().nest("/api/users", users_router())
            }
        "#;
        let routes = extract_with(code, ExtractConfig::default().with_prefix_propagation(false));
        assert_eq!(paths(&routes), vec![(HttpMethod::Get, "/{id}")]);
    }

    #[test]
    fn test_recursive_router_functions_terminate() {
        let code = r#"
            use axum::{Router, routing::get};

            fn a() -> Router { Router::new().route("/a", get(h)).nest("/b", b()) }
            fn b() -> Router { Router::new().route("/b", get(h)).nest("/a", a()) }
            fn app() -> Router { Router::new().nest("/x", a()) }
        "#;
        let routes = extract(code);
        assert_eq!(
            paths(&routes),
            vec![(HttpMethod::Get, "/x/a"), (HttpMethod::Get, "/x/b/b")]
        );
    }

    #[test]
    fn test_extractor_recognition() {
        let code = r#"
            use axum::{Router, routing::post, Json, extract::Path};
            use serde::Deserialize;

            #[derive(Deserialize)]
            struct CreateUser {
                name: String,
            }

            async fn create_user(
                Path(id): Path<u32>,
                Json(payload): Json<CreateUser>,
            ) -> String {
                format!("Created user {} with id {}", payload.name, id)
            }

            fn app() -> Router {
                Router::new().route("/users/:id", post(create_user))
            }
        "#;
        let routes = extract(code);

        assert_eq!(routes.len(), 1);
        assert_eq!(routes[0].parameters.len(), 1);
        assert_eq!(routes[0].parameters[0].schema.schema_type, Some(SchemaType::Integer));
        assert!(routes[0].parameters[0].required);

        let body = routes[0].request_body.as_ref().unwrap();
        assert_eq!(body.content_type, "application/json");
        assert_eq!(body.schema.ref_name(), Some("CreateUser"));
    }

    #[test]
    fn test_query_parameters_from_struct() {
        let code = r#"
            use axum::{Router, routing::get, extract::Query};
            use serde::Deserialize;

            #[derive(Deserialize)]
            struct Pagination {
                page: u32,
                #[serde(rename = "pageSize")]
                limit: Option<u32>,
            }

            async fn list_users(Query(params): Query<Pagination>) -> String {
                String::new()
            }

            fn app() -> Router {
                Router::new().route("/users", get(list_users))
            }
        "#;
        let routes = extract(code);
        let query: Vec<_> = routes[0]
            .parameters
            .iter()
            .filter(|p| p.location == ParameterLocation::Query)
            .collect();

        assert_eq!(query.len(), 2);
        assert_eq!(query[0].name, "page");
        assert!(query[0].required);
        assert_eq!(query[1].name, "pageSize");
        assert!(!query[1].required);
    }

    #[test]
    fn test_json_response_types() {
        let code = r#"
            use axum::{Router, routing::{get, post}, Json, http::StatusCode};
            use serde::Serialize;

            #[derive(Serialize)]
            struct User {
                id: u32,
            }

            async fn get_user() -> Result<Json<User>, String> { todo!() }
            async fn list_users() -> Json<Vec<User>> { todo!() }
            async fn create_user() -> (StatusCode, Json<User>) { todo!() }
            async fn opaque() -> impl IntoResponse { todo!() }

            fn app() -> Router {
                Router::new()
                    .route("/user", get(get_user).post(create_user))
                    .route("/users", get(list_users))
                    .route("/opaque", get(opaque))
            }
        "#;
        let routes = extract(code);

        let get_user = routes[0].responses[0].schema.as_ref().unwrap();
        assert_eq!(get_user.ref_name(), Some("User"));
        let created = routes[1].responses[0].schema.as_ref().unwrap();
        assert_eq!(created.ref_name(), Some("User"));
        let list = routes[2].responses[0].schema.as_ref().unwrap();
        assert!(list.is_array());
        assert!(routes[3].responses.is_empty());
    }

    #[test]
    fn test_handlers_resolved_across_files() {
        let files = vec![
            rust_file(
                r#"
                use axum::{Router, routing::post};
                fn app() -> Router { Router::new().route("/orders", post(handlers::create_order)) }
            "#,
            ),
            SourceFile::new(
                "handlers.rs",
                Language::Rust,
                r#"
                #[derive(Deserialize)]
                pub struct NewOrder { items: Option<Vec<String>> }
                pub async fn create_order(Json(order): Json<NewOrder>) {}
            "#,
            ),
        ];
        let config = ExtractConfig::default().with_option_precedence(OptionPrecedence::Legacy);
        let extraction = AxumPlugin.extract_routes(&files, &config);

        assert_eq!(extraction.items.len(), 1);
        let body = extraction.items[0].request_body.as_ref().unwrap();
        assert_eq!(body.schema.ref_name(), Some("NewOrder"));
        assert_eq!(extraction.items[0].operation_id, "postCreate_order");
    }

    #[test]
    fn test_files_without_axum_yield_nothing() {
        let code = r#"
            use actix_web::{web, App};
            fn app() { App::new().route("/users", web::get().to(list)); }
        "#;
        assert!(extract(code).is_empty());
    }

    #[test]
    fn test_axum_mentioned_only_in_comments_and_strings() {
        let file = rust_file(
            r#"
            // Moved off axum last release
            const LEGACY: &str = "axum::Router";
            fn app() -> Router { Router::new().route("/users", get(list)) }
        "#,
        );
        assert!(AxumPlugin.detect_file(&file));

        let extraction = AxumPlugin.extract_routes(&[file], &ExtractConfig::default());
        assert!(extraction.items.is_empty());
        assert!(extraction.skipped.is_empty());
    }

    #[test]
    fn test_invalid_file_is_skipped() {
        let files = vec![rust_file("use axum::Router; fn broken( {")];
        let extraction = AxumPlugin.extract_routes(&files, &ExtractConfig::default());

        assert!(extraction.items.is_empty());
        assert_eq!(extraction.skipped.len(), 1);
        assert_eq!(extraction.skipped[0].framework, Framework::Axum);
    }
}
