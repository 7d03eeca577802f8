use crate::config::ExtractConfig;
use crate::detector::{ManifestKind, ManifestMarker};
use crate::error::Result;
use crate::extractor::rust_support::{self, json_payload, line_of, string_lit, type_name, unwrap_named};
use crate::extractor::serde_schema;
use crate::extractor::{ExtractContext, Extraction, Framework, FrameworkPlugin};
use crate::model::{HttpMethod, Parameter, ParameterLocation, RequestBody, Response, Route, Schema};
use crate::normalize::{convert, join, split_query};
use crate::parser::{AstParser, ParsedFile};
use crate::source::{Language, SourceFile};
use crate::type_mapper::TypeContext;
use log::debug;
use std::collections::{HashMap, HashSet};
use std::path::Path;
use syn::punctuated::Punctuated;
use syn::visit::{self, Visit};
use syn::{Attribute, Expr, ExprMethodCall, FnArg, ReturnType, Signature, Token, Type};

const MARKERS: &[ManifestMarker] = &[ManifestMarker::new(ManifestKind::Cargo, "rocket")];

/// Rocket route extractor
pub struct RocketPlugin;

impl FrameworkPlugin for RocketPlugin {
    fn framework(&self) -> Framework {
        Framework::Rocket
    }

    fn languages(&self) -> &'static [Language] {
        &[Language::Rust]
    }

    fn manifest_markers(&self) -> &'static [ManifestMarker] {
        MARKERS
    }

    fn detect_file(&self, file: &SourceFile) -> bool {
        rust_support::mentions_crate(&file.content, "rocket")
    }

    fn declared_types(&self, file: &SourceFile) -> Vec<String> {
        syn::parse_file(&file.content)
            .map(|tree| serde_schema::declared_names(&tree))
            .unwrap_or_default()
    }

    fn file_routes(&self, file: &SourceFile, cx: &ExtractContext) -> Result<Vec<Route>> {
        let parsed = AstParser::parse_source(file)?;
        let mounts = MountTable::build(std::slice::from_ref(&parsed));
        Ok(file_routes(&parsed, &mounts, cx))
    }

    fn file_schemas(&self, file: &SourceFile, cx: &ExtractContext) -> Result<Vec<Schema>> {
        let parsed = AstParser::parse_source(file)?;
        Ok(serde_schema::file_schemas(
            &parsed.syntax_tree,
            &cx.types,
            cx.config.option_precedence,
        ))
    }

    /// Routes from every Rocket file; `.mount` calls anywhere in the set apply
    fn extract_routes(&self, files: &[SourceFile], config: &ExtractConfig) -> Extraction<Route> {
        let (parsed, skipped) = rust_support::parse_all(files, Framework::Rocket);
        let mounts = MountTable::build(&parsed);
        let cx = ExtractContext::new(
            *config,
            TypeContext::from_names(
                parsed
                    .iter()
                    .flat_map(|p| serde_schema::declared_names(&p.syntax_tree)),
            ),
        );

        let detected: HashSet<&Path> = files
            .iter()
            .filter(|f| self.handles(f) && self.detect_file(f))
            .map(|f| f.path.as_path())
            .collect();

        let routes = parsed
            .iter()
            .filter(|p| detected.contains(p.path.as_path()))
            .flat_map(|p| file_routes(p, &mounts, &cx))
            .collect();

        Extraction { items: routes, skipped }
    }

    fn extract_schemas(&self, files: &[SourceFile], config: &ExtractConfig) -> Extraction<Schema> {
        serde_schema::extract(files, Framework::Rocket, config)
    }
}

/// One `routes![...]` entry of a `.mount("/p", ..)` call
#[derive(Debug)]
struct Mount {
    /// Path segments as written, without a leading `crate`, `self` or `super`
    handler: Vec<String>,
    prefix: String,
}

/// Prefixes each handler is mounted under, from `.mount("/p", routes![...])`
#[derive(Debug, Default)]
struct MountTable {
    mounts: Vec<Mount>,
}

impl MountTable {
    fn build(files: &[ParsedFile]) -> Self {
        let mut table = MountTable::default();
        for file in files {
            table.visit_file(&file.syntax_tree);
        }
        debug!("Mount table: {} entries", table.mounts.len());
        table
    }

    /// Prefixes in mount order for a handler at `qualified` (`users::list`).
    /// A qualified `routes![]` entry must match the tail of the handler's
    /// module path; an unqualified one matches by name alone.
    fn prefixes_of(&self, qualified: &[String]) -> Vec<&str> {
        let mut prefixes: Vec<&str> = Vec::new();
        for mount in &self.mounts {
            let matches = match mount.handler.as_slice() {
                [name] => qualified.last() == Some(name),
                segments => qualified.ends_with(segments),
            };
            if matches && !prefixes.contains(&mount.prefix.as_str()) {
                prefixes.push(&mount.prefix);
            }
        }
        prefixes
    }
}

impl<'ast> Visit<'ast> for MountTable {
    fn visit_expr_method_call(&mut self, node: &'ast ExprMethodCall) {
        // Receiver first so chained mounts land in source order
        visit::visit_expr_method_call(self, node);

        if node.method != "mount" || node.args.len() != 2 {
            return;
        }
        let (Some(prefix), Expr::Macro(mac)) = (string_lit(&node.args[0]), &node.args[1]) else {
            return;
        };
        if !mac.mac.path.segments.last().is_some_and(|s| s.ident == "routes") {
            return;
        }
        match mac
            .mac
            .parse_body_with(Punctuated::<syn::Path, Token![,]>::parse_terminated)
        {
            Ok(handlers) => {
                for handler in handlers {
                    let segments: Vec<String> = handler
                        .segments
                        .iter()
                        .map(|s| s.ident.to_string())
                        .skip_while(|s| s == "crate" || s == "self" || s == "super")
                        .collect();
                    if segments.is_empty() {
                        continue;
                    }
                    debug!("Handler {} mounted at {}", segments.join("::"), prefix);
                    self.mounts.push(Mount {
                        handler: segments,
                        prefix: prefix.clone(),
                    });
                }
            }
            Err(e) => debug!("Unreadable routes! list: {}", e),
        }
    }
}

/// Module path a source file contributes: directories below `src` plus the
/// file stem, where `main`, `lib` and `mod` add nothing.
fn file_module(path: &Path) -> Vec<String> {
    let mut dirs: Vec<String> = Vec::new();
    if let Some(parent) = path.parent() {
        for component in parent.components() {
            let name = component.as_os_str().to_string_lossy();
            if name == "src" {
                dirs.clear();
            } else if let std::path::Component::Normal(_) = component {
                dirs.push(name.into_owned());
            }
        }
    }
    if let Some(stem) = path.file_stem().map(|s| s.to_string_lossy()) {
        if !matches!(&*stem, "main" | "lib" | "mod") {
            dirs.push(stem.into_owned());
        }
    }
    dirs
}

/// What a route attribute declares
#[derive(Debug, Default)]
struct RouteAttribute {
    method: Option<HttpMethod>,
    uri: Option<String>,
    /// Argument bound by `data = "<name>"`
    data: Option<String>,
}

fn file_routes(file: &ParsedFile, mounts: &MountTable, cx: &ExtractContext) -> Vec<Route> {
    let mut routes = Vec::new();
    if !rust_support::uses_crate(&file.syntax_tree, "rocket") {
        debug!("{} does not use rocket", file.path.display());
        return routes;
    }
    let module = file_module(&file.path);

    for scoped in rust_support::collect_scoped_functions(&file.syntax_tree) {
        let sig = scoped.sig;
        let mut qualified = module.clone();
        qualified.extend(scoped.modules.iter().cloned());
        qualified.push(sig.ident.to_string());

        for attr in scoped.attrs {
            let Some(declared) = parse_route_attribute(attr) else {
                continue;
            };
            let (Some(method), Some(uri)) = (declared.method, declared.uri.as_deref()) else {
                debug!("Incomplete route attribute on {}", sig.ident);
                continue;
            };

            let handler = sig.ident.to_string();
            let (path, query) = split_query(uri);
            let line = line_of(attr);

            let prefixes = if cx.config.propagate_prefixes {
                mounts.prefixes_of(&qualified)
            } else {
                Vec::new()
            };
            let mounted: Vec<String> = if prefixes.is_empty() {
                vec![path.to_string()]
            } else {
                prefixes.iter().map(|prefix| join(prefix, path)).collect()
            };

            for full_path in mounted {
                let mut route = Route::new(method, convert(&full_path), handler.clone(), &file.path, line);
                apply_signature(&mut route, sig, query, declared.data.as_deref(), cx);
                debug!("Found route: {} {} -> {}", route.method, route.path, handler);
                routes.push(route);
            }
        }
    }

    routes
}

/// Read `#[get("/p", ..)]`, `#[rocket::post(..)]` or `#[route(GET, uri = "/p")]`
fn parse_route_attribute(attr: &Attribute) -> Option<RouteAttribute> {
    let name = rust_support::last_ident(attr.path())?;
    let method = match name.as_str() {
        "route" => None,
        "get" | "post" | "put" | "delete" | "patch" | "head" | "options" => HttpMethod::from_name(&name),
        _ => return None,
    };

    let args = attr
        .parse_args_with(Punctuated::<Expr, Token![,]>::parse_terminated)
        .ok()?;

    let mut declared = RouteAttribute {
        method,
        ..RouteAttribute::default()
    };
    for arg in args {
        match &arg {
            Expr::Assign(assign) => {
                let key = match &*assign.left {
                    Expr::Path(p) => rust_support::last_ident(&p.path),
                    _ => None,
                };
                match key.as_deref() {
                    Some("uri") => declared.uri = string_lit(&assign.right),
                    Some("data") => {
                        declared.data = string_lit(&assign.right)
                            .map(|d| d.trim_matches(|c| c == '<' || c == '>').to_string());
                    }
                    _ => {}
                }
            }
            Expr::Path(p) if declared.method.is_none() => {
                declared.method = rust_support::last_ident(&p.path).and_then(|m| HttpMethod::from_name(&m));
            }
            _ => {
                if declared.uri.is_none() {
                    declared.uri = string_lit(&arg);
                }
            }
        }
    }

    Some(declared)
}

/// Query parameter names of a Rocket query template (`<a>&<b..>&static=1`)
fn query_names(query: &str) -> Vec<String> {
    query
        .split('&')
        .filter_map(|segment| {
            let name = segment.trim().strip_prefix('<')?.strip_suffix('>')?;
            if name.ends_with("..") {
                // catch-all guard
                return None;
            }
            Some(name.to_string())
        })
        .collect()
}

fn apply_signature(
    route: &mut Route,
    sig: &Signature,
    query: Option<&str>,
    data: Option<&str>,
    cx: &ExtractContext,
) {
    let precedence = cx.config.option_precedence;
    let args: HashMap<String, &Type> = sig
        .inputs
        .iter()
        .filter_map(|input| match input {
            FnArg::Typed(pat_type) => {
                rust_support::pattern_ident(&pat_type.pat).map(|name| (name, &*pat_type.ty))
            }
            FnArg::Receiver(_) => None,
        })
        .collect();

    let path_names: Vec<String> = route
        .parameters
        .iter()
        .filter(|p| p.location == ParameterLocation::Path)
        .map(|p| p.name.clone())
        .collect();
    for name in path_names {
        if let Some(ty) = args.get(&name) {
            route.push_parameter(Parameter {
                name,
                location: ParameterLocation::Path,
                required: true,
                schema: serde_schema::map_type(ty, &cx.types, precedence),
            });
        }
    }

    for name in query.map(query_names).unwrap_or_default() {
        let (schema, required) = match args.get(&name) {
            Some(ty) => (
                serde_schema::map_type(ty, &cx.types, precedence),
                unwrap_named(ty, "Option").is_none(),
            ),
            None => (Schema::string(), false),
        };
        route.push_parameter(Parameter::query(name, schema).required(required));
    }

    if let Some(ty) = data.and_then(|name| args.get(name)) {
        let body = match type_name(ty).as_deref() {
            Some("Json") => RequestBody::json(inner_schema(ty, "Json", cx)),
            Some("Form") => RequestBody::form(inner_schema(ty, "Form", cx)),
            _ => RequestBody::json(Schema::object()),
        };
        route.request_body = Some(body);
    }

    if let ReturnType::Type(_, ty) = &sig.output {
        let schema = match json_payload(ty) {
            Some(payload) => Some(serde_schema::map_type(payload, &cx.types, precedence)),
            None => match type_name(ty).as_deref() {
                Some("str") | Some("String") | Some("RawHtml") => Some(Schema::string()),
                _ => None,
            },
        };
        if let Some(schema) = schema {
            route.responses.push(Response::ok(schema));
        }
    }
}

fn inner_schema(ty: &Type, wrapper: &str, cx: &ExtractContext) -> Schema {
    unwrap_named(ty, wrapper)
        .map(|inner| serde_schema::map_type(inner, &cx.types, cx.config.option_precedence))
        .unwrap_or_else(Schema::object)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::SchemaType;

    fn extract(code: &str) -> Vec<Route> {
        let file = SourceFile::new("main.rs", Language::Rust, code);
        RocketPlugin
            .extract_routes(&[file], &ExtractConfig::default())
            .items
    }

    #[test]
    fn test_method_attributes() {
        let code = r#"#[macro_use] extern crate rocket;

#[get("/")]
fn index() -> &'static str { "Hello" }

#[post("/users", format = "json", data = "<user>")]
fn create_user(user: Json<NewUser>) -> Json<User> { todo!() }

#[rocket::delete("/users/<id>")]
fn delete_user(id: u64) {}
"#;
        let routes = extract(code);

        assert_eq!(routes.len(), 3);
        assert_eq!(routes[0].path, "/");
        assert_eq!(routes[0].source_line, 3);
        assert_eq!(routes[0].operation_id, "getIndex");

        assert_eq!(routes[1].method, HttpMethod::Post);
        assert_eq!(routes[1].source_line, 6);
        let body = routes[1].request_body.as_ref().unwrap();
        assert_eq!(body.content_type, "application/json");

        assert_eq!(routes[2].method, HttpMethod::Delete);
        assert_eq!(routes[2].path, "/users/{id}");
        assert_eq!(
            routes[2].parameters[0].schema.format.as_deref(),
            Some("int64")
        );
    }

    #[test]
    fn test_route_attribute_with_method() {
        let code = r#"
            use rocket::http::Method;

            #[route(PATCH, uri = "/items/<id>")]
            fn patch_item(id: &str) {}
        "#;
        let routes = extract(code);

        assert_eq!(routes.len(), 1);
        assert_eq!(routes[0].method, HttpMethod::Patch);
        assert_eq!(routes[0].path, "/items/{id}");
    }

    #[test]
    fn test_query_segments() {
        let code = r#"
            use rocket::get;

            #[get("/search?<q>&<page>&<filters..>&lang=en")]
            fn search(q: String, page: Option<u32>, filters: Filters) {}
        "#;
        let routes = extract(code);
        let query: Vec<_> = routes[0]
            .parameters
            .iter()
            .filter(|p| p.location == ParameterLocation::Query)
            .collect();

        assert_eq!(routes[0].path, "/search");
        assert_eq!(query.len(), 2);
        assert_eq!(query[0].name, "q");
        assert!(query[0].required);
        assert_eq!(query[1].name, "page");
        assert!(!query[1].required);
        assert_eq!(query[1].schema.schema_type, Some(SchemaType::Integer));
    }

    #[test]
    fn test_form_body_and_responses() {
        let code = r#"
            use rocket::form::Form;

            #[derive(Deserialize)]
            struct Login { user: String }

            #[derive(Serialize)]
            struct Token { value: String }

            #[post("/login", data = "<login>")]
            fn login(login: Form<Login>) -> Result<Json<Token>, Status> { todo!() }

            #[get("/me")]
            fn me() -> Option<Json<Token>> { None }
        "#;
        let routes = extract(code);

        let body = routes[0].request_body.as_ref().unwrap();
        assert_eq!(body.content_type, "application/x-www-form-urlencoded");
        assert_eq!(body.schema.ref_name(), Some("Login"));
        assert_eq!(
            routes[0].responses[0].schema.as_ref().and_then(|s| s.ref_name()),
            Some("Token")
        );
        assert_eq!(
            routes[1].responses[0].schema.as_ref().and_then(|s| s.ref_name()),
            Some("Token")
        );
    }

    #[test]
    fn test_mount_prefixes_across_files() {
        let files = vec![
            SourceFile::new(
                "main.rs",
                Language::Rust,
                r#"
                #[launch]
                fn rocket() -> _ {
                    rocket::build()
                        .mount("/api", routes![users::list, users::show])
                        .mount("/v2", routes![users::list])
                }
            "#,
            ),
            SourceFile::new(
                "users.rs",
                Language::Rust,
                r#"
                use rocket::get;

                #[get("/users")]
                pub fn list() {}

                #[get("/users/<id>")]
                pub fn show(id: i32) {}

                #[get("/health")]
                pub fn health() {}
            "#,
            ),
        ];
        let routes = RocketPlugin
            .extract_routes(&files, &ExtractConfig::default())
            .items;
        let paths: Vec<_> = routes.iter().map(|r| r.path.as_str()).collect();

        assert_eq!(paths, vec!["/api/users", "/v2/users", "/api/users/{id}", "/health"]);
    }

    #[test]
    fn test_same_handler_name_in_two_modules() {
        let files = vec![
            SourceFile::new(
                "src/main.rs",
                Language::Rust,
                r#"
                #[launch]
                fn rocket() -> _ {
                    rocket::build()
                        .mount("/api", routes![users::list])
                        .mount("/admin", routes![crate::admin::list])
                }
            "#,
            ),
            SourceFile::new(
                "src/users.rs",
                Language::Rust,
                "use rocket::get;\n#[get(\"/users\")]\npub fn list() {}\n",
            ),
            SourceFile::new(
                "src/admin.rs",
                Language::Rust,
                "use rocket::get;\n#[get(\"/stats\")]\npub fn list() {}\n",
            ),
        ];
        let routes = RocketPlugin
            .extract_routes(&files, &ExtractConfig::default())
            .items;
        let paths: Vec<_> = routes.iter().map(|r| r.path.as_str()).collect();

        assert_eq!(paths, vec!["/api/users", "/admin/stats"]);
    }

    #[test]
    fn test_inline_module_handlers() {
        let code = r#"
            use rocket::get;

            mod users {
                #[get("/users")]
                pub fn list() {}
            }

            mod admin {
                #[get("/audit")]
                pub fn list() {}
            }

            fn build() { rocket::build().mount("/v1", routes![users::list]); }
        "#;
        let routes = extract(code);
        let paths: Vec<_> = routes.iter().map(|r| r.path.as_str()).collect();

        assert_eq!(paths, vec!["/v1/users", "/audit"]);
    }

    #[test]
    fn test_file_module() {
        assert_eq!(file_module(Path::new("src/main.rs")), Vec::<String>::new());
        assert_eq!(file_module(Path::new("app/src/api/users.rs")), vec!["api", "users"]);
        assert_eq!(file_module(Path::new("src/api/mod.rs")), vec!["api"]);
    }

    #[test]
    fn test_mount_ignored_without_propagation() {
        let code = r#"
            use rocket::get;

            #[get("/users")]
            fn list() {}

            fn build() { rocket::build().mount("/api", routes![list]); }
        "#;
        let file = SourceFile::new("main.rs", Language::Rust, code);
        let config = ExtractConfig::default().with_prefix_propagation(false);
        let routes = RocketPlugin.extract_routes(&[file], &config).items;

        assert_eq!(routes.len(), 1);
        assert_eq!(routes[0].path, "/users");
    }

    #[test]
    fn test_non_rocket_file_yields_nothing() {
        let code = r#"
            use axum::routing::get;
            #[get("/users")]
            fn list() {}
        "#;
        assert!(extract(code).is_empty());
    }

    #[test]
    fn test_rocket_mentioned_only_in_a_comment() {
        let code = r#"
            // Same handlers as the rocket service
            #[get("/users")]
            fn list() {}
        "#;
        assert!(extract(code).is_empty());
    }

    #[test]
    fn test_query_names() {
        assert_eq!(query_names("<a>&<b..>&c=1&<d>"), vec!["a", "d"]);
        assert!(query_names("").is_empty());
    }
}
