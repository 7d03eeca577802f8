// End-to-end tests: scan a project on disk, detect, extract, build, serialize
use clap::Parser;
use polyglot_openapi::{
    analyzer::Analyzer,
    cli::{generate, run, CliArgs},
    config::ExtractConfig,
    detector::ManifestDetector,
    extractor::Framework,
    openapi_builder::{OpenApiBuilder, OpenApiDocument},
    registry::Registry,
    scanner::FileScanner,
    serializer::{serialize_json, serialize_yaml},
};
use pretty_assertions::assert_eq;
use serde_json::Value;
use std::collections::HashSet;
use std::fs;
use std::path::Path;
use tempfile::TempDir;

const AXUM_CARGO: &str = r#"[package]
name = "users-service"
version = "0.1.0"

[dependencies]
axum = "0.7"
serde = { version = "1", features = ["derive"] }
"#;

const HONO_PACKAGE: &str = r#"{
  "name": "books",
  "dependencies": {
    "@hono/zod-validator": "^0.2.0",
    "hono": "^4.0.0",
    "zod": "^3.22.0"
  }
}
"#;

const DRF_VIEWS: &str = r#"from rest_framework import viewsets
from rest_framework.routers import DefaultRouter

class WidgetViewSet(viewsets.ModelViewSet):
    serializer_class = WidgetSerializer

router = DefaultRouter()
router.register(r'widgets', WidgetViewSet)
"#;

/// Helper to create a temporary project with the given files
fn create_test_project(files: Vec<(&str, &str)>) -> TempDir {
    let temp_dir = TempDir::new().expect("Failed to create temp directory");

    for (path, content) in files {
        let file_path = temp_dir.path().join(path);
        if let Some(parent) = file_path.parent() {
            fs::create_dir_all(parent).expect("Failed to create parent directories");
        }
        fs::write(&file_path, content).expect("Failed to write file");
    }

    temp_dir
}

fn args(project: &Path, extra: &[&str]) -> CliArgs {
    let mut argv = vec!["polyglot-openapi".to_string(), project.display().to_string()];
    argv.extend(extra.iter().map(|s| s.to_string()));
    CliArgs::try_parse_from(argv).expect("valid arguments")
}

fn as_json(doc: &OpenApiDocument) -> Value {
    serde_json::from_str(&serialize_json(doc).expect("JSON serialization")).expect("valid JSON")
}

fn path_keys(doc: &OpenApiDocument) -> Vec<&str> {
    doc.paths.keys().map(String::as_str).collect()
}

#[test]
fn test_axum_end_to_end_generation() {
    let project = create_test_project(vec![
        ("Cargo.toml", AXUM_CARGO),
        ("src/main.rs", include_str!("fixtures/axum_project.rs")),
    ]);

    let registry = Registry::with_builtin_plugins();
    let scan_result = FileScanner::new(project.path().to_path_buf()).scan().unwrap();
    assert_eq!(scan_result.files.len(), 1);

    let frameworks = ManifestDetector::detect(project.path(), &registry).unwrap();
    assert_eq!(frameworks, vec![Framework::Axum]);

    let report = Analyzer::new(&registry, ExtractConfig::default()).analyze(&scan_result.files, &frameworks);
    assert_eq!(report.routes.len(), 6);
    assert!(report.skipped.is_empty());

    let mut builder = OpenApiBuilder::new();
    for route in &report.routes {
        builder.add_route(route);
    }
    for schema in report.schemas {
        builder.add_schema(schema);
    }
    let doc = builder.build();

    assert_eq!(path_keys(&doc), vec!["/api/v1/users", "/api/v1/users/{id}", "/health"]);
    assert_eq!(doc.operation_count(), 6);

    let item = &doc.paths["/api/v1/users/{id}"];
    assert!(item.get.is_some() && item.put.is_some() && item.delete.is_some());
    assert!(item.post.is_none());

    let schemas = &doc.components.as_ref().expect("components").schemas;
    let names: Vec<_> = schemas.keys().map(String::as_str).collect();
    assert_eq!(names, vec!["CreateUserRequest", "ListQuery", "UpdateUserRequest", "User"]);
    assert_eq!(schemas["User"].required, vec!["id", "name"]);
    assert!(schemas["UpdateUserRequest"].required.is_empty());
}

#[test]
fn test_axum_document_contents() {
    let project = create_test_project(vec![
        ("Cargo.toml", AXUM_CARGO),
        ("src/main.rs", include_str!("fixtures/axum_project.rs")),
    ]);
    let (doc, _) = generate(&args(project.path(), &[]), &Registry::with_builtin_plugins()).unwrap();
    let value = as_json(&doc);

    assert_eq!(value["openapi"], "3.0.3");
    assert_eq!(value["info"]["title"], "Generated API");

    let list = &value["paths"]["/api/v1/users"]["get"];
    let query: Vec<_> = list["parameters"]
        .as_array()
        .unwrap()
        .iter()
        .map(|p| (p["name"].as_str().unwrap(), p["in"].as_str().unwrap()))
        .collect();
    assert_eq!(query, vec![("page", "query"), ("limit", "query")]);
    let list_schema = &list["responses"]["200"]["content"]["application/json"]["schema"];
    assert_eq!(list_schema["type"], "array");
    assert_eq!(list_schema["items"]["$ref"], "#/components/schemas/User");

    let create = &value["paths"]["/api/v1/users"]["post"];
    assert_eq!(
        create["requestBody"]["content"]["application/json"]["schema"]["$ref"],
        "#/components/schemas/CreateUserRequest"
    );

    let get = &value["paths"]["/api/v1/users/{id}"]["get"];
    assert_eq!(get["parameters"][0]["name"], "id");
    assert_eq!(get["parameters"][0]["in"], "path");
    assert_eq!(get["parameters"][0]["required"], true);
    assert_eq!(get["parameters"][0]["schema"]["type"], "integer");
    assert!(get["x-source"].as_str().unwrap().contains("main.rs:"));
}

#[test]
fn test_operation_ids_are_unique() {
    let project = create_test_project(vec![
        ("Cargo.toml", AXUM_CARGO),
        (
            "src/main.rs",
            r#"use axum::{Router, routing::get};
async fn list() {}
fn app() -> Router {
    Router::new()
        .route("/users", get(list))
        .route("/orders", get(list))
        .route("/items", get(list))
}
"#,
        ),
    ]);
    let (doc, summary) = generate(&args(project.path(), &[]), &Registry::with_builtin_plugins()).unwrap();
    assert_eq!(summary.routes, 3);

    let value = as_json(&doc);
    let ids: Vec<_> = ["/items", "/orders", "/users"]
        .iter()
        .map(|p| value["paths"][*p]["get"]["operationId"].as_str().unwrap().to_string())
        .collect();
    assert_eq!(ids, vec!["getList", "getList_2", "getList_3"]);
}

#[test]
fn test_hono_project_from_manifest() {
    let project = create_test_project(vec![
        ("package.json", HONO_PACKAGE),
        ("src/index.ts", include_str!("fixtures/hono_app.ts")),
        ("node_modules/hono/dist/index.js", "export class Hono {}"),
    ]);
    let (doc, summary) = generate(&args(project.path(), &[]), &Registry::with_builtin_plugins()).unwrap();

    assert_eq!(summary.frameworks, vec![Framework::Hono]);
    assert_eq!(summary.files_scanned, 1);
    assert_eq!(path_keys(&doc), vec!["/api/books", "/api/books/{id}", "/api/health"]);

    let value = as_json(&doc);
    let create = &value["paths"]["/api/books"]["post"];
    assert_eq!(create["operationId"], "postCreateBook");
    assert_eq!(
        create["requestBody"]["content"]["application/json"]["schema"]["$ref"],
        "#/components/schemas/CreateBook"
    );
    let book = &value["components"]["schemas"]["CreateBook"];
    assert_eq!(book["required"], serde_json::json!(["title", "pages"]));
    assert_eq!(book["properties"]["pages"]["type"], "integer");
}

#[test]
fn test_polyglot_project() {
    let project = create_test_project(vec![
        ("users/Cargo.toml", AXUM_CARGO),
        ("users/src/main.rs", include_str!("fixtures/axum_project.rs")),
        ("books/package.json", HONO_PACKAGE),
        ("books/src/index.ts", include_str!("fixtures/hono_app.ts")),
        ("shop/requirements.txt", "Django==5.0\ndjangorestframework==3.15.1\n"),
        ("shop/widgets/views.py", DRF_VIEWS),
    ]);
    let (doc, summary) = generate(&args(project.path(), &[]), &Registry::with_builtin_plugins()).unwrap();

    assert_eq!(summary.frameworks, vec![Framework::Axum, Framework::Hono, Framework::Drf]);
    assert_eq!(summary.files_scanned, 3);
    assert_eq!(summary.routes, 6 + 4 + 6);

    let keys: HashSet<_> = doc.paths.keys().map(String::as_str).collect();
    for path in ["/api/v1/users/{id}", "/api/books/{id}", "/widgets", "/widgets/{id}"] {
        assert!(keys.contains(path), "missing {path}");
    }

    let widget = &doc.paths["/widgets/{id}"];
    assert!(widget.patch.is_some());
    assert!(widget.delete.as_ref().unwrap().responses.contains_key("204"));
}

#[test]
fn test_framework_flag_overrides_detection() {
    let project = create_test_project(vec![
        ("Cargo.toml", AXUM_CARGO),
        ("src/main.rs", include_str!("fixtures/axum_project.rs")),
        ("web/index.ts", include_str!("fixtures/hono_app.ts")),
    ]);
    let (doc, summary) =
        generate(&args(project.path(), &["-w", "hono"]), &Registry::with_builtin_plugins()).unwrap();

    assert_eq!(summary.frameworks, vec![Framework::Hono]);
    assert_eq!(summary.files_scanned, 2);
    assert!(doc.paths.keys().all(|p| p.starts_with("/api/")));
    assert!(!doc.paths.contains_key("/api/v1/users"));
}

#[test]
fn test_prefix_propagation_can_be_disabled() {
    let project = create_test_project(vec![
        ("Cargo.toml", AXUM_CARGO),
        ("src/main.rs", include_str!("fixtures/axum_project.rs")),
    ]);
    let (doc, _) = generate(
        &args(project.path(), &["--no-prefix-propagation"]),
        &Registry::with_builtin_plugins(),
    )
    .unwrap();
    assert_eq!(path_keys(&doc), vec!["/", "/health", "/{id}"]);
}

#[test]
fn test_unparsable_files_are_skipped() {
    let project = create_test_project(vec![
        ("Cargo.toml", AXUM_CARGO),
        ("src/main.rs", include_str!("fixtures/axum_project.rs")),
        ("src/broken.rs", "use axum::Router;\nfn broken( {\n"),
    ]);
    let (doc, summary) = generate(&args(project.path(), &[]), &Registry::with_builtin_plugins()).unwrap();

    assert_eq!(summary.files_scanned, 2);
    assert_eq!(summary.files_skipped, 1);
    assert_eq!(doc.operation_count(), 6);
}

#[test]
fn test_empty_project_handling() {
    let project = create_test_project(vec![("README.md", "# nothing here")]);
    let registry = Registry::with_builtin_plugins();
    let (doc, summary) = generate(&args(project.path(), &[]), &registry).unwrap();

    assert_eq!(summary.files_scanned, 0);
    assert_eq!(summary.frameworks, registry.frameworks());
    assert!(doc.paths.is_empty());
    assert!(doc.components.is_none());

    let yaml = serialize_yaml(&doc).unwrap();
    assert!(yaml.contains("3.0.3"));
}

#[test]
fn test_run_writes_output_file() {
    let project = create_test_project(vec![
        ("Cargo.toml", AXUM_CARGO),
        ("src/main.rs", include_str!("fixtures/axum_project.rs")),
    ]);
    let output = project.path().join("out/openapi.json");
    let output_arg = output.display().to_string();
    run(args(
        project.path(),
        &["-f", "json", "-o", &output_arg, "--title", "Users", "--api-version", "2.0.0"],
    ))
    .unwrap();

    let value: Value = serde_json::from_str(&fs::read_to_string(&output).unwrap()).unwrap();
    assert_eq!(value["info"]["title"], "Users");
    assert_eq!(value["info"]["version"], "2.0.0");
    assert!(value["paths"]["/health"]["get"].is_object());
}

#[test]
fn test_yaml_output_is_readable() {
    let project = create_test_project(vec![
        ("Cargo.toml", AXUM_CARGO),
        ("src/main.rs", include_str!("fixtures/axum_project.rs")),
    ]);
    let output = project.path().join("openapi.yaml");
    let output_arg = output.display().to_string();
    run(args(project.path(), &["-o", &output_arg])).unwrap();

    let value: serde_yaml::Value = serde_yaml::from_str(&fs::read_to_string(&output).unwrap()).unwrap();
    assert_eq!(value["openapi"].as_str(), Some("3.0.3"));
    assert!(value["components"]["schemas"]["User"].is_mapping());
}
