//! Polyglot OpenAPI Generator - OpenAPI documentation from web service source code.
//!
//! This library generates OpenAPI 3.0 documents by statically analyzing the source of
//! web services. Rust code is parsed with `syn`; every other language is read with
//! comment-aware text scanning. Each supported framework is a plugin that turns route
//! declarations and DTO types into a shared, normalized model.
//!
//! # Supported Frameworks
//!
//! - **Axum** and **Rocket** (Rust)
//! - **Drogon** and **Oat++** (C++)
//! - **FastEndpoints** (C#)
//! - **Micronaut** (Java, Kotlin)
//! - **Phoenix** (Elixir)
//! - **Hono** and **Express** (TypeScript, JavaScript)
//! - **Django REST Framework** (Python)
//!
//! # Architecture
//!
//! 1. [`scanner`] - Walks a project directory and loads source files
//! 2. [`detector`] - Detects frameworks from manifest files
//! 3. [`registry`] - Holds the framework plugins the host chose to enable
//! 4. [`extractor`] - Per-framework route and schema extraction
//! 5. [`analyzer`] - Runs the selected plugins and aggregates their output
//! 6. [`openapi_builder`] - Constructs the complete OpenAPI document
//! 7. [`serializer`] - Serializes the document to YAML or JSON
//!
//! # Example Usage
//!
//! ```no_run
//! use polyglot_openapi::{
//!     analyzer::Analyzer,
//!     config::ExtractConfig,
//!     detector::ManifestDetector,
//!     openapi_builder::OpenApiBuilder,
//!     registry::Registry,
//!     scanner::FileScanner,
//!     serializer::serialize_yaml,
//! };
//! use std::path::{Path, PathBuf};
//!
//! let registry = Registry::with_builtin_plugins();
//! let scan_result = FileScanner::new(PathBuf::from("./my-project")).scan().unwrap();
//! let frameworks = ManifestDetector::detect(Path::new("./my-project"), &registry).unwrap();
//!
//! let report = Analyzer::new(&registry, ExtractConfig::default())
//!     .analyze(&scan_result.files, &frameworks);
//!
//! let mut builder = OpenApiBuilder::new();
//! for route in &report.routes {
//!     builder.add_route(route);
//! }
//! for schema in report.schemas {
//!     builder.add_schema(schema);
//! }
//! let yaml = serialize_yaml(&builder.build()).unwrap();
//! println!("{}", yaml);
//! ```
//!
//! # Command-Line Interface
//!
//! For command-line usage, see the [`cli`] module which provides a complete CLI application.

pub mod analyzer;
pub mod cli;
pub mod config;
pub mod detector;
pub mod error;
pub mod extractor;
pub mod model;
pub mod normalize;
pub mod openapi_builder;
pub mod parser;
pub mod registry;
pub mod scanner;
pub mod serializer;
pub mod source;
pub mod text;
pub mod type_mapper;
