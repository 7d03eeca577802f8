//! Route and schema extraction, one plugin per web framework.
//!
//! Every framework is handled by a type implementing [`FrameworkPlugin`]. A plugin
//! knows which languages it reads, how to tell from a manifest that its framework
//! is in use, how to tell from a single file that the file uses it, and how to turn
//! that file's route declarations and DTO types into [`Route`]s and [`Schema`]s.
//!
//! # Supported Frameworks
//!
//! - **Axum**: See [`axum::AxumPlugin`]
//! - **Rocket**: See [`rocket::RocketPlugin`]
//! - **Drogon**: See [`drogon::DrogonPlugin`]
//! - **Oat++**: See [`oatpp::OatppPlugin`]
//! - **FastEndpoints**: See [`fastendpoints::FastEndpointsPlugin`]
//! - **Micronaut**: See [`micronaut::MicronautPlugin`]
//! - **Phoenix**: See [`phoenix::PhoenixPlugin`]
//! - **Hono**: See [`hono::HonoPlugin`]
//! - **Express**: See [`express::ExpressPlugin`]
//! - **Django REST Framework**: See [`drf::DrfPlugin`]
//!
//! # Example
//!
//! ```
//! use polyglot_openapi::config::ExtractConfig;
//! use polyglot_openapi::extractor::{axum::AxumPlugin, FrameworkPlugin};
//! use polyglot_openapi::source::{Language, SourceFile};
//!
//! let file = SourceFile::new(
//!     "src/main.rs",
//!     Language::Rust,
//!     r#"use axum::{Router, routing::get};
//!        async fn health() {}
//!        fn app() -> Router { Router::new().route("/health", get(health)) }"#,
//! );
//! let extraction = AxumPlugin.extract_routes(&[file], &ExtractConfig::default());
//! assert_eq!(extraction.items.len(), 1);
//! ```

pub mod axum;
pub mod drf;
pub mod drogon;
pub mod express;
pub mod fastendpoints;
pub mod hono;
pub mod micronaut;
pub mod oatpp;
pub mod phoenix;
pub mod rocket;
pub mod serde_schema;

mod cpp;
mod js;
mod python;
mod rust_support;

use crate::config::ExtractConfig;
use crate::detector::ManifestMarker;
use crate::error::Result;
use crate::model::{Route, Schema};
use crate::source::{Language, SourceFile};
use crate::type_mapper::TypeContext;
use clap::ValueEnum;
use log::{debug, warn};
use std::fmt;
use std::path::PathBuf;

/// The web frameworks with a built-in plugin.
#[derive(Debug, Clone, Copy, ValueEnum, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Framework {
    /// Axum (Rust)
    Axum,
    /// Rocket (Rust)
    Rocket,
    /// Drogon (C++)
    Drogon,
    /// Oat++ (C++)
    Oatpp,
    /// FastEndpoints (C#)
    #[value(name = "fast-endpoints")]
    FastEndpoints,
    /// Micronaut (Java, Kotlin)
    Micronaut,
    /// Phoenix (Elixir)
    Phoenix,
    /// Hono (TypeScript, JavaScript)
    Hono,
    /// Express (TypeScript, JavaScript)
    Express,
    /// Django REST Framework (Python)
    Drf,
}

impl Framework {
    pub fn as_str(&self) -> &'static str {
        match self {
            Framework::Axum => "axum",
            Framework::Rocket => "rocket",
            Framework::Drogon => "drogon",
            Framework::Oatpp => "oatpp",
            Framework::FastEndpoints => "fast-endpoints",
            Framework::Micronaut => "micronaut",
            Framework::Phoenix => "phoenix",
            Framework::Hono => "hono",
            Framework::Express => "express",
            Framework::Drf => "drf",
        }
    }
}

impl fmt::Display for Framework {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A file a plugin could not process, and why.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SkippedFile {
    pub path: PathBuf,
    pub framework: Framework,
    pub reason: String,
}

/// Best-effort result of running one plugin over a file set.
#[derive(Debug, Clone, PartialEq)]
pub struct Extraction<T> {
    /// Everything extracted, in input file order
    pub items: Vec<T>,
    /// Files that failed to parse and contributed nothing
    pub skipped: Vec<SkippedFile>,
}

impl<T> Default for Extraction<T> {
    fn default() -> Self {
        Self {
            items: Vec::new(),
            skipped: Vec::new(),
        }
    }
}

impl<T> Extraction<T> {
    /// Record the outcome of one file: items on success, a skipped entry on failure
    pub fn absorb(&mut self, framework: Framework, file: &SourceFile, result: Result<Vec<T>>) {
        match result {
            Ok(items) => self.items.extend(items),
            Err(e) => {
                warn!("[{}] skipping {}: {}", framework, file.path.display(), e);
                self.skipped.push(SkippedFile {
                    path: file.path.clone(),
                    framework,
                    reason: e.to_string(),
                });
            }
        }
    }
}

/// What a plugin gets to see besides the file itself.
#[derive(Debug, Clone, Default)]
pub struct ExtractContext {
    pub config: ExtractConfig,
    /// Type names declared anywhere in the plugin's file set
    pub types: TypeContext,
}

impl ExtractContext {
    pub fn new(config: ExtractConfig, types: TypeContext) -> Self {
        Self { config, types }
    }
}

/// A framework plugin.
///
/// Implementors provide the per-file operations; the default `extract_*` drivers
/// filter the file set by language, build the shared [`TypeContext`], skip files
/// failing [`detect_file`](FrameworkPlugin::detect_file) for routes, and collect
/// parse failures into [`Extraction::skipped`] instead of failing the batch.
pub trait FrameworkPlugin: Send + Sync {
    fn framework(&self) -> Framework;

    /// Languages whose files this plugin reads
    fn languages(&self) -> &'static [Language];

    /// Dependency markers looked up by the manifest detector
    fn manifest_markers(&self) -> &'static [ManifestMarker];

    /// Cheap import/marker check. Files failing it yield no routes.
    fn detect_file(&self, file: &SourceFile) -> bool;

    /// Names of the DTO-like types this file declares
    fn declared_types(&self, _file: &SourceFile) -> Vec<String> {
        Vec::new()
    }

    /// Routes declared in one file
    fn file_routes(&self, file: &SourceFile, cx: &ExtractContext) -> Result<Vec<Route>>;

    /// Schemas declared in one file
    fn file_schemas(&self, file: &SourceFile, cx: &ExtractContext) -> Result<Vec<Schema>>;

    fn handles(&self, file: &SourceFile) -> bool {
        self.languages().contains(&file.language)
    }

    /// Build the context shared by every file of one extraction call
    fn context(&self, files: &[SourceFile], config: &ExtractConfig) -> ExtractContext {
        let types = TypeContext::from_names(
            files
                .iter()
                .filter(|f| self.handles(f))
                .flat_map(|f| self.declared_types(f)),
        );
        ExtractContext::new(*config, types)
    }

    fn extract_routes(&self, files: &[SourceFile], config: &ExtractConfig) -> Extraction<Route> {
        let cx = self.context(files, config);
        let mut extraction = Extraction::default();

        for file in files.iter().filter(|f| self.handles(f)) {
            if !self.detect_file(file) {
                continue;
            }
            debug!("[{}] extracting routes from {}", self.framework(), file.path.display());
            extraction.absorb(self.framework(), file, self.file_routes(file, &cx));
        }

        extraction
    }

    fn extract_schemas(&self, files: &[SourceFile], config: &ExtractConfig) -> Extraction<Schema> {
        let cx = self.context(files, config);
        let mut extraction = Extraction::default();

        for file in files.iter().filter(|f| self.handles(f)) {
            extraction.absorb(self.framework(), file, self.file_schemas(file, &cx));
        }

        extraction
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Error;
    use crate::model::HttpMethod;

    struct FakePlugin;

    impl FrameworkPlugin for FakePlugin {
        fn framework(&self) -> Framework {
            Framework::Hono
        }

        fn languages(&self) -> &'static [Language] {
            &[Language::TypeScript]
        }

        fn manifest_markers(&self) -> &'static [ManifestMarker] {
            &[]
        }

        fn detect_file(&self, file: &SourceFile) -> bool {
            file.content.contains("fake")
        }

        fn declared_types(&self, file: &SourceFile) -> Vec<String> {
            vec![file.stem().to_string()]
        }

        fn file_routes(&self, file: &SourceFile, cx: &ExtractContext) -> Result<Vec<Route>> {
            if file.content.contains("broken") {
                return Err(Error::parse(&file.path, "unbalanced"));
            }
            assert!(cx.types.is_known("a"));
            Ok(vec![Route::new(HttpMethod::Get, "/x", "", &file.path, 1)])
        }

        fn file_schemas(&self, _file: &SourceFile, _cx: &ExtractContext) -> Result<Vec<Schema>> {
            Ok(vec![Schema::object()])
        }
    }

    #[test]
    fn test_default_driver_filters_and_skips() {
        let files = vec![
            SourceFile::new("a.ts", Language::TypeScript, "fake"),
            SourceFile::new("b.ts", Language::TypeScript, "unrelated"),
            SourceFile::new("c.ts", Language::TypeScript, "fake broken"),
            SourceFile::new("d.py", Language::Python, "fake"),
        ];
        let extraction = FakePlugin.extract_routes(&files, &ExtractConfig::default());

        assert_eq!(extraction.items.len(), 1);
        assert_eq!(extraction.items[0].source_file, PathBuf::from("a.ts"));
        assert_eq!(extraction.skipped.len(), 1);
        assert_eq!(extraction.skipped[0].path, PathBuf::from("c.ts"));
        assert_eq!(extraction.skipped[0].framework, Framework::Hono);
    }

    #[test]
    fn test_schema_driver_ignores_detection() {
        let files = vec![
            SourceFile::new("a.ts", Language::TypeScript, "fake"),
            SourceFile::new("b.ts", Language::TypeScript, "unrelated"),
        ];
        let extraction = FakePlugin.extract_schemas(&files, &ExtractConfig::default());
        assert_eq!(extraction.items.len(), 2);
    }

    #[test]
    fn test_framework_names() {
        assert_eq!(Framework::FastEndpoints.to_string(), "fast-endpoints");
        assert_eq!(
            Framework::from_str("fast-endpoints", true),
            Ok(Framework::FastEndpoints)
        );
    }
}
