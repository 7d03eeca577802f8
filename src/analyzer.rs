//! Runs the selected plugins over a file list and aggregates their output.

use crate::config::ExtractConfig;
use crate::extractor::{Framework, SkippedFile};
use crate::model::{Route, Schema};
use crate::registry::Registry;
use crate::source::SourceFile;
use log::{debug, info, warn};
use std::collections::HashSet;

/// Everything the selected plugins found.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct AnalysisReport {
    /// Routes in plugin order, then input file order
    pub routes: Vec<Route>,
    pub schemas: Vec<Schema>,
    /// One entry per (plugin, file) that failed to parse
    pub skipped: Vec<SkippedFile>,
}

/// Drives extraction for a set of frameworks.
pub struct Analyzer<'r> {
    registry: &'r Registry,
    config: ExtractConfig,
}

impl<'r> Analyzer<'r> {
    pub fn new(registry: &'r Registry, config: ExtractConfig) -> Self {
        Self { registry, config }
    }

    /// Extract routes and schemas with every selected framework's plugin.
    ///
    /// Frameworks without a registered plugin are skipped with a warning.
    /// Selection order does not matter; plugins run in registry order.
    pub fn analyze(&self, files: &[SourceFile], frameworks: &[Framework]) -> AnalysisReport {
        let mut report = AnalysisReport::default();
        let mut seen_skips: HashSet<(Framework, std::path::PathBuf)> = HashSet::new();

        for framework in frameworks {
            if self.registry.get(*framework).is_none() {
                warn!("No plugin registered for {}", framework);
            }
        }

        for plugin in self.registry.plugins() {
            let framework = plugin.framework();
            if !frameworks.contains(&framework) {
                continue;
            }
            debug!("Running {} plugin", framework);

            let routes = plugin.extract_routes(files, &self.config);
            let schemas = plugin.extract_schemas(files, &self.config);
            info!(
                "{}: {} routes, {} schemas",
                framework,
                routes.items.len(),
                schemas.items.len()
            );

            report.routes.extend(routes.items);
            report.schemas.extend(schemas.items);
            for skipped in routes.skipped.into_iter().chain(schemas.skipped) {
                if seen_skips.insert((skipped.framework, skipped.path.clone())) {
                    report.skipped.push(skipped);
                }
            }
        }

        report
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::source::Language;

    fn files() -> Vec<SourceFile> {
        vec![
            SourceFile::new(
                "src/main.rs",
                Language::Rust,
                r#"use axum::{Router, routing::get};
async fn health() {}
fn app() -> Router { Router::new().route("/health", get(health)) }
"#,
            ),
            SourceFile::new("src/broken.rs", Language::Rust, "use axum::Router; fn app( {"),
            SourceFile::new(
                "web/index.ts",
                Language::TypeScript,
                "import { Hono } from 'hono'\nconst app = new Hono()\napp.get('/ping', (c) => c.text('pong'))\n",
            ),
        ]
    }

    #[test]
    fn test_analyze_in_registry_order() {
        let registry = Registry::with_builtin_plugins();
        let analyzer = Analyzer::new(&registry, ExtractConfig::default());
        let report = analyzer.analyze(&files(), &[Framework::Hono, Framework::Axum]);

        let paths: Vec<_> = report.routes.iter().map(|r| r.path.as_str()).collect();
        assert_eq!(paths, vec!["/health", "/ping"]);
    }

    #[test]
    fn test_skipped_files_reported_once() {
        let registry = Registry::with_builtin_plugins();
        let analyzer = Analyzer::new(&registry, ExtractConfig::default());
        let report = analyzer.analyze(&files(), &[Framework::Axum, Framework::Rocket]);

        let skipped: Vec<_> = report
            .skipped
            .iter()
            .map(|s| (s.framework, s.path.to_string_lossy().to_string()))
            .collect();
        assert_eq!(
            skipped,
            vec![
                (Framework::Axum, "src/broken.rs".to_string()),
                (Framework::Rocket, "src/broken.rs".to_string()),
            ]
        );
    }

    #[test]
    fn test_unselected_plugins_do_not_run() {
        let registry = Registry::with_builtin_plugins();
        let analyzer = Analyzer::new(&registry, ExtractConfig::default());
        let report = analyzer.analyze(&files(), &[Framework::Express]);
        assert!(report.routes.is_empty());
        assert!(report.skipped.is_empty());
    }
}
