use crate::analyzer::Analyzer;
use crate::config::{ExtractConfig, OptionPrecedence};
use crate::detector::ManifestDetector;
use crate::extractor::Framework;
use crate::openapi_builder::{OpenApiBuilder, OpenApiDocument};
use crate::registry::Registry;
use crate::scanner::FileScanner;
use crate::serializer::{serialize, write_to_file};
use anyhow::Result;
use clap::Parser;
use log::{debug, info, warn};
use std::path::PathBuf;

pub use crate::serializer::OutputFormat;

/// Polyglot OpenAPI Generator - generate OpenAPI documentation from the source of
/// web services written with Axum, Rocket, Drogon, Oat++, FastEndpoints, Micronaut,
/// Phoenix, Hono, Express or Django REST Framework
#[derive(Parser, Debug)]
#[command(name = "polyglot-openapi")]
#[command(author, version, about, long_about = None)]
pub struct CliArgs {
    /// Path to the project directory
    #[arg(value_name = "PROJECT_PATH")]
    pub project_path: PathBuf,

    /// Output format (yaml or json)
    #[arg(short = 'f', long = "format", value_enum, default_value = "yaml")]
    pub output_format: OutputFormat,

    /// Output file path (if not specified, outputs to stdout)
    #[arg(short = 'o', long = "output", value_name = "FILE")]
    pub output_path: Option<PathBuf>,

    /// Web framework to extract (repeatable; if not specified, detect from manifests)
    #[arg(short = 'w', long = "framework", value_enum)]
    pub frameworks: Vec<Framework>,

    /// Enable verbose output
    #[arg(short = 'v', long = "verbose")]
    pub verbose: bool,

    /// API title for the info section
    #[arg(long = "title", default_value = "Generated API")]
    pub title: String,

    /// API version for the info section
    #[arg(long = "api-version", default_value = "1.0.0")]
    pub api_version: String,

    /// Type `Option<Vec<T>>` as a nullable `T` instead of a nullable array
    #[arg(long = "legacy-option-precedence")]
    pub legacy_option_precedence: bool,

    /// Do not apply router mount prefixes to the routes they mount
    #[arg(long = "no-prefix-propagation")]
    pub no_prefix_propagation: bool,
}

impl CliArgs {
    /// Extraction settings selected by the flags
    pub fn extract_config(&self) -> ExtractConfig {
        let precedence = if self.legacy_option_precedence {
            OptionPrecedence::Legacy
        } else {
            OptionPrecedence::Composed
        };
        ExtractConfig::default()
            .with_option_precedence(precedence)
            .with_prefix_propagation(!self.no_prefix_propagation)
    }
}

/// Parse command line arguments
pub fn parse_args() -> Result<CliArgs> {
    let args = CliArgs::parse();
    parse_args_from_parsed(args)
}

/// Validate and log already-parsed arguments
pub fn parse_args_from_parsed(args: CliArgs) -> Result<CliArgs> {
    debug!("Parsed arguments: {:?}", args);

    // Validate project path exists
    if !args.project_path.exists() {
        anyhow::bail!("Project path does not exist: {}", args.project_path.display());
    }

    // Validate project path is a directory
    if !args.project_path.is_dir() {
        anyhow::bail!("Project path is not a directory: {}", args.project_path.display());
    }

    info!("Project path: {}", args.project_path.display());
    info!("Output format: {:?}", args.output_format);
    if let Some(ref output) = args.output_path {
        info!("Output file: {}", output.display());
    } else {
        info!("Output: stdout");
    }
    if args.frameworks.is_empty() {
        info!("Framework: auto-detect");
    } else {
        info!("Frameworks: {:?}", args.frameworks);
    }

    Ok(args)
}

/// Counts reported once the document is written
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunSummary {
    pub files_scanned: usize,
    pub files_skipped: usize,
    pub routes: usize,
    pub schemas: usize,
    pub frameworks: Vec<Framework>,
}

/// Scan, detect, analyze and build the document for a project
pub fn generate(args: &CliArgs, registry: &Registry) -> Result<(OpenApiDocument, RunSummary)> {
    // Step 1: Scan directory for source files
    info!("Scanning project directory...");
    let scan_result = FileScanner::new(args.project_path.clone()).scan()?;
    info!("Found {} source files", scan_result.files.len());
    if scan_result.files.is_empty() {
        warn!("No source files found in the project directory");
    }

    // Step 2: Choose frameworks: user-specified, detected, or every plugin
    let frameworks = if !args.frameworks.is_empty() {
        info!("Using user-specified frameworks: {:?}", args.frameworks);
        args.frameworks.clone()
    } else {
        info!("Detecting web frameworks...");
        let detected = ManifestDetector::detect(&args.project_path, registry)?;
        if detected.is_empty() {
            warn!("No framework detected from manifests; trying every registered plugin");
            registry.frameworks()
        } else {
            info!("Detected frameworks: {:?}", detected);
            detected
        }
    };

    // Step 3: Extract routes and schemas
    info!("Extracting routes and schemas...");
    let analyzer = Analyzer::new(registry, args.extract_config());
    let report = analyzer.analyze(&scan_result.files, &frameworks);
    if report.routes.is_empty() {
        warn!("No routes found in the project");
    }

    // Step 4: Build OpenAPI document
    info!("Building OpenAPI document...");
    let mut builder = OpenApiBuilder::new().with_info(args.title.clone(), args.api_version.clone(), None);
    for route in &report.routes {
        builder.add_route(route);
    }
    for schema in &report.schemas {
        builder.add_schema(schema.clone());
    }

    let summary = RunSummary {
        files_scanned: scan_result.files.len(),
        files_skipped: report.skipped.len(),
        routes: report.routes.len(),
        schemas: report.schemas.len(),
        frameworks,
    };
    Ok((builder.build(), summary))
}

/// Run the main workflow
pub fn run(args: CliArgs) -> Result<()> {
    info!("Starting OpenAPI document generation...");

    let registry = Registry::with_builtin_plugins();
    let (document, summary) = generate(&args, &registry)?;
    info!("OpenAPI document built successfully");

    // Step 5: Serialize to requested format
    info!("Serializing to {:?} format...", args.output_format);
    let content = serialize(&document, args.output_format)?;

    // Step 6: Output to file or stdout
    if let Some(output_path) = &args.output_path {
        info!("Writing output to: {}", output_path.display());
        write_to_file(&content, output_path)?;
        info!("Successfully wrote OpenAPI document to {}", output_path.display());
    } else {
        println!("{}", content);
    }

    // Step 7: Display summary
    info!("Generation complete!");
    info!("Summary:");
    info!("  - Files scanned: {}", summary.files_scanned);
    info!("  - Files skipped: {}", summary.files_skipped);
    info!("  - Routes found: {}", summary.routes);
    info!("  - Schemas found: {}", summary.schemas);
    info!("  - Frameworks: {:?}", summary.frameworks);

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_repeated_frameworks() {
        let args = CliArgs::try_parse_from([
            "polyglot-openapi",
            "./svc",
            "-w",
            "hono",
            "--framework",
            "fast-endpoints",
            "-f",
            "json",
        ])
        .unwrap();
        assert_eq!(args.frameworks, vec![Framework::Hono, Framework::FastEndpoints]);
        assert_eq!(args.output_format, OutputFormat::Json);
        assert_eq!(args.title, "Generated API");
        assert_eq!(args.extract_config(), ExtractConfig::default());
    }

    #[test]
    fn test_config_flags() {
        let args = CliArgs::try_parse_from([
            "polyglot-openapi",
            "./svc",
            "--legacy-option-precedence",
            "--no-prefix-propagation",
            "--api-version",
            "2.1.0",
        ])
        .unwrap();
        let config = args.extract_config();
        assert_eq!(config.option_precedence, OptionPrecedence::Legacy);
        assert!(!config.propagate_prefixes);
        assert_eq!(args.api_version, "2.1.0");
    }

    #[test]
    fn test_unknown_framework_is_rejected() {
        assert!(CliArgs::try_parse_from(["polyglot-openapi", "./svc", "-w", "flask"]).is_err());
    }

    #[test]
    fn test_missing_project_path_fails_validation() {
        let args = CliArgs::try_parse_from(["polyglot-openapi", "/nonexistent/service"]).unwrap();
        assert!(parse_args_from_parsed(args).is_err());
    }
}
