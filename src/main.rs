//! Polyglot OpenAPI Generator - Command-line tool for generating OpenAPI documentation.
//!
//! This binary analyzes the source of a web service, extracts its routes and DTO
//! types, and writes an OpenAPI 3.0 document.
//!
//! # Usage
//!
//! ```bash
//! polyglot-openapi [OPTIONS] <PROJECT_PATH>
//! ```
//!
//! # Examples
//!
//! Generate YAML documentation:
//! ```bash
//! polyglot-openapi ./my-api-project -o openapi.yaml
//! ```
//!
//! Generate JSON documentation for a chosen framework:
//! ```bash
//! polyglot-openapi ./my-api-project -w hono -f json -o openapi.json
//! ```
//!
//! Enable verbose logging:
//! ```bash
//! polyglot-openapi ./my-api-project -v
//! ```

use anyhow::Result;
use clap::Parser;
use log::info;
use polyglot_openapi::cli;

fn main() -> Result<()> {
    // Parse once for the verbose flag, then validate after the logger is up
    let args_for_verbose = cli::CliArgs::parse();

    let log_level = if args_for_verbose.verbose {
        log::LevelFilter::Debug
    } else {
        log::LevelFilter::Info
    };

    env_logger::Builder::from_default_env()
        .filter_level(log_level)
        .init();

    info!("Polyglot OpenAPI Generator starting...");

    let args = cli::parse_args_from_parsed(args_for_verbose)?;

    cli::run(args)?;

    info!("OpenAPI document generation completed successfully");

    Ok(())
}
