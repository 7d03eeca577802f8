use crate::error::{Error, Result};
use crate::source::{Language, SourceFile};
use log::{debug, warn};
use std::path::PathBuf;

/// AST (Abstract Syntax Tree) parser for Rust source files.
///
/// The `AstParser` uses the `syn` crate to parse Rust source code into an abstract syntax tree,
/// which the Rust extractors then walk for route definitions and serde types. Other languages
/// are handled by the text-based extractors and never reach this parser.
///
/// # Example
///
/// ```
/// use polyglot_openapi::parser::AstParser;
/// use polyglot_openapi::source::{Language, SourceFile};
///
/// let file = SourceFile::new("src/main.rs", Language::Rust, "pub fn hello() {}");
/// let parsed = AstParser::parse_source(&file).unwrap();
/// assert_eq!(parsed.syntax_tree.items.len(), 1);
/// ```
pub struct AstParser;

/// A successfully parsed Rust file with its abstract syntax tree.
///
/// Contains both the original file path and the parsed syntax tree structure.
#[derive(Debug)]
pub struct ParsedFile {
    /// Path to the source file
    pub path: PathBuf,
    /// The parsed abstract syntax tree
    pub syntax_tree: syn::File,
}

impl AstParser {
    /// Parses one Rust source file into an AST.
    ///
    /// # Arguments
    ///
    /// * `file` - The source file; its content is parsed as-is
    ///
    /// # Returns
    ///
    /// Returns a `ParsedFile` containing the file path and syntax tree on success.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Parse`] if the file is not tagged as Rust or contains invalid
    /// Rust syntax.
    pub fn parse_source(file: &SourceFile) -> Result<ParsedFile> {
        debug!("Parsing file: {}", file.path.display());

        if file.language != Language::Rust {
            return Err(Error::parse(
                &file.path,
                format!("expected a Rust file, got {}", file.language),
            ));
        }

        let syntax_tree = syn::parse_file(&file.content).map_err(|e| {
            let start = e.span().start();
            Error::parse(
                &file.path,
                format!("line {}:{}: {}", start.line, start.column, e),
            )
        })?;

        Ok(ParsedFile {
            path: file.path.clone(),
            syntax_tree,
        })
    }

    /// Parses multiple Rust source files, continuing even if some fail.
    ///
    /// Files that fail to parse are logged as warnings, but parsing continues for the
    /// remaining files, so one broken file never hides the routes of the others.
    ///
    /// # Returns
    ///
    /// One `Result<ParsedFile>` per input file, in input order.
    pub fn parse_sources(files: &[SourceFile]) -> Vec<Result<ParsedFile>> {
        debug!("Parsing {} files", files.len());

        let results: Vec<Result<ParsedFile>> = files
            .iter()
            .map(|file| {
                Self::parse_source(file).map_err(|e| {
                    warn!("{}", e);
                    e
                })
            })
            .collect();

        let success_count = results.iter().filter(|r| r.is_ok()).count();
        debug!(
            "Parsing complete: {} succeeded, {} failed",
            success_count,
            results.len() - success_count
        );

        results
    }
}
