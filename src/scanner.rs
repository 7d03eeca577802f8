use crate::source::{Language, SourceFile};
use anyhow::{Context, Result};
use log::{debug, warn};
use std::fs;
use std::path::PathBuf;
use walkdir::WalkDir;

/// Directories holding dependencies, build output or tool state
const SKIPPED_DIRS: [&str; 12] = [
    "target",
    "node_modules",
    "vendor",
    "build",
    "dist",
    "_build",
    "deps",
    "bin",
    "obj",
    "__pycache__",
    "venv",
    "cmake-build-debug",
];

/// File scanner for traversing project directories.
///
/// The `FileScanner` recursively walks through a project directory to find every
/// source file in a supported language. It skips hidden directories and the usual
/// dependency and build-output directories of each ecosystem (`target`,
/// `node_modules`, `_build`, `obj`, `venv`, ...).
///
/// # Example
///
/// ```no_run
/// use polyglot_openapi::scanner::FileScanner;
/// use std::path::PathBuf;
///
/// let scanner = FileScanner::new(PathBuf::from("./my-project"));
/// let result = scanner.scan().unwrap();
/// println!("Found {} source files", result.files.len());
/// ```
pub struct FileScanner {
    root_path: PathBuf,
}

/// Result of directory scanning operation.
pub struct ScanResult {
    /// Every discovered source file, with its language and content
    pub files: Vec<SourceFile>,
    /// Warning messages for any issues encountered (e.g., inaccessible directories)
    pub warnings: Vec<String>,
}

impl FileScanner {
    pub fn new(root_path: PathBuf) -> Self {
        Self { root_path }
    }

    /// Scans the directory tree and loads every file with a known source extension.
    ///
    /// Files are visited in file-name order, so repeated scans of the same tree
    /// produce the same file list. Content is decoded as UTF-8, replacing invalid
    /// sequences. Inaccessible entries and unreadable files are logged and added
    /// to the warnings; scanning continues.
    ///
    /// # Errors
    ///
    /// Returns an error if the root path does not exist.
    pub fn scan(&self) -> Result<ScanResult> {
        fs::metadata(&self.root_path)
            .with_context(|| format!("Cannot access project path {}", self.root_path.display()))?;

        let mut files = Vec::new();
        let mut warnings = Vec::new();

        for entry in WalkDir::new(&self.root_path)
            .sort_by_file_name()
            .into_iter()
            .filter_entry(|e| {
                // Don't filter the root directory itself
                if e.depth() == 0 || !e.file_type().is_dir() {
                    return true;
                }
                let file_name = e.file_name().to_string_lossy();
                !file_name.starts_with('.') && !SKIPPED_DIRS.contains(&file_name.as_ref())
            })
        {
            let entry = match entry {
                Ok(entry) => entry,
                Err(e) => {
                    // Record warning for inaccessible directories/files
                    let warning = format!("Failed to access path: {}", e);
                    warn!("{}", warning);
                    warnings.push(warning);
                    continue;
                }
            };
            if !entry.file_type().is_file() {
                continue;
            }
            let path = entry.path();
            let Some(language) = Language::from_path(path) else {
                continue;
            };

            match fs::read(path) {
                Ok(bytes) => {
                    debug!("Loaded {} ({})", path.display(), language);
                    let content = String::from_utf8_lossy(&bytes).into_owned();
                    files.push(SourceFile::new(path, language, content));
                }
                Err(e) => {
                    let warning = format!("Failed to read {}: {}", path.display(), e);
                    warn!("{}", warning);
                    warnings.push(warning);
                }
            }
        }

        Ok(ScanResult { files, warnings })
    }
}
