use crate::error::{Error, Result};
use crate::extractor::Framework;
use crate::registry::Registry;
use log::{debug, warn};
use std::collections::HashSet;
use std::fs;
use std::path::Path;
use walkdir::WalkDir;

/// Build and package manifests the detector knows how to read.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ManifestKind {
    /// `Cargo.toml`
    Cargo,
    /// `package.json`
    PackageJson,
    /// `pom.xml`
    Maven,
    /// `build.gradle`, `build.gradle.kts`
    Gradle,
    /// `*.csproj`
    CsProj,
    /// `requirements.txt`, `requirements-*.txt`
    Requirements,
    /// `pyproject.toml`
    PyProject,
    /// `setup.py`
    SetupPy,
    /// `Pipfile`
    Pipfile,
    /// `mix.exs`
    Mix,
    /// `CMakeLists.txt`
    CMake,
    /// `conanfile.txt`
    Conan,
    /// `vcpkg.json`
    Vcpkg,
}

impl ManifestKind {
    /// Manifest kind for a file name, if it is one we read
    pub fn for_file_name(name: &str) -> Option<Self> {
        let lower = name.to_ascii_lowercase();
        let kind = match lower.as_str() {
            "cargo.toml" => ManifestKind::Cargo,
            "package.json" => ManifestKind::PackageJson,
            "pom.xml" => ManifestKind::Maven,
            "build.gradle" | "build.gradle.kts" => ManifestKind::Gradle,
            "pyproject.toml" => ManifestKind::PyProject,
            "setup.py" => ManifestKind::SetupPy,
            "pipfile" => ManifestKind::Pipfile,
            "mix.exs" => ManifestKind::Mix,
            "cmakelists.txt" => ManifestKind::CMake,
            "conanfile.txt" => ManifestKind::Conan,
            "vcpkg.json" => ManifestKind::Vcpkg,
            _ if lower.ends_with(".csproj") => ManifestKind::CsProj,
            _ if lower.starts_with("requirements") && lower.ends_with(".txt") => {
                ManifestKind::Requirements
            }
            _ => return None,
        };
        Some(kind)
    }
}

/// A dependency name a plugin looks for in one manifest kind.
///
/// The needle is matched case-insensitively as a substring of each line inside a
/// dependency section, so it is written in lower case.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ManifestMarker {
    pub kind: ManifestKind,
    pub needle: &'static str,
}

impl ManifestMarker {
    pub const fn new(kind: ManifestKind, needle: &'static str) -> Self {
        Self { kind, needle }
    }
}

/// Framework detector reading project manifests.
///
/// Detection is a line-oriented heuristic: for every manifest in the project root
/// (and up to two directory levels below it, for monorepos), each line is checked
/// for the registered plugins' markers while the scanner is inside something that
/// looks like that manifest's dependency section. It is not a manifest parser.
pub struct ManifestDetector;

impl ManifestDetector {
    /// Detects the frameworks whose markers appear in the project's manifests.
    ///
    /// # Returns
    ///
    /// The detected frameworks in registry order; empty when nothing matched.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidArgument`] when `root` is not a directory. Unreadable
    /// manifests are logged and skipped.
    ///
    /// # Example
    ///
    /// ```no_run
    /// use polyglot_openapi::detector::ManifestDetector;
    /// use polyglot_openapi::registry::Registry;
    /// use std::path::Path;
    ///
    /// let registry = Registry::with_builtin_plugins();
    /// let frameworks = ManifestDetector::detect(Path::new("./my-project"), &registry).unwrap();
    /// println!("Detected {} framework(s)", frameworks.len());
    /// ```
    pub fn detect(root: &Path, registry: &Registry) -> Result<Vec<Framework>> {
        if !root.is_dir() {
            return Err(Error::InvalidArgument(format!(
                "{} is not a directory",
                root.display()
            )));
        }

        let mut found = HashSet::new();
        for (path, kind) in Self::manifests(root) {
            debug!("Reading manifest {} as {:?}", path.display(), kind);
            let content = match fs::read_to_string(&path) {
                Ok(content) => content,
                Err(e) => {
                    warn!("Cannot read manifest {}: {}", path.display(), e);
                    continue;
                }
            };
            found.extend(Self::scan_manifest(kind, &content, registry));
        }

        let frameworks: Vec<Framework> = registry
            .frameworks()
            .into_iter()
            .filter(|f| found.contains(f))
            .collect();
        debug!("Detected frameworks: {:?}", frameworks);
        Ok(frameworks)
    }

    /// Frameworks whose markers appear in one manifest's content
    pub fn scan_manifest(kind: ManifestKind, content: &str, registry: &Registry) -> HashSet<Framework> {
        let markers: Vec<(Framework, &str)> = registry
            .plugins()
            .iter()
            .flat_map(|plugin| {
                plugin
                    .manifest_markers()
                    .iter()
                    .filter(|m| m.kind == kind)
                    .map(move |m| (plugin.framework(), m.needle))
            })
            .collect();

        let mut found = HashSet::new();
        if markers.is_empty() {
            return found;
        }

        let mut section = SectionState::default();
        for raw in content.lines() {
            let line = raw.trim().to_lowercase();
            if line.is_empty() || line.starts_with('#') || line.starts_with("//") {
                continue;
            }
            if !section.step(kind, &line) {
                continue;
            }
            for (framework, needle) in &markers {
                if line.contains(needle) && found.insert(*framework) {
                    debug!("Marker {:?} found for {}: {}", needle, framework, raw.trim());
                }
            }
        }
        found
    }

    /// Manifest files at the root and up to two levels below it
    fn manifests(root: &Path) -> Vec<(std::path::PathBuf, ManifestKind)> {
        WalkDir::new(root)
            .max_depth(3)
            .sort_by_file_name()
            .into_iter()
            .filter_entry(|entry| entry.depth() == 0 || !is_ignored_dir(entry))
            .filter_map(|entry| match entry {
                Ok(entry) => Some(entry),
                Err(e) => {
                    warn!("Error accessing path: {}", e);
                    None
                }
            })
            .filter(|entry| entry.file_type().is_file())
            .filter_map(|entry| {
                let kind = ManifestKind::for_file_name(&entry.file_name().to_string_lossy())?;
                Some((entry.into_path(), kind))
            })
            .collect()
    }
}

fn is_ignored_dir(entry: &walkdir::DirEntry) -> bool {
    if !entry.file_type().is_dir() {
        return false;
    }
    let name = entry.file_name().to_string_lossy();
    name.starts_with('.') || matches!(name.as_ref(), "node_modules" | "target" | "vendor" | "_build" | "deps")
}

/// Where the line scanner is inside a manifest's dependency declarations.
#[derive(Debug, Default)]
struct SectionState {
    active: bool,
    /// Open brackets of a multi-line dependency block
    depth: i32,
}

impl SectionState {
    /// Advance over one trimmed, lower-cased line. Returns whether the line belongs
    /// to a dependency section.
    fn step(&mut self, kind: ManifestKind, line: &str) -> bool {
        match kind {
            ManifestKind::Cargo => self.table(line, |h| h.contains("dependencies")),
            ManifestKind::Pipfile => self.table(line, |h| h.contains("packages")),
            ManifestKind::Conan => self.table(line, |h| h == "[requires]"),
            ManifestKind::PyProject => {
                if self.depth > 0 {
                    return self.block(line, '[', ']');
                }
                if line.starts_with("dependencies") && line.contains('=') && line.contains('[') {
                    return self.block(line, '[', ']');
                }
                self.table(line, |h| h.contains("dependencies"))
            }
            ManifestKind::PackageJson | ManifestKind::Vcpkg => {
                if self.depth > 0 {
                    self.depth = (self.depth + balance(line, '{', '}') + balance(line, '[', ']')).max(0);
                    return true;
                }
                let opens = ["\"dependencies\"", "\"devdependencies\"", "\"peerdependencies\""];
                match opens.iter().find_map(|key| line.find(key).map(|i| i + key.len())) {
                    Some(rest) => {
                        let tail = &line[rest..];
                        self.depth = balance(tail, '{', '}') + balance(tail, '[', ']');
                        self.depth = self.depth.max(0);
                        true
                    }
                    None => false,
                }
            }
            ManifestKind::Maven => {
                self.xml(line, &["<dependencies>", "<parent>", "<plugins>"], &["</dependencies>", "</parent>", "</plugins>"])
            }
            ManifestKind::CsProj => {
                line.contains("<packagereference") || self.xml(line, &["<itemgroup"], &["</itemgroup>"])
            }
            ManifestKind::Gradle => {
                if self.depth > 0 {
                    return self.block(line, '{', '}');
                }
                if (line.starts_with("dependencies") || line.starts_with("plugins")) && line.contains('{') {
                    return self.block(line, '{', '}');
                }
                false
            }
            ManifestKind::SetupPy => {
                if self.depth > 0 || line.contains("install_requires") {
                    return self.block(line, '[', ']');
                }
                false
            }
            ManifestKind::Mix => {
                if line.starts_with("defp deps") {
                    self.active = true;
                } else if self.active && line == "end" {
                    self.active = false;
                    return false;
                }
                self.active
            }
            ManifestKind::Requirements => true,
            ManifestKind::CMake => {
                if self.depth > 0 {
                    return self.block(line, '(', ')');
                }
                const COMMANDS: [&str; 5] = [
                    "find_package",
                    "target_link_libraries",
                    "fetchcontent_declare",
                    "pkg_check_modules",
                    "add_subdirectory",
                ];
                if COMMANDS.iter().any(|c| line.contains(c)) {
                    return self.block(line, '(', ')');
                }
                false
            }
        }
    }

    /// TOML/INI style: a `[table]` header switches the section on or off
    fn table(&mut self, line: &str, matches: impl Fn(&str) -> bool) -> bool {
        if is_table_header(line) {
            self.active = matches(line);
        }
        self.active
    }

    /// A bracketed block opened on this line or an earlier one
    fn block(&mut self, line: &str, open: char, close: char) -> bool {
        self.depth = (self.depth + balance(line, open, close)).max(0);
        true
    }

    fn xml(&mut self, line: &str, opens: &[&str], closes: &[&str]) -> bool {
        let opened = opens.iter().filter(|tag| line.contains(*tag)).count() as i32;
        let closed = closes.iter().filter(|tag| line.contains(*tag)).count() as i32;
        let inside = self.depth > 0 || opened > 0;
        self.depth = (self.depth + opened - closed).max(0);
        inside
    }
}

fn is_table_header(line: &str) -> bool {
    line.starts_with('[')
        && line.ends_with(']')
        && line[1..].starts_with(|c: char| c.is_ascii_alphabetic() || c == '[')
}

fn balance(line: &str, open: char, close: char) -> i32 {
    line.chars().fold(0, |acc, c| {
        if c == open {
            acc + 1
        } else if c == close {
            acc - 1
        } else {
            acc
        }
    })
}
