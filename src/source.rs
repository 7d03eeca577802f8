//! Source files handed to the extractors.

use crate::text::CommentStyle;
use std::fmt;
use std::path::{Path, PathBuf};

/// Source language of a file, as declared by whoever collected it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Language {
    Rust,
    TypeScript,
    JavaScript,
    Python,
    Elixir,
    CSharp,
    Java,
    Kotlin,
    Cpp,
}

impl Language {
    /// Parse a declared language tag such as `"rust"` or `"typescript"`
    pub fn from_tag(tag: &str) -> Option<Self> {
        match tag.trim().to_ascii_lowercase().as_str() {
            "rust" | "rs" => Some(Language::Rust),
            "typescript" | "ts" | "tsx" => Some(Language::TypeScript),
            "javascript" | "js" | "jsx" => Some(Language::JavaScript),
            "python" | "py" => Some(Language::Python),
            "elixir" | "ex" => Some(Language::Elixir),
            "csharp" | "c#" | "cs" => Some(Language::CSharp),
            "java" => Some(Language::Java),
            "kotlin" | "kt" => Some(Language::Kotlin),
            "cpp" | "c++" | "cxx" => Some(Language::Cpp),
            _ => None,
        }
    }

    /// Language for a file extension (without the dot)
    pub fn from_extension(ext: &str) -> Option<Self> {
        match ext.to_ascii_lowercase().as_str() {
            "rs" => Some(Language::Rust),
            "ts" | "tsx" | "mts" | "cts" => Some(Language::TypeScript),
            "js" | "jsx" | "mjs" | "cjs" => Some(Language::JavaScript),
            "py" => Some(Language::Python),
            "ex" | "exs" => Some(Language::Elixir),
            "cs" => Some(Language::CSharp),
            "java" => Some(Language::Java),
            "kt" | "kts" => Some(Language::Kotlin),
            "cc" | "cpp" | "cxx" | "h" | "hpp" | "hh" => Some(Language::Cpp),
            _ => None,
        }
    }

    pub fn from_path(path: &Path) -> Option<Self> {
        path.extension()
            .and_then(|ext| ext.to_str())
            .and_then(Self::from_extension)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Language::Rust => "rust",
            Language::TypeScript => "typescript",
            Language::JavaScript => "javascript",
            Language::Python => "python",
            Language::Elixir => "elixir",
            Language::CSharp => "csharp",
            Language::Java => "java",
            Language::Kotlin => "kotlin",
            Language::Cpp => "cpp",
        }
    }

    pub fn comment_style(&self) -> CommentStyle {
        match self {
            Language::Python | Language::Elixir => CommentStyle::Hash,
            _ => CommentStyle::CFamily,
        }
    }
}

impl fmt::Display for Language {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One file of the project: path, declared language and content.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceFile {
    pub path: PathBuf,
    pub language: Language,
    pub content: String,
}

impl SourceFile {
    pub fn new(path: impl Into<PathBuf>, language: Language, content: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            language,
            content: content.into(),
        }
    }

    /// Content with comments blanked out, offsets preserved
    pub fn masked(&self) -> String {
        crate::text::mask_comments(&self.content, self.language.comment_style())
    }

    /// File name without extension, e.g. `users` for `src/routes/users.ts`
    pub fn stem(&self) -> &str {
        self.path
            .file_stem()
            .and_then(|s| s.to_str())
            .unwrap_or_default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_language_from_tag() {
        assert_eq!(Language::from_tag("Rust"), Some(Language::Rust));
        assert_eq!(Language::from_tag("c#"), Some(Language::CSharp));
        assert_eq!(Language::from_tag("cobol"), None);
    }

    #[test]
    fn test_language_from_path() {
        assert_eq!(Language::from_path(Path::new("a/b.tsx")), Some(Language::TypeScript));
        assert_eq!(Language::from_path(Path::new("router.ex")), Some(Language::Elixir));
        assert_eq!(Language::from_path(Path::new("ctrl.hpp")), Some(Language::Cpp));
        assert_eq!(Language::from_path(Path::new("README.md")), None);
        assert_eq!(Language::from_path(Path::new("Makefile")), None);
    }

    #[test]
    fn test_source_file_stem() {
        let file = SourceFile::new("src/routes/users.ts", Language::TypeScript, "");
        assert_eq!(file.stem(), "users");
    }
}
