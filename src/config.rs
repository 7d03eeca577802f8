//! Extraction settings shared by every plugin.

/// How `Option<Vec<T>>` (and other optional collections) map to a schema.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum OptionPrecedence {
    /// Nullable array of `T`
    #[default]
    Composed,
    /// The optional wrapper is resolved last and replaces the array typing:
    /// the property gets `T`'s own type, marked nullable
    Legacy,
}

/// Knobs that change what the extractors produce.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ExtractConfig {
    pub option_precedence: OptionPrecedence,
    /// Apply `.nest`, `.mount`, `app.use`, `include()` and similar router prefixes
    /// to the routes they mount. When off, those routes keep their own paths.
    pub propagate_prefixes: bool,
}

impl Default for ExtractConfig {
    fn default() -> Self {
        Self {
            option_precedence: OptionPrecedence::Composed,
            propagate_prefixes: true,
        }
    }
}

impl ExtractConfig {
    pub fn with_option_precedence(mut self, precedence: OptionPrecedence) -> Self {
        self.option_precedence = precedence;
        self
    }

    pub fn with_prefix_propagation(mut self, enabled: bool) -> Self {
        self.propagate_prefixes = enabled;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = ExtractConfig::default();
        assert_eq!(config.option_precedence, OptionPrecedence::Composed);
        assert!(config.propagate_prefixes);
    }

    #[test]
    fn test_builders() {
        let config = ExtractConfig::default()
            .with_option_precedence(OptionPrecedence::Legacy)
            .with_prefix_propagation(false);
        assert_eq!(config.option_precedence, OptionPrecedence::Legacy);
        assert!(!config.propagate_prefixes);
    }
}
