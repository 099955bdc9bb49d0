//! Regex-backed name filtering

use regex::RegexSet;
use treesync_config::FilterConfig;
use treesync_types::{Error, NameFilter, Result};

/// Ignores every name that fully matches one of its patterns
#[derive(Debug, Clone)]
pub struct RegexNameFilter {
    patterns: Vec<String>,
    set: RegexSet,
}

impl RegexNameFilter {
    /// Compile a filter from a list of regular expressions
    ///
    /// # Errors
    ///
    /// Returns [`Error::Config`] when a pattern does not compile.
    pub fn new<I, S>(patterns: I) -> Result<Self>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let patterns: Vec<String> = patterns.into_iter().map(Into::into).collect();
        let anchored = patterns.iter().map(|pattern| format!("^(?:{})$", pattern));
        let set = RegexSet::new(anchored)
            .map_err(|e| Error::config(format!("invalid ignore pattern: {}", e)))?;
        Ok(Self { patterns, set })
    }

    /// A filter that ignores nothing
    pub fn empty() -> Self {
        Self {
            patterns: Vec::new(),
            set: RegexSet::empty(),
        }
    }

    /// Build the filter described by the configuration
    pub fn from_config(config: &FilterConfig) -> Result<Self> {
        Self::new(config.ignore_patterns.iter().cloned())
    }

    /// The source patterns
    pub fn patterns(&self) -> &[String] {
        &self.patterns
    }
}

impl Default for RegexNameFilter {
    fn default() -> Self {
        Self::empty()
    }
}

impl NameFilter for RegexNameFilter {
    fn is_ignored(&self, name: &str) -> bool {
        self.set.is_match(name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case(".git", true)]
    #[case("Thumbs.db", true)]
    #[case("notes.tmp", true)]
    #[case("my.git", false)]
    #[case(".gitignore", false)]
    #[case("report.txt", false)]
    fn test_full_match_only(#[case] name: &str, #[case] ignored: bool) {
        let filter = RegexNameFilter::new([r"\.git", r"Thumbs\.db", r".*\.tmp"]).unwrap();
        assert_eq!(filter.is_ignored(name), ignored);
    }

    #[test]
    fn test_alternation_is_anchored_as_a_whole() {
        let filter = RegexNameFilter::new(["a|b"]).unwrap();
        assert!(filter.is_ignored("a"));
        assert!(filter.is_ignored("b"));
        assert!(!filter.is_ignored("ab"));
        assert!(!filter.is_ignored("xa"));
    }

    #[test]
    fn test_empty_filter_ignores_nothing() {
        let filter = RegexNameFilter::empty();
        assert!(!filter.is_ignored(""));
        assert!(!filter.is_ignored(".git"));
    }

    #[test]
    fn test_invalid_pattern() {
        let error = RegexNameFilter::new(["(open"]).unwrap_err();
        assert!(matches!(error, Error::Config { .. }));
    }

    #[test]
    fn test_from_config() {
        let config = FilterConfig {
            ignore_patterns: vec!["target".to_string()],
        };
        let filter = RegexNameFilter::from_config(&config).unwrap();
        assert_eq!(filter.patterns(), ["target".to_string()]);
        assert!(filter.is_ignored("target"));
    }
}
