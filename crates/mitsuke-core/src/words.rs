//! Configured word-removal lists.
//!
//! Each list comes from configuration as a comma-separated string of regex
//! patterns. Patterns are compiled once, case-insensitively. A pattern that
//! fails to compile is dropped from its list and kept aside as a
//! [`PatternError`]; the remaining patterns still apply.

use regex::{Regex, RegexBuilder};
use thiserror::Error;

use crate::config::MatchingConfig;

/// A configured pattern that failed to compile.
#[derive(Debug, Clone, Error)]
#[error("invalid word pattern `{pattern}`: {source}")]
pub struct PatternError {
    pub pattern: String,
    #[source]
    pub source: regex::Error,
}

/// An ordered list of compiled removal patterns.
#[derive(Debug, Clone, Default)]
pub struct WordList {
    patterns: Vec<Regex>,
    rejected: Vec<PatternError>,
}

impl WordList {
    /// Compile a comma-separated pattern list.
    ///
    /// Surrounding whitespace is trimmed from each pattern and empty entries
    /// are ignored.
    pub fn compile(list: &str) -> Self {
        let mut patterns = Vec::new();
        let mut rejected = Vec::new();

        for raw in list.split(',') {
            let pattern = raw.trim();
            if pattern.is_empty() {
                continue;
            }
            match RegexBuilder::new(pattern).case_insensitive(true).build() {
                Ok(re) => patterns.push(re),
                Err(source) => {
                    tracing::warn!(pattern, error = %source, "Skipping invalid word pattern");
                    rejected.push(PatternError {
                        pattern: pattern.to_string(),
                        source,
                    });
                }
            }
        }

        Self { patterns, rejected }
    }

    /// Remove every match of every pattern, in list order.
    pub fn apply(&self, s: &str) -> String {
        self.patterns
            .iter()
            .fold(s.to_string(), |acc, re| re.replace_all(&acc, "").into_owned())
    }

    pub fn len(&self) -> usize {
        self.patterns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.patterns.is_empty()
    }

    /// Patterns from the source list that failed to compile.
    pub fn rejected(&self) -> &[PatternError] {
        &self.rejected
    }
}

/// The two removal lists used by the normalizer.
#[derive(Debug, Clone, Default)]
pub struct WordFilterSet {
    /// Always applied while computing the real name.
    pub normal: WordList,
    /// Applied only when retrying after a miss.
    pub strict: WordList,
}

impl WordFilterSet {
    pub fn compile(normal_words: &str, strict_words: &str) -> Self {
        Self {
            normal: WordList::compile(normal_words),
            strict: WordList::compile(strict_words),
        }
    }

    pub fn from_config(config: &MatchingConfig) -> Self {
        Self::compile(&config.normal_words, &config.strict_words)
    }

    /// All patterns, from both lists, that failed to compile.
    pub fn rejected(&self) -> impl Iterator<Item = &PatternError> {
        self.normal.rejected().iter().chain(self.strict.rejected())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn compiles_comma_separated_list() {
        let list = WordList::compile("1080p, x264 ,,HEVC");
        assert_eq!(list.len(), 3);
        assert!(list.rejected().is_empty());
    }

    #[test]
    fn empty_list() {
        let list = WordList::compile("");
        assert!(list.is_empty());
        assert_eq!(list.apply("Title"), "Title");
    }

    #[test]
    fn removal_is_case_insensitive() {
        let list = WordList::compile("subgroup");
        assert_eq!(list.apply("[SubGroup] Title [SUBGROUP]"), "[] Title []");
    }

    #[test]
    fn applied_cumulatively_in_order() {
        // The second pattern only matches once the first has removed "x".
        let list = WordList::compile("x,ab");
        assert_eq!(list.apply("axb title"), " title");
    }

    #[test]
    fn bad_pattern_is_skipped_not_fatal() {
        let list = WordList::compile(r"(unclosed,\bBD\b,[also");
        assert_eq!(list.len(), 1);
        assert_eq!(list.rejected().len(), 2);
        assert_eq!(list.rejected()[0].pattern, "(unclosed");
        assert_eq!(list.apply("Title BD"), "Title ");
    }

    #[test]
    fn filter_set_reports_rejections_from_both_lists() {
        let set = WordFilterSet::compile("ok,(", "fine,[");
        let rejected: Vec<_> = set.rejected().map(|e| e.pattern.as_str()).collect();
        assert_eq!(rejected, vec!["(", "["]);
        assert_eq!(set.normal.len(), 1);
        assert_eq!(set.strict.len(), 1);
    }
}
