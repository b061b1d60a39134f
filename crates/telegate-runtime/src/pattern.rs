//! Wildcard URL matching for the login flow's completion page.
//!
//! `**` spans path segments, `*` stays within a single segment, so
//! `**/finish.html` matches any depth while `*/finish.html` only matches a
//! single leading segment.

use std::fmt;

use glob::{MatchOptions, Pattern};

use crate::{Error, Result};

const OPTIONS: MatchOptions = MatchOptions {
    case_sensitive: true,
    // Keeps `*` from crossing `/`; `**` still spans segments.
    require_literal_separator: true,
    require_literal_leading_dot: false,
};

/// Compiled wildcard pattern matched against full URLs.
#[derive(Debug, Clone)]
pub struct UrlPattern {
    raw: String,
    pattern: Pattern,
}

impl UrlPattern {
    pub fn new(raw: &str) -> Result<Self> {
        if raw.is_empty() {
            return Err(Error::Config("end_url pattern must not be empty".into()));
        }
        let pattern = Pattern::new(raw)
            .map_err(|e| Error::Config(format!("invalid end_url pattern '{raw}': {e}")))?;
        Ok(Self {
            raw: raw.to_string(),
            pattern,
        })
    }

    pub fn matches(&self, url: &str) -> bool {
        self.pattern.matches_with(url, OPTIONS)
    }

    pub fn as_str(&self) -> &str {
        &self.raw
    }
}

impl fmt::Display for UrlPattern {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.raw)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn double_star_spans_segments() {
        let pattern = UrlPattern::new("**/finish.html").unwrap();
        assert!(pattern.matches("http://x/a/b/finish.html"));
        assert!(pattern.matches("http://x/finish.html"));
    }

    #[test]
    fn single_star_stays_in_segment() {
        let pattern = UrlPattern::new("*/finish.html").unwrap();
        assert!(pattern.matches("a/finish.html"));
        assert!(!pattern.matches("http://x/finish.html"));
        assert!(!pattern.matches("a/b/finish.html"));
    }

    #[test]
    fn star_matches_within_one_segment() {
        let pattern = UrlPattern::new("http://x/fin*.html").unwrap();
        assert!(pattern.matches("http://x/finish.html"));
        assert!(!pattern.matches("http://x/deeper/finish.html"));
    }

    #[test]
    fn literal_pattern_is_exact() {
        let pattern = UrlPattern::new("http://x/done").unwrap();
        assert!(pattern.matches("http://x/done"));
        assert!(!pattern.matches("http://x/done/extra"));
    }

    #[test]
    fn empty_pattern_rejected() {
        assert!(matches!(UrlPattern::new(""), Err(Error::Config(_))));
    }

    #[test]
    fn query_strings_participate_in_matching() {
        let pattern = UrlPattern::new("**/finish.html*").unwrap();
        assert!(pattern.matches("http://x/a/finish.html?session=1"));
    }
}
