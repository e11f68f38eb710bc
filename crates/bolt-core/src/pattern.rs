// SPDX-License-Identifier: MIT OR Apache-2.0
//! String/regex matching primitive used to build listener constraints.
//!
//! The generic rule is exact-equality for a `String` pattern and
//! find/substring semantics for a `Regex` pattern. The one documented
//! exception — the `Message` family's `pattern` field treating a `String` as
//! substring rather than exact-equality — is intentionally NOT modeled here;
//! it is special-cased by the listener router, which is the only caller that
//! knows which field it is matching.

use regex::Regex;
use std::fmt;

/// A single exact-string-or-regex matcher.
#[derive(Debug, Clone)]
pub enum Pattern {
    /// Matches only if the subject is exactly equal to this string.
    Exact(String),
    /// Matches if the regex finds anywhere in the subject; captures (if any)
    /// are returned from [`Pattern::matches`].
    Regex(Regex),
}

impl Pattern {
    /// Build an exact-match pattern.
    #[must_use]
    pub fn exact(value: impl Into<String>) -> Self {
        Self::Exact(value.into())
    }

    /// Build a regex pattern from an already-compiled [`Regex`].
    #[must_use]
    pub fn regex(re: Regex) -> Self {
        Self::Regex(re)
    }

    /// Compile a regex pattern from source, surfacing compile errors to the
    /// caller instead of panicking — listener registration is the caller and
    /// must be able to reject a bad pattern at startup.
    pub fn compile(source: &str) -> Result<Self, regex::Error> {
        Regex::new(source).map(Self::Regex)
    }

    /// Test `subject` against this pattern. For [`Pattern::Regex`], returns
    /// the full set of capture groups (group 0 is the whole match) when it
    /// finds anywhere in `subject`; for [`Pattern::Exact`], returns an empty
    /// capture vec on an exact match.
    #[must_use]
    pub fn matches(&self, subject: &str) -> Option<Vec<Option<String>>> {
        match self {
            Self::Exact(expected) => (expected == subject).then(Vec::new),
            Self::Regex(re) => re.captures(subject).map(|caps| {
                caps.iter()
                    .map(|m| m.map(|m| m.as_str().to_string()))
                    .collect()
            }),
        }
    }

    /// Whether this pattern matches at all, ignoring captures.
    #[must_use]
    pub fn is_match(&self, subject: &str) -> bool {
        match self {
            Self::Exact(expected) => expected == subject,
            Self::Regex(re) => re.is_match(subject),
        }
    }
}

impl fmt::Display for Pattern {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Exact(s) => write!(f, "exact({s})"),
            Self::Regex(re) => write!(f, "regex({})", re.as_str()),
        }
    }
}

impl From<&str> for Pattern {
    fn from(value: &str) -> Self {
        Self::Exact(value.to_string())
    }
}

impl From<String> for Pattern {
    fn from(value: String) -> Self {
        Self::Exact(value)
    }
}

impl From<Regex> for Pattern {
    fn from(value: Regex) -> Self {
        Self::Regex(value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn exact_requires_full_equality() {
        let p = Pattern::exact("app_home_opened");
        assert!(p.is_match("app_home_opened"));
        assert!(!p.is_match("app_home_opened_extra"));
        assert!(!p.is_match("prefix_app_home_opened"));
    }

    #[test]
    fn regex_matches_anywhere() {
        let p = Pattern::compile("^deploy-(\\w+)$").unwrap();
        assert!(p.is_match("deploy-prod"));
        let caps = p.matches("deploy-prod").unwrap();
        assert_eq!(caps[1].as_deref(), Some("prod"));
    }

    #[test]
    fn regex_substring_find_semantics() {
        let p = Pattern::compile("hello").unwrap();
        assert!(p.is_match("well hello there"));
    }

    #[test]
    fn compile_surfaces_error_instead_of_panicking() {
        assert!(Pattern::compile("(unterminated").is_err());
    }

    #[test]
    fn exact_match_returns_empty_captures() {
        let p = Pattern::exact("ping");
        assert_eq!(p.matches("ping"), Some(Vec::new()));
        assert_eq!(p.matches("pong"), None);
    }
}
