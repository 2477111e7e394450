//! Caller-supplied intent allow-lists.
//!
//! Each pattern is an intent name that may contain `*` (any run of
//! characters) and `?` (any single character). A backslash escapes the
//! next character.

use regex::Regex;

use crate::error::{NluError, Result};

/// A compiled set of wildcard patterns.
#[derive(Clone, Debug)]
pub struct AllowList {
    patterns: Vec<Regex>,
}

impl AllowList {
    /// Compile the given patterns.
    pub fn new<S: AsRef<str>>(patterns: &[S]) -> Result<Self> {
        let patterns = patterns
            .iter()
            .map(|p| Self::compile_pattern(p.as_ref()))
            .collect::<Result<Vec<_>>>()?;
        Ok(AllowList { patterns })
    }

    fn compile_pattern(pattern: &str) -> Result<Regex> {
        let mut regex_pattern = String::from("^");
        let mut chars = pattern.chars();

        while let Some(c) = chars.next() {
            match c {
                '\\' => match chars.next() {
                    Some(escaped) => regex_pattern.push_str(&regex::escape(&escaped.to_string())),
                    None => regex_pattern.push_str("\\\\"),
                },
                '*' => regex_pattern.push_str(".*"),
                '?' => regex_pattern.push('.'),
                c => regex_pattern.push_str(&regex::escape(&c.to_string())),
            }
        }
        regex_pattern.push('$');

        Regex::new(&regex_pattern)
            .map_err(|e| NluError::invalid_argument(format!("Invalid allow-list pattern: {e}")))
    }

    /// True if any pattern matches the whole intent name.
    pub fn allows(&self, intent: &str) -> bool {
        self.patterns.iter().any(|p| p.is_match(intent))
    }

    pub fn len(&self) -> usize {
        self.patterns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.patterns.is_empty()
    }
}
