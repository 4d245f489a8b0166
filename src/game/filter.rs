//! Message filtering with regex patterns.
//!
//! Relayed lines matching any configured pattern are dropped in both
//! directions.

use fancy_regex::Regex;
use tracing::warn;

/// Message filter that checks lines against regex patterns.
#[derive(Debug, Clone, Default)]
pub struct MessageFilter {
    patterns: Vec<CompiledPattern>,
}

/// A compiled regex pattern with its original string for debugging.
#[derive(Debug, Clone)]
struct CompiledPattern {
    original: String,
    regex: Regex,
}

impl MessageFilter {
    /// Invalid regex patterns are logged and skipped.
    pub fn new(patterns: &[String]) -> Self {
        Self {
            patterns: compile_patterns(patterns),
        }
    }

    /// Create an empty filter that allows all messages.
    pub fn empty() -> Self {
        Self::default()
    }

    /// Returns `true` if the line matches any pattern and should be blocked.
    pub fn should_filter(&self, message: &str) -> bool {
        self.patterns.iter().any(|p| {
            p.regex.is_match(message).unwrap_or_else(|e| {
                warn!("Regex match error for pattern '{}': {}", p.original, e);
                false
            })
        })
    }

    pub fn has_patterns(&self) -> bool {
        !self.patterns.is_empty()
    }
}

fn compile_patterns(patterns: &[String]) -> Vec<CompiledPattern> {
    patterns
        .iter()
        .filter_map(|pattern| match Regex::new(pattern) {
            Ok(regex) => Some(CompiledPattern {
                original: pattern.clone(),
                regex,
            }),
            Err(e) => {
                warn!("Invalid filter regex pattern '{}': {}", pattern, e);
                None
            }
        })
        .collect()
}
