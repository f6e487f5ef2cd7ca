//! Line patterns and the filter chain applied before classification.

use regex::Regex;

/// Error type for pattern compilation.
#[derive(thiserror::Error, Debug)]
pub enum FilterError {
    /// Invalid regex pattern.
    #[error("Invalid line pattern: {0}")]
    InvalidPattern(#[from] regex::Error),
}

/// A pattern that must match the whole line.
#[derive(Debug, Clone)]
pub struct LinePattern {
    source: String,
    regex: Regex,
}

impl LinePattern {
    /// Compile a whole-line pattern.
    ///
    /// # Errors
    ///
    /// Returns `FilterError::InvalidPattern` if the regex is invalid.
    pub fn new(pattern: &str) -> Result<Self, FilterError> {
        Ok(Self {
            source: pattern.to_string(),
            regex: Regex::new(&format!("^(?:{pattern})$"))?,
        })
    }

    #[must_use]
    pub fn matches(&self, line: &str) -> bool {
        self.regex.is_match(line)
    }

    /// The pattern as written.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.source
    }
}

/// Ordered set of patterns; a line passes if any of them matches.
/// An empty filter passes everything.
#[derive(Debug, Clone, Default)]
pub struct LineFilter {
    patterns: Vec<LinePattern>,
}

impl LineFilter {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Compile every pattern.
    ///
    /// # Errors
    ///
    /// Returns the first compilation error.
    pub fn from_patterns<S: AsRef<str>>(patterns: &[S]) -> Result<Self, FilterError> {
        let patterns = patterns
            .iter()
            .map(|p| LinePattern::new(p.as_ref()))
            .collect::<Result<_, _>>()?;
        Ok(Self { patterns })
    }

    /// Compile what compiles; log and skip the rest.
    #[must_use]
    pub fn from_patterns_lossy<S: AsRef<str>>(patterns: &[S]) -> Self {
        let patterns = patterns
            .iter()
            .filter_map(|p| match LinePattern::new(p.as_ref()) {
                Ok(pattern) => Some(pattern),
                Err(e) => {
                    tracing::warn!(pattern = p.as_ref(), error = %e, "Skipping invalid line filter");
                    None
                }
            })
            .collect();
        Self { patterns }
    }

    pub fn push(&mut self, pattern: LinePattern) {
        self.patterns.push(pattern);
    }

    #[must_use]
    pub fn accepts(&self, line: &str) -> bool {
        self.patterns.is_empty() || self.patterns.iter().any(|p| p.matches(line))
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.patterns.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.patterns.is_empty()
    }
}
