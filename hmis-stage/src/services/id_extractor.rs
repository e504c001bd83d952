//! Request ID extraction
//!
//! Pulls export request identifiers (`JSOC_20130801_123`) out of the success
//! log so the download phase gets a plain one-per-line list.

use crate::error::ExtractError;
use regex::Regex;
use std::path::Path;

/// Result of scanning a success log
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Extraction {
    /// Identifiers in log order
    pub ids: Vec<String>,
    /// Non-blank lines with no identifier, as `(line number, text)`
    pub unmatched: Vec<(usize, String)>,
}

/// Matches `<PREFIX>_<digits>_<digits>` tokens
#[derive(Debug, Clone)]
pub struct IdExtractor {
    pattern: Regex,
}

impl IdExtractor {
    pub fn new(prefix: &str) -> Result<Self, ExtractError> {
        let prefix = prefix.trim();
        if prefix.is_empty() || prefix.chars().any(char::is_whitespace) {
            return Err(ExtractError::InvalidPrefix(prefix.to_string()));
        }

        let pattern = Regex::new(&format!(r"\b{}_\d+_\d+\b", regex::escape(prefix)))
            .map_err(|_| ExtractError::InvalidPrefix(prefix.to_string()))?;

        Ok(Self { pattern })
    }

    /// First identifier on `line`
    pub fn find<'a>(&self, line: &'a str) -> Option<&'a str> {
        self.pattern.find(line).map(|m| m.as_str())
    }

    pub fn extract_str(&self, content: &str) -> Extraction {
        let mut extraction = Extraction::default();

        for (index, line) in content.lines().enumerate() {
            if line.trim().is_empty() {
                continue;
            }
            match self.find(line) {
                Some(id) => extraction.ids.push(id.to_string()),
                None => extraction.unmatched.push((index + 1, line.to_string())),
            }
        }

        extraction
    }

    /// Read `input`, write the identifiers one per line to `output`
    ///
    /// `output` is overwritten. Unmatched lines are logged and returned, not
    /// written.
    pub fn extract_file(&self, input: &Path, output: &Path) -> Result<Extraction, ExtractError> {
        let content = std::fs::read_to_string(input).map_err(|source| ExtractError::Io {
            path: input.to_path_buf(),
            source,
        })?;

        let extraction = self.extract_str(&content);

        for (line_number, line) in &extraction.unmatched {
            tracing::warn!(line_number, line = %line, "No request ID on line");
        }

        let mut body = extraction.ids.join("\n");
        if !body.is_empty() {
            body.push('\n');
        }
        std::fs::write(output, body).map_err(|source| ExtractError::Io {
            path: output.to_path_buf(),
            source,
        })?;

        tracing::info!(
            ids = extraction.ids.len(),
            unmatched = extraction.unmatched.len(),
            output = %output.display(),
            "Request IDs extracted"
        );

        Ok(extraction)
    }
}
