//! Null value handling for field analysis
//!
//! Survey data marks missing answers in many ways. A value counts as "no
//! data" when it is `Null`, an empty list, or text matching one of the
//! configured patterns.

use serde::{Serialize, Deserialize};

use mf_core::FieldValue;

/// Null value configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct NullConfig {
    /// Text values to treat as "no data"
    pub patterns: Vec<String>,

    /// Whether to trim whitespace before checking
    pub trim_whitespace: bool,

    /// Case sensitive matching
    pub case_sensitive: bool,
}

impl Default for NullConfig {
    fn default() -> Self {
        Self {
            patterns: ["", "-", "N/A", "null", "None"].iter().map(|p| p.to_string()).collect(),
            trim_whitespace: true,
            case_sensitive: false,
        }
    }
}

impl NullConfig {
    /// Whether a text value matches one of the patterns
    pub fn is_null(&self, text: &str) -> bool {
        let text = if self.trim_whitespace { text.trim() } else { text };
        self.patterns.iter().any(|pattern| match self.case_sensitive {
            true => text == pattern,
            false => text.eq_ignore_ascii_case(pattern),
        })
    }

    /// Whether a property value carries no data
    pub fn is_missing(&self, value: &FieldValue) -> bool {
        match value {
            FieldValue::Null => true,
            FieldValue::Text(s) => self.is_null(s),
            FieldValue::List(items) => items.iter().all(|item| self.is_null(item)),
            FieldValue::Bool(_) | FieldValue::Number(_) | FieldValue::Date(_) => false,
        }
    }

    pub fn add_pattern(&mut self, pattern: String) {
        if !self.patterns.contains(&pattern) {
            self.patterns.push(pattern);
        }
    }

    pub fn remove_pattern(&mut self, pattern: &str) {
        self.patterns.retain(|p| p != pattern);
    }
}
