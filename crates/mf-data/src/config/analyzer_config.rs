//! Field analyzer configuration

use once_cell::sync::Lazy;
use serde::{Deserialize, Serialize};

use super::null_handling::NullConfig;
use crate::DataError;

static DEFAULT_DATE_FORMATS: Lazy<Vec<String>> = Lazy::new(|| {
    ["%Y-%m-%dT%H:%M:%S", "%Y-%m-%d %H:%M:%S", "%Y-%m-%d", "%d/%m/%Y"]
        .iter()
        .map(|f| f.to_string())
        .collect()
});

/// Settings that drive field type inference
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AnalyzerConfig {
    /// Text values treated as missing
    pub null_config: NullConfig,

    /// chrono format strings tried after RFC 3339
    pub date_formats: Vec<String>,

    /// Key names (or key suffixes) that mark geographic coordinate fields
    pub location_keys: Vec<String>,

    /// Longest token allowed in a space-delimited text field
    pub max_token_len: usize,
}

impl Default for AnalyzerConfig {
    fn default() -> Self {
        Self {
            null_config: NullConfig::default(),
            date_formats: DEFAULT_DATE_FORMATS.to_vec(),
            location_keys: vec![
                "lat".to_string(),
                "latitude".to_string(),
                "lon".to_string(),
                "lng".to_string(),
                "long".to_string(),
                "longitude".to_string(),
                "location".to_string(),
                "coordinates".to_string(),
                "gps".to_string(),
            ],
            max_token_len: 24,
        }
    }
}

impl AnalyzerConfig {
    /// Date formats of the default configuration
    pub fn default_date_formats() -> &'static [String] {
        &DEFAULT_DATE_FORMATS
    }

    /// Parse a configuration from JSON, filling in defaults
    pub fn from_json(json: &str) -> Result<Self, DataError> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), DataError> {
        if self.max_token_len == 0 {
            return Err(DataError::Config("max_token_len must be at least 1".to_string()));
        }
        if self.date_formats.iter().any(|f| f.trim().is_empty()) {
            return Err(DataError::Config("date formats must not be empty".to_string()));
        }
        Ok(())
    }

    /// Whether a field key follows the coordinate naming convention.
    ///
    /// Matches the whole key or its last `_`/`.`/`-` separated segment,
    /// ignoring case, so `lat`, `GPS_Lat` and `where.longitude` all match.
    pub fn is_location_key(&self, key: &str) -> bool {
        let key = key.to_ascii_lowercase();
        let last_segment = key.rsplit(['_', '.', '-']).next().unwrap_or(&key);
        self.location_keys
            .iter()
            .any(|name| name.eq_ignore_ascii_case(&key) || name.eq_ignore_ascii_case(last_segment))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_location_keys() {
        let config = AnalyzerConfig::default();
        assert!(config.is_location_key("lat"));
        assert!(config.is_location_key("GPS_Lat"));
        assert!(config.is_location_key("where.longitude"));
        assert!(!config.is_location_key("latest"));
        assert!(!config.is_location_key("happening"));
    }

    #[test]
    fn test_from_json_fills_defaults() {
        let config = AnalyzerConfig::from_json(r#"{ "max_token_len": 10 }"#).unwrap();
        assert_eq!(config.max_token_len, 10);
        assert_eq!(config.date_formats, AnalyzerConfig::default_date_formats());
    }

    #[test]
    fn test_invalid_config_is_rejected() {
        assert!(matches!(
            AnalyzerConfig::from_json(r#"{ "max_token_len": 0 }"#),
            Err(DataError::Config(_))
        ));
        assert!(matches!(
            AnalyzerConfig::from_json(r#"{ "max_token_len": "x" }"#),
            Err(DataError::Json(_))
        ));
    }
}
