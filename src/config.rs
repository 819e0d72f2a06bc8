use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

/// Pie charts with more slices than this are rejected.
pub const DEFAULT_MAX_PIE_CATEGORIES: usize = 10;

/// Header prefix pandas-style writers give to an unnamed index column.
pub const DEFAULT_PLACEHOLDER_PREFIX: &str = "Unnamed:";

/// Tunables shared by the loader, the time-axis coercion and the resolver.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    pub max_pie_categories: usize,
    /// Cell texts read as absent values (compared after trimming).
    pub null_tokens: Vec<String>,
    /// Header names starting with this prefix are dropped on load.
    pub placeholder_header_prefix: String,
    /// `strftime` patterns tried in order after RFC 3339.
    pub datetime_formats: Vec<String>,
    pub csv_delimiter: char,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            max_pie_categories: DEFAULT_MAX_PIE_CATEGORIES,
            null_tokens: ["", "NA", "N/A", "NaN", "nan", "null", "NULL", "None", "#N/A"]
                .iter()
                .map(|s| s.to_string())
                .collect(),
            placeholder_header_prefix: DEFAULT_PLACEHOLDER_PREFIX.to_string(),
            datetime_formats: [
                "%Y-%m-%d %H:%M:%S",
                "%Y-%m-%dT%H:%M:%S",
                "%Y-%m-%d %H:%M",
                "%Y-%m-%d",
                "%Y/%m/%d",
                "%d/%m/%Y",
                "%d.%m.%Y",
            ]
            .iter()
            .map(|s| s.to_string())
            .collect(),
            csv_delimiter: ',',
        }
    }
}

impl EngineConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.max_pie_categories == 0 {
            return Err(ConfigError::Invalid {
                reason: "max_pie_categories must be greater than 0".to_string(),
            });
        }
        if self.datetime_formats.is_empty() {
            return Err(ConfigError::Invalid {
                reason: "datetime_formats must list at least one pattern".to_string(),
            });
        }
        if !self.csv_delimiter.is_ascii() {
            return Err(ConfigError::Invalid {
                reason: format!("csv_delimiter '{}' must be an ASCII character", self.csv_delimiter),
            });
        }
        Ok(())
    }

    /// Read a JSON config file; missing keys fall back to defaults.
    pub fn from_json_file(path: &Path) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.display().to_string(),
            source,
        })?;
        let config: EngineConfig = serde_json::from_str(&text)?;
        config.validate()?;
        Ok(config)
    }

    pub(crate) fn is_null_token(&self, s: &str) -> bool {
        let s = s.trim();
        self.null_tokens.iter().any(|t| t == s)
    }

    pub(crate) fn is_placeholder_header(&self, name: &str) -> bool {
        let name = name.trim();
        name.is_empty()
            || (!self.placeholder_header_prefix.is_empty()
                && name.starts_with(&self.placeholder_header_prefix))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn default_is_valid() {
        assert!(EngineConfig::default().validate().is_ok());
    }

    #[test]
    fn partial_json_keeps_defaults() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, r#"{{ "max_pie_categories": 6 }}"#).unwrap();
        let config = EngineConfig::from_json_file(file.path()).unwrap();
        assert_eq!(config.max_pie_categories, 6);
        assert_eq!(config.csv_delimiter, ',');
        assert!(config.is_null_token(" NA "));
    }

    #[test]
    fn zero_pie_limit_is_rejected() {
        let config = EngineConfig {
            max_pie_categories: 0,
            ..Default::default()
        };
        assert!(matches!(config.validate(), Err(ConfigError::Invalid { .. })));
    }

    #[test]
    fn placeholder_headers() {
        let config = EngineConfig::default();
        assert!(config.is_placeholder_header("Unnamed: 0"));
        assert!(config.is_placeholder_header("  "));
        assert!(!config.is_placeholder_header("city"));
    }
}
