//! Conversion settings.
//!
//! Which headers are measures, how the date column announces itself, and
//! which markers mean "drop this column". Defaults match the legacy
//! deployment convention: a Russian `дата` date prefix and `#`/`№` row
//! counters excluded.

use std::path::Path;

use serde::Deserialize;
use thiserror::Error;

/// Implicit column name for a bare (undotted) dimension header.
pub const DEFAULT_DIM_COLUMN: &str = "value";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file: {0}")]
    Io(#[from] std::io::Error),
    #[error("failed to parse config file: {0}")]
    Parse(#[from] toml::de::Error),
}

/// Settings consumed by schema inference. Loadable from TOML; every field
/// has a default.
#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ConvertConfig {
    /// Header names (matched case-insensitively) that carry measures.
    pub fact_columns: Vec<String>,
    /// A header starting with this prefix (case-insensitively) is the date
    /// column; only the first such header wins.
    pub date_prefix: String,
    /// Headers equal to any of these markers are dropped.
    pub excluded_markers: Vec<String>,
}

impl Default for ConvertConfig {
    fn default() -> Self {
        Self {
            fact_columns: Vec::new(),
            date_prefix: "дата".to_string(),
            excluded_markers: vec!["#".to_string(), "№".to_string()],
        }
    }
}

impl ConvertConfig {
    pub fn from_toml_file(path: &Path) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path)?;
        Ok(toml::from_str(&text)?)
    }

    /// Case-insensitive fact-name match against a lowercased header.
    pub fn is_fact(&self, lower_header: &str) -> bool {
        self.fact_columns
            .iter()
            .any(|f| f.to_lowercase() == lower_header)
    }

    pub fn is_excluded(&self, lower_header: &str) -> bool {
        self.excluded_markers
            .iter()
            .any(|m| m.to_lowercase() == lower_header)
    }

    pub fn matches_date_prefix(&self, lower_header: &str) -> bool {
        lower_header.starts_with(&self.date_prefix.to_lowercase())
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_legacy_convention() {
        let cfg = ConvertConfig::default();
        assert_eq!(cfg.date_prefix, "дата");
        assert!(cfg.is_excluded("#"));
        assert!(cfg.is_excluded("№"));
        assert!(cfg.fact_columns.is_empty());
    }

    #[test]
    fn fact_match_is_case_insensitive() {
        let cfg = ConvertConfig {
            fact_columns: vec!["Amount".into()],
            ..Default::default()
        };
        assert!(cfg.is_fact("amount"));
        assert!(!cfg.is_fact("amounts"));
    }

    #[test]
    fn parses_toml() {
        let cfg: ConvertConfig = toml::from_str(
            r#"
            fact_columns = ["amount"]
            date_prefix = "date"
            "#,
        )
        .unwrap();
        assert!(cfg.is_fact("amount"));
        assert!(cfg.matches_date_prefix("date_sale"));
        // Unspecified fields keep their defaults.
        assert!(cfg.is_excluded("#"));
    }
}
