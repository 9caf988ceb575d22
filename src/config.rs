use serde::Deserialize;
use std::fs;
use std::path::{Path, PathBuf};

use crate::error::{PipelineError, Result};
use crate::pipeline::ingestion::QuarterSelection;

pub const DEFAULT_CONFIG_PATH: &str = "pipeline.toml";

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct Config {
    pub paths: PathsConfig,
    pub run: RunConfig,
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct PathsConfig {
    /// Root of the quarter-keyed tree produced by the extraction collaborator
    pub extracted_dir: PathBuf,
    pub registry_file: PathBuf,
    pub output_dir: PathBuf,
}

impl Default for PathsConfig {
    fn default() -> Self {
        Self {
            extracted_dir: PathBuf::from("data/extracted"),
            registry_file: PathBuf::from("data/raw/Relatorio_cadop.csv"),
            output_dir: PathBuf::from("data/output"),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct RunConfig {
    /// Explicit quarter labels such as `2025_1T`; when empty the latest ones are used
    pub quarters: Vec<String>,
    pub latest_quarters: usize,
}

impl Default for RunConfig {
    fn default() -> Self {
        Self {
            quarters: Vec::new(),
            latest_quarters: 3,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    pub log_dir: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            log_dir: "logs".to_string(),
        }
    }
}

impl Config {
    /// Load from a TOML file; a missing file yields the defaults.
    pub fn load(config_path: &Path) -> Result<Self> {
        if !config_path.exists() {
            return Ok(Self::default());
        }

        let config_content = fs::read_to_string(config_path).map_err(|e| {
            PipelineError::Config(format!(
                "Failed to read config file '{}': {}",
                config_path.display(),
                e
            ))
        })?;

        Self::from_toml(&config_content)
    }

    pub fn from_toml(content: &str) -> Result<Self> {
        toml::from_str(content)
            .map_err(|e| PipelineError::Config(format!("Malformed configuration: {}", e)))
    }

    /// Apply `ANS_*` environment overrides on top of the file values.
    pub fn apply_env_overrides(&mut self) -> Result<()> {
        if let Ok(dir) = std::env::var("ANS_EXTRACTED_DIR") {
            self.paths.extracted_dir = PathBuf::from(dir);
        }
        if let Ok(file) = std::env::var("ANS_REGISTRY_FILE") {
            self.paths.registry_file = PathBuf::from(file);
        }
        if let Ok(dir) = std::env::var("ANS_OUTPUT_DIR") {
            self.paths.output_dir = PathBuf::from(dir);
        }
        if let Ok(latest) = std::env::var("ANS_LATEST_QUARTERS") {
            self.run.latest_quarters = latest.trim().parse().map_err(|_| {
                PipelineError::InvalidValue {
                    field: "ANS_LATEST_QUARTERS".to_string(),
                    value: latest.clone(),
                }
            })?;
        }
        Ok(())
    }

    pub fn validate(&self) -> Result<()> {
        if self.run.quarters.is_empty() && self.run.latest_quarters == 0 {
            return Err(PipelineError::Config(
                "either run.quarters or a non-zero run.latest_quarters is required".to_string(),
            ));
        }
        Ok(())
    }

    /// Quarter selection for a run: explicit labels win over `latest_quarters`.
    pub fn selection(&self) -> QuarterSelection {
        if self.run.quarters.is_empty() {
            QuarterSelection::Latest(self.run.latest_quarters)
        } else {
            QuarterSelection::Labels(self.run.quarters.clone())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_file_yields_defaults() {
        let config = Config::load(Path::new("does/not/exist.toml")).unwrap();
        assert_eq!(config.run.latest_quarters, 3);
        assert_eq!(config.paths.output_dir, PathBuf::from("data/output"));
    }

    #[test]
    fn test_partial_toml_keeps_other_defaults() {
        let config = Config::from_toml(
            r#"
            [paths]
            output_dir = "/tmp/out"

            [run]
            quarters = ["2025_1T", "2025_2T"]
            "#,
        )
        .unwrap();

        assert_eq!(config.paths.output_dir, PathBuf::from("/tmp/out"));
        assert_eq!(config.paths.extracted_dir, PathBuf::from("data/extracted"));
        assert_eq!(config.run.quarters, vec!["2025_1T", "2025_2T"]);
        assert_eq!(config.run.latest_quarters, 3);
    }

    #[test]
    fn test_malformed_toml_is_config_error() {
        let result = Config::from_toml("[paths\noutput_dir = 1");
        assert!(matches!(result, Err(PipelineError::Config(_))));
    }

    #[test]
    fn test_selection_prefers_explicit_labels() {
        let mut config = Config::default();
        assert_eq!(config.selection(), QuarterSelection::Latest(3));

        config.run.quarters = vec!["2024_4T".to_string()];
        assert_eq!(
            config.selection(),
            QuarterSelection::Labels(vec!["2024_4T".to_string()])
        );
    }

    #[test]
    fn test_validate_rejects_empty_selection() {
        let mut config = Config::default();
        config.run.latest_quarters = 0;
        assert!(config.validate().is_err());
    }
}
