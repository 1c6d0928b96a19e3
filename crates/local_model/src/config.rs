//! Configuration for local model consumers

use crate::errors::{LocalModelError, Result};
use crate::predictor::PredictionPolicy;
use serde::{Deserialize, Serialize};
use std::path::Path;
use tracing::{info, warn};

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LocalModelConfig {
    /// Default policy applied to predictions
    pub prediction: PredictionPolicy,
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Pretty,
    Json,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// `EnvFilter` directive, e.g. `info` or `sylva_local_model=debug`
    pub level: String,
    pub format: LogFormat,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: LogFormat::Pretty,
        }
    }
}

impl LocalModelConfig {
    pub fn from_toml_str(content: &str) -> Result<Self> {
        toml::from_str(content)
            .map_err(|e| LocalModelError::Config(format!("Failed to parse config: {e}")))
    }

    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(path.as_ref())?;
        Self::from_toml_str(&content)
    }

    pub fn save_to_file<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let content = toml::to_string_pretty(self)
            .map_err(|e| LocalModelError::Config(format!("Failed to serialize config: {e}")))?;
        std::fs::write(path.as_ref(), content)?;
        info!("Configuration saved to: {}", path.as_ref().display());
        Ok(())
    }

    /// Apply `SYLVA_*` environment variables. Returns the keys applied.
    pub fn apply_env_overrides(&mut self) -> Vec<&'static str> {
        self.apply_overrides(|key| std::env::var(key).ok())
    }

    /// Apply overrides from an arbitrary lookup. Unparseable values are
    /// logged and skipped.
    pub fn apply_overrides<F>(&mut self, lookup: F) -> Vec<&'static str>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut applied = Vec::new();

        if let Some(val) = lookup("SYLVA_MAX_DEPTH") {
            match val.parse() {
                Ok(depth) => {
                    self.prediction.max_depth = Some(depth);
                    applied.push("prediction.max_depth");
                }
                Err(_) => warn!("Ignoring invalid SYLVA_MAX_DEPTH={}", val),
            }
        }

        if let Some(val) = lookup("SYLVA_MIN_INSTANCES") {
            match val.parse() {
                Ok(min) => {
                    self.prediction.min_instances = Some(min);
                    applied.push("prediction.min_instances");
                }
                Err(_) => warn!("Ignoring invalid SYLVA_MIN_INSTANCES={}", val),
            }
        }

        if let Some(val) = lookup("SYLVA_BY_NAME") {
            match val.parse() {
                Ok(by_name) => {
                    self.prediction.by_name = by_name;
                    applied.push("prediction.by_name");
                }
                Err(_) => warn!("Ignoring invalid SYLVA_BY_NAME={}", val),
            }
        }

        if let Some(val) = lookup("SYLVA_LOG_LEVEL") {
            self.logging.level = val;
            applied.push("logging.level");
        }

        if let Some(val) = lookup("SYLVA_LOG_FORMAT") {
            match val.as_str() {
                "json" => {
                    self.logging.format = LogFormat::Json;
                    applied.push("logging.format");
                }
                "pretty" => {
                    self.logging.format = LogFormat::Pretty;
                    applied.push("logging.format");
                }
                _ => warn!("Ignoring invalid SYLVA_LOG_FORMAT={}", val),
            }
        }

        applied
    }

    /// Non-fatal configuration problems.
    pub fn validate(&self) -> Vec<String> {
        let mut warnings = Vec::new();

        if self.prediction.max_depth == Some(0) {
            warnings.push("max_depth is 0, every prediction will use the root node".to_string());
        }
        if self.prediction.min_instances == Some(0) {
            warnings.push("min_instances is 0, which has no effect".to_string());
        }
        if self.logging.level.trim().is_empty() {
            warnings.push("logging level is empty".to_string());
        }

        if warnings.is_empty() {
            info!("Configuration validation passed");
        } else {
            warn!("Configuration validation warnings: {:?}", warnings);
        }
        warnings
    }
}
