use geoguess_core::{Category, EngineParams};
use serde::Deserialize;
use std::fs::File;
use std::io::BufReader;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::Level;

const RUN_ID_ALLOWED: &str = "abcdefghijklmnopqrstuvwxyzABCDEFGHIJKLMNOPQRSTUVWXYZ0123456789._-";

/// Root benchmark configuration loaded from YAML.
#[derive(Debug, Clone, Deserialize, PartialEq)]
pub struct BenchConfig {
    pub run_id: String,
    pub data: DataConfig,
    #[serde(default)]
    pub games: GamesConfig,
    #[serde(default)]
    pub engine: EngineParams,
    pub outputs: OutputsConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

impl BenchConfig {
    /// Load configuration from a YAML file on disk.
    pub fn from_path(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let path_buf = path.to_path_buf();
        let file = File::open(path).map_err(|source| ConfigError::Read {
            source,
            path: path_buf.clone(),
        })?;
        let reader = BufReader::new(file);
        let mut cfg: BenchConfig =
            serde_yaml::from_reader(reader).map_err(|source| ConfigError::Parse {
                source,
                path: path_buf.clone(),
            })?;
        cfg.validate().map_err(|source| ConfigError::Invalid {
            path: path_buf,
            source,
        })?;
        Ok(cfg)
    }

    /// Validate the configuration without performing I/O.
    pub fn validate(&mut self) -> Result<(), ValidationError> {
        validate_run_id(&self.run_id)?;
        self.data.validate()?;
        self.games.validate()?;
        self.outputs.validate(&self.run_id)?;
        self.logging.normalize();
        self.engine
            .validate()
            .map_err(|err| ValidationError::InvalidField {
                field: "engine".to_string(),
                message: err.to_string(),
            })?;
        Ok(())
    }

    /// Resolve output templates (e.g., `{run_id}` placeholders) into concrete paths.
    pub fn resolved_outputs(&self) -> ResolvedOutputs {
        ResolvedOutputs {
            jsonl: resolve_template(&self.run_id, &self.outputs.jsonl),
            summary_md: resolve_template(&self.run_id, &self.outputs.summary_md),
        }
    }
}

/// Where the catalog comes from.
#[derive(Debug, Clone, Deserialize, PartialEq)]
pub struct DataConfig {
    pub dir: PathBuf,
    pub category: String,
}

impl DataConfig {
    fn validate(&self) -> Result<(), ValidationError> {
        if self.dir.as_os_str().is_empty() {
            return Err(ValidationError::InvalidField {
                field: "data.dir".to_string(),
                message: "path must not be empty".to_string(),
            });
        }

        self.category
            .parse::<Category>()
            .map_err(|err| ValidationError::InvalidField {
                field: "data.category".to_string(),
                message: err.to_string(),
            })?;
        Ok(())
    }

    pub fn category(&self) -> Option<Category> {
        self.category.parse().ok()
    }
}

/// Game sampling configuration block.
#[derive(Debug, Clone, Deserialize, PartialEq, Default)]
pub struct GamesConfig {
    #[serde(default)]
    pub seed: Option<u64>,
    /// Play only the first `limit` catalog items as targets.
    #[serde(default)]
    pub limit: Option<usize>,
    /// Chance that a decisive answer is flipped.
    #[serde(default)]
    pub answer_noise: f64,
    /// Chance that the answerer says "don't know" instead.
    #[serde(default)]
    pub dontknow_rate: f64,
}

impl GamesConfig {
    fn validate(&self) -> Result<(), ValidationError> {
        if self.limit == Some(0) {
            return Err(ValidationError::InvalidField {
                field: "games.limit".to_string(),
                message: "limit must be greater than zero".to_string(),
            });
        }

        for (label, value) in [
            ("games.answer_noise", self.answer_noise),
            ("games.dontknow_rate", self.dontknow_rate),
        ] {
            if !(0.0..=1.0).contains(&value) {
                return Err(ValidationError::InvalidField {
                    field: label.to_string(),
                    message: "rate must be between 0 and 1".to_string(),
                });
            }
        }

        Ok(())
    }

    pub fn is_perfect(&self) -> bool {
        self.answer_noise == 0.0 && self.dontknow_rate == 0.0
    }
}

/// Output artifact configuration.
#[derive(Debug, Clone, Deserialize, PartialEq)]
pub struct OutputsConfig {
    pub jsonl: String,
    pub summary_md: String,
}

impl OutputsConfig {
    fn validate(&self, run_id: &str) -> Result<(), ValidationError> {
        for (label, value) in [
            ("outputs.jsonl", &self.jsonl),
            ("outputs.summary_md", &self.summary_md),
        ] {
            if value.trim().is_empty() {
                return Err(ValidationError::InvalidField {
                    field: label.to_string(),
                    message: "path must not be empty".to_string(),
                });
            }

            let resolved = resolve_template(run_id, value);
            if resolved.components().count() == 0 {
                return Err(ValidationError::InvalidField {
                    field: label.to_string(),
                    message: "resolved path is invalid".to_string(),
                });
            }
        }
        Ok(())
    }
}

/// Logging configuration defaults to disabled structured logs.
#[derive(Debug, Clone, Deserialize, PartialEq)]
pub struct LoggingConfig {
    #[serde(default)]
    pub enable_structured: bool,
    #[serde(default = "default_tracing_level")]
    pub tracing_level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            enable_structured: false,
            tracing_level: default_tracing_level(),
        }
    }
}

impl LoggingConfig {
    fn normalize(&mut self) {
        if self.tracing_level.trim().is_empty() {
            self.tracing_level = default_tracing_level();
        }
    }

    pub fn level(&self) -> Option<Level> {
        match self.tracing_level.to_ascii_lowercase().as_str() {
            "trace" => Some(Level::TRACE),
            "debug" => Some(Level::DEBUG),
            "info" => Some(Level::INFO),
            "warn" | "warning" => Some(Level::WARN),
            "error" => Some(Level::ERROR),
            _ => None,
        }
    }
}

fn default_tracing_level() -> String {
    "info".to_string()
}

fn validate_run_id(run_id: &str) -> Result<(), ValidationError> {
    if run_id.trim().is_empty() {
        return Err(ValidationError::InvalidField {
            field: "run_id".to_string(),
            message: "run_id must not be empty".to_string(),
        });
    }

    if !run_id.chars().all(|c| RUN_ID_ALLOWED.contains(c)) {
        return Err(ValidationError::InvalidField {
            field: "run_id".to_string(),
            message: "run_id may only contain alphanumeric characters, '.', '_' or '-'".to_string(),
        });
    }

    Ok(())
}

fn resolve_template(run_id: &str, template: &str) -> PathBuf {
    PathBuf::from(template.replace("{run_id}", run_id))
}

/// Fully resolved output paths.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedOutputs {
    pub jsonl: PathBuf,
    pub summary_md: PathBuf,
}

/// Errors surfaced when loading configuration files.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config {path:?}: {source}")]
    Read {
        #[source]
        source: std::io::Error,
        path: PathBuf,
    },
    #[error("failed to parse config {path:?}: {source}")]
    Parse {
        #[source]
        source: serde_yaml::Error,
        path: PathBuf,
    },
    #[error("invalid configuration in {path:?}: {source}")]
    Invalid {
        path: PathBuf,
        source: ValidationError,
    },
}

/// Validation failures captured with contextual metadata.
#[derive(Debug, Error)]
pub enum ValidationError {
    #[error("{field}: {message}")]
    InvalidField { field: String, message: String },
}

#[cfg(test)]
mod tests {
    use super::*;

    const BASIC_YAML: &str = r#"
run_id: "countries_smoke"
data:
  dir: "data"
  category: "countries"
games:
  seed: 123
  limit: 10
  answer_noise: 0.05
outputs:
  jsonl: "bench/out/{run_id}/games.jsonl"
  summary_md: "bench/out/{run_id}/summary.md"
logging:
  enable_structured: true
  tracing_level: "debug"
"#;

    #[test]
    fn loads_and_validates_basic_config() {
        let mut cfg: BenchConfig = serde_yaml::from_str(BASIC_YAML).expect("parse yaml");
        cfg.validate().expect("validate");

        assert_eq!(cfg.data.category(), Some(Category::Country));
        assert_eq!(cfg.games.limit, Some(10));
        assert_eq!(cfg.games.dontknow_rate, 0.0);
        assert!(!cfg.games.is_perfect());
        assert_eq!(cfg.engine, EngineParams::default());
        assert_eq!(cfg.logging.level(), Some(Level::DEBUG));

        let outputs = cfg.resolved_outputs();
        assert_eq!(
            outputs.jsonl,
            PathBuf::from("bench/out/countries_smoke/games.jsonl")
        );
        assert_eq!(
            outputs.summary_md,
            PathBuf::from("bench/out/countries_smoke/summary.md")
        );
    }

    #[test]
    fn rejects_unknown_category() {
        let yaml = BASIC_YAML.replace("countries\"", "planets\"");
        let mut cfg: BenchConfig = serde_yaml::from_str(&yaml).expect("parse yaml");
        let err = cfg.validate().unwrap_err();
        assert!(err.to_string().starts_with("data.category"));
    }

    #[test]
    fn rejects_out_of_range_noise() {
        let yaml = BASIC_YAML.replace("answer_noise: 0.05", "answer_noise: 1.5");
        let mut cfg: BenchConfig = serde_yaml::from_str(&yaml).expect("parse yaml");
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn rejects_bad_run_id() {
        let yaml = BASIC_YAML.replace("countries_smoke", "bad id!");
        let mut cfg: BenchConfig = serde_yaml::from_str(&yaml).expect("parse yaml");
        assert!(cfg.validate().is_err());
    }
}
