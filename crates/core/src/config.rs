use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use secrecy::SecretString;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::history::RetentionPolicy;

/// Effective configuration: defaults, patched by `overseer.toml`, patched by
/// `OVERSEER_*` environment variables, patched by programmatic overrides.
#[derive(Clone, Debug)]
pub struct AppConfig {
    pub llm: LlmConfig,
    pub report: ReportConfig,
    pub history: HistoryConfig,
    pub logging: LoggingConfig,
}

#[derive(Clone, Debug)]
pub struct LlmConfig {
    pub base_url: String,
    pub model: String,
    pub api_key: Option<SecretString>,
    pub timeout_secs: u64,
}

#[derive(Clone, Debug, Default)]
pub struct ReportConfig {
    pub path: Option<PathBuf>,
}

#[derive(Clone, Debug, Default)]
pub struct HistoryConfig {
    pub max_records: Option<usize>,
}

impl HistoryConfig {
    pub fn retention(&self) -> RetentionPolicy {
        match self.max_records {
            Some(cap) => RetentionPolicy::CapRecords(cap),
            None => RetentionPolicy::Unbounded,
        }
    }
}

#[derive(Clone, Debug)]
pub struct LoggingConfig {
    pub level: String,
    pub format: LogFormat,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LogFormat {
    Compact,
    Pretty,
    Json,
}

#[derive(Clone, Debug, Default)]
pub struct ConfigOverrides {
    pub base_url: Option<String>,
    pub model: Option<String>,
    pub api_key: Option<String>,
    pub report_path: Option<PathBuf>,
    pub max_records: Option<usize>,
    pub log_level: Option<String>,
    pub log_format: Option<LogFormat>,
}

#[derive(Clone, Debug, Default)]
pub struct LoadOptions {
    pub config_path: Option<PathBuf>,
    pub require_file: bool,
    pub overrides: ConfigOverrides,
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("could not read config file `{path}`: {source}")]
    ReadFile { path: PathBuf, source: std::io::Error },
    #[error("could not parse config file `{path}`: {source}")]
    ParseFile { path: PathBuf, source: toml::de::Error },
    #[error("required config file was not found: `{0}`")]
    MissingConfigFile(PathBuf),
    #[error("invalid environment override for `{key}`: `{value}`")]
    InvalidEnvOverride { key: String, value: String },
    #[error("configuration validation failed: {0}")]
    Validation(String),
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            llm: LlmConfig {
                base_url: "https://withmartian.com/api/openai/v1".to_owned(),
                model: "router".to_owned(),
                api_key: None,
                timeout_secs: 30,
            },
            report: ReportConfig::default(),
            history: HistoryConfig::default(),
            logging: LoggingConfig { level: "info".to_owned(), format: LogFormat::Compact },
        }
    }
}

impl std::str::FromStr for LogFormat {
    type Err = ConfigError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "compact" => Ok(Self::Compact),
            "pretty" => Ok(Self::Pretty),
            "json" => Ok(Self::Json),
            other => Err(ConfigError::Validation(format!(
                "unsupported log format `{other}` (expected compact|pretty|json)"
            ))),
        }
    }
}

#[derive(Debug, Default, Deserialize)]
struct ConfigPatch {
    llm: Option<LlmPatch>,
    report: Option<ReportPatch>,
    history: Option<HistoryPatch>,
    logging: Option<LoggingPatch>,
}

#[derive(Debug, Default, Deserialize)]
struct LlmPatch {
    base_url: Option<String>,
    model: Option<String>,
    api_key: Option<String>,
    timeout_secs: Option<u64>,
}

#[derive(Debug, Default, Deserialize)]
struct ReportPatch {
    path: Option<PathBuf>,
}

#[derive(Debug, Default, Deserialize)]
struct HistoryPatch {
    max_records: Option<usize>,
}

#[derive(Debug, Default, Deserialize)]
struct LoggingPatch {
    level: Option<String>,
    format: Option<LogFormat>,
}

impl AppConfig {
    pub fn load(options: LoadOptions) -> Result<Self, ConfigError> {
        let mut config = Self::default();
        let maybe_path = resolve_config_path(options.config_path.as_deref());

        if let Some(path) = maybe_path {
            let patch = read_patch(&path)?;
            config.apply_patch(patch);
        } else if options.require_file {
            let expected = options.config_path.unwrap_or_else(|| PathBuf::from("overseer.toml"));
            return Err(ConfigError::MissingConfigFile(expected));
        }

        config.apply_env_overrides()?;
        config.apply_overrides(options.overrides);
        config.validate()?;

        Ok(config)
    }

    fn apply_patch(&mut self, patch: ConfigPatch) {
        if let Some(llm) = patch.llm {
            if let Some(base_url) = llm.base_url {
                self.llm.base_url = base_url;
            }
            if let Some(model) = llm.model {
                self.llm.model = model;
            }
            if let Some(api_key_value) = llm.api_key {
                self.llm.api_key = Some(api_key_value.into());
            }
            if let Some(timeout_secs) = llm.timeout_secs {
                self.llm.timeout_secs = timeout_secs;
            }
        }
        if let Some(report) = patch.report {
            if let Some(path) = report.path {
                self.report.path = Some(path);
            }
        }
        if let Some(history) = patch.history {
            if let Some(max_records) = history.max_records {
                self.history.max_records = Some(max_records);
            }
        }
        if let Some(logging) = patch.logging {
            if let Some(level) = logging.level {
                self.logging.level = level;
            }
            if let Some(format) = logging.format {
                self.logging.format = format;
            }
        }
    }

    fn apply_env_overrides(&mut self) -> Result<(), ConfigError> {
        if let Ok(base_url) = env::var("OVERSEER_LLM_BASE_URL") {
            self.llm.base_url = base_url;
        }
        if let Ok(model) = env::var("OVERSEER_LLM_MODEL") {
            self.llm.model = model;
        }
        if let Ok(api_key_value) = env::var("OVERSEER_LLM_API_KEY") {
            self.llm.api_key = Some(api_key_value.into());
        }
        if let Ok(timeout) = env::var("OVERSEER_LLM_TIMEOUT_SECS") {
            self.llm.timeout_secs = timeout.parse().map_err(|_| {
                ConfigError::InvalidEnvOverride {
                    key: "OVERSEER_LLM_TIMEOUT_SECS".to_owned(),
                    value: timeout.clone(),
                }
            })?;
        }
        if let Ok(path) = env::var("OVERSEER_REPORT_PATH") {
            self.report.path = Some(PathBuf::from(path));
        }
        if let Ok(max_records) = env::var("OVERSEER_HISTORY_MAX_RECORDS") {
            self.history.max_records = Some(max_records.parse().map_err(|_| {
                ConfigError::InvalidEnvOverride {
                    key: "OVERSEER_HISTORY_MAX_RECORDS".to_owned(),
                    value: max_records.clone(),
                }
            })?);
        }
        if let Ok(level) = env::var("OVERSEER_LOG_LEVEL") {
            self.logging.level = level;
        }
        if let Ok(format) = env::var("OVERSEER_LOG_FORMAT") {
            self.logging.format = format.parse().map_err(|_| {
                ConfigError::InvalidEnvOverride {
                    key: "OVERSEER_LOG_FORMAT".to_owned(),
                    value: format.clone(),
                }
            })?;
        }
        Ok(())
    }

    fn apply_overrides(&mut self, overrides: ConfigOverrides) {
        if let Some(base_url) = overrides.base_url {
            self.llm.base_url = base_url;
        }
        if let Some(model) = overrides.model {
            self.llm.model = model;
        }
        if let Some(api_key_value) = overrides.api_key {
            self.llm.api_key = Some(api_key_value.into());
        }
        if let Some(path) = overrides.report_path {
            self.report.path = Some(path);
        }
        if let Some(max_records) = overrides.max_records {
            self.history.max_records = Some(max_records);
        }
        if let Some(level) = overrides.log_level {
            self.logging.level = level;
        }
        if let Some(format) = overrides.log_format {
            self.logging.format = format;
        }
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if self.llm.base_url.trim().is_empty() {
            return Err(ConfigError::Validation("llm.base_url must not be empty".to_owned()));
        }
        if self.llm.model.trim().is_empty() {
            return Err(ConfigError::Validation("llm.model must not be empty".to_owned()));
        }
        if self.llm.timeout_secs == 0 {
            return Err(ConfigError::Validation("llm.timeout_secs must be positive".to_owned()));
        }
        if self.history.max_records == Some(0) {
            return Err(ConfigError::Validation(
                "history.max_records must be positive when set".to_owned(),
            ));
        }
        Ok(())
    }
}

fn resolve_config_path(requested: Option<&Path>) -> Option<PathBuf> {
    match requested {
        Some(path) => path.exists().then(|| path.to_path_buf()),
        None => {
            let default = PathBuf::from("overseer.toml");
            default.exists().then_some(default)
        }
    }
}

fn read_patch(path: &Path) -> Result<ConfigPatch, ConfigError> {
    let raw = fs::read_to_string(path)
        .map_err(|source| ConfigError::ReadFile { path: path.to_path_buf(), source })?;
    toml::from_str(&raw)
        .map_err(|source| ConfigError::ParseFile { path: path.to_path_buf(), source })
}
