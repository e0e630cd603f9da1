//! `~/.consent/config.yaml`: endpoint, identifier source, prompt text and
//! retry tuning.
//!
//! Every field is optional; a missing file yields [`Config::default`].
//!
//! Same API pattern as the state store: `load_at(home)` / `save_at(home, …)`
//! take an explicit home (tests use `TempDir`); callers resolve it with
//! [`paths::home`](crate::paths::home).

use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{config_io_err, ConfigError};
use crate::paths;

pub const DEFAULT_ENDPOINT: &str = "https://www.mocky.io/v2/5e14e8122d00002b00167430";
pub const DEFAULT_MACHINE_ID_PATH: &str = "/etc/machine-id";
pub const DEFAULT_APP_NAME: &str = "this application";
pub const DEFAULT_PROMPT_TITLE: &str = "Your privacy";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// URL the consent record is POSTed to.
    pub endpoint: String,
    pub timeout_secs: u64,
    /// Fixed device identifier; when unset the machine id is used.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub device_id: Option<String>,
    pub machine_id_path: PathBuf,
    pub app_name: String,
    pub prompt: PromptConfig,
    pub retry: RetryConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            endpoint: DEFAULT_ENDPOINT.to_string(),
            timeout_secs: 10,
            device_id: None,
            machine_id_path: PathBuf::from(DEFAULT_MACHINE_ID_PATH),
            app_name: DEFAULT_APP_NAME.to_string(),
            prompt: PromptConfig::default(),
            retry: RetryConfig::default(),
        }
    }
}

impl Config {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs.max(1))
    }

    /// Prompt title, falling back to the built-in default.
    pub fn prompt_title(&self) -> String {
        self.prompt
            .title
            .clone()
            .unwrap_or_else(|| DEFAULT_PROMPT_TITLE.to_string())
    }

    /// Prompt message, falling back to one that names `app_name`.
    pub fn prompt_message(&self) -> String {
        self.prompt.message.clone().unwrap_or_else(|| {
            format!(
                "{} would like your consent to process data associated with this device. \
                 You can change your choice at any time.",
                self.app_name
            )
        })
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        validate_endpoint(&self.endpoint)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PromptConfig {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

/// Background reconciliation tuning.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RetryConfig {
    pub max_attempts: u32,
    pub initial_backoff_ms: u64,
    pub max_backoff_ms: u64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            initial_backoff_ms: 500,
            max_backoff_ms: 30_000,
        }
    }
}

pub fn validate_endpoint(endpoint: &str) -> Result<(), ConfigError> {
    if endpoint.starts_with("http://") || endpoint.starts_with("https://") {
        Ok(())
    } else {
        Err(ConfigError::InvalidEndpoint(endpoint.to_string()))
    }
}

// ---------------------------------------------------------------------------
// Load / save
// ---------------------------------------------------------------------------

/// Load `<home>/.consent/config.yaml`, or defaults if it does not exist.
///
/// Returns `ConfigError::Parse` (with path + line context) if malformed YAML.
pub fn load_at(home: &Path) -> Result<Config, ConfigError> {
    let path = paths::config_path(home);
    let contents = match std::fs::read_to_string(&path) {
        Ok(contents) => contents,
        Err(err) if err.kind() == ErrorKind::NotFound => return Ok(Config::default()),
        Err(err) => return Err(config_io_err(&path, err)),
    };
    if contents.trim().is_empty() {
        return Ok(Config::default());
    }
    let config: Config =
        serde_yaml::from_str(&contents).map_err(|source| ConfigError::Parse { path, source })?;
    config.validate()?;
    Ok(config)
}

/// Atomically write `<home>/.consent/config.yaml`.
///
/// Refuses to replace an existing file unless `force` is set.
pub fn save_at(home: &Path, config: &Config, force: bool) -> Result<PathBuf, ConfigError> {
    config.validate()?;
    let path = paths::config_path(home);
    if path.exists() && !force {
        return Err(ConfigError::AlreadyExists { path });
    }
    let dir = paths::consent_root(home);
    std::fs::create_dir_all(&dir).map_err(|e| config_io_err(&dir, e))?;

    let yaml = serde_yaml::to_string(config)?;
    let tmp = path.with_extension("yaml.tmp");
    std::fs::write(&tmp, yaml).map_err(|e| config_io_err(&tmp, e))?;
    std::fs::rename(&tmp, &path).map_err(|e| config_io_err(&path, e))?;
    Ok(path)
}
