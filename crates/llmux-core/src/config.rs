use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::LlmuxError;
use crate::types::Provider;

pub const CONFIG_ENV_VAR: &str = "LLMUX_CONFIG";
pub const DEFAULT_PROVIDER_ENV_VAR: &str = "LLMUX_DEFAULT_PROVIDER";

const DEFAULT_TIMEOUT_MS: u64 = 120_000;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
/// Per-provider adapter settings.
pub struct AdapterSettings {
    /// Executable name or path; defaults to the provider name.
    pub executable: Option<String>,
    pub extra_args: Vec<String>,
    pub timeout_ms: u64,
}

impl Default for AdapterSettings {
    fn default() -> Self {
        Self {
            executable: None,
            extra_args: Vec::new(),
            timeout_ms: DEFAULT_TIMEOUT_MS,
        }
    }
}

impl AdapterSettings {
    pub fn executable_for(&self, provider: Provider) -> String {
        self.executable
            .clone()
            .unwrap_or_else(|| provider.as_str().to_string())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(default)]
/// Workspace configuration: defaults < config file < environment.
pub struct Config {
    pub default_provider: Option<Provider>,
    pub providers: BTreeMap<Provider, AdapterSettings>,
    pub verbose: bool,
}

impl Config {
    /// Settings for one provider, falling back to defaults when the config
    /// file has no section for it.
    pub fn adapter_settings(&self, provider: Provider) -> AdapterSettings {
        self.providers.get(&provider).cloned().unwrap_or_default()
    }

    pub fn default_provider(&self) -> Provider {
        self.default_provider.unwrap_or(Provider::Claude)
    }

    /// Load configuration, merging in declaration order: built-in defaults,
    /// then the config file (explicit path, else `LLMUX_CONFIG`, else the
    /// user config dir), then environment overrides. A missing file is not
    /// an error; a malformed one is.
    pub fn load(explicit_path: Option<&Path>) -> Result<Self, LlmuxError> {
        let path = explicit_path
            .map(Path::to_path_buf)
            .or_else(|| std::env::var_os(CONFIG_ENV_VAR).map(PathBuf::from))
            .or_else(default_config_path);

        let mut config = match path {
            Some(path) if path.is_file() => Self::from_file(&path)?,
            Some(path) if explicit_path.is_some() => {
                return Err(LlmuxError::Config(format!(
                    "config file not found: {}",
                    path.display()
                )));
            }
            _ => Self::default(),
        };

        if let Ok(raw) = std::env::var(DEFAULT_PROVIDER_ENV_VAR) {
            let provider = raw.parse().map_err(LlmuxError::Config)?;
            config.default_provider = Some(provider);
        }

        Ok(config)
    }

    pub fn from_file(path: &Path) -> Result<Self, LlmuxError> {
        let raw = std::fs::read_to_string(path).map_err(|error| {
            LlmuxError::Config(format!("failed to read {}: {error}", path.display()))
        })?;
        toml::from_str(&raw).map_err(|error| {
            LlmuxError::Config(format!("failed to parse {}: {error}", path.display()))
        })
    }
}

fn default_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|dir| dir.join("llmux").join("config.toml"))
}
