//! Runtime configuration for the task API client.
//!
//! The base URL is never compiled in; it comes from the environment, a TOML
//! file, or the caller.

use std::env::VarError;
use std::path::Path;

use serde::Deserialize;
use url::Url;

use crate::error::ConfigError;

pub const BASE_URL_ENV_VAR: &str = "TASKS_API_BASE_URL";
pub const DEFAULT_BASE_URL: &str = "http://localhost:3000/api";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientConfig {
    base_url: Url,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct ConfigFile {
    base_url: Option<String>,
}

impl ClientConfig {
    pub fn new(base_url: &str) -> Result<Self, ConfigError> {
        let mut url = Url::parse(base_url).map_err(|source| ConfigError::InvalidUrl {
            url: base_url.to_string(),
            source,
        })?;

        if !matches!(url.scheme(), "http" | "https") || url.cannot_be_a_base() {
            return Err(ConfigError::UnsupportedScheme(url.scheme().to_string()));
        }

        let trimmed = url.path().trim_end_matches('/').to_string();
        url.set_path(&trimmed);

        Ok(Self { base_url: url })
    }

    /// Reads `TASKS_API_BASE_URL`, falling back to the local development API
    /// when it is unset.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_env_value(std::env::var(BASE_URL_ENV_VAR))
    }

    fn from_env_value(value: Result<String, VarError>) -> Result<Self, ConfigError> {
        match value {
            Ok(base_url) => Self::new(&base_url),
            Err(VarError::NotPresent) => Self::new(DEFAULT_BASE_URL),
            Err(source @ VarError::NotUnicode(_)) => Err(ConfigError::Env {
                var: BASE_URL_ENV_VAR,
                source,
            }),
        }
    }

    pub fn from_toml_str(contents: &str) -> Result<Self, ConfigError> {
        let file: ConfigFile = toml::from_str(contents)?;
        Self::new(file.base_url.as_deref().unwrap_or(DEFAULT_BASE_URL))
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let contents = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml_str(&contents)
    }

    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    /// Appends percent-encoded path segments to the base URL.
    pub fn endpoint(&self, segments: &[&str]) -> Url {
        let mut url = self.base_url.clone();
        if let Ok(mut path) = url.path_segments_mut() {
            path.pop_if_empty().extend(segments);
        }
        url
    }
}
