use std::{
    fs,
    path::{Path, PathBuf},
    time::Duration,
};

use serde::{Deserialize, Serialize};
use tapfeed_utils::{
    path::{resolve_path, xdg_cache_home, xdg_config_home, xdg_data_home},
    time::parse_seconds,
};
use tracing::{debug, info};
use url::Url;

use crate::error::{ConfigError, Result};

/// The API domain every mirror falls back to.
pub const DEFAULT_API_DOMAIN: &str = "https://formulae.brew.sh/api";

const DEFAULT_AUTO_UPDATE_SECS: u64 = 450;
const DEFAULT_RETRIES: u32 = 3;

/// A number of seconds, written either as an integer or as a duration string.
#[derive(Clone, Debug, PartialEq, Eq, Deserialize, Serialize)]
#[serde(untagged)]
pub enum Seconds {
    Number(u64),
    Text(String),
}

impl Seconds {
    fn parse(&self) -> Option<u64> {
        match self {
            Seconds::Number(secs) => Some(*secs),
            Seconds::Text(text) => parse_seconds(text),
        }
    }
}

/// Application's configuration
#[derive(Clone, Debug, Default, Deserialize, Serialize)]
pub struct Config {
    /// Base URL of the metadata API.
    /// Default: https://formulae.brew.sh/api
    pub api_domain: Option<String>,

    /// Root of the local cache. API files live under `<cache_path>/api`.
    /// Default: $XDG_CACHE_HOME/tapfeed
    pub cache_path: Option<String>,

    /// Seconds after which a cached API file is refreshed by auto-updating commands.
    /// Default: 450
    pub api_auto_update_secs: Option<Seconds>,

    /// Transport retry count, also the ceiling for re-downloading corrupt files.
    /// Default: 3
    pub retries: Option<u32>,

    /// Never refresh cached API files from auto-updating commands.
    pub no_auto_update: Option<bool>,

    /// Refresh from auto-updating commands even if `no_auto_update` is set.
    pub auto_update_force: Option<bool>,

    /// Skip certificate verification because this system has no usable certificate store.
    pub insecure_download: Option<bool>,

    /// PEM file holding the public key that signed API payloads are verified against.
    /// Default: $XDG_DATA_HOME/tapfeed/homebrew-1.pem
    pub public_key_path: Option<String>,

    /// Directory whose ownership decides whether a root process may write the cache.
    /// Default: the cache path
    pub prefix_path: Option<String>,

    pub user_agent: Option<String>,

    /// Overall request timeout in seconds.
    pub timeout_secs: Option<u64>,

    /// Proxy URL, e.g. `http://proxy.local:3128`.
    pub proxy: Option<String>,
}

/// Location of the configuration file, `$TAPFEED_CONFIG` or `$XDG_CONFIG_HOME/tapfeed/config.toml`.
pub fn config_path() -> PathBuf {
    match std::env::var("TAPFEED_CONFIG") {
        Ok(path_str) => PathBuf::from(path_str),
        Err(_) => xdg_config_home().join("tapfeed").join("config.toml"),
    }
}

/// Reads a boolean switch from the environment.
///
/// Any non-empty value other than `0`, `false` or `no` turns the switch on.
fn env_flag(name: &str) -> Option<bool> {
    std::env::var(name).ok().map(|value| {
        !matches!(
            value.trim().to_ascii_lowercase().as_str(),
            "" | "0" | "false" | "no"
        )
    })
}

impl Config {
    pub fn default_config() -> Self {
        Self {
            api_domain: Some(DEFAULT_API_DOMAIN.to_string()),
            api_auto_update_secs: Some(Seconds::Number(DEFAULT_AUTO_UPDATE_SECS)),
            retries: Some(DEFAULT_RETRIES),
            no_auto_update: Some(false),
            auto_update_force: Some(false),
            insecure_download: Some(false),
            ..Self::default()
        }
    }

    /// Creates a new configuration by loading it from the configuration file.
    /// If the configuration file is not found, it uses the default configuration.
    pub fn new() -> Result<Self> {
        Self::load_from(config_path())
    }

    pub fn load_from<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();

        let mut config = match fs::read_to_string(path) {
            Ok(content) => {
                debug!("Loading configuration from {}", path.display());
                toml::from_str(&content)?
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Self::default_config(),
            Err(err) => return Err(ConfigError::IoError(err)),
        };

        config.resolve()?;

        Ok(config)
    }

    /// Fills in defaults and validates the values that would otherwise fail late.
    pub fn resolve(&mut self) -> Result<()> {
        self.api_domain
            .get_or_insert_with(|| DEFAULT_API_DOMAIN.to_string());
        self.api_auto_update_secs
            .get_or_insert(Seconds::Number(DEFAULT_AUTO_UPDATE_SECS));
        self.retries.get_or_insert(DEFAULT_RETRIES);
        self.no_auto_update.get_or_insert(false);
        self.auto_update_force.get_or_insert(false);
        self.insecure_download.get_or_insert(false);

        let domain = self.get_api_domain();
        Url::parse(&domain).map_err(|source| ConfigError::InvalidDomain { domain, source })?;

        if let Some(secs) = &self.api_auto_update_secs {
            if secs.parse().is_none() {
                return Err(ConfigError::InvalidValue {
                    key: "api_auto_update_secs",
                    value: format!("{secs:?}"),
                });
            }
        }

        Ok(())
    }

    pub fn get_api_domain(&self) -> String {
        if let Ok(domain) = std::env::var("TAPFEED_API_DOMAIN") {
            if !domain.trim().is_empty() {
                return domain.trim_end_matches('/').to_string();
            }
        }
        self.api_domain
            .as_deref()
            .unwrap_or(DEFAULT_API_DOMAIN)
            .trim_end_matches('/')
            .to_string()
    }

    pub fn get_cache_path(&self) -> Result<PathBuf> {
        if let Ok(env_path) = std::env::var("TAPFEED_CACHE") {
            return Ok(resolve_path(&env_path)?);
        }
        if let Some(cache_path) = &self.cache_path {
            return Ok(resolve_path(cache_path)?);
        }
        Ok(xdg_cache_home().join("tapfeed"))
    }

    /// Directory holding one cache file per API endpoint.
    pub fn get_api_cache_path(&self) -> Result<PathBuf> {
        Ok(self.get_cache_path()?.join("api"))
    }

    /// Directory holding source trees downloaded from the API, laid out as `<org>/<repo>/...`.
    pub fn get_api_source_cache_path(&self) -> Result<PathBuf> {
        Ok(self.get_cache_path()?.join("api-source"))
    }

    pub fn get_prefix_path(&self) -> Result<PathBuf> {
        match &self.prefix_path {
            Some(prefix) => Ok(resolve_path(prefix)?),
            None => self.get_cache_path(),
        }
    }

    pub fn get_public_key_path(&self) -> Result<PathBuf> {
        if let Ok(env_path) = std::env::var("TAPFEED_PUBLIC_KEY") {
            return Ok(resolve_path(&env_path)?);
        }
        if let Some(key_path) = &self.public_key_path {
            return Ok(resolve_path(key_path)?);
        }
        Ok(xdg_data_home().join("tapfeed").join("homebrew-1.pem"))
    }

    /// The default staleness window for cached API files.
    pub fn get_api_auto_update_secs(&self) -> Result<u64> {
        if let Ok(value) = std::env::var("TAPFEED_API_AUTO_UPDATE_SECS") {
            return parse_seconds(&value).ok_or(ConfigError::InvalidValue {
                key: "TAPFEED_API_AUTO_UPDATE_SECS",
                value,
            });
        }
        match &self.api_auto_update_secs {
            Some(secs) => {
                secs.parse().ok_or_else(|| {
                    ConfigError::InvalidValue {
                        key: "api_auto_update_secs",
                        value: format!("{secs:?}"),
                    }
                })
            }
            None => Ok(DEFAULT_AUTO_UPDATE_SECS),
        }
    }

    pub fn get_retries(&self) -> u32 {
        std::env::var("TAPFEED_RETRIES")
            .ok()
            .and_then(|value| value.trim().parse().ok())
            .or(self.retries)
            .unwrap_or(DEFAULT_RETRIES)
    }

    /// Whether auto-updating commands are told not to refresh, after applying the force override.
    pub fn auto_update_disabled(&self) -> bool {
        let disabled = env_flag("TAPFEED_NO_AUTO_UPDATE")
            .or(self.no_auto_update)
            .unwrap_or(false);
        let forced = env_flag("TAPFEED_AUTO_UPDATE_FORCE")
            .or(self.auto_update_force)
            .unwrap_or(false);
        disabled && !forced
    }

    pub fn insecure_download(&self) -> bool {
        env_flag("TAPFEED_INSECURE_DOWNLOAD")
            .or(self.insecure_download)
            .unwrap_or(false)
    }

    pub fn get_timeout(&self) -> Option<Duration> {
        self.timeout_secs.map(Duration::from_secs)
    }

    pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let path = path.as_ref();
        let serialized = toml::to_string_pretty(self)?;
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(path, serialized)?;
        info!("Configuration saved to {}", path.display());
        Ok(())
    }
}
