//! Configuration types for cassette engines

use serde::{Deserialize, Serialize};

use crate::error::{CassetteError, Result};
use crate::proxy::{CacheMode, ReprMode};

/// Main configuration, used to build an [`Engine`](crate::proxy::Engine)
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CassetteConfig {
    /// Cache behaviour
    #[serde(default)]
    pub cache: CacheConfig,

    /// How proxies present themselves
    #[serde(default)]
    pub presentation: PresentationConfig,

    /// Snapshot document output
    #[serde(default)]
    pub document: DocumentConfig,
}

/// Cache configuration
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CacheConfig {
    /// Initial cache mode
    #[serde(default)]
    pub mode: CacheMode,
}

/// Presentation configuration
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PresentationConfig {
    /// Initial repr mode
    #[serde(default)]
    pub mode: ReprMode,
}

/// Document configuration
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DocumentConfig {
    /// Pretty-print serialized documents
    #[serde(default)]
    pub pretty: bool,
}

/// Builder for [`CassetteConfig`]
#[derive(Debug, Default)]
pub struct CassetteConfigBuilder {
    config: CassetteConfig,
}

impl CassetteConfigBuilder {
    /// Create a builder with default settings
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the cache mode
    pub fn cache_mode(mut self, mode: CacheMode) -> Self {
        self.config.cache.mode = mode;
        self
    }

    /// Set the repr mode
    pub fn repr_mode(mut self, mode: ReprMode) -> Self {
        self.config.presentation.mode = mode;
        self
    }

    /// Pretty-print documents
    pub fn pretty(mut self, pretty: bool) -> Self {
        self.config.document.pretty = pretty;
        self
    }

    /// Build the configuration
    pub fn build(self) -> CassetteConfig {
        self.config
    }
}

impl CassetteConfig {
    /// Start building a configuration
    pub fn builder() -> CassetteConfigBuilder {
        CassetteConfigBuilder::new()
    }

    /// Load configuration from file and environment variables.
    ///
    /// Loads in this order:
    /// 1. Default configuration
    /// 2. Configuration file (`cassette.toml` in the working directory)
    /// 3. Environment variable overrides (`CASSETTE_CACHE_MODE=replay_only`, ...)
    /// 4. File named by `CASSETTE_CONFIG_PATH`, if set
    ///
    /// # Errors
    ///
    /// Returns an error if a configuration file or variable holds invalid values.
    pub fn load() -> Result<Self> {
        use figment::{
            Figment,
            providers::{Env, Format, Serialized, Toml},
        };

        let mut figment = Figment::from(Serialized::defaults(CassetteConfig::default()))
            .merge(Toml::file("cassette.toml"))
            .merge(Env::prefixed("CASSETTE_").ignore(&["CONFIG_PATH"]).split("_"));

        if let Ok(path) = std::env::var("CASSETTE_CONFIG_PATH") {
            figment = figment.merge(Toml::file(path));
        }

        figment.extract().map_err(|e| {
            CassetteError::Configuration(format!("Failed to load configuration: {}", e))
        })
    }

    /// Load configuration from a specific file path.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or parsed.
    pub fn from_file(path: impl AsRef<std::path::Path>) -> Result<Self> {
        use figment::{
            Figment,
            providers::{Format, Serialized, Toml},
        };

        let path = path.as_ref();
        if !path.exists() {
            return Err(CassetteError::Configuration(format!(
                "Configuration file not found: {}",
                path.display()
            )));
        }

        Figment::from(Serialized::defaults(CassetteConfig::default()))
            .merge(Toml::file(path))
            .extract()
            .map_err(|e| {
                CassetteError::Configuration(format!("Failed to load configuration file: {}", e))
            })
    }
}
