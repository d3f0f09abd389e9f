//! Loader configuration.

use std::fmt;
use std::path::Path;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

/// Configuration for a loader instance.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoaderConfig {
    /// Name the loader is bound under in a global namespace.
    pub global_name: String,
    /// Query parameter carrying the freshness token.
    pub query_param: String,
    /// `type` attribute of injected script elements.
    pub content_type: String,
    /// Whether injected scripts are deferred.
    pub defer: bool,
    /// `async` value used when a load does not set one.
    pub default_async: bool,
    /// Logging configuration.
    pub log: LogConfig,
}

impl Default for LoaderConfig {
    fn default() -> Self {
        Self {
            global_name: "CacheBuster".to_string(),
            query_param: "cacheBuster".to_string(),
            content_type: "text/javascript".to_string(),
            defer: true,
            default_async: true,
            log: LogConfig::default(),
        }
    }
}

impl LoaderConfig {
    /// Load config from a file. `.json` files are parsed as JSON, anything
    /// else as TOML.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;

        if path.extension().is_some_and(|ext| ext == "json") {
            serde_json::from_str(&content)
                .with_context(|| format!("Failed to parse JSON config: {}", path.display()))
        } else {
            Self::from_toml_str(&content)
                .with_context(|| format!("Failed to parse TOML config: {}", path.display()))
        }
    }

    /// Parse config from TOML text.
    pub fn from_toml_str(content: &str) -> Result<Self> {
        Ok(toml::from_str(content)?)
    }

    /// Set the global binding name.
    pub fn with_global_name(mut self, name: impl Into<String>) -> Self {
        self.global_name = name.into();
        self
    }

    /// Set the freshness query parameter.
    pub fn with_query_param(mut self, param: impl Into<String>) -> Self {
        self.query_param = param.into();
        self
    }

    /// Set the default `async` flag.
    pub fn with_default_async(mut self, is_async: bool) -> Self {
        self.default_async = is_async;
        self
    }

    /// Set logging configuration.
    pub fn with_log(mut self, log: LogConfig) -> Self {
        self.log = log;
        self
    }
}

/// Logging configuration.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LogConfig {
    /// Minimum level that is emitted.
    pub level: LogLevel,
    /// Output format.
    pub format: LogFormat,
}

/// Log level for structured logs.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    Trace,
    Debug,
    #[default]
    Info,
    Warn,
    Error,
}

impl fmt::Display for LogLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Trace => write!(f, "TRACE"),
            Self::Debug => write!(f, "DEBUG"),
            Self::Info => write!(f, "INFO"),
            Self::Warn => write!(f, "WARN"),
            Self::Error => write!(f, "ERROR"),
        }
    }
}

/// Output format for logs.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    /// JSON format (for log aggregation).
    #[default]
    Json,
    /// Human-readable format (for development).
    Human,
}
