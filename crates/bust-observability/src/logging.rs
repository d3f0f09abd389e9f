//! Structured logging for load events.

use std::cell::RefCell;
use std::collections::BTreeMap;
use std::rc::Rc;

use bust_core::{LogConfig, LogFormat, LogLevel};
use serde::Serialize;

/// A structured log entry.
#[derive(Debug, Clone, Serialize)]
pub struct LogEntry {
    /// Log level.
    pub level: LogLevel,
    /// Log message.
    pub message: String,
    /// Module name the entry is about.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub module: Option<String>,
    /// Script URL, once one has been built.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    /// Additional structured fields.
    #[serde(flatten)]
    pub fields: BTreeMap<String, serde_json::Value>,
}

impl LogEntry {
    /// Format as JSON string.
    pub fn to_json(&self) -> String {
        serde_json::to_string(self).unwrap_or_else(|_| self.message.clone())
    }

    /// Format as human-readable string.
    pub fn to_human(&self) -> String {
        let mut s = format!("[{}] {}", self.level, self.message);

        if let Some(module) = &self.module {
            s.push_str(&format!(" module={}", module));
        }
        if let Some(url) = &self.url {
            s.push_str(&format!(" url={}", url));
        }

        if !self.fields.is_empty() {
            s.push_str(" | ");
            let fields: Vec<String> = self
                .fields
                .iter()
                .map(|(k, v)| format!("{}={}", k, v))
                .collect();
            s.push_str(&fields.join(" "));
        }

        s
    }

    /// Render in the given format.
    pub fn render(&self, format: LogFormat) -> String {
        match format {
            LogFormat::Json => self.to_json(),
            LogFormat::Human => self.to_human(),
        }
    }
}

/// Structured logger for a loader instance.
///
/// Entries below the minimum level are dropped. Everything else is rendered
/// and handed to `tracing` at the matching level, so the embedding
/// application decides where it ends up.
#[derive(Debug, Clone, Default)]
pub struct LoadLogger {
    min_level: LogLevel,
    format: LogFormat,
    captured: Option<Rc<RefCell<Vec<LogEntry>>>>,
}

impl LoadLogger {
    /// Create a logger at `Info` with JSON output.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a logger from configuration.
    pub fn from_config(config: &LogConfig) -> Self {
        Self::new()
            .with_min_level(config.level)
            .with_format(config.format)
    }

    /// Set minimum log level.
    pub fn with_min_level(mut self, level: LogLevel) -> Self {
        self.min_level = level;
        self
    }

    /// Set output format.
    pub fn with_format(mut self, format: LogFormat) -> Self {
        self.format = format;
        self
    }

    /// Also keep emitted entries in memory. Clones share the buffer.
    pub fn with_capture(mut self) -> Self {
        self.captured = Some(Rc::default());
        self
    }

    /// Entries kept by `with_capture`.
    pub fn captured(&self) -> Vec<LogEntry> {
        self.captured
            .as_ref()
            .map(|c| c.borrow().clone())
            .unwrap_or_default()
    }

    /// Minimum level.
    pub fn min_level(&self) -> LogLevel {
        self.min_level
    }

    /// Log at debug level.
    pub fn debug(&self, message: &str) {
        self.entry(LogLevel::Debug, message).emit();
    }

    /// Log at info level.
    pub fn info(&self, message: &str) {
        self.entry(LogLevel::Info, message).emit();
    }

    /// Log at warn level.
    pub fn warn(&self, message: &str) {
        self.entry(LogLevel::Warn, message).emit();
    }

    /// Log at error level.
    pub fn error(&self, message: &str) {
        self.entry(LogLevel::Error, message).emit();
    }

    /// Start building an entry.
    pub fn entry(&self, level: LogLevel, message: impl Into<String>) -> LogBuilder<'_> {
        LogBuilder::new(self, level, message)
    }

    fn log(&self, entry: LogEntry) {
        if entry.level < self.min_level {
            return;
        }

        let output = entry.render(self.format);
        match entry.level {
            LogLevel::Trace => tracing::trace!(target: "cache_bust", "{}", output),
            LogLevel::Debug => tracing::debug!(target: "cache_bust", "{}", output),
            LogLevel::Info => tracing::info!(target: "cache_bust", "{}", output),
            LogLevel::Warn => tracing::warn!(target: "cache_bust", "{}", output),
            LogLevel::Error => tracing::error!(target: "cache_bust", "{}", output),
        }

        if let Some(captured) = &self.captured {
            captured.borrow_mut().push(entry);
        }
    }
}

/// Builder for log entries with fluent API.
pub struct LogBuilder<'a> {
    logger: &'a LoadLogger,
    entry: LogEntry,
}

impl<'a> LogBuilder<'a> {
    /// Create a new log builder.
    pub fn new(logger: &'a LoadLogger, level: LogLevel, message: impl Into<String>) -> Self {
        Self {
            logger,
            entry: LogEntry {
                level,
                message: message.into(),
                module: None,
                url: None,
                fields: BTreeMap::new(),
            },
        }
    }

    /// Set the module name.
    pub fn module(mut self, module: impl Into<String>) -> Self {
        self.entry.module = Some(module.into());
        self
    }

    /// Set the script URL.
    pub fn url(mut self, url: impl Into<String>) -> Self {
        self.entry.url = Some(url.into());
        self
    }

    /// Add a string field.
    pub fn field(mut self, key: &str, value: impl Into<String>) -> Self {
        self.entry
            .fields
            .insert(key.to_string(), serde_json::json!(value.into()));
        self
    }

    /// Add a boolean field.
    pub fn field_bool(mut self, key: &str, value: bool) -> Self {
        self.entry
            .fields
            .insert(key.to_string(), serde_json::json!(value));
        self
    }

    /// Add an unsigned integer field.
    pub fn field_u64(mut self, key: &str, value: u64) -> Self {
        self.entry
            .fields
            .insert(key.to_string(), serde_json::json!(value));
        self
    }

    /// Emit the log entry.
    pub fn emit(self) {
        self.logger.log(self.entry);
    }
}
