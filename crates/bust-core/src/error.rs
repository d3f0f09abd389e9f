//! Errors surfaced through load rejections.

/// Error type for load operations.
///
/// `Clone` because one failed injection settles every call attached to it.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum LoadError {
    #[error("Malformed locator '{locator}': {reason}")]
    MalformedLocator { locator: String, reason: String },

    #[error("Failed to load {url}: {reason}")]
    LoadFailure { url: String, reason: String },

    #[error("Host error: {0}")]
    Host(String),

    #[error("Load of {url} abandoned by host")]
    Abandoned { url: String },
}

impl LoadError {
    /// Build a `MalformedLocator` error.
    pub fn malformed(locator: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::MalformedLocator {
            locator: locator.into(),
            reason: reason.into(),
        }
    }

    /// Build a `LoadFailure` error.
    pub fn failure(url: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::LoadFailure {
            url: url.into(),
            reason: reason.into(),
        }
    }

    /// The URL involved, when one was constructed.
    pub fn url(&self) -> Option<&str> {
        match self {
            Self::LoadFailure { url, .. } | Self::Abandoned { url } => Some(url),
            Self::MalformedLocator { .. } | Self::Host(_) => None,
        }
    }
}
