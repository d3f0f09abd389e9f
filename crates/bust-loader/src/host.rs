//! Script host abstraction.

use bust_core::LoadError;
use url::Url;

/// Callback the loader hands to the host with each element.
pub(crate) type SettleFn = Box<dyn FnOnce(Result<(), LoadError>)>;

/// Load/error handler attached to an injected script.
///
/// The host calls exactly one of `loaded` or `failed` when the element's
/// load or error event fires. Dropping the listener without calling
/// either settles the load as [`LoadError::Abandoned`].
pub struct ScriptListener {
    url: String,
    settle: Option<SettleFn>,
}

impl ScriptListener {
    pub(crate) fn new(url: impl Into<String>, settle: SettleFn) -> Self {
        Self {
            url: url.into(),
            settle: Some(settle),
        }
    }

    /// URL of the script this listener belongs to.
    pub fn url(&self) -> &str {
        &self.url
    }

    /// Report that the script loaded and executed.
    pub fn loaded(mut self) {
        self.fire(Ok(()));
    }

    /// Report that the script failed (network error, 404, script error).
    pub fn failed(mut self, reason: impl Into<String>) {
        let error = LoadError::failure(self.url.clone(), reason);
        self.fire(Err(error));
    }

    fn fire(&mut self, outcome: Result<(), LoadError>) {
        if let Some(settle) = self.settle.take() {
            settle(outcome);
        }
    }
}

impl Drop for ScriptListener {
    fn drop(&mut self) {
        let url = std::mem::take(&mut self.url);
        self.fire(Err(LoadError::Abandoned { url }));
    }
}

impl std::fmt::Debug for ScriptListener {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ScriptListener")
            .field("url", &self.url)
            .finish_non_exhaustive()
    }
}

/// A script element ready for insertion.
///
/// Built the way a document script tag is: attributes and handlers first,
/// source last.
#[derive(Debug)]
pub struct ScriptElement {
    /// Execute after the document has been parsed.
    pub defer: bool,
    /// `type` attribute.
    pub content_type: String,
    /// Load asynchronously.
    pub is_async: bool,
    src: Option<Url>,
    listener: Option<ScriptListener>,
}

impl ScriptElement {
    /// Create an element with no source and no handlers.
    pub fn new() -> Self {
        Self {
            defer: false,
            content_type: String::new(),
            is_async: true,
            src: None,
            listener: None,
        }
    }

    /// Set the `defer` flag.
    pub fn with_defer(mut self, defer: bool) -> Self {
        self.defer = defer;
        self
    }

    /// Set the `type` attribute.
    pub fn with_content_type(mut self, content_type: impl Into<String>) -> Self {
        self.content_type = content_type.into();
        self
    }

    /// Set the `async` flag.
    pub fn with_async(mut self, is_async: bool) -> Self {
        self.is_async = is_async;
        self
    }

    /// Attach the load/error handler.
    pub fn on_settled(mut self, listener: ScriptListener) -> Self {
        self.listener = Some(listener);
        self
    }

    /// Set the source URL.
    pub fn with_src(mut self, src: Url) -> Self {
        self.src = Some(src);
        self
    }

    /// Source URL, if set.
    pub fn src(&self) -> Option<&Url> {
        self.src.as_ref()
    }

    /// Take the handler out, leaving the element without one.
    pub fn take_listener(&mut self) -> Option<ScriptListener> {
        self.listener.take()
    }
}

impl Default for ScriptElement {
    fn default() -> Self {
        Self::new()
    }
}

/// Environment able to run script elements.
///
/// Implementations insert the element so that loading starts, and later
/// settle its listener from the host's own event delivery.
pub trait ScriptHost {
    /// Location relative locators are resolved against.
    fn base_location(&self) -> Result<Url, LoadError>;

    /// Insert the element into the active document.
    fn insert(&self, element: ScriptElement) -> Result<(), LoadError>;
}
