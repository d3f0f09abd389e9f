//! The cache-busting loader.

use std::cell::{Cell, RefCell};
use std::rc::{Rc, Weak};

use bust_core::{
    Clock, LoadError, LoadObserver, LoadPhase, LoadRegistry, LoaderConfig, LogLevel,
    ModuleIdentity, SystemClock, TokenSource,
};
use bust_observability::LoadLogger;
use futures::channel::oneshot;
use url::Url;

use crate::handle::{LoadFailure, LoadHandle};
use crate::host::{ScriptElement, ScriptHost, ScriptListener};
use crate::pending::{PendingLoad, Waiter};

/// Hook run when a load fails, before the handle sees the rejection.
pub type ErrorHook<C> = Box<dyn FnOnce(&LoadError, Option<&mut C>)>;

/// Per-call load options.
pub struct LoadOptions<C> {
    is_async: Option<bool>,
    on_error: Option<ErrorHook<C>>,
}

impl<C> LoadOptions<C> {
    /// Default options: loader's default `async`, no error hook.
    pub fn new() -> Self {
        Self {
            is_async: None,
            on_error: None,
        }
    }

    /// Set whether the element loads asynchronously.
    pub fn with_async(mut self, is_async: bool) -> Self {
        self.is_async = Some(is_async);
        self
    }

    /// Set the error hook. It receives the binding context, if any.
    pub fn on_error(mut self, hook: impl FnOnce(&LoadError, Option<&mut C>) + 'static) -> Self {
        self.on_error = Some(Box::new(hook));
        self
    }
}

impl<C> Default for LoadOptions<C> {
    fn default() -> Self {
        Self::new()
    }
}

impl<C> std::fmt::Debug for LoadOptions<C> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LoadOptions")
            .field("is_async", &self.is_async)
            .field("on_error", &self.on_error.is_some())
            .finish()
    }
}

struct LoaderInner {
    host: Box<dyn ScriptHost>,
    config: LoaderConfig,
    registry: RefCell<LoadRegistry<PendingLoad>>,
    tokens: TokenSource,
    logger: LoadLogger,
    observers: Vec<Rc<dyn LoadObserver>>,
}

impl LoaderInner {
    fn notify(&self, module: &str, phase: LoadPhase) {
        for observer in &self.observers {
            observer.on_phase(module, &phase);
        }
    }

    /// Record the outcome of an injected script and run its waiters.
    fn finish(&self, name: &str, pending: &PendingLoad, outcome: &Result<(), LoadError>) {
        match outcome {
            Ok(()) => {
                self.registry.borrow_mut().mark_loaded(name);
                self.logger
                    .entry(LogLevel::Info, "script loaded")
                    .module(name)
                    .url(pending.url())
                    .emit();
                self.notify(name, LoadPhase::Loaded);
            }
            Err(error) => {
                {
                    let mut registry = self.registry.borrow_mut();
                    if registry.pending(name).is_some_and(|p| p.ptr_eq(pending)) {
                        registry.clear_pending(name);
                    }
                }
                self.logger
                    .entry(LogLevel::Error, "script failed to load")
                    .module(name)
                    .url(pending.url())
                    .field("error", error.to_string())
                    .emit();
                self.notify(name, LoadPhase::Failed(error.to_string()));
            }
        }
    }
}

fn settle(
    inner: &Weak<LoaderInner>,
    name: &str,
    pending: &PendingLoad,
    outcome: Result<(), LoadError>,
) {
    let Some(waiters) = pending.take_waiters() else {
        return;
    };
    if let Some(inner) = inner.upgrade() {
        inner.finish(name, pending, &outcome);
    }
    // No borrows held: waiters may call back into the loader
    for waiter in waiters {
        waiter(&outcome);
    }
}

/// Holds an outcome the host reports while `insert` is still running.
///
/// A host that rejects the element drops it, which abandons the listener
/// before `insert` returns its own error. The error wins.
#[derive(Default)]
struct InsertGate {
    open: Cell<bool>,
    held: RefCell<Option<Result<(), LoadError>>>,
}

/// Where a `load` call goes after the registry lookup.
enum Route {
    Loaded,
    InFlight(PendingLoad),
    Fresh,
}

/// Builder for a [`Loader`].
pub struct LoaderBuilder {
    host: Box<dyn ScriptHost>,
    config: LoaderConfig,
    tokens: TokenSource,
    logger: Option<LoadLogger>,
    observers: Vec<Rc<dyn LoadObserver>>,
}

impl LoaderBuilder {
    /// Set the configuration.
    pub fn config(mut self, config: LoaderConfig) -> Self {
        self.config = config;
        self
    }

    /// Use a different clock for freshness tokens.
    pub fn clock(mut self, clock: impl Clock + 'static) -> Self {
        self.tokens = TokenSource::new(clock);
        self
    }

    /// Use a specific logger instead of one built from the config.
    pub fn logger(mut self, logger: LoadLogger) -> Self {
        self.logger = Some(logger);
        self
    }

    /// Add a lifecycle observer.
    pub fn observer(mut self, observer: impl LoadObserver + 'static) -> Self {
        self.observers.push(Rc::new(observer));
        self
    }

    /// Build the loader with an empty registry.
    pub fn build(self) -> Loader {
        let logger = self
            .logger
            .unwrap_or_else(|| LoadLogger::from_config(&self.config.log));
        Loader {
            inner: Rc::new(LoaderInner {
                host: self.host,
                config: self.config,
                registry: RefCell::new(LoadRegistry::new()),
                tokens: self.tokens,
                logger,
                observers: self.observers,
            }),
        }
    }
}

/// Script loader that defeats URL-keyed caches.
///
/// Every load that is not deduplicated requests
/// `<locator>?cacheBuster=<epoch-ms>` resolved against the host's base
/// location. Modules that loaded once resolve immediately on later calls.
/// Clones share one instance; the registry belongs to that instance.
#[derive(Clone)]
pub struct Loader {
    inner: Rc<LoaderInner>,
}

impl Loader {
    /// Create a loader with default configuration.
    pub fn new(host: impl ScriptHost + 'static) -> Self {
        Self::builder(host).build()
    }

    /// Create a loader with the given configuration.
    pub fn with_config(host: impl ScriptHost + 'static, config: LoaderConfig) -> Self {
        Self::builder(host).config(config).build()
    }

    /// Start building a loader.
    pub fn builder(host: impl ScriptHost + 'static) -> LoaderBuilder {
        LoaderBuilder {
            host: Box::new(host),
            config: LoaderConfig::default(),
            tokens: TokenSource::new(SystemClock),
            logger: None,
            observers: Vec::new(),
        }
    }

    /// Load a script, unless its module already loaded.
    ///
    /// Never fails synchronously: malformed locators and host errors
    /// come back through the handle like load failures, after `on_error`.
    pub fn load<C: 'static>(
        &self,
        locator: &str,
        options: LoadOptions<C>,
        context: Option<C>,
    ) -> LoadHandle<C> {
        let (tx, rx) = oneshot::channel();
        let LoadOptions { is_async, on_error } = options;

        let waiter: Waiter = Box::new(move |outcome: &Result<(), LoadError>| {
            let mut context = context;
            let result = match outcome {
                Ok(()) => Ok(context),
                Err(error) => {
                    if let Some(hook) = on_error {
                        hook(error, context.as_mut());
                    }
                    Err(LoadFailure {
                        error: error.clone(),
                        context,
                    })
                }
            };
            // Receiver may have been dropped; the load still counts
            let _ = tx.send(result);
        });

        let is_async = is_async.unwrap_or(self.inner.config.default_async);
        self.start(locator, is_async, waiter);
        LoadHandle::new(locator, rx)
    }

    /// Alias of [`Loader::load`].
    pub fn bust<C: 'static>(
        &self,
        locator: &str,
        options: LoadOptions<C>,
        context: Option<C>,
    ) -> LoadHandle<C> {
        self.load(locator, options, context)
    }

    /// `load` with default options and no binding context.
    pub fn load_default(&self, locator: &str) -> LoadHandle<()> {
        self.load(locator, LoadOptions::new(), None)
    }

    fn start(&self, locator: &str, is_async: bool, waiter: Waiter) {
        let inner = &self.inner;
        let identity = ModuleIdentity::parse(locator);
        let well_formed = identity.is_well_formed();
        let name = identity.name;
        inner.notify(&name, LoadPhase::Requested);

        if !well_formed {
            let error = LoadError::malformed(locator, "no module name in final path segment");
            self.reject_early(&name, error, waiter);
            return;
        }

        let route = {
            let registry = inner.registry.borrow();
            if registry.is_loaded(&name) {
                Route::Loaded
            } else if let Some(pending) = registry.pending(&name) {
                Route::InFlight(pending.clone())
            } else {
                Route::Fresh
            }
        };

        match route {
            Route::Loaded => {
                inner
                    .logger
                    .entry(LogLevel::Warn, "module already loaded, skipping injection")
                    .module(&name)
                    .field("locator", locator)
                    .emit();
                inner.notify(&name, LoadPhase::Deduplicated);
                waiter(&Ok(()));
            }
            Route::InFlight(pending) => match pending.attach(waiter) {
                Ok(()) => {
                    inner
                        .logger
                        .entry(LogLevel::Debug, "joining in-flight load")
                        .module(&name)
                        .url(pending.url())
                        .emit();
                    inner.notify(&name, LoadPhase::Attached);
                }
                // Settled between lookup and attach; start over
                Err(waiter) => self.start(locator, is_async, waiter),
            },
            Route::Fresh => self.inject(locator, &name, is_async, waiter),
        }
    }

    fn inject(&self, locator: &str, name: &str, is_async: bool, waiter: Waiter) {
        let inner = &self.inner;
        let url = match self.fresh_url(locator) {
            Ok(url) => url,
            Err(error) => return self.reject_early(name, error, waiter),
        };

        let pending = PendingLoad::new(url.as_str(), waiter);
        inner
            .registry
            .borrow_mut()
            .mark_pending(name, pending.clone());

        let gate = Rc::new(InsertGate::default());
        let listener = {
            let weak = Rc::downgrade(inner);
            let name = name.to_string();
            let pending = pending.clone();
            let gate = gate.clone();
            ScriptListener::new(
                url.as_str(),
                Box::new(move |outcome| {
                    if gate.open.get() {
                        settle(&weak, &name, &pending, outcome);
                    } else {
                        gate.held.replace(Some(outcome));
                    }
                }),
            )
        };

        let element = ScriptElement::new()
            .with_defer(inner.config.defer)
            .with_content_type(inner.config.content_type.clone())
            .with_async(is_async)
            .on_settled(listener)
            .with_src(url.clone());

        let mut entry = inner
            .logger
            .entry(LogLevel::Debug, "injecting script")
            .module(name)
            .url(url.as_str())
            .field_bool("async", is_async);
        if let Some(token) = inner.tokens.last_token() {
            entry = entry.field_u64("token", token.as_millis());
        }
        entry.emit();
        inner.notify(
            name,
            LoadPhase::Injected {
                url: url.to_string(),
            },
        );

        let inserted = inner.host.insert(element);
        gate.open.set(true);
        let outcome = match inserted {
            Err(error) => Some(Err(error)),
            Ok(()) => gate.held.take(),
        };
        if let Some(outcome) = outcome {
            settle(&Rc::downgrade(inner), name, &pending, outcome);
        }
    }

    /// Resolve `locator` against the host base and append a fresh token.
    fn fresh_url(&self, locator: &str) -> Result<Url, LoadError> {
        let base = self.inner.host.base_location()?;
        let mut url = base
            .join(locator)
            .map_err(|e| LoadError::malformed(locator, e.to_string()))?;
        let token = self.inner.tokens.next_token();
        url.query_pairs_mut()
            .append_pair(&self.inner.config.query_param, &token.to_string());
        Ok(url)
    }

    fn reject_early(&self, name: &str, error: LoadError, waiter: Waiter) {
        self.inner
            .logger
            .entry(LogLevel::Error, "load rejected before injection")
            .module(name)
            .field("error", error.to_string())
            .emit();
        self.inner.notify(name, LoadPhase::Failed(error.to_string()));
        waiter(&Err(error));
    }

    /// Whether a module has finished loading.
    pub fn is_loaded(&self, module: &str) -> bool {
        self.inner.registry.borrow().is_loaded(module)
    }

    /// Whether a load of the module is in flight.
    pub fn is_pending(&self, module: &str) -> bool {
        self.inner.registry.borrow().pending(module).is_some()
    }

    /// Names of loaded modules, sorted.
    pub fn loaded_modules(&self) -> Vec<String> {
        self.inner.registry.borrow().loaded_names()
    }

    /// The loader's configuration.
    pub fn config(&self) -> &LoaderConfig {
        &self.inner.config
    }

    /// The loader's logger.
    pub fn logger(&self) -> &LoadLogger {
        &self.inner.logger
    }

    /// Whether two handles refer to the same loader instance.
    pub fn ptr_eq(&self, other: &Loader) -> bool {
        Rc::ptr_eq(&self.inner, &other.inner)
    }
}

impl std::fmt::Debug for Loader {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Loader")
            .field("config", &self.inner.config)
            .field("registry", &self.inner.registry.borrow().len())
            .field("tokens", &self.inner.tokens)
            .finish_non_exhaustive()
    }
}
