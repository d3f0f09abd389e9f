//! Per-load lifecycle tracking.

use std::cell::RefCell;
use std::rc::Rc;

/// Lifecycle phases of a single `load` call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LoadPhase {
    /// `load` was called for the module.
    Requested,
    /// The module was already loaded; no element was injected.
    Deduplicated,
    /// Another load of the same module was in flight; this call joined it.
    Attached,
    /// A script element was inserted with the given URL.
    Injected { url: String },
    /// The host reported a successful load.
    Loaded,
    /// The load was rejected.
    Failed(String),
}

impl LoadPhase {
    /// Whether this phase settles the call.
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Deduplicated | Self::Loaded | Self::Failed(_))
    }
}

impl std::fmt::Display for LoadPhase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Requested => write!(f, "requested"),
            Self::Deduplicated => write!(f, "deduplicated"),
            Self::Attached => write!(f, "attached"),
            Self::Injected { url } => write!(f, "injected {}", url),
            Self::Loaded => write!(f, "loaded"),
            Self::Failed(reason) => write!(f, "failed: {}", reason),
        }
    }
}

/// Observer trait for load lifecycle events.
pub trait LoadObserver {
    /// Called when a module passes through a phase.
    fn on_phase(&self, module: &str, phase: &LoadPhase);
}

/// Observer that keeps every event. Clones share the same record.
#[derive(Debug, Clone, Default)]
pub struct RecordingObserver {
    events: Rc<RefCell<Vec<(String, LoadPhase)>>>,
}

impl RecordingObserver {
    /// Create an empty recorder.
    pub fn new() -> Self {
        Self::default()
    }

    /// All recorded `(module, phase)` pairs in order.
    pub fn events(&self) -> Vec<(String, LoadPhase)> {
        self.events.borrow().clone()
    }

    /// Phases recorded for one module.
    pub fn phases_for(&self, module: &str) -> Vec<LoadPhase> {
        self.events
            .borrow()
            .iter()
            .filter(|(m, _)| m == module)
            .map(|(_, p)| p.clone())
            .collect()
    }

    /// Number of injections recorded across all modules.
    pub fn injection_count(&self) -> usize {
        self.events
            .borrow()
            .iter()
            .filter(|(_, p)| matches!(p, LoadPhase::Injected { .. }))
            .count()
    }
}

impl LoadObserver for RecordingObserver {
    fn on_phase(&self, module: &str, phase: &LoadPhase) {
        self.events
            .borrow_mut()
            .push((module.to_string(), phase.clone()));
    }
}
