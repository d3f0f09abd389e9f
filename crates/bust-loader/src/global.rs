//! Shared global namespace and `no_conflict` detachment.

use std::any::Any;
use std::cell::RefCell;
use std::collections::HashMap;
use std::rc::Rc;

use crate::loader::Loader;

/// Value bound in a [`GlobalNamespace`].
#[derive(Clone)]
pub enum GlobalValue {
    /// A loader instance.
    Loader(Loader),
    /// Anything else third-party code put there.
    Foreign(Rc<dyn Any>),
}

impl GlobalValue {
    /// Wrap an arbitrary value.
    pub fn foreign<T: Any>(value: T) -> Self {
        Self::Foreign(Rc::new(value))
    }

    /// The loader, if this slot holds one.
    pub fn as_loader(&self) -> Option<&Loader> {
        match self {
            Self::Loader(loader) => Some(loader),
            Self::Foreign(_) => None,
        }
    }

    /// Downcast a foreign value.
    pub fn downcast_ref<T: Any>(&self) -> Option<&T> {
        match self {
            Self::Foreign(value) => value.downcast_ref(),
            Self::Loader(_) => None,
        }
    }
}

impl std::fmt::Debug for GlobalValue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Loader(loader) => f.debug_tuple("Loader").field(loader).finish(),
            Self::Foreign(_) => f.write_str("Foreign(..)"),
        }
    }
}

/// Named bindings shared by everything running in one host. Clones share
/// the same slots.
#[derive(Debug, Clone, Default)]
pub struct GlobalNamespace {
    slots: Rc<RefCell<HashMap<String, GlobalValue>>>,
}

impl GlobalNamespace {
    /// Create an empty namespace.
    pub fn new() -> Self {
        Self::default()
    }

    /// Bind `value` under `name`, returning what was there before.
    pub fn bind(&self, name: impl Into<String>, value: GlobalValue) -> Option<GlobalValue> {
        self.slots.borrow_mut().insert(name.into(), value)
    }

    /// Current value under `name`.
    pub fn get(&self, name: &str) -> Option<GlobalValue> {
        self.slots.borrow().get(name).cloned()
    }

    /// Remove the binding under `name`.
    pub fn remove(&self, name: &str) -> Option<GlobalValue> {
        self.slots.borrow_mut().remove(name)
    }

    /// Whether anything is bound under `name`.
    pub fn contains(&self, name: &str) -> bool {
        self.slots.borrow().contains_key(name)
    }
}

impl Loader {
    /// Bind this loader under its configured global name.
    pub fn attach(&self, namespace: &GlobalNamespace) -> Option<GlobalValue> {
        namespace.bind(
            self.config().global_name.clone(),
            GlobalValue::Loader(self.clone()),
        )
    }

    /// Remove the global binding if it still points at this loader, and
    /// return the loader either way so the caller can keep it locally.
    pub fn no_conflict(&self, namespace: &GlobalNamespace) -> Loader {
        let name = &self.config().global_name;
        let bound_here = namespace
            .get(name)
            .and_then(|value| value.as_loader().map(|l| l.ptr_eq(self)))
            .unwrap_or(false);

        if bound_here {
            namespace.remove(name);
        } else {
            self.logger()
                .entry(bust_core::LogLevel::Debug, "global slot reassigned, leaving it alone")
                .field("global", name.as_str())
                .emit();
        }

        self.clone()
    }
}
