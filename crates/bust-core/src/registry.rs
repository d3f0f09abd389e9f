//! Load-state registry keyed by module name.

use std::collections::HashMap;

/// State of a module in the registry. Absent entries are unloaded.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ModuleState<P> {
    /// A load is in flight; `P` is whatever the loader needs to join it.
    Pending(P),
    /// The module finished loading successfully.
    Loaded,
}

impl<P> ModuleState<P> {
    /// Whether this is the `Loaded` state.
    pub fn is_loaded(&self) -> bool {
        matches!(self, Self::Loaded)
    }
}

/// Record of which modules have loaded or are loading.
///
/// Owned by a single loader instance. `Loaded` entries are never removed;
/// pending entries are cleared when their load fails.
#[derive(Debug)]
pub struct LoadRegistry<P> {
    entries: HashMap<String, ModuleState<P>>,
}

impl<P> LoadRegistry<P> {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self {
            entries: HashMap::new(),
        }
    }

    /// Whether `name` has completed loading.
    pub fn is_loaded(&self, name: &str) -> bool {
        self.entries.get(name).is_some_and(ModuleState::is_loaded)
    }

    /// Mark `name` as loaded, replacing any pending entry.
    pub fn mark_loaded(&mut self, name: &str) {
        self.entries.insert(name.to_string(), ModuleState::Loaded);
    }

    /// The in-flight handle for `name`, if a load is pending.
    pub fn pending(&self, name: &str) -> Option<&P> {
        match self.entries.get(name) {
            Some(ModuleState::Pending(p)) => Some(p),
            _ => None,
        }
    }

    /// Record an in-flight load. Does nothing if `name` is already loaded.
    pub fn mark_pending(&mut self, name: &str, pending: P) {
        if !self.is_loaded(name) {
            self.entries
                .insert(name.to_string(), ModuleState::Pending(pending));
        }
    }

    /// Drop a pending entry so the next load retries. Loaded entries stay.
    pub fn clear_pending(&mut self, name: &str) -> Option<P> {
        match self.entries.remove(name) {
            Some(ModuleState::Pending(p)) => Some(p),
            Some(ModuleState::Loaded) => {
                self.entries.insert(name.to_string(), ModuleState::Loaded);
                None
            }
            None => None,
        }
    }

    /// Current state of `name` (`None` means unloaded).
    pub fn state(&self, name: &str) -> Option<&ModuleState<P>> {
        self.entries.get(name)
    }

    /// Number of tracked modules, pending or loaded.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether nothing has been requested yet.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Names of loaded modules, sorted.
    pub fn loaded_names(&self) -> Vec<String> {
        let mut names: Vec<String> = self
            .entries
            .iter()
            .filter(|(_, state)| state.is_loaded())
            .map(|(name, _)| name.clone())
            .collect();
        names.sort();
        names
    }
}

impl<P> Default for LoadRegistry<P> {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_registry_is_empty() {
        let registry: LoadRegistry<()> = LoadRegistry::new();
        assert!(registry.is_empty());
        assert!(!registry.is_loaded("cart"));
        assert!(registry.state("cart").is_none());
    }

    #[test]
    fn test_mark_loaded() {
        let mut registry: LoadRegistry<()> = LoadRegistry::new();
        registry.mark_loaded("cart");

        assert!(registry.is_loaded("cart"));
        assert!(!registry.is_loaded("checkout"));
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn test_pending_then_loaded() {
        let mut registry = LoadRegistry::new();
        registry.mark_pending("cart", 7u32);

        assert_eq!(registry.pending("cart"), Some(&7));
        assert!(!registry.is_loaded("cart"));

        registry.mark_loaded("cart");
        assert!(registry.pending("cart").is_none());
        assert!(registry.is_loaded("cart"));
    }

    #[test]
    fn test_mark_pending_does_not_downgrade_loaded() {
        let mut registry = LoadRegistry::new();
        registry.mark_loaded("cart");
        registry.mark_pending("cart", 1u32);

        assert!(registry.is_loaded("cart"));
        assert!(registry.pending("cart").is_none());
    }

    #[test]
    fn test_clear_pending() {
        let mut registry = LoadRegistry::new();
        registry.mark_pending("cart", 3u32);

        assert_eq!(registry.clear_pending("cart"), Some(3));
        assert!(registry.state("cart").is_none());
        assert_eq!(registry.clear_pending("cart"), None);
    }

    #[test]
    fn test_clear_pending_keeps_loaded() {
        let mut registry: LoadRegistry<u32> = LoadRegistry::new();
        registry.mark_loaded("cart");

        assert_eq!(registry.clear_pending("cart"), None);
        assert!(registry.is_loaded("cart"));
    }

    #[test]
    fn test_loaded_names_sorted_and_excludes_pending() {
        let mut registry = LoadRegistry::new();
        registry.mark_loaded("search");
        registry.mark_loaded("cart");
        registry.mark_pending("reviews", ());

        assert_eq!(registry.loaded_names(), vec!["cart", "search"]);
        assert_eq!(registry.len(), 3);
    }
}
