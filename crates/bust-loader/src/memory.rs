//! In-memory script host.

use std::cell::RefCell;
use std::rc::Rc;

use bust_core::LoadError;
use url::Url;

use crate::host::{ScriptElement, ScriptHost, ScriptListener};

/// Attributes of an element inserted into a [`MemoryHost`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScriptRecord {
    /// Requested URL.
    pub src: Url,
    /// `defer` flag.
    pub defer: bool,
    /// `type` attribute.
    pub content_type: String,
    /// `async` flag.
    pub is_async: bool,
}

struct Inserted {
    record: ScriptRecord,
    listener: Option<ScriptListener>,
}

#[derive(Default)]
struct MemoryState {
    inserted: Vec<Inserted>,
    reject_inserts: Option<String>,
}

/// Script host that records insertions and settles them on request.
///
/// Stands in for a document in tests and in hosts that fetch scripts
/// through some other channel. Clones share the same state, so keep one
/// clone to drive the host after handing another to a loader.
#[derive(Clone)]
pub struct MemoryHost {
    base: Url,
    state: Rc<RefCell<MemoryState>>,
}

impl MemoryHost {
    /// Create a host with the given base location.
    pub fn new(base: &str) -> Result<Self, LoadError> {
        let base = Url::parse(base).map_err(|e| LoadError::Host(format!("invalid base: {}", e)))?;
        Ok(Self {
            base,
            state: Rc::default(),
        })
    }

    /// Make every following insert fail with `reason`.
    pub fn reject_inserts(&self, reason: impl Into<String>) {
        self.state.borrow_mut().reject_inserts = Some(reason.into());
    }

    /// Accept inserts again.
    pub fn accept_inserts(&self) {
        self.state.borrow_mut().reject_inserts = None;
    }

    /// Everything inserted so far, in order.
    pub fn inserted(&self) -> Vec<ScriptRecord> {
        self.state
            .borrow()
            .inserted
            .iter()
            .map(|i| i.record.clone())
            .collect()
    }

    /// Number of inserted elements.
    pub fn insert_count(&self) -> usize {
        self.state.borrow().inserted.len()
    }

    /// Number of inserted elements whose event has not fired.
    pub fn unsettled_count(&self) -> usize {
        self.state
            .borrow()
            .inserted
            .iter()
            .filter(|i| i.listener.is_some())
            .count()
    }

    /// Fire the load event of element `index`. False if there is no such
    /// element or it already settled.
    pub fn settle_loaded(&self, index: usize) -> bool {
        match self.take_listener(index) {
            Some(listener) => {
                listener.loaded();
                true
            }
            None => false,
        }
    }

    /// Fire the error event of element `index`.
    pub fn settle_failed(&self, index: usize, reason: impl Into<String>) -> bool {
        match self.take_listener(index) {
            Some(listener) => {
                listener.failed(reason);
                true
            }
            None => false,
        }
    }

    /// Remove element `index` without firing either event. Its load
    /// settles as abandoned.
    pub fn discard(&self, index: usize) -> bool {
        self.take_listener(index).is_some()
    }

    /// Fire the load event of the most recent element.
    pub fn settle_last_loaded(&self) -> bool {
        match self.insert_count() {
            0 => false,
            n => self.settle_loaded(n - 1),
        }
    }

    // Listener is taken out before firing so callbacks can insert again
    fn take_listener(&self, index: usize) -> Option<ScriptListener> {
        self.state
            .borrow_mut()
            .inserted
            .get_mut(index)
            .and_then(|i| i.listener.take())
    }
}

impl ScriptHost for MemoryHost {
    fn base_location(&self) -> Result<Url, LoadError> {
        Ok(self.base.clone())
    }

    fn insert(&self, mut element: ScriptElement) -> Result<(), LoadError> {
        if let Some(reason) = &self.state.borrow().reject_inserts {
            return Err(LoadError::Host(reason.clone()));
        }
        let src = element
            .src()
            .cloned()
            .ok_or_else(|| LoadError::Host("script element has no src".to_string()))?;
        let listener = element.take_listener();

        self.state.borrow_mut().inserted.push(Inserted {
            record: ScriptRecord {
                src,
                defer: element.defer,
                content_type: element.content_type,
                is_async: element.is_async,
            },
            listener,
        });
        Ok(())
    }
}

impl std::fmt::Debug for MemoryHost {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MemoryHost")
            .field("base", &self.base.as_str())
            .field("inserted", &self.insert_count())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_invalid_base() {
        assert!(matches!(
            MemoryHost::new("not a url"),
            Err(LoadError::Host(_))
        ));
    }

    #[test]
    fn test_insert_without_src_is_rejected() {
        let host = MemoryHost::new("https://shop.test/").unwrap();
        let err = host.insert(ScriptElement::new()).unwrap_err();
        assert_eq!(err, LoadError::Host("script element has no src".into()));
        assert_eq!(host.insert_count(), 0);
    }

    #[test]
    fn test_records_attributes() {
        let host = MemoryHost::new("https://shop.test/").unwrap();
        let src = Url::parse("https://shop.test/a.js?cacheBuster=1").unwrap();
        host.insert(
            ScriptElement::new()
                .with_defer(true)
                .with_content_type("module")
                .with_async(false)
                .with_src(src.clone()),
        )
        .unwrap();

        assert_eq!(
            host.inserted(),
            vec![ScriptRecord {
                src,
                defer: true,
                content_type: "module".into(),
                is_async: false,
            }]
        );
        // No listener attached, nothing to settle
        assert!(!host.settle_loaded(0));
        assert!(!host.settle_loaded(5));
    }

    #[test]
    fn test_reject_inserts() {
        let host = MemoryHost::new("https://shop.test/").unwrap();
        host.reject_inserts("document detached");

        let src = Url::parse("https://shop.test/a.js").unwrap();
        let err = host
            .insert(ScriptElement::new().with_src(src.clone()))
            .unwrap_err();
        assert_eq!(err, LoadError::Host("document detached".into()));

        host.accept_inserts();
        assert!(host.insert(ScriptElement::new().with_src(src)).is_ok());
    }
}
