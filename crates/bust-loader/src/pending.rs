//! In-flight load shared by every call that joins it.

use std::cell::RefCell;
use std::rc::Rc;

use bust_core::LoadError;

/// Per-call continuation run when the load settles.
pub(crate) type Waiter = Box<dyn FnOnce(&Result<(), LoadError>)>;

struct PendingState {
    url: String,
    waiters: Vec<Waiter>,
    settled: bool,
}

/// One injected script and the calls waiting on it.
#[derive(Clone)]
pub(crate) struct PendingLoad {
    state: Rc<RefCell<PendingState>>,
}

impl PendingLoad {
    /// Start a load with its first waiter.
    pub(crate) fn new(url: impl Into<String>, first: Waiter) -> Self {
        Self {
            state: Rc::new(RefCell::new(PendingState {
                url: url.into(),
                waiters: vec![first],
                settled: false,
            })),
        }
    }

    pub(crate) fn url(&self) -> String {
        self.state.borrow().url.clone()
    }

    /// Add a waiter. Returns it back if the load already settled.
    pub(crate) fn attach(&self, waiter: Waiter) -> Result<(), Waiter> {
        let mut state = self.state.borrow_mut();
        if state.settled {
            return Err(waiter);
        }
        state.waiters.push(waiter);
        Ok(())
    }

    /// Mark settled and hand out the waiters. `None` on the second call.
    pub(crate) fn take_waiters(&self) -> Option<Vec<Waiter>> {
        let mut state = self.state.borrow_mut();
        if state.settled {
            return None;
        }
        state.settled = true;
        Some(std::mem::take(&mut state.waiters))
    }

    pub(crate) fn ptr_eq(&self, other: &Self) -> bool {
        Rc::ptr_eq(&self.state, &other.state)
    }
}

impl std::fmt::Debug for PendingLoad {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let state = self.state.borrow();
        f.debug_struct("PendingLoad")
            .field("url", &state.url)
            .field("waiters", &state.waiters.len())
            .field("settled", &state.settled)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use std::cell::Cell;

    use super::*;

    #[test]
    fn test_settles_once() {
        let calls = Rc::new(Cell::new(0));
        let counter = |calls: &Rc<Cell<u32>>| -> Waiter {
            let calls = calls.clone();
            Box::new(move |_: &Result<(), LoadError>| calls.set(calls.get() + 1))
        };

        let pending = PendingLoad::new("https://shop.test/a.js", counter(&calls));
        assert!(pending.attach(counter(&calls)).is_ok());

        let waiters = pending.take_waiters().unwrap();
        assert_eq!(waiters.len(), 2);
        for waiter in waiters {
            waiter(&Ok(()));
        }
        assert_eq!(calls.get(), 2);

        assert!(pending.take_waiters().is_none());
    }

    #[test]
    fn test_attach_after_settle_is_refused() {
        let noop: Waiter = Box::new(|_: &Result<(), LoadError>| {});
        let pending = PendingLoad::new("https://shop.test/a.js", noop);
        pending.take_waiters();

        assert!(pending.attach(Box::new(|_: &Result<(), LoadError>| {})).is_err());
    }

    #[test]
    fn test_ptr_eq() {
        let a = PendingLoad::new("x", Box::new(|_: &Result<(), LoadError>| {}));
        let b = PendingLoad::new("x", Box::new(|_: &Result<(), LoadError>| {}));
        assert!(a.ptr_eq(&a.clone()));
        assert!(!a.ptr_eq(&b));
        assert_eq!(a.url(), "x");
    }
}
