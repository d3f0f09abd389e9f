//! Freshness tokens appended to script URLs.

use std::cell::Cell;
use std::rc::Rc;

use serde::{Deserialize, Serialize};

/// Point-in-time token, in milliseconds since the Unix epoch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct FreshnessToken(u64);

impl FreshnessToken {
    /// Wrap a millisecond timestamp.
    pub fn from_millis(millis: u64) -> Self {
        Self(millis)
    }

    /// Milliseconds since the epoch.
    pub fn as_millis(&self) -> u64 {
        self.0
    }
}

impl std::fmt::Display for FreshnessToken {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Source of wall-clock time.
pub trait Clock {
    /// Current time in milliseconds since the epoch.
    fn now_millis(&self) -> u64;
}

/// Wall clock backed by `chrono`.
///
/// On `wasm32` this reads `Date.now()` through chrono's `wasmbind` feature.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now_millis(&self) -> u64 {
        u64::try_from(chrono::Utc::now().timestamp_millis()).unwrap_or_default()
    }
}

/// Manually driven clock. Clones share the same time.
#[derive(Debug, Clone, Default)]
pub struct FixedClock {
    millis: Rc<Cell<u64>>,
}

impl FixedClock {
    /// Create a clock stopped at `millis`.
    pub fn new(millis: u64) -> Self {
        Self {
            millis: Rc::new(Cell::new(millis)),
        }
    }

    /// Move the clock to `millis`.
    pub fn set(&self, millis: u64) {
        self.millis.set(millis);
    }

    /// Move the clock forward.
    pub fn advance(&self, millis: u64) {
        self.millis.set(self.millis.get() + millis);
    }
}

impl Clock for FixedClock {
    fn now_millis(&self) -> u64 {
        self.millis.get()
    }
}

/// Issues strictly increasing freshness tokens.
///
/// Two calls in the same millisecond (or after the clock steps backwards)
/// still get distinct tokens: each token is `max(now, last + 1)`.
pub struct TokenSource {
    clock: Box<dyn Clock>,
    last: Cell<Option<u64>>,
}

impl TokenSource {
    /// Create a token source over the given clock.
    pub fn new(clock: impl Clock + 'static) -> Self {
        Self {
            clock: Box::new(clock),
            last: Cell::new(None),
        }
    }

    /// Issue the next token.
    pub fn next_token(&self) -> FreshnessToken {
        let now = self.clock.now_millis();
        let millis = match self.last.get() {
            Some(last) if now <= last => last + 1,
            _ => now,
        };
        self.last.set(Some(millis));
        FreshnessToken(millis)
    }

    /// The most recently issued token.
    pub fn last_token(&self) -> Option<FreshnessToken> {
        self.last.get().map(FreshnessToken)
    }
}

impl Default for TokenSource {
    fn default() -> Self {
        Self::new(SystemClock)
    }
}

impl std::fmt::Debug for TokenSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TokenSource")
            .field("last", &self.last.get())
            .finish_non_exhaustive()
    }
}
