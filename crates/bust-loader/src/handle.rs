//! Awaitable result of a `load` call.

use std::future::Future;
use std::pin::Pin;
use std::task::{Context, Poll};

use bust_core::LoadError;
use futures::channel::oneshot;

/// Outcome of a load: the binding context back on success, or the failure
/// (which also carries the context).
pub type LoadResult<C> = Result<Option<C>, LoadFailure<C>>;

/// Rejected load.
#[derive(Debug, thiserror::Error)]
#[error("{error}")]
pub struct LoadFailure<C> {
    /// Why the load failed.
    pub error: LoadError,
    /// Binding context passed to `load`, handed back to the caller.
    pub context: Option<C>,
}

/// Future for a single `load` call.
///
/// Settlement happens when the host fires the element's event, whether or
/// not the handle is polled; the handle only observes it.
#[must_use = "a LoadHandle does nothing unless awaited or inspected"]
pub struct LoadHandle<C> {
    locator: String,
    rx: oneshot::Receiver<LoadResult<C>>,
}

impl<C> LoadHandle<C> {
    pub(crate) fn new(locator: impl Into<String>, rx: oneshot::Receiver<LoadResult<C>>) -> Self {
        Self {
            locator: locator.into(),
            rx,
        }
    }

    /// The locator passed to `load`.
    pub fn locator(&self) -> &str {
        &self.locator
    }

    /// Take the result if the load has already settled.
    pub fn try_take(&mut self) -> Option<LoadResult<C>> {
        match self.rx.try_recv() {
            Ok(result) => result,
            Err(oneshot::Canceled) => Some(Err(self.abandoned())),
        }
    }

    fn abandoned(&self) -> LoadFailure<C> {
        LoadFailure {
            error: LoadError::Abandoned {
                url: self.locator.clone(),
            },
            context: None,
        }
    }
}

impl<C> Future for LoadHandle<C> {
    type Output = LoadResult<C>;

    fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        match Pin::new(&mut self.rx).poll(cx) {
            Poll::Ready(Ok(result)) => Poll::Ready(result),
            Poll::Ready(Err(oneshot::Canceled)) => Poll::Ready(Err(self.abandoned())),
            Poll::Pending => Poll::Pending,
        }
    }
}

impl<C> std::fmt::Debug for LoadHandle<C> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LoadHandle")
            .field("locator", &self.locator)
            .finish_non_exhaustive()
    }
}
