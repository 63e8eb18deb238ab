//! Context implementation for request-scoped data and cancellation
//!
//! A Context is passed as the first argument to every provider and resource
//! callback. It carries the cancellation signal, an optional deadline and a
//! small set of typed values (one per type) that interceptors use to hand data
//! to resource code, e.g. the tags being applied to a resource.

use std::any::{Any, TypeId};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::watch;
use tokio::time;

type Values = HashMap<TypeId, Arc<dyn Any + Send + Sync>>;

/// Context carries request-scoped values like cancellation signals, timeouts, and metadata
///
/// Clones share the cancellation signal and deadline. Values are immutable:
/// `with_value` derives a new context and never changes the one it came from.
#[derive(Clone)]
pub struct Context {
    inner: Arc<ContextInner>,
    values: Arc<Values>,
}

struct ContextInner {
    deadline: Option<Instant>,
    done: watch::Receiver<bool>,
    done_tx: watch::Sender<bool>,
}

impl Context {
    pub fn new() -> Self {
        Self::from_parts(None, Arc::new(Values::new()))
    }

    fn from_parts(deadline: Option<Instant>, values: Arc<Values>) -> Self {
        let (done_tx, done_rx) = watch::channel(false);

        Self {
            inner: Arc::new(ContextInner {
                deadline,
                done: done_rx,
                done_tx,
            }),
            values,
        }
    }

    /// Derives a child context that is cancelled when the timeout elapses or
    /// when this context is cancelled, whichever comes first. Values present
    /// on this context are visible in the child.
    ///
    /// Must be called from within a tokio runtime.
    pub fn with_timeout(&self, timeout: Duration) -> Self {
        let mut deadline = Instant::now() + timeout;
        if let Some(parent) = self.inner.deadline {
            deadline = deadline.min(parent);
        }

        let child = Self::from_parts(Some(deadline), self.values.clone());
        if self.is_cancelled() {
            child.cancel();
            return child;
        }

        let parent = self.clone();
        let done_tx = child.inner.done_tx.clone();
        tokio::spawn(async move {
            tokio::select! {
                _ = time::sleep_until(deadline.into()) => {}
                _ = parent.cancelled() => {}
                // Every receiver is gone: nobody can observe the signal anymore.
                _ = done_tx.closed() => return,
            }
            let _ = done_tx.send(true);
        });

        child
    }

    /// Derives a context holding `value`, keyed by its type, in place of any
    /// previous value of the same type. The derived context shares this one's
    /// cancellation and deadline; this context and its other clones do not
    /// see the value.
    pub fn with_value<T: Send + Sync + 'static>(self, value: T) -> Self {
        let mut values = Values::clone(&self.values);
        values.insert(TypeId::of::<T>(), Arc::new(value));
        Self {
            inner: self.inner,
            values: Arc::new(values),
        }
    }

    pub fn value<T>(&self) -> Option<T>
    where
        T: Send + Sync + Clone + 'static,
    {
        self.values
            .get(&TypeId::of::<T>())
            .and_then(|v| v.downcast_ref::<T>())
            .cloned()
    }

    pub fn is_cancelled(&self) -> bool {
        *self.inner.done.borrow()
    }

    pub fn deadline(&self) -> Option<Instant> {
        self.inner.deadline
    }

    /// Time left before the deadline, `None` when there is no deadline.
    pub fn remaining(&self) -> Option<Duration> {
        self.inner
            .deadline
            .map(|deadline| deadline.saturating_duration_since(Instant::now()))
    }

    /// Returns a channel that flips to `true` when work done on behalf of this
    /// context should be cancelled
    pub fn done(&self) -> watch::Receiver<bool> {
        self.inner.done.clone()
    }

    /// Resolves once the context is cancelled or its deadline passes.
    pub async fn cancelled(&self) {
        let mut done = self.inner.done.clone();
        let _ = done.wait_for(|cancelled| *cancelled).await;
    }

    pub fn cancel(&self) {
        let _ = self.inner.done_tx.send(true);
    }
}

impl Default for Context {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for Context {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Context")
            .field("deadline", &self.inner.deadline)
            .field("cancelled", &self.is_cancelled())
            .finish()
    }
}
