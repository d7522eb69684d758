//! Cancellation Tokens
//!
//! Every subscription and every scheduled task hands back a [`Cancel`].
//! Invoking it revokes the subscription. Tokens are idempotent, can be
//! cloned freely and invoked from any thread. Dropping a token does not
//! cancel anything: subscriptions made without keeping the token stay in
//! place for the life of their source.

use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use super::event::{EventOutput, EventSink};
use crate::error::Result;

struct CancelInner {
    done: AtomicBool,
    action: Box<dyn Fn() + Send + Sync>,
}

/// Idempotent handle that revokes a subscription or scheduled task.
#[derive(Clone)]
pub struct Cancel {
    inner: Arc<CancelInner>,
}

impl Cancel {
    /// Wrap a revocation action. The action runs at most once, however many
    /// times the token is invoked.
    pub fn new<F>(action: F) -> Self
    where
        F: Fn() + Send + Sync + 'static,
    {
        Self {
            inner: Arc::new(CancelInner {
                done: AtomicBool::new(false),
                action: Box::new(action),
            }),
        }
    }

    /// A token with nothing to revoke.
    pub fn noop() -> Self {
        Self::new(|| {})
    }

    /// A token that revokes every token in `tokens`.
    pub fn all<I>(tokens: I) -> Self
    where
        I: IntoIterator<Item = Cancel>,
    {
        let tokens: Vec<Cancel> = tokens.into_iter().collect();
        Self::new(move || {
            for token in &tokens {
                token.cancel();
            }
        })
    }

    /// Revoke. Calling this again has no further effect.
    pub fn cancel(&self) {
        if !self.inner.done.swap(true, Ordering::AcqRel) {
            (self.inner.action)();
        }
    }

    pub fn is_cancelled(&self) -> bool {
        self.inner.done.load(Ordering::Acquire)
    }

    /// View this token as an event output that cancels when fired.
    pub fn as_output(&self) -> EventOutput {
        EventOutput::new(self.clone())
    }
}

impl EventSink for Cancel {
    fn event(&self) -> Result<()> {
        self.cancel();
        Ok(())
    }
}

impl fmt::Debug for Cancel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Cancel")
            .field("cancelled", &self.is_cancelled())
            .finish()
    }
}
