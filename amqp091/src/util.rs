//! Common utilities

use std::{
    pin::Pin,
    sync::{Arc, OnceLock},
    task::Poll,
    time::Duration,
};

use futures_util::Future;
use tokio::time::{Instant, Sleep};
use tokio_util::sync::CancellationToken;

use crate::error::Error;

#[derive(Debug)]
pub(crate) enum Running {
    Continue,
    Stop,
}

/// A deadline that is pushed back every time the connection hears from the peer
#[derive(Debug)]
pub(crate) struct IdleTimeout {
    delay: Pin<Box<Sleep>>,
    duration: Duration,
}

impl IdleTimeout {
    pub fn new(duration: Duration) -> Self {
        let delay = Box::pin(tokio::time::sleep(duration));
        Self { delay, duration }
    }

    pub fn reset(&mut self) {
        let next = Instant::now() + self.duration;
        self.delay.as_mut().reset(next);
    }
}

impl Future for IdleTimeout {
    type Output = ();

    fn poll(mut self: Pin<&mut Self>, cx: &mut std::task::Context<'_>) -> Poll<Self::Output> {
        self.delay.as_mut().poll(cx)
    }
}

/// Broadcasts a one-shot shutdown to every task watching a connection or a channel.
///
/// The reason is recorded before the token is cancelled so that any waiter woken by the
/// cancellation observes it. A channel's signal is a child of its connection's: shutting the
/// connection down also fires every channel, and the channel then reports the connection's
/// reason unless it recorded one of its own first.
#[derive(Debug, Clone, Default)]
pub(crate) struct Shutdown {
    token: CancellationToken,
    reason: Arc<OnceLock<Error>>,
    parent: Option<Arc<OnceLock<Error>>>,
}

impl Shutdown {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn child(&self) -> Self {
        Self {
            token: self.token.child_token(),
            reason: Arc::new(OnceLock::new()),
            parent: Some(self.reason.clone()),
        }
    }

    /// Returns `true` if this call was the one that fired the signal
    pub fn trigger(&self, reason: Error) -> bool {
        let first = self.reason.set(reason).is_ok();
        self.token.cancel();
        first
    }

    pub fn is_triggered(&self) -> bool {
        self.token.is_cancelled()
    }

    pub fn reason(&self) -> Option<Error> {
        self.reason
            .get()
            .or_else(|| self.parent.as_ref().and_then(|p| p.get()))
            .cloned()
    }

    /// The reason, or [`Error::Closed`] if the signal fired without one
    pub fn reason_or_closed(&self) -> Error {
        self.reason().unwrap_or(Error::Closed)
    }

    pub async fn triggered(&self) {
        self.token.cancelled().await
    }
}
