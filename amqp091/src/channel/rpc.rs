//! The synchronous reply slot of a channel

use std::future::Future;

use amqp091_types::{Method, MethodKind};
use tokio::sync::mpsc;

use crate::{error::Error, util::Shutdown};

/// At most one synchronous request is in flight per channel. The receiver doubles as the gate
/// serializing callers; the reader task delivers replies through the sender without waiting.
#[derive(Debug)]
pub(crate) struct Rpc {
    replies: tokio::sync::Mutex<mpsc::UnboundedReceiver<Method>>,
    tx: parking_lot::Mutex<Option<mpsc::UnboundedSender<Method>>>,
}

impl Default for Rpc {
    fn default() -> Self {
        Self::new()
    }
}

impl Rpc {
    pub fn new() -> Self {
        let (tx, rx) = mpsc::unbounded_channel();
        Self {
            replies: tokio::sync::Mutex::new(rx),
            tx: parking_lot::Mutex::new(Some(tx)),
        }
    }

    /// Hand a reply to the waiting caller. Returns `false` once the slot is closed.
    pub fn deliver(&self, method: Method) -> bool {
        match self.tx.lock().as_ref() {
            Some(tx) => tx.send(method).is_ok(),
            None => false,
        }
    }

    /// Wakes the waiting caller, if any, with the shutdown reason
    pub fn close(&self) {
        self.tx.lock().take();
    }

    /// Run `send` and wait for a reply of one of the `expect`ed kinds
    ///
    /// With an empty `expect` nothing is awaited after sending. A reply of another kind is
    /// dropped and the wait goes on. Dropping the returned future does not retract a request
    /// that was already written.
    pub async fn call<F>(
        &self,
        shutdown: &Shutdown,
        expect: &[MethodKind],
        send: F,
    ) -> Result<Option<Method>, Error>
    where
        F: Future<Output = Result<(), Error>>,
    {
        let mut replies = self.replies.lock().await;
        if shutdown.is_triggered() {
            return Err(shutdown.reason_or_closed());
        }

        // replies to callers that gave up waiting
        while let Ok(stale) = replies.try_recv() {
            log_stale(&stale);
        }

        send.await?;
        if expect.is_empty() {
            return Ok(None);
        }

        loop {
            let reply = tokio::select! {
                biased;
                reply = replies.recv() => reply,
                _ = shutdown.triggered() => None,
            };

            match reply {
                Some(method) if expect.contains(&method.kind()) => return Ok(Some(method)),
                Some(method) => log_unanswered(&method, expect),
                None => return Err(shutdown.reason_or_closed()),
            }
        }
    }
}

#[cfg_attr(not(any(feature = "tracing", feature = "log")), allow(unused_variables))]
fn log_stale(reply: &Method) {
    #[cfg(feature = "tracing")]
    tracing::debug!(method = reply.name(), "Discarding stale reply");
    #[cfg(feature = "log")]
    log::debug!("Discarding stale reply {}", reply.name());
}

#[cfg_attr(not(any(feature = "tracing", feature = "log")), allow(unused_variables))]
fn log_unanswered(reply: &Method, expect: &[MethodKind]) {
    #[cfg(feature = "tracing")]
    tracing::warn!(
        method = reply.name(),
        ?expect,
        "Ignoring reply that does not answer the request"
    );
    #[cfg(feature = "log")]
    log::warn!(
        "Ignoring reply {} that does not answer the request, expecting {:?}",
        reply.name(),
        expect
    );
}
