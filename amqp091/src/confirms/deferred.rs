use std::{collections::HashMap, time::Duration};

use parking_lot::Mutex;
use tokio::sync::watch;
use tokio_util::sync::CancellationToken;

use crate::error::Error;

use super::Confirmation;

/// Outcome of a single publish, settled when the server acks or nacks it
///
/// Clones observe the same outcome. If the channel closes first the publish counts as nacked.
#[derive(Debug, Clone)]
pub struct DeferredConfirmation {
    delivery_tag: u64,
    outcome: watch::Receiver<Option<bool>>,
}

impl DeferredConfirmation {
    /// The publish sequence number
    pub fn delivery_tag(&self) -> u64 {
        self.delivery_tag
    }

    /// `Some(ack)` once settled
    pub fn acked(&self) -> Option<bool> {
        *self.outcome.borrow()
    }

    /// Whether the outcome is known
    pub fn is_done(&self) -> bool {
        self.acked().is_some()
    }

    /// Wait for the outcome, `true` for ack
    pub async fn wait(&self) -> bool {
        let mut outcome = self.outcome.clone();
        let ack = match outcome.wait_for(Option::is_some).await {
            Ok(settled) => settled.unwrap_or(false),
            // dropped without being settled
            Err(_) => false,
        };
        ack
    }

    /// Wait for the outcome unless `cancel` fires first
    ///
    /// An outcome that is already known wins over cancellation.
    pub async fn wait_with_cancel(&self, cancel: &CancellationToken) -> Result<bool, Error> {
        tokio::select! {
            biased;
            ack = self.wait() => Ok(ack),
            _ = cancel.cancelled() => self.acked().ok_or(Error::Cancelled),
        }
    }

    /// Wait for the outcome for at most `timeout`
    pub async fn wait_timeout(&self, timeout: Duration) -> Result<bool, Error> {
        match tokio::time::timeout(timeout, self.wait()).await {
            Ok(ack) => Ok(ack),
            Err(_) => self.acked().ok_or(Error::Timeout),
        }
    }
}

/// Outstanding [`DeferredConfirmation`]s of a channel by delivery tag
#[derive(Debug, Default)]
pub struct DeferredConfirmations {
    inner: Mutex<Pending>,
}

#[derive(Debug, Default)]
struct Pending {
    confirmations: HashMap<u64, watch::Sender<Option<bool>>>,
    closed: bool,
}

impl DeferredConfirmations {
    /// Creates an empty set
    pub fn new() -> Self {
        Self::default()
    }

    /// Track `delivery_tag`. After [`close`](Self::close) the returned confirmation is
    /// already nacked.
    pub fn add(&self, delivery_tag: u64) -> DeferredConfirmation {
        let mut pending = self.inner.lock();
        let initial = pending.closed.then_some(false);
        let (tx, rx) = watch::channel(initial);
        if !pending.closed {
            pending.confirmations.insert(delivery_tag, tx);
        }
        DeferredConfirmation {
            delivery_tag,
            outcome: rx,
        }
    }

    /// Settle one tag. Unknown or already settled tags are ignored.
    pub fn confirm(&self, confirmation: Confirmation) {
        let mut pending = self.inner.lock();
        if let Some(tx) = pending.confirmations.remove(&confirmation.delivery_tag) {
            tx.send_replace(Some(confirmation.ack));
        }
    }

    /// Settle every tracked tag up to and including `confirmation.delivery_tag`
    pub fn confirm_multiple(&self, confirmation: Confirmation) {
        let mut pending = self.inner.lock();
        pending.confirmations.retain(|tag, tx| {
            if *tag <= confirmation.delivery_tag {
                tx.send_replace(Some(confirmation.ack));
                false
            } else {
                true
            }
        });
    }

    /// Nack everything still outstanding
    pub fn close(&self) {
        let mut pending = self.inner.lock();
        pending.closed = true;
        for (_, tx) in pending.confirmations.drain() {
            tx.send_replace(Some(false));
        }
    }

    /// Number of unsettled confirmations
    pub fn len(&self) -> usize {
        self.inner.lock().confirmations.len()
    }

    /// Whether every confirmation is settled
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
