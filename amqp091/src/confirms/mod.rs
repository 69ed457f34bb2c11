//! Publisher confirms
//!
//! Once a channel is in confirm mode every publish is numbered from 1. The server acks or nacks
//! those numbers, possibly out of order and possibly several at once. [`Confirms`] puts the
//! outcomes back in publish order before handing them to listeners. The matching
//! [`DeferredConfirmation`]s are settled as soon as their outcome arrives.

use std::collections::BTreeMap;

use parking_lot::Mutex;
use tokio::sync::mpsc;

mod deferred;

pub use deferred::{DeferredConfirmation, DeferredConfirmations};

/// Outcome of one publish
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Confirmation {
    /// The publish sequence number
    pub delivery_tag: u64,

    /// `true` for `basic.ack`, `false` for `basic.nack`
    pub ack: bool,
}

impl Confirmation {
    /// Creates a new confirmation
    pub fn new(delivery_tag: u64, ack: bool) -> Self {
        Self { delivery_tag, ack }
    }
}

#[derive(Debug)]
struct Sequencer {
    published: u64,
    expecting: u64,
    pending: BTreeMap<u64, Confirmation>,
    listeners: Vec<mpsc::UnboundedSender<Confirmation>>,
}

impl Sequencer {
    fn confirm(&mut self, confirmation: Confirmation) {
        self.listeners
            .retain(|listener| listener.send(confirmation).is_ok());
        self.expecting += 1;
    }

    fn resequence(&mut self) {
        while let Some(next) = self.pending.remove(&self.expecting) {
            self.confirm(next);
        }
    }
}

/// Sequences publisher confirms
#[derive(Debug)]
pub struct Confirms {
    sequencer: Mutex<Sequencer>,
    deferred: DeferredConfirmations,
}

impl Default for Confirms {
    fn default() -> Self {
        Self::new()
    }
}

impl Confirms {
    /// Creates a sequencer expecting delivery tag 1
    pub fn new() -> Self {
        Self {
            sequencer: Mutex::new(Sequencer {
                published: 0,
                expecting: 1,
                pending: BTreeMap::new(),
                listeners: Vec::new(),
            }),
            deferred: DeferredConfirmations::new(),
        }
    }

    /// Register a listener. Confirmations are delivered to it in publish order.
    pub fn listen(&self) -> mpsc::UnboundedReceiver<Confirmation> {
        let (tx, rx) = mpsc::unbounded_channel();
        self.sequencer.lock().listeners.push(tx);
        rx
    }

    /// Count a publish, returning its delivery tag
    pub fn publish(&self) -> u64 {
        let mut sequencer = self.sequencer.lock();
        sequencer.published += 1;
        sequencer.published
    }

    /// Count a publish and track its outcome
    pub fn publish_deferred(&self) -> DeferredConfirmation {
        let mut sequencer = self.sequencer.lock();
        sequencer.published += 1;
        self.deferred.add(sequencer.published)
    }

    /// The delivery tag the next publish will get
    pub fn next_publish_seq_no(&self) -> u64 {
        self.sequencer.lock().published + 1
    }

    /// A single ack or nack
    pub fn one(&self, confirmation: Confirmation) {
        let mut sequencer = self.sequencer.lock();
        if confirmation.delivery_tag < sequencer.expecting
            || confirmation.delivery_tag > sequencer.published
        {
            #[cfg(feature = "tracing")]
            tracing::debug!(?confirmation, "Ignoring confirmation outside the outstanding range");
            #[cfg(feature = "log")]
            log::debug!(
                "Ignoring confirmation outside the outstanding range {:?}",
                confirmation
            );
            return;
        }

        self.deferred.confirm(confirmation);
        if sequencer.expecting == confirmation.delivery_tag {
            sequencer.confirm(confirmation);
        } else {
            sequencer
                .pending
                .insert(confirmation.delivery_tag, confirmation);
        }
        sequencer.resequence();
    }

    /// An ack or nack with `multiple` set, settling every outstanding tag up to and including
    /// `delivery_tag`
    pub fn multiple(&self, confirmation: Confirmation) {
        let mut sequencer = self.sequencer.lock();
        let last = confirmation.delivery_tag.min(sequencer.published);
        self.deferred
            .confirm_multiple(Confirmation::new(last, confirmation.ack));
        while sequencer.expecting <= last {
            let tag = sequencer.expecting;
            // a tag already held back keeps its own outcome
            let settled = sequencer
                .pending
                .remove(&tag)
                .unwrap_or(Confirmation::new(tag, confirmation.ack));
            sequencer.confirm(settled);
        }
        sequencer.resequence();
    }

    /// Nack every unsettled deferred confirmation and drop all listeners
    pub fn close(&self) {
        let mut sequencer = self.sequencer.lock();
        sequencer.listeners.clear();
        sequencer.pending.clear();
        self.deferred.close();
    }

    /// Number of publishes without an outcome yet
    pub fn outstanding(&self) -> u64 {
        let sequencer = self.sequencer.lock();
        sequencer.published + 1 - sequencer.expecting
    }
}
