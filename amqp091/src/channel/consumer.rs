use std::{
    path::Path,
    pin::Pin,
    sync::atomic::{AtomicU64, Ordering},
    task::{Context, Poll},
};

use futures_util::Stream;
use tokio::sync::mpsc;

use crate::delivery::Delivery;

/// Longest consumer tag a `shortstr` can carry
pub(crate) const CONSUMER_TAG_MAX_LEN: usize = 255;

static CONSUMER_SEQ: AtomicU64 = AtomicU64::new(0);

/// A tag unique within the process, derived from the program name
pub(crate) fn unique_consumer_tag() -> String {
    let program = std::env::args_os()
        .next()
        .and_then(|arg0| {
            Path::new(&arg0)
                .file_name()
                .map(|name| name.to_string_lossy().into_owned())
        })
        .unwrap_or_default();
    program_consumer_tag(&program)
}

fn program_consumer_tag(program: &str) -> String {
    let seq = CONSUMER_SEQ.fetch_add(1, Ordering::Relaxed);
    let suffix = format!("-{seq}");
    let prefix = "ctag-";

    let room = CONSUMER_TAG_MAX_LEN - prefix.len() - suffix.len();
    let mut end = program.len().min(room);
    while !program.is_char_boundary(end) {
        end -= 1;
    }
    format!("{prefix}{}{suffix}", &program[..end])
}

/// Deliveries for one consumer
///
/// The stream ends when the consumer is cancelled, by the client or by the server, or when the
/// channel closes.
#[derive(Debug)]
pub struct Consumer {
    tag: String,
    deliveries: mpsc::UnboundedReceiver<Delivery>,
}

impl Consumer {
    pub(crate) fn new(tag: String, deliveries: mpsc::UnboundedReceiver<Delivery>) -> Self {
        Self { tag, deliveries }
    }

    /// The consumer tag
    pub fn tag(&self) -> &str {
        &self.tag
    }

    /// The next delivery, `None` once the consumer is gone
    pub async fn recv(&mut self) -> Option<Delivery> {
        self.deliveries.recv().await
    }
}

impl Stream for Consumer {
    type Item = Delivery;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        self.deliveries.poll_recv(cx)
    }
}

#[cfg(test)]
mod tests {
    use futures_util::StreamExt;
    use tokio::sync::mpsc;

    use crate::delivery::Delivery;

    use super::{program_consumer_tag, unique_consumer_tag, Consumer, CONSUMER_TAG_MAX_LEN};

    #[test]
    fn generated_tags_are_unique() {
        let first = unique_consumer_tag();
        let second = unique_consumer_tag();
        assert!(first.starts_with("ctag-"));
        assert_ne!(first, second);
    }

    #[test]
    fn generated_tags_fit_a_shortstr() {
        for len in [4, 249, 256, 1024] {
            let tag = program_consumer_tag(&"z".repeat(len));
            assert!(tag.len() <= CONSUMER_TAG_MAX_LEN, "{len}");
        }
        let tag = program_consumer_tag(&"é".repeat(300));
        assert!(tag.len() <= CONSUMER_TAG_MAX_LEN);
    }

    #[tokio::test]
    async fn stream_ends_with_sender() {
        let (tx, rx) = mpsc::unbounded_channel();
        let mut consumer = Consumer::new("ctag".into(), rx);
        let mut delivery = Delivery::default();
        delivery.delivery_tag = 1;
        tx.send(delivery).unwrap();
        drop(tx);
        assert_eq!(consumer.next().await.map(|d| d.delivery_tag), Some(1));
        assert!(consumer.next().await.is_none());
    }
}
