//! Periodic heartbeat ticks

use std::{task::Poll, time::Duration};

use futures_util::Stream;
use pin_project_lite::pin_project;

use tokio::time::{Instant, MissedTickBehavior};
use tokio_stream::wrappers::IntervalStream;

pin_project! {
    /// A wrapper over an `Option<IntervalStream>` which never ticks if heartbeats are disabled
    #[derive(Debug)]
    pub(crate) struct HeartBeat {
        #[pin]
        interval: Option<IntervalStream>
    }
}

impl HeartBeat {
    /// A [`HeartBeat`] that never yields
    pub fn never() -> Self {
        Self { interval: None }
    }

    /// A [`HeartBeat`] that yields every `period`, starting one period from now
    pub fn new(period: Duration) -> Self {
        let start = Instant::now() + period;
        let mut interval = tokio::time::interval_at(start, period);
        interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
        Self {
            interval: Some(IntervalStream::new(interval)),
        }
    }

    /// Ticks every half of the negotiated interval, never if it is zero
    pub fn from_negotiated(heartbeat: Duration) -> Self {
        match heartbeat.is_zero() {
            true => Self::never(),
            false => Self::new(heartbeat / 2),
        }
    }
}

impl Stream for HeartBeat {
    type Item = Instant;

    fn poll_next(
        self: std::pin::Pin<&mut Self>,
        cx: &mut std::task::Context<'_>,
    ) -> std::task::Poll<Option<Self::Item>> {
        let this = self.project();
        match this.interval.as_pin_mut() {
            Some(stream) => stream.poll_next(cx),
            None => Poll::Pending,
        }
    }
}
