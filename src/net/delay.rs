//! Delayed, order-preserving message delivery
//!
//! Every message that crosses a connection can be held back by a fixed
//! latency before it is handed on. Each connection direction owns one
//! `DelayLine`: items are delivered in the order they were scheduled, each
//! no earlier than `delay` after it was scheduled. Scheduling never waits;
//! a full line rejects the item instead.

use std::time::Duration;

use tokio::sync::mpsc;
use tokio::time::{sleep_until, Instant};
use tracing::trace;

/// Errors returned when scheduling onto a delay line
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum DelayLineError {
    #[error("delay line is full")]
    Full,

    #[error("delay line is closed")]
    Closed,
}

/// Handle for scheduling items onto a delivery task
pub struct DelayLine<T> {
    tx: mpsc::Sender<(Instant, T)>,
    delay: Duration,
}

impl<T> Clone for DelayLine<T> {
    fn clone(&self) -> Self {
        Self {
            tx: self.tx.clone(),
            delay: self.delay,
        }
    }
}

impl<T: Send + 'static> DelayLine<T> {
    /// Spawn the delivery task
    ///
    /// `deliver` is called once per item when it comes due and returns
    /// `false` once the downstream is gone, which stops the task.
    pub fn spawn<F>(delay: Duration, capacity: usize, mut deliver: F) -> Self
    where
        F: FnMut(T) -> bool + Send + 'static,
    {
        let (tx, mut rx) = mpsc::channel::<(Instant, T)>(capacity.max(1));

        tokio::spawn(async move {
            while let Some((due, item)) = rx.recv().await {
                if due > Instant::now() {
                    sleep_until(due).await;
                }
                if !deliver(item) {
                    trace!("delay line downstream closed");
                    break;
                }
            }
        });

        Self { tx, delay }
    }

    /// Queue an item for delivery after the configured delay
    pub fn schedule(&self, item: T) -> Result<(), DelayLineError> {
        let due = Instant::now() + self.delay;
        self.tx.try_send((due, item)).map_err(|e| match e {
            mpsc::error::TrySendError::Full(_) => DelayLineError::Full,
            mpsc::error::TrySendError::Closed(_) => DelayLineError::Closed,
        })
    }

    pub fn is_closed(&self) -> bool {
        self.tx.is_closed()
    }
}

/// Delivery function that forwards into a bounded channel
///
/// A full downstream drops the item; a closed one stops the line.
pub fn forward_into<T: Send + 'static>(downstream: mpsc::Sender<T>) -> impl FnMut(T) -> bool + Send + 'static {
    move |item| match downstream.try_send(item) {
        Ok(()) => true,
        Err(mpsc::error::TrySendError::Full(_)) => {
            trace!("downstream full, dropping delayed item");
            true
        }
        Err(mpsc::error::TrySendError::Closed(_)) => false,
    }
}
