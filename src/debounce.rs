//! Input debouncing.
//!
//! [`Debouncer`] is the value-level primitive: it holds the last settled
//! value and at most one pending value with a deadline. [`debounced`] drives
//! one from a `watch` channel on its own task, which is how a session turns
//! raw keystrokes into settled queries.

use std::time::Duration;
use tokio::sync::watch;
use tokio::time::Instant;
use tracing::debug;

#[derive(Debug)]
struct Pending<T> {
    value: T,
    deadline: Instant,
}

/// Holds back value changes until the input has been quiet for `delay`.
#[derive(Debug)]
pub struct Debouncer<T> {
    delay: Duration,
    current: T,
    pending: Option<Pending<T>>,
}

impl<T: Clone + PartialEq> Debouncer<T> {
    /// The initial value is visible immediately.
    pub fn new(initial: T, delay: Duration) -> Self {
        Self {
            delay,
            current: initial,
            pending: None,
        }
    }

    pub fn delay(&self) -> Duration {
        self.delay
    }

    /// Record a new input value. A different value replaces whatever was
    /// pending and restarts the timer; repeating the latest input does not.
    pub fn push(&mut self, value: T) {
        let latest = self
            .pending
            .as_ref()
            .map(|p| &p.value)
            .unwrap_or(&self.current);
        if *latest == value {
            return;
        }
        self.pending = Some(Pending {
            value,
            deadline: Instant::now() + self.delay,
        });
    }

    /// The debounced value as of now.
    pub fn value(&mut self) -> &T {
        self.settle(Instant::now());
        &self.current
    }

    pub fn is_pending(&self) -> bool {
        self.pending.is_some()
    }

    /// When the pending value, if any, becomes visible.
    pub fn deadline(&self) -> Option<Instant> {
        self.pending.as_ref().map(|p| p.deadline)
    }

    /// Wait until nothing is pending and return the settled value.
    pub async fn settled(&mut self) -> &T {
        if let Some(deadline) = self.deadline() {
            tokio::time::sleep_until(deadline).await;
            self.settle(deadline);
        }
        &self.current
    }

    fn settle(&mut self, now: Instant) -> bool {
        match self.pending.take() {
            Some(pending) if pending.deadline <= now => {
                self.current = pending.value;
                true
            }
            other => {
                self.pending = other;
                false
            }
        }
    }
}

/// Spawn a task that republishes `input` once it has been stable for `delay`.
///
/// The returned receiver starts at the input's current value. The task ends
/// when the input sender or every output receiver is dropped; a value still
/// pending when the input closes is published at its deadline first.
pub fn debounced<T>(mut input: watch::Receiver<T>, delay: Duration) -> watch::Receiver<T>
where
    T: Clone + PartialEq + Send + Sync + 'static,
{
    let initial = input.borrow_and_update().clone();
    let (tx, rx) = watch::channel(initial.clone());

    tokio::spawn(async move {
        let mut debouncer = Debouncer::new(initial, delay);
        let mut input_open = true;
        loop {
            let deadline = debouncer.deadline();
            if !input_open && deadline.is_none() {
                break;
            }
            tokio::select! {
                changed = input.changed(), if input_open => {
                    if changed.is_err() {
                        input_open = false;
                        continue;
                    }
                    let value = input.borrow_and_update().clone();
                    debouncer.push(value);
                }
                _ = tokio::time::sleep_until(deadline.unwrap_or_else(Instant::now)), if deadline.is_some() => {
                    let value = debouncer.settled().await.clone();
                    tx.send_if_modified(|current| {
                        if *current == value {
                            false
                        } else {
                            *current = value;
                            true
                        }
                    });
                }
                _ = tx.closed() => break,
            }
        }
        debug!("debounce task finished");
    });

    rx
}
