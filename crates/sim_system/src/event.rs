//! Fan-out channel for simulation events.
//!
//! Systems receive an [`EventSink`] at configure time and may emit events
//! from any phase. Every subscriber gets its own copy of each event; the
//! runner is one such subscriber and reacts to [`Event::Pause`] and
//! [`Event::Stop`] at the start of the next tick.

use std::sync::Arc;

use crossbeam_channel::{Receiver, Sender};
use parking_lot::Mutex;
use tracing::trace;

/// An event published through the sink.
#[derive(Debug, Clone, PartialEq)]
pub enum Event {
    /// Request the runner to pause (`true`) or resume (`false`).
    Pause(bool),
    /// Request the runner to stop after the current tick.
    Stop,
    /// Application-defined event.
    Custom {
        name: String,
        payload: serde_json::Value,
    },
}

/// Cloneable handle for publishing [`Event`]s to all subscribers.
#[derive(Debug, Clone, Default)]
pub struct EventSink {
    subscribers: Arc<Mutex<Vec<Sender<Event>>>>,
}

impl EventSink {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a new subscriber. Events emitted from now on are delivered
    /// to the returned receiver. Dropping the receiver unsubscribes.
    pub fn subscribe(&self) -> Receiver<Event> {
        let (tx, rx) = crossbeam_channel::unbounded();
        self.subscribers.lock().push(tx);
        rx
    }

    /// Deliver `event` to every live subscriber. Returns how many received it.
    pub fn emit(&self, event: Event) -> usize {
        let mut subscribers = self.subscribers.lock();
        subscribers.retain(|tx| tx.send(event.clone()).is_ok());
        trace!(?event, delivered = subscribers.len(), "emitted event");
        subscribers.len()
    }

    #[must_use]
    pub fn subscriber_count(&self) -> usize {
        self.subscribers.lock().len()
    }
}
