//! Broadcast channel for human-readable progress lines.
//!
//! The engine announces page fetches, per-chapter decisions, and per-image
//! progress; any number of hosts (CLI printer, tests) may subscribe. A line
//! sent while nobody listens is simply lost; nothing is redelivered.

use crossbeam_channel::{unbounded, Receiver, Sender};
use std::sync::{Arc, Mutex};

/// Clonable handle to the status broadcast. All clones share the same
/// subscriber set.
#[derive(Debug, Clone, Default)]
pub struct StatusChannel {
    subscribers: Arc<Mutex<Vec<Sender<String>>>>,
}

impl StatusChannel {
    pub fn new() -> Self {
        Self::default()
    }

    /// Attach a subscriber. Dropping the receiver detaches it; the next
    /// `emit` prunes the dead sender.
    pub fn subscribe(&self) -> Receiver<String> {
        let (tx, rx) = unbounded();
        self.lock_subscribers().push(tx);
        rx
    }

    /// Deliver one line to every live subscriber.
    pub fn emit(&self, line: impl Into<String>) {
        let line = line.into();
        self.lock_subscribers()
            .retain(|tx| tx.send(line.clone()).is_ok());
    }

    fn lock_subscribers(&self) -> std::sync::MutexGuard<'_, Vec<Sender<String>>> {
        // A poisoned subscriber list is still a valid Vec.
        self.subscribers
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}
