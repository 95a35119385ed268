//! Freshest-wins handoff
//!
//! A capacity-1 channel where a new item replaces any item the consumer has
//! not taken yet. The consumer never works through a backlog, so slow
//! transcription skips windows instead of falling behind live audio.

use std::sync::Arc;

use parking_lot::Mutex;
use tokio::sync::Notify;

/// Result of offering an item to the slot
#[derive(Debug, PartialEq, Eq)]
pub enum SlotSend<T> {
    /// Slot was empty
    Stored,
    /// An unconsumed item was displaced and is returned
    Replaced(T),
    /// Slot is closed; the item is handed back
    Closed(T),
}

#[derive(Debug)]
struct State<T> {
    item: Option<T>,
    closed: bool,
}

#[derive(Debug)]
struct Shared<T> {
    state: Mutex<State<T>>,
    notify: Notify,
}

/// Single-consumer freshest-wins slot
///
/// Cloning shares the slot. Closing is the stop signal: a pending item is
/// still delivered, after which `recv` returns `None`.
#[derive(Debug)]
pub struct LatestSlot<T> {
    shared: Arc<Shared<T>>,
}

impl<T> Clone for LatestSlot<T> {
    fn clone(&self) -> Self {
        Self {
            shared: Arc::clone(&self.shared),
        }
    }
}

impl<T> Default for LatestSlot<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> LatestSlot<T> {
    pub fn new() -> Self {
        Self {
            shared: Arc::new(Shared {
                state: Mutex::new(State {
                    item: None,
                    closed: false,
                }),
                notify: Notify::new(),
            }),
        }
    }

    /// Offer an item, replacing any pending one
    pub fn send(&self, item: T) -> SlotSend<T> {
        let displaced = {
            let mut state = self.shared.state.lock();
            if state.closed {
                return SlotSend::Closed(item);
            }
            state.item.replace(item)
        };
        self.shared.notify.notify_one();

        match displaced {
            Some(old) => SlotSend::Replaced(old),
            None => SlotSend::Stored,
        }
    }

    /// Wait for the next item; `None` once closed and empty
    pub async fn recv(&self) -> Option<T> {
        loop {
            let notified = self.shared.notify.notified();
            {
                let mut state = self.shared.state.lock();
                if let Some(item) = state.item.take() {
                    return Some(item);
                }
                if state.closed {
                    return None;
                }
            }
            notified.await;
        }
    }

    /// Stop accepting items and wake the consumer
    pub fn close(&self) {
        self.shared.state.lock().closed = true;
        self.shared.notify.notify_one();
    }

    /// Whether an item is waiting
    pub fn is_pending(&self) -> bool {
        self.shared.state.lock().item.is_some()
    }
}
