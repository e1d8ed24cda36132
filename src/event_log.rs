// ============================================================================
// Event Log - append-only, bounded history of component events
// ============================================================================
//
// Logs live outside the rollback snapshot: `Chain::execute` detaches them
// before cloning the world and merges the transaction's fresh entries back
// on commit. Only the newest `MAX_RETAINED_EVENTS` entries are kept.
//
// ============================================================================

use serde::{Deserialize, Serialize};

pub const MAX_RETAINED_EVENTS: usize = 10_000;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct EventLog<E> {
    entries: Vec<E>,
}

impl<E> Default for EventLog<E> {
    fn default() -> Self {
        Self { entries: Vec::new() }
    }
}

impl<E> EventLog<E> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, event: E) {
        self.entries.push(event);
        self.trim();
    }

    pub fn as_slice(&self) -> &[E] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Moves every entry out, leaving the log empty.
    pub fn take(&mut self) -> Self {
        std::mem::take(self)
    }

    /// Puts `earlier` back in front of whatever was recorded since it was taken.
    pub fn restore(&mut self, mut earlier: Self) {
        earlier.entries.append(&mut self.entries);
        *self = earlier;
        self.trim();
    }

    fn trim(&mut self) {
        if self.entries.len() > MAX_RETAINED_EVENTS {
            let excess = self.entries.len() - MAX_RETAINED_EVENTS;
            self.entries.drain(..excess);
        }
    }
}
