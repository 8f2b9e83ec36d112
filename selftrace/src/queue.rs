//! FIFO hand-off between producer threads and the session writer.

use std::collections::VecDeque;

use parking_lot::{Condvar, Mutex};
use trace_format::EventRecord;

#[derive(Default)]
struct QueueState {
    records: VecDeque<EventRecord>,
    shutdown: bool,
}

/// Thread-safe queue carrying records from any number of producers to the
/// single session writer.
///
/// Records are drained in global enqueue order. Shutdown never discards
/// queued records: the writer keeps draining until the queue is observed
/// empty with the shutdown flag set.
pub struct EventQueue {
    state: Mutex<QueueState>,
    available: Condvar,
}

impl EventQueue {
    pub fn new() -> Self {
        EventQueue {
            state: Mutex::new(QueueState::default()),
            available: Condvar::new(),
        }
    }

    /// Append a record and wake the writer.
    pub fn push(&self, record: EventRecord) {
        let mut state = self.state.lock();
        state.records.push_back(record);
        self.available.notify_one();
    }

    /// Block until records are available or the queue has been shut down,
    /// then remove and return the entire contents as one ordered batch.
    ///
    /// An empty batch means the queue was shut down with nothing left to
    /// drain.
    pub fn drain_blocking(&self) -> Vec<EventRecord> {
        let mut state = self.state.lock();
        while state.records.is_empty() && !state.shutdown {
            self.available.wait(&mut state);
        }
        state.records.drain(..).collect()
    }

    /// Set the shutdown flag and wake the writer. Queued records remain
    /// drainable.
    pub fn shutdown(&self) {
        let mut state = self.state.lock();
        state.shutdown = true;
        self.available.notify_all();
    }

    /// Re-arm the queue for a new session, discarding anything a producer
    /// managed to enqueue after the previous writer's final drain. Returns
    /// the number of discarded records.
    pub fn reopen(&self) -> usize {
        let mut state = self.state.lock();
        state.shutdown = false;
        let stale = state.records.len();
        state.records.clear();
        stale
    }
}

impl Default for EventQueue {
    fn default() -> Self {
        Self::new()
    }
}
