//! String-keyed tables of in-flight custom spans.
//!
//! Each table owns its open records by value; `end` moves the record out
//! into the submission path. Table locks are held for map access only, never
//! across queue pushes or I/O.

use std::collections::HashMap;

use parking_lot::Mutex;
use trace_format::{EventRecord, Phase};

use crate::{current_thread_id, monotonic_micros};

/// Which table a custom span lives in, deciding its begin/end phase codes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SpanKind {
    /// Synchronous custom span (B/E), expected to nest with scope events on
    /// the same thread.
    Sync,
    /// Asynchronous custom span (b/e), may begin and end on different
    /// threads with no nesting requirement.
    Async,
}

impl SpanKind {
    pub(crate) fn begin_phase(self) -> Phase {
        match self {
            SpanKind::Sync => Phase::Begin,
            SpanKind::Async => Phase::AsyncBegin,
        }
    }

    fn end_phase(self) -> Phase {
        match self {
            SpanKind::Sync => Phase::End,
            SpanKind::Async => Phase::AsyncEnd,
        }
    }
}

/// One table of open spans, keyed by event name.
///
/// A name holds at most one in-flight record; starting a second span under a
/// name that is already open replaces the first, which is a reported caller
/// error rather than a crash.
pub struct SpanTable {
    kind: SpanKind,
    open: Mutex<HashMap<String, EventRecord>>,
}

impl SpanTable {
    pub(crate) fn new(kind: SpanKind) -> Self {
        SpanTable {
            kind,
            open: Mutex::new(HashMap::new()),
        }
    }

    /// Store `record` as the in-flight span for its name and return a copy
    /// of the begin half for immediate submission.
    pub(crate) fn start(&self, record: EventRecord) -> EventRecord {
        let begin = record.clone();
        let replaced = self.open.lock().insert(record.name.clone(), record);
        if replaced.is_some() {
            tracing::warn!(
                name = %begin.name,
                kind = ?self.kind,
                "custom span started while already open, previous span lost"
            );
        }
        begin
    }

    /// Correlation id of the open span under `name`, if any.
    pub(crate) fn id_of(&self, name: &str) -> Option<u64> {
        self.open.lock().get(name).and_then(|record| record.id)
    }

    /// Attach an argument to the open span under `name`; it rides on the end
    /// half. Returns false if no such span is open.
    pub(crate) fn add_arg(&self, name: &str, key: &str, value: String) -> bool {
        match self.open.lock().get_mut(name) {
            Some(record) => {
                record.args.insert(key.to_string(), value);
                true
            }
            None => false,
        }
    }

    /// Remove the open span under `name` and finalize its end half: end
    /// phase, fresh timestamp, the ending thread's id, same correlation id,
    /// accumulated args. Ending a name with no open span is a reported
    /// no-op.
    pub(crate) fn end(&self, name: &str) -> Option<EventRecord> {
        let removed = self.open.lock().remove(name);
        match removed {
            Some(mut record) => {
                record.ph = self.kind.end_phase();
                record.ts = monotonic_micros();
                record.tid = current_thread_id();
                Some(record)
            }
            None => {
                tracing::warn!(
                    name = %name,
                    kind = ?self.kind,
                    "ending a custom span that is not open"
                );
                None
            }
        }
    }
}

/// The two independent custom-span tables.
pub struct CustomEventRegistry {
    sync: SpanTable,
    asynchronous: SpanTable,
}

impl CustomEventRegistry {
    pub(crate) fn new() -> Self {
        CustomEventRegistry {
            sync: SpanTable::new(SpanKind::Sync),
            asynchronous: SpanTable::new(SpanKind::Async),
        }
    }

    pub(crate) fn table(&self, kind: SpanKind) -> &SpanTable {
        match kind {
            SpanKind::Sync => &self.sync,
            SpanKind::Async => &self.asynchronous,
        }
    }
}
