//! Producer-side event guards.
//!
//! Guards capture their timestamps eagerly and submit on drop, so the end
//! record is emitted exactly once on every exit path, including early
//! returns and unwinding.

use std::fmt::Display;

use trace_format::{Category, EventRecord, InstantScope, Phase};

use crate::registry::SpanKind;
use crate::tracer::Tracer;
use crate::{current_thread_id, monotonic_micros};

/// A scoped duration. Created by [`Tracer::scope`]; on drop it computes the
/// elapsed time and submits one complete (X) record carrying the start
/// timestamp and duration.
pub struct ScopeGuard<'a> {
    tracer: &'a Tracer,
    record: Option<EventRecord>,
    start: i64,
}

impl<'a> ScopeGuard<'a> {
    pub(crate) fn new(tracer: &'a Tracer, name: &str) -> Self {
        let start = monotonic_micros();
        let record = EventRecord::builder()
            .name(name.to_string())
            .cat(Category::Scope)
            .ph(Phase::Complete)
            .pid(tracer.pid())
            .tid(current_thread_id())
            .ts(start)
            .build();
        ScopeGuard {
            tracer,
            record: Some(record),
            start,
        }
    }

    /// Attach one argument to the record before it is submitted.
    pub fn add_arg(&mut self, key: impl Into<String>, value: impl Display) {
        if let Some(record) = self.record.as_mut() {
            record.add_arg(key, value);
        }
    }

    /// Close the scope now instead of at end of scope.
    pub fn close(mut self) {
        self.submit();
    }

    fn submit(&mut self) {
        if let Some(mut record) = self.record.take() {
            record.dur = Some(monotonic_micros() - self.start);
            let _ = self.tracer.submit(record);
        }
    }
}

impl Drop for ScopeGuard<'_> {
    fn drop(&mut self) {
        self.submit();
    }
}

/// An instant marker. The timestamp and thread-scope marker are captured at
/// creation; the record is submitted unchanged (plus any attached args) on
/// drop, exactly once.
pub struct InstantGuard<'a> {
    tracer: &'a Tracer,
    record: Option<EventRecord>,
}

impl<'a> InstantGuard<'a> {
    pub(crate) fn new(tracer: &'a Tracer, name: &str) -> Self {
        let record = EventRecord::builder()
            .name(name.to_string())
            .cat(Category::Instant)
            .ph(Phase::Instant)
            .pid(tracer.pid())
            .tid(current_thread_id())
            .ts(monotonic_micros())
            .s(InstantScope::Thread)
            .build();
        InstantGuard {
            tracer,
            record: Some(record),
        }
    }

    /// Attach one argument to the record before it is submitted.
    pub fn add_arg(&mut self, key: impl Into<String>, value: impl Display) {
        if let Some(record) = self.record.as_mut() {
            record.add_arg(key, value);
        }
    }

    /// Widen the marker beyond the default thread scope.
    pub fn set_scope(&mut self, scope: InstantScope) {
        if let Some(record) = self.record.as_mut() {
            record.s = Some(scope);
        }
    }
}

impl Drop for InstantGuard<'_> {
    fn drop(&mut self) {
        if let Some(record) = self.record.take() {
            let _ = self.tracer.submit(record);
        }
    }
}

/// Handle to an open custom span.
///
/// The in-flight record stays owned by the tracer's registry; the handle
/// only names it, so it can be freely dropped while the span stays open and
/// the span can be ended from another thread by name.
pub struct CustomSpanHandle<'a> {
    tracer: &'a Tracer,
    kind: SpanKind,
    name: String,
    id: u64,
}

impl<'a> CustomSpanHandle<'a> {
    pub(crate) fn new(tracer: &'a Tracer, kind: SpanKind, name: &str, id: u64) -> Self {
        CustomSpanHandle {
            tracer,
            kind,
            name: name.to_string(),
            id,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Correlation id shared by the span's begin and end records.
    pub fn id(&self) -> u64 {
        self.id
    }

    /// Attach an argument to the open span; it is emitted with the end
    /// record. Returns false if the span has already been ended.
    pub fn add_arg(&self, key: &str, value: impl Display) -> bool {
        self.tracer
            .span_table(self.kind)
            .add_arg(&self.name, key, value.to_string())
    }

    /// End the span through the handle.
    pub fn end(self) {
        self.tracer.end_custom_span(self.kind, &self.name);
    }
}
