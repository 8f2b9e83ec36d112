//! The tracer context: session control, event submission, custom-span
//! registry access.

use std::fs::File;
use std::io::BufWriter;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;

use parking_lot::Mutex;
use trace_format::{Category, EventRecord, TraceStreamWriter};

use crate::config::TracerConfig;
use crate::queue::EventQueue;
use crate::registry::{CustomEventRegistry, SpanKind, SpanTable};
use crate::span::{CustomSpanHandle, InstantGuard, ScopeGuard};
use crate::writer::SessionWriter;
use crate::{current_thread_id, monotonic_micros, Result, TracerError};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum SessionState {
    Inactive,
    Active,
    Draining,
}

struct SessionControl {
    state: SessionState,
    writer: Option<SessionWriter>,
}

/// Process-wide tracer context.
///
/// Owns the event queue, both custom-span tables, and the lifecycle of the
/// session writer thread. Shared by reference (typically `Arc`) with every
/// producer; at most one session is active at a time, enforced here rather
/// than by any global state.
///
/// Dropping the tracer joins any outstanding writer, so the last session's
/// file is always finalized.
pub struct Tracer {
    config: TracerConfig,
    queue: Arc<EventQueue>,
    registry: CustomEventRegistry,
    session: Mutex<SessionControl>,
    active: AtomicBool,
    next_span_id: AtomicU64,
    dropped: AtomicU64,
    pid: u32,
}

impl Tracer {
    pub fn new() -> Self {
        Self::with_config(TracerConfig::default())
    }

    pub fn with_config(config: TracerConfig) -> Self {
        Tracer {
            config,
            queue: Arc::new(EventQueue::new()),
            registry: CustomEventRegistry::new(),
            session: Mutex::new(SessionControl {
                state: SessionState::Inactive,
                writer: None,
            }),
            active: AtomicBool::new(false),
            next_span_id: AtomicU64::new(1),
            dropped: AtomicU64::new(0),
            pid: std::process::id(),
        }
    }

    /// Start a new trace session named `name`.
    ///
    /// If a previous session's writer is still draining, this blocks until
    /// it has exited and its file is finalized. Starting while a session is
    /// still active is an error; end it first.
    pub fn start_session(&self, name: &str) -> Result<()> {
        let mut session = self.session.lock();
        if session.state == SessionState::Active {
            return Err(TracerError::SessionActive);
        }
        if let Some(writer) = session.writer.take() {
            writer.join();
        }
        session.state = SessionState::Inactive;

        let stale = self.queue.reopen();
        if stale > 0 {
            self.dropped.fetch_add(stale as u64, Ordering::Relaxed);
            tracing::warn!(stale, "discarding records that raced the previous session close");
        }

        let path = self.config.session_path(name);
        let file = File::create(&path)?;
        let stream = TraceStreamWriter::new(BufWriter::new(file))?;
        session.writer = Some(SessionWriter::spawn(name, Arc::clone(&self.queue), stream)?);
        session.state = SessionState::Active;
        self.active.store(true, Ordering::SeqCst);
        tracing::debug!(session = %name, path = %path.display(), "trace session started");
        Ok(())
    }

    /// Request session shutdown and return without blocking.
    ///
    /// The writer keeps draining already-queued records, then closes the
    /// array and the file. The next `start_session` (or dropping the tracer)
    /// joins it.
    pub fn end_session(&self) {
        let mut session = self.session.lock();
        if session.state != SessionState::Active {
            tracing::warn!("end_session called with no active session");
            return;
        }
        self.active.store(false, Ordering::SeqCst);
        session.state = SessionState::Draining;
        self.queue.shutdown();
    }

    /// Hand a fully-populated record to the writer.
    ///
    /// With no active session the record is dropped, counted, and reported;
    /// the producing thread is never crashed and the session file is never
    /// corrupted.
    pub fn submit(&self, record: EventRecord) -> Result<()> {
        if !self.active.load(Ordering::SeqCst) {
            self.dropped.fetch_add(1, Ordering::Relaxed);
            tracing::warn!(name = %record.name, "event submitted with no active session, dropping");
            return Err(TracerError::SessionInactive);
        }
        self.queue.push(record);
        Ok(())
    }

    /// Events dropped because no session was active (plus any that raced a
    /// session close).
    pub fn dropped_events(&self) -> u64 {
        self.dropped.load(Ordering::Relaxed)
    }

    /// Begin a scoped duration ending when the guard drops.
    pub fn scope(&self, name: &str) -> ScopeGuard<'_> {
        ScopeGuard::new(self, name)
    }

    /// Create an instant marker submitted when the guard drops.
    pub fn instant(&self, name: &str) -> InstantGuard<'_> {
        InstantGuard::new(self, name)
    }

    /// Open a synchronous custom span under `name` and submit its begin
    /// record. End it with [`Tracer::end_custom`] using the same name.
    pub fn start_custom(&self, name: &str) -> CustomSpanHandle<'_> {
        self.start_custom_span(SpanKind::Sync, name)
    }

    /// Handle to the open synchronous custom span under `name`, if any.
    pub fn get_custom(&self, name: &str) -> Option<CustomSpanHandle<'_>> {
        self.get_custom_span(SpanKind::Sync, name)
    }

    /// End the open synchronous custom span under `name`. A reported no-op
    /// if no such span is open.
    pub fn end_custom(&self, name: &str) {
        self.end_custom_span(SpanKind::Sync, name);
    }

    /// Open an asynchronous custom span under `name` and submit its begin
    /// record. The span may be ended from any thread with
    /// [`Tracer::end_custom_async`].
    pub fn start_custom_async(&self, name: &str) -> CustomSpanHandle<'_> {
        self.start_custom_span(SpanKind::Async, name)
    }

    /// Handle to the open asynchronous custom span under `name`, if any.
    pub fn get_custom_async(&self, name: &str) -> Option<CustomSpanHandle<'_>> {
        self.get_custom_span(SpanKind::Async, name)
    }

    /// End the open asynchronous custom span under `name`. A reported no-op
    /// if no such span is open.
    pub fn end_custom_async(&self, name: &str) {
        self.end_custom_span(SpanKind::Async, name);
    }

    pub(crate) fn pid(&self) -> u32 {
        self.pid
    }

    pub(crate) fn span_table(&self, kind: SpanKind) -> &SpanTable {
        self.registry.table(kind)
    }

    fn start_custom_span(&self, kind: SpanKind, name: &str) -> CustomSpanHandle<'_> {
        let id = self.next_span_id.fetch_add(1, Ordering::Relaxed);
        let record = EventRecord::builder()
            .name(name.to_string())
            .cat(Category::Custom)
            .ph(kind.begin_phase())
            .pid(self.pid)
            .tid(current_thread_id())
            .ts(monotonic_micros())
            .id(id)
            .build();
        let begin = self.registry.table(kind).start(record);
        let _ = self.submit(begin);
        CustomSpanHandle::new(self, kind, name, id)
    }

    fn get_custom_span(&self, kind: SpanKind, name: &str) -> Option<CustomSpanHandle<'_>> {
        self.registry
            .table(kind)
            .id_of(name)
            .map(|id| CustomSpanHandle::new(self, kind, name, id))
    }

    pub(crate) fn end_custom_span(&self, kind: SpanKind, name: &str) {
        if let Some(record) = self.registry.table(kind).end(name) {
            let _ = self.submit(record);
        }
    }
}

impl Default for Tracer {
    fn default() -> Self {
        Self::new()
    }
}

impl Drop for Tracer {
    fn drop(&mut self) {
        let mut session = self.session.lock();
        if session.state == SessionState::Active {
            self.active.store(false, Ordering::SeqCst);
            session.state = SessionState::Draining;
            self.queue.shutdown();
        }
        if let Some(writer) = session.writer.take() {
            writer.join();
        }
    }
}
