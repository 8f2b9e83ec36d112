//! Background thread that owns the output stream for one session.

use std::fs::File;
use std::io::BufWriter;
use std::sync::Arc;
use std::thread::{self, JoinHandle};

use trace_format::TraceStreamWriter;

use crate::queue::EventQueue;
use crate::Result;

/// Handle to the writer thread of one session.
///
/// The thread is the only owner of the output stream: it drains the queue,
/// serializes each batch in order, and closes the array on shutdown. Write
/// failures end the session; they surface through [`SessionWriter::join`].
pub(crate) struct SessionWriter {
    handle: JoinHandle<Result<()>>,
}

impl SessionWriter {
    pub(crate) fn spawn(
        session: &str,
        queue: Arc<EventQueue>,
        stream: TraceStreamWriter<BufWriter<File>>,
    ) -> Result<Self> {
        let session = session.to_string();
        let handle = thread::Builder::new()
            .name("selftrace-writer".to_string())
            .spawn(move || write_loop(&session, &queue, stream))?;
        Ok(SessionWriter { handle })
    }

    /// Block until the writer has drained the queue and finalized the file.
    pub(crate) fn join(self) {
        match self.handle.join() {
            Ok(Ok(())) => {}
            Ok(Err(e)) => {
                tracing::error!(error = %e, "trace writer failed, session output is incomplete")
            }
            Err(_) => tracing::error!("trace writer panicked"),
        }
    }
}

fn write_loop(
    session: &str,
    queue: &EventQueue,
    mut stream: TraceStreamWriter<BufWriter<File>>,
) -> Result<()> {
    loop {
        // An empty batch is only returned once the queue is shut down and
        // fully drained, so records enqueued before end_session always land.
        let batch = queue.drain_blocking();
        if batch.is_empty() {
            break;
        }
        for record in &batch {
            stream.write_event(record)?;
        }
    }

    let events = stream.events_written();
    stream.finish()?;
    tracing::debug!(session = %session, events, "trace session closed");
    Ok(())
}
