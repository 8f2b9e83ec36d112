// Copyright (C) 2025 Category Labs, Inc.
//
// This program is free software: you can redistribute it and/or modify
// it under the terms of the GNU General Public License as published by
// the Free Software Foundation, either version 3 of the License, or
// (at your option) any later version.
//
// This program is distributed in the hope that it will be useful,
// but WITHOUT ANY WARRANTY; without even the implied warranty of
// MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE.  See the
// GNU General Public License for more details.
//
// You should have received a copy of the GNU General Public License
// along with this program.  If not, see <http://www.gnu.org/licenses/>.

//! # Trace Format
//!
//! Rust types for the subset of the Chrome Trace Event Format emitted by the
//! in-process tracer, plus a streaming writer for the JSON Array form of the
//! format.
//!
//! The Chrome Trace Event Format is a JSON-based format for recording
//! performance traces, processed by the Chrome Trace Viewer
//! (chrome://tracing) and by Perfetto.
//!
//! ## Event Types
//!
//! Each event carries a single-character phase identifying its role:
//! - **Complete Events** (X): a duration of work with start time and length
//!   in a single record
//! - **Duration Events** (B/E): the legacy two-record begin/end form, used
//!   here for synchronous custom spans
//! - **Instant Events** (i): points in time with no duration
//! - **Async Events** (b/e): operations that may begin on one thread and end
//!   on another, paired by a correlation id
//!
//! ## Timestamps
//!
//! All timestamps and durations are in microseconds from a monotonic source.
//!
//! ## Streaming
//!
//! [`TraceStreamWriter`] writes events incrementally as a comma-separated
//! JSON array, flushing after every object, so a crash mid-session still
//! leaves a readable prefix on disk.

use std::collections::BTreeMap;
use std::io::Write;

use bon::Builder;
use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum FormatError {
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("serialization error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Event category, shown as the `cat` field and used for filtering in the
/// trace viewer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Category {
    /// A scoped duration on a single thread.
    Scope,
    /// A named custom span, synchronous or asynchronous.
    Custom,
    /// A point in time with no duration.
    Instant,
}

/// Event phase, determining the kind of event and how it is displayed.
///
/// The phase is the most important field: it decides which optional fields
/// are meaningful (`dur` for complete events, `id` for custom/async spans,
/// `s` for instants) and how the viewer pairs related records.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Phase {
    /// Begin of a synchronous duration pair. Must be followed by a
    /// corresponding [`Phase::End`] on the same thread.
    #[serde(rename = "B")]
    Begin,
    /// End of a synchronous duration pair.
    #[serde(rename = "E")]
    End,
    /// Complete event carrying both start time and duration in one record.
    /// Preferred over separate B/E records when the duration is known.
    #[serde(rename = "X")]
    Complete,
    /// Instant event with no duration, displayed as a vertical line.
    #[serde(rename = "i")]
    Instant,
    /// Begin of an async span. Paired with [`Phase::AsyncEnd`] by id; the
    /// end may be recorded on a different thread.
    #[serde(rename = "b")]
    AsyncBegin,
    /// End of an async span.
    #[serde(rename = "e")]
    AsyncEnd,
}

/// Scope of an instant event, determining its visual height in the trace
/// viewer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum InstantScope {
    /// Event spans the entire timeline height.
    #[serde(rename = "g")]
    Global,
    /// Event spans all threads in the process.
    #[serde(rename = "p")]
    Process,
    /// Event is confined to a single thread lane (default).
    #[serde(rename = "t")]
    Thread,
}

/// A single trace event, fully populated for its category before it crosses
/// the pipeline.
///
/// Field declaration order is serialization order. Optional fields are
/// omitted from the output when absent, and `args` is omitted when empty.
#[derive(Debug, Clone, Serialize, Deserialize, Builder)]
pub struct EventRecord {
    /// Display name of the event in the trace viewer.
    pub name: String,
    /// Event category.
    pub cat: Category,
    /// Event phase.
    pub ph: Phase,
    /// Process id of the emitting process.
    pub pid: u32,
    /// Thread id derived from the emitting thread's identity.
    pub tid: u64,
    /// Start timestamp in microseconds from a monotonic source.
    pub ts: i64,
    /// Duration in microseconds. Complete (X) events only.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub dur: Option<i64>,
    /// Correlation id pairing the begin and end halves of a custom span.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<u64>,
    /// Instant scope marker. Instant (i) events only.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub s: Option<InstantScope>,
    /// Key/value annotations shown in the event details.
    #[builder(default)]
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub args: BTreeMap<String, String>,
}

impl EventRecord {
    /// Attach one stringified argument, replacing any previous value under
    /// the same key.
    pub fn add_arg(&mut self, key: impl Into<String>, value: impl std::fmt::Display) {
        self.args.insert(key.into(), value.to_string());
    }
}

/// Incremental writer for the JSON Array form of the trace format.
///
/// Owns the array framing state for one output stream: the opening bracket
/// is written on construction, a separator before every record after the
/// first, and the closing bracket on [`TraceStreamWriter::finish`]. The
/// stream is flushed after every record.
pub struct TraceStreamWriter<W: Write> {
    writer: W,
    events_written: u64,
}

impl<W: Write> TraceStreamWriter<W> {
    /// Open the array on `writer`.
    pub fn new(mut writer: W) -> Result<Self, FormatError> {
        writer.write_all(b"[")?;
        writer.flush()?;
        Ok(TraceStreamWriter {
            writer,
            events_written: 0,
        })
    }

    /// Serialize one event into the array and flush.
    pub fn write_event(&mut self, event: &EventRecord) -> Result<(), FormatError> {
        if self.events_written > 0 {
            self.writer.write_all(b",\n")?;
        }
        serde_json::to_writer(&mut self.writer, event)?;
        self.writer.flush()?;
        self.events_written += 1;
        Ok(())
    }

    /// Number of events written so far.
    pub fn events_written(&self) -> u64 {
        self.events_written
    }

    /// Close the array and flush, returning the underlying stream.
    pub fn finish(mut self) -> Result<W, FormatError> {
        self.writer.write_all(b"]")?;
        self.writer.flush()?;
        Ok(self.writer)
    }
}
