//! Example demonstrating every event type emitted by the tracer, written
//! incrementally with [`TraceStreamWriter`].
//!
//! The output can be loaded directly into chrome://tracing or Perfetto.
//!
//! Usage: all_event_types <output_file>

use std::env;
use std::fs::File;
use std::io::BufWriter;

use trace_format::{Category, EventRecord, InstantScope, Phase, TraceStreamWriter};

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args: Vec<String> = env::args().collect();
    let output_file = if args.len() > 1 {
        &args[1]
    } else {
        eprintln!("Usage: {} <output_file>", args[0]);
        std::process::exit(1);
    };

    let file = File::create(output_file)?;
    let mut writer = TraceStreamWriter::new(BufWriter::new(file))?;

    // Complete event: one record carrying both start and duration.
    let mut frame = EventRecord::builder()
        .name("Frame".to_string())
        .cat(Category::Scope)
        .ph(Phase::Complete)
        .pid(1234)
        .tid(1)
        .ts(1_000_000)
        .dur(16_000)
        .build();
    frame.add_arg("TickID", 0);
    writer.write_event(&frame)?;

    // Instant event with the default thread scope.
    let mut marker = EventRecord::builder()
        .name("VSync".to_string())
        .cat(Category::Instant)
        .ph(Phase::Instant)
        .pid(1234)
        .tid(1)
        .ts(1_008_000)
        .s(InstantScope::Thread)
        .build();
    marker.add_arg("missed", false);
    writer.write_event(&marker)?;

    // Synchronous custom span as a begin/end pair sharing a correlation id.
    let load_begin = EventRecord::builder()
        .name("LoadAssets".to_string())
        .cat(Category::Custom)
        .ph(Phase::Begin)
        .pid(1234)
        .tid(1)
        .ts(1_010_000)
        .id(1)
        .build();
    writer.write_event(&load_begin)?;

    let load_end = EventRecord::builder()
        .name("LoadAssets".to_string())
        .cat(Category::Custom)
        .ph(Phase::End)
        .pid(1234)
        .tid(1)
        .ts(1_014_500)
        .id(1)
        .build();
    writer.write_event(&load_end)?;

    // Async span beginning on one thread and ending on another.
    let mut request_begin = EventRecord::builder()
        .name("NetworkRequest".to_string())
        .cat(Category::Custom)
        .ph(Phase::AsyncBegin)
        .pid(1234)
        .tid(1)
        .ts(1_012_000)
        .id(2)
        .build();
    request_begin.add_arg("url", "https://example.com/data");
    writer.write_event(&request_begin)?;

    let mut request_end = EventRecord::builder()
        .name("NetworkRequest".to_string())
        .cat(Category::Custom)
        .ph(Phase::AsyncEnd)
        .pid(1234)
        .tid(2)
        .ts(1_020_000)
        .id(2)
        .build();
    request_end.add_arg("status", 200);
    writer.write_event(&request_end)?;

    let events = writer.events_written();
    writer.finish()?;
    println!("{} events written to {}", events, output_file);
    Ok(())
}
