//! Simulated game loop traced with selftrace.
//!
//! Two threads emit scopes, instants, and custom spans into one session,
//! including an async span that starts on the main thread and ends on the
//! worker. A second short session demonstrates session re-entry.
//!
//! Open the resulting `.json` files in chrome://tracing or Perfetto.

use std::path::PathBuf;
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use clap::Parser;
use eyre::Result;
use selftrace::{Tracer, TracerConfig};
use selftrace::{
    trace_custom_async_end, trace_custom_async_start, trace_custom_end, trace_custom_start,
    trace_func, trace_instant, trace_scope,
};

#[derive(Parser)]
#[command(name = "game_loop")]
#[command(about = "simulated game loop traced with selftrace")]
struct Args {
    #[arg(short, long, default_value = ".", help = "directory for session trace files")]
    output_dir: PathBuf,

    #[arg(short, long, default_value_t = 18, help = "frames simulated on the main thread")]
    ticks: u32,

    #[arg(
        short,
        long,
        value_parser = humantime::parse_duration,
        default_value = "8ms",
        help = "base per-frame workload duration"
    )]
    frame_time: Duration,
}

fn init_function(tracer: &Tracer) {
    trace_func!(tracer);
    thread::sleep(Duration::from_millis(52));
}

fn update(tracer: &Tracer, frame_time: Duration, delta_time: f32) {
    trace_func!(tracer, "DeltaTime" => delta_time);
    thread::sleep(frame_time);
}

fn render(tracer: &Tracer, frame_time: Duration) {
    trace_func!(tracer);
    thread::sleep(frame_time / 2);
}

fn worker_loop(tracer: &Tracer, frame_time: Duration) {
    trace_scope!(tracer, "WorkerThread");
    thread::sleep(Duration::from_millis(25));

    trace_instant!(tracer, "Some event happened", "someKey" => 12, "otherKey" => "somevalue");
    thread::sleep(Duration::from_millis(25));
    trace_instant!(tracer, "Some other thing happened, no args");

    trace_custom_async_end!(tracer, "Multithread event", "EndedOn" => "worker");

    let total_ticks = 12u32;
    let mut prev = Instant::now();
    for tick_id in 0..total_ticks {
        trace_scope!(tracer, "Async frame");
        trace_instant!(tracer, "Tick Start", "TickID" => tick_id, "TotalTicks" => total_ticks);

        let delta_time = prev.elapsed().as_secs_f32();
        prev = Instant::now();
        update(tracer, frame_time, delta_time);
        render(tracer, frame_time);
    }
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let args = Args::parse();
    let tracer = Arc::new(Tracer::with_config(TracerConfig {
        output_dir: args.output_dir,
    }));

    tracer.start_session("Profile")?;
    init_function(&tracer);

    // Closed on the worker thread.
    trace_custom_async_start!(tracer, "Multithread event", "StartedOn" => "main");

    let worker = {
        let tracer = Arc::clone(&tracer);
        let frame_time = args.frame_time;
        thread::spawn(move || worker_loop(&tracer, frame_time))
    };

    let mut prev = Instant::now();
    for tick_id in 0..args.ticks {
        trace_scope!(tracer, "Frame", "TickID" => tick_id, "TotalTicks" => args.ticks);

        let delta_time = prev.elapsed().as_secs_f32();
        prev = Instant::now();
        update(&tracer, args.frame_time, delta_time);
        render(&tracer, args.frame_time);

        if tick_id == 2 {
            // Sync custom spans must nest within the enclosing scope.
            trace_custom_start!(tracer, "Custom event", "Some random key" => 1224);
            thread::sleep(Duration::from_millis(26));
            trace_custom_end!(tracer, "Custom event", "Another random key" => "A random value");
        }

        // Async custom spans need no nesting and span several frames.
        if tick_id == 1 {
            trace_custom_async_start!(tracer, "Async Custom event");
        }
        if tick_id == 5 {
            trace_custom_async_end!(tracer, "Async Custom event");
        }
    }

    worker
        .join()
        .map_err(|_| eyre::eyre!("worker thread panicked"))?;
    tracer.end_session();

    tracer.start_session("Other")?;
    init_function(&tracer);
    {
        trace_scope!(tracer, "Empty");
        thread::sleep(Duration::from_millis(93));
    }
    tracer.end_session();

    tracing::info!(dropped = tracer.dropped_events(), "tracing complete");
    Ok(())
}
