use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Once};
use std::thread;
use std::time::Duration;

use rstest::{fixture, rstest};
use selftrace::{Category, EventRecord, Phase, Tracer, TracerConfig, TracerError};
use tempfile::TempDir;

static INIT: Once = Once::new();

fn init_tracing() {
    INIT.call_once(|| {
        tracing_subscriber::fmt()
            .with_env_filter(
                tracing_subscriber::EnvFilter::try_from_default_env()
                    .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn")),
            )
            .init();
    });
}

#[fixture]
fn trace_dir() -> TempDir {
    init_tracing();
    TempDir::new().expect("failed to create temp dir")
}

fn tracer_in(dir: &TempDir) -> Tracer {
    Tracer::with_config(TracerConfig {
        output_dir: dir.path().to_path_buf(),
    })
}

fn test_record(name: &str) -> EventRecord {
    EventRecord::builder()
        .name(name.to_string())
        .cat(Category::Instant)
        .ph(Phase::Instant)
        .pid(1)
        .tid(1)
        .ts(0)
        .build()
}

/// Trace files in `dir`, sorted by file name, each parsed as a JSON array.
fn read_sessions(dir: &Path) -> Vec<(PathBuf, Vec<serde_json::Value>)> {
    let mut paths: Vec<PathBuf> = fs::read_dir(dir)
        .expect("failed to read trace dir")
        .map(|entry| entry.expect("failed to read dir entry").path())
        .filter(|path| path.extension().is_some_and(|ext| ext == "json"))
        .collect();
    paths.sort();

    paths
        .into_iter()
        .map(|path| {
            let content = fs::read_to_string(&path).expect("failed to read trace file");
            let events: Vec<serde_json::Value> =
                serde_json::from_str(&content).expect("trace file is not a valid JSON array");
            (path, events)
        })
        .collect()
}

fn single_session(dir: &Path) -> Vec<serde_json::Value> {
    let mut sessions = read_sessions(dir);
    assert_eq!(sessions.len(), 1, "expected exactly one trace file");
    sessions.remove(0).1
}

#[rstest]
fn records_are_written_in_enqueue_order(trace_dir: TempDir) {
    let tracer = tracer_in(&trace_dir);
    tracer.start_session("fifo").unwrap();
    for i in 0..100 {
        tracer.submit(test_record(&format!("event-{i:03}"))).unwrap();
    }
    tracer.end_session();
    drop(tracer);

    let events = single_session(trace_dir.path());
    assert_eq!(events.len(), 100);
    for (i, event) in events.iter().enumerate() {
        assert_eq!(event["name"], format!("event-{i:03}"));
    }
}

#[rstest]
fn immediate_shutdown_loses_nothing(trace_dir: TempDir) {
    let tracer = tracer_in(&trace_dir);
    tracer.start_session("burst").unwrap();
    for i in 0..500 {
        tracer.submit(test_record(&format!("event-{i}"))).unwrap();
    }
    tracer.end_session();
    drop(tracer);

    // Parsing validates the array structure, including the closing bracket.
    let events = single_session(trace_dir.path());
    assert_eq!(events.len(), 500);
    assert_eq!(tracer_count_distinct(&events), 500);
}

fn tracer_count_distinct(events: &[serde_json::Value]) -> usize {
    events
        .iter()
        .map(|event| event["name"].as_str().unwrap().to_string())
        .collect::<std::collections::HashSet<_>>()
        .len()
}

#[rstest]
fn scope_produces_one_complete_event_with_plausible_duration(trace_dir: TempDir) {
    let tracer = tracer_in(&trace_dir);
    tracer.start_session("scope").unwrap();
    {
        let mut scope = tracer.scope("work");
        scope.add_arg("stage", "test");
        thread::sleep(Duration::from_millis(50));
    }
    tracer.end_session();
    drop(tracer);

    let events = single_session(trace_dir.path());
    assert_eq!(events.len(), 1);
    let event = &events[0];
    assert_eq!(event["cat"], "Scope");
    assert_eq!(event["ph"], "X");
    assert_eq!(event["args"]["stage"], "test");

    let dur = event["dur"].as_i64().unwrap();
    assert!(dur >= 50_000, "duration {dur}us shorter than the sleep");
    assert!(dur < 5_000_000, "duration {dur}us implausibly long");
}

#[rstest]
fn nested_scopes_each_report_their_own_duration(trace_dir: TempDir) {
    let tracer = tracer_in(&trace_dir);
    tracer.start_session("nested").unwrap();
    {
        let _outer = tracer.scope("outer");
        thread::sleep(Duration::from_millis(20));
        {
            let _inner = tracer.scope("inner");
            thread::sleep(Duration::from_millis(20));
        }
    }
    tracer.end_session();
    drop(tracer);

    let events = single_session(trace_dir.path());
    assert_eq!(events.len(), 2);
    // Inner closes first, so it is written first.
    assert_eq!(events[0]["name"], "inner");
    assert_eq!(events[1]["name"], "outer");
    let inner_dur = events[0]["dur"].as_i64().unwrap();
    let outer_dur = events[1]["dur"].as_i64().unwrap();
    assert!(outer_dur >= inner_dur);
}

#[rstest]
fn async_custom_span_pairs_by_id(trace_dir: TempDir) {
    let tracer = tracer_in(&trace_dir);
    tracer.start_session("async").unwrap();

    let handle = tracer.start_custom_async("X");
    let id = handle.id();
    handle.add_arg("outcome", "ok");
    tracer.end_custom_async("X");

    // Unmatched end: safe no-op, no extra records.
    tracer.end_custom_async("Y");
    assert!(tracer.get_custom_async("Y").is_none());

    tracer.end_session();
    drop(tracer);

    let events = single_session(trace_dir.path());
    assert_eq!(events.len(), 2);
    assert_eq!(events[0]["ph"], "b");
    assert_eq!(events[1]["ph"], "e");
    assert_eq!(events[0]["id"].as_u64().unwrap(), id);
    assert_eq!(events[1]["id"].as_u64().unwrap(), id);
    // Args attached while open ride on the end half only.
    assert!(events[0].get("args").is_none());
    assert_eq!(events[1]["args"]["outcome"], "ok");
}

#[rstest]
fn async_span_can_end_on_another_thread(trace_dir: TempDir) {
    let tracer = Arc::new(tracer_in(&trace_dir));
    tracer.start_session("cross-thread").unwrap();

    tracer.start_custom_async("handoff");
    let worker = {
        let tracer = Arc::clone(&tracer);
        thread::spawn(move || tracer.end_custom_async("handoff"))
    };
    worker.join().unwrap();

    tracer.end_session();
    let dir = trace_dir.path().to_path_buf();
    drop(Arc::try_unwrap(tracer).ok().expect("tracer still shared"));

    let events = single_session(&dir);
    assert_eq!(events.len(), 2);
    assert_eq!(events[0]["ph"], "b");
    assert_eq!(events[1]["ph"], "e");
    assert_eq!(events[0]["id"], events[1]["id"]);
    assert_ne!(events[0]["tid"], events[1]["tid"]);
}

#[rstest]
fn sync_and_async_tables_are_independent(trace_dir: TempDir) {
    let tracer = tracer_in(&trace_dir);
    tracer.start_session("tables").unwrap();

    let sync_id = tracer.start_custom("X").id();
    let async_id = tracer.start_custom_async("X").id();
    assert_ne!(sync_id, async_id);

    tracer.end_custom_async("X");
    assert!(tracer.get_custom("X").is_some(), "sync span must stay open");
    tracer.end_custom("X");

    tracer.end_session();
    drop(tracer);

    let events = single_session(trace_dir.path());
    let phases: Vec<_> = events
        .iter()
        .map(|event| event["ph"].as_str().unwrap())
        .collect();
    assert_eq!(phases, ["B", "b", "e", "E"]);
    assert_eq!(events[1]["id"], events[2]["id"]);
    assert_eq!(events[0]["id"], events[3]["id"]);
}

#[rstest]
fn instant_args_are_stringified(trace_dir: TempDir) {
    let tracer = tracer_in(&trace_dir);
    tracer.start_session("args").unwrap();
    {
        let mut instant = tracer.instant("marker");
        instant.add_arg("k1", 5);
        instant.add_arg("k2", "v");
    }
    tracer.end_session();
    drop(tracer);

    let events = single_session(trace_dir.path());
    assert_eq!(events.len(), 1);
    assert_eq!(events[0]["ph"], "i");
    assert_eq!(events[0]["s"], "t");
    assert_eq!(
        events[0]["args"],
        serde_json::json!({"k1": "5", "k2": "v"})
    );
}

#[rstest]
fn session_reentry_produces_two_finalized_files(trace_dir: TempDir) {
    let tracer = tracer_in(&trace_dir);

    tracer.start_session("alpha").unwrap();
    for i in 0..50 {
        tracer.submit(test_record(&format!("alpha-{i}"))).unwrap();
    }
    tracer.end_session();

    // Must block until alpha's writer has fully drained and closed its file.
    tracer.start_session("beta").unwrap();
    for i in 0..10 {
        tracer.submit(test_record(&format!("beta-{i}"))).unwrap();
    }
    tracer.end_session();
    drop(tracer);

    let sessions = read_sessions(trace_dir.path());
    assert_eq!(sessions.len(), 2);
    let alpha = sessions
        .iter()
        .find(|(path, _)| path.file_name().unwrap().to_string_lossy().starts_with("alpha_"))
        .expect("missing alpha session file");
    let beta = sessions
        .iter()
        .find(|(path, _)| path.file_name().unwrap().to_string_lossy().starts_with("beta_"))
        .expect("missing beta session file");
    assert_eq!(alpha.1.len(), 50);
    assert_eq!(beta.1.len(), 10);
}

#[rstest]
fn starting_while_active_is_rejected(trace_dir: TempDir) {
    let tracer = tracer_in(&trace_dir);
    tracer.start_session("first").unwrap();

    let err = tracer.start_session("second").unwrap_err();
    assert!(matches!(err, TracerError::SessionActive));

    tracer.end_session();
}

#[rstest]
fn submission_without_session_is_dropped_and_counted(trace_dir: TempDir) {
    let tracer = tracer_in(&trace_dir);

    let err = tracer.submit(test_record("orphan")).unwrap_err();
    assert!(matches!(err, TracerError::SessionInactive));

    // Guards swallow the error instead of crashing the producer.
    {
        let _scope = tracer.scope("orphan scope");
    }

    assert_eq!(tracer.dropped_events(), 2);
    drop(tracer);
    assert!(read_sessions(trace_dir.path()).is_empty());
}

#[rstest]
fn concurrent_producers_interleave_without_loss(trace_dir: TempDir) {
    let tracer = Arc::new(tracer_in(&trace_dir));
    tracer.start_session("parallel").unwrap();

    let mut producers = Vec::new();
    for p in 0..4 {
        let tracer = Arc::clone(&tracer);
        producers.push(thread::spawn(move || {
            for i in 0..100 {
                tracer
                    .submit(test_record(&format!("p{p}-{i}")))
                    .expect("session should be active");
            }
        }));
    }
    for producer in producers {
        producer.join().unwrap();
    }

    tracer.end_session();
    let dir = trace_dir.path().to_path_buf();
    drop(Arc::try_unwrap(tracer).ok().expect("tracer still shared"));

    let events = single_session(&dir);
    assert_eq!(events.len(), 400);
    assert_eq!(tracer_count_distinct(&events), 400);
}
