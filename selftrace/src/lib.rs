//! In-process event tracer.
//!
//! Application threads emit timestamped events (scoped durations, instant
//! markers, named synchronous and asynchronous custom spans) through a shared
//! [`Tracer`]; a single background writer drains them in arrival order and
//! streams them into one Chrome-trace JSON file per session.
//!
//! ```no_run
//! use selftrace::Tracer;
//!
//! let tracer = Tracer::new();
//! tracer.start_session("startup")?;
//! {
//!     let mut scope = tracer.scope("load_config");
//!     scope.add_arg("path", "config.toml");
//! }
//! tracer.end_session();
//! # Ok::<(), selftrace::TracerError>(())
//! ```

use thiserror::Error;

pub mod config;
pub mod queue;
pub mod registry;
pub mod span;
pub mod tracer;

mod macros;
mod writer;

pub use config::TracerConfig;
pub use span::{CustomSpanHandle, InstantGuard, ScopeGuard};
pub use tracer::Tracer;
pub use trace_format::{Category, EventRecord, InstantScope, Phase};

#[derive(Error, Debug)]
pub enum TracerError {
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("trace format error: {0}")]
    Format(#[from] trace_format::FormatError),
    #[error("config error: {0}")]
    Config(#[from] toml::de::Error),
    #[error("no active trace session")]
    SessionInactive,
    #[error("a trace session is already active")]
    SessionActive,
}

pub type Result<T> = std::result::Result<T, TracerError>;

#[cfg(unix)]
pub(crate) fn monotonic_micros() -> i64 {
    let mut ts = libc::timespec {
        tv_sec: 0,
        tv_nsec: 0,
    };
    unsafe {
        libc::clock_gettime(libc::CLOCK_MONOTONIC, &mut ts);
    }
    ts.tv_sec as i64 * 1_000_000 + ts.tv_nsec as i64 / 1_000
}

#[cfg(not(unix))]
pub(crate) fn monotonic_micros() -> i64 {
    use std::sync::OnceLock;
    use std::time::Instant;

    static EPOCH: OnceLock<Instant> = OnceLock::new();
    EPOCH.get_or_init(Instant::now).elapsed().as_micros() as i64
}

/// Integer id of the calling thread, cached per thread after first use.
pub(crate) fn current_thread_id() -> u64 {
    thread_local! {
        static TID: std::cell::Cell<u64> = const { std::cell::Cell::new(0) };
    }
    TID.with(|cell| {
        if cell.get() == 0 {
            cell.set(os_thread_id());
        }
        cell.get()
    })
}

#[cfg(target_os = "linux")]
fn os_thread_id() -> u64 {
    unsafe { libc::syscall(libc::SYS_gettid) as u64 }
}

#[cfg(all(unix, not(target_os = "linux")))]
fn os_thread_id() -> u64 {
    unsafe { libc::pthread_self() as u64 }
}

#[cfg(not(unix))]
fn os_thread_id() -> u64 {
    use std::hash::{Hash, Hasher};

    let mut hasher = std::collections::hash_map::DefaultHasher::new();
    std::thread::current().id().hash(&mut hasher);
    hasher.finish()
}
