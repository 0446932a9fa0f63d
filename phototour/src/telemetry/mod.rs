//! Tour telemetry: lock-free counters and logging initialization.
//!
//! The engine records playback events on atomic counters with minimal
//! overhead; views take a [`MetricsSnapshot`] for display. Logging goes
//! through `tracing` with an env-filter (`RUST_LOG`), optionally teeing
//! into a daily-rolled log file.

use std::path::Path;
use std::sync::atomic::{AtomicU64, Ordering};

use tracing_subscriber::fmt::time::LocalTime;
use tracing_subscriber::EnvFilter;

/// Lock-free playback counters shared across the engine.
#[derive(Debug, Default)]
pub struct TourMetrics {
    arrivals: AtomicU64,
    popups_opened: AtomicU64,
    popups_suppressed: AtomicU64,
    popups_autoclosed: AtomicU64,
    tours_completed: AtomicU64,
}

impl TourMetrics {
    pub fn new() -> Self {
        Self::default()
    }

    /// A waypoint arrival was detected.
    pub fn arrival(&self) {
        self.arrivals.fetch_add(1, Ordering::Relaxed);
    }

    /// A popup became visible.
    pub fn popup_opened(&self) {
        self.popups_opened.fetch_add(1, Ordering::Relaxed);
    }

    /// An unforced open was suppressed by an already-visible popup.
    pub fn popup_suppressed(&self) {
        self.popups_suppressed.fetch_add(1, Ordering::Relaxed);
    }

    /// A playback popup was closed by its timer.
    pub fn popup_autoclosed(&self) {
        self.popups_autoclosed.fetch_add(1, Ordering::Relaxed);
    }

    /// The tour reached its final waypoint and restarted.
    pub fn tour_completed(&self) {
        self.tours_completed.fetch_add(1, Ordering::Relaxed);
    }

    /// Take a point-in-time copy of all counters.
    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            arrivals: self.arrivals.load(Ordering::Relaxed),
            popups_opened: self.popups_opened.load(Ordering::Relaxed),
            popups_suppressed: self.popups_suppressed.load(Ordering::Relaxed),
            popups_autoclosed: self.popups_autoclosed.load(Ordering::Relaxed),
            tours_completed: self.tours_completed.load(Ordering::Relaxed),
        }
    }
}

/// Point-in-time copy of the playback counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MetricsSnapshot {
    pub arrivals: u64,
    pub popups_opened: u64,
    pub popups_suppressed: u64,
    pub popups_autoclosed: u64,
    pub tours_completed: u64,
}

impl std::fmt::Display for MetricsSnapshot {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "arrivals: {}, popups: {} opened / {} suppressed / {} auto-closed, tours: {}",
            self.arrivals,
            self.popups_opened,
            self.popups_suppressed,
            self.popups_autoclosed,
            self.tours_completed
        )
    }
}

/// Initialize tracing for the process.
///
/// Filter comes from `RUST_LOG`, defaulting to `info`. When `log_dir` is
/// given, output is written to a daily-rolled file there instead of
/// stderr; the returned guard must be held for the file writer to flush.
///
/// Safe to call once per process; later calls are ignored.
pub fn init_logging(log_dir: Option<&Path>) -> Option<tracing_appender::non_blocking::WorkerGuard> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let timer = LocalTime::rfc_3339();

    match log_dir {
        Some(dir) => {
            let appender = tracing_appender::rolling::daily(dir, "phototour.log");
            let (writer, guard) = tracing_appender::non_blocking(appender);
            let _ = tracing_subscriber::fmt()
                .with_env_filter(filter)
                .with_timer(timer)
                .with_writer(writer)
                .with_ansi(false)
                .try_init();
            Some(guard)
        }
        None => {
            let _ = tracing_subscriber::fmt()
                .with_env_filter(filter)
                .with_timer(timer)
                .try_init();
            None
        }
    }
}
