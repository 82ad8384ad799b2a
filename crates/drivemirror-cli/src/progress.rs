//! Live status line for interactive runs
//!
//! Repaints a single stderr line in place as counter snapshots arrive.
//! The sink is constructed disabled when stderr is not a terminal, when
//! `--quiet` is set, or in JSON mode, so redirected output never fills
//! with carriage returns.

use std::io::Write;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Mutex;

use drivemirror_core::domain::counters::CounterSnapshot;
use drivemirror_core::ports::IStatusSink;

/// Status sink that rewrites one stderr line per counter update
pub struct ConsoleStatusSink {
    // Updates arrive concurrently from executor workers; repaints must
    // not interleave.
    line: Mutex<()>,
    // A partial line is on screen and needs a trailing newline.
    dirty: AtomicBool,
    enabled: bool,
}

impl ConsoleStatusSink {
    #[must_use]
    pub fn new(enabled: bool) -> Self {
        Self {
            line: Mutex::new(()),
            dirty: AtomicBool::new(false),
            enabled,
        }
    }

    /// Terminates the in-place line so later prints start on a fresh row.
    ///
    /// Call once after the run, before rendering the summary. No-op when
    /// nothing was painted.
    pub fn finish(&self) {
        if !self.enabled {
            return;
        }
        let _guard = self.line.lock().unwrap();
        if self.dirty.swap(false, Ordering::Relaxed) {
            eprintln!();
        }
    }
}

impl IStatusSink for ConsoleStatusSink {
    fn update(&self, counters: CounterSnapshot) {
        if !self.enabled {
            return;
        }
        let _guard = self.line.lock().unwrap();
        let mut stderr = std::io::stderr().lock();
        let _ = write!(
            stderr,
            "\r{} jobs | {} in flight | {} done | {} failed",
            counters.total, counters.in_flight, counters.completed, counters.failed
        );
        let _ = stderr.flush();
        self.dirty.store(true, Ordering::Relaxed);
    }
}
