//! Status sink port (driving/primary side)
//!
//! The engine is a producer toward a presentation sink: four non-negative
//! counters, pushed on every observable change. The sink must be cheap
//! and non-blocking; it is called from executor workers.

use crate::domain::counters::CounterSnapshot;

/// Port trait for receiving counter updates during a run
pub trait IStatusSink: Send + Sync {
    /// Called after every counter mutation with a fresh snapshot
    fn update(&self, counters: CounterSnapshot);
}

/// Sink that discards all updates
///
/// Used by machine-readable output modes (which emit a single summary at
/// the end) and by tests that don't observe progress.
#[derive(Debug, Default, Clone, Copy)]
pub struct NullStatusSink;

impl IStatusSink for NullStatusSink {
    fn update(&self, _counters: CounterSnapshot) {}
}
