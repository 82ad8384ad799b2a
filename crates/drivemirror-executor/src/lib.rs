//! Bounded asynchronous worker pool
//!
//! This crate provides [`TaskExecutor`], a fixed-size pool of workers fed
//! from one bounded queue. It is the concurrency primitive underneath the
//! mirroring engine: one executor paces folder traversal, a second paces
//! copy jobs, and both expose the same small surface of submitting work
//! and waiting for quiescence.
//!
//! The queue bound is deliberate. Producers that outrun the workers are
//! suspended inside [`TaskExecutor::submit`] until a slot frees up, which
//! keeps memory flat and propagates backpressure all the way to the code
//! discovering new work.

pub mod executor;

pub use executor::{ExecutorError, TaskExecutor, QUEUE_DEPTH_PER_WORKER};
