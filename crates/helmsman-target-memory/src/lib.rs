//! In-memory target backend.
//!
//! Backs tests and embedded deployments with a lock-free map of live
//! resources, generation counters, a watch broadcast and fault injection
//! hooks for exercising retry and partial-failure paths.

mod store;

pub use store::MemoryTarget;
