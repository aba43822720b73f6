//! Reconciliation engine: diff, dependency ordering, sync execution, health
//! evaluation and the per-application control loop.

pub mod config;
pub mod controller;
pub mod diff;
pub mod error;
pub mod executor;
pub mod graph;
pub mod health;
pub mod reconciler;

pub use config::ControllerConfig;
pub use controller::{AppRegistration, Controller};
pub use diff::diff;
pub use error::{EngineError, Result};
pub use executor::SyncExecutor;
pub use graph::DependencyGraph;
pub use health::HealthEvaluator;
pub use reconciler::LoopCommand;
