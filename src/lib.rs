//! Type-safe, blocking and non-blocking execution of activities, workflows and
//! child workflows.
//!
//! This crate provides:
//! - Trait-based workflow/activity definitions ([`crate::traits::Workflow`],
//!   [`crate::traits::Activity`]).
//! - Twelve execution helpers in [`crate::run`]: {activity, workflow, child
//!   workflow} × {sync, async} × {with result, without result}.
//! - Explicit future handles for the asynchronous forms.
//! - Layered execution options with last-write-wins precedence.
//! - Engine capability traits plus an in-process engine for running and
//!   testing everything without a server.
//!
//! Durability, history and replay are the engine's business; the helpers only
//! forward arguments and hand back whatever the engine returns.

/// Activity context and activity execution options.
#[cfg(feature = "worker")]
pub mod activity;
/// Type-safe client wrapper and typed workflow handles.
#[cfg(feature = "client")]
pub mod client;
/// Cancellation and deadline propagation.
pub mod context;
/// Capabilities an orchestration engine provides.
pub mod engine;
/// Engine failures.
pub mod error;
/// Deferred results of asynchronous executions.
pub mod future;
/// Layered options.
pub mod options;
/// JSON payload conversion.
pub mod payload;
/// Convenient re-exports for common imports.
pub mod prelude;
/// Synchronous and asynchronous execution helpers.
pub mod run;
/// Core `Workflow` / `Activity` traits and worker registration adapters.
pub mod traits;
/// In-process worker and engine.
#[cfg(feature = "local")]
pub mod worker;
/// Workflow execution context and child workflow options.
#[cfg(feature = "worker")]
pub mod workflow;

pub use context::Context;
pub use error::{Error, Result};

/// Re-export of the in-process worker API.
#[cfg(feature = "local")]
pub use worker::{LocalEngine, Worker, WorkerOptions};
