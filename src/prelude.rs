//! Convenient imports for common `workflow_exec` usage.
//!
//! Import with:
//! `use workflow_exec::prelude::*;`
//!
//! Re-exports are feature-gated to match this crate's `worker`, `client` and
//! `local` feature flags.

/// Core type-safe workflow/activity traits (always available).
pub use crate::traits::{Activity, Workflow};

/// Cancellation scope, errors and option layering (always available).
pub use crate::{
    context::Context,
    error::{Error, Result},
    options::{Layered, RetryPolicy, merge_options},
};

/// Async trait macro used by workflow/activity implementations.
#[cfg(feature = "worker")]
pub use async_trait::async_trait;

/// Worker-side activity context and activity scheduling options.
#[cfg(feature = "worker")]
pub use crate::activity::{ActivityCancellationType, ActivityContext, ActivityOptions};

/// Worker-side workflow runtime context and child workflow options.
#[cfg(feature = "worker")]
pub use crate::workflow::{ChildWorkflowOptions, WorkflowContext};

/// Activity and child workflow execution helpers.
#[cfg(feature = "worker")]
pub use crate::{
    future::{ActivityFuture, ChildWorkflowFuture},
    run::{
        run_async_activity, run_async_activity_no_result, run_async_child_workflow,
        run_async_child_workflow_no_result, run_sync_activity, run_sync_activity_no_result,
        run_sync_child_workflow, run_sync_child_workflow_no_result,
    },
};

/// Client-side typed wrapper APIs.
#[cfg(feature = "client")]
pub use crate::client::{Client, StartWorkflowOptions, TypedWorkflowHandle};

/// Top-level workflow execution helpers.
#[cfg(feature = "client")]
pub use crate::{
    future::WorkflowFuture,
    run::{
        run_async_workflow, run_async_workflow_no_result, run_sync_workflow,
        run_sync_workflow_no_result,
    },
};

/// In-process engine and registration helpers.
#[cfg(feature = "local")]
pub use crate::{
    traits::{ActivityRegistration, WorkflowRegistration},
    worker::{LocalEngine, Worker, WorkerOptions},
};
