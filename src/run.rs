//! Blocking and non-blocking execution of activities, workflows and child
//! workflows, with or without a result.
//!
//! Every helper takes zero or more option layers (`opts`), folded left to
//! right on top of the options the context or client already carries: a field
//! set by a later layer wins. Errors are whatever the engine reports, returned
//! unchanged.
//!
//! ```ignore
//! let total = run_sync_activity::<ChargeCard>(&ctx, order, []).await?;
//!
//! let shipping = run_async_activity::<ReserveShipping>(&ctx, order, [fast]);
//! // ... other work ...
//! let label = shipping.await?;
//! ```

use tracing::debug;

#[cfg(feature = "client")]
use crate::{
    client::{Client, StartWorkflowOptions},
    context::Context,
    future::WorkflowFuture,
};
#[cfg(feature = "worker")]
use crate::{
    activity::ActivityOptions,
    future::{ActivityFuture, ChildWorkflowFuture},
    workflow::{ChildWorkflowOptions, WorkflowContext},
};
use crate::{
    error::Result,
    future::{decode_output, discard_output},
    traits::Workflow,
};
#[cfg(feature = "worker")]
use crate::traits::Activity;

/// Executes an activity and waits for its result.
#[cfg(feature = "worker")]
pub async fn run_sync_activity<T: Activity>(
    ctx: &WorkflowContext,
    input: T::Input,
    opts: impl IntoIterator<Item = ActivityOptions>,
) -> Result<T::Output> {
    run_async_activity::<T>(ctx, input, opts).get().await
}

/// Executes an activity and waits for it to finish, discarding its result.
#[cfg(feature = "worker")]
pub async fn run_sync_activity_no_result<T: Activity>(
    ctx: &WorkflowContext,
    input: T::Input,
    opts: impl IntoIterator<Item = ActivityOptions>,
) -> Result<()> {
    run_async_activity_no_result::<T>(ctx, input, opts).get().await
}

/// Schedules an activity and returns a handle to its result without waiting.
#[cfg(feature = "worker")]
pub fn run_async_activity<T: Activity>(
    ctx: &WorkflowContext,
    input: T::Input,
    opts: impl IntoIterator<Item = ActivityOptions>,
) -> ActivityFuture<T::Output> {
    let options = ctx.effective_activity_options::<T>(opts);
    ActivityFuture::new(ctx.schedule_activity::<T>(options, input), decode_output)
}

/// Schedules an activity and returns a handle that only reports failure.
#[cfg(feature = "worker")]
pub fn run_async_activity_no_result<T: Activity>(
    ctx: &WorkflowContext,
    input: T::Input,
    opts: impl IntoIterator<Item = ActivityOptions>,
) -> ActivityFuture<()> {
    let options = ctx.effective_activity_options::<T>(opts);
    ActivityFuture::new(ctx.schedule_activity::<T>(options, input), discard_output)
}

/// Starts a workflow and waits for its result.
#[cfg(feature = "client")]
pub async fn run_sync_workflow<W: Workflow>(
    ctx: &Context,
    client: &Client,
    input: W::Input,
    opts: impl IntoIterator<Item = StartWorkflowOptions>,
) -> Result<W::Output> {
    let options = client.effective_options(opts);
    let handle = client.start_workflow::<W>(ctx, options, input).await?;
    handle.get_result(ctx).await
}

/// Starts a workflow and waits for it to close, discarding its result.
#[cfg(feature = "client")]
pub async fn run_sync_workflow_no_result<W: Workflow>(
    ctx: &Context,
    client: &Client,
    input: W::Input,
    opts: impl IntoIterator<Item = StartWorkflowOptions>,
) -> Result<()> {
    let options = client.effective_options(opts);
    let handle = client.start_workflow::<W>(ctx, options, input).await?;
    handle.wait(ctx).await
}

/// Starts a workflow and returns a handle to its result.
///
/// Only the start round-trip is awaited. A failed start is kept in the handle.
#[cfg(feature = "client")]
pub async fn run_async_workflow<W: Workflow>(
    ctx: &Context,
    client: &Client,
    input: W::Input,
    opts: impl IntoIterator<Item = StartWorkflowOptions>,
) -> WorkflowFuture<W::Output> {
    let options = client.effective_options(opts);
    match client.start_workflow::<W>(ctx, options, input).await {
        Ok(handle) => WorkflowFuture::started(handle.into_inner(), decode_output),
        Err(err) => {
            debug!(workflow = W::TYPE, error = %err, "workflow start failed");
            WorkflowFuture::failed(err, decode_output)
        }
    }
}

/// Starts a workflow and returns a handle that only reports failure.
#[cfg(feature = "client")]
pub async fn run_async_workflow_no_result<W: Workflow>(
    ctx: &Context,
    client: &Client,
    input: W::Input,
    opts: impl IntoIterator<Item = StartWorkflowOptions>,
) -> WorkflowFuture<()> {
    let options = client.effective_options(opts);
    match client.start_workflow::<W>(ctx, options, input).await {
        Ok(handle) => WorkflowFuture::started(handle.into_inner(), discard_output),
        Err(err) => {
            debug!(workflow = W::TYPE, error = %err, "workflow start failed");
            WorkflowFuture::failed(err, discard_output)
        }
    }
}

/// Executes a child workflow and waits for its result.
#[cfg(feature = "worker")]
pub async fn run_sync_child_workflow<W: Workflow>(
    ctx: &WorkflowContext,
    input: W::Input,
    opts: impl IntoIterator<Item = ChildWorkflowOptions>,
) -> Result<W::Output> {
    run_async_child_workflow::<W>(ctx, input, opts).get().await
}

/// Executes a child workflow and waits for it to close, discarding its result.
#[cfg(feature = "worker")]
pub async fn run_sync_child_workflow_no_result<W: Workflow>(
    ctx: &WorkflowContext,
    input: W::Input,
    opts: impl IntoIterator<Item = ChildWorkflowOptions>,
) -> Result<()> {
    run_async_child_workflow_no_result::<W>(ctx, input, opts)
        .get()
        .await
}

/// Schedules a child workflow and returns a handle to its result.
///
/// Scheduling from a workflow context cannot fail on its own; every failure
/// is delivered through the handle.
#[cfg(feature = "worker")]
pub fn run_async_child_workflow<W: Workflow>(
    ctx: &WorkflowContext,
    input: W::Input,
    opts: impl IntoIterator<Item = ChildWorkflowOptions>,
) -> ChildWorkflowFuture<W::Output> {
    let options = ctx.effective_child_workflow_options(opts);
    ChildWorkflowFuture::new(ctx.schedule_child_workflow::<W>(options, input), decode_output)
}

/// Schedules a child workflow and returns a handle that only reports failure.
#[cfg(feature = "worker")]
pub fn run_async_child_workflow_no_result<W: Workflow>(
    ctx: &WorkflowContext,
    input: W::Input,
    opts: impl IntoIterator<Item = ChildWorkflowOptions>,
) -> ChildWorkflowFuture<()> {
    let options = ctx.effective_child_workflow_options(opts);
    ChildWorkflowFuture::new(ctx.schedule_child_workflow::<W>(options, input), discard_output)
}
