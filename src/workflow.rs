//! Workflow-side runtime helpers.

use std::{fmt, sync::Arc, time::Duration};

use futures::future::{self, try_join_all};
use tracing::trace;

use crate::{
    activity::ActivityOptions,
    context::Context,
    engine::{ActivityRequest, ChildWorkflowRequest, PendingResult, WorkflowRuntime},
    error::Result,
    options::{Layered, RetryPolicy, merge_options, pick},
    payload::AsJsonPayloadExt,
    run::run_async_activity,
    traits::{Activity, Workflow},
};

/// Metadata about a running workflow execution.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WorkflowInfo {
    /// Namespace of the execution.
    pub namespace: String,
    /// Workflow id.
    pub workflow_id: String,
    /// Run id.
    pub run_id: String,
    /// Workflow type identifier.
    pub workflow_type: String,
    /// Task queue the execution runs on.
    pub task_queue: String,
}

/// Options used when starting a child workflow from a parent workflow.
#[derive(Default, Debug, Clone, PartialEq)]
pub struct ChildWorkflowOptions {
    /// Workflow id of the child. If `None`, the engine generates one.
    pub workflow_id: Option<String>,
    /// Task queue of the child. If `None`, use the parent's.
    pub task_queue: Option<String>,
    /// Total time the child, including continue-as-new runs, may take.
    pub execution_timeout: Option<Duration>,
    /// Time a single run of the child may take.
    pub run_timeout: Option<Duration>,
    /// Time a single workflow task may take.
    pub task_timeout: Option<Duration>,
    /// Retry policy for the child.
    pub retry_policy: Option<RetryPolicy>,
    /// Human readable summary.
    pub summary: Option<String>,
}

impl ChildWorkflowOptions {
    /// Sets the child workflow id.
    pub fn with_workflow_id(mut self, workflow_id: impl Into<String>) -> Self {
        self.workflow_id = Some(workflow_id.into());
        self
    }

    /// Sets the task queue.
    pub fn with_task_queue(mut self, task_queue: impl Into<String>) -> Self {
        self.task_queue = Some(task_queue.into());
        self
    }

    /// Sets the execution timeout.
    pub fn with_execution_timeout(mut self, timeout: Duration) -> Self {
        self.execution_timeout = Some(timeout);
        self
    }
}

impl Layered for ChildWorkflowOptions {
    fn layer(self, over: Self) -> Self {
        Self {
            workflow_id: pick(self.workflow_id, over.workflow_id),
            task_queue: pick(self.task_queue, over.task_queue),
            execution_timeout: pick(self.execution_timeout, over.execution_timeout),
            run_timeout: pick(self.run_timeout, over.run_timeout),
            task_timeout: pick(self.task_timeout, over.task_timeout),
            retry_policy: pick(self.retry_policy, over.retry_policy),
            summary: pick(self.summary, over.summary),
        }
    }
}

/// Context passed to workflow implementations.
///
/// This is the execution context activities and child workflows are invoked
/// under: it carries cancellation, the engine handle and the option layers
/// set with [`Self::with_activity_options`] and
/// [`Self::with_child_workflow_options`].
#[derive(Clone)]
pub struct WorkflowContext {
    runtime: Arc<dyn WorkflowRuntime>,
    ctx: Context,
    info: Option<WorkflowInfo>,
    activity_options: ActivityOptions,
    child_options: ChildWorkflowOptions,
}

impl fmt::Debug for WorkflowContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WorkflowContext")
            .field("ctx", &self.ctx)
            .field("info", &self.info)
            .field("activity_options", &self.activity_options)
            .field("child_options", &self.child_options)
            .finish_non_exhaustive()
    }
}

impl WorkflowContext {
    /// Creates a workflow context. Called by engines when an execution starts.
    pub fn new(runtime: Arc<dyn WorkflowRuntime>, ctx: Context, info: Option<WorkflowInfo>) -> Self {
        Self {
            runtime,
            ctx,
            info,
            activity_options: ActivityOptions::default(),
            child_options: ChildWorkflowOptions::default(),
        }
    }

    /// Metadata of the running execution, if the engine provided any.
    pub fn info(&self) -> Option<&WorkflowInfo> {
        self.info.as_ref()
    }

    /// The cancellation scope of the execution.
    pub fn context(&self) -> &Context {
        &self.ctx
    }

    /// Activity options carried by this context.
    pub fn activity_options(&self) -> &ActivityOptions {
        &self.activity_options
    }

    /// Child workflow options carried by this context.
    pub fn child_workflow_options(&self) -> &ChildWorkflowOptions {
        &self.child_options
    }

    /// Returns a context with `options` layered over the carried activity options.
    pub fn with_activity_options(&self, options: ActivityOptions) -> Self {
        let mut ctx = self.clone();
        ctx.activity_options = ctx.activity_options.layer(options);
        ctx
    }

    /// Returns a context with `options` layered over the carried child workflow options.
    pub fn with_child_workflow_options(&self, options: ChildWorkflowOptions) -> Self {
        let mut ctx = self.clone();
        ctx.child_options = ctx.child_options.layer(options);
        ctx
    }

    /// Effective options for one activity call:
    /// `T::default_options()`, then the carried options, then `layers` in order.
    pub fn effective_activity_options<T: Activity>(
        &self,
        layers: impl IntoIterator<Item = ActivityOptions>,
    ) -> ActivityOptions {
        let base = T::default_options().layer(self.activity_options.clone());
        merge_options(base, layers)
    }

    /// Effective options for one child workflow call:
    /// the carried options, then `layers` in order.
    pub fn effective_child_workflow_options(
        &self,
        layers: impl IntoIterator<Item = ChildWorkflowOptions>,
    ) -> ChildWorkflowOptions {
        merge_options(self.child_options.clone(), layers)
    }

    /// Hands an activity to the engine without waiting for it.
    pub(crate) fn schedule_activity<T: Activity>(
        &self,
        options: ActivityOptions,
        input: T::Input,
    ) -> PendingResult {
        let input = match input.as_json_payload() {
            Ok(payload) => payload,
            Err(err) => return Box::pin(future::ready(Err(err))),
        };
        trace!(activity = T::TYPE, "scheduling activity");
        self.runtime.schedule_activity(ActivityRequest {
            activity_type: T::TYPE.to_owned(),
            input,
            options,
            ctx: self.ctx.clone(),
            workflow: self.info.clone(),
        })
    }

    /// Hands a child workflow to the engine without waiting for it.
    pub(crate) fn schedule_child_workflow<W: Workflow>(
        &self,
        options: ChildWorkflowOptions,
        input: W::Input,
    ) -> PendingResult {
        let input = match input.as_json_payload() {
            Ok(payload) => payload,
            Err(err) => return Box::pin(future::ready(Err(err))),
        };
        trace!(workflow = W::TYPE, "scheduling child workflow");
        self.runtime.schedule_child_workflow(ChildWorkflowRequest {
            workflow_type: W::TYPE.to_owned(),
            input,
            options,
            ctx: self.ctx.clone(),
            parent: self.info.clone(),
        })
    }

    /// Executes many activities concurrently.
    ///
    /// All activities are scheduled before the first one is awaited. The
    /// returned vector preserves input order; the first failure is returned.
    pub async fn execute_activities<T: Activity>(
        &self,
        inputs: Vec<T::Input>,
        opts: impl IntoIterator<Item = ActivityOptions>,
    ) -> Result<Vec<T::Output>> {
        let options = self.effective_activity_options::<T>(opts);
        let pending: Vec<_> = inputs
            .into_iter()
            .map(|input| run_async_activity::<T>(self, input, Some(options.clone())))
            .collect();
        try_join_all(pending.into_iter().map(|f| f.get())).await
    }
}
