//! Activity-side types and configuration helpers.

use std::time::Duration;

use crate::{
    context::Context,
    options::{Layered, RetryPolicy, pick},
    workflow::WorkflowInfo,
};

/// What the engine does when a running activity's scope is cancelled.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum ActivityCancellationType {
    /// Request cancellation and resolve the handle immediately.
    #[default]
    TryCancel,
    /// Request cancellation and wait for the activity to acknowledge it.
    WaitCancellationCompleted,
    /// Resolve the handle immediately and let the activity run to completion.
    Abandon,
}

/// Metadata about the current activity attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ActivityInfo {
    /// Activity type identifier.
    pub activity_type: String,
    /// Identifier of this activity within its workflow.
    pub activity_id: String,
    /// Attempt number, starting at 1.
    pub attempt: u32,
    /// The workflow that scheduled the activity, if any.
    pub workflow: Option<WorkflowInfo>,
}

/// Context passed to activity implementations.
#[derive(Debug, Clone)]
pub struct ActivityContext {
    info: ActivityInfo,
    ctx: Context,
}

impl ActivityContext {
    /// Creates an activity context. Called by engines before each attempt.
    pub fn new(info: ActivityInfo, ctx: Context) -> Self {
        Self { info, ctx }
    }

    /// Metadata about the current attempt.
    pub fn info(&self) -> &ActivityInfo {
        &self.info
    }

    /// Returns true once the engine asked this attempt to stop.
    pub fn is_cancelled(&self) -> bool {
        self.ctx.is_cancelled()
    }

    /// Resolves when the engine asks this attempt to stop.
    pub async fn cancelled(&self) {
        self.ctx.cancellation_token().cancelled().await
    }

    /// The scope the attempt runs under.
    pub fn context(&self) -> &Context {
        &self.ctx
    }
}

/// Options used when scheduling an activity from a workflow.
///
/// Every field is optional so option sets can be layered; see
/// [`crate::options`]. Values are handed to the engine as-is.
#[derive(Default, Debug, Clone, PartialEq)]
pub struct ActivityOptions {
    /// Identifier for the activity within its workflow. Does not need to be unique.
    ///
    /// If `None`, the engine assigns one.
    pub activity_id: Option<String>,
    /// Task queue to schedule the activity on.
    ///
    /// If `None`, use the same task queue as the scheduling workflow.
    pub task_queue: Option<String>,
    /// How long the task may wait in the queue before a worker picks it up.
    pub schedule_to_start_timeout: Option<Duration>,
    /// Maximum duration of a single attempt.
    pub start_to_close_timeout: Option<Duration>,
    /// Maximum duration of all attempts together, retries included.
    pub schedule_to_close_timeout: Option<Duration>,
    /// Maximum interval between heartbeats.
    pub heartbeat_timeout: Option<Duration>,
    /// Behavior on cancellation.
    pub cancellation_type: Option<ActivityCancellationType>,
    /// Retry policy.
    pub retry_policy: Option<RetryPolicy>,
    /// Human readable summary.
    pub summary: Option<String>,
    /// Priority key; lower is more urgent.
    pub priority: Option<u32>,
    /// If true, disable eager execution.
    pub do_not_eagerly_execute: Option<bool>,
}

impl ActivityOptions {
    /// Sets the activity id.
    pub fn with_activity_id(mut self, activity_id: impl Into<String>) -> Self {
        self.activity_id = Some(activity_id.into());
        self
    }

    /// Sets the task queue.
    pub fn with_task_queue(mut self, task_queue: impl Into<String>) -> Self {
        self.task_queue = Some(task_queue.into());
        self
    }

    /// Sets the per-attempt timeout.
    pub fn with_start_to_close_timeout(mut self, timeout: Duration) -> Self {
        self.start_to_close_timeout = Some(timeout);
        self
    }

    /// Sets the overall timeout.
    pub fn with_schedule_to_close_timeout(mut self, timeout: Duration) -> Self {
        self.schedule_to_close_timeout = Some(timeout);
        self
    }

    /// Sets the cancellation behavior.
    pub fn with_cancellation_type(mut self, cancellation_type: ActivityCancellationType) -> Self {
        self.cancellation_type = Some(cancellation_type);
        self
    }

    /// Sets the retry policy.
    pub fn with_retry_policy(mut self, retry_policy: RetryPolicy) -> Self {
        self.retry_policy = Some(retry_policy);
        self
    }
}

impl Layered for ActivityOptions {
    fn layer(self, over: Self) -> Self {
        Self {
            activity_id: pick(self.activity_id, over.activity_id),
            task_queue: pick(self.task_queue, over.task_queue),
            schedule_to_start_timeout: pick(
                self.schedule_to_start_timeout,
                over.schedule_to_start_timeout,
            ),
            start_to_close_timeout: pick(self.start_to_close_timeout, over.start_to_close_timeout),
            schedule_to_close_timeout: pick(
                self.schedule_to_close_timeout,
                over.schedule_to_close_timeout,
            ),
            heartbeat_timeout: pick(self.heartbeat_timeout, over.heartbeat_timeout),
            cancellation_type: pick(self.cancellation_type, over.cancellation_type),
            retry_policy: pick(self.retry_policy, over.retry_policy),
            summary: pick(self.summary, over.summary),
            priority: pick(self.priority, over.priority),
            do_not_eagerly_execute: pick(self.do_not_eagerly_execute, over.do_not_eagerly_execute),
        }
    }
}
