//! Capabilities an orchestration engine provides to this crate.
//!
//! Everything durable (history, replay, task queues, retries, timers) lives
//! behind these traits. The in-process [`crate::worker::LocalEngine`] is one
//! implementation; a networked engine client is another.

#[cfg(feature = "client")]
use async_trait::async_trait;
#[cfg(feature = "worker")]
use futures::future::BoxFuture;

#[cfg(feature = "client")]
use crate::client::StartWorkflowOptions;
#[cfg(feature = "worker")]
use crate::{
    activity::ActivityOptions,
    workflow::{ChildWorkflowOptions, WorkflowInfo},
};
use crate::{context::Context, error::Result, payload::Payload};

/// A scheduled unit of work whose encoded result is not known yet.
#[cfg(feature = "worker")]
pub type PendingResult = BoxFuture<'static, Result<Payload>>;

/// Request to schedule one activity from inside a workflow.
#[cfg(feature = "worker")]
#[derive(Debug, Clone)]
pub struct ActivityRequest {
    /// Activity type identifier.
    pub activity_type: String,
    /// Encoded activity input.
    pub input: Payload,
    /// Effective options after layering.
    pub options: ActivityOptions,
    /// Scope the activity runs under.
    pub ctx: Context,
    /// The scheduling workflow, if any.
    pub workflow: Option<WorkflowInfo>,
}

/// Request to schedule a child workflow from inside a parent workflow.
#[cfg(feature = "worker")]
#[derive(Debug, Clone)]
pub struct ChildWorkflowRequest {
    /// Workflow type identifier.
    pub workflow_type: String,
    /// Encoded workflow input.
    pub input: Payload,
    /// Effective options after layering.
    pub options: ChildWorkflowOptions,
    /// Parent scope; the child is cancelled together with it.
    pub ctx: Context,
    /// The parent workflow, if any.
    pub parent: Option<WorkflowInfo>,
}

/// Request to start a top-level workflow execution.
#[cfg(feature = "client")]
#[derive(Debug, Clone)]
pub struct StartWorkflowRequest {
    /// Workflow type identifier.
    pub workflow_type: String,
    /// Encoded workflow input.
    pub input: Payload,
    /// Effective options after layering.
    pub options: StartWorkflowOptions,
}

/// Static metadata of a started workflow execution.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WorkflowExecutionInfo {
    /// Namespace the execution belongs to.
    pub namespace: String,
    /// Workflow id of the execution.
    pub workflow_id: String,
    /// Run id assigned by the engine.
    pub run_id: String,
    /// Workflow type identifier.
    pub workflow_type: String,
}

/// Workflow-side capability: schedules nested units of work.
///
/// Scheduling must not block. The returned future resolves once the unit
/// completes, fails, or `ctx` of the request ends.
#[cfg(feature = "worker")]
pub trait WorkflowRuntime: Send + Sync {
    /// Schedules an activity.
    fn schedule_activity(&self, request: ActivityRequest) -> PendingResult;

    /// Schedules a child workflow.
    fn schedule_child_workflow(&self, request: ChildWorkflowRequest) -> PendingResult;
}

/// Client-side capability: starts top-level workflow executions.
#[cfg(feature = "client")]
#[async_trait]
pub trait WorkflowClient: Send + Sync {
    /// Starts a workflow execution and returns a joinable run once the engine accepted it.
    async fn start_workflow(
        &self,
        ctx: &Context,
        request: StartWorkflowRequest,
    ) -> Result<Box<dyn WorkflowRun>>;
}

/// A started workflow execution that can be joined.
#[cfg(feature = "client")]
#[async_trait]
pub trait WorkflowRun: Send + Sync {
    /// Static metadata of the execution.
    fn info(&self) -> &WorkflowExecutionInfo;

    /// Waits for the execution to close, or for `ctx` to end.
    async fn result(&self, ctx: &Context) -> Result<Payload>;
}
