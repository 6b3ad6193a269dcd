//! Type-safe client abstractions for starting and observing workflows.

use std::{fmt, marker::PhantomData, sync::Arc, time::Duration};

use tracing::debug;
use uuid::Uuid;

pub use crate::engine::WorkflowExecutionInfo;
use crate::{
    context::Context,
    engine::{StartWorkflowRequest, WorkflowClient, WorkflowRun},
    error::Result,
    options::{Layered, RetryPolicy, merge_options, pick},
    payload::{AsJsonPayloadExt, FromJsonPayloadExt},
    traits::Workflow,
};

/// Options for starting a workflow execution.
#[derive(Default, Debug, Clone, PartialEq)]
pub struct StartWorkflowOptions {
    /// Target task queue to schedule the workflow execution on.
    pub task_queue: Option<String>,
    /// Workflow id to use for the execution. If `None`, the engine generates one.
    pub workflow_id: Option<String>,
    /// Optional request id for idempotent start semantics.
    pub request_id: Option<String>,
    /// Total time the execution, including continue-as-new runs, may take.
    pub execution_timeout: Option<Duration>,
    /// Time a single run may take.
    pub run_timeout: Option<Duration>,
    /// Time a single workflow task may take.
    pub task_timeout: Option<Duration>,
    /// Retry policy for the execution.
    pub retry_policy: Option<RetryPolicy>,
}

impl StartWorkflowOptions {
    /// Creates start options for `task_queue`.
    ///
    /// A random workflow id is generated as UUID v4 hex.
    pub fn new(task_queue: impl Into<String>) -> Self {
        Self {
            task_queue: Some(task_queue.into()),
            workflow_id: Some(Uuid::new_v4().simple().to_string()),
            ..Self::default()
        }
    }

    /// Sets the task queue.
    pub fn with_task_queue(mut self, task_queue: impl Into<String>) -> Self {
        self.task_queue = Some(task_queue.into());
        self
    }

    /// Sets the workflow id.
    pub fn with_workflow_id(mut self, workflow_id: impl Into<String>) -> Self {
        self.workflow_id = Some(workflow_id.into());
        self
    }

    /// Sets the request id used for workflow start idempotency.
    pub fn with_request_id(mut self, request_id: impl Into<String>) -> Self {
        self.request_id = Some(request_id.into());
        self
    }

    /// Sets the execution timeout.
    pub fn with_execution_timeout(mut self, timeout: Duration) -> Self {
        self.execution_timeout = Some(timeout);
        self
    }
}

impl Layered for StartWorkflowOptions {
    fn layer(self, over: Self) -> Self {
        Self {
            task_queue: pick(self.task_queue, over.task_queue),
            workflow_id: pick(self.workflow_id, over.workflow_id),
            request_id: pick(self.request_id, over.request_id),
            execution_timeout: pick(self.execution_timeout, over.execution_timeout),
            run_timeout: pick(self.run_timeout, over.run_timeout),
            task_timeout: pick(self.task_timeout, over.task_timeout),
            retry_policy: pick(self.retry_policy, over.retry_policy),
        }
    }
}

/// High-level type-safe wrapper around an engine's [`WorkflowClient`].
///
/// Cheap to clone; clones share the underlying engine client.
#[derive(Clone)]
pub struct Client {
    inner: Arc<dyn WorkflowClient>,
    default_options: StartWorkflowOptions,
}

impl fmt::Debug for Client {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Client")
            .field("default_options", &self.default_options)
            .finish_non_exhaustive()
    }
}

impl Client {
    /// Wraps an engine client.
    pub fn new(inner: Arc<dyn WorkflowClient>) -> Self {
        Self {
            inner,
            default_options: StartWorkflowOptions::default(),
        }
    }

    /// Returns a shared reference to the underlying engine client.
    pub fn inner(&self) -> &Arc<dyn WorkflowClient> {
        &self.inner
    }

    /// Layers `options` over the client's default start options.
    pub fn with_default_options(mut self, options: StartWorkflowOptions) -> Self {
        self.default_options = self.default_options.layer(options);
        self
    }

    /// The start options every call starts from.
    pub fn default_options(&self) -> &StartWorkflowOptions {
        &self.default_options
    }

    /// Effective start options for one call: the defaults, then `layers` in order.
    pub fn effective_options(
        &self,
        layers: impl IntoIterator<Item = StartWorkflowOptions>,
    ) -> StartWorkflowOptions {
        merge_options(self.default_options.clone(), layers)
    }

    /// Starts a typed workflow with exactly the given options.
    ///
    /// The workflow type name is taken from `W::TYPE`, and `input` is encoded
    /// as a JSON payload. Returns once the engine accepted the start.
    pub async fn start_workflow<W>(
        &self,
        ctx: &Context,
        options: StartWorkflowOptions,
        input: W::Input,
    ) -> Result<TypedWorkflowHandle<W>>
    where
        W: Workflow,
    {
        let input = input.as_json_payload()?;
        let run = self
            .inner
            .start_workflow(
                ctx,
                StartWorkflowRequest {
                    workflow_type: W::TYPE.to_owned(),
                    input,
                    options,
                },
            )
            .await?;
        debug!(
            workflow = W::TYPE,
            workflow_id = %run.info().workflow_id,
            run_id = %run.info().run_id,
            "workflow started"
        );
        Ok(TypedWorkflowHandle::new(run))
    }
}

/// Typed handle to a started execution of `W`.
pub struct TypedWorkflowHandle<W>
where
    W: Workflow,
{
    inner: Box<dyn WorkflowRun>,
    _workflow: PhantomData<fn() -> W>,
}

impl<W> fmt::Debug for TypedWorkflowHandle<W>
where
    W: Workflow,
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TypedWorkflowHandle")
            .field("workflow", &W::TYPE)
            .field("info", self.inner.info())
            .finish()
    }
}

impl<W> TypedWorkflowHandle<W>
where
    W: Workflow,
{
    fn new(inner: Box<dyn WorkflowRun>) -> Self {
        Self {
            inner,
            _workflow: PhantomData,
        }
    }

    /// Static execution metadata (namespace, workflow id, run id).
    pub fn info(&self) -> &WorkflowExecutionInfo {
        self.inner.info()
    }

    /// Consumes this typed handle and returns the untyped run.
    pub fn into_inner(self) -> Box<dyn WorkflowRun> {
        self.inner
    }

    /// Waits for the execution to close without decoding its output.
    pub async fn wait(&self, ctx: &Context) -> Result<()> {
        self.inner.result(ctx).await.map(|_| ())
    }

    /// Waits for the execution to close and decodes its output.
    pub async fn get_result(&self, ctx: &Context) -> Result<W::Output> {
        let payload = self.inner.result(ctx).await?;
        W::Output::from_json_payload(&payload)
    }
}
