//! In-process worker and engine.
//!
//! [`Worker`] collects workflow and activity implementations; [`Worker::start`]
//! turns it into a [`LocalEngine`] that implements the engine traits on top of
//! tokio tasks. Executions live in memory only: nothing is persisted and
//! nothing is replayed.

use std::{
    collections::{HashMap, HashSet},
    sync::{
        Arc, Mutex, PoisonError,
        atomic::{AtomicU64, Ordering},
    },
    time::Duration,
};

use anyhow::{Context as _, Result as AnyResult};
use async_trait::async_trait;
use backon::{BackoffBuilder, ExponentialBackoff, ExponentialBuilder};
use futures::{
    FutureExt,
    future::{self, BoxFuture, Shared},
};
use tokio::sync::Semaphore;
use tracing::{debug, warn};
use uuid::Uuid;

use crate::{
    activity::{ActivityCancellationType, ActivityContext, ActivityInfo},
    client::{Client, StartWorkflowOptions},
    context::Context,
    engine::{
        ActivityRequest, ChildWorkflowRequest, PendingResult, StartWorkflowRequest,
        WorkflowClient, WorkflowExecutionInfo, WorkflowRun, WorkflowRuntime,
    },
    error::{Error, Result},
    options::RetryPolicy,
    payload::Payload,
    traits::{ActivityRegistration, WorkflowRegistration},
    workflow::{WorkflowContext, WorkflowInfo},
};

const DEFAULT_NAMESPACE: &str = "default";
const DEFAULT_TASK_QUEUE: &str = "default-task-queue";
const DEFAULT_MAX_CONCURRENT_ACTIVITIES: usize = 16;
const DEFAULT_RETRY_INTERVAL: Duration = Duration::from_secs(1);
const DEFAULT_BACKOFF_COEFFICIENT: f64 = 2.0;

/// Type-erased activity implementation.
pub(crate) type ActivityHandler =
    Arc<dyn Fn(ActivityContext, Payload) -> BoxFuture<'static, Result<Payload>> + Send + Sync>;

/// Type-erased workflow implementation.
pub(crate) type WorkflowHandler =
    Arc<dyn Fn(WorkflowContext, Payload) -> BoxFuture<'static, Result<Payload>> + Send + Sync>;

type SharedOutcome = Shared<BoxFuture<'static, Result<Payload>>>;

/// Configuration for the in-process worker.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WorkerOptions {
    /// Namespace reported in execution metadata.
    pub namespace: String,
    /// The only task queue this worker serves.
    pub task_queue: String,
    /// Maximum number of activities executing at the same time.
    pub max_concurrent_activities: usize,
    /// Build identifier of the registered code.
    pub build_id: String,
}

impl Default for WorkerOptions {
    fn default() -> Self {
        Self::new()
    }
}

impl WorkerOptions {
    /// Creates worker options with defaults.
    ///
    /// Defaults:
    /// - namespace: `default`
    /// - task queue: `default-task-queue`
    /// - max concurrent activities: `16`
    /// - build id: `<crate-name>-dev`
    pub fn new() -> Self {
        Self {
            namespace: DEFAULT_NAMESPACE.to_owned(),
            task_queue: DEFAULT_TASK_QUEUE.to_owned(),
            max_concurrent_activities: DEFAULT_MAX_CONCURRENT_ACTIVITIES,
            build_id: default_build_id(),
        }
    }

    /// Reads options from environment variables.
    ///
    /// All optional:
    /// - `WORKFLOW_EXEC_NAMESPACE` (default: `default`)
    /// - `WORKFLOW_EXEC_TASK_QUEUE` (default: `default-task-queue`)
    /// - `WORKFLOW_EXEC_MAX_CONCURRENT_ACTIVITIES` (default: `16`)
    /// - `WORKFLOW_EXEC_BUILD_ID` (default: `<crate-name>-dev`)
    pub fn from_env() -> AnyResult<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> AnyResult<Self> {
        let namespace =
            lookup("WORKFLOW_EXEC_NAMESPACE").unwrap_or_else(|| DEFAULT_NAMESPACE.to_owned());
        let task_queue =
            lookup("WORKFLOW_EXEC_TASK_QUEUE").unwrap_or_else(|| DEFAULT_TASK_QUEUE.to_owned());
        let max_concurrent_activities = lookup("WORKFLOW_EXEC_MAX_CONCURRENT_ACTIVITIES")
            .map(|value| {
                value.parse::<usize>().with_context(|| {
                    format!(
                        "failed to parse WORKFLOW_EXEC_MAX_CONCURRENT_ACTIVITIES as usize: {value}"
                    )
                })
            })
            .transpose()?
            .unwrap_or(DEFAULT_MAX_CONCURRENT_ACTIVITIES);
        let build_id = lookup("WORKFLOW_EXEC_BUILD_ID").unwrap_or_else(default_build_id);

        Ok(Self {
            namespace,
            task_queue,
            max_concurrent_activities,
            build_id,
        })
    }

    /// Sets the namespace.
    pub fn with_namespace(mut self, namespace: impl Into<String>) -> Self {
        self.namespace = namespace.into();
        self
    }

    /// Sets the task queue.
    pub fn with_task_queue(mut self, task_queue: impl Into<String>) -> Self {
        self.task_queue = task_queue.into();
        self
    }

    /// Sets the maximum number of concurrent activities.
    pub fn with_max_concurrent_activities(mut self, max: usize) -> Self {
        self.max_concurrent_activities = max;
        self
    }

    /// Sets the build id.
    pub fn with_build_id(mut self, build_id: impl Into<String>) -> Self {
        self.build_id = build_id.into();
        self
    }
}

fn default_build_id() -> String {
    format!("{}-dev", env!("CARGO_PKG_NAME"))
}

/// Collects workflow and activity implementations before starting an engine.
pub struct Worker {
    options: WorkerOptions,
    workflows: HashMap<&'static str, WorkflowHandler>,
    activities: HashMap<&'static str, ActivityHandler>,
}

impl Worker {
    /// Creates a worker with no registrations.
    pub fn new(options: WorkerOptions) -> Self {
        Self {
            options,
            workflows: HashMap::new(),
            activities: HashMap::new(),
        }
    }

    /// Creates a worker using options loaded from environment variables.
    pub fn from_env() -> AnyResult<Self> {
        Ok(Self::new(WorkerOptions::from_env()?))
    }

    /// Returns the options used to construct this worker.
    pub fn options(&self) -> &WorkerOptions {
        &self.options
    }

    /// Registers a workflow implementation on this worker.
    pub fn register_workflow<T>(&mut self, workflow: T)
    where
        T: WorkflowRegistration,
    {
        workflow.register_to(self);
    }

    /// Registers an activity implementation on this worker.
    pub fn register_activity<T>(&mut self, activity: T)
    where
        T: ActivityRegistration,
    {
        activity.register_to(self);
    }

    pub(crate) fn insert_workflow(&mut self, workflow_type: &'static str, handler: WorkflowHandler) {
        if self.workflows.insert(workflow_type, handler).is_some() {
            warn!(workflow = workflow_type, "workflow registered twice, keeping the latest");
        }
    }

    pub(crate) fn insert_activity(&mut self, activity_type: &'static str, handler: ActivityHandler) {
        if self.activities.insert(activity_type, handler).is_some() {
            warn!(activity = activity_type, "activity registered twice, keeping the latest");
        }
    }

    /// Freezes the registrations and starts serving executions.
    pub fn start(self) -> LocalEngine {
        debug!(
            namespace = %self.options.namespace,
            task_queue = %self.options.task_queue,
            workflows = self.workflows.len(),
            activities = self.activities.len(),
            "starting in-process worker"
        );
        LocalEngine {
            inner: Arc::new(EngineInner {
                activity_slots: Semaphore::new(self.options.max_concurrent_activities),
                options: self.options,
                workflows: self.workflows,
                activities: self.activities,
                shutdown: Context::new(),
                running: Mutex::new(HashSet::new()),
                next_activity_id: AtomicU64::new(1),
            }),
        }
    }
}

struct EngineInner {
    options: WorkerOptions,
    workflows: HashMap<&'static str, WorkflowHandler>,
    activities: HashMap<&'static str, ActivityHandler>,
    activity_slots: Semaphore,
    shutdown: Context,
    running: Mutex<HashSet<String>>,
    next_activity_id: AtomicU64,
}

impl EngineInner {
    fn claim_workflow_id(&self, workflow_id: &str) -> bool {
        let mut running = self.running.lock().unwrap_or_else(PoisonError::into_inner);
        running.insert(workflow_id.to_owned())
    }

    fn release_workflow_id(&self, workflow_id: &str) {
        let mut running = self.running.lock().unwrap_or_else(PoisonError::into_inner);
        running.remove(workflow_id);
    }
}

/// A workflow execution that passed every start check.
struct Admitted {
    handler: WorkflowHandler,
    info: WorkflowInfo,
}

/// Closes an execution: cancels whatever it left behind and frees its id.
struct ExecutionGuard {
    engine: Arc<EngineInner>,
    workflow_id: String,
    scope: Context,
}

impl Drop for ExecutionGuard {
    fn drop(&mut self) {
        self.scope.cancel();
        self.engine.release_workflow_id(&self.workflow_id);
    }
}

/// In-process engine serving the registrations of a [`Worker`].
///
/// Cheap to clone; clones share the same executions.
#[derive(Clone)]
pub struct LocalEngine {
    inner: Arc<EngineInner>,
}

impl LocalEngine {
    /// Options the worker was started with.
    pub fn options(&self) -> &WorkerOptions {
        &self.inner.options
    }

    /// A client whose starts default to this worker's task queue.
    pub fn client(&self) -> Client {
        Client::new(Arc::new(self.clone())).with_default_options(
            StartWorkflowOptions::default().with_task_queue(self.inner.options.task_queue.clone()),
        )
    }

    /// A workflow context that is not bound to any execution.
    ///
    /// Lets activities and child workflows be driven directly, e.g. from tests.
    pub fn workflow_context(&self, ctx: Context) -> WorkflowContext {
        WorkflowContext::new(Arc::new(self.clone()), ctx, None)
    }

    /// Cancels every running execution and refuses new ones.
    pub fn shutdown(&self) {
        debug!("shutting down in-process worker");
        self.inner.shutdown.cancel();
        self.inner.activity_slots.close();
    }

    /// Returns true once [`Self::shutdown`] has been called.
    pub fn is_shut_down(&self) -> bool {
        self.inner.shutdown.is_cancelled()
    }

    fn admit(
        &self,
        workflow_type: &str,
        task_queue: Option<&str>,
        workflow_id: Option<&str>,
    ) -> Result<Admitted> {
        let inner = &self.inner;
        if inner.shutdown.is_cancelled() {
            return Err(Error::dispatch(workflow_type, "worker is shut down"));
        }
        let task_queue = task_queue.unwrap_or(inner.options.task_queue.as_str());
        if task_queue != inner.options.task_queue {
            return Err(Error::dispatch(
                workflow_type,
                format!("no worker polling task queue `{task_queue}`"),
            ));
        }
        let Some(handler) = inner.workflows.get(workflow_type).cloned() else {
            return Err(Error::dispatch(
                workflow_type,
                "workflow type is not registered",
            ));
        };
        let workflow_id = workflow_id
            .map(str::to_owned)
            .unwrap_or_else(|| Uuid::new_v4().simple().to_string());
        if !inner.claim_workflow_id(&workflow_id) {
            return Err(Error::dispatch(
                workflow_type,
                format!("workflow execution `{workflow_id}` is already running"),
            ));
        }

        Ok(Admitted {
            handler,
            info: WorkflowInfo {
                namespace: inner.options.namespace.clone(),
                workflow_id,
                run_id: Uuid::new_v4().to_string(),
                workflow_type: workflow_type.to_owned(),
                task_queue: task_queue.to_owned(),
            },
        })
    }

    /// Runs an admitted execution on its own task under `scope`.
    fn launch(
        &self,
        admitted: Admitted,
        input: Payload,
        scope: Context,
        execution_timeout: Option<Duration>,
    ) -> SharedOutcome {
        let Admitted { handler, info } = admitted;
        let engine = self.inner.clone();
        let workflow_id = info.workflow_id.clone();
        let workflow_type = info.workflow_type.clone();
        let ctx = WorkflowContext::new(Arc::new(self.clone()), scope.clone(), Some(info));

        let task = tokio::spawn(async move {
            // Released on every exit, unwinding included.
            let _closed = ExecutionGuard {
                engine,
                workflow_id: workflow_id.clone(),
                scope: scope.clone(),
            };
            let body = scope.run(handler(ctx, input));
            let outcome = match execution_timeout {
                Some(limit) => tokio::time::timeout(limit, body)
                    .await
                    .unwrap_or_else(|_| Err(Error::TimedOut(workflow_type.clone()))),
                None => body.await,
            };
            debug!(
                workflow = %workflow_type,
                workflow_id = %workflow_id,
                ok = outcome.is_ok(),
                "workflow execution closed"
            );
            outcome
        });

        async move {
            task.await.unwrap_or_else(|join_err| {
                Err(Error::non_retryable(format!(
                    "workflow task panicked: {join_err}"
                )))
            })
        }
        .boxed()
        .shared()
    }
}

#[async_trait]
impl WorkflowClient for LocalEngine {
    async fn start_workflow(
        &self,
        ctx: &Context,
        request: StartWorkflowRequest,
    ) -> Result<Box<dyn WorkflowRun>> {
        if let Some(err) = ctx.err() {
            return Err(err);
        }
        let StartWorkflowRequest {
            workflow_type,
            input,
            options,
        } = request;

        let admitted = self.admit(
            &workflow_type,
            options.task_queue.as_deref(),
            options.workflow_id.as_deref(),
        )?;
        let info = WorkflowExecutionInfo {
            namespace: admitted.info.namespace.clone(),
            workflow_id: admitted.info.workflow_id.clone(),
            run_id: admitted.info.run_id.clone(),
            workflow_type: workflow_type.clone(),
        };
        debug!(
            workflow = %workflow_type,
            workflow_id = %info.workflow_id,
            "starting workflow execution"
        );

        // Top-level executions outlive the start call; only shutdown stops them.
        let scope = self.inner.shutdown.child();
        let outcome = self.launch(admitted, input, scope, options.execution_timeout);
        Ok(Box::new(LocalWorkflowRun { info, outcome }))
    }
}

impl WorkflowRuntime for LocalEngine {
    fn schedule_activity(&self, request: ActivityRequest) -> PendingResult {
        if let Some(err) = request.ctx.err() {
            return future::ready(Err(err)).boxed();
        }
        let Some(handler) = self
            .inner
            .activities
            .get(request.activity_type.as_str())
            .cloned()
        else {
            return future::ready(Err(Error::NotRegistered(request.activity_type))).boxed();
        };
        if let Some(task_queue) = request
            .options
            .task_queue
            .as_deref()
            .filter(|queue| *queue != self.inner.options.task_queue)
        {
            let err = Error::dispatch(
                &request.activity_type,
                format!("no worker polling task queue `{task_queue}`"),
            );
            return future::ready(Err(err)).boxed();
        }

        let activity_id = request.options.activity_id.clone().unwrap_or_else(|| {
            self.inner
                .next_activity_id
                .fetch_add(1, Ordering::Relaxed)
                .to_string()
        });
        let cancellation_type = request.options.cancellation_type.unwrap_or_default();
        let caller = request.ctx.clone();
        // An abandoned activity keeps running after its caller goes away.
        let scope = match cancellation_type {
            ActivityCancellationType::Abandon => self.inner.shutdown.child(),
            _ => request.ctx.child(),
        };
        let mut task = tokio::spawn(execute_activity(
            self.inner.clone(),
            handler,
            request,
            scope.clone(),
            activity_id,
        ));

        async move {
            tokio::select! {
                biased;
                joined = &mut task => joined.unwrap_or_else(|join_err| {
                    Err(Error::non_retryable(format!("activity task panicked: {join_err}")))
                }),
                err = caller.done() => {
                    match cancellation_type {
                        ActivityCancellationType::TryCancel => {
                            scope.cancel();
                            task.abort();
                        }
                        ActivityCancellationType::WaitCancellationCompleted => {
                            scope.cancel();
                            let _ = task.await;
                        }
                        ActivityCancellationType::Abandon => {}
                    }
                    Err(err)
                }
            }
        }
        .boxed()
    }

    fn schedule_child_workflow(&self, request: ChildWorkflowRequest) -> PendingResult {
        if let Some(err) = request.ctx.err() {
            return future::ready(Err(err)).boxed();
        }
        let ChildWorkflowRequest {
            workflow_type,
            input,
            options,
            ctx,
            parent,
        } = request;

        let task_queue = options
            .task_queue
            .as_deref()
            .or(parent.as_ref().map(|p| p.task_queue.as_str()));
        let admitted = match self.admit(&workflow_type, task_queue, options.workflow_id.as_deref())
        {
            Ok(admitted) => admitted,
            Err(err) => return future::ready(Err(err)).boxed(),
        };
        debug!(
            workflow = %workflow_type,
            workflow_id = %admitted.info.workflow_id,
            parent = parent.as_ref().map(|p| p.workflow_id.as_str()),
            "starting child workflow execution"
        );

        // Children are cancelled together with their parent.
        let outcome = self.launch(admitted, input, ctx.child(), options.execution_timeout);
        async move { ctx.run(outcome).await }.boxed()
    }
}

struct LocalWorkflowRun {
    info: WorkflowExecutionInfo,
    outcome: SharedOutcome,
}

#[async_trait]
impl WorkflowRun for LocalWorkflowRun {
    fn info(&self) -> &WorkflowExecutionInfo {
        &self.info
    }

    async fn result(&self, ctx: &Context) -> Result<Payload> {
        ctx.run(self.outcome.clone()).await
    }
}

/// Runs every attempt of one activity until it succeeds or may not be retried.
async fn execute_activity(
    engine: Arc<EngineInner>,
    handler: ActivityHandler,
    request: ActivityRequest,
    scope: Context,
    activity_id: String,
) -> Result<Payload> {
    let attempts = run_attempts(&engine, &handler, &request, &scope, &activity_id);
    match request.options.schedule_to_close_timeout {
        Some(limit) => tokio::time::timeout(limit, attempts)
            .await
            .unwrap_or_else(|_| Err(Error::TimedOut(request.activity_type.clone()))),
        None => attempts.await,
    }
}

async fn run_attempts(
    engine: &EngineInner,
    handler: &ActivityHandler,
    request: &ActivityRequest,
    scope: &Context,
    activity_id: &str,
) -> Result<Payload> {
    let _permit = engine
        .activity_slots
        .acquire()
        .await
        .map_err(|_| Error::dispatch(&request.activity_type, "worker is shut down"))?;

    let policy = request.options.retry_policy.clone().unwrap_or_default();
    let mut backoff = retry_backoff(&policy);
    let mut attempt = 1;
    loop {
        let ctx = ActivityContext::new(
            ActivityInfo {
                activity_type: request.activity_type.clone(),
                activity_id: activity_id.to_owned(),
                attempt,
                workflow: request.workflow.clone(),
            },
            scope.clone(),
        );
        let body = handler(ctx, request.input.clone());
        let outcome = match request.options.start_to_close_timeout {
            Some(limit) => tokio::time::timeout(limit, body)
                .await
                .unwrap_or_else(|_| Err(Error::TimedOut(request.activity_type.clone()))),
            None => body.await,
        };

        let retry_in = match &outcome {
            Err(err) if should_retry(err, &policy, attempt) && !scope.is_cancelled() => {
                backoff.next()
            }
            _ => None,
        };
        match (outcome, retry_in) {
            (Err(err), Some(delay)) => {
                warn!(
                    activity = %request.activity_type,
                    activity_id,
                    attempt,
                    error = %err,
                    retry_in = ?delay,
                    "activity attempt failed"
                );
                scope
                    .run(async {
                        tokio::time::sleep(delay).await;
                        Ok(())
                    })
                    .await?;
                attempt += 1;
            }
            (outcome, _) => return outcome,
        }
    }
}

fn should_retry(err: &Error, policy: &RetryPolicy, attempt: u32) -> bool {
    // Without an explicit attempt limit, an activity runs once.
    let max_attempts = policy.maximum_attempts.unwrap_or(1);
    if max_attempts != 0 && attempt >= max_attempts {
        return false;
    }
    if !err.is_retryable() {
        return false;
    }
    match err {
        Error::Application { message, .. } => !policy.non_retryable_errors.contains(message),
        _ => true,
    }
}

/// Exponential delays between activity attempts. Attempt limits are enforced
/// by [`should_retry`], so the iterator itself never runs dry.
fn retry_backoff(policy: &RetryPolicy) -> ExponentialBackoff {
    let initial = policy.initial_interval.unwrap_or(DEFAULT_RETRY_INTERVAL);
    ExponentialBuilder::default()
        .with_min_delay(initial)
        .with_factor(
            policy
                .backoff_coefficient
                .unwrap_or(DEFAULT_BACKOFF_COEFFICIENT) as f32,
        )
        .with_max_delay(
            policy
                .maximum_interval
                .unwrap_or_else(|| initial.saturating_mul(100)),
        )
        .without_max_times()
        .build()
}
