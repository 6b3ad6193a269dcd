//! Core traits for defining workflows and activities.
//!
//! `Workflow` and `Activity` are always available.
//! Execution methods are enabled by the `worker` feature, and registration on
//! the in-process engine by the `local` feature.

use serde::{Serialize, de::DeserializeOwned};

#[cfg(feature = "local")]
use std::sync::Arc;

#[cfg(feature = "worker")]
use async_trait::async_trait;
#[cfg(feature = "local")]
use futures::FutureExt;

#[cfg(feature = "worker")]
use crate::{
    activity::{ActivityContext, ActivityOptions},
    error::Result,
    payload::{AsJsonPayloadExt, FromJsonPayloadExt, Payload},
    workflow::WorkflowContext,
};
#[cfg(feature = "local")]
use crate::worker::Worker;

/// Defines a type-safe workflow.
///
/// Implement this trait for your workflow type. The same implementation is
/// used whether the workflow is started from a client or as a child of another
/// workflow.
#[cfg_attr(feature = "worker", async_trait)]
pub trait Workflow {
    /// The input type for this workflow.
    type Input: Serialize + DeserializeOwned + Send + 'static;
    /// The output type for this workflow.
    type Output: Serialize + DeserializeOwned + Send + 'static;
    /// The workflow type identifier the engine dispatches on.
    const TYPE: &str;

    /// Decodes the input payload, runs [`Self::execute`] and encodes its output.
    #[cfg(feature = "worker")]
    async fn execute_payload(&self, ctx: WorkflowContext, input: Payload) -> Result<Payload> {
        let input = Self::Input::from_json_payload(&input)?;
        self.execute(ctx, input).await?.as_json_payload()
    }

    /// Executes workflow logic for one workflow execution.
    #[cfg(feature = "worker")]
    async fn execute(&self, ctx: WorkflowContext, input: Self::Input) -> Result<Self::Output>;
}

/// Defines a type-safe activity.
#[cfg_attr(feature = "worker", async_trait)]
pub trait Activity {
    /// The input type for this activity.
    type Input: Serialize + DeserializeOwned + Send + 'static;
    /// The output type for this activity.
    type Output: Serialize + DeserializeOwned + Send + 'static;
    /// The activity type identifier the engine dispatches on.
    const TYPE: &str;

    /// The options every invocation of this activity starts from.
    #[cfg(feature = "worker")]
    fn default_options() -> ActivityOptions {
        ActivityOptions::default()
    }

    /// Decodes the input payload, runs [`Self::execute`] and encodes its output.
    #[cfg(feature = "worker")]
    async fn execute_payload(&self, ctx: ActivityContext, input: Payload) -> Result<Payload> {
        let input = Self::Input::from_json_payload(&input)?;
        self.execute(ctx, input).await?.as_json_payload()
    }

    /// Executes the activity for a single attempt.
    #[cfg(feature = "worker")]
    async fn execute(&self, ctx: ActivityContext, input: Self::Input) -> Result<Self::Output>;
}

/// Registers a workflow implementation on an in-process worker.
#[cfg(feature = "local")]
pub trait WorkflowRegistration {
    /// Registers this workflow on the provided worker.
    fn register_to(self, worker: &mut Worker);
}

#[cfg(feature = "local")]
impl<T> WorkflowRegistration for T
where
    T: Workflow + Sized + Send + Sync + 'static,
{
    fn register_to(self, worker: &mut Worker) {
        let workflow = Arc::new(self);

        worker.insert_workflow(
            T::TYPE,
            Arc::new(move |ctx: WorkflowContext, input: Payload| {
                let wf = workflow.clone();
                async move { wf.execute_payload(ctx, input).await }.boxed()
            }),
        );
    }
}

/// Registers an activity implementation on an in-process worker.
#[cfg(feature = "local")]
pub trait ActivityRegistration {
    /// Registers this activity on the provided worker.
    fn register_to(self, worker: &mut Worker);
}

#[cfg(feature = "local")]
impl<T> ActivityRegistration for T
where
    T: Activity + Sized + Send + Sync + 'static,
{
    fn register_to(self, worker: &mut Worker) {
        let activity = Arc::new(self);

        worker.insert_activity(
            T::TYPE,
            Arc::new(move |ctx: ActivityContext, input: Payload| {
                let act = activity.clone();
                async move { act.execute_payload(ctx, input).await }.boxed()
            }),
        );
    }
}
