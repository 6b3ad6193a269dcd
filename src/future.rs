//! Deferred results returned by the asynchronous execution helpers.
//!
//! A handle is a plain value: either a joinable engine handle or an error
//! captured when the unit could not be started. It is consumed by `get`, so
//! it resolves at most once.

use std::{fmt, future::IntoFuture};

use futures::future::BoxFuture;
use serde::de::DeserializeOwned;

#[cfg(feature = "client")]
use crate::{context::Context, engine::WorkflowExecutionInfo, engine::WorkflowRun, error::Error};
#[cfg(feature = "worker")]
use crate::engine::PendingResult;
use crate::{
    error::Result,
    payload::{FromJsonPayloadExt, Payload},
};

/// Turns the engine's payload into the handle's result type.
pub(crate) type Decode<R> = fn(&Payload) -> Result<R>;

pub(crate) fn decode_output<R: DeserializeOwned>(payload: &Payload) -> Result<R> {
    R::from_json_payload(payload)
}

pub(crate) fn discard_output(_: &Payload) -> Result<()> {
    Ok(())
}

/// Handle to a scheduled activity.
#[cfg(feature = "worker")]
#[must_use = "dropping the handle discards the activity's result"]
pub struct ActivityFuture<R> {
    pending: PendingResult,
    decode: Decode<R>,
}

#[cfg(feature = "worker")]
impl<R> ActivityFuture<R> {
    pub(crate) fn new(pending: PendingResult, decode: Decode<R>) -> Self {
        Self { pending, decode }
    }

    /// Waits for the activity to complete.
    pub async fn get(self) -> Result<R> {
        let payload = self.pending.await?;
        (self.decode)(&payload)
    }
}

#[cfg(feature = "worker")]
impl<R: Send + 'static> IntoFuture for ActivityFuture<R> {
    type Output = Result<R>;
    type IntoFuture = BoxFuture<'static, Result<R>>;

    fn into_future(self) -> Self::IntoFuture {
        Box::pin(self.get())
    }
}

#[cfg(feature = "worker")]
impl<R> fmt::Debug for ActivityFuture<R> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ActivityFuture").finish_non_exhaustive()
    }
}

/// Handle to a scheduled child workflow.
#[cfg(feature = "worker")]
#[must_use = "dropping the handle discards the child workflow's result"]
pub struct ChildWorkflowFuture<R> {
    pending: PendingResult,
    decode: Decode<R>,
}

#[cfg(feature = "worker")]
impl<R> ChildWorkflowFuture<R> {
    pub(crate) fn new(pending: PendingResult, decode: Decode<R>) -> Self {
        Self { pending, decode }
    }

    /// Waits for the child workflow to complete.
    pub async fn get(self) -> Result<R> {
        let payload = self.pending.await?;
        (self.decode)(&payload)
    }
}

#[cfg(feature = "worker")]
impl<R: Send + 'static> IntoFuture for ChildWorkflowFuture<R> {
    type Output = Result<R>;
    type IntoFuture = BoxFuture<'static, Result<R>>;

    fn into_future(self) -> Self::IntoFuture {
        Box::pin(self.get())
    }
}

#[cfg(feature = "worker")]
impl<R> fmt::Debug for ChildWorkflowFuture<R> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ChildWorkflowFuture").finish_non_exhaustive()
    }
}

#[cfg(feature = "client")]
enum WorkflowStart {
    Started(Box<dyn WorkflowRun>),
    Failed(Error),
}

/// Handle to a top-level workflow whose start has already been attempted.
///
/// If the start failed, the error is available right away through
/// [`Self::start_error`] and is returned again by [`Self::get`] without
/// contacting the engine.
#[cfg(feature = "client")]
#[must_use = "dropping the handle discards the workflow's result"]
pub struct WorkflowFuture<R> {
    start: WorkflowStart,
    decode: Decode<R>,
}

#[cfg(feature = "client")]
impl<R> WorkflowFuture<R> {
    pub(crate) fn started(run: Box<dyn WorkflowRun>, decode: Decode<R>) -> Self {
        Self {
            start: WorkflowStart::Started(run),
            decode,
        }
    }

    pub(crate) fn failed(err: Error, decode: Decode<R>) -> Self {
        Self {
            start: WorkflowStart::Failed(err),
            decode,
        }
    }

    /// The error the start failed with, if it failed.
    pub fn start_error(&self) -> Option<&Error> {
        match &self.start {
            WorkflowStart::Started(_) => None,
            WorkflowStart::Failed(err) => Some(err),
        }
    }

    /// Execution metadata, if the start succeeded.
    pub fn info(&self) -> Option<&WorkflowExecutionInfo> {
        match &self.start {
            WorkflowStart::Started(run) => Some(run.info()),
            WorkflowStart::Failed(_) => None,
        }
    }

    /// Waits for the workflow to close, or for `ctx` to end.
    pub async fn get(self, ctx: &Context) -> Result<R> {
        match self.start {
            WorkflowStart::Failed(err) => Err(err),
            WorkflowStart::Started(run) => {
                let payload = run.result(ctx).await?;
                (self.decode)(&payload)
            }
        }
    }
}

#[cfg(feature = "client")]
impl<R> fmt::Debug for WorkflowFuture<R> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WorkflowFuture")
            .field("info", &self.info())
            .field("start_error", &self.start_error())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use futures::FutureExt;
    use tokio::sync::oneshot;

    use super::*;
    use crate::{error::Error, payload::AsJsonPayloadExt};

    #[tokio::test]
    async fn activity_future_waits_for_completion() {
        let (tx, rx) = oneshot::channel::<Result<Payload>>();
        let pending: PendingResult = async move { rx.await.unwrap_or(Err(Error::Cancelled)) }.boxed();
        let handle = ActivityFuture::new(pending, decode_output::<String>);

        let waiter = tokio::spawn(handle.into_future());
        tokio::time::sleep(Duration::from_millis(20)).await;
        assert!(!waiter.is_finished());

        tx.send("done".as_json_payload()).unwrap();
        assert_eq!(waiter.await.unwrap(), Ok("done".to_owned()));
    }

    #[tokio::test]
    async fn discarding_handle_ignores_payload_shape() {
        let pending: PendingResult = async { "not a unit".as_json_payload() }.boxed();
        let handle = ChildWorkflowFuture::new(pending, discard_output);
        assert_eq!(handle.get().await, Ok(()));
    }

    #[tokio::test]
    async fn failed_start_is_reported_twice() {
        let err = Error::dispatch("onboard", "already started");
        let handle: WorkflowFuture<u32> = WorkflowFuture::failed(err.clone(), decode_output);
        assert_eq!(handle.start_error(), Some(&err));
        assert!(handle.info().is_none());
        assert_eq!(handle.get(&Context::new()).await, Err(err));
    }
}
