#![allow(dead_code)]

use std::sync::{
    Arc,
    atomic::{AtomicU8, AtomicUsize, Ordering},
};

use tokio::sync::Notify;
use workflow_exec::prelude::*;

/// Returns the same value for every input.
pub struct FixedValue;

#[async_trait]
impl Activity for FixedValue {
    type Input = String;
    type Output = u32;
    const TYPE: &str = "fixed-value";

    async fn execute(&self, _ctx: ActivityContext, _input: String) -> Result<u32> {
        Ok(42)
    }
}

/// Always fails with the same non-retryable error.
pub struct Declined;

pub fn declined() -> Error {
    Error::non_retryable("card declined")
}

#[async_trait]
impl Activity for Declined {
    type Input = String;
    type Output = u32;
    const TYPE: &str = "declined";

    async fn execute(&self, _ctx: ActivityContext, _input: String) -> Result<u32> {
        Err(declined())
    }
}

/// Upper-cases its input.
pub struct Shout;

#[async_trait]
impl Activity for Shout {
    type Input = String;
    type Output = String;
    const TYPE: &str = "shout";

    async fn execute(&self, _ctx: ActivityContext, input: String) -> Result<String> {
        Ok(input.to_uppercase())
    }
}

/// Reports the activity id the engine assigned.
pub struct WhoAmI;

#[async_trait]
impl Activity for WhoAmI {
    type Input = ();
    type Output = String;
    const TYPE: &str = "who-am-i";

    async fn execute(&self, ctx: ActivityContext, _input: ()) -> Result<String> {
        Ok(ctx.info().activity_id.clone())
    }
}

/// Completion gate shared between a test and a stub unit.
#[derive(Clone, Default)]
pub struct Gate {
    pub started: Arc<Notify>,
    pub release: Arc<Notify>,
    pub invocations: Arc<AtomicUsize>,
}

impl Gate {
    pub fn invocations(&self) -> usize {
        self.invocations.load(Ordering::SeqCst)
    }

    async fn pass(&self) {
        self.invocations.fetch_add(1, Ordering::SeqCst);
        self.started.notify_one();
        self.release.notified().await;
    }
}

/// Completes only once its gate is released.
pub struct Gated(pub Gate);

#[async_trait]
impl Activity for Gated {
    type Input = String;
    type Output = String;
    const TYPE: &str = "gated";

    async fn execute(&self, _ctx: ActivityContext, input: String) -> Result<String> {
        self.0.pass().await;
        Ok(format!("released {input}"))
    }
}

/// How a [`Cooperative`] activity finished.
pub const STILL_RUNNING: u8 = 0;
pub const SAW_RELEASE: u8 = 1;
pub const SAW_CANCELLATION: u8 = 2;

/// Waits for either its gate or its own cancellation, and records which came first.
#[derive(Clone, Default)]
pub struct Cooperative {
    pub gate: Gate,
    pub finished: Arc<Notify>,
    pub outcome: Arc<AtomicU8>,
}

impl Cooperative {
    pub fn outcome(&self) -> u8 {
        self.outcome.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Activity for Cooperative {
    type Input = ();
    type Output = ();
    const TYPE: &str = "cooperative";

    async fn execute(&self, ctx: ActivityContext, _input: ()) -> Result<()> {
        self.gate.invocations.fetch_add(1, Ordering::SeqCst);
        self.gate.started.notify_one();
        let seen = tokio::select! {
            _ = ctx.cancelled() => SAW_CANCELLATION,
            _ = self.gate.release.notified() => SAW_RELEASE,
        };
        self.outcome.store(seen, Ordering::SeqCst);
        self.finished.notify_one();
        Ok(())
    }
}

/// Fails with a retryable error until it has been attempted `succeed_on` times.
pub struct Flaky {
    pub succeed_on: usize,
    pub attempts: Arc<AtomicUsize>,
}

#[async_trait]
impl Activity for Flaky {
    type Input = ();
    type Output = usize;
    const TYPE: &str = "flaky";

    async fn execute(&self, ctx: ActivityContext, _input: ()) -> Result<usize> {
        let seen = self.attempts.fetch_add(1, Ordering::SeqCst) + 1;
        if seen < self.succeed_on {
            return Err(Error::application("gateway busy"));
        }
        Ok(ctx.info().attempt as usize)
    }
}

/// Greets through the `Shout` activity.
pub struct Greet;

#[async_trait]
impl Workflow for Greet {
    type Input = String;
    type Output = String;
    const TYPE: &str = "greet";

    async fn execute(&self, ctx: WorkflowContext, name: String) -> Result<String> {
        let loud = run_sync_activity::<Shout>(&ctx, name, []).await?;
        Ok(format!("hello, {loud}"))
    }
}

/// Fails with whatever its activity fails with.
pub struct Checkout;

#[async_trait]
impl Workflow for Checkout {
    type Input = String;
    type Output = u32;
    const TYPE: &str = "checkout";

    async fn execute(&self, ctx: WorkflowContext, order: String) -> Result<u32> {
        run_sync_activity::<Declined>(&ctx, order, []).await
    }
}

/// Completes only once its gate is released.
pub struct Waiting(pub Gate);

#[async_trait]
impl Workflow for Waiting {
    type Input = String;
    type Output = String;
    const TYPE: &str = "waiting";

    async fn execute(&self, _ctx: WorkflowContext, input: String) -> Result<String> {
        self.0.pass().await;
        Ok(format!("finished {input}"))
    }
}

/// Panics instead of returning.
pub struct Boom;

#[async_trait]
impl Workflow for Boom {
    type Input = ();
    type Output = ();
    const TYPE: &str = "boom";

    async fn execute(&self, _ctx: WorkflowContext, _input: ()) -> Result<()> {
        panic!("unit bug");
    }
}

/// A workflow no worker ever registers.
pub struct Ghost;

#[async_trait]
impl Workflow for Ghost {
    type Input = ();
    type Output = ();
    const TYPE: &str = "ghost";

    async fn execute(&self, _ctx: WorkflowContext, _input: ()) -> Result<()> {
        Ok(())
    }
}

/// Runs `Greet` as a child and waits for it.
pub struct GreetViaChild;

#[async_trait]
impl Workflow for GreetViaChild {
    type Input = String;
    type Output = String;
    const TYPE: &str = "greet-via-child";

    async fn execute(&self, ctx: WorkflowContext, name: String) -> Result<String> {
        run_sync_child_workflow::<Greet>(&ctx, name, []).await
    }
}

/// Starts one `Greet` child per name before waiting for any of them.
pub struct GreetAll;

#[async_trait]
impl Workflow for GreetAll {
    type Input = Vec<String>;
    type Output = Vec<String>;
    const TYPE: &str = "greet-all";

    async fn execute(&self, ctx: WorkflowContext, names: Vec<String>) -> Result<Vec<String>> {
        let handles: Vec<_> = names
            .into_iter()
            .map(|name| run_async_child_workflow::<Greet>(&ctx, name, []))
            .collect();
        let mut greetings = Vec::with_capacity(handles.len());
        for handle in handles {
            greetings.push(handle.await?);
        }
        Ok(greetings)
    }
}

/// Runs children without looking at their results.
pub struct FireChildren;

#[async_trait]
impl Workflow for FireChildren {
    type Input = String;
    type Output = String;
    const TYPE: &str = "fire-children";

    async fn execute(&self, ctx: WorkflowContext, name: String) -> Result<String> {
        run_sync_child_workflow_no_result::<Greet>(&ctx, name.clone(), []).await?;
        run_async_child_workflow_no_result::<Greet>(&ctx, name, [])
            .get()
            .await?;
        Ok("done".to_owned())
    }
}

/// Runs a failing child and passes its failure on.
pub struct CheckoutViaChild;

#[async_trait]
impl Workflow for CheckoutViaChild {
    type Input = String;
    type Output = u32;
    const TYPE: &str = "checkout-via-child";

    async fn execute(&self, ctx: WorkflowContext, order: String) -> Result<u32> {
        run_sync_child_workflow::<Checkout>(&ctx, order, []).await
    }
}

/// Runs an unregistered child and reports how it failed.
pub struct SummonGhost;

#[async_trait]
impl Workflow for SummonGhost {
    type Input = ();
    type Output = String;
    const TYPE: &str = "summon-ghost";

    async fn execute(&self, ctx: WorkflowContext, _input: ()) -> Result<String> {
        let handle = run_async_child_workflow::<Ghost>(&ctx, (), []);
        match handle.get().await {
            Ok(()) => Ok("ghost answered".to_owned()),
            Err(err) => Ok(err.to_string()),
        }
    }
}

/// A worker with every stateless stub registered.
pub fn worker() -> Worker {
    let mut worker = Worker::new(WorkerOptions::new().with_task_queue("tests"));
    worker.register_activity(FixedValue);
    worker.register_activity(Declined);
    worker.register_activity(Shout);
    worker.register_activity(WhoAmI);
    worker.register_workflow(Greet);
    worker.register_workflow(Checkout);
    worker.register_workflow(GreetViaChild);
    worker.register_workflow(GreetAll);
    worker.register_workflow(FireChildren);
    worker.register_workflow(CheckoutViaChild);
    worker.register_workflow(SummonGhost);
    worker
}

pub fn engine() -> LocalEngine {
    worker().start()
}
