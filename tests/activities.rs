mod common;

use std::{
    future::IntoFuture,
    sync::{Arc, atomic::AtomicUsize, atomic::Ordering},
    time::Duration,
};

use common::*;
use workflow_exec::prelude::*;

fn gated_engine(gate: &Gate) -> LocalEngine {
    let mut worker = worker();
    worker.register_activity(Gated(gate.clone()));
    worker.start()
}

#[tokio::test]
async fn sync_activity_returns_stub_value() {
    let engine = engine();
    let ctx = engine.workflow_context(Context::new());

    let total = run_sync_activity::<FixedValue>(&ctx, "order-1".into(), []).await;
    assert_eq!(total, Ok(42));
}

#[tokio::test]
async fn sync_activity_returns_stub_error_unchanged() {
    let engine = engine();
    let ctx = engine.workflow_context(Context::new());

    let total = run_sync_activity::<Declined>(&ctx, "order-1".into(), []).await;
    assert_eq!(total, Err(declined()));
}

#[tokio::test]
async fn no_result_variants_discard_output() {
    let engine = engine();
    let ctx = engine.workflow_context(Context::new());

    assert_eq!(
        run_sync_activity_no_result::<FixedValue>(&ctx, "order-1".into(), []).await,
        Ok(())
    );
    assert_eq!(
        run_async_activity_no_result::<FixedValue>(&ctx, "order-1".into(), [])
            .get()
            .await,
        Ok(())
    );
    assert_eq!(
        run_sync_activity_no_result::<Declined>(&ctx, "order-1".into(), []).await,
        Err(declined())
    );
}

#[tokio::test]
async fn async_activity_matches_sync_outcome() {
    let engine = engine();
    let ctx = engine.workflow_context(Context::new());

    let ok = run_async_activity::<FixedValue>(&ctx, "a".into(), []);
    let failed = run_async_activity::<Declined>(&ctx, "b".into(), []);

    assert_eq!(
        ok.await,
        run_sync_activity::<FixedValue>(&ctx, "a".into(), []).await
    );
    assert_eq!(
        failed.get().await,
        run_sync_activity::<Declined>(&ctx, "b".into(), []).await
    );
}

#[tokio::test]
async fn async_activity_resolves_only_after_completion_signal() {
    let gate = Gate::default();
    let engine = gated_engine(&gate);
    let ctx = engine.workflow_context(Context::new());

    let handle = run_async_activity::<Gated>(&ctx, "parcel".into(), []);
    gate.started.notified().await;

    let waiter = tokio::spawn(handle.into_future());
    tokio::time::sleep(Duration::from_millis(50)).await;
    assert!(!waiter.is_finished());

    gate.release.notify_one();
    assert_eq!(waiter.await.unwrap(), Ok("released parcel".to_owned()));
    assert_eq!(gate.invocations(), 1);
}

#[tokio::test]
async fn cancelling_context_ends_pending_sync_call() {
    let gate = Gate::default();
    let engine = gated_engine(&gate);
    let scope = Context::new();
    let ctx = engine.workflow_context(scope.clone());

    let pending = tokio::spawn(async move {
        run_sync_activity::<Gated>(&ctx, "parcel".into(), []).await
    });
    gate.started.notified().await;
    scope.cancel();

    let outcome = tokio::time::timeout(Duration::from_secs(1), pending)
        .await
        .expect("cancelled call must return promptly")
        .unwrap();
    assert_eq!(outcome, Err(Error::Cancelled));
    assert_eq!(gate.invocations(), 1);
}

#[tokio::test]
async fn cancelled_context_never_invokes_activity() {
    let gate = Gate::default();
    let engine = gated_engine(&gate);
    let scope = Context::new();
    scope.cancel();
    let ctx = engine.workflow_context(scope);

    let outcome = run_sync_activity::<Gated>(&ctx, "parcel".into(), []).await;
    assert_eq!(outcome, Err(Error::Cancelled));
    assert_eq!(gate.invocations(), 0);
}

#[tokio::test]
async fn later_option_layers_win() {
    let engine = engine();
    let ctx = engine.workflow_context(Context::new());
    let a = ActivityOptions::default().with_activity_id("a");
    let b = ActivityOptions::default().with_activity_id("b");

    let id = run_sync_activity::<WhoAmI>(&ctx, (), [a.clone(), b.clone()]).await;
    assert_eq!(id, Ok("b".to_owned()));

    let id = run_sync_activity::<WhoAmI>(&ctx, (), [b, a]).await;
    assert_eq!(id, Ok("a".to_owned()));
}

#[tokio::test]
async fn call_layers_override_context_options() {
    let engine = engine();
    let ctx = engine
        .workflow_context(Context::new())
        .with_activity_options(ActivityOptions::default().with_activity_id("from-context"));

    let id = run_sync_activity::<WhoAmI>(&ctx, (), []).await;
    assert_eq!(id, Ok("from-context".to_owned()));

    let call = ActivityOptions::default().with_activity_id("from-call");
    let id = run_sync_activity::<WhoAmI>(&ctx, (), [call]).await;
    assert_eq!(id, Ok("from-call".to_owned()));
}

#[tokio::test]
async fn retry_policy_is_left_to_the_engine() {
    let attempts = Arc::new(AtomicUsize::new(0));
    let mut worker = worker();
    worker.register_activity(Flaky {
        succeed_on: 3,
        attempts: attempts.clone(),
    });
    let engine = worker.start();
    let ctx = engine.workflow_context(Context::new());

    let once = run_sync_activity::<Flaky>(&ctx, (), []).await;
    assert_eq!(once, Err(Error::application("gateway busy")));
    assert_eq!(attempts.load(Ordering::SeqCst), 1);

    attempts.store(0, Ordering::SeqCst);
    let retrying = ActivityOptions::default().with_retry_policy(
        RetryPolicy::with_maximum_attempts(5).with_initial_interval(Duration::from_millis(1)),
    );
    let attempt = run_sync_activity::<Flaky>(&ctx, (), [retrying]).await;
    assert_eq!(attempt, Ok(3));
    assert_eq!(attempts.load(Ordering::SeqCst), 3);
}

#[tokio::test]
async fn start_to_close_timeout_is_enforced_by_engine() {
    let gate = Gate::default();
    let engine = gated_engine(&gate);
    let ctx = engine.workflow_context(Context::new());
    let options =
        ActivityOptions::default().with_start_to_close_timeout(Duration::from_millis(20));

    let outcome = run_sync_activity::<Gated>(&ctx, "parcel".into(), [options]).await;
    assert_eq!(outcome, Err(Error::TimedOut("gated".to_owned())));
}

#[tokio::test]
async fn schedule_to_close_timeout_is_enforced_by_engine() {
    let gate = Gate::default();
    let engine = gated_engine(&gate);
    let ctx = engine.workflow_context(Context::new());
    let options =
        ActivityOptions::default().with_schedule_to_close_timeout(Duration::from_millis(20));

    let outcome = run_sync_activity::<Gated>(&ctx, "parcel".into(), [options]).await;
    assert_eq!(outcome, Err(Error::TimedOut("gated".to_owned())));
    assert_eq!(gate.invocations(), 1);
}

fn cooperative_engine(activity: &Cooperative) -> LocalEngine {
    let mut worker = worker();
    worker.register_activity(activity.clone());
    worker.start()
}

#[tokio::test]
async fn abandoned_activity_runs_on_after_caller_is_cancelled() {
    let activity = Cooperative::default();
    let engine = cooperative_engine(&activity);
    let scope = Context::new();
    let ctx = engine.workflow_context(scope.clone());
    let abandon =
        ActivityOptions::default().with_cancellation_type(ActivityCancellationType::Abandon);

    let handle = run_async_activity::<Cooperative>(&ctx, (), [abandon]);
    activity.gate.started.notified().await;
    scope.cancel();
    assert_eq!(handle.get().await, Err(Error::Cancelled));
    assert_eq!(activity.outcome(), STILL_RUNNING);

    activity.gate.release.notify_one();
    tokio::time::timeout(Duration::from_secs(1), activity.finished.notified())
        .await
        .expect("abandoned activity must still finish");
    assert_eq!(activity.outcome(), SAW_RELEASE);
}

#[tokio::test]
async fn waiting_cancellation_resolves_after_activity_acknowledges() {
    let activity = Cooperative::default();
    let engine = cooperative_engine(&activity);
    let scope = Context::new();
    let ctx = engine.workflow_context(scope.clone());
    let wait = ActivityOptions::default()
        .with_cancellation_type(ActivityCancellationType::WaitCancellationCompleted);

    let handle = run_async_activity::<Cooperative>(&ctx, (), [wait]);
    activity.gate.started.notified().await;
    scope.cancel();

    let outcome = tokio::time::timeout(Duration::from_secs(1), handle.get())
        .await
        .expect("acknowledged cancellation must resolve promptly");
    assert_eq!(outcome, Err(Error::Cancelled));
    assert_eq!(activity.outcome(), SAW_CANCELLATION);
}

#[tokio::test]
async fn activity_on_foreign_task_queue_is_refused() {
    let engine = engine();
    let ctx = engine.workflow_context(Context::new());
    let elsewhere = ActivityOptions::default().with_task_queue("elsewhere");

    let outcome = run_sync_activity::<Shout>(&ctx, "hi".into(), [elsewhere]).await;
    assert_eq!(
        outcome,
        Err(Error::dispatch(
            "shout",
            "no worker polling task queue `elsewhere`"
        ))
    );

    let same = ActivityOptions::default().with_task_queue("tests");
    let outcome = run_sync_activity::<Shout>(&ctx, "hi".into(), [same]).await;
    assert_eq!(outcome, Ok("HI".to_owned()));
}

#[tokio::test]
async fn unregistered_activity_fails_through_handle() {
    let engine = Worker::new(WorkerOptions::new()).start();
    let ctx = engine.workflow_context(Context::new());

    let handle = run_async_activity::<Shout>(&ctx, "hi".into(), []);
    assert_eq!(
        handle.get().await,
        Err(Error::NotRegistered("shout".to_owned()))
    );
}

#[tokio::test]
async fn fan_out_preserves_input_order() {
    let engine = engine();
    let ctx = engine.workflow_context(Context::new());

    let loud = ctx
        .execute_activities::<Shout>(vec!["a".into(), "b".into(), "c".into()], [])
        .await;
    assert_eq!(loud, Ok(vec!["A".to_owned(), "B".to_owned(), "C".to_owned()]));
}
