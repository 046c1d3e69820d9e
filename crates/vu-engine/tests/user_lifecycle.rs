//! Virtual user lifecycle: looping, degraded mode, and cooperative stop.

mod common;

use std::sync::Arc;
use std::time::Duration;

use tokio_util::sync::CancellationToken;
use vu_engine::{Behavior, BehaviorCatalog, Pacing, UserState, VirtualUser};

use common::{config, home, listing, shared, with_data_api, FakeTransport, VecRecorder};

fn catalog() -> Arc<BehaviorCatalog> {
    let catalog = BehaviorCatalog::new()
        .with(Behavior::new("home", 1, home))
        .and_then(|c| c.with(Behavior::new("listing", 1, listing)))
        .unwrap();
    Arc::new(catalog)
}

#[tokio::test(start_paused = true)]
async fn test_degraded_user_skips_data_api() {
    let transport = FakeTransport::with_status(200);
    let recorder = VecRecorder::new();
    let ctx = shared(config(), transport.clone(), recorder.clone());

    let user = VirtualUser::new(0, catalog(), Pacing::none(), ctx).with_max_iterations(Some(100));
    let report = user.run(CancellationToken::new()).await;

    assert_eq!(report.state, UserState::Stopped);
    assert_eq!(report.iterations, 100);
    assert!(report.requests > 0);
    assert!(recorder.operations().iter().all(|op| op == "GET /"));
    assert!(transport.urls().iter().all(|u| u.starts_with("http://app.test/")));
}

#[tokio::test(start_paused = true)]
async fn test_data_api_requests_carry_session_headers() {
    let transport = FakeTransport::with_status(206);
    let recorder = VecRecorder::new();
    let ctx = shared(with_data_api(config()), transport.clone(), recorder.clone());

    let only_listing = BehaviorCatalog::new()
        .with(Behavior::new("listing", 1, listing))
        .unwrap();
    let user = VirtualUser::new(0, Arc::new(only_listing), Pacing::none(), ctx)
        .with_max_iterations(Some(20));
    let report = user.run(CancellationToken::new()).await;

    assert_eq!(report.requests, 20);
    assert_eq!(report.failures, 0);

    let requests = transport.requests.lock();
    for req in requests.iter() {
        assert_eq!(req.url, "http://db.test/rest/v1/orders?select=id");
        assert_eq!(req.name, "SB GET orders");
        assert_eq!(req.headers.get("apikey").unwrap(), "anon");
        assert_eq!(req.headers.get("authorization").unwrap(), "Bearer anon");

        let range = req.headers.get("range").unwrap().to_str().unwrap();
        let (start, end) = range.split_once('-').unwrap();
        let (start, end): (u64, u64) = (start.parse().unwrap(), end.parse().unwrap());
        assert_eq!(end - start, 49);
        assert_eq!(start % 50, 0);
        assert!(start <= 200);
    }
}

#[tokio::test(start_paused = true)]
async fn test_failures_do_not_stop_the_loop() {
    let transport = FakeTransport::with_status(500);
    let recorder = VecRecorder::new();
    let ctx = shared(config(), transport.clone(), recorder.clone());

    let only_home = BehaviorCatalog::new().with(Behavior::new("home", 1, home)).unwrap();
    let user = VirtualUser::new(0, Arc::new(only_home), Pacing::none(), ctx)
        .with_max_iterations(Some(10));
    let report = user.run(CancellationToken::new()).await;

    assert_eq!(report.iterations, 10);
    assert_eq!(report.failures, 10);
    let outcomes = recorder.outcomes.lock();
    assert!(outcomes
        .iter()
        .all(|o| o.reason_code() == Some("unexpected-status")));
}

#[tokio::test(start_paused = true)]
async fn test_transport_errors_are_recorded() {
    let transport = FakeTransport::failing();
    let recorder = VecRecorder::new();
    let ctx = shared(config(), transport, recorder.clone());

    let only_home = BehaviorCatalog::new().with(Behavior::new("home", 1, home)).unwrap();
    let report = VirtualUser::new(0, Arc::new(only_home), Pacing::none(), ctx)
        .with_max_iterations(Some(3))
        .run(CancellationToken::new())
        .await;

    assert_eq!(report.failures, 3);
    let outcomes = recorder.outcomes.lock();
    assert!(outcomes.iter().all(|o| o.reason_code() == Some("transport")));
}

#[tokio::test(start_paused = true)]
async fn test_stop_during_wait() {
    let transport = FakeTransport::with_status(200);
    let recorder = VecRecorder::new();
    let ctx = shared(config(), transport.clone(), recorder.clone());

    let only_home = BehaviorCatalog::new().with(Behavior::new("home", 1, home)).unwrap();
    let pacing = Pacing::between(10.0, 10.0).unwrap();
    let user = VirtualUser::new(0, Arc::new(only_home), pacing, ctx);
    let paced = user.paced();
    assert!(!paced.get());

    let cancel = CancellationToken::new();
    let handle = tokio::spawn(user.run(cancel.clone()));

    // First behavior runs immediately, then the user waits 10s
    tokio::time::sleep(Duration::from_secs(1)).await;
    assert!(paced.get());
    cancel.cancel();
    let report = handle.await.unwrap();

    assert!(!paced.get());
    assert_eq!(report.state, UserState::Stopped);
    assert_eq!(report.iterations, 1);
    assert_eq!(transport.started(), 1);
    assert_eq!(recorder.len(), 1);
}

#[tokio::test(start_paused = true)]
async fn test_stop_waits_for_in_flight_request() {
    let transport = FakeTransport::slow(200, Duration::from_secs(5));
    let recorder = VecRecorder::new();
    let ctx = shared(config(), transport.clone(), recorder.clone());

    let only_home = BehaviorCatalog::new().with(Behavior::new("home", 1, home)).unwrap();
    let user = VirtualUser::new(0, Arc::new(only_home), Pacing::none(), ctx);
    let paced = user.paced();

    let cancel = CancellationToken::new();
    let handle = tokio::spawn(user.run(cancel.clone()));

    tokio::time::sleep(Duration::from_secs(1)).await;
    assert!(!paced.get());
    assert_eq!(transport.started(), 1);
    assert_eq!(transport.completed(), 0);
    cancel.cancel();

    let report = handle.await.unwrap();
    assert_eq!(report.state, UserState::Stopped);
    assert_eq!(report.iterations, 1);
    assert_eq!(transport.started(), 1);
    assert_eq!(transport.completed(), 1);
    assert_eq!(recorder.len(), 1);
}

#[tokio::test]
async fn test_cancelled_before_start_runs_nothing() {
    let transport = FakeTransport::with_status(200);
    let recorder = VecRecorder::new();
    let ctx = shared(config(), transport.clone(), recorder.clone());

    let cancel = CancellationToken::new();
    cancel.cancel();
    let report = VirtualUser::new(0, catalog(), Pacing::none(), ctx)
        .run(cancel)
        .await;

    assert_eq!(report.state, UserState::Stopped);
    assert_eq!(report.iterations, 0);
    assert_eq!(transport.started(), 0);
}

#[test]
fn test_new_user_is_created() {
    let ctx = shared(config(), FakeTransport::with_status(200), VecRecorder::new());
    let user = VirtualUser::new(3, catalog(), Pacing::none(), ctx);
    assert_eq!(user.state(), UserState::Created);
    assert_eq!(user.iterations(), 0);
}
