mod common;

use beacon::{
    Backoff, BatchReceipt, Beacon, BeaconError, ClientConfig, DeliveryError, InstantSleeper,
    Jitter, TrackLevel, TransportError,
};
use common::{wait_for, ErrorLog, MockTransport, Outcome};
use std::time::Duration;

fn config(project: &str) -> beacon::ClientConfigBuilder {
    ClientConfig::builder(project)
        .batch_size(100)
        .flush_interval(Duration::from_secs(60))
        .backoff(Backoff::constant(Duration::from_millis(1)))
        .jitter(Jitter::None)
        .sleeper(InstantSleeper)
}

#[tokio::test]
async fn flush_delivers_in_admission_order() {
    let transport = MockTransport::new();
    let client = Beacon::init_with_transport(config("p1").build(), transport.clone()).unwrap();

    for name in ["a", "b", "c", "d"] {
        client.track(name);
    }
    let report = client.flush().await.unwrap();

    assert_eq!(report.delivered, 4);
    assert_eq!(report.dropped, 0);
    assert_eq!(transport.sent_names(), vec![vec!["a", "b", "c", "d"]]);

    let sent = transport.sent();
    let sequences: Vec<u64> = sent[0].events.iter().map(|e| e.sequence).collect();
    assert_eq!(sequences, vec![0, 1, 2, 3], "sequences strictly increase in admission order");
    client.shutdown().await;
}

#[tokio::test]
async fn filter_gates_enqueue_and_batch_size_triggers_flush() {
    let transport = MockTransport::new();
    let client = Beacon::init_with_transport(
        config("p1").track_level(TrackLevel::Standard).batch_size(3).build(),
        transport.clone(),
    )
    .unwrap();

    client.track_at("a", TrackLevel::Essential, beacon::Properties::new());
    client.track_at("b", TrackLevel::Essential, beacon::Properties::new());
    client.track_at("c", TrackLevel::Verbose, beacon::Properties::new());
    assert_eq!(client.pending(), 2, "verbose event is filtered at level standard");

    // Reaching batch_size fires an automatic flush, no interval needed.
    client.track_at("d", TrackLevel::Standard, beacon::Properties::new());
    let flushed = wait_for(|| transport.calls() >= 1, Duration::from_secs(2)).await;

    assert!(flushed, "batch-size threshold should trigger delivery");
    assert_eq!(transport.sent_names(), vec![vec!["a", "b", "d"]]);
    assert_eq!(client.stats().filtered, 1);
    client.shutdown().await;
}

#[tokio::test]
async fn interval_flushes_below_batch_size() {
    let transport = MockTransport::new();
    let client = Beacon::init_with_transport(
        config("p1").flush_interval(Duration::from_millis(50)).build(),
        transport.clone(),
    )
    .unwrap();

    client.track("lonely");
    let flushed = wait_for(|| transport.calls() >= 1, Duration::from_secs(2)).await;

    assert!(flushed, "interval tick should deliver a partial batch");
    assert_eq!(transport.sent_names(), vec![vec!["lonely"]]);
    client.shutdown().await;
}

#[tokio::test]
async fn transient_failures_then_success_drains_the_queue() {
    let transport = MockTransport::scripted([
        Outcome::Err(TransportError::Retryable { status: 503 }),
        Outcome::Err(TransportError::Network("connection refused".into())),
        Outcome::Err(TransportError::Retryable { status: 500 }),
    ]);
    let client =
        Beacon::init_with_transport(config("p1").max_attempts(4).build(), transport.clone())
            .unwrap();

    client.track("persistent");
    let report = client.flush().await.unwrap();

    assert_eq!(transport.calls(), 4, "three transient failures, then the fourth succeeds");
    assert_eq!(report.delivered, 1);
    assert_eq!(report.dropped, 0);
    assert_eq!(client.pending(), 0);
    client.shutdown().await;
}

#[tokio::test]
async fn exhausted_retries_drop_the_batch_and_report() {
    let errors = ErrorLog::new();
    let errors_clone = errors.clone();
    let transport = MockTransport::scripted([
        Outcome::Err(TransportError::Retryable { status: 503 }),
        Outcome::Err(TransportError::Retryable { status: 503 }),
        Outcome::Err(TransportError::Retryable { status: 503 }),
    ]);
    let client = Beacon::init_with_transport(
        config("p1").max_attempts(3).on_error(move |error| errors_clone.record(error)).build(),
        transport.clone(),
    )
    .unwrap();

    client.track("lost_a");
    client.track("lost_b");
    let report = client.flush().await.unwrap();

    assert_eq!(transport.calls(), 3);
    assert_eq!(report.delivered, 0);
    assert_eq!(report.dropped, 2);
    assert_eq!(client.pending(), 0, "dropped events do not linger");
    assert!(errors.all().iter().any(|e| matches!(
        e,
        BeaconError::BatchDropped { count: 2, source: DeliveryError::Exhausted { .. } }
    )));
    client.shutdown().await;
}

#[tokio::test]
async fn permanent_failure_drops_without_retry() {
    let errors = ErrorLog::new();
    let errors_clone = errors.clone();
    let transport =
        MockTransport::scripted([Outcome::Err(TransportError::Rejected { status: 400 })]);
    let client = Beacon::init_with_transport(
        config("p1").max_attempts(5).on_error(move |error| errors_clone.record(error)).build(),
        transport.clone(),
    )
    .unwrap();

    client.track("bad_payload");
    let report = client.flush().await.unwrap();

    assert_eq!(transport.calls(), 1, "permanent failures are not retried");
    assert_eq!(report.dropped, 1);
    assert!(errors.all().iter().any(|e| matches!(
        e,
        BeaconError::BatchDropped { count: 1, source: DeliveryError::Permanent(_) }
    )));
    client.shutdown().await;
}

#[tokio::test]
async fn partial_rejection_requeues_subset_in_order() {
    let transport =
        MockTransport::scripted([Outcome::Ok(BatchReceipt { rejected: vec![1, 3] })]);
    let client = Beacon::init_with_transport(config("p1").build(), transport.clone()).unwrap();

    for name in ["e0", "e1", "e2", "e3", "e4"] {
        client.track(name);
    }
    let report = client.flush().await.unwrap();

    assert_eq!(report.delivered, 3);
    assert_eq!(report.requeued, 2);
    assert_eq!(client.pending(), 2, "rejected subset is back at the queue head");

    // The next cycle sends exactly the rejected events, original order.
    let report = client.flush().await.unwrap();
    assert_eq!(report.delivered, 2);
    assert_eq!(
        transport.sent_names(),
        vec![vec!["e0", "e1", "e2", "e3", "e4"], vec!["e1", "e3"]]
    );
    client.shutdown().await;
}

#[tokio::test]
async fn batch_id_stays_stable_across_retries() {
    let transport = MockTransport::scripted([
        Outcome::Err(TransportError::Retryable { status: 503 }),
        Outcome::Err(TransportError::Retryable { status: 503 }),
    ]);
    let client =
        Beacon::init_with_transport(config("p1").max_attempts(3).build(), transport.clone())
            .unwrap();

    client.track("same_batch");
    client.flush().await.unwrap();

    let sent = transport.sent();
    assert_eq!(sent.len(), 3);
    assert_eq!(sent[0].batch_id, sent[1].batch_id);
    assert_eq!(sent[1].batch_id, sent[2].batch_id, "collector can dedupe retried sends");
    client.shutdown().await;
}

#[tokio::test]
async fn concurrent_flushes_coalesce_without_duplicate_delivery() {
    let transport = MockTransport::scripted([Outcome::SlowOk(Duration::from_millis(100))]);
    let client = Beacon::init_with_transport(config("p1").build(), transport.clone()).unwrap();

    client.track("once_only");
    let (first, second) = tokio::join!(client.flush(), client.flush());

    assert!(first.is_ok());
    assert!(second.is_ok());
    assert_eq!(transport.calls(), 1, "no parallel duplicate deliveries");
    assert_eq!(transport.sent_names(), vec![vec!["once_only"]]);
    client.shutdown().await;
}

#[tokio::test]
async fn events_tracked_mid_flight_are_not_lost() {
    let transport = MockTransport::scripted([Outcome::SlowOk(Duration::from_millis(100))]);
    let client = Beacon::init_with_transport(config("p1").build(), transport.clone()).unwrap();

    client.track("before");
    let flusher = {
        let client = client.clone();
        tokio::spawn(async move { client.flush().await })
    };
    tokio::time::sleep(Duration::from_millis(30)).await;
    client.track("during");

    flusher.await.unwrap().unwrap();
    client.flush().await.unwrap();

    let names: Vec<String> = transport.sent_names().into_iter().flatten().collect();
    assert_eq!(names, vec!["before", "during"], "mid-flight events survive the snapshot removal");
    assert_eq!(client.pending(), 0);
    client.shutdown().await;
}

#[tokio::test]
async fn flush_on_empty_queue_resolves_immediately() {
    let transport = MockTransport::new();
    let client = Beacon::init_with_transport(config("p1").build(), transport.clone()).unwrap();

    let report = client.flush().await.unwrap();
    assert_eq!(report, beacon::FlushReport::default());
    assert_eq!(transport.calls(), 0);
    client.shutdown().await;
}
