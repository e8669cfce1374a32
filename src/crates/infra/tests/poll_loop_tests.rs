mod common;

use application::context::CycleContext;
use application::error::AppError;
use application::poll::PollSettings;
use common::*;
use infra::FaultTarget;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;

fn harness(history: FakeHistory) -> Harness {
    Harness::new(history, Arc::new(FakeClock::new(at(0))))
}

#[tokio::test]
async fn test_empty_store_falls_back_to_process_start() {
    let h = harness(FakeHistory::new(vec![]));
    let poll_loop = h.poll_loop(true, retry(3), settings());

    assert_eq!(poll_loop.watermark().await.unwrap(), at(0));
    assert_eq!(poll_loop.started_at(), at(0));
}

#[tokio::test]
async fn test_watermark_advances_to_latest_persisted_play() {
    let h = harness(FakeHistory::new(vec![
        play(60, "trk1", "alb1", &["art1"]),
        play(300, "trk2", "alb1", &["art1", "art2"]),
        play(540, "trk3", "alb2", &["art2"]),
    ]));
    let poll_loop = h.poll_loop(true, retry(3), settings());

    let first = poll_loop.poll_once(&CycleContext::new(at(600))).await.unwrap();
    assert_eq!(first.watermark, at(0));
    assert_eq!(first.fetched, 3);
    assert_eq!(poll_loop.watermark().await.unwrap(), at(540));

    let second = poll_loop.poll_once(&CycleContext::new(at(900))).await.unwrap();
    assert_eq!(second.watermark, at(540));
    assert_eq!(second.fetched, 0);
    assert!(second.report.outcomes.is_empty());
    assert_eq!(h.catalog.event_count(), 3);

    let calls = h.history.calls();
    assert_eq!(calls[1], (at(540), Some(50)));
}

#[tokio::test]
async fn test_events_not_after_watermark_are_dropped() {
    let h = harness(
        FakeHistory::new(vec![
            play(-120, "old", "alb1", &["art1"]),
            play(0, "edge", "alb1", &["art1"]),
            play(30, "trk1", "alb1", &["art1"]),
        ])
        .ignoring_after(),
    );
    let poll_loop = h.poll_loop(true, retry(3), settings());

    let cycle = poll_loop.poll_once(&CycleContext::new(at(60))).await.unwrap();

    assert_eq!(cycle.fetched, 1);
    assert_eq!(h.catalog.event_count(), 1);
    assert!(h.catalog.track_id("old").is_none());
    assert!(h.catalog.track_id("edge").is_none());
}

#[tokio::test]
async fn test_watermark_stays_behind_unpersisted_events() {
    let h = harness(FakeHistory::new(vec![
        play(60, "trk1", "alb1", &["art1"]),
        play(120, "trk2", "alb2", &["art1"]),
    ]));
    h.catalog.fail_on(FaultTarget::Album, "alb2");
    let poll_loop = h.poll_loop(true, retry(3), settings());

    poll_loop.poll_once(&CycleContext::new(at(200))).await.unwrap();
    assert_eq!(poll_loop.watermark().await.unwrap(), at(60));

    // 下一轮从同一时间范围重新拉取并补齐
    h.catalog.clear_faults();
    let cycle = poll_loop.poll_once(&CycleContext::new(at(400))).await.unwrap();
    assert_eq!(cycle.fetched, 1);
    assert_eq!(poll_loop.watermark().await.unwrap(), at(120));
    assert_eq!(h.catalog.event_count(), 2);
}

#[tokio::test]
async fn test_earlier_failed_event_is_refetched_after_later_success() {
    let h = harness(FakeHistory::new(vec![
        play(60, "trk1", "alb2", &["art1"]),
        play(120, "trk2", "alb1", &["art1"]),
    ]));
    h.catalog.fail_on(FaultTarget::Album, "alb2");
    let poll_loop = h.poll_loop(true, retry(3), settings());

    poll_loop.poll_once(&CycleContext::new(at(200))).await.unwrap();
    assert_eq!(h.catalog.event_count(), 1);
    // 水位停在失败播放之前，而不是已写入的 120
    let held = at(60) - chrono::Duration::milliseconds(1);
    assert_eq!(poll_loop.watermark().await.unwrap(), held);

    h.catalog.clear_faults();
    let cycle = poll_loop.poll_once(&CycleContext::new(at(400))).await.unwrap();
    assert_eq!(cycle.watermark, held);
    assert_eq!(cycle.fetched, 2);
    assert_eq!(h.catalog.event_count(), 2);
    assert_eq!(poll_loop.watermark().await.unwrap(), at(120));
}

#[tokio::test]
async fn test_failed_join_row_is_retried_although_its_event_was_stored() {
    let h = harness(FakeHistory::new(vec![
        play(60, "trk1", "alb1", &["art1"]),
        play(120, "trk2", "alb1", &["art1"]),
    ]));
    h.catalog.fail_all(FaultTarget::TrackArtist);
    let poll_loop = h.poll_loop(true, retry(3), settings());

    poll_loop.poll_once(&CycleContext::new(at(200))).await.unwrap();
    assert_eq!(h.catalog.event_count(), 2);
    assert!(h.catalog.track_artist_pairs().is_empty());
    assert!(poll_loop.watermark().await.unwrap() < at(60));

    h.catalog.clear_faults();
    let cycle = poll_loop.poll_once(&CycleContext::new(at(400))).await.unwrap();
    assert_eq!(cycle.fetched, 2);
    assert_eq!(h.catalog.track_artist_pairs().len(), 2);
    assert_eq!(h.catalog.event_count(), 2);
    assert_eq!(poll_loop.watermark().await.unwrap(), at(120));
}

#[tokio::test]
async fn test_transient_source_failure_is_retried() {
    let h = harness(FakeHistory::new(vec![play(60, "trk1", "alb1", &["art1"])]));
    h.history.fail_next(2);
    let poll_loop = h.poll_loop(true, retry(3), settings());

    let cycle = poll_loop.run_cycle().await.unwrap();

    assert_eq!(cycle.fetched, 1);
    assert_eq!(h.history.calls().len(), 3);
    assert_eq!(h.sleeper.slept(), vec![Duration::from_secs(10); 2]);
}

#[tokio::test]
async fn test_exhausted_retries_abandon_the_cycle() {
    let h = harness(FakeHistory::new(vec![play(60, "trk1", "alb1", &["art1"])]));
    h.history.fail_next(usize::MAX);
    let poll_loop = h.poll_loop(true, retry(2), settings());

    let err = poll_loop.run_cycle().await.unwrap_err();

    assert_eq!(err.attempts, 3);
    assert_eq!(err.operation, "poll cycle");
    assert!(matches!(err.source, AppError::SourceError(_)));
    assert_eq!(h.history.calls().len(), 3);
    assert_eq!(h.catalog.event_count(), 0);
}

#[tokio::test]
async fn test_store_failure_reading_watermark_is_retried() {
    let h = harness(FakeHistory::new(vec![]));
    h.catalog.fail_all(FaultTarget::LatestPlayedAt);
    let poll_loop = h.poll_loop(true, retry(1), settings());

    let err = poll_loop.run_cycle().await.unwrap_err();

    assert_eq!(err.attempts, 2);
    assert!(matches!(err.source, AppError::StoreError(_)));
    assert!(h.history.calls().is_empty());
}

#[tokio::test]
async fn test_run_refuses_to_start_without_authorization() {
    let h = harness(FakeHistory::new(vec![]));
    let poll_loop = h.poll_loop(false, retry(3), settings());
    let (_tx, rx) = watch::channel(false);

    let result = poll_loop.run(rx).await;

    assert!(matches!(result, Err(AppError::CredentialError(_))));
    assert!(h.history.calls().is_empty());
}

#[tokio::test]
async fn test_run_stops_after_in_flight_cycle_on_shutdown() {
    let h = harness(FakeHistory::new(vec![play(60, "trk1", "alb1", &["art1"])]));
    let poll_loop = h.poll_loop(true, retry(3), settings());
    let (tx, rx) = watch::channel(false);
    h.sleeper.shutdown_after(2, tx);

    poll_loop.run(rx).await.unwrap();

    assert_eq!(h.history.calls().len(), 2);
    assert_eq!(h.catalog.event_count(), 1);
}

#[tokio::test]
async fn test_run_stops_when_shutdown_sender_is_dropped() {
    let h = harness(FakeHistory::new(vec![]));
    let poll_loop = h.poll_loop(true, retry(0), settings());
    let (tx, rx) = watch::channel(false);
    drop(tx);

    poll_loop.run(rx).await.unwrap();

    assert!(h.history.calls().is_empty());
}

#[tokio::test]
async fn test_failed_cycle_does_not_stop_the_loop() {
    let h = harness(FakeHistory::new(vec![play(60, "trk1", "alb1", &["art1"])]));
    h.history.fail_next(1);
    let poll_loop = h.poll_loop(true, retry(0), settings());
    let (tx, rx) = watch::channel(false);
    h.sleeper.shutdown_after(2, tx);

    poll_loop.run(rx).await.unwrap();

    assert_eq!(h.history.calls().len(), 2);
    assert_eq!(h.catalog.event_count(), 1);
}

#[tokio::test]
async fn test_next_cycle_is_scheduled_from_previous_start() {
    let clock = Arc::new(FakeClock::new(at(0)));
    let history = FakeHistory::new(vec![]).with_latency(clock.clone(), Duration::from_secs(100));
    let h = Harness::new(history, clock);
    h.history.fail_next(1);
    let poll_loop = h.poll_loop(
        true,
        retry(1),
        PollSettings {
            interval: Duration::from_secs(1500),
            fetch_limit: None,
        },
    );
    let (tx, rx) = watch::channel(false);
    // 第 1 次等待是重试间隔，第 2 次是周期间隔
    h.sleeper.shutdown_after(2, tx);

    poll_loop.run(rx).await.unwrap();

    // 两次拉取各 100s，加 10s 重试间隔，周期间隔相应缩短
    assert_eq!(
        h.sleeper.slept(),
        vec![Duration::from_secs(10), Duration::from_secs(1290)]
    );
    assert_eq!(h.history.calls()[0].1, None);
}
