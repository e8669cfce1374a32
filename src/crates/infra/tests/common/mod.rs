#![allow(dead_code)]

use application::command::{Reconciler, UpsertEngine};
use application::error::AppError;
use application::poll::{PollLoop, PollSettings};
use application::retry::{RetryController, RetryPolicy};
use application::shared::{Clock, CredentialProvider, ListeningHistorySource, Sleeper};
use async_trait::async_trait;
use chrono::{DateTime, TimeZone, Utc};
use domain::album::Album;
use domain::artist::Artist;
use domain::play_event::PlayEvent;
use domain::track::Track;
use domain::value::ExternalId;
use infra::InMemoryCatalog;
use std::collections::BTreeSet;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::watch;

pub const START: i64 = 1_700_000_000;

pub fn at(secs_after_start: i64) -> DateTime<Utc> {
    Utc.timestamp_opt(START + secs_after_start, 0).unwrap()
}

pub fn artist(id: &str) -> Artist {
    Artist {
        external_id: ExternalId::from(id),
        name: format!("Artist {}", id),
        follower_count: 1_000,
        genres: BTreeSet::from(["shoegaze".to_string()]),
        image_urls: vec![format!("https://img.example/{}.jpg", id)],
        popularity: 40,
    }
}

pub fn album(id: &str) -> Album {
    Album {
        external_id: ExternalId::from(id),
        name: format!("Album {}", id),
        release_date: chrono::NaiveDate::from_ymd_opt(1991, 11, 4),
        album_type: "album".to_string(),
        track_count: 11,
        image_url: Some(format!("https://img.example/{}.jpg", id)),
    }
}

pub fn track(id: &str, album_id: &str) -> Track {
    Track {
        external_id: ExternalId::from(id),
        duration_ms: 240_000,
        explicit: false,
        name: format!("Track {}", id),
        is_local: Some(false),
        preview_url: None,
        popularity: 55,
        album: album(album_id),
    }
}

pub fn play(secs_after_start: i64, track_id: &str, album_id: &str, artists: &[&str]) -> PlayEvent {
    PlayEvent {
        played_at: at(secs_after_start),
        track: track(track_id, album_id),
        artists: artists.iter().map(|a| artist(a)).collect(),
    }
}

pub fn engine(catalog: &Arc<InMemoryCatalog>) -> UpsertEngine {
    UpsertEngine::new(catalog.repositories(), Duration::from_secs(5))
}

pub fn reconciler(catalog: &Arc<InMemoryCatalog>) -> Reconciler {
    Reconciler::new(engine(catalog))
}

pub struct FakeClock {
    now: Mutex<DateTime<Utc>>,
}

impl FakeClock {
    pub fn new(now: DateTime<Utc>) -> Self {
        Self {
            now: Mutex::new(now),
        }
    }

    pub fn advance(&self, by: Duration) {
        let mut now = self.now.lock().unwrap();
        *now += chrono::Duration::from_std(by).unwrap();
    }
}

impl Clock for FakeClock {
    fn now(&self) -> DateTime<Utc> {
        *self.now.lock().unwrap()
    }
}

/// 记录每次等待并推进假时钟；可在第 n 次等待后发出停机信号
pub struct FakeSleeper {
    clock: Arc<FakeClock>,
    slept: Mutex<Vec<Duration>>,
    shutdown: Mutex<Option<(usize, watch::Sender<bool>)>>,
}

impl FakeSleeper {
    pub fn new(clock: Arc<FakeClock>) -> Self {
        Self {
            clock,
            slept: Mutex::new(Vec::new()),
            shutdown: Mutex::new(None),
        }
    }

    pub fn shutdown_after(&self, sleeps: usize, sender: watch::Sender<bool>) {
        *self.shutdown.lock().unwrap() = Some((sleeps, sender));
    }

    pub fn slept(&self) -> Vec<Duration> {
        self.slept.lock().unwrap().clone()
    }
}

#[async_trait]
impl Sleeper for FakeSleeper {
    async fn sleep(&self, duration: Duration) {
        self.clock.advance(duration);
        let count = {
            let mut slept = self.slept.lock().unwrap();
            slept.push(duration);
            slept.len()
        };
        if let Some((after, sender)) = self.shutdown.lock().unwrap().as_ref() {
            if count >= *after {
                let _ = sender.send(true);
            }
        }
    }
}

pub struct StaticCredentials {
    pub authorized: bool,
}

#[async_trait]
impl CredentialProvider for StaticCredentials {
    async fn is_authorized(&self) -> bool {
        self.authorized
    }

    async fn valid_until(&self) -> Option<DateTime<Utc>> {
        self.authorized.then(|| at(3_600))
    }

    async fn access_token(&self) -> Result<String, AppError> {
        if self.authorized {
            Ok("token".to_string())
        } else {
            Err(AppError::CredentialError("not authorized".to_string()))
        }
    }
}

/// 模拟远端收听历史：按 after 过滤、按时间升序、受 limit 截断
pub struct FakeHistory {
    plays: Mutex<Vec<PlayEvent>>,
    calls: Mutex<Vec<(DateTime<Utc>, Option<u32>)>>,
    failures_left: AtomicUsize,
    ignore_after: bool,
    clock: Option<(Arc<FakeClock>, Duration)>,
}

impl FakeHistory {
    pub fn new(plays: Vec<PlayEvent>) -> Self {
        Self {
            plays: Mutex::new(plays),
            calls: Mutex::new(Vec::new()),
            failures_left: AtomicUsize::new(0),
            ignore_after: false,
            clock: None,
        }
    }

    /// 返回全部历史而不理会 after
    pub fn ignoring_after(mut self) -> Self {
        self.ignore_after = true;
        self
    }

    /// 每次拉取让假时钟前进 latency
    pub fn with_latency(mut self, clock: Arc<FakeClock>, latency: Duration) -> Self {
        self.clock = Some((clock, latency));
        self
    }

    pub fn fail_next(&self, times: usize) {
        self.failures_left.store(times, Ordering::SeqCst);
    }

    pub fn push(&self, event: PlayEvent) {
        self.plays.lock().unwrap().push(event);
    }

    pub fn calls(&self) -> Vec<(DateTime<Utc>, Option<u32>)> {
        self.calls.lock().unwrap().clone()
    }
}

#[async_trait]
impl ListeningHistorySource for FakeHistory {
    async fn fetch_recent_events(
        &self,
        after: DateTime<Utc>,
        limit: Option<u32>,
    ) -> Result<Vec<PlayEvent>, AppError> {
        self.calls.lock().unwrap().push((after, limit));
        if let Some((clock, latency)) = &self.clock {
            clock.advance(*latency);
        }
        let remaining = self.failures_left.load(Ordering::SeqCst);
        if remaining > 0 {
            self.failures_left.store(remaining - 1, Ordering::SeqCst);
            return Err(AppError::SourceError("429 Too Many Requests".to_string()));
        }

        let mut events: Vec<PlayEvent> = self
            .plays
            .lock()
            .unwrap()
            .iter()
            .filter(|e| self.ignore_after || e.played_at > after)
            .cloned()
            .collect();
        events.sort_by_key(|e| e.played_at);
        if let Some(limit) = limit {
            events.truncate(limit as usize);
        }
        Ok(events)
    }
}

pub struct Harness {
    pub catalog: Arc<InMemoryCatalog>,
    pub history: Arc<FakeHistory>,
    pub clock: Arc<FakeClock>,
    pub sleeper: Arc<FakeSleeper>,
}

impl Harness {
    pub fn new(history: FakeHistory, clock: Arc<FakeClock>) -> Self {
        Self {
            catalog: Arc::new(InMemoryCatalog::new()),
            history: Arc::new(history),
            sleeper: Arc::new(FakeSleeper::new(clock.clone())),
            clock,
        }
    }

    pub fn poll_loop(&self, authorized: bool, retry: RetryPolicy, settings: PollSettings) -> PollLoop {
        PollLoop::new(
            self.history.clone(),
            Arc::new(StaticCredentials { authorized }),
            reconciler(&self.catalog),
            RetryController::new(retry, self.sleeper.clone()),
            self.clock.clone(),
            self.sleeper.clone(),
            settings,
        )
    }
}

pub fn settings() -> PollSettings {
    PollSettings {
        interval: Duration::from_secs(1500),
        fetch_limit: Some(50),
    }
}

pub fn retry(max_retries: u32) -> RetryPolicy {
    RetryPolicy::new(max_retries, Duration::from_secs(10))
}
