use application::command::CatalogRepositories;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use dashmap::{DashMap, DashSet};
use domain::album::{Album, AlbumRepository};
use domain::artist::{Artist, ArtistRepository};
use domain::error::StoreError;
use domain::link::{AlbumArtist, AlbumTrack, LinkRepository, TrackArtist};
use domain::play_event::{PlayEventRepository, PlayRecord};
use domain::track::{Track, TrackRepository};
use domain::value::{AlbumId, ArtistId, ExternalId, TrackId};
use std::sync::atomic::{AtomicI64, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

/// 可注入故障的写入目标
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FaultTarget {
    Track,
    Album,
    Artist,
    AlbumArtist,
    AlbumTrack,
    TrackArtist,
    PlayEvent,
    LatestPlayedAt,
}

#[derive(Debug, Clone)]
struct StoredRow<T> {
    id: i64,
    row: T,
}

/// 内存版存储，语义与 Postgres 表一致：
/// 实体按 external_id 唯一并刷新可变列，关联表与 events 冲突时什么也不做。
/// 无数据库时用于演练运行，也用于测试。
#[derive(Default)]
pub struct InMemoryCatalog {
    tracks: DashMap<ExternalId, StoredRow<Track>>,
    albums: DashMap<ExternalId, StoredRow<Album>>,
    artists: DashMap<ExternalId, StoredRow<Artist>>,
    album_artist: DashSet<(i64, i64)>,
    album_track: DashSet<(i64, i64)>,
    track_artist: DashSet<(i64, i64)>,
    // (ts, track_id) -> album_id
    events: DashMap<(DateTime<Utc>, i64), i64>,
    track_seq: AtomicI64,
    album_seq: AtomicI64,
    artist_seq: AtomicI64,
    failing_targets: DashSet<FaultTarget>,
    failing_ids: DashSet<(FaultTarget, ExternalId)>,
    latency_ms: AtomicU64,
}

impl InMemoryCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    /// 以同一个实例提供全部仓储
    pub fn repositories(self: &Arc<Self>) -> CatalogRepositories {
        CatalogRepositories {
            tracks: self.clone(),
            albums: self.clone(),
            artists: self.clone(),
            links: self.clone(),
            plays: self.clone(),
        }
    }

    /// 该目标的所有写入都失败
    pub fn fail_all(&self, target: FaultTarget) {
        self.failing_targets.insert(target);
    }

    /// 只有指定外部 ID 的实体写入失败
    pub fn fail_on(&self, target: FaultTarget, external_id: impl Into<ExternalId>) {
        self.failing_ids.insert((target, external_id.into()));
    }

    pub fn clear_faults(&self) {
        self.failing_targets.clear();
        self.failing_ids.clear();
    }

    /// 每次操作前额外等待，用于触发语句超时
    pub fn set_latency(&self, latency: Duration) {
        self.latency_ms
            .store(latency.as_millis() as u64, Ordering::SeqCst);
    }

    pub fn track_count(&self) -> usize {
        self.tracks.len()
    }

    pub fn album_count(&self) -> usize {
        self.albums.len()
    }

    pub fn artist_count(&self) -> usize {
        self.artists.len()
    }

    pub fn event_count(&self) -> usize {
        self.events.len()
    }

    pub fn track_id(&self, external_id: &str) -> Option<TrackId> {
        self.tracks
            .get(&ExternalId::from(external_id))
            .map(|r| TrackId::from(r.id))
    }

    pub fn album_id(&self, external_id: &str) -> Option<AlbumId> {
        self.albums
            .get(&ExternalId::from(external_id))
            .map(|r| AlbumId::from(r.id))
    }

    pub fn artist_id(&self, external_id: &str) -> Option<ArtistId> {
        self.artists
            .get(&ExternalId::from(external_id))
            .map(|r| ArtistId::from(r.id))
    }

    pub fn track(&self, external_id: &str) -> Option<Track> {
        self.tracks
            .get(&ExternalId::from(external_id))
            .map(|r| r.row.clone())
    }

    pub fn album(&self, external_id: &str) -> Option<Album> {
        self.albums
            .get(&ExternalId::from(external_id))
            .map(|r| r.row.clone())
    }

    pub fn artist(&self, external_id: &str) -> Option<Artist> {
        self.artists
            .get(&ExternalId::from(external_id))
            .map(|r| r.row.clone())
    }

    pub fn album_artist_pairs(&self) -> Vec<AlbumArtist> {
        let mut pairs: Vec<_> = self.album_artist.iter().map(|p| *p).collect();
        pairs.sort();
        pairs
            .into_iter()
            .map(|(album, artist)| AlbumArtist::new(album.into(), artist.into()))
            .collect()
    }

    pub fn album_track_pairs(&self) -> Vec<AlbumTrack> {
        let mut pairs: Vec<_> = self.album_track.iter().map(|p| *p).collect();
        pairs.sort();
        pairs
            .into_iter()
            .map(|(album, track)| AlbumTrack::new(album.into(), track.into()))
            .collect()
    }

    pub fn track_artist_pairs(&self) -> Vec<TrackArtist> {
        let mut pairs: Vec<_> = self.track_artist.iter().map(|p| *p).collect();
        pairs.sort();
        pairs
            .into_iter()
            .map(|(track, artist)| TrackArtist::new(track.into(), artist.into()))
            .collect()
    }

    /// 按播放时间升序
    pub fn play_records(&self) -> Vec<PlayRecord> {
        let mut records: Vec<PlayRecord> = self
            .events
            .iter()
            .map(|e| PlayRecord {
                played_at: e.key().0,
                track_id: TrackId::from(e.key().1),
                album_id: AlbumId::from(*e.value()),
            })
            .collect();
        records.sort_by_key(|r| (r.played_at, r.track_id.as_i64()));
        records
    }

    async fn enter(
        &self,
        target: FaultTarget,
        external_id: Option<&ExternalId>,
    ) -> Result<(), StoreError> {
        let latency = self.latency_ms.load(Ordering::SeqCst);
        if latency > 0 {
            tokio::time::sleep(Duration::from_millis(latency)).await;
        }
        let targeted = external_id
            .map(|id| self.failing_ids.contains(&(target, id.clone())))
            .unwrap_or(false);
        if targeted || self.failing_targets.contains(&target) {
            return Err(StoreError::DbErr(format!(
                "injected failure on {:?}",
                target
            )));
        }
        Ok(())
    }
}

fn next_id(seq: &AtomicI64) -> i64 {
    seq.fetch_add(1, Ordering::SeqCst) + 1
}

// 代理主键只增不删，已分配的 ID 即 1..=当前序列值
fn check_reference(
    table: &str,
    referenced: &str,
    seq: &AtomicI64,
    id: i64,
) -> Result<(), StoreError> {
    if id >= 1 && id <= seq.load(Ordering::SeqCst) {
        Ok(())
    } else {
        Err(StoreError::DbErr(format!(
            "insert on table \"{}\" violates foreign key: {} id {} does not exist",
            table, referenced, id
        )))
    }
}

#[async_trait]
impl TrackRepository for InMemoryCatalog {
    async fn upsert(&self, track: &Track) -> Result<TrackId, StoreError> {
        self.enter(FaultTarget::Track, Some(&track.external_id))
            .await?;
        let mut stored = self
            .tracks
            .entry(track.external_id.clone())
            .or_insert_with(|| StoredRow {
                id: next_id(&self.track_seq),
                row: track.clone(),
            });
        stored.row.popularity = track.popularity;
        Ok(TrackId::from(stored.id))
    }
}

#[async_trait]
impl AlbumRepository for InMemoryCatalog {
    async fn upsert(&self, album: &Album) -> Result<AlbumId, StoreError> {
        self.enter(FaultTarget::Album, Some(&album.external_id))
            .await?;
        let mut stored = self
            .albums
            .entry(album.external_id.clone())
            .or_insert_with(|| StoredRow {
                id: next_id(&self.album_seq),
                row: album.clone(),
            });
        stored.row.image_url = album.image_url.clone();
        Ok(AlbumId::from(stored.id))
    }
}

#[async_trait]
impl ArtistRepository for InMemoryCatalog {
    async fn upsert(&self, artist: &Artist) -> Result<ArtistId, StoreError> {
        self.enter(FaultTarget::Artist, Some(&artist.external_id))
            .await?;
        let mut stored = self
            .artists
            .entry(artist.external_id.clone())
            .or_insert_with(|| StoredRow {
                id: next_id(&self.artist_seq),
                row: artist.clone(),
            });
        stored.row.follower_count = artist.follower_count;
        stored.row.genres = artist.genres.clone();
        stored.row.image_urls = artist.image_urls.clone();
        stored.row.popularity = artist.popularity;
        Ok(ArtistId::from(stored.id))
    }
}

#[async_trait]
impl LinkRepository for InMemoryCatalog {
    async fn link_album_artist(&self, link: &AlbumArtist) -> Result<(), StoreError> {
        self.enter(FaultTarget::AlbumArtist, None).await?;
        check_reference("album_artist", "albums", &self.album_seq, link.album_id.as_i64())?;
        check_reference("album_artist", "artists", &self.artist_seq, link.artist_id.as_i64())?;
        self.album_artist
            .insert((link.album_id.as_i64(), link.artist_id.as_i64()));
        Ok(())
    }

    async fn link_album_track(&self, link: &AlbumTrack) -> Result<(), StoreError> {
        self.enter(FaultTarget::AlbumTrack, None).await?;
        check_reference("album_track", "albums", &self.album_seq, link.album_id.as_i64())?;
        check_reference("album_track", "tracks", &self.track_seq, link.track_id.as_i64())?;
        self.album_track
            .insert((link.album_id.as_i64(), link.track_id.as_i64()));
        Ok(())
    }

    async fn link_track_artist(&self, link: &TrackArtist) -> Result<(), StoreError> {
        self.enter(FaultTarget::TrackArtist, None).await?;
        check_reference("track_artist", "tracks", &self.track_seq, link.track_id.as_i64())?;
        check_reference("track_artist", "artists", &self.artist_seq, link.artist_id.as_i64())?;
        self.track_artist
            .insert((link.track_id.as_i64(), link.artist_id.as_i64()));
        Ok(())
    }
}

#[async_trait]
impl PlayEventRepository for InMemoryCatalog {
    async fn insert(&self, record: &PlayRecord) -> Result<(), StoreError> {
        self.enter(FaultTarget::PlayEvent, None).await?;
        check_reference("events", "tracks", &self.track_seq, record.track_id.as_i64())?;
        check_reference("events", "albums", &self.album_seq, record.album_id.as_i64())?;
        self.events
            .entry((record.played_at, record.track_id.as_i64()))
            .or_insert(record.album_id.as_i64());
        Ok(())
    }

    async fn latest_played_at(&self) -> Result<Option<DateTime<Utc>>, StoreError> {
        self.enter(FaultTarget::LatestPlayedAt, None).await?;
        Ok(self.events.iter().map(|e| e.key().0).max())
    }
}
