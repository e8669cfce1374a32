use chrono::{DateTime, Utc};
use domain::album::{Album, AlbumRepository};
use domain::artist::{Artist, ArtistRepository};
use domain::error::StoreError;
use domain::link::{AlbumArtist, AlbumTrack, LinkRepository, TrackArtist};
use domain::play_event::{PlayEventRepository, PlayRecord};
use domain::track::{Track, TrackRepository};
use domain::value::{AlbumId, ArtistId, TrackId};
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

/// 对账所需的全部仓储
#[derive(Clone)]
pub struct CatalogRepositories {
    pub tracks: Arc<dyn TrackRepository>,
    pub albums: Arc<dyn AlbumRepository>,
    pub artists: Arc<dyn ArtistRepository>,
    pub links: Arc<dyn LinkRepository>,
    pub plays: Arc<dyn PlayEventRepository>,
}

/// 幂等写入引擎：每次调用只发出一条语句，并受统一的超时约束
///
/// 单行失败以 `Err(StoreError)` 返回给调用方，由调用方记录为该行结果，
/// 不会中断同批次的其它行。
#[derive(Clone)]
pub struct UpsertEngine {
    repositories: CatalogRepositories,
    statement_timeout: Duration,
}

impl UpsertEngine {
    pub fn new(repositories: CatalogRepositories, statement_timeout: Duration) -> Self {
        Self {
            repositories,
            statement_timeout,
        }
    }

    pub async fn upsert_track(&self, track: &Track) -> Result<TrackId, StoreError> {
        self.bounded(self.repositories.tracks.upsert(track)).await
    }

    pub async fn upsert_album(&self, album: &Album) -> Result<AlbumId, StoreError> {
        self.bounded(self.repositories.albums.upsert(album)).await
    }

    pub async fn upsert_artist(&self, artist: &Artist) -> Result<ArtistId, StoreError> {
        self.bounded(self.repositories.artists.upsert(artist)).await
    }

    pub async fn link_album_artist(&self, link: &AlbumArtist) -> Result<(), StoreError> {
        self.bounded(self.repositories.links.link_album_artist(link))
            .await
    }

    pub async fn link_album_track(&self, link: &AlbumTrack) -> Result<(), StoreError> {
        self.bounded(self.repositories.links.link_album_track(link))
            .await
    }

    pub async fn link_track_artist(&self, link: &TrackArtist) -> Result<(), StoreError> {
        self.bounded(self.repositories.links.link_track_artist(link))
            .await
    }

    pub async fn insert_play(&self, record: &PlayRecord) -> Result<(), StoreError> {
        self.bounded(self.repositories.plays.insert(record)).await
    }

    pub async fn latest_played_at(&self) -> Result<Option<DateTime<Utc>>, StoreError> {
        self.bounded(self.repositories.plays.latest_played_at())
            .await
    }

    async fn bounded<T>(
        &self,
        operation: impl Future<Output = Result<T, StoreError>>,
    ) -> Result<T, StoreError> {
        match tokio::time::timeout(self.statement_timeout, operation).await {
            Ok(result) => result,
            Err(_) => Err(StoreError::Timeout(
                self.statement_timeout.as_millis() as u64,
            )),
        }
    }
}
