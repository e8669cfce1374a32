use crate::error::StoreError;
use crate::value::{AlbumId, ArtistId, TrackId};

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct AlbumArtist {
    pub album_id: AlbumId,
    pub artist_id: ArtistId,
}

impl AlbumArtist {
    pub fn new(album_id: AlbumId, artist_id: ArtistId) -> Self {
        Self {
            album_id,
            artist_id,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct AlbumTrack {
    pub album_id: AlbumId,
    pub track_id: TrackId,
}

impl AlbumTrack {
    pub fn new(album_id: AlbumId, track_id: TrackId) -> Self {
        Self { album_id, track_id }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct TrackArtist {
    pub track_id: TrackId,
    pub artist_id: ArtistId,
}

impl TrackArtist {
    pub fn new(track_id: TrackId, artist_id: ArtistId) -> Self {
        Self {
            track_id,
            artist_id,
        }
    }
}

// 关联表只插入不更新，主键冲突时什么也不做
#[async_trait::async_trait]
pub trait LinkRepository: Send + Sync {
    async fn link_album_artist(&self, link: &AlbumArtist) -> Result<(), StoreError>;

    async fn link_album_track(&self, link: &AlbumTrack) -> Result<(), StoreError>;

    async fn link_track_artist(&self, link: &TrackArtist) -> Result<(), StoreError>;
}
