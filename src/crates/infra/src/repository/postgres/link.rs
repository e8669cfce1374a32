use super::db_data::{album_artist, album_track, track_artist};
use super::store_err;
use async_trait::async_trait;
use domain::error::StoreError;
use domain::link::{AlbumArtist, AlbumTrack, LinkRepository, TrackArtist};
use sea_orm::sea_query::OnConflict;
use sea_orm::{DatabaseConnection, EntityTrait};

pub struct PostgresLinkRepository {
    db: DatabaseConnection,
}

impl PostgresLinkRepository {
    pub fn new(db: DatabaseConnection) -> Self {
        Self { db }
    }
}

// 冲突时 DO NOTHING 不返回行，必须用 exec_without_returning，否则会得到 RecordNotInserted
#[async_trait]
impl LinkRepository for PostgresLinkRepository {
    async fn link_album_artist(&self, link: &AlbumArtist) -> Result<(), StoreError> {
        album_artist::Entity::insert(album_artist::ActiveModel::from(link))
            .on_conflict(
                OnConflict::columns([
                    album_artist::Column::AlbumId,
                    album_artist::Column::ArtistId,
                ])
                .do_nothing()
                .to_owned(),
            )
            .exec_without_returning(&self.db)
            .await
            .map_err(store_err)?;
        Ok(())
    }

    async fn link_album_track(&self, link: &AlbumTrack) -> Result<(), StoreError> {
        album_track::Entity::insert(album_track::ActiveModel::from(link))
            .on_conflict(
                OnConflict::columns([album_track::Column::AlbumId, album_track::Column::TrackId])
                    .do_nothing()
                    .to_owned(),
            )
            .exec_without_returning(&self.db)
            .await
            .map_err(store_err)?;
        Ok(())
    }

    async fn link_track_artist(&self, link: &TrackArtist) -> Result<(), StoreError> {
        track_artist::Entity::insert(track_artist::ActiveModel::from(link))
            .on_conflict(
                OnConflict::columns([
                    track_artist::Column::TrackId,
                    track_artist::Column::ArtistId,
                ])
                .do_nothing()
                .to_owned(),
            )
            .exec_without_returning(&self.db)
            .await
            .map_err(store_err)?;
        Ok(())
    }
}
