use super::db_data::album::{ActiveModel, Column, Entity};
use super::store_err;
use async_trait::async_trait;
use domain::album::{Album, AlbumRepository};
use domain::error::StoreError;
use domain::value::AlbumId;
use log::debug;
use sea_orm::sea_query::OnConflict;
use sea_orm::{DatabaseConnection, EntityTrait};

pub struct PostgresAlbumRepository {
    db: DatabaseConnection,
}

impl PostgresAlbumRepository {
    pub fn new(db: DatabaseConnection) -> Self {
        Self { db }
    }
}

#[async_trait]
impl AlbumRepository for PostgresAlbumRepository {
    async fn upsert(&self, album: &Album) -> Result<AlbumId, StoreError> {
        let model = Entity::insert(ActiveModel::from(album))
            .on_conflict(
                OnConflict::column(Column::SpotifyId)
                    .update_column(Column::ImageUrl)
                    .to_owned(),
            )
            .exec_with_returning(&self.db)
            .await
            .map_err(store_err)?;

        debug!("Upserted album {} as id {}", album.external_id, model.id);
        Ok(AlbumId::from(model.id))
    }
}
