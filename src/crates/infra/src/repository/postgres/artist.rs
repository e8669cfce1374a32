use super::db_data::artist::{ActiveModel, Column, Entity};
use super::store_err;
use async_trait::async_trait;
use domain::artist::{Artist, ArtistRepository};
use domain::error::StoreError;
use domain::value::ArtistId;
use log::debug;
use sea_orm::sea_query::OnConflict;
use sea_orm::{DatabaseConnection, EntityTrait};

pub struct PostgresArtistRepository {
    db: DatabaseConnection,
}

impl PostgresArtistRepository {
    pub fn new(db: DatabaseConnection) -> Self {
        Self { db }
    }
}

#[async_trait]
impl ArtistRepository for PostgresArtistRepository {
    async fn upsert(&self, artist: &Artist) -> Result<ArtistId, StoreError> {
        let model = Entity::insert(ActiveModel::from(artist))
            .on_conflict(
                OnConflict::column(Column::SpotifyId)
                    .update_columns([
                        Column::FollowerCount,
                        Column::Genres,
                        Column::ImageUrls,
                        Column::Popularity,
                    ])
                    .to_owned(),
            )
            .exec_with_returning(&self.db)
            .await
            .map_err(store_err)?;

        debug!("Upserted artist {} as id {}", artist.external_id, model.id);
        Ok(ArtistId::from(model.id))
    }
}
