use super::db_data::track::{ActiveModel, Column, Entity};
use super::store_err;
use async_trait::async_trait;
use domain::error::StoreError;
use domain::track::{Track, TrackRepository};
use domain::value::TrackId;
use log::debug;
use sea_orm::sea_query::OnConflict;
use sea_orm::{DatabaseConnection, EntityTrait};

pub struct PostgresTrackRepository {
    db: DatabaseConnection,
}

impl PostgresTrackRepository {
    pub fn new(db: DatabaseConnection) -> Self {
        Self { db }
    }
}

#[async_trait]
impl TrackRepository for PostgresTrackRepository {
    async fn upsert(&self, track: &Track) -> Result<TrackId, StoreError> {
        // INSERT ... ON CONFLICT (spotify_id) DO UPDATE SET popularity ... RETURNING
        let model = Entity::insert(ActiveModel::from(track))
            .on_conflict(
                OnConflict::column(Column::SpotifyId)
                    .update_column(Column::Popularity)
                    .to_owned(),
            )
            .exec_with_returning(&self.db)
            .await
            .map_err(store_err)?;

        debug!("Upserted track {} as id {}", track.external_id, model.id);
        Ok(TrackId::from(model.id))
    }
}
