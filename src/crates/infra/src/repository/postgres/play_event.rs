use super::db_data::event::{LatestEventRow, INSERT_EVENT, LATEST_EVENT_TS};
use super::store_err;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use domain::error::StoreError;
use domain::play_event::{PlayEventRepository, PlayRecord};
use sea_orm::{ConnectionTrait, DatabaseConnection, DbBackend, FromQueryResult, Statement};

pub struct PostgresPlayEventRepository {
    db: DatabaseConnection,
}

impl PostgresPlayEventRepository {
    pub fn new(db: DatabaseConnection) -> Self {
        Self { db }
    }
}

#[async_trait]
impl PlayEventRepository for PostgresPlayEventRepository {
    async fn insert(&self, record: &PlayRecord) -> Result<(), StoreError> {
        let stmt = Statement::from_sql_and_values(
            DbBackend::Postgres,
            INSERT_EVENT,
            [
                record.played_at.into(),
                record.track_id.as_i64().into(),
                record.album_id.as_i64().into(),
            ],
        );
        self.db.execute(stmt).await.map_err(store_err)?;
        Ok(())
    }

    async fn latest_played_at(&self) -> Result<Option<DateTime<Utc>>, StoreError> {
        let row = LatestEventRow::find_by_statement(Statement::from_string(
            DbBackend::Postgres,
            LATEST_EVENT_TS,
        ))
        .one(&self.db)
        .await
        .map_err(store_err)?;
        Ok(row.and_then(|r| r.played_at()))
    }
}
