pub mod album;
pub mod artist;
pub mod db_data;
pub mod link;
pub mod play_event;
pub mod track;

use application::command::CatalogRepositories;
use sea_orm::{DatabaseConnection, DbErr};
use std::sync::Arc;

pub use album::PostgresAlbumRepository;
pub use artist::PostgresArtistRepository;
pub use link::PostgresLinkRepository;
pub use play_event::PostgresPlayEventRepository;
pub use track::PostgresTrackRepository;

pub(crate) fn store_err(e: DbErr) -> domain::error::StoreError {
    domain::error::StoreError::DbErr(e.to_string())
}

/// 用同一个连接池构造全部 Postgres 仓储
pub fn postgres_repositories(db: DatabaseConnection) -> CatalogRepositories {
    CatalogRepositories {
        tracks: Arc::new(PostgresTrackRepository::new(db.clone())),
        albums: Arc::new(PostgresAlbumRepository::new(db.clone())),
        artists: Arc::new(PostgresArtistRepository::new(db.clone())),
        links: Arc::new(PostgresLinkRepository::new(db.clone())),
        plays: Arc::new(PostgresPlayEventRepository::new(db)),
    }
}
