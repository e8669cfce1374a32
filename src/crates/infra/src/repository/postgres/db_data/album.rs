use domain::album::Album;
use sea_orm::entity::prelude::*;
use sea_orm::{NotSet, Set};

#[derive(Clone, Debug, PartialEq, DeriveEntityModel)]
#[sea_orm(table_name = "albums")]
pub struct Model {
    #[sea_orm(primary_key)]
    #[sea_orm(column_type = "BigInteger")]
    pub id: i64,
    #[sea_orm(unique)]
    pub spotify_id: String,
    pub album_name: String,
    pub release_date: Option<Date>,
    pub album_type: String,
    pub track_count: i32,
    pub image_url: Option<String>,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}

impl From<&Album> for ActiveModel {
    fn from(album: &Album) -> Self {
        Self {
            id: NotSet,
            spotify_id: Set(album.external_id.as_str().to_string()),
            album_name: Set(album.name.clone()),
            release_date: Set(album.release_date),
            album_type: Set(album.album_type.clone()),
            track_count: Set(album.track_count),
            image_url: Set(album.image_url.clone()),
        }
    }
}
