use domain::track::Track;
use sea_orm::entity::prelude::*;
use sea_orm::{NotSet, Set};

#[derive(Clone, Debug, PartialEq, DeriveEntityModel)]
#[sea_orm(table_name = "tracks")]
pub struct Model {
    #[sea_orm(primary_key)]
    #[sea_orm(column_type = "BigInteger")]
    pub id: i64,
    #[sea_orm(unique)]
    pub spotify_id: String,
    pub duration_ms: i32,
    pub is_explicit: bool,
    pub track_name: String,
    pub is_local: Option<bool>,
    pub preview_url: Option<String>,
    pub popularity: i32,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}

impl From<&Track> for ActiveModel {
    fn from(track: &Track) -> Self {
        Self {
            id: NotSet,
            spotify_id: Set(track.external_id.as_str().to_string()),
            duration_ms: Set(track.duration_ms),
            is_explicit: Set(track.explicit),
            track_name: Set(track.name.clone()),
            is_local: Set(track.is_local),
            preview_url: Set(track.preview_url.clone()),
            popularity: Set(track.popularity),
        }
    }
}
