use domain::artist::Artist;
use sea_orm::entity::prelude::*;
use sea_orm::{NotSet, Set};

#[derive(Clone, Debug, PartialEq, DeriveEntityModel)]
#[sea_orm(table_name = "artists")]
pub struct Model {
    #[sea_orm(primary_key)]
    #[sea_orm(column_type = "BigInteger")]
    pub id: i64,
    #[sea_orm(unique)]
    pub spotify_id: String,
    pub artist_name: String,
    pub follower_count: i32,
    pub genres: Vec<String>,
    pub image_urls: Vec<String>,
    pub popularity: i32,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}

impl From<&Artist> for ActiveModel {
    fn from(artist: &Artist) -> Self {
        Self {
            id: NotSet,
            spotify_id: Set(artist.external_id.as_str().to_string()),
            artist_name: Set(artist.name.clone()),
            follower_count: Set(artist.follower_count),
            genres: Set(artist.genres.iter().cloned().collect()),
            image_urls: Set(artist.image_urls.clone()),
            popularity: Set(artist.popularity),
        }
    }
}
