use crate::error::StoreError;
use crate::value::{ArtistId, ExternalId};
use std::collections::BTreeSet;

#[derive(Debug, Clone, PartialEq)]
pub struct Artist {
    pub external_id: ExternalId,
    pub name: String,
    pub follower_count: i32,
    // 流派是无序集合，BTreeSet 保证落库顺序稳定
    pub genres: BTreeSet<String>,
    pub image_urls: Vec<String>,
    pub popularity: i32,
}

#[async_trait::async_trait]
pub trait ArtistRepository: Send + Sync {
    /// 按 external_id 插入，冲突时刷新 follower_count / genres / image_urls / popularity
    async fn upsert(&self, artist: &Artist) -> Result<ArtistId, StoreError>;
}
