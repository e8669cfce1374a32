use crate::error::StoreError;
use crate::value::{AlbumId, ExternalId};
use chrono::NaiveDate;

#[derive(Debug, Clone, PartialEq)]
pub struct Album {
    pub external_id: ExternalId,
    pub name: String,
    pub release_date: Option<NaiveDate>,
    // 发行类型保持自由字符串（album / single / compilation ...），新类型不应导致解析失败
    pub album_type: String,
    pub track_count: i32,
    pub image_url: Option<String>,
}

#[async_trait::async_trait]
pub trait AlbumRepository: Send + Sync {
    /// 按 external_id 插入，冲突时只刷新 image_url；返回代理主键
    async fn upsert(&self, album: &Album) -> Result<AlbumId, StoreError>;
}
