use crate::album::Album;
use crate::error::StoreError;
use crate::value::{ExternalId, TrackId};

#[derive(Debug, Clone, PartialEq)]
pub struct Track {
    pub external_id: ExternalId,
    pub duration_ms: i32,
    pub explicit: bool,
    pub name: String,
    pub is_local: Option<bool>,
    pub preview_url: Option<String>,
    pub popularity: i32,
    // 最近播放接口直接内嵌专辑信息，省去额外的专辑查询
    pub album: Album,
}

#[async_trait::async_trait]
pub trait TrackRepository: Send + Sync {
    /// 按 external_id 插入，冲突时只刷新 popularity；返回代理主键
    async fn upsert(&self, track: &Track) -> Result<TrackId, StoreError>;
}
