use crate::artist::Artist;
use crate::error::StoreError;
use crate::track::Track;
use crate::value::{AlbumId, TrackId};
use chrono::{DateTime, Utc};

/// 一次播放：某一时刻听到的曲目以及该曲目的演唱者
#[derive(Debug, Clone, PartialEq)]
pub struct PlayEvent {
    pub played_at: DateTime<Utc>,
    pub track: Track,
    pub artists: Vec<Artist>,
}

/// events 表中的一行，外键已解析为代理主键
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct PlayRecord {
    pub played_at: DateTime<Utc>,
    pub track_id: TrackId,
    pub album_id: AlbumId,
}

#[async_trait::async_trait]
pub trait PlayEventRepository: Send + Sync {
    /// (played_at, track_id) 冲突时什么也不做，已写入的播放记录不可变
    async fn insert(&self, record: &PlayRecord) -> Result<(), StoreError>;

    /// 已成功落库的最新播放时间，空表返回 None
    async fn latest_played_at(&self) -> Result<Option<DateTime<Utc>>, StoreError>;
}
