use crate::error::AppError;
use chrono::{DateTime, Utc};
use domain::play_event::PlayEvent;
use std::time::Duration;

/// 远端收听历史数据源
#[async_trait::async_trait]
pub trait ListeningHistorySource: Send + Sync {
    /// 返回严格晚于 after 的播放事件；limit 为 None 时请求数据源允许的最大条数
    async fn fetch_recent_events(
        &self,
        after: DateTime<Utc>,
        limit: Option<u32>,
    ) -> Result<Vec<PlayEvent>, AppError>;
}

/// 授权凭证提供者，核心只关心是否已授权
#[async_trait::async_trait]
pub trait CredentialProvider: Send + Sync {
    async fn is_authorized(&self) -> bool;

    async fn valid_until(&self) -> Option<DateTime<Utc>>;

    /// 当前可用的访问令牌，必要时先刷新
    async fn access_token(&self) -> Result<String, AppError>;
}

pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Utc>;
}

/// 可注入的等待实现，测试中无需真实等待
#[async_trait::async_trait]
pub trait Sleeper: Send + Sync {
    async fn sleep(&self, duration: Duration);
}
