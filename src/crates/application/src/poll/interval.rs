use chrono::{DateTime, Utc};
use std::time::Duration;

/// 远端单次最多返回的播放记录数
pub const REMOTE_BATCH_CAP: u32 = 50;

/// 远端计入收听历史的最短播放时长
pub const MIN_PLAY_DURATION: Duration = Duration::from_secs(30);

/// 一个间隔内用户最多能产生 batch_cap 条记录时的最长轮询间隔
///
/// 超过该间隔时，两次轮询之间的记录数可能超过远端上限，多出的记录会被静默丢失，
/// 运行时不做检测。
pub fn safe_poll_interval(batch_cap: u32, min_play_duration: Duration) -> Duration {
    min_play_duration.saturating_mul(batch_cap)
}

/// 下一轮相对本轮开始时间调度，本轮耗时超过间隔时立即开始
pub fn next_delay(started: DateTime<Utc>, now: DateTime<Utc>, interval: Duration) -> Duration {
    let elapsed = (now - started).to_std().unwrap_or(Duration::ZERO);
    interval.saturating_sub(elapsed)
}
