use chrono::{DateTime, FixedOffset, Utc};
use sea_orm::FromQueryResult;

/// events 表的主键含时间戳，直接用 SQL 读写，不定义实体
pub const INSERT_EVENT: &str = r#"INSERT INTO events (ts, track_id, album_id)
VALUES ($1, $2, $3)
ON CONFLICT ON CONSTRAINT events_pkey DO NOTHING"#;

pub const LATEST_EVENT_TS: &str = "SELECT MAX(ts) AS ts FROM events";

#[derive(Debug, FromQueryResult)]
pub struct LatestEventRow {
    pub ts: Option<DateTime<FixedOffset>>,
}

impl LatestEventRow {
    pub fn played_at(&self) -> Option<DateTime<Utc>> {
        self.ts.map(|ts| ts.with_timezone(&Utc))
    }
}
