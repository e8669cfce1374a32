use chrono::{DateTime, Utc};
use domain::error::StoreError;
use domain::value::ExternalId;
use std::fmt::{self, Display};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EntityKind {
    Track,
    Album,
    Artist,
}

impl Display for EntityKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EntityKind::Track => write!(f, "track"),
            EntityKind::Album => write!(f, "album"),
            EntityKind::Artist => write!(f, "artist"),
        }
    }
}

/// 对账过程中执行的语句类别
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StatementKind {
    UpsertTrack,
    UpsertArtist,
    UpsertAlbum,
    InsertAlbumArtist,
    InsertAlbumTrack,
    InsertTrackArtist,
    InsertPlayEvent,
}

impl Display for StatementKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            StatementKind::UpsertTrack => "upsert tracks",
            StatementKind::UpsertArtist => "upsert artists",
            StatementKind::UpsertAlbum => "upsert albums",
            StatementKind::InsertAlbumArtist => "insert album_artist",
            StatementKind::InsertAlbumTrack => "insert album_track",
            StatementKind::InsertTrackArtist => "insert track_artist",
            StatementKind::InsertPlayEvent => "insert events",
        };
        f.write_str(name)
    }
}

/// 某一写入所依赖的实体
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Dependency {
    pub kind: EntityKind,
    pub external_id: ExternalId,
}

impl Dependency {
    pub fn new(kind: EntityKind, external_id: ExternalId) -> Self {
        Self { kind, external_id }
    }
}

impl Display for Dependency {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.kind, self.external_id)
    }
}

/// 触发写入的源播放事件
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct EventRef {
    pub played_at: DateTime<Utc>,
    pub track: ExternalId,
}

impl Display for EventRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}@{}", self.track, self.played_at.to_rfc3339())
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum WriteStatus {
    Written,
    /// 存储层拒绝了该行
    Failed(StoreError),
    /// 依赖实体的 upsert 在本轮失败，未尝试写入
    SkippedUpstream(Dependency),
    /// 依赖实体 upsert 成功却查不到代理主键，属于程序缺陷
    InvariantViolation(Dependency),
}

#[derive(Debug, Clone, PartialEq)]
pub struct WriteOutcome {
    pub statement: StatementKind,
    pub event: EventRef,
    pub status: WriteStatus,
}

impl WriteOutcome {
    pub fn new(statement: StatementKind, event: EventRef, status: WriteStatus) -> Self {
        Self {
            statement,
            event,
            status,
        }
    }

    pub fn is_written(&self) -> bool {
        matches!(self.status, WriteStatus::Written)
    }

    pub fn is_failed(&self) -> bool {
        matches!(self.status, WriteStatus::Failed(_))
    }

    pub fn is_skipped(&self) -> bool {
        matches!(self.status, WriteStatus::SkippedUpstream(_))
    }

    pub fn is_invariant_violation(&self) -> bool {
        matches!(self.status, WriteStatus::InvariantViolation(_))
    }
}

/// 一次对账的全部逐行结果
#[derive(Debug, Clone, Default)]
pub struct ReconcileReport {
    pub outcomes: Vec<WriteOutcome>,
}

impl ReconcileReport {
    pub fn written(&self) -> usize {
        self.outcomes.iter().filter(|o| o.is_written()).count()
    }

    pub fn failed(&self) -> usize {
        self.outcomes.iter().filter(|o| o.is_failed()).count()
    }

    pub fn skipped(&self) -> usize {
        self.outcomes.iter().filter(|o| o.is_skipped()).count()
    }

    pub fn invariant_violations(&self) -> usize {
        self.outcomes
            .iter()
            .filter(|o| o.is_invariant_violation())
            .count()
    }

    pub fn for_statement(&self, statement: StatementKind) -> impl Iterator<Item = &WriteOutcome> {
        self.outcomes
            .iter()
            .filter(move |o| o.statement == statement)
    }

    /// 本轮成功写入 events 表的最新播放时间
    pub fn latest_persisted_play(&self) -> Option<DateTime<Utc>> {
        self.for_statement(StatementKind::InsertPlayEvent)
            .filter(|o| o.is_written())
            .map(|o| o.event.played_at)
            .max()
    }

    /// 本轮任一写入未完成（失败、跳过或不变量违例）的最早播放时间
    pub fn earliest_unsettled_play(&self) -> Option<DateTime<Utc>> {
        self.outcomes
            .iter()
            .filter(|o| !o.is_written())
            .map(|o| o.event.played_at)
            .min()
    }
}
