use super::outcome::{
    EntityKind, EventRef, ReconcileReport, StatementKind, WriteOutcome, WriteStatus,
};
use super::plan::{
    distinct_albums, distinct_artists, distinct_tracks, plan_links, plan_plays, LinkWrite,
    Planned, StageKeys,
};
use super::upsert_engine::UpsertEngine;
use crate::context::CycleContext;
use domain::error::StoreError;
use domain::play_event::PlayEvent;
use domain::value::ExternalId;
use futures::future::join_all;
use log::{debug, error, info, warn};
use std::future::Future;

/// 按外键依赖顺序把一批播放事件写入存储
///
/// 阶段依次为：曲目 -> 艺术家 -> 专辑 -> 关联表 -> events。
/// 每个阶段内部的写入并发执行，阶段之间是同步屏障：上一阶段所有行
/// （无论成败）结束后才开始下一阶段。
pub struct Reconciler {
    engine: UpsertEngine,
}

impl Reconciler {
    pub fn new(engine: UpsertEngine) -> Self {
        Self { engine }
    }

    pub fn engine(&self) -> &UpsertEngine {
        &self.engine
    }

    pub async fn reconcile(&self, context: &CycleContext, events: &[PlayEvent]) -> ReconcileReport {
        let mut outcomes = Vec::new();
        if events.is_empty() {
            return ReconcileReport { outcomes };
        }

        let pending = distinct_tracks(events)
            .into_iter()
            .map(|(event, track)| {
                (
                    event,
                    track.external_id.clone(),
                    self.engine.upsert_track(track),
                )
            })
            .collect();
        let tracks = settle_entities(
            context,
            EntityKind::Track,
            StatementKind::UpsertTrack,
            pending,
            &mut outcomes,
        )
        .await;

        let pending = distinct_artists(events)
            .into_iter()
            .map(|(event, artist)| {
                (
                    event,
                    artist.external_id.clone(),
                    self.engine.upsert_artist(artist),
                )
            })
            .collect();
        let artists = settle_entities(
            context,
            EntityKind::Artist,
            StatementKind::UpsertArtist,
            pending,
            &mut outcomes,
        )
        .await;

        let pending = distinct_albums(events)
            .into_iter()
            .map(|(event, album)| {
                (
                    event,
                    album.external_id.clone(),
                    self.engine.upsert_album(album),
                )
            })
            .collect();
        let albums = settle_entities(
            context,
            EntityKind::Album,
            StatementKind::UpsertAlbum,
            pending,
            &mut outcomes,
        )
        .await;

        debug!(
            "[{}] entities resolved: {} tracks, {} artists, {} albums",
            context.correlation_id,
            tracks.identities().len(),
            artists.identities().len(),
            albums.identities().len()
        );

        let links = split_ready(
            context,
            plan_links(events, &tracks, &albums, &artists),
            &mut outcomes,
        );
        let results = join_all(links.iter().map(|(_, _, write)| self.write_link(write))).await;
        record_results(context, links, results, &mut outcomes);

        let plays = split_ready(context, plan_plays(events, &tracks, &albums), &mut outcomes);
        let results = join_all(
            plays
                .iter()
                .map(|(_, _, record)| self.engine.insert_play(record)),
        )
        .await;
        record_results(context, plays, results, &mut outcomes);

        let report = ReconcileReport { outcomes };
        info!(
            "[{}] reconciled {} events: {} written, {} failed, {} skipped, {} invariant violations",
            context.correlation_id,
            events.len(),
            report.written(),
            report.failed(),
            report.skipped(),
            report.invariant_violations()
        );
        report
    }

    async fn write_link(&self, write: &LinkWrite) -> Result<(), StoreError> {
        match write {
            LinkWrite::AlbumArtist(link) => self.engine.link_album_artist(link).await,
            LinkWrite::AlbumTrack(link) => self.engine.link_album_track(link).await,
            LinkWrite::TrackArtist(link) => self.engine.link_track_artist(link).await,
        }
    }
}

async fn settle_entities<K, Fut>(
    context: &CycleContext,
    kind: EntityKind,
    statement: StatementKind,
    pending: Vec<(EventRef, ExternalId, Fut)>,
    outcomes: &mut Vec<WriteOutcome>,
) -> StageKeys<K>
where
    K: Clone,
    Fut: Future<Output = Result<K, StoreError>>,
{
    let (rows, writes): (Vec<_>, Vec<_>) = pending
        .into_iter()
        .map(|(event, external_id, write)| ((event, external_id), write))
        .unzip();
    let results = join_all(writes).await;

    let mut keys = StageKeys::new(kind);
    for ((event, external_id), result) in rows.into_iter().zip(results) {
        match result {
            Ok(key) => {
                keys.record(external_id, key);
                outcomes.push(WriteOutcome::new(statement, event, WriteStatus::Written));
            }
            Err(e) => {
                warn!(
                    "[{}] {} failed for {} {} (event {}): {}",
                    context.correlation_id, statement, kind, external_id, event, e
                );
                keys.mark_failed(external_id);
                outcomes.push(WriteOutcome::new(statement, event, WriteStatus::Failed(e)));
            }
        }
    }
    keys
}

// 依赖未解析的写入直接记为结果，其余返回待执行
fn split_ready<W>(
    context: &CycleContext,
    planned: Vec<Planned<W>>,
    outcomes: &mut Vec<WriteOutcome>,
) -> Vec<(StatementKind, EventRef, W)> {
    let mut ready = Vec::with_capacity(planned.len());
    for Planned {
        statement,
        event,
        write,
    } in planned
    {
        match write {
            Ok(write) => ready.push((statement, event, write)),
            Err(status) => {
                match &status {
                    WriteStatus::SkippedUpstream(dependency) => warn!(
                        "[{}] {} skipped for event {}: {} was not persisted",
                        context.correlation_id, statement, event, dependency
                    ),
                    WriteStatus::InvariantViolation(dependency) => error!(
                        "[{}] {} for event {}: no surrogate key for {} although its upsert did not fail",
                        context.correlation_id, statement, event, dependency
                    ),
                    _ => {}
                }
                outcomes.push(WriteOutcome::new(statement, event, status));
            }
        }
    }
    ready
}

fn record_results<W>(
    context: &CycleContext,
    ready: Vec<(StatementKind, EventRef, W)>,
    results: Vec<Result<(), StoreError>>,
    outcomes: &mut Vec<WriteOutcome>,
) {
    for ((statement, event, _), result) in ready.into_iter().zip(results) {
        let status = match result {
            Ok(()) => WriteStatus::Written,
            Err(e) => {
                warn!(
                    "[{}] {} failed (event {}): {}",
                    context.correlation_id, statement, event, e
                );
                WriteStatus::Failed(e)
            }
        };
        outcomes.push(WriteOutcome::new(statement, event, status));
    }
}
