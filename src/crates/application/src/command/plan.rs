use super::outcome::{Dependency, EntityKind, EventRef, StatementKind, WriteStatus};
use crate::identity_map::IdentityMap;
use domain::album::Album;
use domain::artist::Artist;
use domain::link::{AlbumArtist, AlbumTrack, TrackArtist};
use domain::play_event::{PlayEvent, PlayRecord};
use domain::track::Track;
use domain::value::{AlbumId, ArtistId, ExternalId, TrackId};
use std::collections::HashSet;

impl From<&PlayEvent> for EventRef {
    fn from(event: &PlayEvent) -> Self {
        Self {
            played_at: event.played_at,
            track: event.track.external_id.clone(),
        }
    }
}

/// 一个实体阶段（曲目/专辑/艺术家）结束后的代理主键解析结果
///
/// 第 4、5 阶段只从这里取外键：upsert 成功的进入 resolved，失败的进入 failed。
/// 两者都不包含的外部 ID 说明程序有缺陷，而不是上游写入失败。
#[derive(Debug, Clone)]
pub struct StageKeys<K> {
    kind: EntityKind,
    resolved: IdentityMap<K>,
    failed: HashSet<ExternalId>,
}

impl<K: Clone> StageKeys<K> {
    pub fn new(kind: EntityKind) -> Self {
        Self {
            kind,
            resolved: IdentityMap::new(),
            failed: HashSet::new(),
        }
    }

    pub fn record(&mut self, external_id: ExternalId, key: K) {
        self.resolved.record_surrogate(external_id, key);
    }

    pub fn mark_failed(&mut self, external_id: ExternalId) {
        self.failed.insert(external_id);
    }

    pub fn identities(&self) -> &IdentityMap<K> {
        &self.resolved
    }

    pub fn resolve(&self, external_id: &ExternalId) -> Result<K, WriteStatus> {
        if let Some(key) = self.resolved.lookup_surrogate(external_id) {
            return Ok(key.clone());
        }
        let dependency = Dependency::new(self.kind, external_id.clone());
        if self.failed.contains(external_id) {
            Err(WriteStatus::SkippedUpstream(dependency))
        } else {
            Err(WriteStatus::InvariantViolation(dependency))
        }
    }
}

/// 待执行的写入；write 为 Err 时表示依赖未解析，不会发往存储
#[derive(Debug, Clone)]
pub struct Planned<W> {
    pub statement: StatementKind,
    pub event: EventRef,
    pub write: Result<W, WriteStatus>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum LinkWrite {
    AlbumArtist(AlbumArtist),
    AlbumTrack(AlbumTrack),
    TrackArtist(TrackArtist),
}

fn distinct_by<'a, T>(
    rows: impl Iterator<Item = (EventRef, &'a T)>,
    key: impl Fn(&T) -> &ExternalId,
) -> Vec<(EventRef, &'a T)> {
    let mut seen = HashSet::new();
    rows.filter(|(_, row)| seen.insert(key(*row).clone()))
        .collect()
}

// 同一批次内按外部 ID 去重，保留首次出现（及其源事件）
pub fn distinct_tracks(events: &[PlayEvent]) -> Vec<(EventRef, &Track)> {
    distinct_by(
        events.iter().map(|e| (EventRef::from(e), &e.track)),
        |t| &t.external_id,
    )
}

pub fn distinct_artists(events: &[PlayEvent]) -> Vec<(EventRef, &Artist)> {
    distinct_by(
        events
            .iter()
            .flat_map(|e| e.artists.iter().map(move |a| (EventRef::from(e), a))),
        |a| &a.external_id,
    )
}

pub fn distinct_albums(events: &[PlayEvent]) -> Vec<(EventRef, &Album)> {
    distinct_by(
        events.iter().map(|e| (EventRef::from(e), &e.track.album)),
        |a| &a.external_id,
    )
}

/// 生成三张关联表的写入计划，按外部 ID 对去重
pub fn plan_links(
    events: &[PlayEvent],
    tracks: &StageKeys<TrackId>,
    albums: &StageKeys<AlbumId>,
    artists: &StageKeys<ArtistId>,
) -> Vec<Planned<LinkWrite>> {
    let mut seen: HashSet<(StatementKind, ExternalId, ExternalId)> = HashSet::new();
    let mut planned = Vec::new();

    for event in events {
        let event_ref = EventRef::from(event);
        let track_ext = &event.track.external_id;
        let album_ext = &event.track.album.external_id;

        if seen.insert((
            StatementKind::InsertAlbumTrack,
            album_ext.clone(),
            track_ext.clone(),
        )) {
            let write = albums.resolve(album_ext).and_then(|album_id| {
                tracks
                    .resolve(track_ext)
                    .map(|track_id| LinkWrite::AlbumTrack(AlbumTrack::new(album_id, track_id)))
            });
            planned.push(Planned {
                statement: StatementKind::InsertAlbumTrack,
                event: event_ref.clone(),
                write,
            });
        }

        for artist in &event.artists {
            let artist_ext = &artist.external_id;

            if seen.insert((
                StatementKind::InsertAlbumArtist,
                album_ext.clone(),
                artist_ext.clone(),
            )) {
                let write = albums.resolve(album_ext).and_then(|album_id| {
                    artists.resolve(artist_ext).map(|artist_id| {
                        LinkWrite::AlbumArtist(AlbumArtist::new(album_id, artist_id))
                    })
                });
                planned.push(Planned {
                    statement: StatementKind::InsertAlbumArtist,
                    event: event_ref.clone(),
                    write,
                });
            }

            if seen.insert((
                StatementKind::InsertTrackArtist,
                track_ext.clone(),
                artist_ext.clone(),
            )) {
                let write = tracks.resolve(track_ext).and_then(|track_id| {
                    artists.resolve(artist_ext).map(|artist_id| {
                        LinkWrite::TrackArtist(TrackArtist::new(track_id, artist_id))
                    })
                });
                planned.push(Planned {
                    statement: StatementKind::InsertTrackArtist,
                    event: event_ref.clone(),
                    write,
                });
            }
        }
    }

    planned
}

/// 生成 events 表的写入计划，按 (played_at, track) 去重
pub fn plan_plays(
    events: &[PlayEvent],
    tracks: &StageKeys<TrackId>,
    albums: &StageKeys<AlbumId>,
) -> Vec<Planned<PlayRecord>> {
    let mut seen = HashSet::new();
    events
        .iter()
        .filter(|e| seen.insert(EventRef::from(*e)))
        .map(|event| {
            let write = tracks
                .resolve(&event.track.external_id)
                .and_then(|track_id| {
                    albums
                        .resolve(&event.track.album.external_id)
                        .map(|album_id| PlayRecord {
                            played_at: event.played_at,
                            track_id,
                            album_id,
                        })
                });
            Planned {
                statement: StatementKind::InsertPlayEvent,
                event: EventRef::from(event),
                write,
            }
        })
        .collect()
}
