use chrono::{DateTime, NaiveDate, Utc};
use domain::album::Album;
use domain::artist::Artist;
use domain::play_event::PlayEvent;
use domain::track::Track;
use domain::value::ExternalId;
use serde::Deserialize;
use std::collections::{BTreeSet, HashMap};

#[derive(Debug, Deserialize)]
pub struct RecentlyPlayedResponse {
    #[serde(default)]
    pub items: Vec<PlayHistoryItem>,
}

#[derive(Debug, Deserialize)]
pub struct PlayHistoryItem {
    pub played_at: DateTime<Utc>,
    pub track: TrackObject,
}

#[derive(Debug, Deserialize)]
pub struct TrackObject {
    /// 本地文件没有 ID
    pub id: Option<String>,
    pub name: String,
    pub duration_ms: i32,
    #[serde(default)]
    pub explicit: bool,
    pub is_local: Option<bool>,
    pub preview_url: Option<String>,
    #[serde(default)]
    pub popularity: i32,
    pub album: AlbumObject,
    #[serde(default)]
    pub artists: Vec<SimplifiedArtist>,
}

#[derive(Debug, Deserialize)]
pub struct AlbumObject {
    pub id: Option<String>,
    pub name: String,
    pub release_date: Option<String>,
    pub release_date_precision: Option<String>,
    /// 保持原始字符串，新的专辑类型不影响解析
    pub album_type: String,
    #[serde(default)]
    pub total_tracks: i32,
    #[serde(default)]
    pub images: Vec<ImageObject>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ImageObject {
    pub url: String,
}

#[derive(Debug, Deserialize)]
pub struct SimplifiedArtist {
    pub id: Option<String>,
    pub name: String,
}

#[derive(Debug, Deserialize)]
pub struct ArtistsResponse {
    /// 未知 ID 对应的位置为 null
    #[serde(default)]
    pub artists: Vec<Option<FullArtist>>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct FullArtist {
    pub id: String,
    pub name: String,
    pub followers: Option<Followers>,
    #[serde(default)]
    pub genres: Vec<String>,
    #[serde(default)]
    pub images: Vec<ImageObject>,
    #[serde(default)]
    pub popularity: i32,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Followers {
    pub total: i64,
}

#[derive(Debug, Deserialize)]
pub struct TokenResponse {
    pub access_token: String,
    pub expires_in: i64,
    /// 仅在平台轮换刷新令牌时返回
    pub refresh_token: Option<String>,
}

/// 按 release_date_precision 解析发行日期，精度不足的部分取第一天
pub fn parse_release_date(date: &str, precision: Option<&str>) -> Option<NaiveDate> {
    match precision.unwrap_or("day") {
        "year" => date
            .parse::<i32>()
            .ok()
            .and_then(|year| NaiveDate::from_ymd_opt(year, 1, 1)),
        "month" => NaiveDate::parse_from_str(&format!("{}-01", date), "%Y-%m-%d").ok(),
        _ => NaiveDate::parse_from_str(date, "%Y-%m-%d").ok(),
    }
}

impl PlayHistoryItem {
    /// 没有 ID 的曲目、专辑或艺术家（本地文件）无法 upsert，返回 None
    pub fn into_event(self, details: &HashMap<String, FullArtist>) -> Option<PlayEvent> {
        let track = self.track;
        let album = track.album;

        let artists = track
            .artists
            .into_iter()
            .map(|artist| {
                let id = artist.id?;
                Some(match details.get(&id) {
                    Some(full) => Artist {
                        external_id: ExternalId::from(id),
                        name: full.name.clone(),
                        follower_count: full
                            .followers
                            .as_ref()
                            .map(|f| f.total.clamp(0, i32::MAX as i64) as i32)
                            .unwrap_or(0),
                        genres: full.genres.iter().cloned().collect(),
                        image_urls: full.images.iter().map(|i| i.url.clone()).collect(),
                        popularity: full.popularity,
                    },
                    None => Artist {
                        external_id: ExternalId::from(id),
                        name: artist.name,
                        follower_count: 0,
                        genres: BTreeSet::new(),
                        image_urls: Vec::new(),
                        popularity: 0,
                    },
                })
            })
            .collect::<Option<Vec<_>>>()?;

        Some(PlayEvent {
            played_at: self.played_at,
            track: Track {
                external_id: ExternalId::from(track.id?),
                duration_ms: track.duration_ms,
                explicit: track.explicit,
                name: track.name,
                is_local: track.is_local,
                preview_url: track.preview_url,
                popularity: track.popularity,
                album: Album {
                    external_id: ExternalId::from(album.id?),
                    name: album.name,
                    release_date: album.release_date.as_deref().and_then(|date| {
                        parse_release_date(date, album.release_date_precision.as_deref())
                    }),
                    album_type: album.album_type,
                    track_count: album.total_tracks,
                    image_url: album.images.first().map(|i| i.url.clone()),
                },
            },
            artists,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    const RECENTLY_PLAYED: &str = r#"{
      "items": [
        {
          "played_at": "2021-03-14T09:26:53.589Z",
          "context": null,
          "track": {
            "id": "trk1",
            "name": "Feather",
            "duration_ms": 175000,
            "explicit": false,
            "is_local": false,
            "preview_url": null,
            "popularity": 64,
            "album": {
              "id": "alb1",
              "name": "Modal Soul",
              "release_date": "2005-11",
              "release_date_precision": "month",
              "album_type": "compilation_plus",
              "total_tracks": 14,
              "images": [{"url": "https://i.scdn.co/image/large", "height": 640, "width": 640},
                         {"url": "https://i.scdn.co/image/small", "height": 64, "width": 64}]
            },
            "artists": [
              {"id": "art1", "name": "Nujabes"},
              {"id": "art2", "name": "Cise Starr"}
            ]
          }
        }
      ]
    }"#;

    fn details() -> HashMap<String, FullArtist> {
        let full: ArtistsResponse = serde_json::from_str(
            r#"{"artists": [
                {"id": "art1", "name": "Nujabes", "followers": {"href": null, "total": 1200000},
                 "genres": ["jazz hop", "lo-fi"], "images": [{"url": "https://i.scdn.co/a1"}], "popularity": 70},
                null
            ]}"#,
        )
        .unwrap();
        full.artists
            .into_iter()
            .flatten()
            .map(|a| (a.id.clone(), a))
            .collect()
    }

    #[test]
    fn test_recently_played_maps_to_play_event() {
        let response: RecentlyPlayedResponse = serde_json::from_str(RECENTLY_PLAYED).unwrap();
        let item = response.items.into_iter().next().unwrap();

        let event = item.into_event(&details()).unwrap();

        assert_eq!(
            event.played_at,
            Utc.with_ymd_and_hms(2021, 3, 14, 9, 26, 53).unwrap()
                + chrono::Duration::milliseconds(589)
        );
        assert_eq!(event.track.external_id, ExternalId::from("trk1"));
        assert_eq!(event.track.album.album_type, "compilation_plus");
        assert_eq!(
            event.track.album.release_date,
            NaiveDate::from_ymd_opt(2005, 11, 1)
        );
        assert_eq!(
            event.track.album.image_url.as_deref(),
            Some("https://i.scdn.co/image/large")
        );
        assert_eq!(event.artists.len(), 2);
        assert_eq!(event.artists[0].follower_count, 1_200_000);
        assert!(event.artists[0].genres.contains("lo-fi"));
        // 详情缺失的艺术家保留简要字段
        assert_eq!(event.artists[1].name, "Cise Starr");
        assert_eq!(event.artists[1].follower_count, 0);
        assert!(event.artists[1].image_urls.is_empty());
    }

    #[test]
    fn test_local_track_without_id_is_dropped() {
        let json = RECENTLY_PLAYED.replace(r#""id": "trk1""#, r#""id": null"#);
        let response: RecentlyPlayedResponse = serde_json::from_str(&json).unwrap();
        let item = response.items.into_iter().next().unwrap();

        assert!(item.into_event(&HashMap::new()).is_none());
    }

    #[test]
    fn test_release_date_precision() {
        assert_eq!(
            parse_release_date("1999", Some("year")),
            NaiveDate::from_ymd_opt(1999, 1, 1)
        );
        assert_eq!(
            parse_release_date("1999-07-21", Some("day")),
            NaiveDate::from_ymd_opt(1999, 7, 21)
        );
        assert_eq!(
            parse_release_date("1999-07-21", None),
            NaiveDate::from_ymd_opt(1999, 7, 21)
        );
        assert_eq!(parse_release_date("0000", Some("day")), None);
        assert_eq!(parse_release_date("soon", Some("year")), None);
    }
}
