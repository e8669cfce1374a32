use super::api_types::{ArtistsResponse, FullArtist, RecentlyPlayedResponse};
use super::ARTIST_BATCH_SIZE;
use crate::config::SpotifyConfig;
use application::error::AppError;
use application::poll::REMOTE_BATCH_CAP;
use application::shared::{CredentialProvider, ListeningHistorySource};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use domain::play_event::PlayEvent;
use log::{debug, warn};
use serde::de::DeserializeOwned;
use std::collections::{BTreeSet, HashMap};
use std::sync::Arc;

/// Spotify Web API 的最近播放接口
pub struct SpotifyHistorySource {
    http: reqwest::Client,
    api_base_url: String,
    credentials: Arc<dyn CredentialProvider>,
}

impl SpotifyHistorySource {
    pub fn new(
        config: &SpotifyConfig,
        credentials: Arc<dyn CredentialProvider>,
    ) -> Result<Self, AppError> {
        let http = reqwest::Client::builder()
            .timeout(config.request_timeout)
            .build()
            .map_err(|e| AppError::SourceError(format!("failed to build HTTP client: {}", e)))?;
        Ok(Self {
            http,
            api_base_url: config.api_base_url.clone(),
            credentials,
        })
    }

    async fn get_json<T: DeserializeOwned>(
        &self,
        path: &str,
        query: &[(&str, String)],
    ) -> Result<T, AppError> {
        let token = self.credentials.access_token().await?;
        let url = format!("{}{}", self.api_base_url, path);

        let response = self
            .http
            .get(&url)
            .bearer_auth(token)
            .query(query)
            .send()
            .await
            .map_err(|e| AppError::SourceError(format!("GET {} failed: {}", path, e)))?;

        if !response.status().is_success() {
            let status = response.status();
            let error_text = response.text().await.unwrap_or_default();
            return Err(AppError::SourceError(format!(
                "GET {} returned {} - {}",
                path, status, error_text
            )));
        }

        response
            .json::<T>()
            .await
            .map_err(|e| AppError::SourceError(format!("failed to parse {} response: {}", path, e)))
    }

    async fn fetch_artist_details(
        &self,
        ids: &BTreeSet<String>,
    ) -> Result<HashMap<String, FullArtist>, AppError> {
        let ids: Vec<&str> = ids.iter().map(String::as_str).collect();
        let mut details = HashMap::with_capacity(ids.len());
        for chunk in ids.chunks(ARTIST_BATCH_SIZE) {
            let response: ArtistsResponse = self
                .get_json("/artists", &[("ids", chunk.join(","))])
                .await?;
            details.extend(response.artists.into_iter().flatten().map(|a| (a.id.clone(), a)));
        }
        Ok(details)
    }
}

// 未指定 limit 时显式请求远端上限，接口自身的默认值只有 20
fn recently_played_query(after: DateTime<Utc>, limit: Option<u32>) -> Vec<(&'static str, String)> {
    let limit = limit.unwrap_or(REMOTE_BATCH_CAP).clamp(1, REMOTE_BATCH_CAP);
    vec![
        ("after", after.timestamp_millis().to_string()),
        ("limit", limit.to_string()),
    ]
}

#[async_trait]
impl ListeningHistorySource for SpotifyHistorySource {
    async fn fetch_recent_events(
        &self,
        after: DateTime<Utc>,
        limit: Option<u32>,
    ) -> Result<Vec<PlayEvent>, AppError> {
        let query = recently_played_query(after, limit);
        let response: RecentlyPlayedResponse = self
            .get_json("/me/player/recently-played", &query)
            .await?;

        let artist_ids: BTreeSet<String> = response
            .items
            .iter()
            .flat_map(|item| item.track.artists.iter().filter_map(|a| a.id.clone()))
            .collect();
        let details = if artist_ids.is_empty() {
            HashMap::new()
        } else {
            self.fetch_artist_details(&artist_ids).await?
        };
        debug!(
            "Fetched {} items, {} artist details",
            response.items.len(),
            details.len()
        );

        let mut events = Vec::with_capacity(response.items.len());
        for item in response.items {
            let played_at = item.played_at;
            match item.into_event(&details) {
                Some(event) => events.push(event),
                None => warn!(
                    "Skipping play at {} without a catalog id (local file?)",
                    played_at.to_rfc3339()
                ),
            }
        }
        events.sort_by_key(|e| e.played_at);
        Ok(events)
    }
}
