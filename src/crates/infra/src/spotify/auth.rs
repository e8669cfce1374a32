use super::api_types::TokenResponse;
use crate::config::SpotifyConfig;
use application::error::AppError;
use application::shared::{Clock, CredentialProvider};
use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use log::{debug, info};
use std::sync::Arc;
use tokio::sync::Mutex;

/// 距离过期不足该秒数时提前刷新
const REFRESH_MARGIN_SECS: i64 = 60;

#[derive(Debug, Clone)]
struct AccessToken {
    value: String,
    expires_at: DateTime<Utc>,
}

fn needs_refresh(expires_at: DateTime<Utc>, now: DateTime<Utc>) -> bool {
    expires_at - now <= Duration::seconds(REFRESH_MARGIN_SECS)
}

struct TokenState {
    refresh_token: String,
    current: Option<AccessToken>,
}

/// 用配置中的刷新令牌换取访问令牌，并在过期前按需刷新
///
/// 交互式授权不在此处理，刷新令牌需事先获取。
pub struct RefreshTokenCredentials {
    http: reqwest::Client,
    token_url: String,
    client_id: String,
    client_secret: String,
    clock: Arc<dyn Clock>,
    state: Mutex<TokenState>,
}

impl RefreshTokenCredentials {
    pub fn new(config: &SpotifyConfig, clock: Arc<dyn Clock>) -> Result<Self, AppError> {
        let http = reqwest::Client::builder()
            .timeout(config.request_timeout)
            .build()
            .map_err(|e| AppError::CredentialError(format!("failed to build HTTP client: {}", e)))?;
        Ok(Self {
            http,
            token_url: format!("{}/api/token", config.accounts_base_url),
            client_id: config.client_id.clone(),
            client_secret: config.client_secret.clone(),
            clock,
            state: Mutex::new(TokenState {
                refresh_token: config.refresh_token.clone(),
                current: None,
            }),
        })
    }

    /// 立即换取一次访问令牌，返回其过期时间
    pub async fn authorize(&self) -> Result<DateTime<Utc>, AppError> {
        let mut state = self.state.lock().await;
        let token = self.refresh(&mut state).await?;
        Ok(token.expires_at)
    }

    async fn refresh(&self, state: &mut TokenState) -> Result<AccessToken, AppError> {
        if state.refresh_token.is_empty() {
            return Err(AppError::CredentialError(
                "spotify.refresh_token is not configured".to_string(),
            ));
        }

        debug!("Requesting access token from {}", self.token_url);
        let params = [
            ("grant_type", "refresh_token"),
            ("refresh_token", state.refresh_token.as_str()),
        ];
        let response = self
            .http
            .post(&self.token_url)
            .basic_auth(&self.client_id, Some(&self.client_secret))
            .form(&params)
            .send()
            .await
            .map_err(|e| AppError::CredentialError(format!("token request failed: {}", e)))?;

        if !response.status().is_success() {
            let status = response.status();
            let error_text = response.text().await.unwrap_or_default();
            return Err(AppError::CredentialError(format!(
                "token request rejected: {} - {}",
                status, error_text
            )));
        }

        let data = response.json::<TokenResponse>().await.map_err(|e| {
            AppError::CredentialError(format!("failed to parse token response: {}", e))
        })?;

        let token = AccessToken {
            value: data.access_token,
            expires_at: self.clock.now() + Duration::seconds(data.expires_in),
        };
        if let Some(rotated) = data.refresh_token {
            state.refresh_token = rotated;
        }
        state.current = Some(token.clone());
        info!(
            "Access token refreshed, valid until {}",
            token.expires_at.to_rfc3339()
        );
        Ok(token)
    }
}

#[async_trait]
impl CredentialProvider for RefreshTokenCredentials {
    async fn is_authorized(&self) -> bool {
        let state = self.state.lock().await;
        state
            .current
            .as_ref()
            .map(|t| t.expires_at > self.clock.now())
            .unwrap_or(false)
    }

    async fn valid_until(&self) -> Option<DateTime<Utc>> {
        let state = self.state.lock().await;
        state.current.as_ref().map(|t| t.expires_at)
    }

    async fn access_token(&self) -> Result<String, AppError> {
        let mut state = self.state.lock().await;
        if let Some(token) = &state.current {
            if !needs_refresh(token.expires_at, self.clock.now()) {
                return Ok(token.value.clone());
            }
        }
        let token = self.refresh(&mut state).await?;
        Ok(token.value)
    }
}
