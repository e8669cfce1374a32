pub mod api_types;
pub mod auth;
pub mod client;

pub use auth::RefreshTokenCredentials;
pub use client::SpotifyHistorySource;

/// /artists 接口单次最多查询的 ID 数
pub const ARTIST_BATCH_SIZE: usize = 50;
