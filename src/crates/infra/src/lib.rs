pub mod config;
pub use config::{AppConfigImpl, ConfigError, RunEnvironment};

pub mod database;

pub mod repository;
pub use repository::{postgres_repositories, FaultTarget, InMemoryCatalog};

pub mod spotify;
pub use spotify::{RefreshTokenCredentials, SpotifyHistorySource};

pub mod time;
pub use time::{SystemClock, TokioSleeper};
