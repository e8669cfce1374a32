use application::poll::{safe_poll_interval, PollSettings, MIN_PLAY_DURATION, REMOTE_BATCH_CAP};
use application::retry::RetryPolicy;
use config::{Config, Environment, File};
use dotenvy::dotenv;
use serde::Deserialize;
use std::fmt::{self, Display};
use std::path::Path;
use std::str::FromStr;
use std::time::Duration;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("unrecognized APP_ENV value: {0}")]
    UnknownEnvironment(String),
    #[error("failed to load configuration: {0}")]
    Load(#[from] config::ConfigError),
    #[error("invalid configuration: {0}")]
    Invalid(String),
}

/// 运行环境，决定加载哪个 .env.<env> 和 config.<env> 文件
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunEnvironment {
    Development,
    Production,
    Testing,
}

impl RunEnvironment {
    /// 未设置 APP_ENV 时视为 development
    pub fn from_env() -> Result<Self, ConfigError> {
        match std::env::var("APP_ENV") {
            Ok(value) => value.parse(),
            Err(_) => Ok(RunEnvironment::Development),
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            RunEnvironment::Development => "development",
            RunEnvironment::Production => "production",
            RunEnvironment::Testing => "testing",
        }
    }
}

impl FromStr for RunEnvironment {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "development" => Ok(RunEnvironment::Development),
            "production" => Ok(RunEnvironment::Production),
            "testing" => Ok(RunEnvironment::Testing),
            other => Err(ConfigError::UnknownEnvironment(other.to_string())),
        }
    }
}

impl Display for RunEnvironment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Deserialize)]
#[serde(default)]
struct RawConfig {
    /// 为空时使用内存存储演练运行
    database_url: String,
    database: RawDatabaseConfig,
    spotify: RawSpotifyConfig,
    poll: RawPollConfig,
    retry: RawRetryConfig,
    log: RawLogConfig,
}

#[derive(Debug, Deserialize)]
#[serde(default)]
struct RawDatabaseConfig {
    max_connections: u32,
    min_connections: u32,
    connect_timeout_secs: u64,
    /// 单条语句超时，超时计为该行写入失败
    statement_timeout_secs: u64,
}

impl Default for RawDatabaseConfig {
    fn default() -> Self {
        Self {
            max_connections: 10,
            min_connections: 1,
            connect_timeout_secs: 5,
            statement_timeout_secs: 10,
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(default)]
struct RawSpotifyConfig {
    client_id: String,
    client_secret: String,
    refresh_token: String,
    api_base_url: String,
    accounts_base_url: String,
    request_timeout_secs: u64,
}

impl Default for RawSpotifyConfig {
    fn default() -> Self {
        Self {
            client_id: "".to_string(),
            client_secret: "".to_string(),
            refresh_token: "".to_string(),
            api_base_url: "https://api.spotify.com/v1".to_string(),
            accounts_base_url: "https://accounts.spotify.com".to_string(),
            request_timeout_secs: 15,
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(default)]
struct RawPollConfig {
    interval_secs: u64,
    fetch_limit: u32,
}

impl Default for RawPollConfig {
    fn default() -> Self {
        Self {
            interval_secs: 25 * 60,
            fetch_limit: REMOTE_BATCH_CAP,
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(default)]
struct RawRetryConfig {
    max_retries: u32,
    delay_secs: u64,
}

impl Default for RawRetryConfig {
    fn default() -> Self {
        Self {
            max_retries: 3,
            delay_secs: 10,
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(default)]
struct RawLogConfig {
    level: String,
    file: String,
}

impl Default for RawLogConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            file: "playlog.log".to_string(),
        }
    }
}

impl Default for RawConfig {
    fn default() -> Self {
        Self {
            database_url: "".to_string(),
            database: RawDatabaseConfig::default(),
            spotify: RawSpotifyConfig::default(),
            poll: RawPollConfig::default(),
            retry: RawRetryConfig::default(),
            log: RawLogConfig::default(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct DatabaseConfig {
    pub url: String,
    pub max_connections: u32,
    pub min_connections: u32,
    pub connect_timeout: Duration,
    pub statement_timeout: Duration,
}

impl DatabaseConfig {
    pub fn is_dry_run(&self) -> bool {
        self.url.trim().is_empty()
    }
}

#[derive(Debug, Clone)]
pub struct SpotifyConfig {
    pub client_id: String,
    pub client_secret: String,
    pub refresh_token: String,
    pub api_base_url: String,
    pub accounts_base_url: String,
    pub request_timeout: Duration,
}

#[derive(Debug, Clone)]
pub struct LogConfig {
    pub level: String,
    pub file: String,
}

#[derive(Debug, Clone)]
pub struct AppConfigImpl {
    pub environment: RunEnvironment,
    pub database: DatabaseConfig,
    pub spotify: SpotifyConfig,
    pub poll: PollSettings,
    pub retry: RetryPolicy,
    pub log: LogConfig,
}

impl AppConfigImpl {
    fn new(environment: RunEnvironment, data: RawConfig) -> Result<Self, ConfigError> {
        if data.poll.interval_secs == 0 {
            return Err(ConfigError::Invalid(
                "poll.interval_secs must be greater than 0".to_string(),
            ));
        }
        if !(1..=REMOTE_BATCH_CAP).contains(&data.poll.fetch_limit) {
            return Err(ConfigError::Invalid(format!(
                "poll.fetch_limit must be within 1..={}, got {}",
                REMOTE_BATCH_CAP, data.poll.fetch_limit
            )));
        }
        if data.database.min_connections > data.database.max_connections {
            return Err(ConfigError::Invalid(format!(
                "database.min_connections ({}) exceeds database.max_connections ({})",
                data.database.min_connections, data.database.max_connections
            )));
        }

        Ok(AppConfigImpl {
            environment,
            database: DatabaseConfig {
                url: data.database_url,
                max_connections: data.database.max_connections,
                min_connections: data.database.min_connections,
                connect_timeout: Duration::from_secs(data.database.connect_timeout_secs),
                statement_timeout: Duration::from_secs(data.database.statement_timeout_secs),
            },
            spotify: SpotifyConfig {
                client_id: data.spotify.client_id,
                client_secret: data.spotify.client_secret,
                refresh_token: data.spotify.refresh_token,
                api_base_url: data.spotify.api_base_url.trim_end_matches('/').to_string(),
                accounts_base_url: data
                    .spotify
                    .accounts_base_url
                    .trim_end_matches('/')
                    .to_string(),
                request_timeout: Duration::from_secs(data.spotify.request_timeout_secs),
            },
            poll: PollSettings {
                interval: Duration::from_secs(data.poll.interval_secs),
                fetch_limit: Some(data.poll.fetch_limit),
            },
            retry: RetryPolicy::new(
                data.retry.max_retries,
                Duration::from_secs(data.retry.delay_secs),
            ),
            log: LogConfig {
                level: data.log.level,
                file: data.log.file,
            },
        })
    }

    pub fn load() -> Result<AppConfigImpl, ConfigError> {
        let environment = RunEnvironment::from_env()?;
        dotenvy::from_filename(format!(".env.{}", environment)).ok();
        dotenv().ok();

        let config = Config::builder()
            .add_source(File::with_name("config").required(false))
            .add_source(File::with_name(&format!("config.{}", environment)).required(false))
            .add_source(Environment::with_prefix("APP").separator("__"))
            .build()?;

        let raw: RawConfig = config.try_deserialize()?; // serde 自动填充默认值
        AppConfigImpl::new(environment, raw)
    }

    /// 只读取指定文件，不读取环境变量
    pub fn from_file(
        environment: RunEnvironment,
        path: &Path,
    ) -> Result<AppConfigImpl, ConfigError> {
        let config = Config::builder().add_source(File::from(path)).build()?;
        let raw: RawConfig = config.try_deserialize()?;
        AppConfigImpl::new(environment, raw)
    }

    pub fn exceeds_safe_interval(&self) -> bool {
        self.poll.interval > safe_poll_interval(REMOTE_BATCH_CAP, MIN_PLAY_DURATION)
    }
}
