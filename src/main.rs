use anyhow::Context;
use application::command::{CatalogRepositories, Reconciler, UpsertEngine};
use application::poll::{safe_poll_interval, PollLoop, MIN_PLAY_DURATION, REMOTE_BATCH_CAP};
use application::retry::RetryController;
use application::shared::{Clock, CredentialProvider, ListeningHistorySource, Sleeper};
use infra::config::{AppConfigImpl, LogConfig};
use infra::{
    postgres_repositories, InMemoryCatalog, RefreshTokenCredentials, SpotifyHistorySource,
    SystemClock, TokioSleeper,
};
use log::{error, info, warn};
use log4rs::{
    append::{console::ConsoleAppender, file::FileAppender},
    config::{Appender, Config, Root},
    encode::pattern::PatternEncoder,
};
use std::sync::Arc;
use tokio::sync::watch;

const LOG_PATTERN: &str = "{d(%Y-%m-%d %H:%M:%S%.3f)} [{l}] {m}{n}";

// 日志同时输出到控制台和文件，RUST_LOG 优先于配置
fn init_logging(log_cfg: &LogConfig) -> anyhow::Result<()> {
    let log_level = std::env::var("RUST_LOG").unwrap_or_else(|_| log_cfg.level.clone());

    let file_appender = FileAppender::builder()
        .encoder(Box::new(PatternEncoder::new(LOG_PATTERN)))
        .build(&log_cfg.file)
        .with_context(|| format!("failed to open log file {}", log_cfg.file))?;
    let console_appender = ConsoleAppender::builder()
        .encoder(Box::new(PatternEncoder::new(LOG_PATTERN)))
        .build();

    let config = Config::builder()
        .appender(Appender::builder().build("file", Box::new(file_appender)))
        .appender(Appender::builder().build("stdout", Box::new(console_appender)))
        .build(
            Root::builder()
                .appender("file")
                .appender("stdout")
                .build(log_level.parse().unwrap_or(log::LevelFilter::Info)),
        )?;

    log4rs::init_config(config)?;
    Ok(())
}

async fn build_repositories(cfg: &AppConfigImpl) -> anyhow::Result<CatalogRepositories> {
    if cfg.database.is_dry_run() {
        warn!("database_url is empty; writing to an in-memory store (dry run)");
        return Ok(Arc::new(InMemoryCatalog::new()).repositories());
    }
    let db = infra::database::init_db(&cfg.database)
        .await
        .context("failed to connect to database")?;
    Ok(postgres_repositories(db))
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cfg = AppConfigImpl::load()?;
    init_logging(&cfg.log)?;
    info!("Starting playlog ({} environment)", cfg.environment);
    if cfg.exceeds_safe_interval() {
        warn!(
            "poll interval {:?} exceeds the safe bound of {:?}; plays beyond the {}-item window between polls will be lost",
            cfg.poll.interval,
            safe_poll_interval(REMOTE_BATCH_CAP, MIN_PLAY_DURATION),
            REMOTE_BATCH_CAP
        );
    }

    let clock: Arc<dyn Clock> = Arc::new(SystemClock);
    let sleeper: Arc<dyn Sleeper> = Arc::new(TokioSleeper);

    let credentials = Arc::new(RefreshTokenCredentials::new(&cfg.spotify, clock.clone())?);
    let valid_until = credentials
        .authorize()
        .await
        .context("failed to authorize with Spotify")?;
    info!("Authorized with Spotify until {}", valid_until.to_rfc3339());
    let credentials: Arc<dyn CredentialProvider> = credentials;

    let source: Arc<dyn ListeningHistorySource> =
        Arc::new(SpotifyHistorySource::new(&cfg.spotify, credentials.clone())?);
    let repositories = build_repositories(&cfg).await?;
    let reconciler = Reconciler::new(UpsertEngine::new(
        repositories,
        cfg.database.statement_timeout,
    ));
    let poll_loop = PollLoop::new(
        source,
        credentials,
        reconciler,
        RetryController::new(cfg.retry, sleeper.clone()),
        clock,
        sleeper,
        cfg.poll,
    );

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    tokio::spawn(async move {
        if let Err(e) = tokio::signal::ctrl_c().await {
            // 保持发送端存活，否则轮询循环会把通道关闭当作停机
            error!("Failed to listen for Ctrl-C: {}", e);
            std::future::pending::<()>().await;
        }
        info!("Shutdown requested; finishing the current cycle");
        let _ = shutdown_tx.send(true);
    });

    poll_loop.run(shutdown_rx).await?;
    info!("playlog stopped");
    Ok(())
}
