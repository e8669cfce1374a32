use super::interval::next_delay;
use crate::command::{ReconcileReport, Reconciler};
use crate::context::{CorrelationId, CycleContext};
use crate::error::AppError;
use crate::retry::{RetryController, RetryError};
use crate::shared::{Clock, CredentialProvider, ListeningHistorySource, Sleeper};
use chrono::{DateTime, Utc};
use log::{debug, error, info};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{watch, Mutex};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PollSettings {
    pub interval: Duration,
    /// None 表示请求远端允许的最大条数
    pub fetch_limit: Option<u32>,
}

#[derive(Debug, Clone)]
pub struct CycleReport {
    pub correlation_id: CorrelationId,
    pub watermark: DateTime<Utc>,
    pub fetched: usize,
    pub report: ReconcileReport,
}

/// 轮询主循环：取水位 -> 拉取 -> 对账 -> 等待
///
/// 同一时刻只有一次对账在执行；下一轮在本轮 sleep 结束后才开始。
pub struct PollLoop {
    source: Arc<dyn ListeningHistorySource>,
    credentials: Arc<dyn CredentialProvider>,
    reconciler: Reconciler,
    retry: RetryController,
    clock: Arc<dyn Clock>,
    sleeper: Arc<dyn Sleeper>,
    settings: PollSettings,
    started_at: DateTime<Utc>,
    /// 上一轮未完整写入的最早播放时间；水位不会越过它
    retry_floor: Mutex<Option<DateTime<Utc>>>,
}

impl PollLoop {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        source: Arc<dyn ListeningHistorySource>,
        credentials: Arc<dyn CredentialProvider>,
        reconciler: Reconciler,
        retry: RetryController,
        clock: Arc<dyn Clock>,
        sleeper: Arc<dyn Sleeper>,
        settings: PollSettings,
    ) -> Self {
        let started_at = clock.now();
        Self {
            source,
            credentials,
            reconciler,
            retry,
            clock,
            sleeper,
            settings,
            started_at,
            retry_floor: Mutex::new(None),
        }
    }

    /// 进程启动时间，events 表为空时作为水位
    pub fn started_at(&self) -> DateTime<Utc> {
        self.started_at
    }

    /// 已成功写入的最新播放时间，没有则回退到进程启动时间
    ///
    /// 上一轮有写入未完成时，水位退回到最早那次播放之前，
    /// 使其所在时间范围在下一轮被重新拉取。
    pub async fn watermark(&self) -> Result<DateTime<Utc>, AppError> {
        let latest = self.reconciler.engine().latest_played_at().await?;
        let stored = latest.unwrap_or(self.started_at);
        match *self.retry_floor.lock().await {
            Some(floor) => Ok(stored.min(floor - chrono::Duration::milliseconds(1))),
            None => Ok(stored),
        }
    }

    pub async fn poll_once(&self, context: &CycleContext) -> Result<CycleReport, AppError> {
        let watermark = self.watermark().await?;
        info!(
            "[{}] polling events after {}",
            context.correlation_id,
            watermark.to_rfc3339()
        );

        let mut events = self
            .source
            .fetch_recent_events(watermark, self.settings.fetch_limit)
            .await?;
        let fetched = events.len();
        events.retain(|e| e.played_at > watermark);
        if events.len() < fetched {
            debug!(
                "[{}] dropped {} events not after the watermark",
                context.correlation_id,
                fetched - events.len()
            );
        }
        info!("[{}] fetched {} new events", context.correlation_id, events.len());

        let report = self.reconciler.reconcile(context, &events).await;
        let floor = report.earliest_unsettled_play();
        if let Some(floor) = floor {
            info!(
                "[{}] holding watermark before {} until unsettled writes succeed",
                context.correlation_id,
                floor.to_rfc3339()
            );
        }
        *self.retry_floor.lock().await = floor;
        Ok(CycleReport {
            correlation_id: context.correlation_id.clone(),
            watermark,
            fetched: events.len(),
            report,
        })
    }

    /// 带重试执行一轮；重试耗尽时返回终止错误，由调用方记录后等待下一轮
    pub async fn run_cycle(&self) -> Result<CycleReport, RetryError> {
        let context = CycleContext::new(self.clock.now());
        self.retry
            .run("poll cycle", || self.poll_once(&context))
            .await
            .map_err(|e| {
                error!(
                    "[{}] {}; cycle abandoned until next interval",
                    context.correlation_id, e
                );
                e
            })
    }

    /// 运行直到 shutdown 变为 true 或发送端被丢弃；进行中的周期总会完整结束
    pub async fn run(&self, mut shutdown: watch::Receiver<bool>) -> Result<(), AppError> {
        if !self.credentials.is_authorized().await {
            return Err(AppError::CredentialError(
                "credential provider is not authorized".to_string(),
            ));
        }
        if let Some(until) = self.credentials.valid_until().await {
            debug!("access credential valid until {}", until.to_rfc3339());
        }
        info!(
            "poll loop started: interval {:?}, fetch limit {:?}",
            self.settings.interval, self.settings.fetch_limit
        );

        loop {
            // 发送端已丢弃时无人能再发出停机信号，同样视为停机
            if *shutdown.borrow() || shutdown.has_changed().is_err() {
                break;
            }

            let started = self.clock.now();
            if let Ok(cycle) = self.run_cycle().await {
                debug!(
                    "[{}] cycle finished: watermark {}, {} events, {} writes",
                    cycle.correlation_id,
                    cycle.watermark.to_rfc3339(),
                    cycle.fetched,
                    cycle.report.written()
                );
            }

            let delay = next_delay(started, self.clock.now(), self.settings.interval);
            tokio::select! {
                _ = self.sleeper.sleep(delay) => {}
                changed = shutdown.changed() => {
                    if changed.is_err() {
                        break;
                    }
                }
            }
        }

        info!("poll loop stopped");
        Ok(())
    }
}
