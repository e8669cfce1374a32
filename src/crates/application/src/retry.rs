use crate::error::AppError;
use crate::shared::Sleeper;
use log::{info, warn};
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;

/// 固定间隔重试策略，max_retries 不包含首次尝试
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_retries: u32,
    pub delay: Duration,
}

impl RetryPolicy {
    pub fn new(max_retries: u32, delay: Duration) -> Self {
        Self { max_retries, delay }
    }

    pub fn max_attempts(&self) -> u32 {
        self.max_retries + 1
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RetryState {
    /// 第 n 次重试（从 0 计）即将执行
    Attempting(u32),
    FailedTerminal,
}

impl RetryState {
    /// 首次尝试失败后进入的状态
    pub fn initial(policy: &RetryPolicy) -> Self {
        if policy.max_retries == 0 {
            RetryState::FailedTerminal
        } else {
            RetryState::Attempting(0)
        }
    }

    pub fn on_failure(self, policy: &RetryPolicy) -> Self {
        match self {
            RetryState::Attempting(n) if n + 1 < policy.max_retries => RetryState::Attempting(n + 1),
            _ => RetryState::FailedTerminal,
        }
    }
}

#[derive(Error, Debug)]
#[error("{operation} failed after {attempts} attempts: {source}")]
pub struct RetryError {
    pub operation: String,
    pub attempts: u32,
    #[source]
    pub source: AppError,
}

#[derive(Clone)]
pub struct RetryController {
    policy: RetryPolicy,
    sleeper: Arc<dyn Sleeper>,
}

impl RetryController {
    pub fn new(policy: RetryPolicy, sleeper: Arc<dyn Sleeper>) -> Self {
        Self { policy, sleeper }
    }

    pub fn policy(&self) -> &RetryPolicy {
        &self.policy
    }

    pub async fn run<T, F, Fut>(&self, operation: &str, mut attempt: F) -> Result<T, RetryError>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, AppError>>,
    {
        let mut attempts = 1;
        let mut last_error = match attempt().await {
            Ok(value) => return Ok(value),
            Err(e) => e,
        };

        let mut state = RetryState::initial(&self.policy);
        while let RetryState::Attempting(_) = state {
            warn!(
                "{} failed (attempt {}/{}): {}; retrying in {:?}",
                operation,
                attempts,
                self.policy.max_attempts(),
                last_error,
                self.policy.delay
            );
            self.sleeper.sleep(self.policy.delay).await;
            attempts += 1;

            match attempt().await {
                Ok(value) => {
                    info!("{} succeeded on attempt {}", operation, attempts);
                    return Ok(value);
                }
                Err(e) => {
                    last_error = e;
                    state = state.on_failure(&self.policy);
                }
            }
        }

        Err(RetryError {
            operation: operation.to_string(),
            attempts,
            source: last_error,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::Mutex;

    #[derive(Default)]
    struct RecordingSleeper {
        slept: Mutex<Vec<Duration>>,
    }

    #[async_trait::async_trait]
    impl Sleeper for RecordingSleeper {
        async fn sleep(&self, duration: Duration) {
            self.slept.lock().unwrap().push(duration);
        }
    }

    fn controller(max_retries: u32) -> (RetryController, Arc<RecordingSleeper>) {
        let sleeper = Arc::new(RecordingSleeper::default());
        let controller = RetryController::new(
            RetryPolicy::new(max_retries, Duration::from_secs(10)),
            sleeper.clone(),
        );
        (controller, sleeper)
    }

    #[test]
    fn test_state_machine_transitions() {
        let policy = RetryPolicy::new(2, Duration::from_secs(1));
        let state = RetryState::initial(&policy);
        assert_eq!(state, RetryState::Attempting(0));
        let state = state.on_failure(&policy);
        assert_eq!(state, RetryState::Attempting(1));
        assert_eq!(state.on_failure(&policy), RetryState::FailedTerminal);

        let none = RetryPolicy::new(0, Duration::from_secs(1));
        assert_eq!(RetryState::initial(&none), RetryState::FailedTerminal);
    }

    #[tokio::test]
    async fn test_permanent_failure_terminates_with_attempt_count() {
        let (controller, sleeper) = controller(3);
        let calls = AtomicU32::new(0);

        let result: Result<(), RetryError> = controller
            .run("fetch recent events", || {
                calls.fetch_add(1, Ordering::SeqCst);
                async { Err(AppError::SourceError("503 Service Unavailable".to_string())) }
            })
            .await;

        let err = result.unwrap_err();
        assert_eq!(err.attempts, 4);
        assert_eq!(err.operation, "fetch recent events");
        assert!(matches!(err.source, AppError::SourceError(_)));
        assert!(err.to_string().contains("after 4 attempts"));
        assert_eq!(calls.load(Ordering::SeqCst), 4);
        assert_eq!(
            *sleeper.slept.lock().unwrap(),
            vec![Duration::from_secs(10); 3]
        );
    }

    #[tokio::test]
    async fn test_recovers_after_transient_failure() {
        let (controller, sleeper) = controller(3);
        let calls = AtomicU32::new(0);

        let result = controller
            .run("poll cycle", || {
                let n = calls.fetch_add(1, Ordering::SeqCst);
                async move {
                    if n < 2 {
                        Err(AppError::SourceError("timeout".to_string()))
                    } else {
                        Ok(n)
                    }
                }
            })
            .await;

        assert_eq!(result.unwrap(), 2);
        assert_eq!(sleeper.slept.lock().unwrap().len(), 2);
    }

    #[tokio::test]
    async fn test_first_success_never_sleeps() {
        let (controller, sleeper) = controller(3);

        let result = controller.run("poll cycle", || async { Ok(7) }).await;

        assert_eq!(result.unwrap(), 7);
        assert!(sleeper.slept.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_zero_retries_runs_once() {
        let (controller, sleeper) = controller(0);

        let result: Result<(), RetryError> = controller
            .run("poll cycle", || async {
                Err(AppError::SourceError("rate limited".to_string()))
            })
            .await;

        assert_eq!(result.unwrap_err().attempts, 1);
        assert!(sleeper.slept.lock().unwrap().is_empty());
    }
}
