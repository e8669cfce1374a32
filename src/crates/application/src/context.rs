use chrono::{DateTime, Utc};
use std::fmt::{self, Display};
use uuid::Uuid;

#[derive(Debug, Clone, Eq, Hash, PartialEq)]
pub struct CorrelationId(Uuid);

impl CorrelationId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for CorrelationId {
    fn default() -> Self {
        Self::new()
    }
}

impl Display for CorrelationId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// 一次轮询周期的上下文，correlation_id 贯穿该周期的所有日志
#[derive(Debug, Clone)]
pub struct CycleContext {
    pub correlation_id: CorrelationId,
    pub started_at: DateTime<Utc>,
}

impl CycleContext {
    pub fn new(started_at: DateTime<Utc>) -> Self {
        Self {
            correlation_id: CorrelationId::new(),
            started_at,
        }
    }
}
