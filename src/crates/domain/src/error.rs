use thiserror::Error;

// 存储层错误：单行写入失败时作为该行的结果，不中断整个批次
#[derive(Debug, Clone, PartialEq, Error)]
pub enum StoreError {
    #[error("数据库错误: {0}")]
    DbErr(String),
    #[error("数据库操作超时: {0}ms")]
    Timeout(u64),
}
