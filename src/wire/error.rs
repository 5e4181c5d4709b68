//! 解码错误

use thiserror::Error;

/// 事件捕获包解码错误
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum DecodeError {
    /// 缓冲区比头部 + N 条记录声明的长度更短
    #[error("truncated event capture packet: need {needed} bytes, got {got}")]
    Truncated { needed: usize, got: usize },
}
