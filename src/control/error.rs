//! 控制通道错误

use std::io;

use thiserror::Error;

/// 设备应答不符合协议
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum ProtocolError {
    #[error("rate exponent {0} is below the floor of 2")]
    RateExponentBelowFloor(u32),
    #[error("rate exponent {0} is too large to decode")]
    RateExponentOverflow(u32),
}

#[derive(Debug, Error)]
pub enum ControlError {
    /// 收发失败：会话就此关闭，不自动重连
    #[error("control channel I/O failed: {0}")]
    Io(#[from] io::Error),
    /// 会话已因先前的 I/O 错误关闭
    #[error("control channel session is closed")]
    SessionClosed,
    #[error(transparent)]
    Protocol(#[from] ProtocolError),
    #[error("queue {0} is out of range (0..=3)")]
    InvalidQueue(u8),
}
