//! 监听错误

use std::io;
use std::net::SocketAddr;

use thiserror::Error;

use crate::wire::{DecodeError, Ticks};

/// 单个包处理失败（可恢复：丢包后继续）
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum ProcessError {
    #[error(transparent)]
    Decode(#[from] DecodeError),
    /// 时间戳不晚于水位线：整包丢弃，状态不变
    #[error("stale update at tick {ts:?}, watermark {watermark:?}")]
    OrderingRejected {
        ts: Ticks,
        watermark: Option<Ticks>,
    },
}

/// 监听线程的致命错误
#[derive(Debug, Error)]
pub enum ListenerError {
    #[error("failed to bind UDP {addr}: {source}")]
    Bind {
        addr: SocketAddr,
        #[source]
        source: io::Error,
    },
    #[error("UDP receive failed: {0}")]
    Io(#[from] io::Error),
    #[error("listener thread panicked")]
    Panicked,
}
