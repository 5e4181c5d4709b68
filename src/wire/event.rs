//! 事件记录类型
//!
//! 定义事件捕获包中每条记录的类型码与解码后的流量事件。

use serde::{Deserialize, Serialize};

use super::tick::Ticks;

/// 事件记录类型（记录首字节）
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventKind {
    /// 重设本包内后续记录的时间基准
    TimestampMarker,
    Arrival,
    Departure,
    Drop,
}

impl EventKind {
    pub fn from_code(code: u8) -> Option<EventKind> {
        match code {
            0 => Some(EventKind::TimestampMarker),
            1 => Some(EventKind::Arrival),
            2 => Some(EventKind::Departure),
            3 => Some(EventKind::Drop),
            _ => None,
        }
    }

    pub fn code(self) -> u8 {
        match self {
            EventKind::TimestampMarker => 0,
            EventKind::Arrival => 1,
            EventKind::Departure => 2,
            EventKind::Drop => 3,
        }
    }
}

/// 解码后的单个事件
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TrafficEvent {
    pub kind: EventKind,
    /// 调整后的时间戳；对 TimestampMarker 而言是新的时间基准
    pub at: Ticks,
    /// 所属队列；TimestampMarker 为 None
    pub queue: Option<u8>,
    pub len_bytes: u32,
}

impl TrafficEvent {
    pub fn marker(base: Ticks) -> Self {
        Self {
            kind: EventKind::TimestampMarker,
            at: base,
            queue: None,
            len_bytes: 0,
        }
    }

    pub fn packet(kind: EventKind, at: Ticks, queue: u8, len_bytes: u32) -> Self {
        Self {
            kind,
            at,
            queue: Some(queue),
            len_bytes,
        }
    }

    pub fn is_marker(&self) -> bool {
        self.kind == EventKind::TimestampMarker
    }
}
