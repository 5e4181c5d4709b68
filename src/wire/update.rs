//! 解码结果
//!
//! 一个事件捕获包解码后的结构化内容。

use serde::{Deserialize, Serialize};

use super::event::TrafficEvent;
use super::tick::Ticks;
use super::NUM_QUEUES;

/// 单个硬件队列的占用采样
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct QueueOccupancySample {
    pub queue: u8,
    pub bytes: u64,
}

/// 一个事件捕获包的解码结果（生成后不可变）
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DecodedUpdate {
    /// 包序号，仅用于诊断
    pub seq: u32,
    /// 包头中的基准时间戳
    pub base_ts: Ticks,
    /// 每个队列一个采样，按队列号排列
    pub queues: [QueueOccupancySample; NUM_QUEUES],
    /// 保留下来的事件（含 TimestampMarker），按包内顺序
    pub events: Vec<TrafficEvent>,
    /// 过滤前解码的记录数（等于包头中的 N）
    pub records: usize,
    /// 因不属于数据队列而被丢弃的流量事件数
    pub filtered: usize,
    /// 类型码未知、被跳过的记录数
    pub unknown: usize,
    /// 包内最晚的流量事件时间戳（不早于 `base_ts`），用于刷新瞬时速率
    pub end_ts: Ticks,
}

impl DecodedUpdate {
    /// 不含 TimestampMarker 的流量事件
    pub fn traffic(&self) -> impl Iterator<Item = &TrafficEvent> + '_ {
        self.events.iter().filter(|ev| !ev.is_marker())
    }
}
