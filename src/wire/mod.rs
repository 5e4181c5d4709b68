//! 事件捕获线格式
//!
//! 设备通过 UDP 推送的事件捕获包：8 个队列的占用采样 + 逐包流量事件。

mod decoder;
mod encoder;
mod error;
mod event;
mod tick;
mod update;

pub use decoder::{decode, Decoder};
pub use encoder::{EvcapBuilder, MAX_DELAY_TICKS, MAX_LEN_BYTES, MAX_RECORDS};
pub use error::DecodeError;
pub use event::{EventKind, TrafficEvent};
pub use tick::{Ticks, NANOS_PER_TICK, TICKS_PER_SEC};
pub use update::{DecodedUpdate, QueueOccupancySample};

/// 硬件队列数
pub const NUM_QUEUES: usize = 8;
/// 每个队列块的字节数
pub const QUEUE_BLOCK_BYTES: usize = 8;
/// 固定头部长度：保留 + N + 序号 + 队列块 + 基准时间戳
pub const FIXED_HEADER_LEN: usize = 2 + 4 + NUM_QUEUES * QUEUE_BLOCK_BYTES + 8;
/// 每条事件记录的字节数
pub const EVENT_RECORD_BYTES: usize = 8;
/// 队列占用字段的单位（字节/包）
pub const OCCUPANCY_UNIT_BYTES: u64 = 8;
/// 最大 UDP 负载
pub const MAX_DATAGRAM_LEN: usize = 1500;
/// 默认监控的数据队列
pub const DEFAULT_DATA_QUEUE: u8 = 2;
