//! 事件捕获包解码器
//!
//! 纯函数：原始 UDP 负载 -> [`DecodedUpdate`]，不做 I/O，不持有状态。
//!
//! 包格式（大端，偏移相对于包首）：
//!
//! ```text
//! 0      保留
//! 1      事件记录数 N
//! 2..6   序号
//! 6..70  8 个队列块：占用（包数，4B）+ 容量（包数，4B，忽略）
//! 70..78 基准时间戳：高 32 位 + 低 32 位
//! 78..   N 条 8 字节事件记录
//! ```
//!
//! 事件记录：首字节为类型码。TimestampMarker 的 8 字节整体即新的基准时间戳；
//! 流量事件的取值字在记录偏移 +4 处，位域为
//! `[31:13]` 子时延、`[12:5]` 长度（8 字节为单位）、`[4:2]` 队列号。

use tracing::trace;

use super::error::DecodeError;
use super::event::{EventKind, TrafficEvent};
use super::tick::Ticks;
use super::update::{DecodedUpdate, QueueOccupancySample};
use super::{
    EVENT_RECORD_BYTES, FIXED_HEADER_LEN, NUM_QUEUES, OCCUPANCY_UNIT_BYTES, QUEUE_BLOCK_BYTES,
};

pub(crate) const EVENT_COUNT_OFFSET: usize = 1;
pub(crate) const SEQ_OFFSET: usize = 2;
pub(crate) const QUEUE_BLOCKS_OFFSET: usize = 6;
pub(crate) const TIMESTAMP_OFFSET: usize = QUEUE_BLOCKS_OFFSET + NUM_QUEUES * QUEUE_BLOCK_BYTES;
/// 流量事件取值字在记录内的偏移
pub(crate) const EVENT_VALUE_OFFSET: usize = 4;

pub(crate) const QUEUE_SHIFT: u32 = 2;
pub(crate) const QUEUE_MASK: u32 = 0x0000_001C;
pub(crate) const LEN_SHIFT: u32 = 5;
pub(crate) const LEN_MASK: u32 = 0x0000_1FE0;
pub(crate) const DELAY_SHIFT: u32 = 13;
/// 长度字段单位（字节）
pub(crate) const LEN_UNIT_BYTES: u32 = 8;

/// 解码器：只保留 `data_queue` 上的流量事件
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Decoder {
    data_queue: u8,
}

impl Decoder {
    pub fn new(data_queue: u8) -> Self {
        Self { data_queue }
    }

    pub fn data_queue(&self) -> u8 {
        self.data_queue
    }

    /// 解码一个事件捕获包
    pub fn decode(&self, buf: &[u8]) -> Result<DecodedUpdate, DecodeError> {
        decode(buf, self.data_queue)
    }
}

fn read_u32(buf: &[u8], at: usize) -> u32 {
    u32::from_be_bytes([buf[at], buf[at + 1], buf[at + 2], buf[at + 3]])
}

/// 两个大端 32 位字拼成 64 位时间戳：`(high << 32) | low`
fn read_timestamp(buf: &[u8], at: usize) -> Ticks {
    let high = u64::from(read_u32(buf, at));
    let low = u64::from(read_u32(buf, at + 4));
    Ticks((high << 32) | low)
}

/// 解码一个事件捕获包；只保留 `data_queue` 上的流量事件
pub fn decode(buf: &[u8], data_queue: u8) -> Result<DecodedUpdate, DecodeError> {
    if buf.len() < FIXED_HEADER_LEN {
        return Err(DecodeError::Truncated {
            needed: FIXED_HEADER_LEN,
            got: buf.len(),
        });
    }

    let n = usize::from(buf[EVENT_COUNT_OFFSET]);
    let needed = FIXED_HEADER_LEN + n * EVENT_RECORD_BYTES;
    if buf.len() < needed {
        return Err(DecodeError::Truncated {
            needed,
            got: buf.len(),
        });
    }

    let seq = read_u32(buf, SEQ_OFFSET);
    let base_ts = read_timestamp(buf, TIMESTAMP_OFFSET);

    let mut queues = [QueueOccupancySample::default(); NUM_QUEUES];
    for (i, sample) in queues.iter_mut().enumerate() {
        let at = QUEUE_BLOCKS_OFFSET + i * QUEUE_BLOCK_BYTES;
        let pkts = u64::from(read_u32(buf, at));
        // 后 4 字节是队列容量（包数），这里不关心
        *sample = QueueOccupancySample {
            queue: i as u8,
            bytes: pkts * OCCUPANCY_UNIT_BYTES,
        };
    }

    let mut events = Vec::with_capacity(n);
    let mut filtered = 0;
    let mut unknown = 0;
    let mut base = base_ts;
    let mut end_ts = base_ts;

    for i in 0..n {
        let at = FIXED_HEADER_LEN + i * EVENT_RECORD_BYTES;
        let Some(kind) = EventKind::from_code(buf[at]) else {
            trace!(record = i, code = buf[at], "未知事件类型，跳过");
            unknown += 1;
            continue;
        };

        if kind == EventKind::TimestampMarker {
            base = read_timestamp(buf, at);
            events.push(TrafficEvent::marker(base));
            continue;
        }

        let val = read_u32(buf, at + EVENT_VALUE_OFFSET);
        let queue = ((val & QUEUE_MASK) >> QUEUE_SHIFT) as u8;
        if queue != data_queue {
            filtered += 1;
            continue;
        }
        let len_bytes = ((val & LEN_MASK) >> LEN_SHIFT) * LEN_UNIT_BYTES;
        let adjusted = base.offset(u64::from(val >> DELAY_SHIFT));
        end_ts = end_ts.max(adjusted);
        events.push(TrafficEvent::packet(kind, adjusted, queue, len_bytes));
    }

    Ok(DecodedUpdate {
        seq,
        base_ts,
        queues,
        events,
        records: n,
        filtered,
        unknown,
        end_ts,
    })
}
