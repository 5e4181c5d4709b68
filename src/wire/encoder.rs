//! 事件捕获包构造器
//!
//! 按解码器的格式拼出合法的事件捕获包，供设备模拟器和测试使用。

use super::decoder::{
    DELAY_SHIFT, EVENT_COUNT_OFFSET, EVENT_VALUE_OFFSET, LEN_SHIFT, LEN_UNIT_BYTES, QUEUE_SHIFT,
    QUEUE_BLOCKS_OFFSET, SEQ_OFFSET, TIMESTAMP_OFFSET,
};
use super::event::EventKind;
use super::tick::Ticks;
use super::{EVENT_RECORD_BYTES, FIXED_HEADER_LEN, NUM_QUEUES, QUEUE_BLOCK_BYTES};

/// 子时延字段最大值（19 位）
pub const MAX_DELAY_TICKS: u32 = (1 << 19) - 1;
/// 长度字段最大值（8 位，单位 8 字节）
pub const MAX_LEN_BYTES: u32 = 0xFF * LEN_UNIT_BYTES;
/// 一个包最多容纳的记录数（N 为 8 位）
pub const MAX_RECORDS: usize = u8::MAX as usize;

#[derive(Debug, Clone, Copy)]
enum Record {
    Marker(Ticks),
    Traffic {
        kind: EventKind,
        queue: u8,
        len_bytes: u32,
        delay: u32,
    },
}

/// 事件捕获包构造器
#[derive(Debug, Clone)]
pub struct EvcapBuilder {
    seq: u32,
    base_ts: Ticks,
    queues: [(u32, u32); NUM_QUEUES],
    records: Vec<Record>,
}

impl EvcapBuilder {
    pub fn new(seq: u32, base_ts: Ticks) -> Self {
        Self {
            seq,
            base_ts,
            queues: [(0, 0); NUM_QUEUES],
            records: Vec::new(),
        }
    }

    /// 设置队列块（占用与容量均以包为单位）；越界队列号被忽略
    pub fn queue(mut self, queue: usize, occupancy_pkts: u32, size_pkts: u32) -> Self {
        if let Some(q) = self.queues.get_mut(queue) {
            *q = (occupancy_pkts, size_pkts);
        }
        self
    }

    pub fn marker(mut self, ts: Ticks) -> Self {
        self.records.push(Record::Marker(ts));
        self
    }

    pub fn arrival(self, queue: u8, len_bytes: u32, delay: u32) -> Self {
        self.traffic(EventKind::Arrival, queue, len_bytes, delay)
    }

    pub fn departure(self, queue: u8, len_bytes: u32, delay: u32) -> Self {
        self.traffic(EventKind::Departure, queue, len_bytes, delay)
    }

    pub fn dropped(self, queue: u8, len_bytes: u32, delay: u32) -> Self {
        self.traffic(EventKind::Drop, queue, len_bytes, delay)
    }

    /// 追加一条流量事件；`kind` 为 TimestampMarker 时按基准时间 + `delay` 写入标记
    pub fn traffic(mut self, kind: EventKind, queue: u8, len_bytes: u32, delay: u32) -> Self {
        let rec = match kind {
            EventKind::TimestampMarker => Record::Marker(self.base_ts.offset(u64::from(delay))),
            _ => Record::Traffic {
                kind,
                queue: queue & 0x7,
                len_bytes: len_bytes.min(MAX_LEN_BYTES),
                delay: delay.min(MAX_DELAY_TICKS),
            },
        };
        self.records.push(rec);
        self
    }

    pub fn len_records(&self) -> usize {
        self.records.len()
    }

    /// 生成包字节；超过 [`MAX_RECORDS`] 的记录被截掉
    pub fn build(&self) -> Vec<u8> {
        let records = &self.records[..self.records.len().min(MAX_RECORDS)];
        let mut buf = vec![0u8; FIXED_HEADER_LEN + records.len() * EVENT_RECORD_BYTES];

        buf[EVENT_COUNT_OFFSET] = records.len() as u8;
        buf[SEQ_OFFSET..SEQ_OFFSET + 4].copy_from_slice(&self.seq.to_be_bytes());
        for (i, (occ, size)) in self.queues.iter().enumerate() {
            let at = QUEUE_BLOCKS_OFFSET + i * QUEUE_BLOCK_BYTES;
            buf[at..at + 4].copy_from_slice(&occ.to_be_bytes());
            buf[at + 4..at + 8].copy_from_slice(&size.to_be_bytes());
        }
        buf[TIMESTAMP_OFFSET..TIMESTAMP_OFFSET + 8].copy_from_slice(&self.base_ts.0.to_be_bytes());

        for (i, rec) in records.iter().enumerate() {
            let at = FIXED_HEADER_LEN + i * EVENT_RECORD_BYTES;
            match *rec {
                Record::Marker(ts) => {
                    // 类型码 0 落在时间戳最高字节上
                    let raw = ts.0 & 0x00FF_FFFF_FFFF_FFFF;
                    buf[at..at + 8].copy_from_slice(&raw.to_be_bytes());
                }
                Record::Traffic {
                    kind,
                    queue,
                    len_bytes,
                    delay,
                } => {
                    let val = (delay << DELAY_SHIFT)
                        | ((len_bytes / LEN_UNIT_BYTES) << LEN_SHIFT)
                        | (u32::from(queue) << QUEUE_SHIFT);
                    buf[at] = kind.code();
                    let v = at + EVENT_VALUE_OFFSET;
                    buf[v..v + 4].copy_from_slice(&val.to_be_bytes());
                }
            }
        }
        buf
    }
}
