use serde::{Deserialize, Serialize};

use super::history::OccupancyPoint;
use super::state::{Counters, InstantValues};
use crate::wire::{Ticks, NUM_QUEUES};

/// 链路状态的只读快照（JSON 输出给展示层）
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LinkSnapshot {
    pub name: String,
    pub data_queue: u8,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub rate_limit_kbps: Option<u64>,
    pub watermark: Option<Ticks>,
    /// 每个队列的最新占用（bytes）
    pub occupancy_bytes: [u64; NUM_QUEUES],
    pub data_queue_history: Vec<OccupancyPoint>,
    pub counters: Counters,
    pub instant: InstantValues,
}
