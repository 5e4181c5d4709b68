//! 设备时间类型
//!
//! 设备时间戳以 8ns 为一个 tick。

use serde::{Deserialize, Serialize};

/// 每秒的 tick 数（1s / 8ns）。
pub const TICKS_PER_SEC: u64 = 125_000_000;

/// 每个 tick 的纳秒数。
pub const NANOS_PER_TICK: u64 = 8;

/// 设备时间（单位：8ns tick）。
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Ticks(pub u64);

impl Ticks {
    pub const ZERO: Ticks = Ticks(0);

    pub fn from_nanos(ns: u64) -> Ticks {
        Ticks(ns / NANOS_PER_TICK)
    }
    pub fn from_micros(us: u64) -> Ticks {
        Ticks(us.saturating_mul(1_000) / NANOS_PER_TICK)
    }
    pub fn from_millis(ms: u64) -> Ticks {
        Ticks(ms.saturating_mul(1_000_000) / NANOS_PER_TICK)
    }

    pub fn as_nanos(self) -> u64 {
        self.0.saturating_mul(NANOS_PER_TICK)
    }

    /// 加上一段 tick 偏移（饱和）
    pub fn offset(self, ticks: u64) -> Ticks {
        Ticks(self.0.saturating_add(ticks))
    }

    /// 从 `earlier` 到 `self` 经过的 tick 数；`earlier` 更晚时为 0。
    pub fn since(self, earlier: Ticks) -> u64 {
        self.0.saturating_sub(earlier.0)
    }
}
