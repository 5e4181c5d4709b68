//! 链路统计状态机
//!
//! 每条被监控的瓶颈链路一个实例。调用顺序固定为：
//! `prepare_for_update(ts)` -> 若干 `set_occupancy`/`arrival`/`departure`/`dropped`
//! -> `refresh_instantaneous_values(ts)`。
//!
//! 状态机本身不加锁：单写者（监听线程），读者通过 [`super::SharedLink`] 的读锁取快照。

use serde::{Deserialize, Serialize};
use tracing::trace;

use super::history::{OccupancyHistory, OccupancyPoint};
use super::snapshot::LinkSnapshot;
use crate::wire::{Ticks, NUM_QUEUES, TICKS_PER_SEC};

/// 平滑吞吐量的 EWMA 权重（新样本占比）
const SMOOTHING_WEIGHT: f64 = 0.5;

/// 累计计数器
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Counters {
    pub arrived_bytes: u64,
    pub departed_bytes: u64,
    pub dropped_bytes: u64,
    pub arrived_pkts: u64,
    pub departed_pkts: u64,
    pub dropped_pkts: u64,
}

/// 两次刷新之间累积的字节数
#[derive(Debug, Clone, Copy, Default)]
struct Window {
    arrived_bytes: u64,
    departed_bytes: u64,
    dropped_bytes: u64,
}

/// 每次刷新发布的瞬时值
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct InstantValues {
    pub at: Ticks,
    /// 与上一次刷新的间隔；首次刷新或零间隔时为 0
    pub interval_ticks: u64,
    /// 离队吞吐量（bps），零间隔时为 0
    pub throughput_bps: f64,
    pub arrival_bps: f64,
    pub drop_bps: f64,
    pub smoothed_throughput_bps: f64,
    /// 平滑吞吐量 / 限速，截断到 [0, 1]；未配置限速时为 0
    pub utilization: f64,
    pub queue_occupancy_bytes: u64,
}

/// `bytes` 在 `ticks` 内对应的比特率；`ticks == 0` 视为未定义，返回 0
pub fn bits_per_sec(bytes: u64, ticks: u64) -> f64 {
    if ticks == 0 {
        return 0.0;
    }
    (bytes as f64) * 8.0 * (TICKS_PER_SEC as f64) / (ticks as f64)
}

/// 单条瓶颈链路的统计状态
#[derive(Debug, Clone)]
pub struct LinkStatState {
    name: String,
    data_queue: u8,
    rate_limit_kbps: Option<u64>,
    watermark: Option<Ticks>,
    latest: [u64; NUM_QUEUES],
    history: Vec<OccupancyHistory>,
    counters: Counters,
    window: Window,
    last_refresh: Option<Ticks>,
    instant: InstantValues,
}

impl LinkStatState {
    /// 创建状态；`history_len` 是每个队列历史环的容量（点数）
    pub fn new(name: impl Into<String>, data_queue: u8, history_len: usize) -> Self {
        Self {
            name: name.into(),
            data_queue,
            rate_limit_kbps: None,
            watermark: None,
            latest: [0; NUM_QUEUES],
            history: (0..NUM_QUEUES)
                .map(|_| OccupancyHistory::new(history_len))
                .collect(),
            counters: Counters::default(),
            window: Window::default(),
            last_refresh: None,
            instant: InstantValues::default(),
        }
    }

    /// 设置链路限速（用于计算利用率）
    pub fn with_rate_limit_kbps(mut self, kbps: Option<u64>) -> Self {
        self.rate_limit_kbps = kbps;
        self
    }

    /// 检查更新是否比水位线新、且不早于上次刷新点；是则推进水位线并返回 true
    ///
    /// 基准时间落在上一包事件区间内的更新会让速率窗口长度为 0、
    /// 历史时间倒退，因此同样拒绝。
    pub fn prepare_for_update(&mut self, ts: Ticks) -> bool {
        if let Some(wm) = self.watermark {
            if ts <= wm {
                trace!(link = %self.name, ts = ts.0, watermark = wm.0, "过期更新");
                return false;
            }
        }
        if let Some(prev) = self.last_refresh {
            if ts < prev {
                trace!(link = %self.name, ts = ts.0, last_refresh = prev.0, "与上一包重叠");
                return false;
            }
        }
        self.watermark = Some(ts);
        true
    }

    /// 覆盖某队列的最新占用并记入历史；越界队列号被忽略
    pub fn set_occupancy(&mut self, ts: Ticks, queue: u8, bytes: u64) {
        let q = usize::from(queue);
        if q >= NUM_QUEUES {
            return;
        }
        self.latest[q] = bytes;
        self.history[q].push(ts, bytes);
    }

    pub fn arrival(&mut self, ts: Ticks, len_bytes: u32) {
        let len = u64::from(len_bytes);
        self.counters.arrived_bytes = self.counters.arrived_bytes.saturating_add(len);
        self.counters.arrived_pkts = self.counters.arrived_pkts.saturating_add(1);
        self.window.arrived_bytes = self.window.arrived_bytes.saturating_add(len);
        let occ = self.data_queue_occupancy().saturating_add(len);
        self.set_occupancy(ts, self.data_queue, occ);
    }

    pub fn departure(&mut self, ts: Ticks, len_bytes: u32) {
        let len = u64::from(len_bytes);
        self.counters.departed_bytes = self.counters.departed_bytes.saturating_add(len);
        self.counters.departed_pkts = self.counters.departed_pkts.saturating_add(1);
        self.window.departed_bytes = self.window.departed_bytes.saturating_add(len);
        let occ = self.data_queue_occupancy().saturating_sub(len);
        self.set_occupancy(ts, self.data_queue, occ);
    }

    pub fn dropped(&mut self, ts: Ticks, len_bytes: u32) {
        let len = u64::from(len_bytes);
        self.counters.dropped_bytes = self.counters.dropped_bytes.saturating_add(len);
        self.counters.dropped_pkts = self.counters.dropped_pkts.saturating_add(1);
        self.window.dropped_bytes = self.window.dropped_bytes.saturating_add(len);
        let occ = self.data_queue_occupancy().saturating_sub(len);
        self.set_occupancy(ts, self.data_queue, occ);
    }

    /// 计算自上次刷新以来的瞬时速率并清空窗口
    ///
    /// `ts` 应为本包内最晚事件的时间戳。首次调用只建立参考点。
    pub fn refresh_instantaneous_values(&mut self, ts: Ticks) -> InstantValues {
        let window = std::mem::take(&mut self.window);
        let occupancy = self.data_queue_occupancy();

        let Some(prev) = self.last_refresh else {
            self.last_refresh = Some(ts);
            self.instant = InstantValues {
                at: ts,
                queue_occupancy_bytes: occupancy,
                ..InstantValues::default()
            };
            return self.instant;
        };

        let interval = ts.since(prev);
        let throughput = bits_per_sec(window.departed_bytes, interval);
        let smoothed = self.instant.smoothed_throughput_bps * (1.0 - SMOOTHING_WEIGHT)
            + throughput * SMOOTHING_WEIGHT;
        let utilization = match self.rate_limit_kbps {
            Some(kbps) if kbps > 0 => (smoothed / (kbps as f64 * 1000.0)).clamp(0.0, 1.0),
            _ => 0.0,
        };

        self.instant = InstantValues {
            at: ts,
            interval_ticks: interval,
            throughput_bps: throughput,
            arrival_bps: bits_per_sec(window.arrived_bytes, interval),
            drop_bps: bits_per_sec(window.dropped_bytes, interval),
            smoothed_throughput_bps: smoothed,
            utilization,
            queue_occupancy_bytes: occupancy,
        };
        self.last_refresh = Some(prev.max(ts));
        self.instant
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn data_queue(&self) -> u8 {
        self.data_queue
    }

    pub fn rate_limit_kbps(&self) -> Option<u64> {
        self.rate_limit_kbps
    }

    pub fn watermark(&self) -> Option<Ticks> {
        self.watermark
    }

    pub fn latest_occupancy(&self, queue: u8) -> Option<u64> {
        self.latest.get(usize::from(queue)).copied()
    }

    pub fn data_queue_occupancy(&self) -> u64 {
        self.latest
            .get(usize::from(self.data_queue))
            .copied()
            .unwrap_or(0)
    }

    pub fn history(&self, queue: u8) -> Option<&OccupancyHistory> {
        self.history.get(usize::from(queue))
    }

    pub fn counters(&self) -> Counters {
        self.counters
    }

    pub fn instant(&self) -> InstantValues {
        self.instant
    }

    pub fn last_refresh(&self) -> Option<Ticks> {
        self.last_refresh
    }

    /// 拷贝一份只读快照，供展示层使用
    pub fn snapshot(&self) -> LinkSnapshot {
        let data_queue_history: Vec<OccupancyPoint> = self
            .history(self.data_queue)
            .map(OccupancyHistory::to_vec)
            .unwrap_or_default();
        LinkSnapshot {
            name: self.name.clone(),
            data_queue: self.data_queue,
            rate_limit_kbps: self.rate_limit_kbps,
            watermark: self.watermark,
            occupancy_bytes: self.latest,
            data_queue_history,
            counters: self.counters,
            instant: self.instant,
        }
    }
}
