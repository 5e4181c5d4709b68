//! 队列占用历史
//!
//! 固定容量的环形缓冲：满了之后淘汰最旧的点（不是错误）。

use std::collections::VecDeque;

use serde::{Deserialize, Serialize};

use crate::wire::Ticks;

/// 一个占用采样点
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct OccupancyPoint {
    pub at: Ticks,
    pub bytes: u64,
}

#[derive(Debug, Clone)]
pub struct OccupancyHistory {
    max_points: usize,
    evicted: u64,
    q: VecDeque<OccupancyPoint>,
}

impl OccupancyHistory {
    pub fn new(max_points: usize) -> Self {
        Self {
            max_points,
            evicted: 0,
            q: VecDeque::with_capacity(max_points.min(4096)),
        }
    }

    /// 追加一个点；超过容量时淘汰最旧的点
    pub fn push(&mut self, at: Ticks, bytes: u64) {
        if self.max_points == 0 {
            self.evicted = self.evicted.saturating_add(1);
            return;
        }
        while self.q.len() >= self.max_points {
            self.q.pop_front();
            self.evicted = self.evicted.saturating_add(1);
        }
        self.q.push_back(OccupancyPoint { at, bytes });
    }

    pub fn latest(&self) -> Option<OccupancyPoint> {
        self.q.back().copied()
    }

    pub fn iter(&self) -> impl Iterator<Item = &OccupancyPoint> + '_ {
        self.q.iter()
    }

    pub fn to_vec(&self) -> Vec<OccupancyPoint> {
        self.q.iter().copied().collect()
    }

    pub fn len(&self) -> usize {
        self.q.len()
    }

    pub fn is_empty(&self) -> bool {
        self.q.is_empty()
    }

    pub fn capacity_points(&self) -> usize {
        self.max_points
    }

    /// 累计被淘汰的点数
    pub fn evicted(&self) -> u64 {
        self.evicted
    }
}
