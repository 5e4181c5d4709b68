//! 统计信息
//!
//! 监听循环自身的收包统计。

use serde::{Deserialize, Serialize};

/// 监听统计信息
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ListenerStats {
    pub received: u64,
    pub applied: u64,
    pub malformed: u64,
    pub stale: u64,
}
