//! 缓冲区大小规则
//!
//! 根据 RTT、链路速率和并发流数给出瓶颈队列应设的缓冲区大小，
//! 再换算成设备的 SetBufferSize 所需的包数。

use serde::{Deserialize, Serialize};

pub const DEFAULT_PKT_BYTES: u64 = 1500;

pub fn mem_from_pkt(pkts: u64) -> u64 {
    pkts.saturating_mul(DEFAULT_PKT_BYTES)
}

/// 字节数 -> 包数（向上取整）
pub fn pkts_from_mem(bytes: u64) -> u64 {
    bytes.div_ceil(DEFAULT_PKT_BYTES)
}

/// 缓冲区大小规则
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum BufferSizeRule {
    /// 经验法则：RTT × C
    RuleOfThumb,
    /// 流数敏感：RTT × C / √n
    FlowSensitive,
    /// 固定字节数
    Custom { bytes: u64 },
}

/// 计算规则所需的链路参数
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SizingInputs {
    pub rtt_ms: u64,
    pub rate_kbps: u64,
    pub flows: u64,
}

impl BufferSizeRule {
    /// 规则给出的缓冲区大小（bytes）
    pub fn buffer_bytes(&self, inputs: &SizingInputs) -> u64 {
        // ms × kbit/s = bit，再除以 8 得到字节
        let bdp = inputs.rtt_ms.saturating_mul(inputs.rate_kbps) / 8;
        match *self {
            BufferSizeRule::RuleOfThumb => bdp,
            BufferSizeRule::FlowSensitive => {
                let n = inputs.flows.max(1) as f64;
                (bdp as f64 / n.sqrt()) as u64
            }
            BufferSizeRule::Custom { bytes } => bytes,
        }
    }

    /// 规则给出的缓冲区大小（包），至少 1 个包
    pub fn buffer_pkts(&self, inputs: &SizingInputs) -> u64 {
        pkts_from_mem(self.buffer_bytes(inputs)).max(1)
    }
}
