//! 路由器命令
//!
//! 请求为 5 字节：1 字节「命令码 | 队列号 << 6」+ 4 字节大端取值。

use serde::{Deserialize, Serialize};

use super::error::ControlError;
use super::rate::kbps_to_exponent;

/// 请求长度
pub const REQUEST_LEN: usize = 5;
/// Get* 应答长度
pub const RESPONSE_LEN: usize = 4;
/// 可寻址的最大队列号（队列号占 2 位）
pub const MAX_QUEUE: u8 = 3;
const QUEUE_SHIFT: u32 = 6;
const CODE_MASK: u8 = 0x3F;

/// 命令类型
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CommandKind {
    GetRate,
    SetRate,
    GetBufferSize,
    SetBufferSize,
}

impl CommandKind {
    pub fn from_code(code: u8) -> Option<CommandKind> {
        match code {
            0 => Some(CommandKind::GetRate),
            1 => Some(CommandKind::SetRate),
            2 => Some(CommandKind::GetBufferSize),
            3 => Some(CommandKind::SetBufferSize),
            _ => None,
        }
    }

    pub fn code(self) -> u8 {
        match self {
            CommandKind::GetRate => 0,
            CommandKind::SetRate => 1,
            CommandKind::GetBufferSize => 2,
            CommandKind::SetBufferSize => 3,
        }
    }

    /// Get* 命令需要读回 4 字节应答
    pub fn expects_response(self) -> bool {
        matches!(self, CommandKind::GetRate | CommandKind::GetBufferSize)
    }
}

/// 一条发往设备的命令
///
/// `value` 的单位取决于类型：速率为 kbps，缓冲区为包数；Get* 为 0。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RouterCommand {
    kind: CommandKind,
    queue: u8,
    value: u32,
}

impl RouterCommand {
    pub fn new(kind: CommandKind, queue: u8, value: u32) -> Result<Self, ControlError> {
        if queue > MAX_QUEUE {
            return Err(ControlError::InvalidQueue(queue));
        }
        let value = if kind.expects_response() { 0 } else { value };
        Ok(Self { kind, queue, value })
    }

    pub fn get_rate(queue: u8) -> Result<Self, ControlError> {
        Self::new(CommandKind::GetRate, queue, 0)
    }

    pub fn set_rate(queue: u8, kbps: u32) -> Result<Self, ControlError> {
        Self::new(CommandKind::SetRate, queue, kbps)
    }

    pub fn get_buffer_size(queue: u8) -> Result<Self, ControlError> {
        Self::new(CommandKind::GetBufferSize, queue, 0)
    }

    pub fn set_buffer_size(queue: u8, pkts: u32) -> Result<Self, ControlError> {
        Self::new(CommandKind::SetBufferSize, queue, pkts)
    }

    pub fn kind(&self) -> CommandKind {
        self.kind
    }

    pub fn queue(&self) -> u8 {
        self.queue
    }

    pub fn value(&self) -> u32 {
        self.value
    }

    /// 线上取值：SetRate 的 kbps 换成设备的速率指数，其余原样
    pub fn wire_value(&self) -> u32 {
        match self.kind {
            CommandKind::SetRate => kbps_to_exponent(self.value),
            _ => self.value,
        }
    }

    pub fn encode(&self) -> [u8; REQUEST_LEN] {
        let mut req = [0u8; REQUEST_LEN];
        req[0] = self.kind.code() | (self.queue << QUEUE_SHIFT);
        req[1..].copy_from_slice(&self.wire_value().to_be_bytes());
        req
    }
}

/// 设备侧看到的请求（取值为线上原始值）
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RawRequest {
    /// 命令码；未知码为 None
    pub kind: Option<CommandKind>,
    pub code: u8,
    pub queue: u8,
    pub value: u32,
}

pub fn decode_request(req: &[u8; REQUEST_LEN]) -> RawRequest {
    let code = req[0] & CODE_MASK;
    RawRequest {
        kind: CommandKind::from_code(code),
        code,
        queue: req[0] >> QUEUE_SHIFT,
        value: u32::from_be_bytes([req[1], req[2], req[3], req[4]]),
    }
}
