//! 限速寄存器换算
//!
//! 设备以 1Gbps 为基准，用指数 e 表示 1Gbps / 2^(e-2)。
//! kbps 按 1000 而不是 1024 换算。

use super::error::ProtocolError;

/// 基准速率（bps）
pub const BASE_RATE_BPS: u64 = 1_000_000_000;
/// 基准速率（kbps）
pub const BASE_RATE_KBPS: u64 = BASE_RATE_BPS / 1000;
/// 指数下限（对应基准速率）
pub const RATE_EXPONENT_MIN: u32 = 2;
/// 设备支持的最大指数
pub const RATE_EXPONENT_MAX: u32 = 16;

/// 设备返回的指数 -> kbps
pub fn exponent_to_kbps(exponent: u32) -> Result<u32, ProtocolError> {
    if exponent < RATE_EXPONENT_MIN {
        return Err(ProtocolError::RateExponentBelowFloor(exponent));
    }
    let div = 1u64
        .checked_shl(exponent - RATE_EXPONENT_MIN)
        .filter(|d| *d <= BASE_RATE_BPS)
        .ok_or(ProtocolError::RateExponentOverflow(exponent))?;
    // 结果不超过 BASE_RATE_KBPS，放得进 u32
    Ok((BASE_RATE_BPS / (1000 * div)) as u32)
}

/// 目标速率（kbps）-> 最接近的指数
///
/// 在两档之间取中点切换：请求值乘 1.5 后不断翻倍直到达到基准速率，最多到
/// [`RATE_EXPONENT_MAX`]。
pub fn kbps_to_exponent(kbps: u32) -> u32 {
    let mut scaled = u64::from(kbps) * 3 / 2;
    let mut exponent = RATE_EXPONENT_MIN;
    while scaled < BASE_RATE_KBPS && exponent < RATE_EXPONENT_MAX {
        scaled *= 2;
        exponent += 1;
    }
    exponent
}

/// 设备实际能提供的、最接近 `kbps` 的速率
pub fn attainable_kbps(kbps: u32) -> u32 {
    // kbps_to_exponent 的结果总在 [MIN, MAX] 内
    exponent_to_kbps(kbps_to_exponent(kbps)).unwrap_or(0)
}
