//! 设备控制
//!
//! 通过持久连接向设备查询/设置各队列的限速与缓冲区大小。

mod channel;
mod command;
mod device;
mod error;
mod rate;

pub use channel::{ControlChannel, ControlOpts, DEFAULT_CONTROL_PORT};
pub use command::{
    decode_request, CommandKind, RawRequest, RouterCommand, MAX_QUEUE, REQUEST_LEN, RESPONSE_LEN,
};
pub use device::RouterRegisters;
pub use error::{ControlError, ProtocolError};
pub use rate::{
    attainable_kbps, exponent_to_kbps, kbps_to_exponent, BASE_RATE_BPS, BASE_RATE_KBPS,
    RATE_EXPONENT_MAX, RATE_EXPONENT_MIN,
};
