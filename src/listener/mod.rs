//! 遥测监听
//!
//! 每条链路一个 UDP 端口、一个线程：收包 -> 解码 -> 写入该链路的状态机。

mod error;
mod listener;
mod stats;

pub use error::{ListenerError, ProcessError};
pub use listener::{apply_update, process_datagram, Applied, ListenerHandle, TelemetryListener};
pub use stats::ListenerStats;
