//! 设备控制通道
//!
//! 一条到设备的持久连接；同一时刻只有一条命令在途，其余调用者在互斥锁上等待。
//! 任何收发错误都会关闭会话，重连由上层负责。

use std::io::{Read, Write};
use std::net::{SocketAddr, TcpStream, ToSocketAddrs};
use std::sync::{Mutex, PoisonError};
use std::time::Duration;

use tracing::{debug, error, info, instrument};

use super::command::{CommandKind, RouterCommand, RESPONSE_LEN};
use super::error::ControlError;
use super::rate::exponent_to_kbps;

/// 默认控制端口
pub const DEFAULT_CONTROL_PORT: u16 = 10272;

/// 连接选项
///
/// 默认全部为 None：设备不应答时调用者会一直阻塞。超时是可选的加固项。
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ControlOpts {
    pub connect_timeout: Option<Duration>,
    pub io_timeout: Option<Duration>,
}

#[derive(Debug)]
struct Session<S> {
    stream: S,
    closed: bool,
}

/// 控制通道；`S` 为任意字节流传输（默认 TCP）
#[derive(Debug)]
pub struct ControlChannel<S = TcpStream> {
    peer: String,
    session: Mutex<Session<S>>,
}

impl ControlChannel<TcpStream> {
    /// 建立 TCP 连接
    pub fn connect(addr: impl ToSocketAddrs, opts: &ControlOpts) -> Result<Self, ControlError> {
        let mut last_err = None;
        for sa in addr.to_socket_addrs()? {
            match Self::connect_one(sa, opts) {
                Ok(stream) => {
                    info!(peer = %sa, "🔌 控制通道已连接");
                    return Ok(Self::new(stream, sa.to_string()));
                }
                Err(e) => last_err = Some(e),
            }
        }
        Err(ControlError::Io(last_err.unwrap_or_else(|| {
            std::io::Error::new(std::io::ErrorKind::NotFound, "no address to connect to")
        })))
    }

    fn connect_one(sa: SocketAddr, opts: &ControlOpts) -> std::io::Result<TcpStream> {
        let stream = match opts.connect_timeout {
            Some(t) => TcpStream::connect_timeout(&sa, t)?,
            None => TcpStream::connect(sa)?,
        };
        stream.set_nodelay(true)?;
        stream.set_read_timeout(opts.io_timeout)?;
        stream.set_write_timeout(opts.io_timeout)?;
        Ok(stream)
    }
}

impl<S: Read + Write> ControlChannel<S> {
    pub fn new(stream: S, peer: impl Into<String>) -> Self {
        Self {
            peer: peer.into(),
            session: Mutex::new(Session {
                stream,
                closed: false,
            }),
        }
    }

    pub fn peer(&self) -> &str {
        &self.peer
    }

    pub fn is_closed(&self) -> bool {
        self.session
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .closed
    }

    /// 执行一条命令
    ///
    /// Get* 返回设备读回的值（GetRate 已换算为 kbps）；Set* 不等待设备回显，返回 0。
    #[instrument(skip(self), fields(peer = %self.peer))]
    pub fn execute(&self, cmd: RouterCommand) -> Result<u32, ControlError> {
        let mut session = self.session.lock().unwrap_or_else(PoisonError::into_inner);
        if session.closed {
            return Err(ControlError::SessionClosed);
        }

        let raw = match round_trip(&mut session.stream, &cmd) {
            Ok(raw) => raw,
            Err(e) => {
                error!(error = %e, "控制通道收发失败，关闭会话");
                session.closed = true;
                return Err(ControlError::Io(e));
            }
        };
        drop(session);

        let value = match cmd.kind() {
            CommandKind::GetRate => exponent_to_kbps(raw)?,
            CommandKind::GetBufferSize => raw,
            CommandKind::SetRate | CommandKind::SetBufferSize => 0,
        };
        debug!(raw, value, "命令完成");
        Ok(value)
    }

    pub fn get_rate(&self, queue: u8) -> Result<u32, ControlError> {
        self.execute(RouterCommand::get_rate(queue)?)
    }

    pub fn set_rate(&self, queue: u8, kbps: u32) -> Result<u32, ControlError> {
        self.execute(RouterCommand::set_rate(queue, kbps)?)
    }

    pub fn get_buffer_size(&self, queue: u8) -> Result<u32, ControlError> {
        self.execute(RouterCommand::get_buffer_size(queue)?)
    }

    pub fn set_buffer_size(&self, queue: u8, pkts: u32) -> Result<u32, ControlError> {
        self.execute(RouterCommand::set_buffer_size(queue, pkts)?)
    }

    /// 取回底层传输（用于测试或交给上层重连逻辑）
    pub fn into_inner(self) -> S {
        self.session
            .into_inner()
            .unwrap_or_else(PoisonError::into_inner)
            .stream
    }
}

/// 发送请求；Get* 读回 4 字节原始值，Set* 返回 0
fn round_trip<S: Read + Write>(stream: &mut S, cmd: &RouterCommand) -> std::io::Result<u32> {
    stream.write_all(&cmd.encode())?;
    stream.flush()?;
    if !cmd.kind().expects_response() {
        return Ok(0);
    }
    let mut resp = [0u8; RESPONSE_LEN];
    stream.read_exact(&mut resp)?;
    Ok(u32::from_be_bytes(resp))
}
