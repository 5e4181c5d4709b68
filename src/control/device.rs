//! 设备侧命令处理（模拟路由器守护进程）
//!
//! 保存每个队列的限速指数与缓冲区大小，按控制协议应答。

use std::io::{self, ErrorKind, Read, Write};
use std::net::TcpListener;

use tracing::{debug, info, warn};

use super::command::{decode_request, CommandKind, MAX_QUEUE, REQUEST_LEN, RESPONSE_LEN};
use super::rate::RATE_EXPONENT_MIN;

const NUM_CONTROL_QUEUES: usize = MAX_QUEUE as usize + 1;

/// 模拟设备的寄存器
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RouterRegisters {
    rate_exponent: [u32; NUM_CONTROL_QUEUES],
    buffer_pkts: [u32; NUM_CONTROL_QUEUES],
}

impl Default for RouterRegisters {
    fn default() -> Self {
        Self {
            rate_exponent: [RATE_EXPONENT_MIN; NUM_CONTROL_QUEUES],
            buffer_pkts: [0; NUM_CONTROL_QUEUES],
        }
    }
}

impl RouterRegisters {
    pub fn rate_exponent(&self, queue: u8) -> Option<u32> {
        self.rate_exponent.get(usize::from(queue)).copied()
    }

    pub fn buffer_pkts(&self, queue: u8) -> Option<u32> {
        self.buffer_pkts.get(usize::from(queue)).copied()
    }

    /// 直接写限速指数（可写入非法值，用于模拟异常设备）
    pub fn set_rate_exponent(&mut self, queue: u8, exponent: u32) {
        if let Some(r) = self.rate_exponent.get_mut(usize::from(queue)) {
            *r = exponent;
        }
    }

    /// 处理一个请求；Get* 返回应答字节，Set* 与未知命令返回 None
    pub fn handle(&mut self, req: [u8; REQUEST_LEN]) -> Option<[u8; RESPONSE_LEN]> {
        let raw = decode_request(&req);
        // 队列号只有 2 位，总在范围内
        let q = usize::from(raw.queue);
        let Some(kind) = raw.kind else {
            warn!(code = raw.code, "收到未知命令码");
            return None;
        };
        debug!(?kind, queue = raw.queue, value = raw.value, "处理命令");
        match kind {
            CommandKind::GetRate => Some(self.rate_exponent[q].to_be_bytes()),
            CommandKind::GetBufferSize => Some(self.buffer_pkts[q].to_be_bytes()),
            CommandKind::SetRate => {
                self.rate_exponent[q] = raw.value;
                None
            }
            CommandKind::SetBufferSize => {
                self.buffer_pkts[q] = raw.value;
                None
            }
        }
    }

    /// 在一条连接上处理请求直到对端关闭
    pub fn serve<S: Read + Write>(&mut self, stream: &mut S) -> io::Result<()> {
        let mut req = [0u8; REQUEST_LEN];
        loop {
            match stream.read_exact(&mut req) {
                Ok(()) => {}
                Err(e) if e.kind() == ErrorKind::UnexpectedEof => return Ok(()),
                Err(e) => return Err(e),
            }
            if let Some(resp) = self.handle(req) {
                stream.write_all(&resp)?;
                stream.flush()?;
            }
        }
    }

    /// 逐个接受连接并服务（同一时刻只服务一个客户端）
    pub fn serve_forever(&mut self, listener: &TcpListener) -> io::Result<()> {
        loop {
            let (mut stream, peer) = match listener.accept() {
                Ok(c) => c,
                Err(e) => {
                    warn!(error = %e, "accept 失败");
                    continue;
                }
            };
            info!(peer = %peer, "客户端已连接");
            if let Err(e) = self.serve(&mut stream) {
                warn!(peer = %peer, error = %e, "连接异常断开");
            }
            info!(peer = %peer, "客户端连接关闭");
        }
    }
}
