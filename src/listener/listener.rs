//! UDP 监听循环
//!
//! 监听器持有自己的 socket（随监听器一起释放），以及它唯一写入的那条链路。

use std::io;
use std::net::{SocketAddr, UdpSocket};
use std::thread::{self, JoinHandle};

use tracing::{debug, error, info, instrument, trace, warn};

use super::error::{ListenerError, ProcessError};
use super::stats::ListenerStats;
use crate::link::{read_link, write_link, LinkStatState, SharedLink};
use crate::wire::{DecodedUpdate, Decoder, EventKind, Ticks, MAX_DATAGRAM_LEN};

/// 一次成功写入的摘要
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Applied {
    pub seq: u32,
    pub base_ts: Ticks,
    pub end_ts: Ticks,
    /// 写入的流量事件数（不含时间标记）
    pub events: usize,
    pub filtered: usize,
}

/// 把一个解码结果写入状态机
///
/// 先检查水位线，被拒绝时状态不变；否则依次写入 8 个队列采样、按序写入流量事件，
/// 最后用包内最晚事件时间刷新瞬时值。
pub fn apply_update(
    state: &mut LinkStatState,
    update: &DecodedUpdate,
) -> Result<Applied, ProcessError> {
    if !state.prepare_for_update(update.base_ts) {
        return Err(ProcessError::OrderingRejected {
            ts: update.base_ts,
            watermark: state.watermark(),
        });
    }

    for sample in &update.queues {
        state.set_occupancy(update.base_ts, sample.queue, sample.bytes);
    }

    let mut events = 0;
    for ev in &update.events {
        match ev.kind {
            EventKind::TimestampMarker => continue,
            EventKind::Arrival => state.arrival(ev.at, ev.len_bytes),
            EventKind::Departure => state.departure(ev.at, ev.len_bytes),
            EventKind::Drop => state.dropped(ev.at, ev.len_bytes),
        }
        events += 1;
    }

    state.refresh_instantaneous_values(update.end_ts);

    Ok(Applied {
        seq: update.seq,
        base_ts: update.base_ts,
        end_ts: update.end_ts,
        events,
        filtered: update.filtered,
    })
}

/// 解码一个包并写入状态机；解码失败时状态不变
#[instrument(skip(decoder, state, buf), fields(link = %state.name(), len = buf.len()))]
pub fn process_datagram(
    decoder: &Decoder,
    state: &mut LinkStatState,
    buf: &[u8],
) -> Result<Applied, ProcessError> {
    let update = decoder.decode(buf)?;
    trace!(
        seq = update.seq,
        base_ts = update.base_ts.0,
        records = update.records,
        filtered = update.filtered,
        "解码完成"
    );
    apply_update(state, &update)
}

/// 单条链路的遥测监听器
#[derive(Debug)]
pub struct TelemetryListener {
    name: String,
    socket: UdpSocket,
    decoder: Decoder,
    link: SharedLink,
    stats: ListenerStats,
}

impl TelemetryListener {
    /// 绑定 UDP 端口；失败对该监听器是致命的
    pub fn bind(addr: SocketAddr, decoder: Decoder, link: SharedLink) -> Result<Self, ListenerError> {
        let socket = UdpSocket::bind(addr).map_err(|source| ListenerError::Bind { addr, source })?;
        let name = read_link(&link).name().to_string();
        info!(link = %name, addr = %addr, data_queue = decoder.data_queue(), "📡 绑定遥测端口");
        Ok(Self {
            name,
            socket,
            decoder,
            link,
            stats: ListenerStats::default(),
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn local_addr(&self) -> io::Result<SocketAddr> {
        self.socket.local_addr()
    }

    pub fn link(&self) -> &SharedLink {
        &self.link
    }

    /// 一直收包，直到接收出错
    pub fn run(self) -> Result<ListenerStats, ListenerError> {
        self.run_limited(None)
    }

    /// 收包循环；`max_datagrams` 为 Some 时收满后返回统计
    pub fn run_limited(mut self, max_datagrams: Option<u64>) -> Result<ListenerStats, ListenerError> {
        let mut buf = [0u8; MAX_DATAGRAM_LEN];
        info!(link = %self.name, max_datagrams = ?max_datagrams, "▶️  开始接收事件捕获包");

        while max_datagrams.is_none_or(|max| self.stats.received < max) {
            let (len, from) = match self.socket.recv_from(&mut buf) {
                Ok(r) => r,
                Err(e) => {
                    error!(link = %self.name, error = %e, "UDP 接收失败，监听退出");
                    return Err(ListenerError::Io(e));
                }
            };
            trace!(link = %self.name, len, from = %from, "收到数据包");
            self.handle(&buf[..len]);
        }

        info!(
            link = %self.name,
            received = self.stats.received,
            applied = self.stats.applied,
            malformed = self.stats.malformed,
            stale = self.stats.stale,
            "✅ 监听结束"
        );
        Ok(self.stats)
    }

    fn handle(&mut self, datagram: &[u8]) {
        self.stats.received += 1;
        // 解码不碰状态，写锁只覆盖写入阶段
        let result = self
            .decoder
            .decode(datagram)
            .map_err(ProcessError::from)
            .and_then(|update| apply_update(&mut write_link(&self.link), &update));
        match result {
            Ok(applied) => {
                self.stats.applied += 1;
                debug!(
                    link = %self.name,
                    seq = applied.seq,
                    events = applied.events,
                    end_ts = applied.end_ts.0,
                    "更新已写入"
                );
            }
            Err(ProcessError::Decode(e)) => {
                self.stats.malformed += 1;
                warn!(link = %self.name, error = %e, "丢弃无法解码的包");
            }
            Err(ProcessError::OrderingRejected { ts, watermark }) => {
                self.stats.stale += 1;
                debug!(link = %self.name, ts = ts.0, watermark = ?watermark, "丢弃过期更新");
            }
        }
    }

    /// 在独立线程上运行收包循环
    pub fn spawn(self, max_datagrams: Option<u64>) -> io::Result<ListenerHandle> {
        let name = self.name.clone();
        let addr = self.local_addr()?;
        let handle = thread::Builder::new()
            .name(format!("evcap-{name}"))
            .spawn(move || self.run_limited(max_datagrams))?;
        Ok(ListenerHandle { name, addr, handle })
    }
}

/// 运行中的监听线程
#[derive(Debug)]
pub struct ListenerHandle {
    name: String,
    addr: SocketAddr,
    handle: JoinHandle<Result<ListenerStats, ListenerError>>,
}

impl ListenerHandle {
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn addr(&self) -> SocketAddr {
        self.addr
    }

    pub fn is_finished(&self) -> bool {
        self.handle.is_finished()
    }

    pub fn join(self) -> Result<ListenerStats, ListenerError> {
        self.handle.join().map_err(|_| ListenerError::Panicked)?
    }
}
