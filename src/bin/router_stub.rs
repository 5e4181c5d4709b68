use bufsizing_rs::control::{RouterRegisters, DEFAULT_CONTROL_PORT};
use bufsizing_rs::wire::{EvcapBuilder, Ticks, DEFAULT_DATA_QUEUE};
use clap::Parser;
use std::io::Write;
use std::net::{SocketAddr, TcpListener, UdpSocket};
use std::process::ExitCode;
use std::thread;
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

/// 每个包中的到达/离开对数
const PAIRS_PER_DATAGRAM: u32 = 4;
const EMIT_PKT_BYTES: u32 = 1000;

#[derive(Debug, Parser)]
#[command(
    name = "router-stub",
    about = "Stand-in router: serves the control protocol and optionally emits event-capture datagrams"
)]
struct Args {
    /// Control listen address (port 0 = any free port)
    #[arg(long, default_value_t = SocketAddr::from(([127, 0, 0, 1], DEFAULT_CONTROL_PORT)))]
    listen: SocketAddr,

    /// Send synthetic event-capture datagrams to this address
    #[arg(long)]
    emit_to: Option<SocketAddr>,

    /// Interval between emitted datagrams (ms)
    #[arg(long, default_value_t = 100)]
    emit_interval_ms: u64,

    /// Stop emitting after this many datagrams (unbounded when unset)
    #[arg(long)]
    emit_count: Option<u64>,

    /// Queue the synthetic traffic is written to
    #[arg(long, default_value_t = DEFAULT_DATA_QUEUE)]
    data_queue: u8,
}

fn main() -> ExitCode {
    // 初始化 tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_file(true)
        .with_line_number(true)
        .with_target(true)
        .with_writer(std::io::stderr)
        .init();

    let args = Args::parse();

    let listener = match TcpListener::bind(args.listen) {
        Ok(l) => l,
        Err(e) => {
            eprintln!("failed to bind {}: {e}", args.listen);
            return ExitCode::FAILURE;
        }
    };
    let local = match listener.local_addr() {
        Ok(a) => a,
        Err(e) => {
            eprintln!("{e}");
            return ExitCode::FAILURE;
        }
    };
    println!("listening addr={local}");
    let _ = std::io::stdout().flush();

    if let Some(target) = args.emit_to {
        let interval = Duration::from_millis(args.emit_interval_ms);
        let (count, dq) = (args.emit_count, args.data_queue);
        let spawned = thread::Builder::new()
            .name("evcap-emit".into())
            .spawn(move || emit(target, interval, count, dq));
        if let Err(e) = spawned {
            eprintln!("failed to start emitter: {e}");
            return ExitCode::FAILURE;
        }
    }

    info!(addr = %local, "🛰️  控制端口就绪");
    let mut regs = RouterRegisters::default();
    match regs.serve_forever(&listener) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("control server failed: {e}");
            ExitCode::FAILURE
        }
    }
}

/// 周期性发送合成的事件捕获包：队列占用在 0..8 包之间往复，
/// 每包带若干到达/离开事件以及一个丢包
fn emit(target: SocketAddr, interval: Duration, count: Option<u64>, data_queue: u8) {
    let bind: SocketAddr = if target.is_ipv4() {
        SocketAddr::from(([0, 0, 0, 0], 0))
    } else {
        SocketAddr::from(([0u16; 8], 0))
    };
    let socket = match UdpSocket::bind(bind) {
        Ok(s) => s,
        Err(e) => {
            warn!(error = %e, "无法创建发送 socket");
            return;
        }
    };
    info!(dest = %target, "开始发送事件捕获包");

    let start = Instant::now();
    let mut seq = 0u32;
    while count.is_none_or(|c| u64::from(seq) < c) {
        let now = Ticks::from_nanos(u64::try_from(start.elapsed().as_nanos()).unwrap_or(u64::MAX));
        let occupancy = seq % 8;
        let mut builder = EvcapBuilder::new(seq, now).queue(usize::from(data_queue), occupancy, 64);
        for i in 0..PAIRS_PER_DATAGRAM {
            // 每对相隔 2µs（250 tick）
            let delay = i * 250;
            builder = builder
                .arrival(data_queue, EMIT_PKT_BYTES, delay)
                .departure(data_queue, EMIT_PKT_BYTES, delay + 1);
        }
        let datagram = builder.dropped(data_queue, EMIT_PKT_BYTES, 10_000).build();
        match socket.send_to(&datagram, target) {
            Ok(n) => debug!(seq, bytes = n, "已发送"),
            Err(e) => warn!(seq, error = %e, "发送失败"),
        }
        seq = seq.wrapping_add(1);
        thread::sleep(interval);
    }
    info!(sent = seq, "发送结束");
}
