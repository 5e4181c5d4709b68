use bufsizing_rs::config::{MonitorConfig, DEFAULT_EVCAP_PORT};
use bufsizing_rs::link::{read_link, LinkLookup, LinkRegistry};
use bufsizing_rs::listener::{ListenerHandle, TelemetryListener};
use bufsizing_rs::wire::DEFAULT_DATA_QUEUE;
use clap::Parser;
use std::fs;
use std::io::Write;
use std::net::IpAddr;
use std::path::PathBuf;
use std::process::ExitCode;
use std::thread;
use std::time::{Duration, Instant};
use tracing::{info, warn};

const POLL_INTERVAL: Duration = Duration::from_millis(20);

#[derive(Debug, Parser)]
#[command(
    name = "monitor",
    about = "Receive router event-capture datagrams and track per-link queue statistics"
)]
struct Args {
    /// Path to monitor config JSON (overrides --port/--bind/--data-queue)
    #[arg(long)]
    config: Option<PathBuf>,

    /// UDP port for a single monitored link (0 = any free port)
    #[arg(long, default_value_t = DEFAULT_EVCAP_PORT)]
    port: u16,

    /// Bind address for the single-link mode
    #[arg(long, default_value = "0.0.0.0")]
    bind: IpAddr,

    /// Link name for the single-link mode
    #[arg(long, default_value = "link0")]
    name: String,

    /// Queue whose arrivals/departures/drops are tracked (0..8)
    #[arg(long, default_value_t = DEFAULT_DATA_QUEUE)]
    data_queue: u8,

    /// Interval between statistics reports (ms); 0 disables reports
    #[arg(long, default_value_t = 1000)]
    report_ms: u64,

    /// Stop each listener after this many datagrams
    #[arg(long)]
    max_datagrams: Option<u64>,

    /// Write final link snapshots to this JSON file
    #[arg(long)]
    snapshot_json: Option<PathBuf>,
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

    let cfg = match &args.config {
        Some(path) => match MonitorConfig::load(path) {
            Ok(cfg) => cfg,
            Err(e) => {
                eprintln!("{e}");
                return ExitCode::FAILURE;
            }
        },
        None => {
            let cfg = MonitorConfig::single_link(&args.name, args.bind, args.port, args.data_queue);
            if let Err(e) = cfg.validate() {
                eprintln!("{e}");
                return ExitCode::FAILURE;
            }
            cfg
        }
    };

    let registry = cfg.build_registry();
    let mut handles = Vec::with_capacity(cfg.links.len());
    for (idx, link_cfg) in cfg.links.iter().enumerate() {
        let Some(link) = registry.link(idx) else {
            continue;
        };
        let listener = match TelemetryListener::bind(link_cfg.addr(), link_cfg.decoder(), link) {
            Ok(l) => l,
            Err(e) => {
                eprintln!("{e}");
                return ExitCode::FAILURE;
            }
        };
        let handle = match listener.spawn(args.max_datagrams) {
            Ok(h) => h,
            Err(e) => {
                eprintln!("failed to start listener {}: {e}", link_cfg.name);
                return ExitCode::FAILURE;
            }
        };
        println!("listening link={} addr={}", handle.name(), handle.addr());
        handles.push(handle);
    }
    // 测试通过读取首行拿到实际端口
    let _ = std::io::stdout().flush();

    wait_and_report(&registry, &handles, args.report_ms);

    let mut ok = true;
    for handle in handles {
        let name = handle.name().to_string();
        match handle.join() {
            Ok(stats) => println!(
                "done link={name} received={} applied={} malformed={} stale={}",
                stats.received, stats.applied, stats.malformed, stats.stale
            ),
            Err(e) => {
                eprintln!("listener {name} failed: {e}");
                ok = false;
            }
        }
    }

    if let Some(path) = &args.snapshot_json {
        let json = match serde_json::to_string_pretty(&registry.snapshots()) {
            Ok(j) => j,
            Err(e) => {
                eprintln!("failed to serialize snapshots: {e}");
                return ExitCode::FAILURE;
            }
        };
        if let Err(e) = fs::write(path, json) {
            eprintln!("failed to write {}: {e}", path.display());
            return ExitCode::FAILURE;
        }
        eprintln!("wrote link snapshots to {}", path.display());
    }

    if ok { ExitCode::SUCCESS } else { ExitCode::FAILURE }
}

/// 等待所有监听线程结束，期间按 `report_ms` 周期打印各链路的瞬时值
fn wait_and_report(registry: &LinkRegistry, handles: &[ListenerHandle], report_ms: u64) {
    let report_every = (report_ms > 0).then(|| Duration::from_millis(report_ms));
    let mut last_report = Instant::now();
    while !handles.iter().all(ListenerHandle::is_finished) {
        thread::sleep(POLL_INTERVAL);
        let Some(every) = report_every else {
            continue;
        };
        if last_report.elapsed() < every {
            continue;
        }
        last_report = Instant::now();
        for idx in 0..registry.len() {
            let Some(link) = registry.link(idx) else {
                continue;
            };
            let state = read_link(&link);
            let v = state.instant();
            if state.last_refresh().is_none() {
                warn!(link = %state.name(), "尚未收到遥测数据");
                continue;
            }
            info!(
                link = %state.name(),
                throughput_bps = v.throughput_bps,
                smoothed_bps = v.smoothed_throughput_bps,
                arrival_bps = v.arrival_bps,
                drop_bps = v.drop_bps,
                utilization = v.utilization,
                queue_bytes = state.data_queue_occupancy(),
                "📊 链路统计"
            );
        }
    }
}
