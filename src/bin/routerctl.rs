use bufsizing_rs::config::{ControlConfig, MonitorConfig};
use bufsizing_rs::control::{ControlChannel, ControlError, ControlOpts, DEFAULT_CONTROL_PORT};
use bufsizing_rs::sizing::{BufferSizeRule, SizingInputs};
use clap::{Parser, Subcommand, ValueEnum};
use std::path::PathBuf;
use std::process::ExitCode;
use std::time::Duration;
use tracing::info;

#[derive(Debug, Parser)]
#[command(
    name = "routerctl",
    about = "Query or set per-queue rate limits and buffer sizes on the router"
)]
struct Args {
    /// Monitor config JSON; its `control` section supplies the endpoint and timeouts
    #[arg(long)]
    config: Option<PathBuf>,

    /// Control endpoint (host:port); overrides the config file
    #[arg(long)]
    addr: Option<String>,

    /// Connect timeout (ms); blocks indefinitely when unset here and in the config
    #[arg(long)]
    connect_timeout_ms: Option<u64>,

    /// Read/write timeout (ms); blocks indefinitely when unset here and in the config
    #[arg(long)]
    io_timeout_ms: Option<u64>,

    #[command(subcommand)]
    cmd: Cmd,
}

#[derive(Debug, Subcommand)]
enum Cmd {
    /// Read the rate limit of a queue (kbps)
    GetRate {
        #[arg(long)]
        queue: u8,
    },
    /// Set the rate limit of a queue (kbps, rounded to the nearest device step)
    SetRate {
        #[arg(long)]
        queue: u8,
        #[arg(long)]
        kbps: u32,
    },
    /// Read the buffer size of a queue (packets)
    GetBuf {
        #[arg(long)]
        queue: u8,
    },
    /// Set the buffer size of a queue (packets)
    SetBuf {
        #[arg(long)]
        queue: u8,
        #[arg(long)]
        pkts: u32,
    },
    /// Compute a buffer size from a sizing rule and write it to the queue
    ApplyRule {
        #[arg(long)]
        queue: u8,
        #[arg(long, value_enum)]
        rule: RuleArg,
        /// Round-trip time (ms)
        #[arg(long, default_value_t = 100)]
        rtt_ms: u64,
        /// Link rate (kbps); read from the queue's rate limit when unset
        #[arg(long)]
        rate_kbps: Option<u64>,
        /// Number of concurrent flows (flow-sensitive rule)
        #[arg(long, default_value_t = 1)]
        flows: u64,
        /// Buffer size in bytes (custom rule)
        #[arg(long, default_value_t = 0)]
        bytes: u64,
    },
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum RuleArg {
    RuleOfThumb,
    FlowSensitive,
    Custom,
}

fn main() -> ExitCode {
    // 初始化 tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn")),
        )
        .with_file(true)
        .with_line_number(true)
        .with_target(true)
        .with_writer(std::io::stderr)
        .init();

    let args = Args::parse();
    let (addr, opts) = match endpoint(&args) {
        Ok(e) => e,
        Err(msg) => {
            eprintln!("routerctl: {msg}");
            return ExitCode::FAILURE;
        }
    };

    let result = ControlChannel::connect(addr.as_str(), &opts)
        .and_then(|ch| run(&ch, &args.cmd));
    match result {
        Ok(line) => {
            println!("{line}");
            ExitCode::SUCCESS
        }
        Err(e) => {
            eprintln!("routerctl: {e}");
            ExitCode::FAILURE
        }
    }
}

/// 命令行参数优先，其次是配置文件的 `control` 段，最后是默认端点
fn endpoint(args: &Args) -> Result<(String, ControlOpts), String> {
    let control = match &args.config {
        Some(path) => {
            let cfg = MonitorConfig::load(path).map_err(|e| e.to_string())?;
            let control: ControlConfig = cfg
                .control
                .ok_or_else(|| format!("{} has no control section", path.display()))?;
            Some(control)
        }
        None => None,
    };
    let from_cfg = control.as_ref().map(ControlConfig::opts).unwrap_or_default();

    let addr = args
        .addr
        .clone()
        .or_else(|| control.map(|c| c.addr))
        .unwrap_or_else(|| format!("127.0.0.1:{DEFAULT_CONTROL_PORT}"));
    let opts = ControlOpts {
        connect_timeout: args
            .connect_timeout_ms
            .map(Duration::from_millis)
            .or(from_cfg.connect_timeout),
        io_timeout: args
            .io_timeout_ms
            .map(Duration::from_millis)
            .or(from_cfg.io_timeout),
    };
    Ok((addr, opts))
}

fn run(ch: &ControlChannel, cmd: &Cmd) -> Result<String, ControlError> {
    match *cmd {
        Cmd::GetRate { queue } => {
            let kbps = ch.get_rate(queue)?;
            Ok(format!("queue={queue} rate_kbps={kbps}"))
        }
        Cmd::SetRate { queue, kbps } => {
            ch.set_rate(queue, kbps)?;
            Ok(format!("queue={queue} set rate_kbps={kbps}"))
        }
        Cmd::GetBuf { queue } => {
            let pkts = ch.get_buffer_size(queue)?;
            Ok(format!("queue={queue} buffer_pkts={pkts}"))
        }
        Cmd::SetBuf { queue, pkts } => {
            ch.set_buffer_size(queue, pkts)?;
            Ok(format!("queue={queue} set buffer_pkts={pkts}"))
        }
        Cmd::ApplyRule {
            queue,
            rule,
            rtt_ms,
            rate_kbps,
            flows,
            bytes,
        } => {
            let rate_kbps = match rate_kbps {
                Some(r) => r,
                None => u64::from(ch.get_rate(queue)?),
            };
            let rule = match rule {
                RuleArg::RuleOfThumb => BufferSizeRule::RuleOfThumb,
                RuleArg::FlowSensitive => BufferSizeRule::FlowSensitive,
                RuleArg::Custom => BufferSizeRule::Custom { bytes },
            };
            let inputs = SizingInputs {
                rtt_ms,
                rate_kbps,
                flows,
            };
            let buffer_bytes = rule.buffer_bytes(&inputs);
            let pkts = u32::try_from(rule.buffer_pkts(&inputs)).unwrap_or(u32::MAX);
            info!(?rule, rtt_ms, rate_kbps, flows, buffer_bytes, pkts, "🧮 应用缓冲区规则");
            ch.set_buffer_size(queue, pkts)?;
            Ok(format!(
                "queue={queue} rate_kbps={rate_kbps} buffer_bytes={buffer_bytes} buffer_pkts={pkts}"
            ))
        }
    }
}
