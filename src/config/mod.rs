//! 监控配置
//!
//! JSON 配置文件：被监控的链路（UDP 端口、数据队列、历史容量、限速）与控制端点。

use std::collections::HashSet;
use std::fs;
use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::control::{ControlOpts, DEFAULT_CONTROL_PORT};
use crate::link::{LinkRegistry, LinkStatState};
use crate::wire::{Decoder, DEFAULT_DATA_QUEUE, NUM_QUEUES};

/// 默认事件捕获端口
pub const DEFAULT_EVCAP_PORT: u16 = 27033;
/// 默认每个队列保留的历史点数
pub const DEFAULT_HISTORY_LEN: usize = 1000;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to parse config: {0}")]
    Parse(#[from] serde_json::Error),
    #[error("invalid config: {0}")]
    Invalid(String),
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MonitorConfig {
    pub schema_version: u32,
    pub links: Vec<LinkConfig>,
    #[serde(default)]
    pub control: Option<ControlConfig>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LinkConfig {
    pub name: String,
    #[serde(default = "default_bind")]
    pub bind: IpAddr,
    #[serde(default = "default_port")]
    pub port: u16,
    #[serde(default = "default_data_queue")]
    pub data_queue: u8,
    #[serde(default = "default_history_len")]
    pub history_len: usize,
    #[serde(default)]
    pub rate_limit_kbps: Option<u64>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ControlConfig {
    #[serde(default = "default_control_addr")]
    pub addr: String,
    #[serde(default)]
    pub connect_timeout_ms: Option<u64>,
    #[serde(default)]
    pub io_timeout_ms: Option<u64>,
}

fn default_bind() -> IpAddr {
    IpAddr::V4(Ipv4Addr::UNSPECIFIED)
}

fn default_port() -> u16 {
    DEFAULT_EVCAP_PORT
}

fn default_data_queue() -> u8 {
    DEFAULT_DATA_QUEUE
}

fn default_history_len() -> usize {
    DEFAULT_HISTORY_LEN
}

fn default_control_addr() -> String {
    format!("127.0.0.1:{DEFAULT_CONTROL_PORT}")
}

impl MonitorConfig {
    /// 只有一条链路的配置（命令行快速模式）
    pub fn single_link(name: impl Into<String>, bind: IpAddr, port: u16, data_queue: u8) -> Self {
        Self {
            schema_version: 1,
            links: vec![LinkConfig {
                name: name.into(),
                bind,
                port,
                data_queue,
                history_len: DEFAULT_HISTORY_LEN,
                rate_limit_kbps: None,
            }],
            control: None,
        }
    }

    pub fn from_json(raw: &str) -> Result<Self, ConfigError> {
        let cfg: MonitorConfig = serde_json::from_str(raw)?;
        cfg.validate()?;
        Ok(cfg)
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let raw = fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_json(&raw)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.links.is_empty() {
            return Err(ConfigError::Invalid("at least one link is required".into()));
        }
        let mut ports = HashSet::new();
        for link in &self.links {
            if usize::from(link.data_queue) >= NUM_QUEUES {
                return Err(ConfigError::Invalid(format!(
                    "link {}: data_queue {} out of range (0..{NUM_QUEUES})",
                    link.name, link.data_queue
                )));
            }
            if link.history_len == 0 {
                return Err(ConfigError::Invalid(format!(
                    "link {}: history_len must be positive",
                    link.name
                )));
            }
            // 端口 0 由系统分配，可以重复
            if link.port != 0 && !ports.insert(link.port) {
                return Err(ConfigError::Invalid(format!(
                    "link {}: port {} used twice",
                    link.name, link.port
                )));
            }
        }
        Ok(())
    }

    /// 按配置顺序建立链路状态（序号即 `links` 中的下标）
    pub fn build_registry(&self) -> LinkRegistry {
        let mut registry = LinkRegistry::default();
        for link in &self.links {
            registry.add(link.state());
        }
        registry
    }
}

impl LinkConfig {
    pub fn addr(&self) -> SocketAddr {
        SocketAddr::new(self.bind, self.port)
    }

    pub fn decoder(&self) -> Decoder {
        Decoder::new(self.data_queue)
    }

    pub fn state(&self) -> LinkStatState {
        LinkStatState::new(self.name.clone(), self.data_queue, self.history_len)
            .with_rate_limit_kbps(self.rate_limit_kbps)
    }
}

impl ControlConfig {
    pub fn opts(&self) -> ControlOpts {
        ControlOpts {
            connect_timeout: self.connect_timeout_ms.map(Duration::from_millis),
            io_timeout: self.io_timeout_ms.map(Duration::from_millis),
        }
    }
}
