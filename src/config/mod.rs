use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::core::error::{ClientError, ClientResult};
use crate::core::types::{parse_host_list, HostAddr};

/// 客户端所在进程的角色
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ClientRole {
    Graph,
    Storage,
    Meta,
    /// 运维工具，不向元数据服务发送心跳
    Tool,
}

impl ClientRole {
    /// 加载配置时对应的模块
    pub fn config_module(&self) -> ConfigModule {
        match self {
            ClientRole::Graph => ConfigModule::Graph,
            ClientRole::Storage => ConfigModule::Storage,
            ClientRole::Meta => ConfigModule::Meta,
            ClientRole::Tool => ConfigModule::All,
        }
    }
}

/// 配置项所属模块
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ConfigModule {
    Graph,
    Storage,
    Meta,
    All,
}

/// 元数据客户端配置
#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct MetaConfig {
    /// 元数据服务地址，逗号分隔
    pub addrs: String,
    /// 本机对外地址
    pub local_host: String,
    pub role: ClientRole,
    /// leader 变更/传输失败的重试上限
    pub retry_count: usize,
    /// 传输失败后的固定重试间隔
    pub retry_interval_secs: u64,
    pub heartbeat_interval_secs: u64,
    /// 心跳随机抖动上限
    pub heartbeat_jitter_ms: u64,
    /// 单次 RPC 超时
    pub rpc_timeout_ms: u64,
    pub cluster_id_path: String,
    /// 跳过配置项加载
    pub skip_config: bool,
    /// 就绪探测次数，-1 表示一直重试
    pub ready_retry: i32,
}

impl Default for MetaConfig {
    fn default() -> Self {
        Self {
            addrs: "127.0.0.1:9559".to_string(),
            local_host: "127.0.0.1:9779".to_string(),
            role: ClientRole::Graph,
            retry_count: 3,
            retry_interval_secs: 1,
            heartbeat_interval_secs: 3,
            heartbeat_jitter_ms: 900,
            rpc_timeout_ms: 60_000,
            cluster_id_path: "cluster.id".to_string(),
            skip_config: false,
            ready_retry: 3,
        }
    }
}

/// 日志配置
#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct LogConfig {
    pub level: String,
    pub dir: String,
    pub file: String,
    pub max_file_size: u64,
    pub max_files: usize,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            dir: "logs".to_string(),
            file: "graphdb-client".to_string(),
            max_file_size: 100 * 1024 * 1024, // 100MB
            max_files: 5,
        }
    }
}

#[derive(Debug, Deserialize, Serialize, Clone, Default)]
pub struct ClientConfig {
    #[serde(default)]
    pub meta: MetaConfig,
    #[serde(default)]
    pub log: LogConfig,
}

impl ClientConfig {
    pub fn load<P: AsRef<Path>>(path: P) -> ClientResult<Self> {
        let content = fs::read_to_string(path)?;
        let config: ClientConfig = toml::from_str(&content)?;
        Ok(config)
    }

    pub fn save<P: AsRef<Path>>(&self, path: P) -> ClientResult<()> {
        let content = toml::to_string_pretty(self)?;
        fs::write(path, content)?;
        Ok(())
    }

    /// 转换为运行时参数
    pub fn to_options(&self) -> ClientResult<ClientOptions> {
        let meta = &self.meta;
        let meta_addrs = parse_host_list(&meta.addrs)?;
        if meta_addrs.is_empty() {
            return Err(ClientError::Config("元数据服务地址不能为空".to_string()));
        }
        if meta.heartbeat_interval_secs == 0 {
            return Err(ClientError::Config("心跳间隔必须大于0".to_string()));
        }

        Ok(ClientOptions {
            meta_addrs,
            local_host: meta.local_host.parse()?,
            role: meta.role,
            retry_count: meta.retry_count,
            retry_interval: Duration::from_secs(meta.retry_interval_secs),
            heartbeat_interval: Duration::from_secs(meta.heartbeat_interval_secs),
            heartbeat_jitter: Duration::from_millis(meta.heartbeat_jitter_ms),
            rpc_timeout: Duration::from_millis(meta.rpc_timeout_ms),
            cluster_id_path: PathBuf::from(&meta.cluster_id_path),
            skip_config: meta.skip_config,
            ready_retry: meta.ready_retry,
        })
    }
}

/// 运行时参数，由 `ClientConfig::to_options` 生成
#[derive(Debug, Clone)]
pub struct ClientOptions {
    pub meta_addrs: Vec<HostAddr>,
    pub local_host: HostAddr,
    pub role: ClientRole,
    pub retry_count: usize,
    pub retry_interval: Duration,
    pub heartbeat_interval: Duration,
    pub heartbeat_jitter: Duration,
    pub rpc_timeout: Duration,
    pub cluster_id_path: PathBuf,
    pub skip_config: bool,
    pub ready_retry: i32,
}

impl ClientOptions {
    pub fn new(meta_addrs: Vec<HostAddr>, local_host: HostAddr, role: ClientRole) -> Self {
        Self {
            meta_addrs,
            local_host,
            role,
            retry_count: 3,
            retry_interval: Duration::from_secs(1),
            heartbeat_interval: Duration::from_secs(3),
            heartbeat_jitter: Duration::from_millis(900),
            rpc_timeout: Duration::from_millis(60_000),
            cluster_id_path: PathBuf::from("cluster.id"),
            skip_config: false,
            ready_retry: 3,
        }
    }
}
