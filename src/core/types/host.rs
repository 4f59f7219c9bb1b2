//! 主机地址类型

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::core::error::ClientError;

/// 服务端点地址
///
/// 先按 host 字典序、再按 port 排序，可直接作为有序容器的键。
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct HostAddr {
    pub host: String,
    pub port: u16,
}

impl HostAddr {
    pub fn new(host: impl Into<String>, port: u16) -> Self {
        Self {
            host: host.into(),
            port,
        }
    }

    /// 未设置的地址（host 为空，port 为 0）
    pub fn is_empty(&self) -> bool {
        self.host.is_empty() && self.port == 0
    }
}

impl fmt::Display for HostAddr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.host, self.port)
    }
}

impl FromStr for HostAddr {
    type Err = ClientError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (host, port) = s
            .trim()
            .rsplit_once(':')
            .ok_or_else(|| ClientError::InvalidInput(format!("地址缺少端口: {}", s)))?;
        if host.is_empty() {
            return Err(ClientError::InvalidInput(format!("地址缺少主机名: {}", s)));
        }
        let port = port
            .parse::<u16>()
            .map_err(|e| ClientError::InvalidInput(format!("无效端口 {}: {}", s, e)))?;
        Ok(Self::new(host, port))
    }
}

/// 解析 `host:port,host:port` 形式的地址列表
pub fn parse_host_list(s: &str) -> Result<Vec<HostAddr>, ClientError> {
    s.split(',')
        .map(str::trim)
        .filter(|item| !item.is_empty())
        .map(HostAddr::from_str)
        .collect()
}
