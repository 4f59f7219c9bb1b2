//! 元数据服务请求/应答类型

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use crate::client::transport::RpcResponse;
use crate::config::{ClientRole, ConfigModule};
use crate::core::error::ErrorCode;
use crate::core::types::{ClusterID, GraphSpaceID, HostAddr, PartitionID, TermID};

/// 配置项是否允许运行时修改
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ConfigMode {
    Immutable,
    Mutable,
}

/// 配置项
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConfigItem {
    pub module: ConfigModule,
    pub name: String,
    pub mode: ConfigMode,
    pub value: serde_json::Value,
}

impl ConfigItem {
    pub fn new(module: ConfigModule, name: impl Into<String>, value: serde_json::Value) -> Self {
        Self {
            module,
            name: name.into(),
            mode: ConfigMode::Mutable,
            value,
        }
    }
}

/// 本机持有 leader 的分区
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct LeaderInfo {
    pub part_id: PartitionID,
    pub term: TermID,
}

/// 空间 -> 本机为 leader 的分区
pub type LeaderParts = HashMap<GraphSpaceID, Vec<LeaderInfo>>;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HeartbeatReq {
    pub host: HostAddr,
    pub role: ClientRole,
    pub cluster_id: ClusterID,
    pub leader_parts: Option<LeaderParts>,
    pub version: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct HeartbeatResp {
    pub cluster_id: ClusterID,
    /// 元数据最近一次变更的时间
    pub last_update_time_in_ms: i64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ListSpacesReq;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SpaceIdName {
    pub space_id: GraphSpaceID,
    pub space_name: String,
}

/// 按空间 ID 请求的通用参数
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SpaceReq {
    pub space_id: GraphSpaceID,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ListHostsReq;

/// 存储主机状态
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum HostStatus {
    Online,
    Offline,
}

/// 存储主机及其通过心跳上报的 leader 分布
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HostItem {
    pub host: HostAddr,
    pub status: HostStatus,
    /// 空间 -> 该主机为 leader 的分区
    pub leader_parts: HashMap<GraphSpaceID, Vec<PartitionID>>,
}

impl HostItem {
    pub fn new(host: HostAddr) -> Self {
        Self {
            host,
            status: HostStatus::Online,
            leader_parts: HashMap::new(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ListConfigsReq {
    pub module: ConfigModule,
}

/// 元数据服务应答
///
/// `leader` 仅在 `code` 为 `LeaderChanged` 时有意义，指向新的元数据 leader。
#[derive(Debug, Clone, PartialEq)]
pub struct MetaResponse<T> {
    pub code: ErrorCode,
    pub leader: Option<HostAddr>,
    pub value: T,
}

impl<T> MetaResponse<T> {
    pub fn ok(value: T) -> Self {
        Self {
            code: ErrorCode::Succeeded,
            leader: None,
            value,
        }
    }

    pub fn error(code: ErrorCode) -> Self
    where
        T: Default,
    {
        Self {
            code,
            leader: None,
            value: T::default(),
        }
    }

    pub fn leader_changed(leader: Option<HostAddr>) -> Self
    where
        T: Default,
    {
        Self {
            code: ErrorCode::LeaderChanged,
            leader,
            value: T::default(),
        }
    }
}

impl<T: Send + 'static> RpcResponse for MetaResponse<T> {
    fn code(&self) -> ErrorCode {
        self.code
    }

    fn leader_hint(&self) -> Option<&HostAddr> {
        self.leader.as_ref()
    }
}
