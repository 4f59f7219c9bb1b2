//! 传输层接口
//!
//! 每个逻辑 RPC 方法实现一个 `RemoteProcedure`，执行器只依赖这组 trait，不关心编码和连接。

use async_trait::async_trait;
use std::collections::BTreeMap;

use crate::core::error::{ClientResult, ErrorCode};
use crate::core::types::{GraphSpaceID, HostAddr, PartitionID};

/// 远端应答的公共视图
pub trait RpcResponse: Send + 'static {
    /// 整体状态码
    fn code(&self) -> ErrorCode;

    /// `LeaderChanged` 时建议的新 leader
    fn leader_hint(&self) -> Option<&HostAddr> {
        None
    }

    /// 失败的分区
    fn failed_parts(&self) -> &[PartitionResult] {
        &[]
    }

    /// 服务端处理耗时（微秒）
    fn latency_us(&self) -> i64 {
        0
    }
}

/// 一个逻辑 RPC 方法
#[async_trait]
pub trait RemoteProcedure: Send + Sync + 'static {
    type Request: Clone + Send + Sync + 'static;
    type Response: RpcResponse;

    fn name(&self) -> &'static str;

    /// 向 `host` 发起一次调用；返回 `Err` 表示传输层失败（没有收到应答）
    async fn call(&self, host: &HostAddr, request: Self::Request) -> ClientResult<Self::Response>;
}

/// 可按分区拆分的请求
pub trait PartitionedRequest: Clone + Send + Sync + 'static {
    fn space_id(&self) -> GraphSpaceID;

    /// 请求涉及的分区
    fn parts(&self) -> Vec<PartitionID>;

    /// 只保留给定分区的子请求
    fn extract(&self, parts: &[PartitionID]) -> Self;
}

/// 单个分区的失败信息
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PartitionResult {
    pub code: ErrorCode,
    pub part_id: PartitionID,
    pub leader: Option<HostAddr>,
}

impl PartitionResult {
    pub fn new(part_id: PartitionID, code: ErrorCode) -> Self {
        Self {
            code,
            part_id,
            leader: None,
        }
    }

    pub fn leader_changed(part_id: PartitionID, leader: Option<HostAddr>) -> Self {
        Self {
            code: ErrorCode::LeaderChanged,
            part_id,
            leader,
        }
    }
}

/// 存储服务应答的公共部分
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ResponseCommon {
    pub failed_parts: Vec<PartitionResult>,
    pub latency_in_us: i64,
}

/// 存储服务应答
#[derive(Debug, Clone, PartialEq)]
pub struct StorageResponse<T> {
    pub result: ResponseCommon,
    pub data: T,
}

impl<T> StorageResponse<T> {
    pub fn ok(data: T) -> Self {
        Self {
            result: ResponseCommon::default(),
            data,
        }
    }

    pub fn with_failed_parts(mut self, failed_parts: Vec<PartitionResult>) -> Self {
        self.result.failed_parts = failed_parts;
        self
    }

    pub fn with_latency(mut self, latency_in_us: i64) -> Self {
        self.result.latency_in_us = latency_in_us;
        self
    }
}

impl<T: Send + 'static> RpcResponse for StorageResponse<T> {
    /// 有分区报告 leader 变更时整体视为 `LeaderChanged`，否则取第一个失败分区的状态码
    fn code(&self) -> ErrorCode {
        let failed = &self.result.failed_parts;
        if failed.iter().any(|p| p.code == ErrorCode::LeaderChanged) {
            return ErrorCode::LeaderChanged;
        }
        failed
            .first()
            .map(|p| p.code)
            .unwrap_or(ErrorCode::Succeeded)
    }

    fn leader_hint(&self) -> Option<&HostAddr> {
        self.result
            .failed_parts
            .iter()
            .find(|p| p.code == ErrorCode::LeaderChanged)
            .and_then(|p| p.leader.as_ref())
    }

    fn failed_parts(&self) -> &[PartitionResult] {
        &self.result.failed_parts
    }

    fn latency_us(&self) -> i64 {
        self.result.latency_in_us
    }
}

/// 按分区分组的批量请求，`RequestRouter` 的输出即由它承载
#[derive(Debug, Clone, PartialEq)]
pub struct PartitionedBatch<T> {
    pub space_id: GraphSpaceID,
    pub parts: BTreeMap<PartitionID, Vec<T>>,
}

impl<T> PartitionedBatch<T> {
    pub fn new(space_id: GraphSpaceID, parts: BTreeMap<PartitionID, Vec<T>>) -> Self {
        Self { space_id, parts }
    }

    /// 条目总数
    pub fn len(&self) -> usize {
        self.parts.values().map(Vec::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl<T: Clone + Send + Sync + 'static> PartitionedRequest for PartitionedBatch<T> {
    fn space_id(&self) -> GraphSpaceID {
        self.space_id
    }

    fn parts(&self) -> Vec<PartitionID> {
        self.parts.keys().copied().collect()
    }

    fn extract(&self, parts: &[PartitionID]) -> Self {
        let parts = parts
            .iter()
            .filter_map(|part_id| {
                self.parts
                    .get(part_id)
                    .map(|items| (*part_id, items.clone()))
            })
            .collect();
        Self::new(self.space_id, parts)
    }
}
