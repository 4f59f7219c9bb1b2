//! 分散请求的汇总结果

use std::collections::HashMap;

use crate::core::error::ErrorCode;
use crate::core::types::{HostAddr, PartitionID};

/// 汇总结论
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResultKind {
    AllSucceeded,
    PartialSucceeded,
}

/// 单台主机的耗时
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HostLatency {
    pub host: HostAddr,
    /// 服务端报告的处理耗时（微秒）
    pub latency_us: i64,
    /// 客户端测得的端到端耗时（微秒）
    pub e2e_us: i64,
}

/// 一次分散请求在所有轮次结束后的结果
#[derive(Debug, Clone)]
pub struct AggregateResult<R> {
    responses: Vec<R>,
    failed_parts: HashMap<PartitionID, ErrorCode>,
    total_parts: usize,
    max_latency_us: i64,
    host_latencies: Vec<HostLatency>,
}

impl<R> AggregateResult<R> {
    /// `total_parts` 为原始请求覆盖的分区数
    pub fn new(total_parts: usize) -> Self {
        Self {
            responses: Vec::new(),
            failed_parts: HashMap::new(),
            total_parts,
            max_latency_us: 0,
            host_latencies: Vec::new(),
        }
    }

    pub(crate) fn add_response(&mut self, response: R) {
        self.responses.push(response);
    }

    /// 记录失败分区；同一分区以最后一次结果为准
    pub(crate) fn mark_failure(&mut self, part_id: PartitionID, code: ErrorCode) {
        self.failed_parts.insert(part_id, code);
    }

    pub(crate) fn record_latency(&mut self, host: HostAddr, latency_us: i64, e2e_us: i64) {
        self.max_latency_us = self.max_latency_us.max(latency_us);
        self.host_latencies.push(HostLatency {
            host,
            latency_us,
            e2e_us,
        });
    }

    pub fn responses(&self) -> &[R] {
        &self.responses
    }

    pub fn into_responses(self) -> Vec<R> {
        self.responses
    }

    pub fn failed_parts(&self) -> &HashMap<PartitionID, ErrorCode> {
        &self.failed_parts
    }

    pub fn total_parts(&self) -> usize {
        self.total_parts
    }

    pub fn max_latency_us(&self) -> i64 {
        self.max_latency_us
    }

    pub fn host_latencies(&self) -> &[HostLatency] {
        &self.host_latencies
    }

    pub fn succeeded(&self) -> bool {
        self.failed_parts.is_empty()
    }

    pub fn result(&self) -> ResultKind {
        if self.failed_parts.is_empty() {
            ResultKind::AllSucceeded
        } else {
            ResultKind::PartialSucceeded
        }
    }

    /// 成功分区占比（0..=100，整数除法）；没有分区时为 100
    pub fn completeness(&self) -> u32 {
        if self.total_parts == 0 {
            return 100;
        }
        let failed = self.failed_parts.len().min(self.total_parts);
        ((self.total_parts - failed) * 100 / self.total_parts) as u32
    }
}
