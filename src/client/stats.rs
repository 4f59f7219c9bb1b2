//! RPC 统计
//!
//! 记录发送、失败、leader 变更和重试次数，以及按方法名分组的调用次数。

use dashmap::DashMap;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};

/// 统计快照
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RpcStatsSnapshot {
    /// 发出的 RPC 数
    pub rpc_sent: u64,
    /// 传输失败的 RPC 数
    pub rpc_failed: u64,
    /// 收到 leader 变更的次数
    pub leader_changed: u64,
    /// 重试次数
    pub retries: u64,
    /// 各方法的调用次数
    pub method_counts: HashMap<String, u64>,
}

impl RpcStatsSnapshot {
    /// 传输失败率
    pub fn failure_rate(&self) -> f64 {
        if self.rpc_sent > 0 {
            self.rpc_failed as f64 / self.rpc_sent as f64
        } else {
            0.0
        }
    }
}

#[derive(Debug, Default)]
pub struct RpcStatsCollector {
    rpc_sent: AtomicU64,
    rpc_failed: AtomicU64,
    leader_changed: AtomicU64,
    retries: AtomicU64,
    method_counts: DashMap<String, AtomicU64>,
}

impl RpcStatsCollector {
    pub fn new() -> Self {
        Self::default()
    }

    /// 记录一次发出的调用
    pub fn record_sent(&self, method: &str) {
        self.rpc_sent.fetch_add(1, Ordering::Relaxed);
        self.method_counts
            .entry(method.to_string())
            .or_insert_with(|| AtomicU64::new(0))
            .fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_failed(&self) {
        self.rpc_failed.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_leader_changed(&self) {
        self.leader_changed.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_retry(&self) {
        self.retries.fetch_add(1, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> RpcStatsSnapshot {
        let method_counts = self
            .method_counts
            .iter()
            .map(|entry| (entry.key().clone(), entry.value().load(Ordering::Relaxed)))
            .collect();

        RpcStatsSnapshot {
            rpc_sent: self.rpc_sent.load(Ordering::Relaxed),
            rpc_failed: self.rpc_failed.load(Ordering::Relaxed),
            leader_changed: self.leader_changed.load(Ordering::Relaxed),
            retries: self.retries.load(Ordering::Relaxed),
            method_counts,
        }
    }

    pub fn reset(&self) {
        self.rpc_sent.store(0, Ordering::Relaxed);
        self.rpc_failed.store(0, Ordering::Relaxed);
        self.leader_changed.store(0, Ordering::Relaxed);
        self.retries.store(0, Ordering::Relaxed);
        self.method_counts.clear();
    }
}
