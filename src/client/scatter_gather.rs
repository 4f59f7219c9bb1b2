//! 分散-汇聚执行器
//!
//! 每台主机一个 RPC，并发发送。应答中报告 leader 变更的分区按新 leader 重新分组，
//! 作为下一轮发出，轮次上限为 `retry_limit`。所有在途请求都放在同一个集合里，
//! 集合为空且不会再有新一轮时才产出结果。

use futures::future::BoxFuture;
use futures::stream::{FuturesUnordered, StreamExt};
use futures::FutureExt;
use log::{debug, warn};
use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;
use std::time::{Duration, Instant};

use super::response::AggregateResult;
use super::router::RequestRouter;
use super::stats::RpcStatsCollector;
use super::transport::{PartitionedRequest, RemoteProcedure, RpcResponse};
use crate::config::ClientOptions;
use crate::core::error::{ClientError, ClientResult, ErrorCode};
use crate::core::types::{HostAddr, PartitionID};

/// 一个主机请求的执行结果
struct Outcome<Req, Resp> {
    host: HostAddr,
    wave: usize,
    request: Req,
    result: ClientResult<Resp>,
    e2e_us: i64,
}

type InFlight<Req, Resp> = FuturesUnordered<BoxFuture<'static, Outcome<Req, Resp>>>;

#[derive(Debug, Clone)]
pub struct ScatterGatherExecutor {
    router: RequestRouter,
    stats: Arc<RpcStatsCollector>,
    retry_limit: usize,
    rpc_timeout: Duration,
}

impl ScatterGatherExecutor {
    pub fn new(
        router: RequestRouter,
        stats: Arc<RpcStatsCollector>,
        retry_limit: usize,
        rpc_timeout: Duration,
    ) -> Self {
        Self {
            router,
            stats,
            retry_limit: retry_limit.max(1),
            rpc_timeout,
        }
    }

    pub fn from_options(
        router: RequestRouter,
        stats: Arc<RpcStatsCollector>,
        options: &ClientOptions,
    ) -> Self {
        Self::new(router, stats, options.retry_count, options.rpc_timeout)
    }

    pub fn retry_limit(&self) -> usize {
        self.retry_limit
    }

    /// 并发发送每台主机的请求并汇总
    ///
    /// 返回时所有轮次都已结束；是否全部成功需要查看 `failed_parts()` / `completeness()`。
    pub async fn send<P>(
        &self,
        requests: BTreeMap<HostAddr, P::Request>,
        procedure: Arc<P>,
    ) -> AggregateResult<P::Response>
    where
        P: RemoteProcedure,
        P::Request: PartitionedRequest,
    {
        let total_parts: BTreeSet<PartitionID> =
            requests.values().flat_map(|req| req.parts()).collect();
        let mut result = AggregateResult::new(total_parts.len());
        let mut in_flight: InFlight<P::Request, P::Response> = FuturesUnordered::new();

        for (host, request) in requests {
            self.dispatch(&mut in_flight, &procedure, host, request, 0);
        }

        while let Some(outcome) = in_flight.next().await {
            let Outcome {
                host,
                wave,
                request,
                result: reply,
                e2e_us,
            } = outcome;

            let response = match reply {
                Ok(response) => response,
                Err(err) => {
                    warn!("{} 调用 {} 失败: {}", procedure.name(), host, err);
                    self.stats.record_failed();
                    for part_id in request.parts() {
                        result.mark_failure(part_id, ErrorCode::RpcFailure);
                    }
                    continue;
                }
            };

            result.record_latency(host, response.latency_us(), e2e_us);

            let space_id = request.space_id();
            let mut moved = Vec::new();
            for failed in response.failed_parts() {
                if failed.code != ErrorCode::LeaderChanged {
                    result.mark_failure(failed.part_id, failed.code);
                    continue;
                }
                self.stats.record_leader_changed();
                match &failed.leader {
                    Some(leader) => {
                        self.router
                            .leaders()
                            .update(space_id, failed.part_id, leader.clone())
                    }
                    None => self.router.leaders().invalidate(space_id, failed.part_id),
                }
                if wave + 1 < self.retry_limit {
                    moved.push(failed.part_id);
                } else {
                    debug!(
                        "分区 {}/{} 在第 {} 轮后仍然 leader 变更, 放弃重试",
                        space_id,
                        failed.part_id,
                        wave + 1
                    );
                    result.mark_failure(failed.part_id, ErrorCode::LeaderChanged);
                }
            }
            result.add_response(response);

            if moved.is_empty() {
                continue;
            }
            match self.router.cluster_parts(space_id, &moved) {
                Ok(targets) => {
                    for (target, parts) in targets {
                        self.stats.record_retry();
                        let sub_request = request.extract(&parts);
                        self.dispatch(&mut in_flight, &procedure, target, sub_request, wave + 1);
                    }
                }
                Err(err) => {
                    warn!("重新路由分区 {:?} 失败: {}", moved, err);
                    let code = err.to_error_code();
                    for part_id in moved {
                        result.mark_failure(part_id, code);
                    }
                }
            }
        }

        result
    }

    fn dispatch<P>(
        &self,
        in_flight: &mut InFlight<P::Request, P::Response>,
        procedure: &Arc<P>,
        host: HostAddr,
        request: P::Request,
        wave: usize,
    ) where
        P: RemoteProcedure,
    {
        self.stats.record_sent(procedure.name());

        let task_procedure = Arc::clone(procedure);
        let task_host = host.clone();
        let task_request = request.clone();
        let rpc_timeout = self.rpc_timeout;
        let handle = tokio::spawn(async move {
            let start = Instant::now();
            let reply =
                match tokio::time::timeout(rpc_timeout, task_procedure.call(&task_host, task_request))
                    .await
                {
                    Ok(reply) => reply,
                    Err(_) => Err(ClientError::RpcFailed(format!(
                        "调用 {} 超时 ({:?})",
                        task_host, rpc_timeout
                    ))),
                };
            (reply, start.elapsed().as_micros() as i64)
        });

        in_flight.push(
            async move {
                let (result, e2e_us) = match handle.await {
                    Ok(done) => done,
                    Err(err) => (Err(ClientError::RpcFailed(err.to_string())), 0),
                };
                Outcome {
                    host,
                    wave,
                    request,
                    result,
                    e2e_us,
                }
            }
            .boxed(),
        );
    }
}
