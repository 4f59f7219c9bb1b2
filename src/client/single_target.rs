//! 单目标执行器
//!
//! 单分区操作和元数据服务调用都走这里。尝试严格串行：
//! 传输失败按固定间隔重试，leader 变更立即重试，其余状态码原样返回。

use log::{debug, warn};
use std::sync::Arc;
use std::time::Duration;

use super::router::RequestRouter;
use super::stats::RpcStatsCollector;
use super::transport::{RemoteProcedure, RpcResponse};
use crate::config::ClientOptions;
use crate::core::error::{ClientError, ClientResult, ErrorCode};
use crate::core::types::{GraphSpaceID, HostAddr, PartitionID};
use crate::meta::ServiceLeader;

/// 请求的路由方式，决定失败时更新哪一份 leader 估计
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Route {
    /// 元数据服务调用；`to_leader` 为 false 时发往任意健康节点
    Service { to_leader: bool },
    /// 单分区调用
    Part {
        space_id: GraphSpaceID,
        part_id: PartitionID,
    },
}

#[derive(Debug, Clone)]
pub struct SingleTargetExecutor {
    router: RequestRouter,
    service: Arc<ServiceLeader>,
    stats: Arc<RpcStatsCollector>,
    retry_limit: usize,
    retry_interval: Duration,
    rpc_timeout: Duration,
}

impl SingleTargetExecutor {
    pub fn new(
        router: RequestRouter,
        service: Arc<ServiceLeader>,
        stats: Arc<RpcStatsCollector>,
        options: &ClientOptions,
    ) -> Self {
        Self {
            router,
            service,
            stats,
            retry_limit: options.retry_count,
            retry_interval: options.retry_interval,
            rpc_timeout: options.rpc_timeout,
        }
    }

    pub fn service(&self) -> &Arc<ServiceLeader> {
        &self.service
    }

    /// 发往元数据服务，目标由当前的 leader/活跃节点估计决定
    pub async fn send_to_service<P: RemoteProcedure>(
        &self,
        to_leader: bool,
        request: P::Request,
        procedure: &P,
    ) -> ClientResult<P::Response> {
        let host = self.service.target(to_leader);
        self.send(host, Route::Service { to_leader }, request, procedure)
            .await
    }

    /// 发往分区当前的目标主机
    pub async fn send_to_part<P: RemoteProcedure>(
        &self,
        space_id: GraphSpaceID,
        part_id: PartitionID,
        request: P::Request,
        procedure: &P,
    ) -> ClientResult<P::Response> {
        let part_hosts = self.router.directory().get_part_hosts(space_id, part_id)?;
        let host = self.router.leaders().resolve(&part_hosts)?;
        self.send(host, Route::Part { space_id, part_id }, request, procedure)
            .await
    }

    /// 发送并按需重试，最多 `retry_limit + 1` 次尝试
    pub async fn send<P: RemoteProcedure>(
        &self,
        host: HostAddr,
        route: Route,
        request: P::Request,
        procedure: &P,
    ) -> ClientResult<P::Response> {
        let mut host = host;
        let mut retry = 0;
        loop {
            self.stats.record_sent(procedure.name());
            let reply = match tokio::time::timeout(
                self.rpc_timeout,
                procedure.call(&host, request.clone()),
            )
            .await
            {
                Ok(reply) => reply,
                Err(_) => Err(ClientError::RpcFailed(format!(
                    "调用 {} 超时 ({:?})",
                    host, self.rpc_timeout
                ))),
            };

            match reply {
                Err(err) => {
                    self.stats.record_failed();
                    warn!(
                        "{} 调用 {} 失败 (第 {} 次): {}",
                        procedure.name(),
                        host,
                        retry + 1,
                        err
                    );
                    if let Route::Service { to_leader } = route {
                        if to_leader {
                            self.service.rotate_leader(&host);
                        } else {
                            self.service.rotate_active(&host);
                        }
                        host = self.service.target(to_leader);
                    }
                    if retry >= self.retry_limit {
                        return Err(match err {
                            ClientError::RpcFailed(text) => ClientError::RpcFailed(text),
                            other => ClientError::RpcFailed(other.to_string()),
                        });
                    }
                    self.stats.record_retry();
                    tokio::time::sleep(self.retry_interval).await;
                }
                Ok(response) if response.code() == ErrorCode::LeaderChanged => {
                    self.stats.record_leader_changed();
                    let hint = response.leader_hint().cloned();
                    debug!(
                        "{} 在 {} 上 leader 变更, 新 leader: {:?}",
                        procedure.name(),
                        host,
                        hint
                    );
                    host = self.follow_leader(route, &host, hint);
                    if retry >= self.retry_limit {
                        return Ok(response);
                    }
                    self.stats.record_retry();
                }
                Ok(response) => return Ok(response),
            }
            retry += 1;
        }
    }

    /// 根据 leader 提示更新估计，返回下一次尝试的目标
    fn follow_leader(&self, route: Route, current: &HostAddr, hint: Option<HostAddr>) -> HostAddr {
        match route {
            Route::Service { to_leader } => {
                match hint {
                    Some(leader) => self.service.set_leader(leader),
                    None => self.service.rotate_leader(current),
                }
                self.service.target(to_leader)
            }
            Route::Part { space_id, part_id } => {
                let leaders = self.router.leaders();
                match hint {
                    Some(leader) => leaders.update(space_id, part_id, leader),
                    None => leaders.invalidate(space_id, part_id),
                }
                // 与路由器使用同一规则：提示的 leader 不在副本列表中时回退到 hosts[0]
                self.router
                    .directory()
                    .get_part_hosts(space_id, part_id)
                    .and_then(|part_hosts| leaders.resolve(&part_hosts))
                    .unwrap_or_else(|_| current.clone())
            }
        }
    }
}
