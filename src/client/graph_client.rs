//! 客户端上下文
//!
//! 持有目录、leader 估计、路由、两种执行器和后台刷新任务，生命周期由 `start` / `stop` 控制。

use log::info;
use std::sync::Arc;

use super::router::RequestRouter;
use super::scatter_gather::ScatterGatherExecutor;
use super::single_target::SingleTargetExecutor;
use super::stats::RpcStatsCollector;
use crate::config::{ClientConfig, ClientOptions};
use crate::core::error::ClientResult;
use crate::meta::{
    LeaderTracker, MetaCacheRefresher, MetaChangedListener, MetaClient, MetaService,
    PartitionDirectory, ServiceLeader,
};

#[derive(Debug)]
pub struct GraphClient {
    options: ClientOptions,
    directory: Arc<PartitionDirectory>,
    leaders: Arc<LeaderTracker>,
    router: RequestRouter,
    scatter_gather: ScatterGatherExecutor,
    single_target: SingleTargetExecutor,
    meta_client: MetaClient,
    refresher: MetaCacheRefresher,
    stats: Arc<RpcStatsCollector>,
}

impl GraphClient {
    pub fn new(
        options: ClientOptions,
        service: Arc<dyn MetaService>,
        listener: Option<Arc<dyn MetaChangedListener>>,
    ) -> ClientResult<Self> {
        let directory = Arc::new(PartitionDirectory::new());
        let leaders = Arc::new(LeaderTracker::new());
        let service_leader = Arc::new(ServiceLeader::new(options.meta_addrs.clone())?);
        let stats = Arc::new(RpcStatsCollector::new());

        let router = RequestRouter::new(Arc::clone(&directory), Arc::clone(&leaders));
        let scatter_gather =
            ScatterGatherExecutor::from_options(router.clone(), Arc::clone(&stats), &options);
        let single_target = SingleTargetExecutor::new(
            router.clone(),
            service_leader,
            Arc::clone(&stats),
            &options,
        );
        let meta_client = MetaClient::new(service, single_target.clone());
        let refresher = MetaCacheRefresher::new(
            meta_client.clone(),
            Arc::clone(&directory),
            Arc::clone(&leaders),
            listener,
            options.clone(),
        );

        Ok(Self {
            options,
            directory,
            leaders,
            router,
            scatter_gather,
            single_target,
            meta_client,
            refresher,
            stats,
        })
    }

    pub fn from_config(
        config: &ClientConfig,
        service: Arc<dyn MetaService>,
        listener: Option<Arc<dyn MetaChangedListener>>,
    ) -> ClientResult<Self> {
        Self::new(config.to_options()?, service, listener)
    }

    /// 等待元数据就绪并启动后台刷新
    pub async fn start(&self) -> ClientResult<()> {
        info!(
            "启动客户端, 本机 {}, 元数据服务 {:?}",
            self.options.local_host, self.options.meta_addrs
        );
        self.refresher.start().await
    }

    /// 停止后台刷新并清空缓存
    pub async fn stop(&self) {
        self.refresher.stop().await;
        self.directory.clear();
        self.leaders.clear();
        info!("客户端已停止");
    }

    pub fn is_ready(&self) -> bool {
        self.refresher.is_ready()
    }

    pub fn options(&self) -> &ClientOptions {
        &self.options
    }

    pub fn directory(&self) -> &Arc<PartitionDirectory> {
        &self.directory
    }

    pub fn leaders(&self) -> &Arc<LeaderTracker> {
        &self.leaders
    }

    pub fn router(&self) -> &RequestRouter {
        &self.router
    }

    pub fn scatter_gather(&self) -> &ScatterGatherExecutor {
        &self.scatter_gather
    }

    pub fn single_target(&self) -> &SingleTargetExecutor {
        &self.single_target
    }

    pub fn meta_client(&self) -> &MetaClient {
        &self.meta_client
    }

    pub fn refresher(&self) -> &MetaCacheRefresher {
        &self.refresher
    }

    pub fn stats(&self) -> &Arc<RpcStatsCollector> {
        &self.stats
    }
}
