//! 元数据缓存刷新
//!
//! 状态机 `Created -> ProbingReady -> Running -> Stopped`。
//! 就绪探测成功后启动后台任务，按心跳间隔加随机抖动周期性心跳；
//! 远端元数据的更新时间晚于本地水位时，全量重新拉取并与旧快照比较，
//! 把本机分区的变化通知给监听者。

use log::{debug, error, info, warn};
use parking_lot::{Mutex, RwLock};
use rand::Rng;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicI64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{watch, Mutex as AsyncMutex};
use tokio::task::JoinHandle;

use super::cluster_id::ClusterIdFile;
use super::directory::PartitionDirectory;
use super::leader::LeaderTracker;
use super::listener::MetaChangedListener;
use super::service::MetaClient;
use super::snapshot::{LocalCache, SpaceData, SpaceSnapshot};
use super::types::{ConfigItem, HeartbeatReq, HeartbeatResp, HostItem, HostStatus, LeaderParts};
use crate::config::{ClientOptions, ClientRole};
use crate::core::error::{ClientError, ClientResult};
use crate::core::types::{ClusterID, GraphSpaceID, HostAddr, PartHosts, PartitionID};
use crate::utils::logging;

/// 变更后需要下发到各空间的存储引擎选项
const SPACE_OPTION_NAMES: [&str; 2] = ["rocksdb_column_family_options", "rocksdb_db_options"];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RefresherState {
    Created,
    ProbingReady,
    Running,
    Stopped,
}

/// 致命错误处理函数
pub type FatalHandler = Arc<dyn Fn(&ClientError) + Send + Sync>;

/// 默认处理：记录日志、刷新日志后退出进程
pub fn default_fatal_handler() -> FatalHandler {
    Arc::new(|err: &ClientError| {
        error!("致命错误, 进程退出: {}", err);
        logging::shutdown();
        std::process::exit(1);
    })
}

struct RefresherCore {
    client: MetaClient,
    directory: Arc<PartitionDirectory>,
    leaders: Arc<LeaderTracker>,
    listener: Option<Arc<dyn MetaChangedListener>>,
    options: ClientOptions,
    cluster_id_file: ClusterIdFile,
    cluster_id: AtomicI64,
    watermark: AtomicI64,
    fatal_handler: RwLock<FatalHandler>,
    /// 刷新周期互斥，`stop` 持有它等待进行中的周期结束
    cycle: AsyncMutex<()>,
    stopped: AtomicBool,
}

struct BackgroundTask {
    shutdown: watch::Sender<bool>,
    handle: JoinHandle<()>,
}

pub struct MetaCacheRefresher {
    core: Arc<RefresherCore>,
    state: Mutex<RefresherState>,
    task: Mutex<Option<BackgroundTask>>,
}

impl std::fmt::Debug for MetaCacheRefresher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MetaCacheRefresher")
            .field("state", &self.state())
            .field("cluster_id", &self.cluster_id())
            .field("watermark", &self.watermark())
            .finish()
    }
}

impl MetaCacheRefresher {
    /// 存储角色会在这里读取已持久化的集群 ID
    pub fn new(
        client: MetaClient,
        directory: Arc<PartitionDirectory>,
        leaders: Arc<LeaderTracker>,
        listener: Option<Arc<dyn MetaChangedListener>>,
        options: ClientOptions,
    ) -> Self {
        let cluster_id_file = ClusterIdFile::new(&options.cluster_id_path);
        let mut cluster_id = 0;
        if options.role == ClientRole::Storage {
            match cluster_id_file.load() {
                Ok(Some(id)) => {
                    info!("从 {} 读取到集群 ID {}", cluster_id_file.path().display(), id);
                    cluster_id = id;
                }
                Ok(None) => {}
                Err(e) => warn!("读取集群 ID 失败, 等待元数据服务分配: {}", e),
            }
        }

        Self {
            core: Arc::new(RefresherCore {
                client,
                directory,
                leaders,
                listener,
                options,
                cluster_id_file,
                cluster_id: AtomicI64::new(cluster_id),
                watermark: AtomicI64::new(0),
                fatal_handler: RwLock::new(default_fatal_handler()),
                cycle: AsyncMutex::new(()),
                stopped: AtomicBool::new(false),
            }),
            state: Mutex::new(RefresherState::Created),
            task: Mutex::new(None),
        }
    }

    pub fn state(&self) -> RefresherState {
        *self.state.lock()
    }

    pub fn is_ready(&self) -> bool {
        self.state() == RefresherState::Running
    }

    pub fn cluster_id(&self) -> ClusterID {
        self.core.cluster_id.load(Ordering::Acquire)
    }

    /// 本地已同步到的远端元数据更新时间
    pub fn watermark(&self) -> i64 {
        self.core.watermark.load(Ordering::Acquire)
    }

    pub fn set_fatal_handler(&self, handler: FatalHandler) {
        *self.core.fatal_handler.write() = handler;
    }

    /// 就绪探测，成功后启动后台刷新任务
    ///
    /// 探测次数受 `ready_retry` 限制（-1 表示一直重试），用尽后返回 `NotReady` 并回到 `Created`。
    pub async fn start(&self) -> ClientResult<()> {
        {
            let mut state = self.state.lock();
            match *state {
                RefresherState::Created => *state = RefresherState::ProbingReady,
                RefresherState::Running => return Ok(()),
                RefresherState::ProbingReady => {
                    return Err(ClientError::NotReady("正在进行就绪探测".to_string()))
                }
                RefresherState::Stopped => {
                    return Err(ClientError::NotReady("刷新任务已停止".to_string()))
                }
            }
        }

        let ready_retry = self.core.options.ready_retry;
        let mut tries: i64 = 0;
        loop {
            match self.core.probe().await {
                Ok(()) => break,
                Err(e) => {
                    tries += 1;
                    if e.is_fatal() {
                        self.core.fatal(&e);
                    }
                    warn!("元数据服务就绪探测失败 (第 {} 次): {}", tries, e);
                    if ready_retry >= 0 && tries >= i64::from(ready_retry.max(1)) {
                        *self.state.lock() = RefresherState::Created;
                        return Err(ClientError::NotReady(format!(
                            "{} 次探测后元数据服务仍不可用: {}",
                            tries, e
                        )));
                    }
                    tokio::time::sleep(self.core.options.retry_interval).await;
                }
            }
        }

        let mut state = self.state.lock();
        if *state != RefresherState::ProbingReady {
            return Err(ClientError::NotReady("刷新任务已停止".to_string()));
        }
        let (shutdown, receiver) = watch::channel(false);
        let handle = tokio::spawn(Arc::clone(&self.core).run(receiver));
        *self.task.lock() = Some(BackgroundTask { shutdown, handle });
        *state = RefresherState::Running;
        drop(state);
        info!(
            "元数据客户端就绪, 角色 {:?}, 水位 {}",
            self.core.options.role,
            self.watermark()
        );
        Ok(())
    }

    /// 停止后台任务并等待其退出；正在进行的刷新会先完成
    pub async fn stop(&self) {
        *self.state.lock() = RefresherState::Stopped;
        self.core.stopped.store(true, Ordering::Release);
        let task = self.task.lock().take();
        if let Some(task) = task {
            let _ = task.shutdown.send(true);
            if let Err(e) = task.handle.await {
                warn!("刷新任务异常退出: {}", e);
            }
            info!("元数据刷新任务已停止");
        }
        // 等待调用方手动触发、尚未结束的周期
        drop(self.core.cycle.lock().await);
    }

    /// 执行一轮刷新
    ///
    /// 仅在 `Created` 或 `Running` 状态下执行，与后台周期互斥；停止后直接返回。
    pub async fn refresh_once(&self) {
        match self.state() {
            RefresherState::Created | RefresherState::Running => self.core.refresh_cycle().await,
            state => debug!("状态 {:?} 下忽略刷新请求", state),
        }
    }

    /// 发送一次心跳
    pub async fn heartbeat(&self) -> ClientResult<HeartbeatResp> {
        self.core.heartbeat().await
    }

    /// 全量拉取拓扑、Schema 与 leader 分布，替换缓存并通知变化
    pub async fn load_data(&self) -> ClientResult<()> {
        let _cycle = self.core.enter_cycle().await?;
        self.core.load_data().await
    }

    /// 拉取本角色的配置项
    pub async fn load_config(&self) -> ClientResult<()> {
        let _cycle = self.core.enter_cycle().await?;
        self.core.load_config().await
    }

    /// 比较新旧快照中本机分区的变化并通知监听者
    pub fn diff(&self, old: &LocalCache, new: &LocalCache) {
        self.core.diff(old, new)
    }
}

impl RefresherCore {
    async fn run(self: Arc<Self>, mut shutdown: watch::Receiver<bool>) {
        loop {
            let delay = self.next_delay();
            tokio::select! {
                _ = tokio::time::sleep(delay) => {}
                _ = shutdown.changed() => break,
            }
            if *shutdown.borrow() {
                break;
            }
            self.refresh_cycle().await;
        }
        debug!("元数据刷新循环退出");
    }

    /// 获取周期锁；已停止时返回 `NotReady`
    async fn enter_cycle(&self) -> ClientResult<tokio::sync::MutexGuard<'_, ()>> {
        let guard = self.cycle.lock().await;
        if self.stopped.load(Ordering::Acquire) {
            return Err(ClientError::NotReady("刷新任务已停止".to_string()));
        }
        Ok(guard)
    }

    async fn refresh_cycle(&self) {
        match self.enter_cycle().await {
            Ok(_cycle) => self.refresh_once().await,
            Err(e) => debug!("跳过刷新: {}", e),
        }
    }

    fn next_delay(&self) -> Duration {
        let jitter_ms = self.options.heartbeat_jitter.as_millis() as u64;
        let jitter = if jitter_ms > 0 {
            rand::thread_rng().gen_range(0..=jitter_ms)
        } else {
            0
        };
        self.options.heartbeat_interval + Duration::from_millis(jitter)
    }

    fn fatal(&self, err: &ClientError) {
        let handler = self.fatal_handler.read().clone();
        handler(err);
    }

    async fn probe(&self) -> ClientResult<()> {
        let _cycle = self.enter_cycle().await?;
        let remote = if self.options.role == ClientRole::Tool {
            None
        } else {
            Some(self.heartbeat().await?.last_update_time_in_ms)
        };
        self.reload().await?;
        if let Some(remote) = remote {
            self.watermark.store(remote, Ordering::Release);
        }
        Ok(())
    }

    async fn reload(&self) -> ClientResult<()> {
        self.load_data().await?;
        if !self.options.skip_config {
            self.load_config().await?;
        }
        Ok(())
    }

    async fn refresh_once(&self) {
        if self.options.role == ClientRole::Tool {
            if let Err(e) = self.reload().await {
                warn!("刷新元数据失败: {}", e);
            }
            return;
        }

        let resp = match self.heartbeat().await {
            Ok(resp) => resp,
            Err(e) if e.is_fatal() => {
                self.fatal(&e);
                return;
            }
            Err(e) => {
                warn!("心跳失败: {}", e);
                return;
            }
        };

        let local = self.watermark.load(Ordering::Acquire);
        if resp.last_update_time_in_ms <= local {
            return;
        }
        info!(
            "元数据已更新 ({} -> {}), 重新加载",
            local, resp.last_update_time_in_ms
        );
        match self.reload().await {
            Ok(()) => self
                .watermark
                .store(resp.last_update_time_in_ms, Ordering::Release),
            Err(e) => warn!("重新加载元数据失败, 保留旧缓存: {}", e),
        }
    }

    async fn heartbeat(&self) -> ClientResult<HeartbeatResp> {
        let role = self.options.role;
        let leader_parts = match (&self.listener, role) {
            (Some(listener), ClientRole::Storage) => {
                let mut leader_parts = LeaderParts::new();
                listener.fetch_leader_info(&mut leader_parts);
                Some(leader_parts)
            }
            _ => None,
        };
        let req = HeartbeatReq {
            host: self.options.local_host.clone(),
            role,
            cluster_id: self.cluster_id.load(Ordering::Acquire),
            leader_parts,
            version: env!("CARGO_PKG_VERSION").to_string(),
        };

        let resp = self.client.heartbeat(req).await?;
        if role == ClientRole::Storage
            && self.cluster_id.load(Ordering::Acquire) == 0
            && resp.cluster_id != 0
        {
            self.cluster_id_file
                .persist(resp.cluster_id)
                .map_err(|e| ClientError::Fatal(format!("持久化集群 ID 失败: {}", e)))?;
            self.cluster_id.store(resp.cluster_id, Ordering::Release);
        }
        Ok(resp)
    }

    async fn load_data(&self) -> ClientResult<()> {
        let client = &self.client;
        let (spaces, hosts) = futures::try_join!(client.list_spaces(), client.list_hosts())?;
        let mut snapshots = Vec::with_capacity(spaces.len());
        for space in spaces {
            let space_id = space.space_id;
            let (desc, parts, tag_schemas, edge_schemas, tag_indexes, edge_indexes) = futures::try_join!(
                client.get_space(space_id),
                client.get_parts_alloc(space_id),
                client.list_tag_schemas(space_id),
                client.list_edge_schemas(space_id),
                client.list_tag_indexes(space_id),
                client.list_edge_indexes(space_id)
            )?;
            let mut data = SpaceData::new(desc, parts);
            data.tag_schemas = tag_schemas;
            data.edge_schemas = edge_schemas;
            data.tag_indexes = tag_indexes;
            data.edge_indexes = edge_indexes;
            snapshots.push(SpaceSnapshot::build(space_id, data));
        }

        let new_cache = Arc::new(LocalCache::new(snapshots));
        let old_cache = self.directory.replace(Arc::clone(&new_cache));
        for space_id in old_cache.space_ids() {
            if !new_cache.contains(space_id) {
                self.leaders.invalidate_space(space_id);
            }
        }
        let seeded = self.seed_leaders(&new_cache, &hosts);
        self.diff(&old_cache, &new_cache);
        info!(
            "元数据加载完成, 共 {} 个空间, 载入 {} 个分区 leader",
            new_cache.len(),
            seeded
        );
        Ok(())
    }

    /// 用存储主机心跳上报的 leader 分布填充 leader 缓存
    ///
    /// 只接受在线主机，且该主机仍在分区副本列表中的条目。
    fn seed_leaders(&self, cache: &LocalCache, hosts: &[HostItem]) -> usize {
        let mut leaders: Vec<((GraphSpaceID, PartitionID), HostAddr)> = Vec::new();
        for item in hosts {
            if item.status != HostStatus::Online {
                continue;
            }
            for (space_id, parts) in &item.leader_parts {
                let Ok(space) = cache.space(*space_id) else {
                    continue;
                };
                for part_id in parts {
                    let is_replica = space
                        .parts_alloc()
                        .get(part_id)
                        .map_or(false, |replicas| replicas.contains(&item.host));
                    if is_replica {
                        leaders.push(((*space_id, *part_id), item.host.clone()));
                    } else {
                        debug!(
                            "忽略不在副本列表中的 leader: space={}, part={}, host={}",
                            space_id, part_id, item.host
                        );
                    }
                }
            }
        }
        let count = leaders.len();
        self.leaders.extend(leaders);
        count
    }

    fn diff(&self, old: &LocalCache, new: &LocalCache) {
        let Some(listener) = &self.listener else {
            return;
        };
        let local = &self.options.local_host;
        let old_view = old.parts_on_host(local);
        let new_view = new.parts_on_host(local);

        for (space_id, old_parts) in &old_view {
            if new_view.contains_key(space_id) {
                continue;
            }
            info!("空间 {} 已从本机移除", space_id);
            for part_id in old_parts.keys() {
                listener.on_part_removed(*space_id, *part_id);
            }
            listener.on_space_removed(*space_id);
        }

        for (space_id, new_parts) in &new_view {
            let Some(old_parts) = old_view.get(space_id) else {
                info!("本机新增空间 {}", space_id);
                listener.on_space_added(*space_id);
                for (part_id, hosts) in new_parts {
                    listener.on_part_added(&PartHosts::new(*space_id, *part_id, hosts.clone()));
                }
                continue;
            };

            for (part_id, hosts) in new_parts {
                match old_parts.get(part_id) {
                    None => {
                        listener.on_part_added(&PartHosts::new(*space_id, *part_id, hosts.clone()))
                    }
                    Some(old_hosts) if old_hosts != hosts => {
                        listener.on_part_updated(&PartHosts::new(*space_id, *part_id, hosts.clone()))
                    }
                    Some(_) => {}
                }
            }
            for part_id in old_parts.keys() {
                if !new_parts.contains_key(part_id) {
                    listener.on_part_removed(*space_id, *part_id);
                }
            }
        }
    }

    async fn load_config(&self) -> ClientResult<()> {
        let items = self
            .client
            .list_configs(self.options.role.config_module())
            .await?;
        let configs: HashMap<String, ConfigItem> = items
            .into_iter()
            .map(|item| (item.name.clone(), item))
            .collect();
        let count = configs.len();
        let old = self.directory.replace_configs(configs);
        let new = self.directory.configs();
        self.notify_space_options(&old, &new);
        debug!("配置项加载完成, 共 {} 项", count);
        Ok(())
    }

    fn notify_space_options(
        &self,
        old: &HashMap<String, ConfigItem>,
        new: &HashMap<String, ConfigItem>,
    ) {
        let Some(listener) = &self.listener else {
            return;
        };
        for name in SPACE_OPTION_NAMES {
            let Some(item) = new.get(name) else {
                continue;
            };
            if old.get(name).map(|o| &o.value) == Some(&item.value) {
                continue;
            }
            let Some(object) = item.value.as_object() else {
                warn!("配置项 {} 不是键值表, 已忽略", name);
                continue;
            };
            let options: HashMap<String, String> = object
                .iter()
                .map(|(key, value)| {
                    let value = match value {
                        serde_json::Value::String(s) => s.clone(),
                        other => other.to_string(),
                    };
                    (key.clone(), value)
                })
                .collect();

            let spaces: Vec<GraphSpaceID> = self
                .directory
                .parts_on_host(&self.options.local_host)
                .into_keys()
                .collect();
            for space_id in spaces {
                listener.on_space_option_updated(space_id, &options);
            }
        }
    }
}
