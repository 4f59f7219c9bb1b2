//! 集成测试共享工具模块
//!
//! 提供模拟的元数据服务、可编排的存储服务和记录事件的监听者

#![allow(dead_code)]

use async_trait::async_trait;
use parking_lot::Mutex;
use std::collections::{BTreeMap, HashMap, HashSet, VecDeque};
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use graphdb_client::client::{
    PartitionResult, PartitionedBatch, PartitionedRequest, RemoteProcedure, StorageResponse,
};
use graphdb_client::config::{ClientOptions, ClientRole};
use graphdb_client::core::types::{
    EdgeSchemaItem, IndexItem, PartsMap, Schema, SpaceDesc, TagSchemaItem,
};
use graphdb_client::core::{
    ClientError, ClientResult, ErrorCode, GraphSpaceID, HostAddr, PartHosts, PartitionID,
};
use graphdb_client::meta::{
    ConfigItem, HeartbeatReq, HeartbeatResp, HostItem, HostStatus, LeaderInfo, LeaderParts,
    ListConfigsReq, ListHostsReq, ListSpacesReq, LocalCache, MetaChangedListener, MetaResponse,
    MetaService, SpaceData, SpaceIdName, SpaceReq, SpaceSnapshot,
};

pub fn host(name: &str) -> HostAddr {
    HostAddr::new(name, 9779)
}

pub fn meta_host(name: &str) -> HostAddr {
    HostAddr::new(name, 9559)
}

/// 测试用运行参数，间隔都缩短到毫秒级
pub fn test_options(role: ClientRole, local: HostAddr, cluster_id_path: &Path) -> ClientOptions {
    let mut options = ClientOptions::new(vec![meta_host("m1")], local, role);
    options.retry_interval = Duration::from_millis(10);
    options.heartbeat_interval = Duration::from_millis(20);
    options.heartbeat_jitter = Duration::from_millis(5);
    options.rpc_timeout = Duration::from_secs(5);
    options.cluster_id_path = cluster_id_path.to_path_buf();
    options.ready_retry = 3;
    options
}

/// 分区号 -> 副本列表
pub fn parts_of(alloc: &[(PartitionID, &[&str])]) -> PartsMap {
    alloc
        .iter()
        .map(|(part_id, hosts)| (*part_id, hosts.iter().map(|h| host(h)).collect()))
        .collect()
}

/// 直接构建一份目录快照
pub fn build_cache(spaces: &[(GraphSpaceID, &str, PartsMap)]) -> LocalCache {
    LocalCache::new(spaces.iter().map(|(space_id, name, parts)| {
        SpaceSnapshot::build(
            *space_id,
            SpaceData::new(SpaceDesc::new(*name, parts.len() as i32, 3), parts.clone()),
        )
    }))
}

// ==================== 模拟元数据服务 ====================

#[derive(Default)]
struct MetaState {
    spaces: BTreeMap<GraphSpaceID, SpaceData>,
    configs: Vec<ConfigItem>,
    cluster_id: i64,
    last_update: i64,
    leader: Option<HostAddr>,
    down: HashSet<HostAddr>,
    fail_list_configs: bool,
    /// 由存储主机心跳上报或直接设置的分区 leader
    part_leaders: BTreeMap<(GraphSpaceID, PartitionID), HostAddr>,
    offline: HashSet<HostAddr>,
    list_spaces_delay: Option<Duration>,
    heartbeats: Vec<HeartbeatReq>,
    calls: Vec<HostAddr>,
    list_spaces_calls: usize,
}

/// 内存中的元数据服务
#[derive(Default)]
pub struct MockMetaService {
    state: Mutex<MetaState>,
}

impl MockMetaService {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// 新增或覆盖空间，并推进元数据更新时间
    pub fn put_space(&self, space_id: GraphSpaceID, name: &str, parts: PartsMap) {
        let mut state = self.state.lock();
        let mut data = SpaceData::new(SpaceDesc::new(name, parts.len() as i32, 3), parts);
        data.tag_schemas = vec![TagSchemaItem {
            tag_id: 1,
            tag_name: "person".to_string(),
            schema: Schema::new(0, vec![]),
        }];
        state.spaces.insert(space_id, data);
        state.last_update += 1;
    }

    pub fn remove_space(&self, space_id: GraphSpaceID) {
        let mut state = self.state.lock();
        state.spaces.remove(&space_id);
        state.last_update += 1;
    }

    pub fn set_configs(&self, configs: Vec<ConfigItem>) {
        let mut state = self.state.lock();
        state.configs = configs;
        state.last_update += 1;
    }

    pub fn set_cluster_id(&self, cluster_id: i64) {
        self.state.lock().cluster_id = cluster_id;
    }

    pub fn set_leader(&self, leader: Option<HostAddr>) {
        self.state.lock().leader = leader;
    }

    pub fn set_down(&self, host: &HostAddr, down: bool) {
        let mut state = self.state.lock();
        if down {
            state.down.insert(host.clone());
        } else {
            state.down.remove(host);
        }
    }

    pub fn set_fail_list_configs(&self, fail: bool) {
        self.state.lock().fail_list_configs = fail;
    }

    pub fn set_part_leader(&self, space_id: GraphSpaceID, part_id: PartitionID, leader: HostAddr) {
        self.state.lock().part_leaders.insert((space_id, part_id), leader);
    }

    /// 把存储主机标记为离线，`list_hosts` 中仍返回它
    pub fn set_offline(&self, host: &HostAddr) {
        self.state.lock().offline.insert(host.clone());
    }

    /// `list_spaces` 应答前等待的时间
    pub fn set_list_spaces_delay(&self, delay: Duration) {
        self.state.lock().list_spaces_delay = Some(delay);
    }

    pub fn last_update(&self) -> i64 {
        self.state.lock().last_update
    }

    pub fn heartbeats(&self) -> Vec<HeartbeatReq> {
        self.state.lock().heartbeats.clone()
    }

    pub fn calls(&self) -> Vec<HostAddr> {
        self.state.lock().calls.clone()
    }

    pub fn list_spaces_calls(&self) -> usize {
        self.state.lock().list_spaces_calls
    }

    fn serve<T: Default>(
        &self,
        host: &HostAddr,
        f: impl FnOnce(&mut MetaState) -> MetaResponse<T>,
    ) -> ClientResult<MetaResponse<T>> {
        let mut state = self.state.lock();
        state.calls.push(host.clone());
        if state.down.contains(host) {
            return Err(ClientError::RpcFailed(format!("连接 {} 失败", host)));
        }
        if let Some(leader) = &state.leader {
            if leader != host {
                return Ok(MetaResponse::leader_changed(Some(leader.clone())));
            }
        }
        Ok(f(&mut state))
    }

    fn with_space<T: Default>(
        &self,
        host: &HostAddr,
        space_id: GraphSpaceID,
        f: impl FnOnce(&SpaceData) -> T,
    ) -> ClientResult<MetaResponse<T>> {
        self.serve(host, |state| match state.spaces.get(&space_id) {
            Some(data) => MetaResponse::ok(f(data)),
            None => MetaResponse::error(ErrorCode::SpaceNotFound),
        })
    }
}

#[async_trait]
impl MetaService for MockMetaService {
    async fn heartbeat(
        &self,
        host: &HostAddr,
        req: HeartbeatReq,
    ) -> ClientResult<MetaResponse<HeartbeatResp>> {
        self.serve(host, |state| {
            if let Some(leader_parts) = &req.leader_parts {
                for (space_id, infos) in leader_parts {
                    for info in infos {
                        state
                            .part_leaders
                            .insert((*space_id, info.part_id), req.host.clone());
                    }
                }
            }
            state.heartbeats.push(req);
            MetaResponse::ok(HeartbeatResp {
                cluster_id: state.cluster_id,
                last_update_time_in_ms: state.last_update,
            })
        })
    }

    async fn list_spaces(
        &self,
        host: &HostAddr,
        _req: ListSpacesReq,
    ) -> ClientResult<MetaResponse<Vec<SpaceIdName>>> {
        let delay = self.state.lock().list_spaces_delay;
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
        self.serve(host, |state| {
            state.list_spaces_calls += 1;
            MetaResponse::ok(
                state
                    .spaces
                    .iter()
                    .map(|(space_id, data)| SpaceIdName {
                        space_id: *space_id,
                        space_name: data.desc.space_name.clone(),
                    })
                    .collect(),
            )
        })
    }

    async fn get_space(
        &self,
        host: &HostAddr,
        req: SpaceReq,
    ) -> ClientResult<MetaResponse<SpaceDesc>> {
        self.with_space(host, req.space_id, |data| data.desc.clone())
    }

    async fn get_parts_alloc(
        &self,
        host: &HostAddr,
        req: SpaceReq,
    ) -> ClientResult<MetaResponse<PartsMap>> {
        self.with_space(host, req.space_id, |data| data.parts.clone())
    }

    async fn list_tag_schemas(
        &self,
        host: &HostAddr,
        req: SpaceReq,
    ) -> ClientResult<MetaResponse<Vec<TagSchemaItem>>> {
        self.with_space(host, req.space_id, |data| data.tag_schemas.clone())
    }

    async fn list_edge_schemas(
        &self,
        host: &HostAddr,
        req: SpaceReq,
    ) -> ClientResult<MetaResponse<Vec<EdgeSchemaItem>>> {
        self.with_space(host, req.space_id, |data| data.edge_schemas.clone())
    }

    async fn list_tag_indexes(
        &self,
        host: &HostAddr,
        req: SpaceReq,
    ) -> ClientResult<MetaResponse<Vec<IndexItem>>> {
        self.with_space(host, req.space_id, |data| data.tag_indexes.clone())
    }

    async fn list_edge_indexes(
        &self,
        host: &HostAddr,
        req: SpaceReq,
    ) -> ClientResult<MetaResponse<Vec<IndexItem>>> {
        self.with_space(host, req.space_id, |data| data.edge_indexes.clone())
    }

    async fn list_configs(
        &self,
        host: &HostAddr,
        req: ListConfigsReq,
    ) -> ClientResult<MetaResponse<Vec<ConfigItem>>> {
        self.serve(host, |state| {
            if state.fail_list_configs {
                return MetaResponse::error(ErrorCode::StoreFailure);
            }
            MetaResponse::ok(
                state
                    .configs
                    .iter()
                    .filter(|item| item.module == req.module)
                    .cloned()
                    .collect(),
            )
        })
    }

    async fn list_hosts(
        &self,
        host: &HostAddr,
        _req: ListHostsReq,
    ) -> ClientResult<MetaResponse<Vec<HostItem>>> {
        self.serve(host, |state| {
            let mut items: BTreeMap<HostAddr, HostItem> = BTreeMap::new();
            for ((space_id, part_id), leader) in &state.part_leaders {
                let item = items
                    .entry(leader.clone())
                    .or_insert_with(|| HostItem::new(leader.clone()));
                if state.offline.contains(leader) {
                    item.status = HostStatus::Offline;
                }
                item.leader_parts.entry(*space_id).or_default().push(*part_id);
            }
            MetaResponse::ok(items.into_values().collect())
        })
    }
}

// ==================== 可编排的存储服务 ====================

/// 某台主机对某个分区的一次应答
#[derive(Debug, Clone)]
pub enum PartReply {
    Ok,
    LeaderChanged(Option<HostAddr>),
    Fail(ErrorCode),
}

/// 存储服务的 getProps：请求按分区携带点 ID，应答回显成功分区的点 ID
pub type GetPropsRequest = PartitionedBatch<i64>;
pub type GetPropsResponse = StorageResponse<Vec<(PartitionID, i64)>>;

#[derive(Default)]
struct StorageScript {
    replies: HashMap<(HostAddr, PartitionID), VecDeque<PartReply>>,
    down: HashSet<HostAddr>,
    delays: HashMap<HostAddr, Duration>,
    calls: Vec<(HostAddr, Vec<PartitionID>)>,
}

#[derive(Default)]
pub struct ScriptedStorage {
    script: Mutex<StorageScript>,
}

impl ScriptedStorage {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// 为 (主机, 分区) 追加一次应答；脚本用完后默认成功
    pub fn push_reply(&self, host: &HostAddr, part_id: PartitionID, reply: PartReply) {
        self.script
            .lock()
            .replies
            .entry((host.clone(), part_id))
            .or_default()
            .push_back(reply);
    }

    /// 之后对 (主机, 分区) 的每次调用都返回同一应答
    pub fn always(&self, host: &HostAddr, part_id: PartitionID, reply: PartReply, times: usize) {
        for _ in 0..times {
            self.push_reply(host, part_id, reply.clone());
        }
    }

    pub fn set_down(&self, host: &HostAddr) {
        self.script.lock().down.insert(host.clone());
    }

    pub fn set_delay(&self, host: &HostAddr, delay: Duration) {
        self.script.lock().delays.insert(host.clone(), delay);
    }

    pub fn calls(&self) -> Vec<(HostAddr, Vec<PartitionID>)> {
        self.script.lock().calls.clone()
    }

    /// 包含某个分区的调用次数
    pub fn calls_for_part(&self, part_id: PartitionID) -> usize {
        self.script
            .lock()
            .calls
            .iter()
            .filter(|(_, parts)| parts.contains(&part_id))
            .count()
    }
}

#[async_trait]
impl RemoteProcedure for ScriptedStorage {
    type Request = GetPropsRequest;
    type Response = GetPropsResponse;

    fn name(&self) -> &'static str {
        "getProps"
    }

    async fn call(&self, host: &HostAddr, request: GetPropsRequest) -> ClientResult<GetPropsResponse> {
        let delay = {
            let mut script = self.script.lock();
            script.calls.push((host.clone(), request.parts()));
            if script.down.contains(host) {
                return Err(ClientError::RpcFailed(format!("连接 {} 被拒绝", host)));
            }
            script.delays.get(host).copied()
        };
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }

        let mut script = self.script.lock();
        let mut data = Vec::new();
        let mut failed = Vec::new();
        for (part_id, vids) in &request.parts {
            let reply = script
                .replies
                .get_mut(&(host.clone(), *part_id))
                .and_then(|queue| queue.pop_front())
                .unwrap_or(PartReply::Ok);
            match reply {
                PartReply::Ok => data.extend(vids.iter().map(|vid| (*part_id, *vid))),
                PartReply::LeaderChanged(leader) => {
                    failed.push(PartitionResult::leader_changed(*part_id, leader))
                }
                PartReply::Fail(code) => failed.push(PartitionResult::new(*part_id, code)),
            }
        }
        Ok(StorageResponse::ok(data)
            .with_failed_parts(failed)
            .with_latency(100))
    }
}

// ==================== 记录事件的监听者 ====================

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ListenerEvent {
    SpaceAdded(GraphSpaceID),
    SpaceRemoved(GraphSpaceID),
    PartAdded(GraphSpaceID, PartitionID),
    PartRemoved(GraphSpaceID, PartitionID),
    PartUpdated(GraphSpaceID, PartitionID),
    SpaceOptionUpdated(GraphSpaceID, BTreeMap<String, String>),
}

#[derive(Default)]
pub struct RecordingListener {
    events: Mutex<Vec<ListenerEvent>>,
    leader_parts: Mutex<LeaderParts>,
}

impl RecordingListener {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn events(&self) -> Vec<ListenerEvent> {
        self.events.lock().clone()
    }

    pub fn take_events(&self) -> Vec<ListenerEvent> {
        std::mem::take(&mut *self.events.lock())
    }

    pub fn set_leader_parts(&self, space_id: GraphSpaceID, parts: &[PartitionID]) {
        self.leader_parts.lock().insert(
            space_id,
            parts
                .iter()
                .map(|part_id| LeaderInfo {
                    part_id: *part_id,
                    term: 1,
                })
                .collect(),
        );
    }

    fn record(&self, event: ListenerEvent) {
        self.events.lock().push(event);
    }
}

impl MetaChangedListener for RecordingListener {
    fn on_space_added(&self, space_id: GraphSpaceID) {
        self.record(ListenerEvent::SpaceAdded(space_id));
    }

    fn on_space_removed(&self, space_id: GraphSpaceID) {
        self.record(ListenerEvent::SpaceRemoved(space_id));
    }

    fn on_part_added(&self, part_hosts: &PartHosts) {
        self.record(ListenerEvent::PartAdded(part_hosts.space_id, part_hosts.part_id));
    }

    fn on_part_removed(&self, space_id: GraphSpaceID, part_id: PartitionID) {
        self.record(ListenerEvent::PartRemoved(space_id, part_id));
    }

    fn on_part_updated(&self, part_hosts: &PartHosts) {
        self.record(ListenerEvent::PartUpdated(part_hosts.space_id, part_hosts.part_id));
    }

    fn on_space_option_updated(&self, space_id: GraphSpaceID, options: &HashMap<String, String>) {
        let options = options
            .iter()
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect();
        self.record(ListenerEvent::SpaceOptionUpdated(space_id, options));
    }

    fn fetch_leader_info(&self, leader_parts: &mut LeaderParts) {
        *leader_parts = self.leader_parts.lock().clone();
    }
}

/// 等待条件成立，超时返回 false
pub async fn wait_until<F: Fn() -> bool>(timeout: Duration, condition: F) -> bool {
    let deadline = tokio::time::Instant::now() + timeout;
    while tokio::time::Instant::now() < deadline {
        if condition() {
            return true;
        }
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
    condition()
}
