//! 分区目录
//!
//! 持有当前生效的 `LocalCache` 快照。刷新线程是唯一的写者，每次整体替换快照引用；
//! 读者拿到 `Arc` 后立即释放锁，之后看到的数据不会被并发修改。

use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::Arc;

use super::snapshot::{LocalCache, LocalPartsView, SpaceSnapshot};
use super::types::ConfigItem;
use crate::core::error::{ClientError, ClientResult};
use crate::core::types::{
    EdgeType, GraphSpaceID, HostAddr, IndexID, IndexItem, PartHosts, PartitionID, Schema,
    SchemaVer, TagID, VidType,
};

#[derive(Debug, Default)]
pub struct PartitionDirectory {
    cache: RwLock<Arc<LocalCache>>,
    configs: RwLock<Arc<HashMap<String, ConfigItem>>>,
}

impl PartitionDirectory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_cache(cache: LocalCache) -> Self {
        Self {
            cache: RwLock::new(Arc::new(cache)),
            configs: RwLock::new(Arc::new(HashMap::new())),
        }
    }

    /// 当前快照
    pub fn snapshot(&self) -> Arc<LocalCache> {
        self.cache.read().clone()
    }

    /// 整体替换快照，返回旧快照
    pub fn replace(&self, cache: Arc<LocalCache>) -> Arc<LocalCache> {
        let mut guard = self.cache.write();
        std::mem::replace(&mut *guard, cache)
    }

    /// 清空缓存，用于关闭客户端
    pub fn clear(&self) {
        self.replace(Arc::new(LocalCache::default()));
        *self.configs.write() = Arc::new(HashMap::new());
    }

    pub fn space(&self, space_id: GraphSpaceID) -> ClientResult<Arc<SpaceSnapshot>> {
        self.snapshot().space(space_id)
    }

    pub fn check_space_exists(&self, space_id: GraphSpaceID) -> bool {
        self.snapshot().contains(space_id)
    }

    pub fn check_part_exists(&self, space_id: GraphSpaceID, part_id: PartitionID) -> bool {
        self.space(space_id)
            .map(|space| space.parts_alloc().contains_key(&part_id))
            .unwrap_or(false)
    }

    pub fn get_part_hosts(
        &self,
        space_id: GraphSpaceID,
        part_id: PartitionID,
    ) -> ClientResult<PartHosts> {
        self.space(space_id)?.get_part_hosts(part_id)
    }

    pub fn parts_num(&self, space_id: GraphSpaceID) -> ClientResult<i32> {
        Ok(self.space(space_id)?.parts_num())
    }

    pub fn part_id(&self, space_id: GraphSpaceID, key: &[u8]) -> ClientResult<PartitionID> {
        self.space(space_id)?.part_id(key)
    }

    pub fn space_id_by_name(&self, name: &str) -> ClientResult<GraphSpaceID> {
        self.snapshot().space_id_by_name(name)
    }

    pub fn space_name(&self, space_id: GraphSpaceID) -> ClientResult<String> {
        Ok(self.space(space_id)?.space_name().to_string())
    }

    pub fn space_vid_len(&self, space_id: GraphSpaceID) -> ClientResult<i32> {
        Ok(self.space(space_id)?.vid_len())
    }

    pub fn space_vid_type(&self, space_id: GraphSpaceID) -> ClientResult<VidType> {
        Ok(self.space(space_id)?.vid_type())
    }

    pub fn tag_id_by_name(&self, space_id: GraphSpaceID, name: &str) -> ClientResult<TagID> {
        self.space(space_id)?.tag_id(name)
    }

    pub fn tag_name(&self, space_id: GraphSpaceID, tag_id: TagID) -> ClientResult<String> {
        Ok(self.space(space_id)?.tag_name(tag_id)?.to_string())
    }

    pub fn edge_type_by_name(&self, space_id: GraphSpaceID, name: &str) -> ClientResult<EdgeType> {
        self.space(space_id)?.edge_type(name)
    }

    pub fn edge_name(&self, space_id: GraphSpaceID, edge_type: EdgeType) -> ClientResult<String> {
        Ok(self.space(space_id)?.edge_name(edge_type)?.to_string())
    }

    pub fn all_edge_names(&self, space_id: GraphSpaceID) -> ClientResult<Vec<String>> {
        Ok(self.space(space_id)?.all_edge_names())
    }

    pub fn tag_schema(
        &self,
        space_id: GraphSpaceID,
        tag_id: TagID,
        ver: SchemaVer,
    ) -> ClientResult<Arc<Schema>> {
        self.space(space_id)?.tag_schema(tag_id, ver)
    }

    pub fn edge_schema(
        &self,
        space_id: GraphSpaceID,
        edge_type: EdgeType,
        ver: SchemaVer,
    ) -> ClientResult<Arc<Schema>> {
        self.space(space_id)?.edge_schema(edge_type, ver)
    }

    pub fn latest_tag_version(&self, space_id: GraphSpaceID, tag_id: TagID) -> ClientResult<SchemaVer> {
        self.space(space_id)?.latest_tag_version(tag_id)
    }

    pub fn latest_edge_version(
        &self,
        space_id: GraphSpaceID,
        edge_type: EdgeType,
    ) -> ClientResult<SchemaVer> {
        self.space(space_id)?.latest_edge_version(edge_type)
    }

    pub fn tag_index(&self, space_id: GraphSpaceID, index_id: IndexID) -> ClientResult<Arc<IndexItem>> {
        self.space(space_id)?.tag_index(index_id)
    }

    pub fn edge_index(&self, space_id: GraphSpaceID, index_id: IndexID) -> ClientResult<Arc<IndexItem>> {
        self.space(space_id)?.edge_index(index_id)
    }

    pub fn tag_indexes(&self, space_id: GraphSpaceID) -> ClientResult<Vec<Arc<IndexItem>>> {
        Ok(self.space(space_id)?.tag_indexes())
    }

    pub fn edge_indexes(&self, space_id: GraphSpaceID) -> ClientResult<Vec<Arc<IndexItem>>> {
        Ok(self.space(space_id)?.edge_indexes())
    }

    /// 某台主机在各空间持有的分区
    pub fn parts_on_host(&self, host: &HostAddr) -> LocalPartsView {
        self.snapshot().parts_on_host(host)
    }

    pub fn configs(&self) -> Arc<HashMap<String, ConfigItem>> {
        self.configs.read().clone()
    }

    pub fn replace_configs(
        &self,
        configs: HashMap<String, ConfigItem>,
    ) -> Arc<HashMap<String, ConfigItem>> {
        let mut guard = self.configs.write();
        std::mem::replace(&mut *guard, Arc::new(configs))
    }

    pub fn config(&self, name: &str) -> ClientResult<ConfigItem> {
        self.configs
            .read()
            .get(name)
            .cloned()
            .ok_or_else(|| ClientError::config_not_found(name))
    }
}
