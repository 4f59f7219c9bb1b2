//! 元数据缓存快照
//!
//! `SpaceSnapshot` 和 `LocalCache` 一经发布便不再修改。刷新时构建全新的对象并整体替换，
//! 持有旧快照引用的读者看到的始终是一份自洽的数据。

use log::warn;
use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

use crate::core::error::{ClientError, ClientResult};
use crate::core::types::{
    build_host_parts_index, part_id_of, EdgeSchemaItem, EdgeType, GraphSpaceID, HostAddr,
    HostPartsIndex, IndexID, IndexItem, PartHosts, PartitionID, PartsMap, Schema, SchemaVer,
    SpaceDesc, TagID, TagSchemaItem, VidType,
};

/// 某个标签/边类型的全部 Schema 版本，下标即版本号，缺失的版本为 `None`
pub type SchemaVersions = Arc<Vec<Option<Arc<Schema>>>>;

/// 本机视角的分区分布：空间 -> 分区 -> 副本列表
pub type LocalPartsView = BTreeMap<GraphSpaceID, BTreeMap<PartitionID, Vec<HostAddr>>>;

/// 从元数据服务拉取的单个空间原始数据
#[derive(Debug, Clone)]
pub struct SpaceData {
    pub desc: SpaceDesc,
    pub parts: PartsMap,
    pub tag_schemas: Vec<TagSchemaItem>,
    pub edge_schemas: Vec<EdgeSchemaItem>,
    pub tag_indexes: Vec<IndexItem>,
    pub edge_indexes: Vec<IndexItem>,
}

impl SpaceData {
    pub fn new(desc: SpaceDesc, parts: PartsMap) -> Self {
        Self {
            desc,
            parts,
            tag_schemas: Vec::new(),
            edge_schemas: Vec::new(),
            tag_indexes: Vec::new(),
            edge_indexes: Vec::new(),
        }
    }
}

/// 单个空间的不可变快照
#[derive(Debug)]
pub struct SpaceSnapshot {
    space_id: GraphSpaceID,
    desc: SpaceDesc,
    parts_num: i32,
    parts_alloc: PartsMap,
    parts_on_host: HostPartsIndex,
    tag_schemas: HashMap<TagID, SchemaVersions>,
    edge_schemas: HashMap<EdgeType, SchemaVersions>,
    newest_tag_ver: HashMap<TagID, SchemaVer>,
    newest_edge_ver: HashMap<EdgeType, SchemaVer>,
    tag_ids: HashMap<String, TagID>,
    tag_names: HashMap<TagID, String>,
    edge_types: HashMap<String, EdgeType>,
    edge_names: HashMap<EdgeType, String>,
    tag_indexes: HashMap<IndexID, Arc<IndexItem>>,
    edge_indexes: HashMap<IndexID, Arc<IndexItem>>,
}

/// 把多版本条目整理为下标即版本号的数组
fn build_versions<I>(items: I) -> (HashMap<i32, SchemaVersions>, HashMap<i32, SchemaVer>)
where
    I: IntoIterator<Item = (i32, Schema)>,
{
    let mut grouped: HashMap<i32, Vec<Option<Arc<Schema>>>> = HashMap::new();
    for (id, schema) in items {
        if schema.version < 0 {
            warn!("忽略非法的Schema版本: id={}, version={}", id, schema.version);
            continue;
        }
        let version = schema.version as usize;
        let versions = grouped.entry(id).or_default();
        if versions.len() <= version {
            versions.resize(version + 1, None);
        }
        versions[version] = Some(Arc::new(schema));
    }

    let newest = grouped
        .iter()
        .map(|(id, versions)| (*id, versions.len() as SchemaVer - 1))
        .collect();
    let arrays = grouped
        .into_iter()
        .map(|(id, versions)| (id, Arc::new(versions)))
        .collect();
    (arrays, newest)
}

fn pick_version(
    versions: Option<&SchemaVersions>,
    ver: SchemaVer,
) -> Option<Arc<Schema>> {
    let versions = versions?;
    let index = if ver < 0 {
        versions.len().checked_sub(1)?
    } else {
        ver as usize
    };
    versions.get(index).cloned().flatten()
}

impl SpaceSnapshot {
    /// 由原始数据构建快照
    ///
    /// 分区分布与其逆索引在这里一并生成；副本列表为空的分区不进入分布，
    /// 但仍计入分区数，对它的查找返回 `PartNotFound`。
    pub fn build(space_id: GraphSpaceID, data: SpaceData) -> Self {
        let SpaceData {
            desc,
            parts,
            tag_schemas,
            edge_schemas,
            tag_indexes,
            edge_indexes,
        } = data;

        // 空间描述里的分区数为准，缺失时取未过滤的分配数
        let parts_num = if desc.partition_num > 0 {
            desc.partition_num
        } else {
            parts.len() as i32
        };
        let parts_alloc: PartsMap = parts
            .into_iter()
            .filter(|(part_id, hosts)| {
                if hosts.is_empty() {
                    warn!("空间 {} 的分区 {} 没有副本, 已忽略", space_id, part_id);
                }
                !hosts.is_empty()
            })
            .collect();
        let parts_on_host = build_host_parts_index(&parts_alloc);

        let mut tag_ids = HashMap::new();
        let mut tag_names = HashMap::new();
        for item in &tag_schemas {
            tag_ids.insert(item.tag_name.clone(), item.tag_id);
            tag_names.insert(item.tag_id, item.tag_name.clone());
        }
        let mut edge_types = HashMap::new();
        let mut edge_names = HashMap::new();
        for item in &edge_schemas {
            edge_types.insert(item.edge_name.clone(), item.edge_type);
            edge_names.insert(item.edge_type, item.edge_name.clone());
        }

        let (tag_schemas, newest_tag_ver) =
            build_versions(tag_schemas.into_iter().map(|item| (item.tag_id, item.schema)));
        let (edge_schemas, newest_edge_ver) = build_versions(
            edge_schemas
                .into_iter()
                .map(|item| (item.edge_type, item.schema)),
        );

        Self {
            space_id,
            desc,
            parts_num,
            parts_alloc,
            parts_on_host,
            tag_schemas,
            edge_schemas,
            newest_tag_ver,
            newest_edge_ver,
            tag_ids,
            tag_names,
            edge_types,
            edge_names,
            tag_indexes: tag_indexes
                .into_iter()
                .map(|item| (item.index_id, Arc::new(item)))
                .collect(),
            edge_indexes: edge_indexes
                .into_iter()
                .map(|item| (item.index_id, Arc::new(item)))
                .collect(),
        }
    }

    pub fn space_id(&self) -> GraphSpaceID {
        self.space_id
    }

    pub fn space_name(&self) -> &str {
        &self.desc.space_name
    }

    pub fn desc(&self) -> &SpaceDesc {
        &self.desc
    }

    pub fn vid_len(&self) -> i32 {
        self.desc.vid_len
    }

    pub fn vid_type(&self) -> VidType {
        self.desc.vid_type
    }

    /// 路由取模使用的分区数，不受副本列表是否为空影响
    pub fn parts_num(&self) -> i32 {
        self.parts_num
    }

    pub fn parts_alloc(&self) -> &PartsMap {
        &self.parts_alloc
    }

    /// 某台主机上的分区，升序
    pub fn parts_on(&self, host: &HostAddr) -> &[PartitionID] {
        self.parts_on_host
            .get(host)
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    pub fn hosts(&self) -> impl Iterator<Item = &HostAddr> {
        self.parts_on_host.keys()
    }

    pub fn get_part_hosts(&self, part_id: PartitionID) -> ClientResult<PartHosts> {
        self.parts_alloc
            .get(&part_id)
            .map(|hosts| PartHosts::new(self.space_id, part_id, hosts.clone()))
            .ok_or_else(|| ClientError::part_not_found(self.space_id, part_id))
    }

    pub fn part_id(&self, key: &[u8]) -> ClientResult<PartitionID> {
        if self.parts_num <= 0 {
            return Err(ClientError::part_not_found(self.space_id, "any"));
        }
        part_id_of(key, self.parts_num)
    }

    pub fn tag_id(&self, name: &str) -> ClientResult<TagID> {
        self.tag_ids
            .get(name)
            .copied()
            .ok_or_else(|| ClientError::tag_not_found(self.space_id, name))
    }

    pub fn tag_name(&self, tag_id: TagID) -> ClientResult<&str> {
        self.tag_names
            .get(&tag_id)
            .map(String::as_str)
            .ok_or_else(|| ClientError::tag_not_found(self.space_id, tag_id))
    }

    pub fn edge_type(&self, name: &str) -> ClientResult<EdgeType> {
        self.edge_types
            .get(name)
            .copied()
            .ok_or_else(|| ClientError::edge_not_found(self.space_id, name))
    }

    pub fn edge_name(&self, edge_type: EdgeType) -> ClientResult<&str> {
        self.edge_names
            .get(&edge_type)
            .map(String::as_str)
            .ok_or_else(|| ClientError::edge_not_found(self.space_id, edge_type))
    }

    pub fn all_edge_names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.edge_types.keys().cloned().collect();
        names.sort();
        names
    }

    /// 指定版本的标签 Schema，`ver < 0` 表示最新版本
    pub fn tag_schema(&self, tag_id: TagID, ver: SchemaVer) -> ClientResult<Arc<Schema>> {
        pick_version(self.tag_schemas.get(&tag_id), ver)
            .ok_or_else(|| ClientError::tag_not_found(self.space_id, format!("{}@{}", tag_id, ver)))
    }

    pub fn edge_schema(&self, edge_type: EdgeType, ver: SchemaVer) -> ClientResult<Arc<Schema>> {
        pick_version(self.edge_schemas.get(&edge_type), ver).ok_or_else(|| {
            ClientError::edge_not_found(self.space_id, format!("{}@{}", edge_type, ver))
        })
    }

    pub fn tag_versions(&self, tag_id: TagID) -> Option<SchemaVersions> {
        self.tag_schemas.get(&tag_id).cloned()
    }

    pub fn edge_versions(&self, edge_type: EdgeType) -> Option<SchemaVersions> {
        self.edge_schemas.get(&edge_type).cloned()
    }

    pub fn latest_tag_version(&self, tag_id: TagID) -> ClientResult<SchemaVer> {
        self.newest_tag_ver
            .get(&tag_id)
            .copied()
            .ok_or_else(|| ClientError::tag_not_found(self.space_id, tag_id))
    }

    pub fn latest_edge_version(&self, edge_type: EdgeType) -> ClientResult<SchemaVer> {
        self.newest_edge_ver
            .get(&edge_type)
            .copied()
            .ok_or_else(|| ClientError::edge_not_found(self.space_id, edge_type))
    }

    pub fn tag_index(&self, index_id: IndexID) -> ClientResult<Arc<IndexItem>> {
        self.tag_indexes
            .get(&index_id)
            .cloned()
            .ok_or_else(|| ClientError::index_not_found(self.space_id, index_id))
    }

    pub fn edge_index(&self, index_id: IndexID) -> ClientResult<Arc<IndexItem>> {
        self.edge_indexes
            .get(&index_id)
            .cloned()
            .ok_or_else(|| ClientError::index_not_found(self.space_id, index_id))
    }

    pub fn tag_indexes(&self) -> Vec<Arc<IndexItem>> {
        let mut indexes: Vec<_> = self.tag_indexes.values().cloned().collect();
        indexes.sort_by_key(|item| item.index_id);
        indexes
    }

    pub fn edge_indexes(&self) -> Vec<Arc<IndexItem>> {
        let mut indexes: Vec<_> = self.edge_indexes.values().cloned().collect();
        indexes.sort_by_key(|item| item.index_id);
        indexes
    }
}

/// 全部空间的快照
#[derive(Debug, Default)]
pub struct LocalCache {
    spaces: HashMap<GraphSpaceID, Arc<SpaceSnapshot>>,
    space_ids: HashMap<String, GraphSpaceID>,
}

impl LocalCache {
    pub fn new<I>(spaces: I) -> Self
    where
        I: IntoIterator<Item = SpaceSnapshot>,
    {
        let mut cache = Self::default();
        for space in spaces {
            cache
                .space_ids
                .insert(space.space_name().to_string(), space.space_id());
            cache.spaces.insert(space.space_id(), Arc::new(space));
        }
        cache
    }

    pub fn len(&self) -> usize {
        self.spaces.len()
    }

    pub fn is_empty(&self) -> bool {
        self.spaces.is_empty()
    }

    pub fn space(&self, space_id: GraphSpaceID) -> ClientResult<Arc<SpaceSnapshot>> {
        self.spaces
            .get(&space_id)
            .cloned()
            .ok_or_else(|| ClientError::space_not_found(space_id))
    }

    pub fn contains(&self, space_id: GraphSpaceID) -> bool {
        self.spaces.contains_key(&space_id)
    }

    pub fn space_id_by_name(&self, name: &str) -> ClientResult<GraphSpaceID> {
        self.space_ids
            .get(name)
            .copied()
            .ok_or_else(|| ClientError::space_not_found(name))
    }

    /// 空间 ID，升序
    pub fn space_ids(&self) -> Vec<GraphSpaceID> {
        let mut ids: Vec<_> = self.spaces.keys().copied().collect();
        ids.sort_unstable();
        ids
    }

    pub fn spaces(&self) -> impl Iterator<Item = &Arc<SpaceSnapshot>> {
        self.spaces.values()
    }

    /// 某台主机持有的分区及其副本分布
    ///
    /// 借助逆索引，开销与该主机上的分区数成正比；主机在某空间没有分区时，该空间不出现。
    pub fn parts_on_host(&self, host: &HostAddr) -> LocalPartsView {
        let mut view = LocalPartsView::new();
        for (space_id, space) in &self.spaces {
            let parts = space.parts_on(host);
            if parts.is_empty() {
                continue;
            }
            let entry = view.entry(*space_id).or_default();
            for part_id in parts {
                if let Some(hosts) = space.parts_alloc().get(part_id) {
                    entry.insert(*part_id, hosts.clone());
                }
            }
        }
        view
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::types::FieldDef;

    fn host(name: &str) -> HostAddr {
        HostAddr::new(name, 9779)
    }

    fn tag_item(tag_id: TagID, name: &str, version: SchemaVer) -> TagSchemaItem {
        TagSchemaItem {
            tag_id,
            tag_name: name.to_string(),
            schema: Schema::new(version, vec![FieldDef::new(format!("f{}", version), "int")]),
        }
    }

    fn sample_space() -> SpaceSnapshot {
        let mut parts = PartsMap::new();
        parts.insert(1, vec![host("a"), host("b")]);
        parts.insert(2, vec![host("b")]);
        parts.insert(3, vec![]);

        let mut data = SpaceData::new(SpaceDesc::new("nba", 3, 1), parts);
        data.tag_schemas = vec![tag_item(10, "player", 0), tag_item(10, "player", 2)];
        data.edge_schemas = vec![EdgeSchemaItem {
            edge_type: 20,
            edge_name: "serve".to_string(),
            schema: Schema::new(0, vec![]),
        }];
        data.tag_indexes = vec![IndexItem {
            index_id: 100,
            index_name: "player_index".to_string(),
            schema_id: crate::core::types::SchemaId::Tag(10),
            schema_name: "player".to_string(),
            fields: vec![],
        }];
        SpaceSnapshot::build(1, data)
    }

    #[test]
    fn test_space_snapshot_drops_empty_parts() {
        let space = sample_space();
        // 分区 3 没有副本，但仍计入分区数
        assert_eq!(space.parts_num(), 3);
        assert_eq!(space.parts_alloc().len(), 2);
        assert_eq!(
            space.get_part_hosts(3).map_err(|e| e.to_error_code()),
            Err(crate::core::error::ErrorCode::PartNotFound)
        );
        assert_eq!(space.part_id(&crate::core::types::encode_int_vid(2)), Ok(3));
        assert_eq!(space.parts_on(&host("b")), &[1, 2]);
        assert_eq!(space.parts_on(&host("a")), &[1]);
        assert!(space.parts_on(&host("c")).is_empty());
    }

    #[test]
    fn test_schema_version_array() {
        let space = sample_space();
        assert_eq!(space.latest_tag_version(10), Ok(2));
        assert_eq!(space.tag_schema(10, -1).map(|s| s.version), Ok(2));
        assert_eq!(space.tag_schema(10, 0).map(|s| s.version), Ok(0));
        // 版本 1 缺失
        assert!(space.tag_schema(10, 1).is_err());
        assert!(space.tag_schema(10, 3).is_err());
        assert_eq!(space.tag_versions(10).map(|v| v.len()), Some(3));
        assert_eq!(space.tag_id("player"), Ok(10));
        assert_eq!(space.tag_name(10), Ok("player"));
        assert_eq!(space.edge_type("serve"), Ok(20));
        assert_eq!(space.latest_edge_version(20), Ok(0));
        assert!(space.tag_index(100).is_ok());
        assert!(space.edge_index(100).is_err());
    }

    #[test]
    fn test_local_cache_parts_on_host() {
        let cache = LocalCache::new(vec![sample_space()]);
        assert_eq!(cache.space_id_by_name("nba"), Ok(1));
        assert!(cache.space(2).is_err());

        let view = cache.parts_on_host(&host("a"));
        assert_eq!(view.len(), 1);
        assert_eq!(view[&1].keys().copied().collect::<Vec<_>>(), vec![1]);
        assert!(cache.parts_on_host(&host("c")).is_empty());
    }
}
