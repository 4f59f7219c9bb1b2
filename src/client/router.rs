//! 请求路由
//!
//! 把一批实体按路由键分到分区，再按分区当前的目标主机分组。
//! 一次调用只读取一份目录快照，输出使用有序 map，快照与 leader 表不变时分组结果稳定。

use std::collections::BTreeMap;
use std::sync::Arc;

use super::transport::PartitionedBatch;
use crate::core::error::ClientResult;
use crate::core::types::{GraphSpaceID, HostAddr, PartitionID};
use crate::meta::{LeaderTracker, PartitionDirectory, SpaceSnapshot};

/// 主机 -> 分区 -> 实体
pub type HostBatches<T> = BTreeMap<HostAddr, BTreeMap<PartitionID, Vec<T>>>;

/// 主机 -> 分区列表
pub type HostParts = BTreeMap<HostAddr, Vec<PartitionID>>;

#[derive(Debug, Clone)]
pub struct RequestRouter {
    directory: Arc<PartitionDirectory>,
    leaders: Arc<LeaderTracker>,
}

impl RequestRouter {
    pub fn new(directory: Arc<PartitionDirectory>, leaders: Arc<LeaderTracker>) -> Self {
        Self { directory, leaders }
    }

    pub fn directory(&self) -> &Arc<PartitionDirectory> {
        &self.directory
    }

    pub fn leaders(&self) -> &Arc<LeaderTracker> {
        &self.leaders
    }

    /// 按目标主机和分区对实体分组
    ///
    /// 每个实体恰好出现一次；同一分区的实体保持输入顺序。
    /// 空间未知时返回 `SpaceNotFound`。
    pub fn cluster<T, K, F>(
        &self,
        space_id: GraphSpaceID,
        items: impl IntoIterator<Item = T>,
        key_of: F,
    ) -> ClientResult<HostBatches<T>>
    where
        K: AsRef<[u8]>,
        F: Fn(&T) -> K,
    {
        let space = self.directory.space(space_id)?;
        let mut targets: BTreeMap<PartitionID, HostAddr> = BTreeMap::new();
        let mut clusters: HostBatches<T> = BTreeMap::new();

        for item in items {
            let part_id = space.part_id(key_of(&item).as_ref())?;
            let host = match targets.get(&part_id) {
                Some(host) => host.clone(),
                None => {
                    let host = self.target_of(&space, part_id)?;
                    targets.insert(part_id, host.clone());
                    host
                }
            };
            clusters
                .entry(host)
                .or_default()
                .entry(part_id)
                .or_default()
                .push(item);
        }
        Ok(clusters)
    }

    /// 按目标主机对给定分区分组
    pub fn cluster_parts(
        &self,
        space_id: GraphSpaceID,
        parts: &[PartitionID],
    ) -> ClientResult<HostParts> {
        let space = self.directory.space(space_id)?;
        let mut result = HostParts::new();
        for part_id in parts {
            let host = self.target_of(&space, *part_id)?;
            result.entry(host).or_default().push(*part_id);
        }
        for parts in result.values_mut() {
            parts.sort_unstable();
            parts.dedup();
        }
        Ok(result)
    }

    /// 空间内全部分区按目标主机分组，用于全量扫描
    pub fn host_parts(&self, space_id: GraphSpaceID) -> ClientResult<HostParts> {
        let space = self.directory.space(space_id)?;
        let mut parts: Vec<PartitionID> = space.parts_alloc().keys().copied().collect();
        parts.sort_unstable();

        let mut result = HostParts::new();
        for part_id in parts {
            let host = self.target_of(&space, part_id)?;
            result.entry(host).or_default().push(part_id);
        }
        Ok(result)
    }

    fn target_of(&self, space: &SpaceSnapshot, part_id: PartitionID) -> ClientResult<HostAddr> {
        let part_hosts = space.get_part_hosts(part_id)?;
        self.leaders.resolve(&part_hosts)
    }
}

/// 把分组结果转换成每台主机一个批量请求
pub fn into_requests<T>(
    space_id: GraphSpaceID,
    clusters: HostBatches<T>,
) -> BTreeMap<HostAddr, PartitionedBatch<T>> {
    clusters
        .into_iter()
        .map(|(host, parts)| (host, PartitionedBatch::new(space_id, parts)))
        .collect()
}
