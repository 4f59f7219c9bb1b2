//! 分区副本分布类型

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use super::{GraphSpaceID, HostAddr, PartitionID};
use crate::core::error::{ClientError, ClientResult};
use crate::core::murmur;

/// 分区 -> 副本主机列表
pub type PartsMap = HashMap<PartitionID, Vec<HostAddr>>;

/// 主机 -> 分区列表，`PartsMap` 的逆索引
pub type HostPartsIndex = HashMap<HostAddr, Vec<PartitionID>>;

/// 某个分区的副本分布
///
/// 发布后 `hosts` 不为空，`hosts[0]` 为没有其他信息时的默认目标。
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PartHosts {
    pub space_id: GraphSpaceID,
    pub part_id: PartitionID,
    pub hosts: Vec<HostAddr>,
}

impl PartHosts {
    pub fn new(space_id: GraphSpaceID, part_id: PartitionID, hosts: Vec<HostAddr>) -> Self {
        Self {
            space_id,
            part_id,
            hosts,
        }
    }

    pub fn contains(&self, host: &HostAddr) -> bool {
        self.hosts.iter().any(|h| h == host)
    }
}

/// 由分区分布构建逆索引
///
/// 每个分区列表按分区号升序排列，保证同一输入得到同一结果。
pub fn build_host_parts_index(parts: &PartsMap) -> HostPartsIndex {
    let mut index: HostPartsIndex = HashMap::new();
    for (part_id, hosts) in parts {
        for host in hosts {
            index.entry(host.clone()).or_default().push(*part_id);
        }
    }
    for part_ids in index.values_mut() {
        part_ids.sort_unstable();
        part_ids.dedup();
    }
    index
}

/// 计算路由键所属分区
///
/// 8 字节的键视为小端编码的 64 位整数直接取模，其余按字节做 MurmurHash64A。
/// 分区号从 1 开始；`parts_num` 不大于 0 时返回 `InvalidInput`。
pub fn part_id_of(key: &[u8], parts_num: i32) -> ClientResult<PartitionID> {
    if parts_num <= 0 {
        return Err(ClientError::InvalidInput(format!(
            "分区数必须大于0: {}",
            parts_num
        )));
    }
    let value = if key.len() == 8 {
        let mut buf = [0u8; 8];
        buf.copy_from_slice(key);
        u64::from_le_bytes(buf)
    } else {
        murmur::hash_bytes(key)
    };
    Ok((value % parts_num as u64) as PartitionID + 1)
}

/// 把整数点 ID 编码为路由键
pub fn encode_int_vid(vid: i64) -> [u8; 8] {
    vid.to_le_bytes()
}
