//! Leader 估计
//!
//! `LeaderTracker` 记录分区 leader，`ServiceLeader` 记录元数据服务 leader。
//! 两者都只是尽力而为的缓存：条目缺失或过期都不是错误，调用方会退回到约定的默认主机。

use log::{debug, info};
use parking_lot::RwLock;
use rand::seq::SliceRandom;
use std::collections::HashMap;

use crate::core::error::{ClientError, ClientResult};
use crate::core::types::{GraphSpaceID, HostAddr, PartHosts, PartitionID};

/// 分区 leader 缓存
#[derive(Debug, Default)]
pub struct LeaderTracker {
    leaders: RwLock<HashMap<(GraphSpaceID, PartitionID), HostAddr>>,
}

impl LeaderTracker {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn update(&self, space_id: GraphSpaceID, part_id: PartitionID, leader: HostAddr) {
        debug!("更新 leader: space={}, part={}, leader={}", space_id, part_id, leader);
        self.leaders.write().insert((space_id, part_id), leader);
    }

    /// 批量写入 leader，用于从元数据服务加载的 leader 分布
    pub fn extend<I>(&self, leaders: I)
    where
        I: IntoIterator<Item = ((GraphSpaceID, PartitionID), HostAddr)>,
    {
        self.leaders.write().extend(leaders);
    }

    pub fn invalidate(&self, space_id: GraphSpaceID, part_id: PartitionID) {
        self.leaders.write().remove(&(space_id, part_id));
    }

    pub fn invalidate_parts(&self, space_id: GraphSpaceID, parts: &[PartitionID]) {
        let mut leaders = self.leaders.write();
        for part_id in parts {
            leaders.remove(&(space_id, *part_id));
        }
    }

    pub fn invalidate_space(&self, space_id: GraphSpaceID) {
        self.leaders.write().retain(|(space, _), _| *space != space_id);
    }

    pub fn get(&self, space_id: GraphSpaceID, part_id: PartitionID) -> Option<HostAddr> {
        self.leaders.read().get(&(space_id, part_id)).cloned()
    }

    /// 选择分区的目标主机
    ///
    /// 缓存的 leader 仍在副本列表中时使用它，否则使用 `hosts[0]`。
    /// 回退策略是确定性的，不做随机或轮询。
    pub fn resolve(&self, part_hosts: &PartHosts) -> ClientResult<HostAddr> {
        if let Some(leader) = self.get(part_hosts.space_id, part_hosts.part_id) {
            if part_hosts.contains(&leader) {
                return Ok(leader);
            }
        }
        part_hosts
            .hosts
            .first()
            .cloned()
            .ok_or_else(|| ClientError::part_not_found(part_hosts.space_id, part_hosts.part_id))
    }

    pub fn len(&self) -> usize {
        self.leaders.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.leaders.read().is_empty()
    }

    pub fn clear(&self) {
        self.leaders.write().clear();
    }
}

#[derive(Debug)]
struct ServiceHosts {
    leader: HostAddr,
    active: HostAddr,
}

/// 元数据服务 leader 与活跃节点估计
///
/// 需要强一致的请求发往 `leader`，其余请求发往任意健康节点 `active`。
#[derive(Debug)]
pub struct ServiceLeader {
    addrs: Vec<HostAddr>,
    hosts: RwLock<ServiceHosts>,
}

impl ServiceLeader {
    pub fn new(addrs: Vec<HostAddr>) -> ClientResult<Self> {
        let first = addrs
            .choose(&mut rand::thread_rng())
            .cloned()
            .ok_or_else(|| ClientError::Config("元数据服务地址不能为空".to_string()))?;
        Ok(Self {
            addrs,
            hosts: RwLock::new(ServiceHosts {
                leader: first.clone(),
                active: first,
            }),
        })
    }

    pub fn addrs(&self) -> &[HostAddr] {
        &self.addrs
    }

    pub fn leader(&self) -> HostAddr {
        self.hosts.read().leader.clone()
    }

    pub fn active(&self) -> HostAddr {
        self.hosts.read().active.clone()
    }

    pub fn target(&self, to_leader: bool) -> HostAddr {
        if to_leader {
            self.leader()
        } else {
            self.active()
        }
    }

    /// 采纳应答中的 leader 提示，活跃节点一并指向它
    pub fn set_leader(&self, leader: HostAddr) {
        info!("元数据服务 leader 变更为 {}", leader);
        let mut hosts = self.hosts.write();
        hosts.active = leader.clone();
        hosts.leader = leader;
    }

    /// 当前 leader 不可达，随机换一个其他地址
    pub fn rotate_leader(&self, failed: &HostAddr) {
        let next = self.pick_other(failed);
        let mut hosts = self.hosts.write();
        if &hosts.leader == failed {
            debug!("元数据服务 leader {} 不可达, 切换到 {}", failed, next);
            hosts.leader = next;
        }
    }

    /// 当前活跃节点不可达，随机换一个其他地址
    pub fn rotate_active(&self, failed: &HostAddr) {
        let next = self.pick_other(failed);
        let mut hosts = self.hosts.write();
        if &hosts.active == failed {
            hosts.active = next;
        }
    }

    fn pick_other(&self, failed: &HostAddr) -> HostAddr {
        let candidates: Vec<&HostAddr> = self.addrs.iter().filter(|h| *h != failed).collect();
        candidates
            .choose(&mut rand::thread_rng())
            .map(|h| (*h).clone())
            .unwrap_or_else(|| failed.clone())
    }
}
