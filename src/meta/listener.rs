//! 元数据变更监听接口

use std::collections::HashMap;

use super::types::LeaderParts;
use crate::core::types::{GraphSpaceID, PartHosts, PartitionID};

/// 接收本机分区生命周期事件
///
/// 回调在刷新任务中同步执行，实现方不应在回调里长时间阻塞。
pub trait MetaChangedListener: Send + Sync {
    fn on_space_added(&self, space_id: GraphSpaceID);

    fn on_space_removed(&self, space_id: GraphSpaceID);

    fn on_part_added(&self, part_hosts: &PartHosts);

    fn on_part_removed(&self, space_id: GraphSpaceID, part_id: PartitionID);

    fn on_part_updated(&self, part_hosts: &PartHosts);

    fn on_space_option_updated(&self, space_id: GraphSpaceID, options: &HashMap<String, String>);

    /// 填充本机为 leader 的分区，随下一次心跳上报
    fn fetch_leader_info(&self, leader_parts: &mut LeaderParts);
}
