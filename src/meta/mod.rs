//! 元数据客户端
//!
//! 分区目录、leader 估计、元数据服务接口以及后台刷新任务。

pub mod cluster_id;
pub mod directory;
pub mod leader;
pub mod listener;
pub mod refresher;
pub mod service;
pub mod snapshot;
pub mod types;

pub use cluster_id::ClusterIdFile;
pub use directory::PartitionDirectory;
pub use leader::{LeaderTracker, ServiceLeader};
pub use listener::MetaChangedListener;
pub use refresher::{default_fatal_handler, FatalHandler, MetaCacheRefresher, RefresherState};
pub use service::{MetaClient, MetaService};
pub use snapshot::{LocalCache, LocalPartsView, SpaceData, SpaceSnapshot};
pub use types::{
    ConfigItem, ConfigMode, HeartbeatReq, HeartbeatResp, HostItem, HostStatus, LeaderInfo,
    LeaderParts, ListConfigsReq, ListHostsReq, ListSpacesReq, MetaResponse, SpaceIdName, SpaceReq,
};
