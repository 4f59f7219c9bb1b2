//! 存储/元数据服务的请求路由与执行

pub mod graph_client;
pub mod response;
pub mod router;
pub mod scatter_gather;
pub mod single_target;
pub mod stats;
pub mod transport;

pub use graph_client::GraphClient;
pub use response::{AggregateResult, HostLatency, ResultKind};
pub use router::{into_requests, HostBatches, HostParts, RequestRouter};
pub use scatter_gather::ScatterGatherExecutor;
pub use single_target::{Route, SingleTargetExecutor};
pub use stats::{RpcStatsCollector, RpcStatsSnapshot};
pub use transport::{
    PartitionResult, PartitionedBatch, PartitionedRequest, RemoteProcedure, ResponseCommon,
    RpcResponse, StorageResponse,
};
