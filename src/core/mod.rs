pub mod error;
pub mod murmur;
pub mod types;

// 错误和结果类型
pub use error::{ClientError, ClientResult, ErrorCode, NotFoundKind};

// 核心数据类型
pub use types::{
    ClusterID, EdgeType, GraphSpaceID, HostAddr, IndexID, PartHosts, PartitionID, SchemaVer,
    TagID, TermID,
};
