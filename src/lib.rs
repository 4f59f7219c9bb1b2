//! GraphDB 客户端
//!
//! 面向分布式图数据库存储与元数据服务的客户端路由层：
//! 按分区路由请求、并发分发并汇总部分失败、跟随 leader 变更重试，
//! 以及在后台维护元数据缓存。

pub mod client;
pub mod config;
pub mod core;
pub mod meta;
pub mod utils;

pub use client::GraphClient;
pub use config::{ClientConfig, ClientOptions, ClientRole};
pub use crate::core::{ClientError, ClientResult, ErrorCode, HostAddr};
