//! 核心类型定义

pub mod host;
pub mod part;
pub mod space;

pub use host::{parse_host_list, HostAddr};
pub use part::{
    build_host_parts_index, encode_int_vid, part_id_of, HostPartsIndex, PartHosts, PartsMap,
};
pub use space::{
    EdgeSchemaItem, FieldDef, IndexItem, Schema, SchemaId, SpaceDesc, TagSchemaItem, VidType,
};

pub type GraphSpaceID = i32;
pub type PartitionID = i32;
pub type TagID = i32;
pub type EdgeType = i32;
pub type IndexID = i32;
pub type SchemaVer = i64;
pub type ClusterID = i64;
pub type TermID = i64;
