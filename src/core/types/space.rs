//! 图空间与 Schema 描述类型

use serde::{Deserialize, Serialize};

use super::{EdgeType, IndexID, SchemaVer, TagID};

/// 点 ID 的类型
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum VidType {
    Int64,
    FixedString,
}

/// 图空间属性
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SpaceDesc {
    pub space_name: String,
    pub partition_num: i32,
    pub replica_factor: i32,
    pub vid_type: VidType,
    pub vid_len: i32,
}

impl SpaceDesc {
    pub fn new(space_name: impl Into<String>, partition_num: i32, replica_factor: i32) -> Self {
        Self {
            space_name: space_name.into(),
            partition_num,
            replica_factor,
            vid_type: VidType::FixedString,
            vid_len: 8,
        }
    }

    pub fn with_vid(mut self, vid_type: VidType, vid_len: i32) -> Self {
        self.vid_type = vid_type;
        self.vid_len = vid_len;
        self
    }
}

impl Default for SpaceDesc {
    fn default() -> Self {
        Self::new("", 0, 0)
    }
}

/// 字段定义
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldDef {
    pub name: String,
    pub data_type: String,
    pub nullable: bool,
    pub default_value: Option<String>,
}

impl FieldDef {
    pub fn new(name: impl Into<String>, data_type: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            data_type: data_type.into(),
            nullable: true,
            default_value: None,
        }
    }
}

/// 某个版本的标签/边类型 Schema
///
/// 字段编码由存储层负责，这里只保存描述信息。
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Schema {
    pub version: SchemaVer,
    pub fields: Vec<FieldDef>,
}

impl Schema {
    pub fn new(version: SchemaVer, fields: Vec<FieldDef>) -> Self {
        Self { version, fields }
    }

    pub fn field(&self, name: &str) -> Option<&FieldDef> {
        self.fields.iter().find(|f| f.name == name)
    }
}

/// 元数据服务返回的标签 Schema 条目
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TagSchemaItem {
    pub tag_id: TagID,
    pub tag_name: String,
    pub schema: Schema,
}

/// 元数据服务返回的边类型 Schema 条目
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EdgeSchemaItem {
    pub edge_type: EdgeType,
    pub edge_name: String,
    pub schema: Schema,
}

/// 索引所属的 Schema
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SchemaId {
    Tag(TagID),
    Edge(EdgeType),
}

/// 索引描述
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IndexItem {
    pub index_id: IndexID,
    pub index_name: String,
    pub schema_id: SchemaId,
    pub schema_name: String,
    pub fields: Vec<FieldDef>,
}
