//! 客户端错误处理
//!
//! 1. `ErrorCode` 是远端应答携带的状态码，按分区记录失败时也使用它
//! 2. `ClientError` 是本地调用返回的错误，可通过 `to_error_code` 折算为状态码
//! 3. 部分分区失败不是错误，作为数据放在聚合结果中返回

use thiserror::Error;

pub mod codes;

pub use codes::{CodeCategory, ErrorCode};

use crate::core::types::HostAddr;

/// 未找到的资源类别
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NotFoundKind {
    Space,
    Part,
    Tag,
    Edge,
    Index,
    Config,
}

impl std::fmt::Display for NotFoundKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            NotFoundKind::Space => "空间",
            NotFoundKind::Part => "分区",
            NotFoundKind::Tag => "标签",
            NotFoundKind::Edge => "边类型",
            NotFoundKind::Index => "索引",
            NotFoundKind::Config => "配置项",
        };
        f.write_str(name)
    }
}

/// 客户端错误类型
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ClientError {
    #[error("{kind}未找到: {key}")]
    NotFound { kind: NotFoundKind, key: String },

    #[error("leader已变更, 新leader: {leader:?}")]
    LeaderChanged { leader: Option<HostAddr> },

    #[error("RPC调用失败: {0}")]
    RpcFailed(String),

    #[error("远端返回错误: {0}")]
    Remote(ErrorCode),

    #[error("元数据未就绪: {0}")]
    NotReady(String),

    #[error("致命错误: {0}")]
    Fatal(String),

    #[error("配置错误: {0}")]
    Config(String),

    #[error("IO错误: {0}")]
    Io(String),

    #[error("无效输入: {0}")]
    InvalidInput(String),
}

/// 统一的结果类型
pub type ClientResult<T> = Result<T, ClientError>;

impl ClientError {
    pub fn space_not_found(space: impl ToString) -> Self {
        Self::NotFound {
            kind: NotFoundKind::Space,
            key: space.to_string(),
        }
    }

    pub fn part_not_found(space: impl ToString, part: impl ToString) -> Self {
        Self::NotFound {
            kind: NotFoundKind::Part,
            key: format!("{}/{}", space.to_string(), part.to_string()),
        }
    }

    pub fn tag_not_found(space: impl ToString, tag: impl ToString) -> Self {
        Self::NotFound {
            kind: NotFoundKind::Tag,
            key: format!("{}/{}", space.to_string(), tag.to_string()),
        }
    }

    pub fn edge_not_found(space: impl ToString, edge: impl ToString) -> Self {
        Self::NotFound {
            kind: NotFoundKind::Edge,
            key: format!("{}/{}", space.to_string(), edge.to_string()),
        }
    }

    pub fn index_not_found(space: impl ToString, index: impl ToString) -> Self {
        Self::NotFound {
            kind: NotFoundKind::Index,
            key: format!("{}/{}", space.to_string(), index.to_string()),
        }
    }

    pub fn config_not_found(name: impl Into<String>) -> Self {
        Self::NotFound {
            kind: NotFoundKind::Config,
            key: name.into(),
        }
    }

    /// 传输层失败和 leader 变更可以重试
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            ClientError::RpcFailed(_) | ClientError::LeaderChanged { .. }
        )
    }

    pub fn is_fatal(&self) -> bool {
        matches!(self, ClientError::Fatal(_))
    }

    /// 折算为分区级状态码
    pub fn to_error_code(&self) -> ErrorCode {
        match self {
            ClientError::NotFound { kind, .. } => match kind {
                NotFoundKind::Space => ErrorCode::SpaceNotFound,
                NotFoundKind::Part => ErrorCode::PartNotFound,
                NotFoundKind::Tag => ErrorCode::TagNotFound,
                NotFoundKind::Edge => ErrorCode::EdgeNotFound,
                NotFoundKind::Index => ErrorCode::IndexNotFound,
                NotFoundKind::Config => ErrorCode::ConfigNotFound,
            },
            ClientError::LeaderChanged { .. } => ErrorCode::LeaderChanged,
            ClientError::RpcFailed(_) => ErrorCode::RpcFailure,
            ClientError::Remote(code) => *code,
            ClientError::InvalidInput(_) | ClientError::Config(_) => ErrorCode::InvalidParam,
            _ => ErrorCode::Unknown,
        }
    }
}

impl From<std::io::Error> for ClientError {
    fn from(e: std::io::Error) -> Self {
        ClientError::Io(e.to_string())
    }
}

impl From<toml::de::Error> for ClientError {
    fn from(e: toml::de::Error) -> Self {
        ClientError::Config(e.to_string())
    }
}

impl From<toml::ser::Error> for ClientError {
    fn from(e: toml::ser::Error) -> Self {
        ClientError::Config(e.to_string())
    }
}
