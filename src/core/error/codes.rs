//! RPC 状态码定义
//!
//! 远端服务在应答中携带的应用层状态码，以及客户端内部把错误落到分区上时使用的状态码。
//!
//! 错误码格式:
//! - 0: 成功
//! - -1xx: 传输层
//! - -2xx: 路由/一致性
//! - -3xx: 元数据资源
//! - -9xx: 其他

use serde::{Deserialize, Serialize};
use std::fmt;

/// 应用层状态码
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ErrorCode {
    // ==================== 成功 ====================
    Succeeded = 0,

    // ==================== 传输 (-1xx) ====================
    /// 连接断开
    Disconnected = -100,
    /// 无法建立连接
    FailToConnect = -101,
    /// RPC 调用失败（含超时）
    RpcFailure = -102,

    // ==================== 路由 (-2xx) ====================
    /// 分区 leader 已变更
    LeaderChanged = -200,
    /// 集群 ID 不匹配
    WrongCluster = -201,

    // ==================== 元数据资源 (-3xx) ====================
    SpaceNotFound = -300,
    PartNotFound = -301,
    TagNotFound = -302,
    EdgeNotFound = -303,
    IndexNotFound = -304,
    ConfigNotFound = -305,
    HostNotFound = -306,

    // ==================== 其他 (-9xx) ====================
    /// 存储层写入/读取失败
    StoreFailure = -900,
    /// 参数非法
    InvalidParam = -901,
    Unknown = -999,
}

/// 状态码类别
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CodeCategory {
    Success,
    Transport,
    Routing,
    NotFound,
    Other,
}

impl ErrorCode {
    pub fn as_i32(&self) -> i32 {
        *self as i32
    }

    pub fn from_i32(code: i32) -> Option<Self> {
        match code {
            0 => Some(ErrorCode::Succeeded),
            -100 => Some(ErrorCode::Disconnected),
            -101 => Some(ErrorCode::FailToConnect),
            -102 => Some(ErrorCode::RpcFailure),
            -200 => Some(ErrorCode::LeaderChanged),
            -201 => Some(ErrorCode::WrongCluster),
            -300 => Some(ErrorCode::SpaceNotFound),
            -301 => Some(ErrorCode::PartNotFound),
            -302 => Some(ErrorCode::TagNotFound),
            -303 => Some(ErrorCode::EdgeNotFound),
            -304 => Some(ErrorCode::IndexNotFound),
            -305 => Some(ErrorCode::ConfigNotFound),
            -306 => Some(ErrorCode::HostNotFound),
            -900 => Some(ErrorCode::StoreFailure),
            -901 => Some(ErrorCode::InvalidParam),
            -999 => Some(ErrorCode::Unknown),
            _ => None,
        }
    }

    pub fn category(&self) -> CodeCategory {
        match self.as_i32() {
            0 => CodeCategory::Success,
            -199..=-100 => CodeCategory::Transport,
            -299..=-200 => CodeCategory::Routing,
            -399..=-300 => CodeCategory::NotFound,
            _ => CodeCategory::Other,
        }
    }

    pub fn is_ok(&self) -> bool {
        *self == ErrorCode::Succeeded
    }

    pub fn default_message(&self) -> &'static str {
        match self {
            ErrorCode::Succeeded => "成功",
            ErrorCode::Disconnected => "连接断开",
            ErrorCode::FailToConnect => "无法连接",
            ErrorCode::RpcFailure => "RPC调用失败",
            ErrorCode::LeaderChanged => "leader已变更",
            ErrorCode::WrongCluster => "集群ID不匹配",
            ErrorCode::SpaceNotFound => "空间不存在",
            ErrorCode::PartNotFound => "分区不存在",
            ErrorCode::TagNotFound => "标签不存在",
            ErrorCode::EdgeNotFound => "边类型不存在",
            ErrorCode::IndexNotFound => "索引不存在",
            ErrorCode::ConfigNotFound => "配置项不存在",
            ErrorCode::HostNotFound => "主机不存在",
            ErrorCode::StoreFailure => "存储失败",
            ErrorCode::InvalidParam => "参数非法",
            ErrorCode::Unknown => "未知错误",
        }
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}({})", self.default_message(), self.as_i32())
    }
}
