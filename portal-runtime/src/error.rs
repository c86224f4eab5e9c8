//! # Error 模块
//!
//! 定义 portal-runtime 中使用的错误类型。
//!
//! ## 错误分类
//!
//! - [`ConfigError`]：配置错误（缺少脚本、空脚本、缺少目标场景等），
//!   对当前操作是致命的，但只返回给直接调用方并记录日志，不会中断主循环
//! - [`DialogueError`]：对话会话的非法操作，表现为拒绝而不是 panic
//! - [`PortalError`]：统一错误类型

use thiserror::Error;

/// 配置错误
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ConfigError {
    /// 需要对话脚本的地方没有配置脚本
    #[error("未配置对话脚本")]
    MissingScript,

    /// 对话脚本没有任何台词
    #[error("对话脚本 '{name}' 不包含任何台词")]
    EmptyScript { name: String },

    /// 引用了不存在的对话脚本
    #[error("对话脚本 '{name}' 未找到")]
    UnknownScript { name: String },

    /// 传送门没有配置目标场景
    #[error("传送门 '{portal}' 未配置目标场景")]
    MissingScene { portal: String },

    /// 传送门名称重复
    #[error("传送门名称 '{name}' 重复")]
    DuplicatePortal { name: String },

    /// 字段取值无效
    #[error("配置项 '{field}' 的值无效 - {message}")]
    InvalidValue { field: String, message: String },

    /// JSON 解析失败
    #[error("解析失败: {message}")]
    Parse { message: String },
}

/// 对话会话错误
#[derive(Error, Debug, Clone, PartialEq)]
pub enum DialogueError {
    /// 脚本为空或未配置
    #[error("无效的对话脚本 {}", script_label(.name))]
    InvalidScript { name: Option<String> },

    /// 会话已经启动过，不能重复使用
    #[error("对话会话已经启动")]
    AlreadyStarted,

    /// 已有其他会话占用全局槽位
    #[error("已有对话 '{current}' 正在进行")]
    Busy { current: String },
}

fn script_label(name: &Option<String>) -> String {
    match name {
        Some(name) => format!("'{name}'"),
        None => "（未配置）".to_string(),
    }
}

/// portal-runtime 统一错误类型
#[derive(Error, Debug, Clone, PartialEq)]
pub enum PortalError {
    /// 配置错误
    #[error("配置错误: {0}")]
    Config(#[from] ConfigError),

    /// 对话错误
    #[error("对话错误: {0}")]
    Dialogue(#[from] DialogueError),
}

/// Result 类型别名
pub type PortalResult<T> = Result<T, PortalError>;
