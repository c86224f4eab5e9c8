//! # State 模块
//!
//! 各组件的显式状态机定义。
//!
//! ## 设计原则
//!
//! - 所有状态必须**显式建模**，不用布尔组合隐式表达
//! - 所有状态可序列化，便于调试输出
//! - 不允许隐式全局状态

use serde::{Deserialize, Serialize};

/// 打字机状态
///
/// ```text
/// Idle -> Revealing -> Finished
///              └─────> Cancelled
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TypewriterState {
    /// 尚未开始
    Idle,
    /// 逐字显示中
    Revealing,
    /// 自然完成
    Finished,
    /// 被取消（完整文本已立即显示）
    Cancelled,
}

/// 对话会话状态
///
/// ```text
/// Idle -> Typing -> LineReady -> Typing -> ... -> Ended
/// ```
///
/// `Ended` 是终态。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SessionState {
    /// 尚未开始
    Idle,
    /// 当前台词逐字显示中
    Typing,
    /// 当前台词已完整显示，等待推进
    LineReady,
    /// 会话结束
    Ended,
}

impl SessionState {
    /// 是否仍在进行（已开始且未结束）
    pub fn is_active(&self) -> bool {
        matches!(self, Self::Typing | Self::LineReady)
    }
}

/// 传送门控制器状态
///
/// ```text
/// Idle -> AwaitingDialogue -> Loading
///   └───────────────────────────^
/// ```
///
/// `Loading` 对单个控制器实例是终态。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ControllerState {
    /// 空闲
    Idle,
    /// 等待对话结束
    AwaitingDialogue,
    /// 已请求加载场景
    Loading,
}
