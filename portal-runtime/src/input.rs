//! # Input 模块
//!
//! 宿主每帧送入 [`Stage`](crate::Stage) 的输入事件。
//!
//! 区域信号由宿主的碰撞检测产生，推进信号由宿主的输入轮询产生，
//! Runtime 只消费结果，不关心来源。

use serde::{Deserialize, Serialize};

/// 舞台输入
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum StageInput {
    /// 角色进入传送门区域
    Enter { portal: String, actor: String },
    /// 角色离开传送门区域
    Exit { portal: String, actor: String },
    /// 玩家请求推进对话（边沿触发，每帧最多消费一次）
    Advance,
    /// 强制结束当前对话
    ForceEnd,
}

impl StageInput {
    pub fn enter(portal: impl Into<String>, actor: impl Into<String>) -> Self {
        Self::Enter {
            portal: portal.into(),
            actor: actor.into(),
        }
    }

    pub fn exit(portal: impl Into<String>, actor: impl Into<String>) -> Self {
        Self::Exit {
            portal: portal.into(),
            actor: actor.into(),
        }
    }

    /// 是否为区域信号
    pub fn is_region_signal(&self) -> bool {
        matches!(self, Self::Enter { .. } | Self::Exit { .. })
    }
}
