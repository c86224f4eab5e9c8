//! # Portal 模块
//!
//! 区域触发的场景切换：对话触发门与传送门控制器。
//!
//! ## 调用约定
//!
//! 控制器不持有任何协作者，每次调用都通过 [`PortalContext`] 借用
//! 导演、调度器、展示目标与场景加载器。完成通知由持有者（通常是
//! [`Stage`](crate::Stage)）同步转发给 [`TransitionController::on_dialogue_completed`]。

pub mod controller;
pub mod gate;

use std::fmt;

use crate::dialogue::DialogueDirector;
use crate::host::{DialogueSink, SceneLoader};
use crate::timer::Scheduler;

pub use controller::{PortalSpec, TransitionController, TransitionOutcome};
pub use gate::{DialogueGate, GateRejection};

/// 控制器身份
///
/// 订阅表以此为键，一个控制器最多持有一条订阅。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ControllerId(u32);

impl ControllerId {
    pub fn new(raw: u32) -> Self {
        Self(raw)
    }

    pub fn raw(&self) -> u32 {
        self.0
    }
}

impl fmt::Display for ControllerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// 控制器一次调用期间借用的协作者
///
/// `loader` 为 `None` 表示宿主没有绑定场景加载器，控制器此时不做任何切换。
pub struct PortalContext<'a> {
    pub director: &'a mut DialogueDirector,
    pub scheduler: &'a mut dyn Scheduler,
    pub sink: &'a mut dyn DialogueSink,
    pub loader: Option<&'a mut dyn SceneLoader>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_controller_id_display() {
        assert_eq!(ControllerId::new(3).to_string(), "#3");
        assert!(ControllerId::new(1) < ControllerId::new(2));
    }
}
