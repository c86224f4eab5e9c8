//! # Director 模块
//!
//! 对话导演：持有"当前会话"单槽位和完成通知的订阅表。
//!
//! ## 设计说明
//!
//! - 以显式传入的服务对象代替全局单例，多个实例之间互不影响
//! - 同一时刻最多只有一个进行中的会话，新会话只能由 [`DialogueGate`](crate::portal::DialogueGate)
//!   通过 [`install`](DialogueDirector::install) 装入
//! - 订阅按控制器身份记录，每个控制器最多一条订阅；重复退订是空操作
//! - 会话结束时返回 [`DialogueCompleted`]，由调用方同步分发给订阅者

use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, info};

use super::session::{AdvanceOutcome, DialogueSession, SessionId};
use crate::error::DialogueError;
use crate::host::DialogueSink;
use crate::portal::ControllerId;
use crate::script::SharedScript;
use crate::timer::{Scheduler, TimerId};

/// 会话完成通知
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DialogueCompleted {
    /// 结束的会话
    pub session: SessionId,
    /// 脚本名称
    pub script: String,
    /// 结束时订阅了该会话的控制器（按订阅顺序）
    pub observers: Vec<ControllerId>,
}

/// 对话导演
#[derive(Debug)]
pub struct DialogueDirector {
    typing_interval: Duration,
    current: Option<DialogueSession>,
    next_session: u64,
    observers: Vec<(ControllerId, SessionId)>,
}

impl DialogueDirector {
    /// 创建导演
    ///
    /// `typing_interval` 是打字机每个字之间的间隔。
    pub fn new(typing_interval: Duration) -> Self {
        Self {
            typing_interval,
            current: None,
            next_session: 1,
            observers: Vec::new(),
        }
    }

    pub fn typing_interval(&self) -> Duration {
        self.typing_interval
    }

    /// 创建并开始新会话，装入当前槽位
    ///
    /// 已有进行中的会话时返回 [`DialogueError::Busy`]。
    pub fn install(
        &mut self,
        script: Option<SharedScript>,
        scheduler: &mut dyn Scheduler,
        sink: &mut dyn DialogueSink,
    ) -> Result<SessionId, DialogueError> {
        if let Some(current) = self.active() {
            return Err(DialogueError::Busy {
                current: current.script_name().to_string(),
            });
        }

        let id = SessionId::new(self.next_session);
        let mut session = DialogueSession::new(id, self.typing_interval);
        session.start(script, scheduler, sink)?;
        self.next_session += 1;

        info!(session = %id, script = session.script_name(), "对话开始");
        self.current = Some(session);
        Ok(id)
    }

    /// 当前进行中的会话
    pub fn active(&self) -> Option<&DialogueSession> {
        self.current.as_ref().filter(|s| s.is_active())
    }

    /// 是否有任何对话正在进行
    pub fn is_any_active(&self) -> bool {
        self.active().is_some()
    }

    /// 指定脚本（同一个 `Arc`）是否正在播放，返回其会话
    pub fn running_session_for(&self, script: &SharedScript) -> Option<SessionId> {
        self.active()
            .filter(|s| s.script().is_some_and(|cur| Arc::ptr_eq(cur, script)))
            .map(|s| s.id())
    }

    /// 推进当前会话
    ///
    /// 返回推进结果；会话因此结束时一并返回完成通知。
    pub fn advance(
        &mut self,
        scheduler: &mut dyn Scheduler,
        sink: &mut dyn DialogueSink,
    ) -> (AdvanceOutcome, Option<DialogueCompleted>) {
        let Some(session) = self.current.as_mut() else {
            return (AdvanceOutcome::Ignored, None);
        };

        let outcome = session.advance(scheduler, sink);
        let completed = (outcome == AdvanceOutcome::Completed).then(|| self.retire());
        (outcome, completed.flatten())
    }

    /// 强制结束当前会话
    pub fn force_end(
        &mut self,
        scheduler: &mut dyn Scheduler,
        sink: &mut dyn DialogueSink,
    ) -> Option<DialogueCompleted> {
        let session = self.current.as_mut()?;
        if session.force_end(scheduler, sink) {
            self.retire()
        } else {
            None
        }
    }

    /// 把到期计时器交给当前会话，返回是否被处理
    pub fn on_timer(
        &mut self,
        id: TimerId,
        scheduler: &mut dyn Scheduler,
        sink: &mut dyn DialogueSink,
    ) -> bool {
        self.current
            .as_mut()
            .is_some_and(|s| s.on_timer(id, scheduler, sink))
    }

    /// 清空槽位并生成完成通知
    fn retire(&mut self) -> Option<DialogueCompleted> {
        let session = self.current.take()?;
        let observers = self.observers_of(session.id());
        info!(
            session = %session.id(),
            script = session.script_name(),
            observers = observers.len(),
            "对话结束"
        );
        Some(DialogueCompleted {
            session: session.id(),
            script: session.script_name().to_string(),
            observers,
        })
    }

    /// 订阅会话完成通知
    ///
    /// 同一控制器的旧订阅会先被移除。会话不是当前进行中的会话时拒绝订阅，返回 false。
    pub fn subscribe(&mut self, controller: ControllerId, session: SessionId) -> bool {
        if self.active().map(|s| s.id()) != Some(session) {
            debug!(controller = %controller, session = %session, "会话不在进行中，拒绝订阅");
            return false;
        }
        self.unsubscribe(controller);
        self.observers.push((controller, session));
        debug!(controller = %controller, session = %session, "订阅对话结束");
        true
    }

    /// 退订，返回是否真的移除了订阅
    pub fn unsubscribe(&mut self, controller: ControllerId) -> bool {
        let before = self.observers.len();
        self.observers.retain(|(c, _)| *c != controller);
        let removed = self.observers.len() != before;
        if removed {
            debug!(controller = %controller, "退订对话结束");
        }
        removed
    }

    /// 控制器当前订阅的会话
    pub fn subscription_of(&self, controller: ControllerId) -> Option<SessionId> {
        self.observers
            .iter()
            .find(|(c, _)| *c == controller)
            .map(|(_, s)| *s)
    }

    /// 订阅了指定会话的控制器
    pub fn observers_of(&self, session: SessionId) -> Vec<ControllerId> {
        self.observers
            .iter()
            .filter(|(_, s)| *s == session)
            .map(|(c, _)| *c)
            .collect()
    }

    /// 移除指向已结束会话的残留订阅，返回移除数量
    pub fn prune_observers(&mut self, session: SessionId) -> usize {
        let before = self.observers.len();
        self.observers.retain(|(_, s)| *s != session);
        before - self.observers.len()
    }

    /// 订阅总数
    pub fn observer_count(&self) -> usize {
        self.observers.len()
    }
}
