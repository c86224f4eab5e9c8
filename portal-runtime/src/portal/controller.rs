//! # Controller 模块
//!
//! 传送门控制器：监听区域进入/离开，必要时先播放对话，再请求加载场景。
//!
//! ## 状态机
//!
//! ```text
//! Idle ──enter──► AwaitingDialogue ──完成且仍在区域内──► Loading
//!   └──enter（无触发门 / 已触发过）────────────────────────► Loading
//! ```
//!
//! - 离开区域时退订，本次停留期间的对话结束不会再触发加载
//! - 重新进入会重新评估：一次性触发门已经触发过时直接加载
//! - 其他脚本的对话占用槽位时，改为等待那段对话结束，结束时仍在区域内就加载
//! - `Loading` 对单个控制器是终态，之后的进入/离开/完成通知全部忽略

use tracing::{debug, error, info, warn};

use super::gate::{DialogueGate, GateRejection};
use super::{ControllerId, PortalContext};
use crate::dialogue::SessionId;
use crate::error::ConfigError;
use crate::state::ControllerState;

/// 默认需要的角色标签
pub const DEFAULT_REQUIRED_TAG: &str = "Player";

/// 传送门定义
#[derive(Debug, Clone)]
pub struct PortalSpec {
    pub name: String,
    /// 目标场景
    pub scene: String,
    /// 只有该标签的角色会触发
    pub required_tag: String,
    pub gate: Option<DialogueGate>,
}

impl PortalSpec {
    pub fn new(name: impl Into<String>, scene: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            scene: scene.into(),
            required_tag: DEFAULT_REQUIRED_TAG.to_string(),
            gate: None,
        }
    }

    pub fn with_required_tag(mut self, tag: impl Into<String>) -> Self {
        self.required_tag = tag.into();
        self
    }

    pub fn with_gate(mut self, gate: DialogueGate) -> Self {
        self.gate = Some(gate);
        self
    }
}

/// 控制器对一次事件的处理结果
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransitionOutcome {
    /// 事件与本控制器无关（标签不匹配等）
    Ignored,
    /// 开始了新的对话会话并订阅其完成通知
    DialogueStarted(SessionId),
    /// 同一脚本的会话已在进行，订阅了已有会话
    DialogueJoined(SessionId),
    /// 已请求加载场景
    SceneRequested,
    /// 已经在加载中
    AlreadyLoading,
    /// 其他脚本的对话占用槽位，订阅该会话，结束后加载
    Blocked(SessionId),
    /// 角色离开区域
    LeftRegion,
    /// 对话结束时角色已不在区域内，不加载
    LoadDropped,
    /// 没有绑定场景加载器，控制器不工作
    Inert,
}

/// 传送门控制器
#[derive(Debug)]
pub struct TransitionController {
    id: ControllerId,
    name: String,
    scene: String,
    required_tag: String,
    gate: Option<DialogueGate>,
    state: ControllerState,
    occupied: bool,
}

impl TransitionController {
    pub fn new(id: ControllerId, spec: PortalSpec) -> Self {
        Self {
            id,
            name: spec.name,
            scene: spec.scene,
            required_tag: spec.required_tag,
            gate: spec.gate,
            state: ControllerState::Idle,
            occupied: false,
        }
    }

    /// 角色进入区域
    pub fn on_region_enter(
        &mut self,
        actor: &str,
        ctx: &mut PortalContext<'_>,
    ) -> Result<TransitionOutcome, ConfigError> {
        if actor != self.required_tag {
            return Ok(TransitionOutcome::Ignored);
        }
        if self.state == ControllerState::Loading {
            debug!(portal = %self.name, "已在加载中，忽略进入");
            return Ok(TransitionOutcome::AlreadyLoading);
        }
        if ctx.loader.is_none() {
            warn!(portal = %self.name, "未绑定场景加载器，忽略进入");
            return Ok(TransitionOutcome::Inert);
        }

        self.occupied = true;

        let Some(gate) = self.gate.as_mut() else {
            return self.request_load(ctx);
        };

        match gate.try_activate(ctx.director, ctx.scheduler, ctx.sink) {
            Ok(session) => {
                self.await_session(session, ctx);
                Ok(TransitionOutcome::DialogueStarted(session))
            }
            Err(GateRejection::AlreadyRunning(session)) => {
                self.await_session(session, ctx);
                Ok(TransitionOutcome::DialogueJoined(session))
            }
            Err(GateRejection::AlreadyFired) => self.request_load(ctx),
            Err(GateRejection::InvalidScript(err)) => {
                error!(portal = %self.name, error = %err, "对话触发门配置错误，直接加载场景");
                self.request_load(ctx)
            }
            Err(rejection @ GateRejection::Busy { .. }) => {
                let Some(blocking) = ctx.director.active().map(|s| s.id()) else {
                    warn!(portal = %self.name, reason = %rejection, "对话槽位状态异常，本次进入无效");
                    self.state = ControllerState::Idle;
                    return Ok(TransitionOutcome::Ignored);
                };
                warn!(portal = %self.name, reason = %rejection, "对话槽位被占用，等待当前对话结束");
                self.await_session(blocking, ctx);
                Ok(TransitionOutcome::Blocked(blocking))
            }
        }
    }

    /// 订阅会话并进入等待状态
    fn await_session(&mut self, session: SessionId, ctx: &mut PortalContext<'_>) {
        if ctx.director.subscribe(self.id, session) {
            self.state = ControllerState::AwaitingDialogue;
            debug!(portal = %self.name, session = %session, "等待对话结束");
        }
    }

    /// 角色离开区域
    pub fn on_region_exit(&mut self, actor: &str, ctx: &mut PortalContext<'_>) -> TransitionOutcome {
        if actor != self.required_tag {
            return TransitionOutcome::Ignored;
        }

        match self.state {
            ControllerState::Loading => TransitionOutcome::AlreadyLoading,
            ControllerState::AwaitingDialogue => {
                ctx.director.unsubscribe(self.id);
                self.occupied = false;
                debug!(portal = %self.name, "离开区域，取消等待");
                TransitionOutcome::LeftRegion
            }
            ControllerState::Idle => {
                self.occupied = false;
                TransitionOutcome::LeftRegion
            }
        }
    }

    /// 订阅的会话已结束
    pub fn on_dialogue_completed(
        &mut self,
        session: SessionId,
        ctx: &mut PortalContext<'_>,
    ) -> Result<TransitionOutcome, ConfigError> {
        ctx.director.unsubscribe(self.id);

        if self.state == ControllerState::Loading {
            return Ok(TransitionOutcome::AlreadyLoading);
        }
        if !self.occupied {
            debug!(portal = %self.name, session = %session, "对话结束时角色不在区域内");
            self.state = ControllerState::Idle;
            return Ok(TransitionOutcome::LoadDropped);
        }

        self.request_load(ctx)
    }

    /// 请求加载目标场景
    ///
    /// 已在加载中是空操作；目标场景为空时返回 [`ConfigError::MissingScene`]，状态不变。
    pub fn request_load(
        &mut self,
        ctx: &mut PortalContext<'_>,
    ) -> Result<TransitionOutcome, ConfigError> {
        if self.state == ControllerState::Loading {
            return Ok(TransitionOutcome::AlreadyLoading);
        }
        if self.scene.trim().is_empty() {
            return Err(ConfigError::MissingScene {
                portal: self.name.clone(),
            });
        }
        let Some(loader) = ctx.loader.as_deref_mut() else {
            warn!(portal = %self.name, "未绑定场景加载器，无法切换场景");
            return Ok(TransitionOutcome::Inert);
        };

        self.state = ControllerState::Loading;
        info!(portal = %self.name, scene = %self.scene, "请求加载场景");
        loader.load(&self.scene);
        Ok(TransitionOutcome::SceneRequested)
    }

    /// 场景开始时自动触发对话
    ///
    /// 不涉及区域占用，也不订阅完成通知。
    pub fn autostart(
        &mut self,
        ctx: &mut PortalContext<'_>,
    ) -> Result<TransitionOutcome, ConfigError> {
        let Some(gate) = self.gate.as_mut().filter(|g| g.trigger_on_start()) else {
            return Ok(TransitionOutcome::Ignored);
        };

        match gate.try_activate(ctx.director, ctx.scheduler, ctx.sink) {
            Ok(session) => {
                info!(portal = %self.name, session = %session, "自动触发对话");
                Ok(TransitionOutcome::DialogueStarted(session))
            }
            Err(GateRejection::InvalidScript(err)) => Err(err),
            Err(rejection) => {
                debug!(portal = %self.name, reason = %rejection, "自动触发被拒绝");
                Ok(TransitionOutcome::Ignored)
            }
        }
    }

    /// 销毁前的清理：退订（重复调用是空操作）
    pub fn teardown(&mut self, ctx: &mut PortalContext<'_>) -> bool {
        self.occupied = false;
        ctx.director.unsubscribe(self.id)
    }

    pub fn id(&self) -> ControllerId {
        self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn scene(&self) -> &str {
        &self.scene
    }

    pub fn required_tag(&self) -> &str {
        &self.required_tag
    }

    pub fn state(&self) -> ControllerState {
        self.state
    }

    /// 角色是否在区域内
    pub fn is_occupied(&self) -> bool {
        self.occupied
    }

    pub fn gate(&self) -> Option<&DialogueGate> {
        self.gate.as_ref()
    }
}
