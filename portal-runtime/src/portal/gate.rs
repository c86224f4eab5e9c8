//! # Gate 模块
//!
//! 对话触发门：决定一次新的对话会话能否开始。
//!
//! ## 拒绝条件（按检查顺序）
//!
//! 1. 脚本未配置或为空 -> `InvalidScript`
//! 2. 同一个脚本的会话已在进行 -> `AlreadyRunning`（调用方应改为订阅已有会话）
//! 3. 只触发一次且已经触发过 -> `AlreadyFired`
//! 4. 其他脚本的会话占用槽位 -> `Busy`

use thiserror::Error;
use tracing::debug;

use crate::dialogue::{DialogueDirector, SessionId};
use crate::error::{ConfigError, DialogueError};
use crate::host::DialogueSink;
use crate::script::SharedScript;
use crate::timer::Scheduler;

/// 触发门拒绝原因
#[derive(Error, Debug, Clone, PartialEq)]
pub enum GateRejection {
    /// 脚本缺失或为空
    #[error("{0}")]
    InvalidScript(ConfigError),

    /// 同一脚本的会话已在进行
    #[error("对话已在进行（会话 {0}）")]
    AlreadyRunning(SessionId),

    /// 只触发一次的门已经触发过
    #[error("对话已触发过")]
    AlreadyFired,

    /// 其他对话占用槽位
    #[error("已有对话 '{current}' 正在进行")]
    Busy { current: String },
}

impl From<DialogueError> for GateRejection {
    fn from(err: DialogueError) -> Self {
        match err {
            DialogueError::InvalidScript { name: None } => {
                Self::InvalidScript(ConfigError::MissingScript)
            }
            DialogueError::InvalidScript { name: Some(name) } => {
                Self::InvalidScript(ConfigError::EmptyScript { name })
            }
            DialogueError::Busy { current } => Self::Busy { current },
            // 新建的会话不会重复启动
            DialogueError::AlreadyStarted => Self::Busy {
                current: String::new(),
            },
        }
    }
}

/// 对话触发门
#[derive(Debug, Clone)]
pub struct DialogueGate {
    script: Option<SharedScript>,
    fire_once: bool,
    has_fired: bool,
    trigger_on_start: bool,
}

impl DialogueGate {
    /// 创建触发门
    pub fn new(script: Option<SharedScript>, fire_once: bool) -> Self {
        Self {
            script,
            fire_once,
            has_fired: false,
            trigger_on_start: false,
        }
    }

    /// 只触发一次的门
    pub fn once(script: SharedScript) -> Self {
        Self::new(Some(script), true)
    }

    /// 每次都触发的门
    pub fn repeating(script: SharedScript) -> Self {
        Self::new(Some(script), false)
    }

    /// 场景开始时自动触发
    pub fn with_trigger_on_start(mut self, trigger_on_start: bool) -> Self {
        self.trigger_on_start = trigger_on_start;
        self
    }

    pub fn script(&self) -> Option<&SharedScript> {
        self.script.as_ref()
    }

    pub fn fire_once(&self) -> bool {
        self.fire_once
    }

    /// 是否已经成功触发过
    pub fn has_fired(&self) -> bool {
        self.has_fired
    }

    pub fn trigger_on_start(&self) -> bool {
        self.trigger_on_start
    }

    /// 检查脚本是否可播放
    pub fn check_script(&self) -> Result<&SharedScript, ConfigError> {
        let script = self.script.as_ref().ok_or(ConfigError::MissingScript)?;
        script.validate()?;
        Ok(script)
    }

    /// 尝试开始新会话
    ///
    /// 成功时标记已触发，并把会话装入导演的当前槽位。
    pub fn try_activate(
        &mut self,
        director: &mut DialogueDirector,
        scheduler: &mut dyn Scheduler,
        sink: &mut dyn DialogueSink,
    ) -> Result<SessionId, GateRejection> {
        let script = self
            .check_script()
            .map_err(GateRejection::InvalidScript)?
            .clone();

        if let Some(running) = director.running_session_for(&script) {
            return Err(GateRejection::AlreadyRunning(running));
        }

        if self.fire_once && self.has_fired {
            debug!(script = script.name(), "触发门已触发过");
            return Err(GateRejection::AlreadyFired);
        }

        let session = director.install(Some(script), scheduler, sink)?;
        self.has_fired = true;
        Ok(session)
    }
}
