//! # Portal Runtime
//!
//! 对话门控场景切换的核心运行时库。
//!
//! ## 架构概述
//!
//! `portal-runtime` 是纯逻辑核心，不依赖任何 IO 或渲染引擎。
//! 宿主每帧把区域信号和推进输入交给 [`Stage`]，Runtime 通过能力接口写回：
//!
//! ```text
//! Host                              Runtime
//!   │──── StageInput ─────────────►│
//!   │                               │ tick(dt)
//!   │◄─── set_text / set_portrait ──│  DialogueSink
//!   │◄─── load(scene) ──────────────│  SceneLoader
//! ```
//!
//! ## 核心流程
//!
//! 进入区域 -> [`TransitionController`] -> [`DialogueGate::try_activate`]
//! -> [`DialogueSession`] 逐句播放 -> 完成通知 -> 仍在区域内则加载场景
//!
//! ## 使用示例
//!
//! ```ignore
//! use portal_runtime::{Stage, StageConfig, StageInput, ScriptLibrary, Transcript};
//!
//! let config = StageConfig::from_json(config_text)?;
//! let mut library = ScriptLibrary::new();
//! library.insert_json(script_text)?;
//!
//! let transcript = Transcript::new();
//! let mut stage = Stage::from_config(&config, &library, transcript.clone(), Some(transcript.clone()))?;
//! stage.begin();
//!
//! loop {
//!     for err in stage.tick(frame_time, poll_inputs()) {
//!         report(err);
//!     }
//! }
//! ```
//!
//! ## 模块结构
//!
//! - [`script`]：对话脚本与脚本库
//! - [`dialogue`]：打字机、对话会话、对话导演
//! - [`portal`]：触发门与传送门控制器
//! - [`stage`]：主循环拥有者
//! - [`timer`]：协作式计时调度
//! - [`host`]：宿主能力接口
//! - [`config`]：配置数据模型
//! - [`state`]：状态机定义
//! - [`error`]：错误类型定义

pub mod config;
pub mod dialogue;
pub mod error;
pub mod host;
pub mod input;
pub mod portal;
pub mod script;
pub mod stage;
pub mod state;
pub mod timer;

// 重导出核心类型
pub use config::{GateConfig, PortalConfig, StageConfig};
pub use dialogue::{
    AdvanceOutcome, DialogueCompleted, DialogueDirector, DialogueSession, SessionId,
    TypewriterSession,
};
pub use error::{ConfigError, DialogueError, PortalError, PortalResult};
pub use host::{DialogueSink, HostEvent, SceneLoader, Transcript};
pub use input::StageInput;
pub use portal::{
    ControllerId, DialogueGate, GateRejection, PortalContext, PortalSpec, TransitionController,
    TransitionOutcome,
};
pub use script::{DialogueLine, DialogueScript, PortraitRef, ScriptLibrary, SharedScript};
pub use stage::{InputOutcome, Stage};
pub use state::{ControllerState, SessionState, TypewriterState};
pub use timer::{Scheduler, TimerId, TimerQueue};
