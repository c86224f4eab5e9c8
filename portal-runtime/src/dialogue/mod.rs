//! # Dialogue 模块
//!
//! 对话播放：逐字显示、会话状态机与全局会话槽位。
//!
//! ## 模块结构
//!
//! - [`typewriter`]：单句逐字显示
//! - [`session`]：台词队列与推进规则
//! - [`director`]：当前会话槽位与完成通知订阅

pub mod director;
pub mod session;
pub mod typewriter;

pub use director::{DialogueCompleted, DialogueDirector};
pub use session::{AdvanceOutcome, DialogueSession, SessionId};
pub use typewriter::TypewriterSession;
