//! # Typewriter 模块
//!
//! 单句台词的逐字显示控制器。
//!
//! ## 时间线
//!
//! ```text
//! start()        -> set_text("")，立即显示第 1 个字，预约下一次
//! 每次到期       -> 再显示 1 个字，预约下一次
//! 最后一个字之后 -> 再等待一个间隔，进入 Finished
//! cancel()       -> 取消预约，立即写入完整文本，进入 Cancelled
//! ```
//!
//! 一个会话只能 `start` 一次，想重新播放就创建新的会话。

use std::time::Duration;

use crate::host::DialogueSink;
use crate::state::TypewriterState;
use crate::timer::{Scheduler, TimerId};

/// 按字符数截取前缀（按 `char` 计数，不会切断多字节字符）
pub fn char_prefix(text: &str, chars: usize) -> &str {
    match text.char_indices().nth(chars) {
        Some((end, _)) => &text[..end],
        None => text,
    }
}

/// 逐字显示的前缀序列
///
/// 惰性地产生 `"" , "你", "你好", ...` 直到完整文本。
/// 打字机的每次写入正好对应这个序列中的一项。
pub fn reveal_steps(text: &str) -> impl Iterator<Item = &str> {
    std::iter::once("").chain(
        text.char_indices()
            .map(move |(i, c)| &text[..i + c.len_utf8()]),
    )
}

/// 打字机会话
#[derive(Debug, Clone)]
pub struct TypewriterSession {
    text: String,
    total_chars: usize,
    revealed: usize,
    interval: Duration,
    pending: Option<TimerId>,
    state: TypewriterState,
}

impl TypewriterSession {
    /// 创建打字机会话（尚未开始）
    ///
    /// `interval` 是每个字之间的间隔（游戏时间）。
    pub fn new(text: impl Into<String>, interval: Duration) -> Self {
        let text = text.into();
        Self {
            total_chars: text.chars().count(),
            text,
            revealed: 0,
            interval,
            pending: None,
            state: TypewriterState::Idle,
        }
    }

    /// 开始逐字显示
    ///
    /// 只有 `Idle` 状态可以开始，返回是否真的开始了。
    pub fn start(&mut self, scheduler: &mut dyn Scheduler, sink: &mut dyn DialogueSink) -> bool {
        if self.state != TypewriterState::Idle {
            return false;
        }

        self.state = TypewriterState::Revealing;
        sink.set_text("");
        self.step(scheduler, sink);
        true
    }

    /// 处理到期的计时器
    ///
    /// 不是本会话预约的 id 返回 false。
    pub fn on_timer(
        &mut self,
        id: TimerId,
        scheduler: &mut dyn Scheduler,
        sink: &mut dyn DialogueSink,
    ) -> bool {
        if self.pending != Some(id) {
            return false;
        }
        self.pending = None;

        if self.revealed < self.total_chars {
            self.step(scheduler, sink);
        } else {
            self.state = TypewriterState::Finished;
        }
        true
    }

    /// 立即显示完整文本
    ///
    /// 已经结束（自然完成或已取消）时是空操作，返回 false。
    /// 返回 true 后不会再有任何逐字写入。
    pub fn cancel(&mut self, scheduler: &mut dyn Scheduler, sink: &mut dyn DialogueSink) -> bool {
        if self.is_done() {
            return false;
        }

        if let Some(id) = self.pending.take() {
            scheduler.cancel(id);
        }
        self.revealed = self.total_chars;
        self.state = TypewriterState::Cancelled;
        sink.set_text(&self.text);
        true
    }

    /// 静默中止：只取消预约，不再写入 sink
    ///
    /// 用于会话被强制结束时，展示目标可能已经不存在。
    pub fn halt(&mut self, scheduler: &mut dyn Scheduler) -> bool {
        if self.is_done() {
            return false;
        }

        if let Some(id) = self.pending.take() {
            scheduler.cancel(id);
        }
        self.revealed = self.total_chars;
        self.state = TypewriterState::Cancelled;
        true
    }

    /// 显示下一个字并预约下一次
    fn step(&mut self, scheduler: &mut dyn Scheduler, sink: &mut dyn DialogueSink) {
        if self.revealed < self.total_chars {
            self.revealed += 1;
            sink.set_text(self.visible_text());
        }
        self.pending = Some(scheduler.after(self.interval));
    }

    /// 当前状态
    pub fn state(&self) -> TypewriterState {
        self.state
    }

    /// 是否仍在逐字显示
    pub fn is_revealing(&self) -> bool {
        self.state == TypewriterState::Revealing
    }

    /// 是否已结束（自然完成或被取消）
    pub fn is_done(&self) -> bool {
        matches!(
            self.state,
            TypewriterState::Finished | TypewriterState::Cancelled
        )
    }

    /// 完整文本
    pub fn text(&self) -> &str {
        &self.text
    }

    /// 当前已显示的部分
    pub fn visible_text(&self) -> &str {
        char_prefix(&self.text, self.revealed)
    }

    /// 已显示字符数
    pub fn revealed_chars(&self) -> usize {
        self.revealed
    }

    /// 当前等待中的计时器
    pub fn pending_timer(&self) -> Option<TimerId> {
        self.pending
    }
}
