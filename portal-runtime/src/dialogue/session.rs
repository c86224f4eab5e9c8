//! # Session 模块
//!
//! 一次完整的对话播放：台词队列 + 每句一个打字机。
//!
//! ## 推进规则
//!
//! ```text
//! advance():
//!   Typing（打字机仍在显示） -> 取消打字机，完整显示当前句 -> LineReady
//!   LineReady                -> 出队下一句开始显示      -> Typing
//!   LineReady（队列已空）    -> Ended，完成通知（仅一次）
//!   Idle / Ended             -> 空操作
//! ```
//!
//! 第 N+1 句只会在第 N 句到达 `LineReady` 之后开始显示。

use std::collections::VecDeque;
use std::fmt;
use std::time::Duration;

use tracing::debug;

use super::typewriter::TypewriterSession;
use crate::error::DialogueError;
use crate::host::DialogueSink;
use crate::script::{DialogueLine, SharedScript};
use crate::state::SessionState;
use crate::timer::{Scheduler, TimerId};

/// 会话标识
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SessionId(u64);

impl SessionId {
    pub fn new(raw: u64) -> Self {
        Self(raw)
    }
}

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// `advance()` 的结果
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AdvanceOutcome {
    /// 会话未开始或已结束，什么也没做
    Ignored,
    /// 跳过打字机，当前句已完整显示
    Skipped,
    /// 开始显示下一句
    NextLine,
    /// 队列耗尽，会话结束（完成通知只会出现这一次）
    Completed,
}

/// 对话会话
#[derive(Debug)]
pub struct DialogueSession {
    id: SessionId,
    typing_interval: Duration,
    script: Option<SharedScript>,
    remaining: VecDeque<DialogueLine>,
    current: Option<DialogueLine>,
    typewriter: Option<TypewriterSession>,
    state: SessionState,
    completion_fired: bool,
}

impl DialogueSession {
    /// 创建尚未开始的会话
    pub fn new(id: SessionId, typing_interval: Duration) -> Self {
        Self {
            id,
            typing_interval,
            script: None,
            remaining: VecDeque::new(),
            current: None,
            typewriter: None,
            state: SessionState::Idle,
            completion_fired: false,
        }
    }

    /// 开始播放脚本
    ///
    /// 脚本未配置或没有台词时返回 [`DialogueError::InvalidScript`]，会话保持 `Idle`。
    pub fn start(
        &mut self,
        script: Option<SharedScript>,
        scheduler: &mut dyn Scheduler,
        sink: &mut dyn DialogueSink,
    ) -> Result<(), DialogueError> {
        if self.state != SessionState::Idle {
            return Err(DialogueError::AlreadyStarted);
        }

        let script = match script {
            Some(script) if !script.is_empty() => script,
            Some(script) => {
                return Err(DialogueError::InvalidScript {
                    name: Some(script.name().to_string()),
                });
            }
            None => return Err(DialogueError::InvalidScript { name: None }),
        };

        debug!(session = %self.id, script = script.name(), lines = script.len(), "会话开始");
        self.remaining = script.lines().iter().cloned().collect();
        self.script = Some(script);

        sink.set_panel_visible(true);
        self.show_next_line(scheduler, sink);
        Ok(())
    }

    /// 推进对话
    pub fn advance(
        &mut self,
        scheduler: &mut dyn Scheduler,
        sink: &mut dyn DialogueSink,
    ) -> AdvanceOutcome {
        match self.state {
            SessionState::Idle | SessionState::Ended => AdvanceOutcome::Ignored,
            SessionState::Typing => {
                if let Some(tw) = self.typewriter.as_mut()
                    && tw.cancel(scheduler, sink)
                {
                    self.state = SessionState::LineReady;
                    return AdvanceOutcome::Skipped;
                }
                // 打字机已经结束但状态尚未同步，按 LineReady 处理
                self.next_or_finish(scheduler, sink)
            }
            SessionState::LineReady => self.next_or_finish(scheduler, sink),
        }
    }

    /// 处理到期计时器，返回是否属于本会话
    pub fn on_timer(
        &mut self,
        id: TimerId,
        scheduler: &mut dyn Scheduler,
        sink: &mut dyn DialogueSink,
    ) -> bool {
        if self.state != SessionState::Typing {
            return false;
        }
        let Some(tw) = self.typewriter.as_mut() else {
            return false;
        };

        let handled = tw.on_timer(id, scheduler, sink);
        if handled && tw.is_done() {
            debug!(session = %self.id, "当前句显示完成");
            self.state = SessionState::LineReady;
        }
        handled
    }

    /// 强制结束
    ///
    /// 取消进行中的打字机、清空队列并直接进入 `Ended`。
    /// 返回是否触发了完成通知（已结束时为 false）。
    pub fn force_end(&mut self, scheduler: &mut dyn Scheduler, sink: &mut dyn DialogueSink) -> bool {
        if self.state == SessionState::Ended {
            return false;
        }

        if let Some(tw) = self.typewriter.as_mut() {
            tw.halt(scheduler);
        }
        debug!(session = %self.id, skipped = self.remaining.len(), "会话被强制结束");
        self.finish(sink)
    }

    fn next_or_finish(
        &mut self,
        scheduler: &mut dyn Scheduler,
        sink: &mut dyn DialogueSink,
    ) -> AdvanceOutcome {
        if self.show_next_line(scheduler, sink) {
            AdvanceOutcome::NextLine
        } else if self.finish(sink) {
            AdvanceOutcome::Completed
        } else {
            AdvanceOutcome::Ignored
        }
    }

    /// 出队下一句并开始逐字显示，队列为空时返回 false
    fn show_next_line(&mut self, scheduler: &mut dyn Scheduler, sink: &mut dyn DialogueSink) -> bool {
        let Some(line) = self.remaining.pop_front() else {
            return false;
        };

        sink.set_portrait(line.portrait.as_ref());
        let mut tw = TypewriterSession::new(line.text.as_str(), self.typing_interval);
        tw.start(scheduler, sink);

        self.typewriter = Some(tw);
        self.current = Some(line);
        self.state = SessionState::Typing;
        true
    }

    /// 进入终态，返回是否是第一次完成
    fn finish(&mut self, sink: &mut dyn DialogueSink) -> bool {
        self.state = SessionState::Ended;
        self.remaining.clear();
        self.current = None;
        self.typewriter = None;

        if self.completion_fired {
            return false;
        }
        self.completion_fired = true;
        sink.set_panel_visible(false);
        true
    }

    pub fn id(&self) -> SessionId {
        self.id
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    /// 正在播放的脚本
    pub fn script(&self) -> Option<&SharedScript> {
        self.script.as_ref()
    }

    /// 脚本名称（未开始时为空串）
    pub fn script_name(&self) -> &str {
        self.script.as_ref().map_or("", |s| s.name())
    }

    /// 当前显示的台词
    pub fn current_line(&self) -> Option<&DialogueLine> {
        self.current.as_ref()
    }

    /// 队列中剩余的台词数（不含当前句）
    pub fn remaining_lines(&self) -> usize {
        self.remaining.len()
    }

    /// 当前已显示的文本
    pub fn visible_text(&self) -> &str {
        self.typewriter.as_ref().map_or("", |tw| tw.visible_text())
    }

    /// 是否已开始且未结束
    pub fn is_active(&self) -> bool {
        self.state.is_active()
    }

    /// 完成通知是否已经发出
    pub fn completion_fired(&self) -> bool {
        self.completion_fired
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::host::{HostEvent, Transcript};
    use crate::script::{DialogueScript, PortraitRef};
    use crate::timer::TimerQueue;

    const INTERVAL: Duration = Duration::from_millis(30);

    fn script(lines: &[&str]) -> SharedScript {
        DialogueScript::new(
            "test",
            lines.iter().map(|l| DialogueLine::narration(*l)).collect(),
        )
        .into_shared()
    }

    fn started(lines: &[&str]) -> (DialogueSession, TimerQueue, Transcript) {
        let mut timers = TimerQueue::new();
        let mut sink = Transcript::new();
        let mut session = DialogueSession::new(SessionId::new(1), INTERVAL);
        session
            .start(Some(script(lines)), &mut timers, &mut sink)
            .unwrap();
        (session, timers, sink)
    }

    fn run(session: &mut DialogueSession, timers: &mut TimerQueue, sink: &mut Transcript, dt: Duration) {
        timers.advance(dt);
        while let Some(id) = timers.next_due() {
            session.on_timer(id, timers, sink);
        }
    }

    #[test]
    fn test_two_advances_per_line_complete_once() {
        for lines in [
            vec!["一"],
            vec!["第一句", "第二句"],
            vec!["a", "bb", "", "dddd", "e"],
        ] {
            let (mut session, mut timers, mut sink) = started(&lines);
            let n = lines.len();

            let outcomes: Vec<_> = (0..2 * n)
                .map(|_| session.advance(&mut timers, &mut sink))
                .collect();

            assert_eq!(session.state(), SessionState::Ended);
            assert_eq!(
                outcomes
                    .iter()
                    .filter(|o| **o == AdvanceOutcome::Completed)
                    .count(),
                1
            );
            assert_eq!(outcomes.last(), Some(&AdvanceOutcome::Completed));
            assert_eq!(timers.pending_count(), 0);
        }
    }

    #[test]
    fn test_advance_after_ended_is_noop() {
        let (mut session, mut timers, mut sink) = started(&["只有一句"]);
        session.advance(&mut timers, &mut sink);
        assert_eq!(session.advance(&mut timers, &mut sink), AdvanceOutcome::Completed);

        for _ in 0..5 {
            assert_eq!(session.advance(&mut timers, &mut sink), AdvanceOutcome::Ignored);
        }
        assert!(!session.force_end(&mut timers, &mut sink));
        assert!(session.completion_fired());
    }

    #[test]
    fn test_skip_then_next_line() {
        let (mut session, mut timers, mut sink) = started(&["abc", "de"]);
        assert_eq!(session.state(), SessionState::Typing);
        assert_eq!(session.visible_text(), "a");

        assert_eq!(session.advance(&mut timers, &mut sink), AdvanceOutcome::Skipped);
        assert_eq!(session.state(), SessionState::LineReady);
        assert_eq!(session.visible_text(), "abc");

        assert_eq!(session.advance(&mut timers, &mut sink), AdvanceOutcome::NextLine);
        assert_eq!(session.state(), SessionState::Typing);
        assert_eq!(session.current_line().map(|l| l.text.as_str()), Some("de"));
        assert_eq!(session.remaining_lines(), 0);
    }

    #[test]
    fn test_natural_reveal_reaches_line_ready() {
        let (mut session, mut timers, mut sink) = started(&["ab", "c"]);

        // 2 个字 + 结尾等待 = 2 个间隔
        run(&mut session, &mut timers, &mut sink, INTERVAL * 2);
        assert_eq!(session.state(), SessionState::LineReady);

        // 已完整显示时一次推进就进入下一句
        assert_eq!(session.advance(&mut timers, &mut sink), AdvanceOutcome::NextLine);
        run(&mut session, &mut timers, &mut sink, INTERVAL);
        assert_eq!(session.advance(&mut timers, &mut sink), AdvanceOutcome::Completed);
    }

    #[test]
    fn test_line_waits_for_previous_line() {
        let (mut session, mut timers, mut sink) = started(&["abc", "xyz"]);

        // 不推进时，时间再久也不会显示第二句
        run(&mut session, &mut timers, &mut sink, Duration::from_secs(5));
        assert_eq!(session.state(), SessionState::LineReady);
        assert!(!sink.texts().iter().any(|t| t.starts_with('x')));
    }

    #[test]
    fn test_force_end_mid_line() {
        let (mut session, mut timers, mut sink) = started(&["abcdef", "g"]);

        assert!(session.force_end(&mut timers, &mut sink));
        assert_eq!(session.state(), SessionState::Ended);
        assert_eq!(session.remaining_lines(), 0);
        assert_eq!(timers.pending_count(), 0);
        assert_eq!(sink.events().last(), Some(&HostEvent::Panel(false)));

        assert!(!session.force_end(&mut timers, &mut sink));
        assert_eq!(session.advance(&mut timers, &mut sink), AdvanceOutcome::Ignored);
    }

    #[test]
    fn test_force_end_before_start_fires_once() {
        let mut timers = TimerQueue::new();
        let mut sink = Transcript::new();
        let mut session = DialogueSession::new(SessionId::new(7), INTERVAL);

        assert!(session.force_end(&mut timers, &mut sink));
        assert!(!session.force_end(&mut timers, &mut sink));
    }

    #[test]
    fn test_start_rejects_invalid_script() {
        let mut timers = TimerQueue::new();
        let mut sink = Transcript::new();
        let mut session = DialogueSession::new(SessionId::new(1), INTERVAL);

        assert_eq!(
            session.start(None, &mut timers, &mut sink),
            Err(DialogueError::InvalidScript { name: None })
        );
        assert_eq!(
            session.start(Some(script(&[])), &mut timers, &mut sink),
            Err(DialogueError::InvalidScript {
                name: Some("test".to_string())
            })
        );
        assert_eq!(session.state(), SessionState::Idle);
        assert!(sink.events().is_empty());

        session
            .start(Some(script(&["ok"])), &mut timers, &mut sink)
            .unwrap();
        assert_eq!(
            session.start(Some(script(&["again"])), &mut timers, &mut sink),
            Err(DialogueError::AlreadyStarted)
        );
    }

    #[test]
    fn test_portrait_and_panel_writes() {
        let mut timers = TimerQueue::new();
        let mut sink = Transcript::new();
        let mut session = DialogueSession::new(SessionId::new(1), INTERVAL);
        let script = DialogueScript::new(
            "portraits",
            vec![DialogueLine::new("hero", "嗨"), DialogueLine::narration("…")],
        )
        .into_shared();
        session.start(Some(script), &mut timers, &mut sink).unwrap();
        for _ in 0..4 {
            session.advance(&mut timers, &mut sink);
        }

        assert_eq!(
            sink.collapsed(),
            vec![
                HostEvent::Panel(true),
                HostEvent::Portrait(Some(PortraitRef::new("hero"))),
                HostEvent::Text("嗨".to_string()),
                HostEvent::Portrait(None),
                HostEvent::Text("…".to_string()),
                HostEvent::Panel(false),
            ]
        );
    }
}
