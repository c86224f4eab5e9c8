//! # Timer 模块
//!
//! 协作式计时器：所有"等待 N 秒后继续"都表达为一次预约，由宿主主循环推进。
//!
//! ## 执行模型
//!
//! ```text
//! 每帧：
//!   timers.advance(dt)                 // 按全局时间倍率累计目标时间
//!   while let Some(id) = timers.next_due() {
//!       dispatch(id)                   // 在 id 的到期时刻执行，可以再次预约
//!   }
//! ```
//!
//! `next_due` 会把当前时间推到该计时器的到期时刻，因此回调里新的预约
//! 以到期时刻为基准，一帧内可以连续触发多次（dt 大于间隔时不会丢字）。

use std::time::Duration;
use tracing::warn;

/// 浮点累计误差容限
const DUE_EPSILON: f64 = 1e-9;

/// 计时器标识
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TimerId(u64);

impl TimerId {
    pub fn raw(&self) -> u64 {
        self.0
    }
}

/// 调度能力
///
/// 对应宿主提供的 `after(seconds, callback)`。回调由 [`TimerId`] 表示，
/// 到期后由持有者把 id 分发回预约方。
pub trait Scheduler {
    /// 预约在 `delay`（受时间倍率影响）之后触发
    fn after(&mut self, delay: Duration) -> TimerId;

    /// 取消尚未触发的预约，返回是否真的取消了
    fn cancel(&mut self, id: TimerId) -> bool;
}

#[derive(Debug, Clone)]
struct PendingTimer {
    id: TimerId,
    due: f64,
}

/// 计时器队列
///
/// 时间单位为秒（已乘以时间倍率的"游戏时间"）。
#[derive(Debug, Clone)]
pub struct TimerQueue {
    now: f64,
    target: f64,
    time_scale: f32,
    next_id: u64,
    pending: Vec<PendingTimer>,
}

impl TimerQueue {
    /// 创建时间倍率为 1.0 的计时器队列
    pub fn new() -> Self {
        Self {
            now: 0.0,
            target: 0.0,
            time_scale: 1.0,
            next_id: 0,
            pending: Vec::new(),
        }
    }

    /// 指定时间倍率创建
    pub fn with_time_scale(time_scale: f32) -> Self {
        let mut queue = Self::new();
        queue.set_time_scale(time_scale);
        queue
    }

    /// 当前时间倍率
    pub fn time_scale(&self) -> f32 {
        self.time_scale
    }

    /// 设置时间倍率（0 表示暂停，负数视为 0）
    pub fn set_time_scale(&mut self, time_scale: f32) {
        if !time_scale.is_finite() || time_scale < 0.0 {
            warn!(time_scale, "时间倍率无效，按 0 处理");
            self.time_scale = 0.0;
        } else {
            self.time_scale = time_scale;
        }
    }

    /// 当前游戏时间（秒）
    pub fn now(&self) -> f64 {
        self.now
    }

    /// 推进真实时间 `dt`
    ///
    /// 只移动目标时间，到期的计时器需要通过 [`next_due`](Self::next_due) 逐个取出。
    pub fn advance(&mut self, dt: Duration) {
        self.target += dt.as_secs_f64() * self.time_scale as f64;
    }

    /// 取出下一个在目标时间之前到期的计时器
    ///
    /// 到期时刻相同时按预约顺序返回。没有到期计时器时，当前时间追上目标时间。
    pub fn next_due(&mut self) -> Option<TimerId> {
        let index = self
            .pending
            .iter()
            .enumerate()
            .filter(|(_, t)| t.due <= self.target + DUE_EPSILON)
            .min_by(|(_, a), (_, b)| a.due.total_cmp(&b.due).then(a.id.cmp(&b.id)))
            .map(|(i, _)| i);

        match index {
            Some(i) => {
                let timer = self.pending.remove(i);
                self.now = self.now.max(timer.due);
                Some(timer.id)
            }
            None => {
                self.now = self.target;
                None
            }
        }
    }

    /// 是否仍在等待
    pub fn is_pending(&self, id: TimerId) -> bool {
        self.pending.iter().any(|t| t.id == id)
    }

    /// 等待中的计时器数量
    pub fn pending_count(&self) -> usize {
        self.pending.len()
    }
}

impl Default for TimerQueue {
    fn default() -> Self {
        Self::new()
    }
}

impl Scheduler for TimerQueue {
    fn after(&mut self, delay: Duration) -> TimerId {
        let id = TimerId(self.next_id);
        self.next_id += 1;
        self.pending.push(PendingTimer {
            id,
            due: self.now + delay.as_secs_f64(),
        });
        id
    }

    fn cancel(&mut self, id: TimerId) -> bool {
        let before = self.pending.len();
        self.pending.retain(|t| t.id != id);
        self.pending.len() != before
    }
}
