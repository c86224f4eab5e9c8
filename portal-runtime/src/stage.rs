//! # Stage 模块
//!
//! 舞台：宿主主循环里唯一的拥有者。
//!
//! ## 职责
//!
//! - 持有对话导演、计时队列、展示目标、场景加载器和全部传送门控制器
//! - 把宿主输入分发给对应的控制器或当前对话
//! - 会话结束时把完成通知**同步**转发给订阅者，然后清理残留订阅
//!
//! ## 每帧顺序
//!
//! ```text
//! tick(dt, inputs)
//!   1. 按顺序处理区域信号 / 强制结束
//!   2. 本帧至少有一个 Advance 时推进一次对话
//!   3. 推进（缩放后的）时间，按到期顺序处理计时器
//! ```
//!
//! 一帧内遇到的配置错误不会中断这一帧，全部收集后由 `tick` 返回。

use std::collections::BTreeMap;
use std::time::Duration;

use tracing::{debug, error, info, warn};

use crate::config::StageConfig;
use crate::dialogue::{AdvanceOutcome, DialogueCompleted, DialogueDirector};
use crate::error::{ConfigError, PortalError, PortalResult};
use crate::host::{DialogueSink, SceneLoader};
use crate::input::StageInput;
use crate::portal::{ControllerId, PortalContext, PortalSpec, TransitionController, TransitionOutcome};
use crate::script::ScriptLibrary;
use crate::timer::{Scheduler, TimerId, TimerQueue};

/// 一条输入的处理结果
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InputOutcome {
    /// 进入/离开区域
    Region(TransitionOutcome),
    /// 推进对话
    Advanced(AdvanceOutcome),
    /// 强制结束，是否真的结束了一个会话
    ForceEnded(bool),
}

/// 控制器以外的协作者
#[derive(Debug)]
struct Services<S, L> {
    director: DialogueDirector,
    timers: TimerQueue,
    sink: S,
    loader: Option<L>,
}

impl<S: DialogueSink, L: SceneLoader> Services<S, L> {
    fn ctx(&mut self) -> PortalContext<'_> {
        PortalContext {
            director: &mut self.director,
            scheduler: &mut self.timers,
            sink: &mut self.sink,
            loader: self.loader.as_mut().map(|l| l as &mut dyn SceneLoader),
        }
    }
}

/// 舞台
#[derive(Debug)]
pub struct Stage<S, L> {
    services: Services<S, L>,
    portals: BTreeMap<ControllerId, TransitionController>,
    next_portal: u32,
    autostart_delay: Duration,
    autostarts: Vec<(TimerId, ControllerId)>,
    begun: bool,
}

impl<S: DialogueSink, L: SceneLoader> Stage<S, L> {
    /// 创建空舞台
    ///
    /// `loader` 为 `None` 时所有传送门都不工作（只记录警告）。
    pub fn new(typing_interval: Duration, sink: S, loader: Option<L>) -> Self {
        Self {
            services: Services {
                director: DialogueDirector::new(typing_interval),
                timers: TimerQueue::new(),
                sink,
                loader,
            },
            portals: BTreeMap::new(),
            next_portal: 1,
            autostart_delay: Duration::ZERO,
            autostarts: Vec::new(),
            begun: false,
        }
    }

    /// 从配置构建舞台
    ///
    /// 配置先经过 [`StageConfig::validate`]；引用不存在的脚本时返回错误。
    pub fn from_config(
        config: &StageConfig,
        library: &ScriptLibrary,
        sink: S,
        loader: Option<L>,
    ) -> PortalResult<Self> {
        config.validate()?;

        let mut stage = Self::new(config.typing_interval(), sink, loader);
        stage.set_time_scale(config.time_scale);
        stage.autostart_delay = config.autostart_delay();

        for portal in &config.portals {
            stage.add_portal(portal.to_spec(library)?);
        }

        info!(portals = stage.portals.len(), "舞台已构建");
        Ok(stage)
    }

    /// 设置自动触发延迟
    pub fn with_autostart_delay(mut self, delay: Duration) -> Self {
        self.autostart_delay = delay;
        self
    }

    /// 设置全局时间倍率
    pub fn set_time_scale(&mut self, time_scale: f32) {
        self.services.timers.set_time_scale(time_scale);
    }

    /// 添加传送门
    pub fn add_portal(&mut self, spec: PortalSpec) -> ControllerId {
        let id = ControllerId::new(self.next_portal);
        self.next_portal += 1;
        debug!(portal = %spec.name, id = %id, "添加传送门");
        self.portals.insert(id, TransitionController::new(id, spec));
        id
    }

    /// 移除传送门
    ///
    /// 先退订再移除，之后的完成通知不会再送到这个控制器。
    pub fn remove_portal(&mut self, id: ControllerId) -> Option<TransitionController> {
        let mut controller = self.portals.remove(&id)?;
        controller.teardown(&mut self.services.ctx());

        let timers = &mut self.services.timers;
        self.autostarts.retain(|(timer, owner)| {
            if *owner == id {
                timers.cancel(*timer);
                false
            } else {
                true
            }
        });

        debug!(portal = %controller.name(), "移除传送门");
        Some(controller)
    }

    /// 按名称查找传送门
    pub fn portal_id(&self, name: &str) -> Option<ControllerId> {
        self.portals
            .values()
            .find(|c| c.name() == name)
            .map(|c| c.id())
    }

    pub fn portal(&self, id: ControllerId) -> Option<&TransitionController> {
        self.portals.get(&id)
    }

    /// 按名称获取传送门
    pub fn portal_named(&self, name: &str) -> Option<&TransitionController> {
        self.portals.values().find(|c| c.name() == name)
    }

    pub fn portals(&self) -> impl Iterator<Item = &TransitionController> {
        self.portals.values()
    }

    /// 场景开始：为 `trigger_on_start` 的触发门预约自动触发
    ///
    /// 只生效一次，返回预约数量。
    pub fn begin(&mut self) -> usize {
        if self.begun {
            return 0;
        }
        self.begun = true;

        let delay = self.autostart_delay;
        for controller in self.portals.values() {
            if controller.gate().is_some_and(|g| g.trigger_on_start()) {
                let timer = self.services.timers.after(delay);
                self.autostarts.push((timer, controller.id()));
            }
        }

        if !self.autostarts.is_empty() {
            info!(count = self.autostarts.len(), delay = ?delay, "预约自动触发对话");
        }
        self.autostarts.len()
    }

    /// 处理一条输入
    ///
    /// 对话结束时转发通知遇到的配置错误也会返回（只返回第一个，其余记录日志）。
    pub fn apply(&mut self, input: StageInput) -> PortalResult<InputOutcome> {
        match input {
            StageInput::Enter { portal, actor } => {
                Ok(InputOutcome::Region(self.enter(&portal, &actor)?))
            }
            StageInput::Exit { portal, actor } => {
                Ok(InputOutcome::Region(self.exit(&portal, &actor)))
            }
            StageInput::Advance => {
                let (outcome, errors) = self.advance_and_dispatch();
                first_error(errors)?;
                Ok(InputOutcome::Advanced(outcome))
            }
            StageInput::ForceEnd => {
                let (ended, errors) = self.force_end_and_dispatch();
                first_error(errors)?;
                Ok(InputOutcome::ForceEnded(ended))
            }
        }
    }

    /// 角色进入传送门区域
    ///
    /// 配置错误会记录日志并返回给调用方。
    pub fn enter(&mut self, portal: &str, actor: &str) -> Result<TransitionOutcome, ConfigError> {
        let Some(controller) = find_named(&mut self.portals, portal) else {
            warn!(portal, "未知的传送门");
            return Ok(TransitionOutcome::Ignored);
        };

        let result = controller.on_region_enter(actor, &mut self.services.ctx());
        match &result {
            Ok(outcome) => debug!(portal, actor, outcome = ?outcome, "进入区域"),
            Err(err) => error!(portal, error = %err, "传送门配置错误"),
        }
        result
    }

    /// 角色离开传送门区域
    pub fn exit(&mut self, portal: &str, actor: &str) -> TransitionOutcome {
        let Some(controller) = find_named(&mut self.portals, portal) else {
            warn!(portal, "未知的传送门");
            return TransitionOutcome::Ignored;
        };

        let outcome = controller.on_region_exit(actor, &mut self.services.ctx());
        debug!(portal, actor, outcome = ?outcome, "离开区域");
        outcome
    }

    /// 推进当前对话
    ///
    /// 转发完成通知时的配置错误只记录日志；需要拿到错误时用 [`apply`](Self::apply)。
    pub fn advance_dialogue(&mut self) -> AdvanceOutcome {
        self.advance_and_dispatch().0
    }

    /// 强制结束当前对话，返回是否真的结束了一个会话
    pub fn force_end_dialogue(&mut self) -> bool {
        self.force_end_and_dispatch().0
    }

    fn advance_and_dispatch(&mut self) -> (AdvanceOutcome, Vec<ConfigError>) {
        let services = &mut self.services;
        let (outcome, completed) = services
            .director
            .advance(&mut services.timers, &mut services.sink);

        let errors = match completed {
            Some(completed) => self.dispatch(completed),
            None => Vec::new(),
        };
        (outcome, errors)
    }

    fn force_end_and_dispatch(&mut self) -> (bool, Vec<ConfigError>) {
        let services = &mut self.services;
        match services
            .director
            .force_end(&mut services.timers, &mut services.sink)
        {
            Some(completed) => (true, self.dispatch(completed)),
            None => (false, Vec::new()),
        }
    }

    /// 把完成通知同步转发给订阅者，返回转发过程中遇到的配置错误
    fn dispatch(&mut self, completed: DialogueCompleted) -> Vec<ConfigError> {
        let mut errors = Vec::new();
        for id in &completed.observers {
            let Some(controller) = self.portals.get_mut(id) else {
                continue;
            };
            if let Err(err) =
                controller.on_dialogue_completed(completed.session, &mut self.services.ctx())
            {
                error!(portal = %controller.name(), error = %err, "传送门配置错误");
                errors.push(err);
            }
        }

        let pruned = self.services.director.prune_observers(completed.session);
        if pruned > 0 {
            debug!(session = %completed.session, pruned, "清理残留订阅");
        }
        errors
    }

    /// 运行一帧
    ///
    /// 返回本帧遇到的全部错误，按发生顺序排列。
    pub fn tick(
        &mut self,
        dt: Duration,
        inputs: impl IntoIterator<Item = StageInput>,
    ) -> Vec<PortalError> {
        let mut errors = Vec::new();
        let mut advance_requested = false;
        for input in inputs {
            let result = match input {
                StageInput::Advance => {
                    advance_requested = true;
                    continue;
                }
                other => self.apply(other),
            };
            if let Err(err) = result {
                errors.push(err);
            }
        }
        if advance_requested {
            let (_, dispatch_errors) = self.advance_and_dispatch();
            errors.extend(dispatch_errors.into_iter().map(PortalError::from));
        }

        self.services.timers.advance(dt);
        while let Some(timer) = self.services.timers.next_due() {
            if let Err(err) = self.fire_timer(timer) {
                errors.push(err.into());
            }
        }
        errors
    }

    fn fire_timer(&mut self, timer: TimerId) -> Result<(), ConfigError> {
        if let Some(pos) = self.autostarts.iter().position(|(t, _)| *t == timer) {
            let (_, id) = self.autostarts.remove(pos);
            if let Some(controller) = self.portals.get_mut(&id)
                && let Err(err) = controller.autostart(&mut self.services.ctx())
            {
                error!(portal = %controller.name(), error = %err, "自动触发配置错误");
                return Err(err);
            }
            return Ok(());
        }

        let services = &mut self.services;
        services
            .director
            .on_timer(timer, &mut services.timers, &mut services.sink);
        Ok(())
    }

    pub fn director(&self) -> &DialogueDirector {
        &self.services.director
    }

    /// 是否有对话正在进行
    pub fn is_dialogue_active(&self) -> bool {
        self.services.director.is_any_active()
    }

    pub fn timers(&self) -> &TimerQueue {
        &self.services.timers
    }

    pub fn sink(&self) -> &S {
        &self.services.sink
    }

    pub fn sink_mut(&mut self) -> &mut S {
        &mut self.services.sink
    }

    pub fn loader(&self) -> Option<&L> {
        self.services.loader.as_ref()
    }

    /// 等待中的自动触发数量
    pub fn pending_autostarts(&self) -> usize {
        self.autostarts.len()
    }
}

fn first_error(errors: Vec<ConfigError>) -> Result<(), ConfigError> {
    match errors.into_iter().next() {
        Some(err) => Err(err),
        None => Ok(()),
    }
}

fn find_named<'a>(
    portals: &'a mut BTreeMap<ControllerId, TransitionController>,
    name: &str,
) -> Option<&'a mut TransitionController> {
    portals.values_mut().find(|c| c.name() == name)
}
