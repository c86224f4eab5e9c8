//! # Host 模块
//!
//! Runtime 从宿主环境消费的能力接口。
//!
//! ```text
//! Runtime                         Host
//!   │── set_text / set_portrait ──►│  DialogueSink（只写展示目标）
//!   │── set_panel_visible ────────►│
//!   │── load(scene) ──────────────►│  SceneLoader（发出即忘）
//! ```
//!
//! Runtime 从不读取这些目标的状态，也不等待场景加载完成。

use serde::Serialize;
use std::cell::RefCell;
use std::rc::Rc;

use crate::script::PortraitRef;

/// 对话展示目标
pub trait DialogueSink {
    /// 覆盖当前显示的文本
    fn set_text(&mut self, text: &str);

    /// 设置当前立绘（None 表示隐藏立绘）
    fn set_portrait(&mut self, portrait: Option<&PortraitRef>);

    /// 显示/隐藏对话面板
    fn set_panel_visible(&mut self, _visible: bool) {}
}

/// 场景加载能力
pub trait SceneLoader {
    /// 按名称加载场景
    fn load(&mut self, scene: &str);
}

/// 宿主侧收到的一次写入
#[derive(Debug, Clone, PartialEq, Serialize)]
pub enum HostEvent {
    /// 文本被覆盖
    Text(String),
    /// 立绘被设置
    Portrait(Option<PortraitRef>),
    /// 面板显隐
    Panel(bool),
    /// 场景加载请求
    LoadScene(String),
}

/// 记录型宿主
///
/// 同时实现 [`DialogueSink`] 和 [`SceneLoader`]，把所有写入按顺序记录下来。
/// 克隆得到的句柄共享同一份记录，便于同一个 transcript 分别作为 sink 和 loader 传入。
#[derive(Debug, Clone, Default)]
pub struct Transcript {
    events: Rc<RefCell<Vec<HostEvent>>>,
}

impl Transcript {
    pub fn new() -> Self {
        Self::default()
    }

    /// 全部事件的快照
    pub fn events(&self) -> Vec<HostEvent> {
        self.events.borrow().clone()
    }

    /// 所有场景加载请求
    pub fn loads(&self) -> Vec<String> {
        self.events
            .borrow()
            .iter()
            .filter_map(|e| match e {
                HostEvent::LoadScene(scene) => Some(scene.clone()),
                _ => None,
            })
            .collect()
    }

    /// 所有文本写入（包含打字机的中间状态）
    pub fn texts(&self) -> Vec<String> {
        self.events
            .borrow()
            .iter()
            .filter_map(|e| match e {
                HostEvent::Text(text) => Some(text.clone()),
                _ => None,
            })
            .collect()
    }

    /// 最近一次写入的文本
    pub fn last_text(&self) -> Option<String> {
        self.events.borrow().iter().rev().find_map(|e| match e {
            HostEvent::Text(text) => Some(text.clone()),
            _ => None,
        })
    }

    /// 折叠后的事件：打字机逐字写入的前缀只保留最终文本
    pub fn collapsed(&self) -> Vec<HostEvent> {
        let events = self.events.borrow();
        let mut out: Vec<HostEvent> = Vec::with_capacity(events.len());
        for event in events.iter() {
            if let (Some(HostEvent::Text(prev)), HostEvent::Text(next)) = (out.last(), event)
                && next.starts_with(prev.as_str())
            {
                out.pop();
            }
            out.push(event.clone());
        }
        out
    }

    /// 清空记录
    pub fn clear(&self) {
        self.events.borrow_mut().clear();
    }

    fn push(&self, event: HostEvent) {
        self.events.borrow_mut().push(event);
    }
}

impl DialogueSink for Transcript {
    fn set_text(&mut self, text: &str) {
        self.push(HostEvent::Text(text.to_string()));
    }

    fn set_portrait(&mut self, portrait: Option<&PortraitRef>) {
        self.push(HostEvent::Portrait(portrait.cloned()));
    }

    fn set_panel_visible(&mut self, visible: bool) {
        self.push(HostEvent::Panel(visible));
    }
}

impl SceneLoader for Transcript {
    fn load(&mut self, scene: &str) {
        self.push(HostEvent::LoadScene(scene.to_string()));
    }
}
