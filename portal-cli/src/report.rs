//! # Report 模块
//!
//! 把宿主记录渲染成文本输出。

use portal_runtime::HostEvent;

/// 逐行渲染宿主事件
pub fn render(events: &[HostEvent]) -> Vec<String> {
    events
        .iter()
        .map(|event| match event {
            HostEvent::Text(text) => format!("  {text}"),
            HostEvent::Portrait(Some(portrait)) => format!("[立绘] {}", portrait.as_str()),
            HostEvent::Portrait(None) => "[立绘] （无）".to_string(),
            HostEvent::Panel(true) => "[对话框] 显示".to_string(),
            HostEvent::Panel(false) => "[对话框] 隐藏".to_string(),
            HostEvent::LoadScene(scene) => format!("[加载场景] {scene}"),
        })
        .collect()
}
