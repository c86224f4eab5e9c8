//! # Config 模块
//!
//! 舞台配置的数据模型与校验。
//!
//! 文件读写由宿主负责，这里只处理 JSON 文本与内存中的结构。
//!
//! ```json
//! {
//!   "typing_interval": 0.03,
//!   "portals": [
//!     { "name": "cave_door", "scene": "Level2",
//!       "dialogue": { "script": "cave_intro", "fire_once": true } }
//!   ]
//! }
//! ```

use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::time::Duration;

use crate::error::ConfigError;
use crate::portal::controller::DEFAULT_REQUIRED_TAG;
use crate::portal::{DialogueGate, PortalSpec};
use crate::script::ScriptLibrary;

/// 舞台配置
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StageConfig {
    /// 打字机每个字的间隔（秒）
    #[serde(default = "default_typing_interval")]
    pub typing_interval: f32,

    /// 全局时间倍率（0 表示暂停）
    #[serde(default = "default_time_scale")]
    pub time_scale: f32,

    /// 场景开始后自动触发对话的延迟（秒）
    #[serde(default = "default_autostart_delay")]
    pub autostart_delay: f32,

    /// 传送门列表
    #[serde(default)]
    pub portals: Vec<PortalConfig>,
}

/// 传送门配置
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PortalConfig {
    pub name: String,

    /// 目标场景
    #[serde(default)]
    pub scene: String,

    /// 触发所需的角色标签
    #[serde(default = "default_required_tag")]
    pub required_tag: String,

    /// 对话触发门（不配置则直接加载）
    #[serde(default)]
    pub dialogue: Option<GateConfig>,
}

/// 对话触发门配置
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GateConfig {
    /// 脚本名称
    pub script: String,

    /// 是否只触发一次
    #[serde(default = "default_fire_once")]
    pub fire_once: bool,

    /// 场景开始时自动触发
    #[serde(default)]
    pub trigger_on_start: bool,
}

// 默认值函数
fn default_typing_interval() -> f32 {
    0.03
}

fn default_time_scale() -> f32 {
    1.0
}

fn default_autostart_delay() -> f32 {
    0.1
}

fn default_required_tag() -> String {
    DEFAULT_REQUIRED_TAG.to_string()
}

fn default_fire_once() -> bool {
    true
}

impl Default for StageConfig {
    fn default() -> Self {
        Self {
            typing_interval: default_typing_interval(),
            time_scale: default_time_scale(),
            autostart_delay: default_autostart_delay(),
            portals: Vec::new(),
        }
    }
}

impl PortalConfig {
    pub fn new(name: impl Into<String>, scene: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            scene: scene.into(),
            required_tag: default_required_tag(),
            dialogue: None,
        }
    }

    pub fn with_dialogue(mut self, gate: GateConfig) -> Self {
        self.dialogue = Some(gate);
        self
    }

    /// 根据脚本库构建传送门定义
    ///
    /// 引用的脚本不存在时返回 [`ConfigError::UnknownScript`]。
    /// 空脚本不在这里拒绝，触发时会按配置错误处理并直接加载场景。
    pub fn to_spec(&self, library: &ScriptLibrary) -> Result<PortalSpec, ConfigError> {
        let mut spec = PortalSpec::new(&self.name, &self.scene).with_required_tag(&self.required_tag);
        if let Some(gate) = &self.dialogue {
            let script = library.require(&gate.script)?;
            spec = spec.with_gate(
                DialogueGate::new(Some(script), gate.fire_once)
                    .with_trigger_on_start(gate.trigger_on_start),
            );
        }
        Ok(spec)
    }
}

impl GateConfig {
    pub fn new(script: impl Into<String>) -> Self {
        Self {
            script: script.into(),
            fire_once: default_fire_once(),
            trigger_on_start: false,
        }
    }
}

impl StageConfig {
    /// 从 JSON 文本解析
    pub fn from_json(json: &str) -> Result<Self, ConfigError> {
        serde_json::from_str(json).map_err(|e| ConfigError::Parse {
            message: e.to_string(),
        })
    }

    /// 序列化为带缩进的 JSON
    pub fn to_json_pretty(&self) -> Result<String, ConfigError> {
        serde_json::to_string_pretty(self).map_err(|e| ConfigError::Parse {
            message: e.to_string(),
        })
    }

    /// 打字间隔
    pub fn typing_interval(&self) -> Duration {
        seconds(self.typing_interval)
    }

    /// 自动触发延迟
    pub fn autostart_delay(&self) -> Duration {
        seconds(self.autostart_delay)
    }

    /// 验证配置有效性（不涉及脚本内容）
    pub fn validate(&self) -> Result<(), ConfigError> {
        check_seconds("typing_interval", self.typing_interval)?;
        check_seconds("time_scale", self.time_scale)?;
        check_seconds("autostart_delay", self.autostart_delay)?;

        let mut names = BTreeSet::new();
        for portal in &self.portals {
            if !names.insert(portal.name.as_str()) {
                return Err(ConfigError::DuplicatePortal {
                    name: portal.name.clone(),
                });
            }
            if portal.scene.trim().is_empty() {
                return Err(ConfigError::MissingScene {
                    portal: portal.name.clone(),
                });
            }
            if portal.required_tag.is_empty() {
                return Err(ConfigError::InvalidValue {
                    field: format!("portals.{}.required_tag", portal.name),
                    message: "标签不能为空".to_string(),
                });
            }
        }

        Ok(())
    }

    /// 验证配置及其引用的脚本
    pub fn validate_against(&self, library: &ScriptLibrary) -> Result<(), ConfigError> {
        self.validate()?;
        for gate in self.portals.iter().filter_map(|p| p.dialogue.as_ref()) {
            library.require(&gate.script)?.validate()?;
        }
        Ok(())
    }
}

fn check_seconds(field: &str, value: f32) -> Result<(), ConfigError> {
    if !value.is_finite() || value < 0.0 {
        return Err(ConfigError::InvalidValue {
            field: field.to_string(),
            message: format!("必须是非负数，实际为 {value}"),
        });
    }
    Ok(())
}

fn seconds(value: f32) -> Duration {
    Duration::try_from_secs_f32(value).unwrap_or_default()
}
