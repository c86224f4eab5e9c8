//! # Script 模块
//!
//! 对话脚本数据模型。
//!
//! ## 设计说明
//!
//! - 对话脚本是外部编写的只读资源，Runtime 只负责播放，不决定内容
//! - 脚本构造后不可变，通过 [`SharedScript`]（`Arc`）在多个触发门之间共享
//! - "同一个脚本" 指同一个 `Arc` 实例（指针相等），而不是内容相等
//!
//! ## JSON 格式
//!
//! ```text
//! {
//!   "name": "portal_intro",
//!   "lines": [
//!     { "portrait": "hero_smile", "text": "终于到了。" },
//!     { "text": "（门后传来风声）" }
//!   ]
//! }
//! ```

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::Arc;

use crate::error::ConfigError;

/// 共享的对话脚本引用
pub type SharedScript = Arc<DialogueScript>;

/// 立绘句柄
///
/// 对 Runtime 来说是不透明的标识，只原样转交给 [`DialogueSink`](crate::host::DialogueSink)。
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PortraitRef(String);

impl PortraitRef {
    /// 创建立绘句柄
    pub fn new(handle: impl Into<String>) -> Self {
        Self(handle.into())
    }

    /// 获取句柄字符串
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

/// 单句台词
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DialogueLine {
    /// 说话者立绘（None 表示不显示立绘）
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub portrait: Option<PortraitRef>,
    /// 台词文本
    pub text: String,
}

impl DialogueLine {
    /// 创建带立绘的台词
    pub fn new(portrait: impl Into<String>, text: impl Into<String>) -> Self {
        Self {
            portrait: Some(PortraitRef::new(portrait)),
            text: text.into(),
        }
    }

    /// 创建无立绘的台词（旁白）
    pub fn narration(text: impl Into<String>) -> Self {
        Self {
            portrait: None,
            text: text.into(),
        }
    }
}

/// 对话脚本
///
/// 一段按顺序播放的台词序列。构造后不可变。
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DialogueScript {
    name: String,
    #[serde(default)]
    lines: Vec<DialogueLine>,
}

impl DialogueScript {
    /// 创建对话脚本
    pub fn new(name: impl Into<String>, lines: Vec<DialogueLine>) -> Self {
        Self {
            name: name.into(),
            lines,
        }
    }

    /// 从 JSON 文本解析
    pub fn from_json(json: &str) -> Result<Self, ConfigError> {
        serde_json::from_str(json).map_err(|e| ConfigError::Parse {
            message: e.to_string(),
        })
    }

    /// 转换为共享引用
    pub fn into_shared(self) -> SharedScript {
        Arc::new(self)
    }

    /// 脚本名称
    pub fn name(&self) -> &str {
        &self.name
    }

    /// 全部台词
    pub fn lines(&self) -> &[DialogueLine] {
        &self.lines
    }

    /// 台词数量
    pub fn len(&self) -> usize {
        self.lines.len()
    }

    /// 是否没有任何台词
    pub fn is_empty(&self) -> bool {
        self.lines.is_empty()
    }

    /// 检查脚本是否可以播放
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.is_empty() {
            return Err(ConfigError::EmptyScript {
                name: self.name.clone(),
            });
        }
        Ok(())
    }
}

/// 对话脚本库
///
/// 按名称索引已加载的脚本。同名脚本在库里只有一个 `Arc` 实例，
/// 因此通过库取出的引用可以直接用指针相等判断是否是同一段对话。
#[derive(Debug, Clone, Default)]
pub struct ScriptLibrary {
    scripts: BTreeMap<String, SharedScript>,
}

impl ScriptLibrary {
    /// 创建空脚本库
    pub fn new() -> Self {
        Self::default()
    }

    /// 加入脚本，返回被替换的同名旧脚本
    pub fn insert(&mut self, script: DialogueScript) -> Option<SharedScript> {
        self.scripts
            .insert(script.name().to_string(), script.into_shared())
    }

    /// 解析 JSON 并加入脚本库，返回脚本名称
    pub fn insert_json(&mut self, json: &str) -> Result<String, ConfigError> {
        let script = DialogueScript::from_json(json)?;
        let name = script.name().to_string();
        self.insert(script);
        Ok(name)
    }

    /// 按名称获取脚本
    pub fn get(&self, name: &str) -> Option<SharedScript> {
        self.scripts.get(name).cloned()
    }

    /// 按名称获取脚本，不存在时返回配置错误
    pub fn require(&self, name: &str) -> Result<SharedScript, ConfigError> {
        self.get(name).ok_or_else(|| ConfigError::UnknownScript {
            name: name.to_string(),
        })
    }

    /// 是否包含指定脚本
    pub fn contains(&self, name: &str) -> bool {
        self.scripts.contains_key(name)
    }

    /// 所有脚本名称（按字典序）
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.scripts.keys().map(String::as_str)
    }

    /// 脚本数量
    pub fn len(&self) -> usize {
        self.scripts.len()
    }

    /// 脚本库是否为空
    pub fn is_empty(&self) -> bool {
        self.scripts.is_empty()
    }
}
