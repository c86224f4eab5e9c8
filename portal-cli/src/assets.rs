//! # Assets 模块
//!
//! 从磁盘加载舞台配置与对话脚本。

use std::fs;
use std::path::Path;

use anyhow::{Context, bail};
use portal_runtime::{DialogueScript, ScriptLibrary, StageConfig};
use tracing::{debug, info};
use walkdir::WalkDir;

/// 读取舞台配置
pub fn load_config(path: &Path) -> anyhow::Result<StageConfig> {
    let text = fs::read_to_string(path)
        .with_context(|| format!("读取配置文件失败: {}", path.display()))?;
    let config = StageConfig::from_json(&text)
        .with_context(|| format!("解析配置文件失败: {}", path.display()))?;
    info!(path = %path.display(), portals = config.portals.len(), "配置文件加载成功");
    Ok(config)
}

/// 递归加载目录下所有 `*.json` 对话脚本
///
/// 脚本名称以文件内的 `name` 字段为准，重名视为错误。
pub fn load_scripts(dir: &Path) -> anyhow::Result<ScriptLibrary> {
    if !dir.is_dir() {
        bail!("脚本目录不存在: {}", dir.display());
    }

    let mut library = ScriptLibrary::new();
    for entry in WalkDir::new(dir).sort_by_file_name() {
        let entry = entry?;
        let path = entry.path();
        if !entry.file_type().is_file() || path.extension().is_none_or(|ext| ext != "json") {
            continue;
        }

        let text = fs::read_to_string(path)
            .with_context(|| format!("读取脚本失败: {}", path.display()))?;
        let script = DialogueScript::from_json(&text)
            .with_context(|| format!("解析脚本失败: {}", path.display()))?;

        if library.contains(script.name()) {
            bail!("脚本名称 '{}' 重复: {}", script.name(), path.display());
        }
        debug!(script = script.name(), lines = script.len(), path = %path.display(), "加载脚本");
        library.insert(script);
    }

    info!(count = library.len(), dir = %dir.display(), "脚本加载完成");
    Ok(library)
}
