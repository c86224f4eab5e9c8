//! # xtask - 开发辅助工具
//!
//! 提供本地质量门禁与开发辅助命令。
//!
//! ## 命令
//!
//! - `check-all`: 运行 fmt、clippy、test
//! - `cov-runtime`: 运行 portal-runtime 覆盖率
//! - `cov-workspace`: 运行 workspace 覆盖率
//! - `content-check`: 检查对话脚本与舞台配置（空脚本、未知脚本引用、空场景名）

use std::path::{Path, PathBuf};
use std::process::{Command, ExitCode};

use portal_runtime::{ConfigError, DialogueScript, ScriptLibrary, StageConfig};
use walkdir::WalkDir;

fn run(step: &str, cmd: &mut Command) -> anyhow::Result<()> {
    eprintln!("\n==> {step}");
    let status = cmd.status()?;
    if !status.success() {
        anyhow::bail!("{step} failed with {status}");
    }
    Ok(())
}

fn ensure_cargo_llvm_cov_available() -> anyhow::Result<()> {
    let mut cmd = Command::new("cargo");
    cmd.args(["llvm-cov", "--version"]);
    let status = cmd.status();
    match status {
        Ok(s) if s.success() => Ok(()),
        _ => anyhow::bail!(
            "cargo llvm-cov 不可用。\n\
请先安装：\n\
  - cargo install cargo-llvm-cov\n\
  - rustup component add llvm-tools-preview\n\
然后重试。"
        ),
    }
}

fn main() -> ExitCode {
    if let Err(e) = real_main() {
        eprintln!("xtask error: {e:#}");
        return ExitCode::from(1);
    }
    ExitCode::from(0)
}

fn real_main() -> anyhow::Result<()> {
    let mut args = std::env::args().skip(1);
    let sub = args.next().unwrap_or_else(|| "help".to_string());

    match sub.as_str() {
        "check-all" => {
            let mut fmt = Command::new("cargo");
            fmt.args(["fmt", "--all", "--", "--check"]);
            run("cargo fmt --all -- --check", &mut fmt)?;

            let mut clippy = Command::new("cargo");
            clippy.args(["clippy", "--workspace", "--all-targets"]);
            run("cargo clippy --workspace --all-targets", &mut clippy)?;

            let mut test = Command::new("cargo");
            test.args(["test", "--workspace"]);
            run("cargo test --workspace", &mut test)?;
        }
        "cov-runtime" => {
            ensure_cargo_llvm_cov_available()?;

            let mut cov = Command::new("cargo");
            cov.args(["llvm-cov", "-p", "portal-runtime", "--all-features", "--html"]);
            run(
                "cargo llvm-cov -p portal-runtime --all-features --html",
                &mut cov,
            )?;

            eprintln!("\nCoverage HTML: target/llvm-cov/html/index.html");
        }
        "cov-workspace" => {
            ensure_cargo_llvm_cov_available()?;

            // 排除 xtask，只看 runtime 与宿主
            let mut cov = Command::new("cargo");
            cov.args([
                "llvm-cov",
                "--workspace",
                "--exclude",
                "xtask",
                "--all-features",
                "--html",
            ]);
            run(
                "cargo llvm-cov --workspace --exclude xtask --all-features --html",
                &mut cov,
            )?;

            eprintln!("\nCoverage HTML: target/llvm-cov/html/index.html");
        }
        "content-check" => {
            let path = args.next();
            content_check(path.as_deref())?;
        }
        "help" | "-h" | "--help" => {
            print_help();
        }
        other => anyhow::bail!("unknown xtask subcommand: {other}"),
    }

    Ok(())
}

fn print_help() {
    eprintln!(
        r#"xtask - 开发辅助工具

USAGE:
  cargo xtask <command>

COMMANDS:
  check-all       运行 fmt、clippy、test 门禁检查
  cov-runtime     运行 portal-runtime 覆盖率报告
  cov-workspace   运行 workspace 覆盖率报告
  content-check   检查对话脚本与舞台配置

CONTENT-CHECK:
  cargo xtask content-check [dir]

  不带参数：检查 demos/ 下所有 .json 文件
  带路径参数：检查指定目录

  含 "lines" 字段的文件按对话脚本检查，含 "portals" 字段的按舞台配置检查，
  含 "events" 字段的时间线跳过，其余文件给出警告：
    - 脚本解析错误、空脚本、脚本重名
    - 配置解析错误、空场景名、传送门重名
    - 引用了不存在的对话脚本

ALIASES (in .cargo/config.toml):
  cargo check-all     -> cargo xtask check-all
  cargo cov-runtime   -> cargo xtask cov-runtime
  cargo cov-workspace -> cargo xtask cov-workspace
  cargo content-check -> cargo xtask content-check
"#
    );
}

//=============================================================================
// content-check 命令实现
//=============================================================================

/// 默认内容目录（相对于 workspace root）
const DEFAULT_CONTENT_DIR: &str = "demos";

/// 检查结果
#[derive(Debug, Default)]
struct ContentCheckResult {
    scripts_checked: usize,
    configs_checked: usize,
    timelines_skipped: usize,
    errors: Vec<String>,
    warnings: Vec<String>,
}

impl ContentCheckResult {
    fn error(&mut self, file: &Path, message: impl std::fmt::Display) {
        self.errors.push(format!("{}: {message}", file.display()));
    }

    fn warn(&mut self, file: &Path, message: impl std::fmt::Display) {
        self.warnings.push(format!("{}: {message}", file.display()));
    }
}

/// 执行内容检查
fn content_check(path: Option<&str>) -> anyhow::Result<()> {
    let dir = PathBuf::from(path.unwrap_or(DEFAULT_CONTENT_DIR));
    if !dir.is_dir() {
        anyhow::bail!(
            "内容目录不存在: {}\n请在 workspace 根目录运行，或指定目录",
            dir.display()
        );
    }

    let files = collect_json_files(&dir)?;
    if files.is_empty() {
        eprintln!("未找到内容文件（.json）");
        return Ok(());
    }

    eprintln!("==> 检查 {} 个文件...\n", files.len());
    let result = check_files(&files)?;
    print_check_result(&result);

    if !result.errors.is_empty() {
        anyhow::bail!("内容检查发现错误");
    }
    Ok(())
}

/// 收集目录下的所有 json 文件
fn collect_json_files(dir: &Path) -> anyhow::Result<Vec<PathBuf>> {
    let mut files = Vec::new();
    for entry in WalkDir::new(dir).sort_by_file_name() {
        let entry = entry?;
        if entry.file_type().is_file() && entry.path().extension().is_some_and(|ext| ext == "json") {
            files.push(entry.into_path());
        }
    }
    Ok(files)
}

/// 先读脚本，再用脚本库校验配置
fn check_files(files: &[PathBuf]) -> anyhow::Result<ContentCheckResult> {
    let mut result = ContentCheckResult::default();
    let mut library = ScriptLibrary::new();
    let mut configs = Vec::new();

    for file in files {
        let content = match std::fs::read_to_string(file) {
            Ok(c) => c,
            Err(e) => {
                result.error(file, format!("无法读取文件 - {e}"));
                continue;
            }
        };

        let value: serde_json::Value = match serde_json::from_str(&content) {
            Ok(v) => v,
            Err(e) => {
                result.error(file, format!("JSON 解析失败 - {e}"));
                continue;
            }
        };

        if value.get("lines").is_some() {
            result.scripts_checked += 1;
            check_script(file, &content, &mut library, &mut result);
        } else if value.get("portals").is_some() {
            configs.push((file, content));
        } else if value.get("events").is_some() {
            result.timelines_skipped += 1;
        } else {
            result.warn(file, "无法识别的内容文件（缺少 lines / portals / events 字段），已跳过");
        }
    }

    for (file, content) in configs {
        result.configs_checked += 1;
        check_config(file, &content, &library, &mut result);
    }

    Ok(result)
}

fn check_script(
    file: &Path,
    content: &str,
    library: &mut ScriptLibrary,
    result: &mut ContentCheckResult,
) {
    let script = match DialogueScript::from_json(content) {
        Ok(s) => s,
        Err(e) => {
            result.error(file, e);
            return;
        }
    };

    if let Err(e) = script.validate() {
        result.error(file, e);
    }
    if script.lines().iter().any(|l| l.text.trim().is_empty()) {
        result.warn(file, format!("脚本 '{}' 含有空台词", script.name()));
    }
    if library.contains(script.name()) {
        result.error(file, format!("脚本名称 '{}' 重复", script.name()));
        return;
    }
    library.insert(script);
}

fn check_config(file: &Path, content: &str, library: &ScriptLibrary, result: &mut ContentCheckResult) {
    let config = match StageConfig::from_json(content) {
        Ok(c) => c,
        Err(e) => {
            result.error(file, e);
            return;
        }
    };

    if let Err(e) = config.validate() {
        result.error(file, e);
    }

    // 逐个报告脚本引用问题，而不是遇到第一个就停止
    for portal in &config.portals {
        let Some(gate) = &portal.dialogue else {
            continue;
        };
        match library.require(&gate.script) {
            Ok(_) => {}
            Err(e @ ConfigError::UnknownScript { .. }) => {
                result.error(file, format!("传送门 '{}' - {e}", portal.name));
            }
            Err(e) => result.error(file, e),
        }
    }
}

/// 输出检查结果
fn print_check_result(result: &ContentCheckResult) {
    eprintln!("─────────────────────────────────────────────────────");
    eprintln!(
        "检查完成: {} 个脚本, {} 个配置（跳过 {} 个时间线）",
        result.scripts_checked, result.configs_checked, result.timelines_skipped
    );
    eprintln!();

    for error in &result.errors {
        eprintln!("[ERROR] {error}");
    }
    for warning in &result.warnings {
        eprintln!("[WARN] {warning}");
    }

    eprintln!();
    if !result.errors.is_empty() {
        eprintln!(
            "❌ {} 个错误, {} 个警告",
            result.errors.len(),
            result.warnings.len()
        );
    } else if !result.warnings.is_empty() {
        eprintln!("⚠️  0 个错误, {} 个警告", result.warnings.len());
    } else {
        eprintln!("✅ 检查通过，无错误");
    }
}
