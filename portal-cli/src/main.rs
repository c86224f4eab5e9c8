//! # Portal CLI
//!
//! 无界面宿主：加载舞台配置与对话脚本，按时间线回放区域事件，
//! 输出对话写入与场景加载请求。
//!
//! ## 用法
//!
//! ```bash
//! cargo run -p portal-cli -- --config demos/cave/config.json \
//!     --scripts demos/cave/scripts --timeline demos/cave/timeline.json
//!
//! # 只校验配置与脚本
//! cargo run -p portal-cli -- --config demos/cave/config.json --scripts demos/cave/scripts --check
//! ```

mod assets;
mod report;
mod timeline;

use std::path::PathBuf;
use std::process::ExitCode;
use std::time::Duration;

use anyhow::{Context, bail};
use clap::Parser;
use portal_runtime::{Stage, Transcript};
use tracing::{Level, info};

#[derive(Parser, Debug)]
#[command(name = "portal-cli")]
#[command(about = "无界面宿主 - 按时间线回放区域事件，输出对话与场景切换记录")]
#[command(version)]
struct Cli {
    /// 舞台配置文件
    #[arg(short, long)]
    config: PathBuf,

    /// 对话脚本目录（递归扫描 *.json）
    #[arg(short, long)]
    scripts: PathBuf,

    /// 输入时间线文件
    #[arg(short, long, required_unless_present = "check")]
    timeline: Option<PathBuf>,

    /// 每帧时长（秒）
    #[arg(long, default_value_t = 1.0 / 60.0)]
    dt: f64,

    /// 最后一个事件之后继续运行的时间（秒）
    #[arg(long, default_value_t = 2.0)]
    settle: f64,

    /// 只校验配置与脚本，不回放
    #[arg(long)]
    check: bool,

    /// 日志详细程度（-v info，-vv debug）
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,
}

fn main() -> ExitCode {
    if let Err(e) = real_main() {
        eprintln!("portal-cli error: {e:#}");
        return ExitCode::from(1);
    }
    ExitCode::from(0)
}

fn real_main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    let config = assets::load_config(&cli.config)?;
    let library = assets::load_scripts(&cli.scripts)?;
    config
        .validate_against(&library)
        .context("配置校验失败")?;

    if cli.check {
        println!(
            "✅ 校验通过: {} 个传送门, {} 个脚本",
            config.portals.len(),
            library.len()
        );
        return Ok(());
    }

    let Some(timeline_path) = cli.timeline.as_deref() else {
        bail!("缺少 --timeline 参数");
    };
    let timeline = timeline::load(timeline_path)?;
    let dt = seconds("dt", cli.dt)?;
    if dt.is_zero() {
        bail!("--dt 必须大于 0");
    }
    let settle = seconds("settle", cli.settle)?;

    let transcript = Transcript::new();
    let mut stage = Stage::from_config(
        &config,
        &library,
        transcript.clone(),
        Some(transcript.clone()),
    )?;
    stage.begin();

    let playback = timeline::play(&mut stage, &timeline, dt, settle);
    info!(
        frames = playback.frames,
        events = timeline.events.len(),
        errors = playback.errors.len(),
        "回放结束"
    );

    for line in report::render(&transcript.collapsed()) {
        println!("{line}");
    }

    let loads = transcript.loads();
    println!("─────────────────────────────────────────────────────");
    if loads.is_empty() {
        println!("没有场景加载请求");
    } else {
        println!("场景加载请求: {}", loads.join(", "));
    }

    if !playback.errors.is_empty() {
        for (frame, err) in &playback.errors {
            eprintln!("[ERROR] 第 {frame} 帧: {err}");
        }
        bail!("回放中出现 {} 个错误", playback.errors.len());
    }

    Ok(())
}

fn init_logging(verbose: u8) {
    let level = match verbose {
        0 => Level::WARN,
        1 => Level::INFO,
        _ => Level::DEBUG,
    };
    tracing_subscriber::fmt()
        .with_max_level(level)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();
}

fn seconds(name: &str, value: f64) -> anyhow::Result<Duration> {
    Duration::try_from_secs_f64(value).with_context(|| format!("--{name} 不是有效的秒数: {value}"))
}
