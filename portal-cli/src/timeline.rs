//! # Timeline 模块
//!
//! 输入时间线：按时间点排列的舞台输入，逐帧回放给 [`Stage`]。
//!
//! ```json
//! { "events": [
//!     { "at": 0.5, "input": { "type": "enter", "portal": "cave_door", "actor": "Player" } },
//!     { "at": 1.0, "input": { "type": "advance" } }
//! ] }
//! ```

use std::fs;
use std::path::Path;
use std::time::Duration;

use anyhow::{Context, bail};
use portal_runtime::{DialogueSink, PortalError, SceneLoader, Stage, StageInput};
use serde::{Deserialize, Serialize};
use tracing::debug;

/// 时间线上的一个事件
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TimelineEvent {
    /// 触发时间（秒）
    pub at: f64,
    pub input: StageInput,
}

/// 输入时间线
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Timeline {
    #[serde(default)]
    pub events: Vec<TimelineEvent>,
}

impl Timeline {
    /// 从 JSON 文本解析，事件按时间稳定排序
    pub fn from_json(text: &str) -> anyhow::Result<Self> {
        let mut timeline: Timeline = serde_json::from_str(text)?;
        if let Some(bad) = timeline
            .events
            .iter()
            .find(|e| !e.at.is_finite() || e.at < 0.0)
        {
            bail!("事件时间必须是非负数，实际为 {}", bad.at);
        }
        timeline.events.sort_by(|a, b| a.at.total_cmp(&b.at));
        Ok(timeline)
    }

    /// 最后一个事件的时间
    pub fn duration(&self) -> f64 {
        self.events.last().map_or(0.0, |e| e.at)
    }
}

/// 回放结果
#[derive(Debug, Default)]
pub struct Playback {
    /// 运行的帧数
    pub frames: usize,
    /// 回放中遇到的错误（帧号, 错误）
    pub errors: Vec<(usize, PortalError)>,
}

/// 读取时间线文件
pub fn load(path: &Path) -> anyhow::Result<Timeline> {
    let text = fs::read_to_string(path)
        .with_context(|| format!("读取时间线失败: {}", path.display()))?;
    Timeline::from_json(&text).with_context(|| format!("解析时间线失败: {}", path.display()))
}

/// 按固定帧长回放时间线
///
/// 时间落在 `[帧开始, 帧结束)` 内的事件在该帧开头送入；最后一个事件之后再运行 `settle`。
pub fn play<S: DialogueSink, L: SceneLoader>(
    stage: &mut Stage<S, L>,
    timeline: &Timeline,
    dt: Duration,
    settle: Duration,
) -> Playback {
    let mut playback = Playback::default();
    if dt.is_zero() {
        return playback;
    }

    let dt_secs = dt.as_secs_f64();
    let end = timeline.duration() + settle.as_secs_f64();
    let mut events = timeline.events.iter().peekable();
    let mut frame = 0usize;

    loop {
        let frame_start = frame as f64 * dt_secs;
        if frame_start > end {
            break;
        }
        let frame_end = frame_start + dt_secs;

        let mut inputs = Vec::new();
        while let Some(event) = events.next_if(|e| e.at < frame_end) {
            debug!(frame, at = event.at, input = ?event.input, "送入输入");
            inputs.push(event.input.clone());
        }
        playback
            .errors
            .extend(stage.tick(dt, inputs).into_iter().map(|err| (frame, err)));
        frame += 1;
    }

    playback.frames = frame;
    playback
}

#[cfg(test)]
mod tests {
    use super::*;
    use portal_runtime::{DialogueGate, DialogueLine, DialogueScript, PortalSpec, Transcript};

    #[test]
    fn test_parse_and_sort() {
        let timeline = Timeline::from_json(
            r#"{"events":[
                {"at":1.0,"input":{"type":"advance"}},
                {"at":0.5,"input":{"type":"enter","portal":"door","actor":"Player"}},
                {"at":1.0,"input":{"type":"force_end"}}
            ]}"#,
        )
        .unwrap();

        assert_eq!(timeline.events[0].input, StageInput::enter("door", "Player"));
        // 同一时间的事件保持原顺序
        assert_eq!(timeline.events[1].input, StageInput::Advance);
        assert_eq!(timeline.events[2].input, StageInput::ForceEnd);
        assert_eq!(timeline.duration(), 1.0);
    }

    #[test]
    fn test_negative_time_rejected() {
        assert!(Timeline::from_json(r#"{"events":[{"at":-1,"input":{"type":"advance"}}]}"#).is_err());
        assert_eq!(Timeline::from_json("{}").unwrap().duration(), 0.0);
    }

    #[test]
    fn test_play_runs_dialogue_to_load() {
        let transcript = Transcript::new();
        let mut stage = Stage::new(
            Duration::from_millis(30),
            transcript.clone(),
            Some(transcript.clone()),
        );
        stage.add_portal(PortalSpec::new("door", "Level2").with_gate(DialogueGate::once(
            DialogueScript::new("intro", vec![DialogueLine::narration("你好")]).into_shared(),
        )));

        let timeline = Timeline::from_json(
            r#"{"events":[
                {"at":0.0,"input":{"type":"enter","portal":"door","actor":"Player"}},
                {"at":0.5,"input":{"type":"advance"}}
            ]}"#,
        )
        .unwrap();

        let playback = play(
            &mut stage,
            &timeline,
            Duration::from_millis(100),
            Duration::from_millis(250),
        );
        assert_eq!(playback.frames, 8);
        assert!(playback.errors.is_empty());
        assert_eq!(transcript.loads(), vec!["Level2".to_string()]);
    }

    #[test]
    fn test_play_zero_dt() {
        let transcript = Transcript::new();
        let mut stage: Stage<Transcript, Transcript> =
            Stage::new(Duration::from_millis(30), transcript, None);
        let playback = play(&mut stage, &Timeline::default(), Duration::ZERO, Duration::ZERO);
        assert_eq!(playback.frames, 0);
    }

    #[test]
    fn test_play_reports_config_errors() {
        let transcript = Transcript::new();
        let mut stage = Stage::new(
            Duration::from_millis(30),
            transcript.clone(),
            Some(transcript.clone()),
        );
        stage.add_portal(PortalSpec::new("broken", ""));

        let timeline = Timeline::from_json(
            r#"{"events":[{"at":0.25,"input":{"type":"enter","portal":"broken","actor":"Player"}}]}"#,
        )
        .unwrap();

        let playback = play(&mut stage, &timeline, Duration::from_millis(100), Duration::ZERO);
        assert_eq!(playback.errors.len(), 1);
        assert_eq!(playback.errors[0].0, 2);
        assert!(transcript.loads().is_empty());
    }
}
