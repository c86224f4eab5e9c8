//! # 传送门流程集成测试
//!
//! 通过 Stage 驱动 进入区域 → 对话 → 完成通知 → 场景加载 的完整链路。
//! 宿主侧使用 Transcript 记录所有写入，不依赖真实的渲染或场景系统。

use std::time::Duration;

use portal_runtime::{
    AdvanceOutcome, ConfigError, ControllerState, DialogueGate, DialogueLine, DialogueScript,
    GateConfig, HostEvent, PortalConfig, PortalError, PortalSpec, ScriptLibrary, SessionState,
    Stage, StageConfig, StageInput, Transcript, TransitionOutcome,
};

const FRAME: Duration = Duration::from_micros(16_667);

type TestStage = Stage<Transcript, Transcript>;

/// 创建舞台，sink 与 loader 共用同一份记录
fn new_stage() -> (TestStage, Transcript) {
    let transcript = Transcript::new();
    let stage = Stage::new(
        Duration::from_millis(30),
        transcript.clone(),
        Some(transcript.clone()),
    );
    (stage, transcript)
}

fn script(name: &str, lines: usize) -> DialogueScript {
    DialogueScript::new(
        name,
        (1..=lines)
            .map(|i| DialogueLine::new("guide", format!("第{i}句台词")))
            .collect(),
    )
}

fn render(events: &[HostEvent]) -> String {
    events
        .iter()
        .map(|e| match e {
            HostEvent::Text(text) => format!("text: {text}"),
            HostEvent::Portrait(Some(p)) => format!("portrait: {}", p.as_str()),
            HostEvent::Portrait(None) => "portrait: -".to_string(),
            HostEvent::Panel(visible) => format!("panel: {visible}"),
            HostEvent::LoadScene(scene) => format!("load: {scene}"),
        })
        .collect::<Vec<_>>()
        .join("\n")
}

/// 2N 次推进结束会话，完成通知只触发一次
#[test]
fn test_two_advances_per_line_end_session() {
    for n in 1..=4 {
        let (mut stage, transcript) = new_stage();
        stage.add_portal(
            PortalSpec::new("door", "Level2")
                .with_gate(DialogueGate::repeating(script("talk", n).into_shared())),
        );
        stage.enter("door", "Player").unwrap();

        let outcomes: Vec<_> = (0..2 * n).map(|_| stage.advance_dialogue()).collect();
        assert_eq!(outcomes.last(), Some(&AdvanceOutcome::Completed));
        assert_eq!(
            outcomes
                .iter()
                .filter(|o| **o == AdvanceOutcome::Completed)
                .count(),
            1
        );
        assert!(!stage.is_dialogue_active());
        assert_eq!(transcript.loads(), vec!["Level2".to_string()]);

        // 结束后的推进全部是空操作
        for _ in 0..5 {
            assert_eq!(stage.advance_dialogue(), AdvanceOutcome::Ignored);
        }
        assert!(!stage.force_end_dialogue());
        assert_eq!(transcript.loads().len(), 1);
    }
}

/// 没有触发门：同步加载一次
#[test]
fn test_enter_without_gate_loads_synchronously() {
    let (mut stage, transcript) = new_stage();
    stage.add_portal(PortalSpec::new("exit", "Level2"));

    assert_eq!(
        stage.enter("exit", "Player"),
        Ok(TransitionOutcome::SceneRequested)
    );
    assert_eq!(transcript.events(), vec![HostEvent::LoadScene("Level2".to_string())]);

    stage.exit("exit", "Player");
    stage.enter("exit", "Player").unwrap();
    assert_eq!(transcript.loads().len(), 1);
}

/// 离开区域后对话结束：不加载
#[test]
fn test_exit_before_completion_drops_load() {
    let (mut stage, transcript) = new_stage();
    let id = stage.add_portal(
        PortalSpec::new("door", "Level2").with_gate(DialogueGate::once(script("intro", 2).into_shared())),
    );

    stage.tick(FRAME, [StageInput::enter("door", "Player")]);
    assert!(stage.is_dialogue_active());
    stage.tick(FRAME, [StageInput::exit("door", "Player")]);
    assert_eq!(stage.director().subscription_of(id), None);

    for _ in 0..4 {
        stage.tick(FRAME, [StageInput::Advance]);
    }
    assert!(!stage.is_dialogue_active());
    assert!(transcript.loads().is_empty());
    // 已退订的控制器收不到通知，停留在等待状态
    assert_eq!(
        stage.portal(id).unwrap().state(),
        ControllerState::AwaitingDialogue
    );

    // 之后再运行多久都不会补发加载
    for _ in 0..120 {
        stage.tick(FRAME, []);
    }
    assert!(transcript.loads().is_empty());
}

/// 触发门已经触发过：重新进入直接加载，不再创建会话
#[test]
fn test_reenter_after_fired_gate_loads_without_session() {
    let (mut stage, transcript) = new_stage();
    stage.add_portal(
        PortalSpec::new("door", "Level2").with_gate(DialogueGate::once(script("intro", 2).into_shared())),
    );

    stage.enter("door", "Player").unwrap();
    stage.exit("door", "Player");
    assert!(stage.force_end_dialogue());
    let before = transcript.events().len();

    assert_eq!(
        stage.enter("door", "Player"),
        Ok(TransitionOutcome::SceneRequested)
    );
    assert!(!stage.is_dialogue_active());
    // 只有一次加载，没有任何对话面板写入
    assert_eq!(
        transcript.events()[before..],
        [HostEvent::LoadScene("Level2".to_string())]
    );
}

/// 两个区域共用同一脚本：只存在一个会话，后进入的订阅已有会话
#[test]
fn test_shared_script_single_session() {
    let mut library = ScriptLibrary::new();
    library.insert(script("shared", 2));

    let mut config = StageConfig::default();
    config
        .portals
        .push(PortalConfig::new("left", "Level2").with_dialogue(GateConfig::new("shared")));
    config
        .portals
        .push(PortalConfig::new("right", "Level3").with_dialogue(GateConfig::new("shared")));

    let transcript = Transcript::new();
    let mut stage =
        Stage::from_config(&config, &library, transcript.clone(), Some(transcript.clone())).unwrap();

    let first = stage.enter("left", "Player").unwrap();
    let second = stage.enter("right", "Player").unwrap();
    let TransitionOutcome::DialogueStarted(session) = first else {
        panic!("unexpected outcome: {first:?}");
    };
    assert_eq!(second, TransitionOutcome::DialogueJoined(session));
    assert_eq!(stage.director().observers_of(session).len(), 2);
    assert_eq!(stage.director().active().unwrap().id(), session);

    assert!(stage.force_end_dialogue());
    assert_eq!(
        transcript.loads(),
        vec!["Level2".to_string(), "Level3".to_string()]
    );
    assert_eq!(stage.director().observer_count(), 0);
}

/// 不同脚本的会话占用槽位时，新的进入改为等待该会话，不消耗一次性触发
#[test]
fn test_busy_slot_waits_for_other_script() {
    let (mut stage, transcript) = new_stage();
    stage.add_portal(
        PortalSpec::new("a", "LevelA").with_gate(DialogueGate::once(script("a", 1).into_shared())),
    );
    let b = stage.add_portal(
        PortalSpec::new("b", "LevelB").with_gate(DialogueGate::once(script("b", 1).into_shared())),
    );

    let Ok(TransitionOutcome::DialogueStarted(session)) = stage.enter("a", "Player") else {
        panic!("dialogue did not start");
    };
    assert_eq!(
        stage.enter("b", "Player"),
        Ok(TransitionOutcome::Blocked(session))
    );
    assert!(!stage.portal(b).unwrap().gate().unwrap().has_fired());
    assert_eq!(stage.director().observers_of(session).len(), 2);

    assert!(stage.force_end_dialogue());
    assert_eq!(
        transcript.loads(),
        vec!["LevelA".to_string(), "LevelB".to_string()]
    );
}

/// 离开了占用槽位的传送门，站在另一个传送门里：那段对话结束后加载
#[test]
fn test_player_left_in_blocked_portal_loads_after_dialogue() {
    let (mut stage, transcript) = new_stage();
    stage.add_portal(
        PortalSpec::new("a", "LevelA").with_gate(DialogueGate::once(script("a", 1).into_shared())),
    );
    let b = stage.add_portal(
        PortalSpec::new("b", "LevelB").with_gate(DialogueGate::once(script("b", 1).into_shared())),
    );

    stage.enter("a", "Player").unwrap();
    stage.exit("a", "Player");
    assert!(matches!(
        stage.enter("b", "Player"),
        Ok(TransitionOutcome::Blocked(_))
    ));
    assert_eq!(
        stage.portal(b).unwrap().state(),
        ControllerState::AwaitingDialogue
    );

    assert!(stage.force_end_dialogue());
    for _ in 0..300 {
        assert!(stage.tick(FRAME, []).is_empty());
    }

    assert_eq!(transcript.loads(), vec!["LevelB".to_string()]);
    assert_eq!(stage.portal(b).unwrap().state(), ControllerState::Loading);
    assert!(!stage.is_dialogue_active());
}

/// 等待期间离开，占用槽位的对话结束后不加载；槽位空出后重新进入正常开始
#[test]
fn test_exit_blocked_portal_cancels_wait() {
    let (mut stage, transcript) = new_stage();
    stage.add_portal(
        PortalSpec::new("a", "LevelA").with_gate(DialogueGate::once(script("a", 1).into_shared())),
    );
    stage.add_portal(
        PortalSpec::new("b", "LevelB").with_gate(DialogueGate::once(script("b", 1).into_shared())),
    );

    stage.enter("a", "Player").unwrap();
    stage.exit("a", "Player");
    stage.enter("b", "Player").unwrap();
    assert_eq!(stage.exit("b", "Player"), TransitionOutcome::LeftRegion);

    stage.force_end_dialogue();
    assert!(transcript.loads().is_empty());

    assert!(matches!(
        stage.enter("b", "Player"),
        Ok(TransitionOutcome::DialogueStarted(_))
    ));
}

/// 逐字显示随时间推进，最后一个字之后再等一个间隔
#[test]
fn test_typewriter_paced_by_frames() {
    let (mut stage, transcript) = new_stage();
    stage.add_portal(
        PortalSpec::new("door", "Level2").with_gate(DialogueGate::once(
            DialogueScript::new("short", vec![DialogueLine::narration("你好呀")]).into_shared(),
        )),
    );

    stage.enter("door", "Player").unwrap();
    assert_eq!(transcript.last_text().as_deref(), Some("你"));

    // 30ms 间隔、约 16.7ms 一帧：两帧显示一个字
    stage.tick(FRAME, []);
    assert_eq!(transcript.last_text().as_deref(), Some("你"));
    stage.tick(FRAME, []);
    assert_eq!(transcript.last_text().as_deref(), Some("你好"));
    stage.tick(FRAME * 2, []);
    assert_eq!(transcript.last_text().as_deref(), Some("你好呀"));

    let state = stage.director().active().unwrap().state();
    assert_eq!(state, SessionState::Typing);
    stage.tick(FRAME * 2, []);
    assert_eq!(
        stage.director().active().unwrap().state(),
        SessionState::LineReady
    );

    // 已完整显示：一次推进即结束
    stage.tick(FRAME, [StageInput::Advance]);
    assert_eq!(transcript.loads(), vec!["Level2".to_string()]);
}

/// 时间倍率为 0 时打字机暂停
#[test]
fn test_zero_time_scale_freezes_typewriter() {
    let (mut stage, transcript) = new_stage();
    stage.add_portal(
        PortalSpec::new("door", "Level2").with_gate(DialogueGate::once(script("intro", 1).into_shared())),
    );
    stage.set_time_scale(0.0);

    stage.enter("door", "Player").unwrap();
    let writes = transcript.texts().len();
    for _ in 0..60 {
        stage.tick(FRAME, []);
    }
    assert_eq!(transcript.texts().len(), writes);

    // 推进仍然有效
    stage.tick(FRAME, [StageInput::Advance]);
    assert_eq!(transcript.last_text().as_deref(), Some("第1句台词"));
}

/// 自动触发的对话结束后，进入区域直接加载
#[test]
fn test_trigger_on_start_from_config() {
    let mut library = ScriptLibrary::new();
    library.insert(script("opening", 1));

    let config = StageConfig::from_json(
        r#"{
            "autostart_delay": 0.1,
            "portals": [
                { "name": "gate", "scene": "Town",
                  "dialogue": { "script": "opening", "trigger_on_start": true } }
            ]
        }"#,
    )
    .unwrap();

    let transcript = Transcript::new();
    let mut stage =
        Stage::from_config(&config, &library, transcript.clone(), Some(transcript.clone())).unwrap();
    assert_eq!(stage.begin(), 1);

    for _ in 0..3 {
        stage.tick(FRAME, []);
    }
    assert!(!stage.is_dialogue_active());
    for _ in 0..4 {
        stage.tick(FRAME, []);
    }
    assert!(stage.is_dialogue_active());

    stage.tick(FRAME, [StageInput::ForceEnd]);
    assert!(!stage.is_dialogue_active());
    assert!(transcript.loads().is_empty());

    stage.tick(FRAME, [StageInput::enter("gate", "Player")]);
    assert_eq!(transcript.loads(), vec!["Town".to_string()]);
}

/// 引用不存在的脚本：构建失败
#[test]
fn test_from_config_unknown_script() {
    let mut config = StageConfig::default();
    config
        .portals
        .push(PortalConfig::new("door", "Level2").with_dialogue(GateConfig::new("nope")));

    let transcript = Transcript::new();
    let result = Stage::from_config(
        &config,
        &ScriptLibrary::new(),
        transcript.clone(),
        Some(transcript),
    );
    assert!(matches!(
        result,
        Err(PortalError::Config(ConfigError::UnknownScript { .. }))
    ));
}

/// 折叠后的完整写入序列
#[test]
fn test_collapsed_transcript() {
    let (mut stage, transcript) = new_stage();
    stage.add_portal(
        PortalSpec::new("cave", "Level2").with_gate(DialogueGate::once(
            DialogueScript::new(
                "cave_intro",
                vec![
                    DialogueLine::new("guide", "前方危险"),
                    DialogueLine::narration("小心"),
                ],
            )
            .into_shared(),
        )),
    );

    stage.enter("cave", "Player").unwrap();
    for _ in 0..4 {
        stage.advance_dialogue();
    }

    insta::assert_snapshot!(render(&transcript.collapsed()), @r"
    panel: true
    portrait: guide
    text: 前方危险
    portrait: -
    text: 小心
    panel: false
    load: Level2
    ");
}
