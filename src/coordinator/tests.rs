use super::*;
use crate::bindings::Reaction;
use crate::drivers::OutputStatus;
use crate::sources::{Role, SourceBinding};
use crate::test_support::{MockRemote, RecordingAudio, RecordingMedia, RecordingSurface, RemoteCall};

const DESKTOP_SLIDER: ControlId = 0;
const MIC_SLIDER: ControlId = 1;
const DESKTOP_LOCAL_DIAL: ControlId = 16;
const MIC_LOCAL_DIAL: ControlId = 17;
const DESKTOP_MUTE: ControlId = 48;
const MIC_MUTE: ControlId = 49;
const DESKTOP_LOCAL_MUTE: ControlId = 64;
const MIC_LOCAL_MUTE: ControlId = 65;
const PLAY: ControlId = 41;
const REPLAY: ControlId = 45;
const RECORD: ControlId = 46;
const SCENE_BUTTONS: ControlId = 32;

struct Harness {
    coordinator: Coordinator,
    remote: Arc<MockRemote>,
    surface: Arc<RecordingSurface>,
    media: Arc<RecordingMedia>,
    desktop: Arc<RecordingAudio>,
}

fn make_test_bindings() -> BindingTable {
    let mut table = BindingTable::new();
    let inputs = [
        (DESKTOP_SLIDER, Action::SetRemoteVolume(Role::Desktop1)),
        (MIC_SLIDER, Action::SetRemoteVolume(Role::Mic1)),
        (DESKTOP_LOCAL_DIAL, Action::SetLocalVolume(Role::Desktop1)),
        (MIC_LOCAL_DIAL, Action::SetLocalVolume(Role::Mic1)),
        (DESKTOP_MUTE, Action::ToggleRemoteMute(Role::Desktop1)),
        (MIC_MUTE, Action::ToggleRemoteMute(Role::Mic1)),
        (DESKTOP_LOCAL_MUTE, Action::ToggleLocalMute(Role::Desktop1)),
        (MIC_LOCAL_MUTE, Action::ToggleLocalMute(Role::Mic1)),
        (PLAY, Action::PlayPause),
        (REPLAY, Action::SaveReplayBuffer),
        (RECORD, Action::ToggleStream),
    ];
    for (control, action) in inputs {
        table.bind_action(control, action).unwrap();
    }
    for index in 0..8 {
        table.bind_action(SCENE_BUTTONS + index as u8, Action::SwitchScene(index)).unwrap();
    }

    let reactions = [
        (Trigger::RemoteMuteChanged(Role::Desktop1), DESKTOP_MUTE),
        (Trigger::RemoteMuteChanged(Role::Mic1), MIC_MUTE),
        (Trigger::LocalMuteChanged(Role::Desktop1), DESKTOP_LOCAL_MUTE),
        (Trigger::StreamStateChanged, RECORD),
        (Trigger::ReplayStateChanged, REPLAY),
    ];
    for (trigger, led) in reactions {
        table.add_reaction(Reaction { trigger, led }).unwrap();
    }
    for index in 0..8 {
        table
            .add_reaction(Reaction {
                trigger: Trigger::SceneSwitched(index),
                led: SCENE_BUTTONS + index as u8,
            })
            .unwrap();
    }
    table
}

fn make_test_controller_config(led_first: u8, led_last: u8) -> ControllerConfig {
    ControllerConfig {
        led_first,
        led_last,
        sweep_step_ms: 10,
        ..ControllerConfig::default()
    }
}

/// Desktop1 is fully connected; Mic1 exists in OBS but has no local device
fn make_harness(controller: ControllerConfig) -> Harness {
    let remote = Arc::new(MockRemote::default());
    let surface = Arc::new(RecordingSurface::default());
    let media = Arc::new(RecordingMedia::default());
    let desktop = Arc::new(RecordingAudio::default());

    let registry = Arc::new(
        SourceRegistry::unresolved()
            .with_binding(Role::Desktop1, SourceBinding::connected("Desktop Audio", desktop.clone()))
            .with_binding(Role::Mic1, SourceBinding::disconnected(Some("Mic/Aux".into()))),
    );

    let dispatcher = crate::clock::Dispatcher::new(
        remote.clone(),
        Arc::clone(&registry),
        Duration::from_millis(500),
        0,
    );
    let clock = EventClock::new(dispatcher, Duration::from_millis(50));

    let coordinator = Coordinator::new(
        make_test_bindings(),
        Collaborators {
            remote: remote.clone(),
            registry,
            surface: surface.clone(),
            media: media.clone(),
        },
        clock,
        &controller,
    );

    Harness {
        coordinator,
        remote,
        surface,
        media,
        desktop,
    }
}

fn harness() -> Harness {
    make_harness(make_test_controller_config(16, 71))
}

fn press(h: &Harness, control: ControlId) {
    h.coordinator.on_control_event(ControlEvent { control, value: 127 });
    h.coordinator.on_control_event(ControlEvent { control, value: 0 });
}

fn move_to(h: &Harness, control: ControlId, value: u8) {
    h.coordinator.on_control_event(ControlEvent { control, value });
}

#[tokio::test]
async fn test_unbound_control_is_a_no_op() {
    let h = harness();

    move_to(&h, 99, 127);
    move_to(&h, 99, 0);
    h.coordinator.clock().tick_once().await;

    assert!(h.remote.calls().is_empty());
    assert!(h.media.presses().is_empty());
    assert!(h.surface.writes().is_empty());
}

#[tokio::test]
async fn test_slider_sets_remote_volume_on_next_tick() {
    let h = harness();

    move_to(&h, DESKTOP_SLIDER, 64);
    assert!(h.remote.calls().is_empty());

    h.coordinator.clock().tick_once().await;
    assert_eq!(
        h.remote.calls(),
        vec![RemoteCall::SetInputVolume(
            "Desktop Audio".into(),
            (64.0_f64 / 127.0) as f32
        )]
    );
}

#[tokio::test]
async fn test_slider_sweep_coalesces_into_one_write() {
    let h = harness();

    for value in 0..=127 {
        move_to(&h, DESKTOP_SLIDER, value);
    }
    h.coordinator.clock().tick_once().await;

    assert_eq!(
        h.remote.calls(),
        vec![RemoteCall::SetInputVolume("Desktop Audio".into(), 1.0)]
    );
}

#[tokio::test]
async fn test_volume_boundaries() {
    let h = harness();

    move_to(&h, DESKTOP_SLIDER, 0);
    move_to(&h, DESKTOP_LOCAL_DIAL, 127);
    h.coordinator.clock().tick_once().await;

    assert_eq!(
        h.remote.calls(),
        vec![RemoteCall::SetInputVolume("Desktop Audio".into(), 0.0)]
    );
    assert_eq!(h.desktop.volume_writes(), vec![100.0]);
}

#[tokio::test]
async fn test_discrete_presses_are_never_coalesced() {
    let h = harness();

    press(&h, REPLAY);
    press(&h, REPLAY);
    press(&h, RECORD);
    h.coordinator.clock().tick_once().await;

    assert_eq!(
        h.remote.calls(),
        vec![
            RemoteCall::SaveReplayBuffer,
            RemoteCall::SaveReplayBuffer,
            RemoteCall::ToggleStream,
        ]
    );
}

#[tokio::test]
async fn test_button_release_does_nothing() {
    let h = harness();

    move_to(&h, REPLAY, 0);
    move_to(&h, PLAY, 0);
    h.coordinator.clock().tick_once().await;

    assert!(h.remote.calls().is_empty());
    assert!(h.media.presses().is_empty());
}

#[tokio::test]
async fn test_mute_buttons_toggle_remote_and_local() {
    let h = harness();

    press(&h, DESKTOP_MUTE);
    press(&h, DESKTOP_LOCAL_MUTE);
    h.coordinator.clock().tick_once().await;

    assert_eq!(
        h.remote.calls(),
        vec![RemoteCall::ToggleInputMute("Desktop Audio".into())]
    );
    assert_eq!(h.desktop.mute_writes(), vec![true]);
}

#[tokio::test]
async fn test_disconnected_role_accepts_no_commands() {
    let h = harness();

    move_to(&h, MIC_SLIDER, 100);
    move_to(&h, MIC_LOCAL_DIAL, 100);
    press(&h, MIC_MUTE);
    press(&h, MIC_LOCAL_MUTE);
    h.coordinator.clock().tick_once().await;

    assert!(h.remote.calls().is_empty());
    assert!(h.coordinator.clock().dispatcher().local_muted(Role::Mic1).is_none());
}

#[tokio::test]
async fn test_scene_button_switches_by_display_index() {
    let h = harness();
    h.remote.set_scenes(&["Starting", "Live", "Break"]);

    press(&h, SCENE_BUTTONS + 1);
    press(&h, SCENE_BUTTONS + 5);
    h.coordinator.clock().tick_once().await;

    assert_eq!(h.remote.calls(), vec![RemoteCall::SetCurrentScene("Live".into())]);
}

#[tokio::test]
async fn test_media_keys_fire_immediately() {
    let h = harness();

    press(&h, PLAY);

    assert_eq!(h.media.presses(), vec![MediaKey::PlayPause]);
    assert!(h.remote.calls().is_empty());
}

#[test]
fn test_remote_mute_led_is_lit_when_live() {
    let mut h = harness();

    let flow = h.coordinator.on_remote_event(RemoteEvent::InputMuteChanged {
        source: "Desktop Audio".into(),
        muted: true,
    });
    assert_eq!(flow, Flow::Continue);
    assert_eq!(h.surface.led(DESKTOP_MUTE), Some(false));

    h.coordinator.on_remote_event(RemoteEvent::InputMuteChanged {
        source: "Desktop Audio".into(),
        muted: false,
    });
    assert_eq!(h.surface.led(DESKTOP_MUTE), Some(true));
}

#[test]
fn test_remote_mute_of_disconnected_role_still_drives_led() {
    let mut h = harness();

    h.coordinator.on_remote_event(RemoteEvent::InputMuteChanged {
        source: "Mic/Aux".into(),
        muted: false,
    });
    assert_eq!(h.surface.led(MIC_MUTE), Some(true));
}

#[test]
fn test_unknown_remote_source_is_ignored() {
    let mut h = harness();

    h.coordinator.on_remote_event(RemoteEvent::InputMuteChanged {
        source: "Browser".into(),
        muted: true,
    });
    assert!(h.surface.writes().is_empty());
}

#[test]
fn test_local_mute_led_is_lit_when_muted() {
    let h = harness();

    h.coordinator.on_local_mute(LocalMuteEvent {
        role: Role::Desktop1,
        muted: true,
    });
    assert_eq!(h.surface.led(DESKTOP_LOCAL_MUTE), Some(true));

    h.coordinator.on_local_mute(LocalMuteEvent {
        role: Role::Desktop1,
        muted: false,
    });
    assert_eq!(h.surface.led(DESKTOP_LOCAL_MUTE), Some(false));
}

#[test]
fn test_local_mute_without_reaction_writes_nothing() {
    let h = harness();

    h.coordinator.on_local_mute(LocalMuteEvent {
        role: Role::Mic2,
        muted: true,
    });
    assert!(h.surface.writes().is_empty());
}

fn lit_scene_leds(h: &Harness) -> Vec<ControlId> {
    (0..8)
        .map(|i| SCENE_BUTTONS + i)
        .filter(|led| h.surface.led(*led) == Some(true))
        .collect()
}

#[test]
fn test_exactly_one_scene_led_is_lit() {
    let mut h = harness();
    let scenes: Vec<String> = (0..10).map(|i| format!("Scene {}", i)).collect();

    h.coordinator
        .on_remote_event(RemoteEvent::SceneListChanged { scenes });
    h.coordinator.on_remote_event(RemoteEvent::CurrentSceneChanged {
        name: "Scene 3".into(),
    });
    assert_eq!(lit_scene_leds(&h), vec![SCENE_BUTTONS + 3]);

    h.coordinator.on_remote_event(RemoteEvent::CurrentSceneChanged {
        name: "Scene 0".into(),
    });
    assert_eq!(lit_scene_leds(&h), vec![SCENE_BUTTONS]);

    // Beyond the indicators: all dark
    h.coordinator.on_remote_event(RemoteEvent::CurrentSceneChanged {
        name: "Scene 9".into(),
    });
    assert!(lit_scene_leds(&h).is_empty());
    for i in 0..8 {
        assert_eq!(h.surface.led(SCENE_BUTTONS + i), Some(false));
    }
}

#[test]
fn test_scene_list_change_moves_the_indicator() {
    let mut h = harness();

    h.coordinator.on_remote_event(RemoteEvent::SceneListChanged {
        scenes: vec!["Intro".into(), "Game".into()],
    });
    h.coordinator.on_remote_event(RemoteEvent::CurrentSceneChanged {
        name: "Game".into(),
    });
    assert_eq!(lit_scene_leds(&h), vec![SCENE_BUTTONS + 1]);

    h.coordinator.on_remote_event(RemoteEvent::SceneListChanged {
        scenes: vec!["Game".into(), "Intro".into()],
    });
    assert_eq!(lit_scene_leds(&h), vec![SCENE_BUTTONS]);
}

#[test]
fn test_output_state_leds() {
    let mut h = harness();

    h.coordinator
        .on_remote_event(RemoteEvent::StreamStateChanged { active: true });
    h.coordinator
        .on_remote_event(RemoteEvent::ReplayStateChanged { active: false });

    assert_eq!(h.surface.led(RECORD), Some(true));
    assert_eq!(h.surface.led(REPLAY), Some(false));
}

#[test]
fn test_disconnect_requests_shutdown() {
    let mut h = harness();

    let flow = h.coordinator.on_remote_event(RemoteEvent::Disconnected {
        reason: "OBS exiting".into(),
    });
    assert_eq!(flow, Flow::Shutdown("OBS exiting".into()));
}

#[tokio::test]
async fn test_initialise_leds_mirrors_obs_state() {
    let mut h = harness();
    h.remote.set_input_muted("Desktop Audio", false);
    h.remote.set_input_muted("Mic/Aux", true);
    h.remote.set_scenes(&["Intro", "Game", "Outro"]);
    h.remote.set_current_scene_name("Outro");
    h.remote.set_output_status(OutputStatus {
        streaming: true,
        recording: false,
        replay_buffer: true,
    });

    h.coordinator.initialise_leds().await;

    assert_eq!(h.surface.led(DESKTOP_MUTE), Some(true));
    assert_eq!(h.surface.led(MIC_MUTE), Some(false));
    assert_eq!(lit_scene_leds(&h), vec![SCENE_BUTTONS + 2]);
    assert_eq!(h.surface.led(RECORD), Some(true));
    assert_eq!(h.surface.led(REPLAY), Some(true));
    assert!(h.remote.calls().is_empty());
}

#[tokio::test]
async fn test_initialise_leds_darkens_disconnected_role() {
    let mut h = harness();
    h.remote.set_input_muted("Desktop Audio", false);
    h.remote.set_input_muted("Mic/Aux", false);

    h.coordinator.initialise_leds().await;

    assert_eq!(h.surface.led(DESKTOP_MUTE), Some(true));
    assert_eq!(h.surface.led(MIC_MUTE), Some(false));
}

#[tokio::test(start_paused = true)]
async fn test_led_self_test_sweeps_the_range() {
    let h = make_harness(make_test_controller_config(16, 18));

    h.coordinator.led_self_test().await.unwrap();

    assert_eq!(
        h.surface.writes(),
        vec![
            (16, false),
            (17, false),
            (18, false),
            (16, true),
            (17, true),
            (18, true),
            (16, false),
            (17, false),
            (18, false),
        ]
    );
}

#[tokio::test]
async fn test_led_self_test_fails_on_released_surface() {
    let h = harness();
    h.surface.release().unwrap();

    assert!(h.coordinator.led_self_test().await.is_err());
}

#[tokio::test]
async fn test_shutdown_tears_down_once() {
    let h = make_harness(make_test_controller_config(16, 19));
    h.coordinator.start_clock();

    h.coordinator.shutdown().await;
    h.coordinator.shutdown().await;

    assert!(h.coordinator.clock().is_disposed());
    assert_eq!(
        h.surface.writes(),
        vec![(16, false), (17, false), (18, false), (19, false)]
    );
    assert_eq!(h.surface.release_count(), 1);
    assert_eq!(h.remote.disconnect_count(), 1);
    assert_eq!(h.desktop.dispose_count(), 1);
}

#[tokio::test]
async fn test_no_calls_after_shutdown() {
    let h = harness();

    h.coordinator.shutdown().await;
    move_to(&h, DESKTOP_SLIDER, 90);
    press(&h, REPLAY);
    h.coordinator.clock().tick_once().await;

    assert!(h.remote.calls().is_empty());
}

#[tokio::test]
async fn test_run_stops_on_remote_disconnect() {
    let h = harness();
    let remote = h.remote.clone();
    let surface = h.surface.clone();

    let remote_events = remote.subscribe().await.unwrap();
    let (_control_tx, controls) = mpsc::channel(16);
    let (_local_tx, local_events) = mpsc::unbounded_channel();

    let task = tokio::spawn(h.coordinator.run(
        controls,
        remote_events,
        local_events,
        std::future::pending(),
    ));

    assert!(remote.emit(RemoteEvent::StreamStateChanged { active: true }));
    assert!(remote.emit(RemoteEvent::Disconnected {
        reason: "OBS exiting".into(),
    }));

    task.await.unwrap().unwrap();
    assert_eq!(surface.led(RECORD), Some(false));
    assert!(surface.writes().contains(&(RECORD, true)));
    assert_eq!(remote.disconnect_count(), 1);
    assert_eq!(surface.release_count(), 1);
}

#[tokio::test]
async fn test_run_routes_controls_and_local_mute() {
    let h = harness();
    let remote = h.remote.clone();
    let surface = h.surface.clone();
    let media = h.media.clone();
    let desktop = h.desktop.clone();

    let remote_events = remote.subscribe().await.unwrap();
    let (control_tx, controls) = mpsc::channel(16);
    let (local_tx, local_events) = mpsc::unbounded_channel();
    h.coordinator.registry().subscribe_local_mute(local_tx);
    let (stop_tx, stop_rx) = tokio::sync::oneshot::channel::<()>();

    let task = tokio::spawn(h.coordinator.run(controls, remote_events, local_events, async {
        let _ = stop_rx.await;
    }));

    control_tx
        .send(ControlEvent { control: PLAY, value: 127 })
        .await
        .unwrap();
    desktop.set_muted_externally(true);

    // Wait for both events to be handled before stopping
    for _ in 0..100 {
        if !media.presses().is_empty() && surface.led(DESKTOP_LOCAL_MUTE) == Some(true) {
            break;
        }
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
    assert_eq!(media.presses(), vec![MediaKey::PlayPause]);
    assert!(surface.writes().contains(&(DESKTOP_LOCAL_MUTE, true)));

    stop_tx.send(()).unwrap();
    task.await.unwrap().unwrap();
    assert_eq!(remote.disconnect_count(), 1);
}
