use beatgrid::{
    effects::EffectParam,
    engine::{AudioGraphManager, EngineEvent, OfflineDevice},
    error::{EngineError, InitializationError},
    sequencing::{
        Note, SessionLayout, StepSequencer, TrackId, TriggerFault, TriggerSink,
    },
    transport::{StepTick, TransportClock},
    voices::VoiceSpec,
    EngineConfig,
};

const SR: f32 = 48_000.0;
// one step at 120 bpm
const STEP: usize = 6_000;

fn running() -> (AudioGraphManager<OfflineDevice>, OfflineDevice) {
    let device = OfflineDevice::new(SR);
    let mut manager = AudioGraphManager::new(device.clone(), EngineConfig::default());
    manager.initialize().expect("offline device starts");
    (manager, device)
}

fn fired_steps(events: &[EngineEvent]) -> Vec<(usize, u64, usize)> {
    events
        .iter()
        .filter_map(|event| match event {
            EngineEvent::StepFired {
                step_index,
                frame,
                triggered,
                ..
            } => Some((*step_index, *frame, *triggered)),
            _ => None,
        })
        .collect()
}

#[test]
fn pattern_plays_on_exact_step_frames() {
    let (mut manager, device) = running();
    manager.toggle_step(TrackId(0), 0).expect("kick");
    manager.toggle_step(TrackId(1), 4).expect("snare");
    manager.start();

    // odd pull sizes, as a real device would use
    let mut pulled = 0;
    for size in [441, 1024, 333, 2048].iter().cycle() {
        if pulled >= STEP * 16 {
            break;
        }
        device.render(*size);
        pulled += size;
    }

    let fired = fired_steps(&manager.poll_events());
    assert!(fired.len() >= 16);
    for (i, (step_index, frame, _)) in fired.iter().take(16).enumerate() {
        assert_eq!(*step_index, i);
        assert_eq!(*frame, (i * STEP) as u64);
    }
    assert_eq!(fired[0].2, 1);
    assert_eq!(fired[4].2, 1);
    assert_eq!(fired[2].2, 0);
}

#[test]
fn pattern_wraps_after_sixteen_steps() {
    let (mut manager, device) = running();
    manager.start();
    device.render(STEP * 20);
    let steps: Vec<usize> = fired_steps(&manager.poll_events())
        .into_iter()
        .map(|(step, _, _)| step)
        .collect();
    assert_eq!(&steps[14..20], &[14, 15, 0, 1, 2, 3]);
}

#[test]
fn edits_during_playback_apply_before_the_next_step() {
    let (mut manager, device) = running();
    manager.start();
    device.render(STEP + 100);
    manager.poll_events();

    // step 2 is 5900 frames away; the edit must be heard there
    manager.toggle_step(TrackId(0), 2).expect("kick");
    device.render(STEP);

    let fired = fired_steps(&manager.poll_events());
    assert!(fired.contains(&(2, (2 * STEP) as u64, 1)));
}

#[test]
fn stop_halts_scheduling_and_lets_tails_decay() {
    let (mut manager, device) = running();
    manager.toggle_step(TrackId(4), 0).expect("lead");
    manager.set_note(TrackId(4), 0, Note::A4).expect("note");
    manager.set_effect_param(EffectParam::ReverbMix, 0.0);
    manager.start();
    device.render(STEP / 2);

    manager.stop();
    let tail = device.render(4_800);
    assert!(tail.iter().any(|s| s.abs() > 1e-4), "release still sounding");

    device.render(SR as usize * 2);
    let silence = device.render(1_024);
    assert!(silence.iter().all(|s| s.abs() < 1e-3));

    let events = manager.poll_events();
    assert_eq!(fired_steps(&events).len(), 1);
    assert!(!manager.transport().is_playing);
    assert_eq!(manager.transport().current_step_index, 0);
}

#[test]
fn tempo_change_moves_following_steps() {
    let (mut manager, device) = running();
    manager.start();
    device.render(10);
    manager.set_bpm(240.0);
    device.render(STEP * 2);

    let frames: Vec<u64> = fired_steps(&manager.poll_events())
        .into_iter()
        .map(|(_, frame, _)| frame)
        .collect();
    // step 1 was already scheduled at 6000; 3000 frames per step after it
    assert_eq!(&frames[..4], &[0, 6_000, 9_000, 12_000]);
}

#[test]
fn parameter_sweep_never_rebuilds_the_chain() {
    let (mut manager, device) = running();
    manager.toggle_step(TrackId(2), 0).expect("hat");
    manager.start();

    for i in 0..200 {
        manager.set_effect_param(EffectParam::FilterFreq, 100.0 + i as f32 * 90.0);
        manager.set_effect_param(EffectParam::DelayTime, i as f32 / 100.0);
        device.render(128);
    }

    let events = manager.poll_events();
    assert!(!events
        .iter()
        .any(|e| matches!(e, EngineEvent::ChainRebuilt { .. })));
    assert!(!events
        .iter()
        .any(|e| matches!(e, EngineEvent::AudioFault { .. })));
}

#[test]
fn swapping_instruments_keeps_audio_running() {
    let (mut manager, device) = running();
    manager.toggle_step(TrackId(4), 0).expect("lead");
    manager.start();
    device.render(1_024);

    for spec in [VoiceSpec::pluck(), VoiceSpec::square_lead(), VoiceSpec::default()] {
        manager.swap_instrument(spec).expect("swap");
        device.render(512);
        manager.pump();
        device.render(512);
    }

    let rebuilt = manager
        .poll_events()
        .iter()
        .filter(|e| matches!(e, EngineEvent::ChainRebuilt { .. }))
        .count();
    assert_eq!(rebuilt, 3);
    assert_eq!(device.with_renderer(|r| r.has_chain()), Some(true));
}

#[test]
fn output_is_mirrored_across_channels() {
    let device = OfflineDevice::new(SR).with_channels(2);
    let mut manager = AudioGraphManager::new(device.clone(), EngineConfig::default());
    manager.initialize().expect("init");
    manager.toggle_step(TrackId(0), 0).expect("kick");
    manager.start();

    let out = device.render(2_048);
    assert_eq!(out.len(), 4_096);
    assert!(out.chunks(2).all(|frame| frame[0] == frame[1]));
    assert!(out.iter().any(|s| s.abs() > 0.01));
}

#[test]
fn visualizer_sees_rendered_audio() {
    let (mut manager, device) = running();
    manager.toggle_step(TrackId(0), 0).expect("kick");
    manager.start();
    device.render(4_096);

    let visualizer = manager.visualizer().expect("live");
    assert_eq!(visualizer.frames_written(), 4_096);
    assert!(visualizer.sample().iter().any(|s| s.abs() > 0.0));
    assert!(!visualizer.spectrum().is_empty());
}

#[test]
fn reinitialize_after_failure_and_dispose() {
    let device = OfflineDevice::new(SR).failing_open(|| InitializationError::DeviceBusy);
    let mut failing = AudioGraphManager::new(device, EngineConfig::default());
    assert!(matches!(
        failing.initialize(),
        Err(EngineError::Initialization(InitializationError::DeviceBusy))
    ));

    let (mut manager, device) = running();
    manager.dispose();
    assert!(!device.is_running());
    assert!(manager.visualizer().is_none());
    manager.initialize().expect("re-init");
    assert!(device.is_running());
}

#[derive(Default)]
struct Recorder {
    calls: Vec<(TrackId, f32, u64)>,
}

impl TriggerSink for Recorder {
    fn trigger_voice(
        &mut self,
        track: TrackId,
        velocity: f32,
        _note: Option<Note>,
        scheduled_frame: u64,
    ) -> Result<(), TriggerFault> {
        self.calls.push((track, velocity, scheduled_frame));
        Ok(())
    }
}

#[test]
fn four_on_the_floor_kick_fires_every_half_second() {
    let mut sequencer = StepSequencer::new(&SessionLayout::default());
    for step in [0, 4, 8, 12] {
        sequencer.toggle_step(TrackId(0), step).expect("toggle");
        sequencer.set_velocity(TrackId(0), step, 0.8).expect("velocity");
    }

    let mut clock = TransportClock::new(SR);
    clock.set_bpm(120.0);
    clock.start();

    let mut recorder = Recorder::default();
    let mut ticks = 0;
    // one full bar, in device-sized pulls
    for _ in 0..(16 * STEP / 480) {
        ticks += clock.advance(480, &mut |tick: StepTick| {
            sequencer.resolve_tick(&tick, &mut recorder);
        });
    }

    assert_eq!(ticks, 16);
    assert_eq!(recorder.calls.len(), 4);
    for (i, (track, velocity, frame)) in recorder.calls.iter().enumerate() {
        assert_eq!(*track, TrackId(0));
        assert_eq!(*velocity, 0.8);
        assert_eq!(*frame, (i * 4 * STEP) as u64);
        assert_eq!(*frame as f64 / SR as f64, i as f64 * 0.5);
    }
}

#[test]
fn stop_before_a_step_keeps_it_silent() {
    let (mut manager, device) = running();
    manager.set_bpm(120.0);
    manager.toggle_step(TrackId(1), 4).expect("snare");
    manager.start();

    // stop just short of step 4
    device.render(4 * STEP - 64);
    manager.stop();
    device.render(8 * STEP);

    let snare_triggers = device
        .with_renderer(|renderer| renderer.trigger_count(TrackId(1)))
        .expect("renderer installed");
    assert_eq!(snare_triggers, 0);

    let events = manager.poll_events();
    assert_eq!(fired_steps(&events).len(), 4);
    assert!(!events
        .iter()
        .any(|event| matches!(event, EngineEvent::Error(_) | EngineEvent::AudioFault { .. })));
}
