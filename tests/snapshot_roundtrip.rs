use beatgrid::{
    effects::EffectParam,
    engine::{AudioGraphManager, OfflineDevice},
    error::{EngineError, SnapshotError},
    export,
    sequencing::{Note, TrackId, TrackKind},
    EngineConfig, ProjectSnapshot,
};

fn edited_manager() -> AudioGraphManager<OfflineDevice> {
    let mut manager = AudioGraphManager::new(OfflineDevice::new(44_100.0), EngineConfig::default());
    manager.initialize().expect("init");
    manager.toggle_step(TrackId(0), 0).expect("kick");
    manager.toggle_step(TrackId(0), 8).expect("kick");
    manager.set_velocity(TrackId(0), 8, 0.45).expect("velocity");
    manager.toggle_step(TrackId(4), 2).expect("lead");
    manager
        .set_note(TrackId(4), 2, "F#3".parse::<Note>().expect("note"))
        .expect("note");
    manager.set_bpm(97.5);
    manager.set_effect_param(EffectParam::PhaserFreq, 2.5);
    manager
}

#[test]
fn save_load_save_is_byte_identical() {
    let manager = edited_manager();
    let first = manager.save().to_json().expect("json");

    let loaded = ProjectSnapshot::from_json(&first).expect("parse");
    let mut other = AudioGraphManager::new(OfflineDevice::new(48_000.0), EngineConfig::default());
    other.restore(&loaded).expect("restore");

    assert_eq!(other.save().to_json().expect("json"), first);
}

#[test]
fn restore_into_a_different_layout() {
    let manager = edited_manager();
    let mut snapshot = manager.save();
    snapshot.tracks.truncate(2);
    snapshot.tracks[1].kind = TrackKind::Melodic;

    let device = OfflineDevice::new(48_000.0);
    let mut target = AudioGraphManager::new(device.clone(), EngineConfig::default());
    target.initialize().expect("init");
    target.restore(&snapshot).expect("restore");
    target.start();
    device.render(4_096);

    assert_eq!(target.sequencer().tracks().len(), 2);
    assert_eq!(target.sequencer().layout().find(TrackKind::Melodic), Some(TrackId(1)));
    assert!(target.poll_events().iter().all(|e| !matches!(
        e,
        beatgrid::EngineEvent::Error(_) | beatgrid::EngineEvent::AudioFault { .. }
    )));
}

#[test]
fn invalid_snapshot_leaves_session_untouched() {
    let mut manager = edited_manager();
    let before = manager.save();

    let mut broken = before.clone();
    broken.tracks[0].steps.truncate(12);
    assert!(matches!(
        manager.restore(&broken),
        Err(EngineError::Snapshot(SnapshotError::PatternLength { .. }))
    ));
    assert_eq!(manager.save(), before);
}

#[test]
fn project_file_bounces_to_wav() {
    let dir = tempfile::tempdir().expect("tempdir");
    let project = dir.path().join("groove.json");
    let wav = dir.path().join("groove.wav");

    edited_manager().save().save(&project).expect("save");
    let loaded = ProjectSnapshot::load(&project).expect("load");
    export::bounce_to_file(&wav, &loaded, 1.0, 44_100, &EngineConfig::default()).expect("bounce");

    let reader = hound::WavReader::open(&wav).expect("wav");
    assert_eq!(reader.len(), 44_100);
}
