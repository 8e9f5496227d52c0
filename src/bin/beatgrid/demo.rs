//! A built-in groove so `play` and `demo-snapshot` work without a project file.

use beatgrid::{
    effects::{EffectParam, EffectParams},
    sequencing::{Note, SessionLayout, StepSequencer, TrackId},
    transport::TransportState,
    ProjectSnapshot,
};
use color_eyre::eyre::{Result, WrapErr};

const KICK: TrackId = TrackId(0);
const SNARE: TrackId = TrackId(1);
const HIHAT: TrackId = TrackId(2);
const CLAP: TrackId = TrackId(3);
const LEAD: TrackId = TrackId(4);

pub fn snapshot(bpm: f32) -> Result<ProjectSnapshot> {
    let mut sequencer = StepSequencer::new(&SessionLayout::default());

    for step in [0, 4, 8, 12] {
        sequencer.toggle_step(KICK, step)?;
    }
    for step in [4, 12] {
        sequencer.toggle_step(SNARE, step)?;
    }
    for step in (0..16).step_by(2) {
        sequencer.toggle_step(HIHAT, step)?;
        sequencer.set_velocity(HIHAT, step, if step % 4 == 0 { 0.6 } else { 0.35 })?;
    }
    sequencer.toggle_step(CLAP, 14)?;

    let riff = [(0, "C3"), (3, "Eb3"), (6, "G3"), (10, "Bb3"), (13, "G3")];
    for (step, name) in riff {
        let note: Note = name.parse().wrap_err_with(|| format!("bad demo note {name}"))?;
        sequencer.toggle_step(LEAD, step)?;
        sequencer.set_note(LEAD, step, note)?;
    }

    let mut params = EffectParams::default();
    params.set(EffectParam::FilterFreq, 6_000.0);
    params.set(EffectParam::ReverbMix, 0.25);

    let transport = TransportState {
        bpm,
        ..TransportState::default()
    };
    Ok(ProjectSnapshot::capture(&transport, &sequencer, &params))
}
