use log::debug;

use crate::{
    error::SequencerError,
    sequencing::{
        note::Note,
        pattern::{SessionLayout, Step, Track, TrackId},
    },
    transport::StepTick,
    PATTERN_LENGTH,
};

/// Why a trigger request was skipped on the audio path.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum TriggerFault {
    #[error("trigger queue full, dropped trigger for {0:?}")]
    QueueFull(TrackId),
    #[error("no voice for {0:?}")]
    UnknownTrack(TrackId),
}

/// Receiver of trigger requests resolved from a clock tick.
///
/// Implemented by the voice pool on the audio thread. Implementations must not
/// allocate or block.
pub trait TriggerSink {
    fn trigger_voice(
        &mut self,
        track: TrackId,
        velocity: f32,
        note: Option<Note>,
        scheduled_frame: u64,
    ) -> Result<(), TriggerFault>;
}

/// Counts for one resolved tick.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct TickSummary {
    pub fired: usize,
    pub skipped: usize,
}

/// The Track × Step grid.
///
/// Edits only touch the grid. Sound happens when `resolve_tick` hands the
/// active steps of a tick to a [`TriggerSink`].
#[derive(Debug, Clone, PartialEq)]
pub struct StepSequencer {
    tracks: Vec<Track>,
}

impl StepSequencer {
    pub fn new(layout: &SessionLayout) -> Self {
        let tracks = layout
            .kinds()
            .iter()
            .enumerate()
            .map(|(index, kind)| Track::new(TrackId(index), *kind))
            .collect();
        Self { tracks }
    }

    /// Rebuild from tracks that were already validated (snapshot restore).
    pub(crate) fn from_tracks(tracks: Vec<Track>) -> Self {
        Self { tracks }
    }

    /// Replace the grid with restored tracks. The layout may change.
    pub fn apply_snapshot_tracks(&mut self, tracks: Vec<Track>) {
        self.tracks = tracks;
    }

    pub fn layout(&self) -> SessionLayout {
        SessionLayout::new(self.tracks.iter().map(|t| t.kind).collect())
    }

    pub fn tracks(&self) -> &[Track] {
        &self.tracks
    }

    pub fn track(&self, track: TrackId) -> Option<&Track> {
        self.tracks.get(track.0)
    }

    fn step_mut(&mut self, track: TrackId, step: usize) -> Result<&mut Step, SequencerError> {
        let row = self
            .tracks
            .get_mut(track.0)
            .ok_or(SequencerError::UnknownTrack(track))?;
        row.steps
            .get_mut(step)
            .ok_or(SequencerError::StepOutOfRange { track, step })
    }

    pub fn step(&self, track: TrackId, step: usize) -> Result<&Step, SequencerError> {
        let row = self.track(track).ok_or(SequencerError::UnknownTrack(track))?;
        row.steps
            .get(step)
            .ok_or(SequencerError::StepOutOfRange { track, step })
    }

    /// Flip `active`. Returns the new value.
    pub fn toggle_step(&mut self, track: TrackId, step: usize) -> Result<bool, SequencerError> {
        let slot = self.step_mut(track, step)?;
        slot.active = !slot.active;
        Ok(slot.active)
    }

    /// Store `clamp(velocity, 0, 1)`. Returns the stored value.
    pub fn set_velocity(
        &mut self,
        track: TrackId,
        step: usize,
        velocity: f32,
    ) -> Result<f32, SequencerError> {
        let slot = self.step_mut(track, step)?;
        let clamped = clamp_velocity(velocity);
        if clamped != velocity {
            debug!("velocity {velocity} clamped to {clamped} ({track:?} step {step})");
        }
        slot.velocity = clamped;
        Ok(clamped)
    }

    /// Set the pitch of a melodic step. Silently ignored on percussion tracks.
    pub fn set_note(&mut self, track: TrackId, step: usize, note: Note) -> Result<(), SequencerError> {
        let is_melodic = self
            .track(track)
            .ok_or(SequencerError::UnknownTrack(track))?
            .kind
            .is_melodic();
        let slot = self.step_mut(track, step)?;
        if is_melodic {
            slot.note = Some(note);
        }
        Ok(())
    }

    /// Overwrite a whole step, applying the same rules as the single-field setters.
    pub fn set_step(&mut self, track: TrackId, step: usize, value: Step) -> Result<(), SequencerError> {
        let is_melodic = self
            .track(track)
            .ok_or(SequencerError::UnknownTrack(track))?
            .kind
            .is_melodic();
        let slot = self.step_mut(track, step)?;
        slot.active = value.active;
        slot.velocity = clamp_velocity(value.velocity);
        if is_melodic {
            slot.note = value.note.or(slot.note);
        }
        Ok(())
    }

    pub fn clear_track(&mut self, track: TrackId) -> Result<(), SequencerError> {
        let row = self
            .tracks
            .get_mut(track.0)
            .ok_or(SequencerError::UnknownTrack(track))?;
        *row = Track::new(row.id, row.kind);
        Ok(())
    }

    pub fn clear_all(&mut self) {
        for row in &mut self.tracks {
            *row = Track::new(row.id, row.kind);
        }
    }

    /// Dispatch every active step at `tick.step_index` to `sink`, in track order.
    ///
    /// A failed trigger is skipped and counted; the remaining tracks still fire.
    pub fn resolve_tick<S: TriggerSink>(&self, tick: &StepTick, sink: &mut S) -> TickSummary {
        let mut summary = TickSummary::default();
        let index = tick.step_index % PATTERN_LENGTH;

        for row in &self.tracks {
            let step = &row.steps[index];
            if !step.active {
                continue;
            }
            match sink.trigger_voice(row.id, step.velocity, step.note, tick.frame) {
                Ok(()) => summary.fired += 1,
                Err(_) => summary.skipped += 1,
            }
        }
        summary
    }
}

/// NaN counts as silence.
pub(crate) fn clamp_velocity(velocity: f32) -> f32 {
    if velocity.is_nan() {
        0.0
    } else {
        velocity.clamp(0.0, 1.0)
    }
}
