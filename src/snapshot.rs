//! Project files.
//!
//! A snapshot is the whole session as the user sees it: tempo, the Track ×
//! Step grid and the effect parameters. Playback state is not saved.

use std::{collections::BTreeSet, fs, path::Path};

use log::{debug, info};
use serde::{Deserialize, Serialize};

use crate::{
    effects::EffectParams,
    error::SnapshotError,
    sequencing::{
        sequencer::clamp_velocity, Step, StepSequencer, Track, TrackId, TrackKind,
    },
    transport::{clock::DEFAULT_BPM, TransportState, MAX_BPM, MIN_BPM},
    PATTERN_LENGTH,
};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProjectSnapshot {
    pub bpm: f32,
    pub tracks: Vec<TrackSnapshot>,
    pub effect_params: EffectParams,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrackSnapshot {
    pub id: usize,
    pub kind: TrackKind,
    pub steps: Vec<StepSnapshot>,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct StepSnapshot {
    pub active: bool,
    pub velocity: f32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub note: Option<crate::sequencing::Note>,
}

/// A validated snapshot, ready to replace the live session.
#[derive(Debug, Clone, PartialEq)]
pub struct RestoredSession {
    pub bpm: f32,
    pub sequencer: StepSequencer,
    pub params: EffectParams,
}

impl From<&Step> for StepSnapshot {
    fn from(step: &Step) -> Self {
        Self {
            active: step.active,
            velocity: step.velocity,
            note: step.note,
        }
    }
}

impl ProjectSnapshot {
    pub fn capture(
        transport: &TransportState,
        sequencer: &StepSequencer,
        params: &EffectParams,
    ) -> Self {
        let tracks = sequencer
            .tracks()
            .iter()
            .map(|track| TrackSnapshot {
                id: track.id.0,
                kind: track.kind,
                steps: track.steps.iter().map(StepSnapshot::from).collect(),
            })
            .collect();

        Self {
            bpm: transport.bpm,
            tracks,
            effect_params: *params,
        }
    }

    pub fn to_json(&self) -> Result<String, SnapshotError> {
        Ok(serde_json::to_string(self)?)
    }

    pub fn to_json_pretty(&self) -> Result<String, SnapshotError> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    pub fn from_json(json: &str) -> Result<Self, SnapshotError> {
        Ok(serde_json::from_str(json)?)
    }

    pub fn save(&self, path: impl AsRef<Path>) -> Result<(), SnapshotError> {
        let path = path.as_ref();
        fs::write(path, self.to_json_pretty()?)?;
        info!("saved project to {}", path.display());
        Ok(())
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self, SnapshotError> {
        let path = path.as_ref();
        let json = fs::read_to_string(path)?;
        debug!("loading project from {}", path.display());
        Self::from_json(&json)
    }

    /// Validate and clamp into a session.
    ///
    /// Tracks are ordered by id and renumbered from zero, so a file listing
    /// ids 0, 2, 5 restores as three consecutive rows. Notes on percussion
    /// steps are dropped; melodic steps without a note get C4.
    pub fn restore(&self) -> Result<RestoredSession, SnapshotError> {
        if self.tracks.is_empty() {
            return Err(SnapshotError::Empty);
        }

        let mut seen = BTreeSet::new();
        for track in &self.tracks {
            if !seen.insert(track.id) {
                return Err(SnapshotError::DuplicateTrack(track.id));
            }
            if track.steps.len() != PATTERN_LENGTH {
                return Err(SnapshotError::PatternLength {
                    track: track.id,
                    len: track.steps.len(),
                });
            }
        }

        let mut ordered: Vec<&TrackSnapshot> = self.tracks.iter().collect();
        ordered.sort_by_key(|track| track.id);

        let tracks = ordered
            .into_iter()
            .enumerate()
            .map(|(row, saved)| {
                let mut track = Track::new(TrackId(row), saved.kind);
                for (step, stored) in track.steps.iter_mut().zip(&saved.steps) {
                    step.active = stored.active;
                    step.velocity = clamp_velocity(stored.velocity);
                    if saved.kind.is_melodic() {
                        step.note = stored.note.or(step.note);
                    }
                }
                track
            })
            .collect();

        let bpm = if self.bpm.is_finite() {
            self.bpm.clamp(MIN_BPM, MAX_BPM)
        } else {
            DEFAULT_BPM
        };

        Ok(RestoredSession {
            bpm,
            sequencer: StepSequencer::from_tracks(tracks),
            params: self.effect_params.clamped(),
        })
    }
}
