use serde::{Deserialize, Serialize};

use crate::sequencing::note::Note;
use crate::PATTERN_LENGTH;

/// Default velocity of a fresh step.
pub const DEFAULT_VELOCITY: f32 = 0.7;

/// Index of a track in the session, in row order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TrackId(pub usize);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PercussionKind {
    Kick,
    Snare,
    HiHat,
    Clap,
}

impl PercussionKind {
    pub const ALL: [PercussionKind; 4] = [Self::Kick, Self::Snare, Self::HiHat, Self::Clap];
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TrackKind {
    Melodic,
    Percussion(PercussionKind),
}

impl TrackKind {
    pub fn is_melodic(self) -> bool {
        matches!(self, TrackKind::Melodic)
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Step {
    pub active: bool,
    pub velocity: f32,
    pub note: Option<Note>,
}

impl Step {
    pub fn for_kind(kind: TrackKind) -> Self {
        Self {
            active: false,
            velocity: DEFAULT_VELOCITY,
            note: kind.is_melodic().then_some(Note::C4),
        }
    }
}

/// One sequencer row: a fixed kind and sixteen steps.
#[derive(Debug, Clone, PartialEq)]
pub struct Track {
    pub id: TrackId,
    pub kind: TrackKind,
    pub steps: [Step; PATTERN_LENGTH],
}

impl Track {
    pub fn new(id: TrackId, kind: TrackKind) -> Self {
        Self {
            id,
            kind,
            steps: [Step::for_kind(kind); PATTERN_LENGTH],
        }
    }

    pub fn active_steps(&self) -> impl Iterator<Item = usize> + '_ {
        self.steps
            .iter()
            .enumerate()
            .filter(|(_, step)| step.active)
            .map(|(index, _)| index)
    }
}

/// Track kinds in row order. Fixed when the voice pool is built.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionLayout {
    kinds: Vec<TrackKind>,
}

impl SessionLayout {
    pub fn new(kinds: Vec<TrackKind>) -> Self {
        Self { kinds }
    }

    pub fn kinds(&self) -> &[TrackKind] {
        &self.kinds
    }

    pub fn len(&self) -> usize {
        self.kinds.len()
    }

    pub fn is_empty(&self) -> bool {
        self.kinds.is_empty()
    }

    pub fn kind(&self, track: TrackId) -> Option<TrackKind> {
        self.kinds.get(track.0).copied()
    }

    /// First track of the given percussion kind.
    pub fn find(&self, kind: TrackKind) -> Option<TrackId> {
        self.kinds.iter().position(|k| *k == kind).map(TrackId)
    }
}

impl Default for SessionLayout {
    /// Kick, Snare, HiHat, Clap, then one melodic track.
    fn default() -> Self {
        let mut kinds: Vec<TrackKind> = PercussionKind::ALL
            .into_iter()
            .map(TrackKind::Percussion)
            .collect();
        kinds.push(TrackKind::Melodic);
        Self { kinds }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fresh_steps_follow_track_kind() {
        let melodic = Track::new(TrackId(4), TrackKind::Melodic);
        let kick = Track::new(TrackId(0), TrackKind::Percussion(PercussionKind::Kick));

        assert!(melodic.steps.iter().all(|s| !s.active && s.velocity == 0.7));
        assert!(melodic.steps.iter().all(|s| s.note == Some(Note::C4)));
        assert!(kick.steps.iter().all(|s| s.note.is_none()));
        assert_eq!(kick.active_steps().count(), 0);
    }

    #[test]
    fn default_layout_has_four_drums_and_a_melody() {
        let layout = SessionLayout::default();
        assert_eq!(layout.len(), 5);
        assert_eq!(layout.find(TrackKind::Percussion(PercussionKind::Clap)), Some(TrackId(3)));
        assert_eq!(layout.find(TrackKind::Melodic), Some(TrackId(4)));
    }

    #[test]
    fn kind_serializes_in_snapshot_shape() {
        let json = serde_json::to_string(&TrackKind::Percussion(PercussionKind::HiHat))
            .expect("serialize");
        assert_eq!(json, r#"{"percussion":"hihat"}"#);
        assert_eq!(
            serde_json::to_string(&TrackKind::Melodic).expect("serialize"),
            r#""melodic""#
        );
    }
}
