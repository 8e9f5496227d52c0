//! The step-pattern data model and the sequencer that resolves it.

pub mod note;
pub mod pattern;
pub mod sequencer;

pub use note::Note;
pub use pattern::{PercussionKind, SessionLayout, Step, Track, TrackId, TrackKind};
pub use sequencer::{StepSequencer, TickSummary, TriggerFault, TriggerSink};
