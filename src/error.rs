//! Error taxonomy.
//!
//! Out-of-range parameters are not errors: every setter clamps. Disposal
//! problems are logged and never surface here.

use thiserror::Error;

use crate::effects::StageKind;
use crate::sequencing::TrackId;

/// Acquiring the audio output failed. Retry by calling `initialize()` again.
#[derive(Debug, Error)]
pub enum InitializationError {
    #[error("no audio output device available")]
    NoOutputDevice,
    #[error("permission to use the audio output was denied")]
    PermissionDenied,
    #[error("audio output device is busy")]
    DeviceBusy,
    #[error("failed to query output configuration: {0}")]
    DeviceConfig(String),
    #[error("unsupported output format: {0}")]
    Unsupported(String),
    #[error("failed to build output stream: {0}")]
    StreamBuild(String),
    #[error("failed to start output stream: {0}")]
    StreamStart(String),
}

/// A voice or effect stage could not be constructed.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum GraphError {
    #[error("invalid sample rate {0} Hz")]
    InvalidSampleRate(f32),
    #[error("failed to construct {stage:?} stage: {reason}")]
    StageConstruction { stage: StageKind, reason: String },
    #[error("failed to construct voice: {0}")]
    VoiceConstruction(String),
}

#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
pub enum SequencerError {
    #[error("unknown track {0:?}")]
    UnknownTrack(TrackId),
    #[error("step {step} out of range for track {track:?}")]
    StepOutOfRange { track: TrackId, step: usize },
}

#[derive(Debug, Error)]
pub enum SnapshotError {
    #[error("malformed snapshot: {0}")]
    Json(#[from] serde_json::Error),
    #[error("snapshot io: {0}")]
    Io(#[from] std::io::Error),
    #[error("track {track} has {len} steps, expected 16")]
    PatternLength { track: usize, len: usize },
    #[error("track id {0} appears more than once")]
    DuplicateTrack(usize),
    #[error("snapshot has no tracks")]
    Empty,
}

/// An engine config file could not be read.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("malformed engine config: {0}")]
    Json(#[from] serde_json::Error),
    #[error("engine config io: {0}")]
    Io(#[from] std::io::Error),
}

#[derive(Debug, Error)]
pub enum ExportError {
    #[error("export duration {0} s is outside (0, 600]")]
    Duration(f32),
    #[error("wav encoding failed: {0}")]
    Wav(#[from] hound::Error),
    #[error("export io: {0}")]
    Io(#[from] std::io::Error),
    #[error(transparent)]
    Graph(#[from] GraphError),
    #[error(transparent)]
    Snapshot(#[from] SnapshotError),
}

/// Umbrella error for `AudioGraphManager` operations.
#[derive(Debug, Error)]
pub enum EngineError {
    #[error(transparent)]
    Initialization(#[from] InitializationError),
    #[error(transparent)]
    Graph(#[from] GraphError),
    #[error(transparent)]
    Sequencer(#[from] SequencerError),
    #[error(transparent)]
    Snapshot(#[from] SnapshotError),
    #[error("unknown effect parameter {0:?}")]
    UnknownParam(String),
}

/// Releasing the audio output failed. Logged at warn level, never returned to callers.
#[derive(Debug, Error)]
#[error("audio teardown: {0}")]
pub struct DisposalError(pub String);
