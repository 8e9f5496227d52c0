//! Messages crossing between the control and audio timelines.

use crate::{
    effects::{EffectParam, EffectsChain},
    sequencing::{Note, StepSequencer, Step, TrackId},
    synth::{MelodicVoice, VoicePool, VoiceRef},
    voices::VoiceSpec,
};

/// Control → audio. Applied at the start of the next rendered block.
pub enum Command {
    SetStep {
        track: TrackId,
        step: usize,
        value: Step,
    },
    SetBpm(f32),
    SetEffectParam {
        param: EffectParam,
        value: f32,
    },
    Start,
    Stop,
    /// Install a new melodic instrument; the old one comes back as [`Returned::Voice`].
    SwapVoice {
        track: TrackId,
        voice: Box<MelodicVoice>,
    },
    /// Hand the effects chain back for a rebuild. Audio passes dry meanwhile.
    RetireChain,
    InstallChain(Box<EffectsChain>),
    /// Replace the pattern (and the pool, when the layout changed) after a restore.
    ReplaceSession {
        sequencer: Box<StepSequencer>,
        pool: Option<Box<VoicePool>>,
    },
}

/// Audio → control: objects the audio thread must not deallocate itself.
pub enum Returned {
    Voice(Box<MelodicVoice>),
    Chain(Box<EffectsChain>),
    Session {
        sequencer: Box<StepSequencer>,
        pool: Option<Box<VoicePool>>,
    },
}

/// Notifications for the UI, drained by `AudioGraphManager::poll_events`.
#[derive(Debug, Clone, PartialEq)]
pub enum EngineEvent {
    StepFired {
        step_index: usize,
        frame: u64,
        time_secs: f64,
        triggered: usize,
    },
    TriggerSkipped {
        track: TrackId,
        frame: u64,
    },
    /// A block was replaced with silence (panic or non-finite output).
    AudioFault {
        frame: u64,
    },
    /// The audio side could not hand an object back; its ring was full.
    ReturnRingFull,
    InstrumentSwapped {
        voice: VoiceRef,
    },
    ChainRebuilt {
        generation: u64,
    },
    /// Control-side failure reported asynchronously (for example a rebuild fallback).
    Error(String),
}

/// User actions, as the UI layer sends them.
#[derive(Debug, Clone, PartialEq)]
pub enum Intent {
    Initialize,
    Dispose,
    ToggleStep {
        track: TrackId,
        step: usize,
    },
    SetVelocity {
        track: TrackId,
        step: usize,
        velocity: f32,
    },
    SetNote {
        track: TrackId,
        step: usize,
        note: Note,
    },
    SetBpm(f32),
    /// Parameter named by its wire name, e.g. `"filterFreq"`.
    SetEffectParam {
        name: String,
        value: f32,
    },
    Start,
    Stop,
    SwapInstrument(VoiceSpec),
}
