//! Melodic voice recipe.
//!
//! Unlike the drums, the melodic track's sound is data: a [`VoiceSpec`]
//! names the waveform, the ADSR, and an optional filter. Swapping the spec is
//! what the engine treats as an instrument (voice identity) change.

use serde::{Deserialize, Serialize};

use crate::{
    dsp::{filter::FilterType, oscillator::OscillatorWaveform},
    error::GraphError,
    graph::{
        envelope::EnvNode, extensions::NodeExt, filter::FilterNode, oscillator::OscNode,
        GraphNode,
    },
};

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FilterSpec {
    pub kind: FilterType,
    pub cutoff: f32,
    pub resonance: f32,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VoiceSpec {
    pub waveform: OscillatorWaveform,
    pub attack: f32,
    pub decay: f32,
    pub sustain: f32,
    pub release: f32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub filter: Option<FilterSpec>,
}

impl Default for VoiceSpec {
    fn default() -> Self {
        Self {
            waveform: OscillatorWaveform::Saw,
            attack: 0.01,
            decay: 0.2,
            sustain: 0.6,
            release: 0.3,
            filter: Some(FilterSpec {
                kind: FilterType::LowPass,
                cutoff: 2_500.0,
                resonance: 0.2,
            }),
        }
    }
}

impl VoiceSpec {
    /// Short, bright pluck: fast decay to silence.
    pub fn pluck() -> Self {
        Self {
            waveform: OscillatorWaveform::Saw,
            attack: 0.001,
            decay: 0.3,
            sustain: 0.0,
            release: 0.1,
            filter: Some(FilterSpec {
                kind: FilterType::LowPass,
                cutoff: 3_000.0,
                resonance: 0.3,
            }),
        }
    }

    /// Soft square lead without a filter.
    pub fn square_lead() -> Self {
        Self {
            waveform: OscillatorWaveform::Square,
            attack: 0.005,
            decay: 0.1,
            sustain: 0.8,
            release: 0.2,
            filter: None,
        }
    }

    pub fn validate(&self) -> Result<(), GraphError> {
        let times = [self.attack, self.decay, self.release];
        if times.iter().any(|t| !t.is_finite() || *t < 0.0) {
            return Err(GraphError::VoiceConstruction(format!(
                "envelope times must be finite and non-negative: {times:?}"
            )));
        }
        if !self.sustain.is_finite() {
            return Err(GraphError::VoiceConstruction(
                "sustain level is not finite".into(),
            ));
        }
        if let Some(filter) = self.filter {
            if !filter.cutoff.is_finite() || filter.cutoff <= 0.0 {
                return Err(GraphError::VoiceConstruction(format!(
                    "filter cutoff {} Hz is not usable",
                    filter.cutoff
                )));
            }
        }
        Ok(())
    }

    /// Build one sub-voice graph for this spec.
    pub fn build(&self) -> Result<Box<dyn GraphNode>, GraphError> {
        self.validate()?;

        let source = OscNode::new(self.waveform)
            .amplify(EnvNode::adsr(self.attack, self.decay, self.sustain, self.release))
            .gain(0.5);

        Ok(match self.filter {
            Some(filter) => source
                .through(FilterNode::new(filter.kind, filter.cutoff).with_resonance(filter.resonance))
                .boxed(),
            None => source.boxed(),
        })
    }
}
