use std::f32::consts::PI;

use serde::{Deserialize, Serialize};

use crate::graph::node::RenderCtx;

/*
Filters
=======

SVFilter is a topology-preserving-transform state-variable filter. One
update produces all four responses at once:

| response  | output          | used by                         |
| --------- | --------------- | ------------------------------- |
| low-pass  | v2              | kick body, master filter stage  |
| high-pass | x - k·v1 - v2   | hi-hat                          |
| band-pass | v1              | snare rattle, clap              |
| notch     | x - k·v1        |                                 |

The damping term k sets resonance. It can be driven two ways:

    set_resonance(r)   k = 2 - 2r        r in [0, 1), synth-style
    set_q(q)           k = 1 / q         q > 0, engineering-style

FirstOrderAllpass is a one-pole allpass (flat magnitude, frequency dependent
phase). A cascade of them swept by an LFO is the classic phaser.
*/

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FilterType {
    LowPass,
    HighPass,
    BandPass,
    Notch,
}

pub struct FilterOutputs {
    pub lowpass: f32,
    pub bandpass: f32,
    pub highpass: f32,
    pub notch: f32,
}

/// Lowest Q accepted by [`SVFilter::set_q`]; Q = 0 would mean infinite damping.
const MIN_Q: f32 = 0.05;

pub struct SVFilter {
    ic1eq: f32,
    ic2eq: f32,

    cutoff_hz: f32,
    damping: f32,
    filter_type: FilterType,
}

impl SVFilter {
    pub fn new(filter_type: FilterType, cutoff_hz: f32) -> Self {
        Self {
            ic1eq: 0.0,
            ic2eq: 0.0,
            cutoff_hz,
            damping: 2.0,
            filter_type,
        }
    }

    pub fn lowpass(cutoff_hz: f32) -> Self {
        Self::new(FilterType::LowPass, cutoff_hz)
    }

    pub fn highpass(cutoff_hz: f32) -> Self {
        Self::new(FilterType::HighPass, cutoff_hz)
    }

    pub fn bandpass(cutoff_hz: f32) -> Self {
        Self::new(FilterType::BandPass, cutoff_hz)
    }

    pub fn notch(cutoff_hz: f32) -> Self {
        Self::new(FilterType::Notch, cutoff_hz)
    }

    #[inline]
    fn compute_g(&self, sample_rate: f32) -> f32 {
        // Keep the prewarped cutoff below Nyquist or tan() blows up.
        let cutoff = self.cutoff_hz.clamp(1.0, sample_rate * 0.49);
        (PI * cutoff / sample_rate).tan()
    }

    #[inline]
    pub fn next_sample(&mut self, sample: f32, k: f32, g: f32) -> FilterOutputs {
        let h = 1.0 / (1.0 + g * (g + k));
        let v3 = sample - self.ic2eq;
        let v1 = h * (self.ic1eq + g * v3);
        let v2 = self.ic2eq + g * v1;

        self.ic1eq = 2.0 * v1 - self.ic1eq;
        self.ic2eq = 2.0 * v2 - self.ic2eq;

        FilterOutputs {
            lowpass: v2,
            bandpass: v1,
            highpass: sample - k * v1 - v2,
            notch: sample - k * v1,
        }
    }

    pub fn render(&mut self, buffer: &mut [f32], ctx: &RenderCtx) {
        let g = self.compute_g(ctx.sample_rate);
        let k = self.damping;

        for sample in buffer.iter_mut() {
            let outputs = self.next_sample(*sample, k, g);

            *sample = match self.filter_type {
                FilterType::LowPass => outputs.lowpass,
                FilterType::HighPass => outputs.highpass,
                FilterType::BandPass => outputs.bandpass,
                FilterType::Notch => outputs.notch,
            }
        }
    }

    pub fn reset(&mut self) {
        self.ic1eq = 0.0;
        self.ic2eq = 0.0;
    }

    pub fn cutoff(&self) -> f32 {
        self.cutoff_hz
    }

    pub fn set_cutoff(&mut self, cutoff: f32) {
        self.cutoff_hz = cutoff;
    }

    /// Synth-style resonance in [0, 1). 1.0 would self-oscillate, so it is capped.
    pub fn set_resonance(&mut self, resonance: f32) {
        self.damping = 2.0 - 2.0 * resonance.clamp(0.0, 0.995);
    }

    pub fn set_q(&mut self, q: f32) {
        self.damping = 1.0 / q.max(MIN_Q);
    }

    pub fn damping(&self) -> f32 {
        self.damping
    }
}

/// One-pole allpass section: `y = a·x + x[n-1] - a·y[n-1]`.
#[derive(Default)]
pub struct FirstOrderAllpass {
    coefficient: f32,
    x1: f32,
    y1: f32,
}

impl FirstOrderAllpass {
    pub fn new() -> Self {
        Self::default()
    }

    /// Place the 90° phase point at `frequency` Hz.
    pub fn set_frequency(&mut self, frequency: f32, sample_rate: f32) {
        let frequency = frequency.clamp(1.0, sample_rate * 0.49);
        let t = (PI * frequency / sample_rate).tan();
        self.coefficient = (t - 1.0) / (t + 1.0);
    }

    #[inline]
    pub fn process(&mut self, input: f32) -> f32 {
        let output = self.coefficient * input + self.x1 - self.coefficient * self.y1;
        self.x1 = input;
        self.y1 = output;
        output
    }

    pub fn reset(&mut self) {
        self.x1 = 0.0;
        self.y1 = 0.0;
    }
}
