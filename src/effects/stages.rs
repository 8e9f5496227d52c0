use crate::{
    dsp::{
        delay::DelayLine,
        distortion::shape_buffer,
        filter::{FilterType, FirstOrderAllpass, SVFilter},
        lfo::{bipolar_to_unipolar, Lfo},
        reverb::SchroederReverb,
    },
    effects::{EffectParam, EffectParams, StageKind},
    error::GraphError,
    graph::RenderCtx,
    synth::VoiceRef,
};

pub const MIN_SAMPLE_RATE: f32 = 8_000.0;
pub const MAX_SAMPLE_RATE: f32 = 384_000.0;

/// Longest delay time the delay stage is sized for, in seconds.
const MAX_DELAY_SECS: f32 = 2.0;
const DELAY_WET: f32 = 0.25;
const PHASER_WET: f32 = 0.5;

/// One processing stage of the chain.
///
/// Stages process a mono buffer in place and take parameter edits without
/// being rebuilt. Values passed to `set_param` are already clamped.
pub trait EffectStage: Send {
    fn kind(&self) -> StageKind;

    fn process(&mut self, buffer: &mut [f32]);

    fn set_param(&mut self, param: EffectParam, value: f32);

    /// Clear internal state (delay lines, filter memory).
    fn reset(&mut self);
}

/// Constructs stages for the chain.
///
/// The chain goes through this seam on every structural build so tests can
/// substitute a factory that fails.
pub trait StageFactory {
    fn build_stage(
        &self,
        kind: StageKind,
        params: &EffectParams,
        sample_rate: f32,
        voice: VoiceRef,
    ) -> Result<Box<dyn EffectStage>, GraphError>;
}

pub fn validate_sample_rate(sample_rate: f32) -> Result<(), GraphError> {
    if sample_rate.is_finite() && (MIN_SAMPLE_RATE..=MAX_SAMPLE_RATE).contains(&sample_rate) {
        Ok(())
    } else {
        Err(GraphError::InvalidSampleRate(sample_rate))
    }
}

#[derive(Debug, Default, Clone, Copy)]
pub struct DefaultStageFactory;

impl StageFactory for DefaultStageFactory {
    fn build_stage(
        &self,
        kind: StageKind,
        params: &EffectParams,
        sample_rate: f32,
        _voice: VoiceRef,
    ) -> Result<Box<dyn EffectStage>, GraphError> {
        validate_sample_rate(sample_rate)?;

        Ok(match kind {
            StageKind::Filter => Box::new(FilterStage::new(params, sample_rate)),
            StageKind::Delay => Box::new(DelayStage::new(params, sample_rate)?),
            StageKind::Reverb => Box::new(ReverbStage::new(params, sample_rate)),
            StageKind::Distortion => Box::new(DistortionStage::new(params)),
            StageKind::Phaser => Box::new(PhaserStage::new(params, sample_rate)),
            StageKind::Flanger => Box::new(FlangerStage::new(params, sample_rate)),
        })
    }
}

/// Resonant lowpass.
pub struct FilterStage {
    filter: SVFilter,
    ctx: RenderCtx,
}

impl FilterStage {
    pub fn new(params: &EffectParams, sample_rate: f32) -> Self {
        let mut filter = SVFilter::new(FilterType::LowPass, params.get(EffectParam::FilterFreq));
        filter.set_q(params.get(EffectParam::FilterRes));
        Self {
            filter,
            ctx: RenderCtx::from_freq(sample_rate, 0.0, 1.0),
        }
    }
}

impl EffectStage for FilterStage {
    fn kind(&self) -> StageKind {
        StageKind::Filter
    }

    fn process(&mut self, buffer: &mut [f32]) {
        self.filter.render(buffer, &self.ctx);
    }

    fn set_param(&mut self, param: EffectParam, value: f32) {
        match param {
            EffectParam::FilterFreq => self.filter.set_cutoff(value),
            EffectParam::FilterRes => self.filter.set_q(value),
            _ => {}
        }
    }

    fn reset(&mut self) {
        self.filter.reset();
    }
}

/// Feedback echo at a fixed wet level.
pub struct DelayStage {
    line: DelayLine,
    sample_rate: f32,
    delay_samples: f32,
    feedback: f32,
}

impl DelayStage {
    pub fn new(params: &EffectParams, sample_rate: f32) -> Result<Self, GraphError> {
        let capacity = (MAX_DELAY_SECS * sample_rate).ceil();
        if !capacity.is_finite() || capacity < 1.0 {
            return Err(GraphError::StageConstruction {
                stage: StageKind::Delay,
                reason: format!("cannot size a {MAX_DELAY_SECS} s buffer at {sample_rate} Hz"),
            });
        }

        Ok(Self {
            line: DelayLine::with_capacity(capacity as usize + 2),
            sample_rate,
            delay_samples: params.get(EffectParam::DelayTime) * sample_rate,
            feedback: params.get(EffectParam::DelayFeedback),
        })
    }
}

impl EffectStage for DelayStage {
    fn kind(&self) -> StageKind {
        StageKind::Delay
    }

    fn process(&mut self, buffer: &mut [f32]) {
        // Under one sample there is no echo to add.
        if self.delay_samples < 1.0 {
            for sample in buffer.iter() {
                self.line.write(*sample);
            }
            return;
        }

        for sample in buffer.iter_mut() {
            let delayed = self.line.read_interpolated(self.delay_samples);
            self.line.write(*sample + delayed * self.feedback);
            *sample += delayed * DELAY_WET;
        }
    }

    fn set_param(&mut self, param: EffectParam, value: f32) {
        match param {
            EffectParam::DelayTime => self.delay_samples = value * self.sample_rate,
            EffectParam::DelayFeedback => self.feedback = value,
            _ => {}
        }
    }

    fn reset(&mut self) {
        self.line.reset();
    }
}

pub struct ReverbStage {
    reverb: SchroederReverb,
    mix: f32,
}

impl ReverbStage {
    pub fn new(params: &EffectParams, sample_rate: f32) -> Self {
        Self {
            reverb: SchroederReverb::new(sample_rate),
            mix: params.get(EffectParam::ReverbMix),
        }
    }
}

impl EffectStage for ReverbStage {
    fn kind(&self) -> StageKind {
        StageKind::Reverb
    }

    fn process(&mut self, buffer: &mut [f32]) {
        if self.mix == 0.0 {
            for sample in buffer.iter() {
                self.reverb.process(*sample);
            }
            return;
        }
        for sample in buffer.iter_mut() {
            let wet = self.reverb.process(*sample);
            *sample = *sample * (1.0 - self.mix) + wet * self.mix;
        }
    }

    fn set_param(&mut self, param: EffectParam, value: f32) {
        if param == EffectParam::ReverbMix {
            self.mix = value;
        }
    }

    fn reset(&mut self) {
        self.reverb.reset();
    }
}

/// Soft-clip waveshaper. `distortion / 100` sets drive and wet amount.
pub struct DistortionStage {
    amount: f32,
}

impl DistortionStage {
    pub fn new(params: &EffectParams) -> Self {
        Self {
            amount: params.get(EffectParam::Distortion) / 100.0,
        }
    }
}

impl EffectStage for DistortionStage {
    fn kind(&self) -> StageKind {
        StageKind::Distortion
    }

    fn process(&mut self, buffer: &mut [f32]) {
        shape_buffer(buffer, self.amount);
    }

    fn set_param(&mut self, param: EffectParam, value: f32) {
        if param == EffectParam::Distortion {
            self.amount = value / 100.0;
        }
    }

    fn reset(&mut self) {}
}

/*
Phaser
======

Four first-order allpass sections in series shift the phase of the signal
without changing its level. Mixing that copy back with the dry signal cancels
the frequencies where the shift reaches 180°, which produces notches. An LFO
sweeps the allpass corner between 200 Hz and 2 kHz so the notches move.

    x ──┬──────────────────────────────┐
        └─ AP ─ AP ─ AP ─ AP ── × 0.5 ─┴─ y

`phaserFreq` is the sweep rate.
*/

const PHASER_SECTIONS: usize = 4;
const PHASER_MIN_HZ: f32 = 200.0;
const PHASER_MAX_HZ: f32 = 2_000.0;

pub struct PhaserStage {
    sections: [FirstOrderAllpass; PHASER_SECTIONS],
    lfo: Lfo,
    sample_rate: f32,
}

impl PhaserStage {
    pub fn new(params: &EffectParams, sample_rate: f32) -> Self {
        Self {
            sections: Default::default(),
            lfo: Lfo::new(params.get(EffectParam::PhaserFreq)),
            sample_rate,
        }
    }
}

impl EffectStage for PhaserStage {
    fn kind(&self) -> StageKind {
        StageKind::Phaser
    }

    fn process(&mut self, buffer: &mut [f32]) {
        for sample in buffer.iter_mut() {
            let sweep = bipolar_to_unipolar(self.lfo.next_sample(self.sample_rate));
            // exponential sweep so the notches move evenly in pitch
            let corner = PHASER_MIN_HZ * (PHASER_MAX_HZ / PHASER_MIN_HZ).powf(sweep);

            let mut shifted = *sample;
            for section in &mut self.sections {
                section.set_frequency(corner, self.sample_rate);
                shifted = section.process(shifted);
            }
            *sample = *sample * (1.0 - PHASER_WET) + shifted * PHASER_WET;
        }
    }

    fn set_param(&mut self, param: EffectParam, value: f32) {
        if param == EffectParam::PhaserFreq {
            self.lfo.set_rate(value);
        }
    }

    fn reset(&mut self) {
        self.sections.iter_mut().for_each(FirstOrderAllpass::reset);
        self.lfo.reset();
    }
}

/*
Flanger
=======

A chorus with a much shorter delay and feedback. The delayed copy sweeps
between 0.5 ms and 3.5 ms; summed with the dry signal it forms a comb filter
whose teeth glide up and down.

  delay_ms = 2.0 + lfo · 1.5
  y        = x · (1 - mix) + delayed · mix,     mix = depth / 2

At depth 0 the stage is an exact passthrough.
*/

const FLANGER_BASE_MS: f32 = 2.0;
const FLANGER_SWING_MS: f32 = 1.5;
const FLANGER_RATE_HZ: f32 = 0.3;
const FLANGER_FEEDBACK: f32 = 0.5;

pub struct FlangerStage {
    line: DelayLine,
    lfo: Lfo,
    sample_rate: f32,
    mix: f32,
}

impl FlangerStage {
    pub fn new(params: &EffectParams, sample_rate: f32) -> Self {
        let capacity = ((FLANGER_BASE_MS + FLANGER_SWING_MS) * sample_rate / 1000.0).ceil() as usize;
        Self {
            line: DelayLine::with_capacity(capacity + 4),
            lfo: Lfo::new(FLANGER_RATE_HZ),
            sample_rate,
            mix: params.get(EffectParam::FlangerDepth) * 0.5,
        }
    }
}

impl EffectStage for FlangerStage {
    fn kind(&self) -> StageKind {
        StageKind::Flanger
    }

    fn process(&mut self, buffer: &mut [f32]) {
        for sample in buffer.iter_mut() {
            let swing = self.lfo.next_sample(self.sample_rate);
            let delay_ms = FLANGER_BASE_MS + swing * FLANGER_SWING_MS;
            let delayed = self
                .line
                .read_interpolated(delay_ms * self.sample_rate / 1000.0);

            self.line.write(*sample + delayed * FLANGER_FEEDBACK);
            if self.mix > 0.0 {
                *sample = *sample * (1.0 - self.mix) + delayed * self.mix;
            }
        }
    }

    fn set_param(&mut self, param: EffectParam, value: f32) {
        if param == EffectParam::FlangerDepth {
            self.mix = value * 0.5;
        }
    }

    fn reset(&mut self) {
        self.line.reset();
        self.lfo.reset();
    }
}
