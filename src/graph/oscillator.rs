use crate::dsp::oscillator::{OscillatorBlock, OscillatorWaveform};
use crate::graph::node::{GraphNode, Modulatable, RenderCtx};

/*
Oscillator Node
===============

Two pitch modes:

  tracking   frequency comes from RenderCtx (the step's note). Used by the
             melodic voice, so C4 on the grid renders at 261.6 Hz.

  fixed      `.with_frequency(hz)` pins the pitch and ignores the note. Drums
             use this; the pitch can then be swept with `.modulate()`:

    // membrane: settles at 50 Hz, starts 120 Hz higher
    OscNode::sine()
        .with_frequency(50.0)
        .modulate(EnvNode::adsr(0.001, 0.06, 0.0, 0.0), OscParam::Frequency, 120.0)

Fixed-pitch oscillators restart their phase on every gate-on so each drum hit
starts from the same point of the waveform.
*/

pub struct OscNode {
    osc: OscillatorBlock,
    base_frequency: Option<f32>,
    current_frequency: f32,
}

#[derive(Clone, Copy, Debug)]
pub enum OscParam {
    Frequency,
}

impl OscNode {
    pub fn new(waveform: OscillatorWaveform) -> Self {
        Self {
            osc: OscillatorBlock::new(waveform),
            base_frequency: None,
            current_frequency: 440.0,
        }
    }

    pub fn sine() -> Self {
        Self::new(OscillatorWaveform::Sine)
    }

    pub fn sawtooth() -> Self {
        Self::new(OscillatorWaveform::Saw)
    }

    pub fn square() -> Self {
        Self::new(OscillatorWaveform::Square)
    }

    pub fn triangle() -> Self {
        Self::new(OscillatorWaveform::Triangle)
    }

    pub fn noise() -> Self {
        Self::new(OscillatorWaveform::Noise)
    }

    /// Pin the pitch, ignoring `ctx.frequency`.
    pub fn with_frequency(mut self, freq: f32) -> Self {
        self.base_frequency = Some(freq);
        self.current_frequency = freq;
        self
    }
}

impl GraphNode for OscNode {
    fn render_block(&mut self, out: &mut [f32], ctx: &RenderCtx) {
        let frequency = match self.base_frequency {
            Some(_) => self.current_frequency,
            None => ctx.frequency,
        };

        let ctx = RenderCtx { frequency, ..*ctx };
        self.osc.render(out, &ctx);
    }

    fn note_on(&mut self, _ctx: &RenderCtx) {
        if let Some(base) = self.base_frequency {
            self.current_frequency = base;
            self.osc.reset_phase();
        }
    }
}

impl Modulatable for OscNode {
    type Param = OscParam;

    fn get_param(&self, param: Self::Param) -> f32 {
        match param {
            OscParam::Frequency => self.base_frequency.unwrap_or(self.current_frequency),
        }
    }

    fn apply_modulation(&mut self, param: Self::Param, base: f32, modulation: f32) {
        match param {
            OscParam::Frequency => {
                self.current_frequency = (base + modulation).clamp(20.0, 20_000.0);
            }
        }
    }
}
