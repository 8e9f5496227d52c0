use std::f32::consts::TAU;

use serde::{Deserialize, Serialize};

use crate::graph::node::RenderCtx;

/*
Phase-Accumulator Oscillator
============================

Every periodic waveform here is computed from a single phase value in the
range [0, 1). Each sample the phase advances by `frequency / sample_rate`
and wraps back into range:

    phase += f / sr
    if phase >= 1.0 { phase -= 1.0 }

The waveform is then a pure function of phase:

    sine      sin(2π · phase)
    saw       2 · phase - 1
    square    +1 for phase < 0.5, -1 otherwise
    triangle  1 - 4 · |phase - 0.5|        (0 at phase 0.25 and 0.75)

Saw and square are naive (not band-limited). At drum-machine pitches the
aliasing is inaudible under the envelope and the effects chain.

Noise ignores phase and uses a 32-bit xorshift generator, so rendering noise
never touches a global RNG and never allocates.
*/

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OscillatorWaveform {
    Sine,
    Saw,
    Square,
    Triangle,
    Noise,
}

pub struct OscillatorBlock {
    waveform: OscillatorWaveform,
    phase: f32,
    rng_state: u32,
}

const NOISE_SEED: u32 = 0x9E37_79B9;

impl OscillatorBlock {
    pub fn new(waveform: OscillatorWaveform) -> Self {
        Self {
            waveform,
            phase: 0.0,
            rng_state: NOISE_SEED,
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

    pub fn waveform(&self) -> OscillatorWaveform {
        self.waveform
    }

    /// Restart the waveform from phase zero.
    pub fn reset_phase(&mut self) {
        self.phase = 0.0;
    }

    #[inline]
    fn next_noise(&mut self) -> f32 {
        let mut x = self.rng_state;
        x ^= x << 13;
        x ^= x >> 17;
        x ^= x << 5;
        self.rng_state = x;
        (x as f32 / u32::MAX as f32) * 2.0 - 1.0
    }

    #[inline]
    pub fn next_sample(&mut self, increment: f32) -> f32 {
        let phase = self.phase;
        let value = match self.waveform {
            OscillatorWaveform::Sine => (TAU * phase).sin(),
            OscillatorWaveform::Saw => 2.0 * phase - 1.0,
            OscillatorWaveform::Square => {
                if phase < 0.5 {
                    1.0
                } else {
                    -1.0
                }
            }
            OscillatorWaveform::Triangle => 1.0 - 4.0 * (phase - 0.5).abs(),
            OscillatorWaveform::Noise => return self.next_noise(),
        };

        self.phase += increment;
        if self.phase >= 1.0 {
            self.phase -= self.phase.floor();
        }

        value
    }

    /// Fill `buffer` with the waveform at `ctx.frequency`.
    pub fn render(&mut self, buffer: &mut [f32], ctx: &RenderCtx) {
        let increment = if ctx.sample_rate > 0.0 {
            (ctx.frequency / ctx.sample_rate).max(0.0)
        } else {
            0.0
        };

        for sample in buffer.iter_mut() {
            *sample = self.next_sample(increment);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ctx(frequency: f32) -> RenderCtx {
        RenderCtx::from_freq(48_000.0, frequency, 1.0)
    }

    #[test]
    fn sine_starts_at_zero_crossing() {
        let mut osc = OscillatorBlock::sine();
        let mut buffer = [0.0f32; 4];
        osc.render(&mut buffer, &ctx(440.0));
        assert_eq!(buffer[0], 0.0);
        assert!(buffer[1] > 0.0);
    }

    #[test]
    fn square_alternates_between_rails() {
        let mut osc = OscillatorBlock::square();
        let mut buffer = vec![0.0f32; 480];
        osc.render(&mut buffer, &ctx(100.0));
        assert!(buffer.iter().all(|&s| s == 1.0 || s == -1.0));
        assert_eq!(buffer[0], 1.0);
        assert_eq!(buffer[300], -1.0);
    }

    #[test]
    fn triangle_and_saw_stay_bounded() {
        for mut osc in [OscillatorBlock::triangle(), OscillatorBlock::sawtooth()] {
            let mut buffer = vec![0.0f32; 1024];
            osc.render(&mut buffer, &ctx(1234.5));
            assert!(buffer.iter().all(|s| (-1.0..=1.0).contains(s)));
        }
    }

    #[test]
    fn noise_is_bounded_and_not_constant() {
        let mut osc = OscillatorBlock::noise();
        let mut buffer = vec![0.0f32; 256];
        osc.render(&mut buffer, &ctx(0.0));

        assert!(buffer.iter().all(|s| (-1.0..=1.0).contains(s)));
        let first = buffer[0];
        assert!(buffer.iter().any(|&s| (s - first).abs() > 1e-3));
    }
}
