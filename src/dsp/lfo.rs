//! Low frequency oscillators for the modulated effect stages.

use std::f32::consts::TAU;

/*
Control-Rate Sweeps
===================

The phaser and the flanger both move something slowly back and forth: the
phaser sweeps its allpass break frequency, the flanger sweeps a short delay
time. Both use the same sine LFO, read once per sample:

    value = sin(phase)            bipolar, -1 .. +1
    phase += 2π · rate / sr

Most targets want a one-sided sweep, so the stages map the bipolar value to
unipolar first and then scale it onto the target range:

    unipolar = (value + 1) / 2
    target   = low + unipolar · (high - low)

A phaser at 0.5 Hz takes two seconds per sweep; at the 10 Hz top of its
range it turns into a warble.
*/

/// Sine LFO with a free-running phase.
pub struct Lfo {
    phase: f32,
    rate_hz: f32,
}

impl Lfo {
    pub fn new(rate_hz: f32) -> Self {
        Self {
            phase: 0.0,
            rate_hz: rate_hz.max(0.0),
        }
    }

    pub fn rate(&self) -> f32 {
        self.rate_hz
    }

    /// Change speed without restarting the sweep.
    pub fn set_rate(&mut self, rate_hz: f32) {
        self.rate_hz = rate_hz.max(0.0);
    }

    /// Current value (bipolar), then advance one sample.
    #[inline]
    pub fn next_sample(&mut self, sample_rate: f32) -> f32 {
        let value = self.phase.sin();
        self.phase += TAU * self.rate_hz / sample_rate;
        if self.phase >= TAU {
            self.phase -= TAU;
        }
        value
    }

    pub fn reset(&mut self) {
        self.phase = 0.0;
    }
}

/// Convert bipolar signal (-1.0 to +1.0) to unipolar (0.0 to 1.0).
///
/// ```
/// use beatgrid::dsp::lfo::bipolar_to_unipolar;
/// assert_eq!(bipolar_to_unipolar(0.0), 0.5);
/// ```
#[inline]
pub fn bipolar_to_unipolar(bipolar: f32) -> f32 {
    (bipolar + 1.0) * 0.5
}

/// Calculate samples per LFO period.
///
/// ```
/// use beatgrid::dsp::lfo::samples_per_period;
/// assert_eq!(samples_per_period(5.0, 48_000.0), 9600.0);
/// ```
#[inline]
pub fn samples_per_period(frequency_hz: f32, sample_rate: f32) -> f32 {
    sample_rate / frequency_hz
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn completes_one_cycle_per_period() {
        let sample_rate = 1_000.0;
        let mut lfo = Lfo::new(2.0);
        let period = samples_per_period(2.0, sample_rate) as usize;

        let first = lfo.next_sample(sample_rate);
        for _ in 1..period {
            lfo.next_sample(sample_rate);
        }
        let wrapped = lfo.next_sample(sample_rate);
        assert!((first - wrapped).abs() < 1e-3);
    }

    #[test]
    fn output_stays_bipolar() {
        let mut lfo = Lfo::new(7.3);
        for _ in 0..10_000 {
            let v = lfo.next_sample(48_000.0);
            assert!((-1.0..=1.0).contains(&v));
        }
    }

    #[test]
    fn rate_change_keeps_phase() {
        let mut lfo = Lfo::new(1.0);
        for _ in 0..100 {
            lfo.next_sample(1_000.0);
        }
        let before = lfo.phase;
        lfo.set_rate(5.0);
        assert_eq!(lfo.phase, before);
        assert_eq!(lfo.rate(), 5.0);
    }

    #[test]
    fn unipolar_mapping_covers_range() {
        assert!((bipolar_to_unipolar(-1.0)).abs() < 1e-6);
        assert!((bipolar_to_unipolar(1.0) - 1.0).abs() < 1e-6);
    }
}
