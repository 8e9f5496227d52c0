/*
Schroeder Reverb
================

    input ──┬──> comb 29.7ms ──┐
            ├──> comb 37.1ms ──┤
            ├──> comb 41.1ms ──┼──> (sum / 4) ──> allpass 5.0ms ──> allpass 1.7ms ──> out
            └──> comb 43.7ms ──┘

The comb delays are mutually prime-ish so their echoes don't stack into a
flutter. Each comb has a one-pole lowpass in its feedback path (damping),
which makes the tail darken as it decays like a real room.

Buffers are sized from the sample rate when the reverb is built, so the
same delay times hold at 44.1, 48 or 96 kHz. Nothing allocates after that.
*/

const COMB_DELAYS_MS: [f32; 4] = [29.7, 37.1, 41.1, 43.7];
const ALLPASS_DELAYS_MS: [f32; 2] = [5.0, 1.7];

fn ms_to_samples(ms: f32, sample_rate: f32) -> usize {
    ((ms * sample_rate / 1000.0) as usize).max(1)
}

pub struct CombFilter {
    buffer: Vec<f32>,
    write_pos: usize,
    feedback: f32,
    damp: f32,
    filter_state: f32,
}

impl CombFilter {
    pub fn new(delay_samples: usize) -> Self {
        Self {
            buffer: vec![0.0; delay_samples.max(1)],
            write_pos: 0,
            feedback: 0.5,
            damp: 0.5,
            filter_state: 0.0,
        }
    }

    pub fn set_feedback(&mut self, feedback: f32) {
        self.feedback = feedback.clamp(0.0, 0.99);
    }

    pub fn set_damp(&mut self, damp: f32) {
        self.damp = damp.clamp(0.0, 1.0);
    }

    #[inline]
    pub fn process(&mut self, input: f32) -> f32 {
        let output = self.buffer[self.write_pos];
        self.filter_state = output * (1.0 - self.damp) + self.filter_state * self.damp;
        self.buffer[self.write_pos] = input + self.filter_state * self.feedback;
        self.write_pos = (self.write_pos + 1) % self.buffer.len();
        output
    }

    pub fn reset(&mut self) {
        self.buffer.fill(0.0);
        self.filter_state = 0.0;
        self.write_pos = 0;
    }
}

pub struct AllpassFilter {
    buffer: Vec<f32>,
    write_pos: usize,
    feedback: f32,
}

impl AllpassFilter {
    pub fn new(delay_samples: usize) -> Self {
        Self {
            buffer: vec![0.0; delay_samples.max(1)],
            write_pos: 0,
            feedback: 0.5,
        }
    }

    #[inline]
    pub fn process(&mut self, input: f32) -> f32 {
        let delayed = self.buffer[self.write_pos];
        let output = -self.feedback * input + delayed;
        self.buffer[self.write_pos] = input + self.feedback * output;
        self.write_pos = (self.write_pos + 1) % self.buffer.len();
        output
    }

    pub fn reset(&mut self) {
        self.buffer.fill(0.0);
        self.write_pos = 0;
    }
}

pub struct SchroederReverb {
    combs: [CombFilter; 4],
    allpasses: [AllpassFilter; 2],
}

impl SchroederReverb {
    pub fn new(sample_rate: f32) -> Self {
        let combs = COMB_DELAYS_MS.map(|ms| CombFilter::new(ms_to_samples(ms, sample_rate)));
        let allpasses =
            ALLPASS_DELAYS_MS.map(|ms| AllpassFilter::new(ms_to_samples(ms, sample_rate)));

        let mut reverb = Self { combs, allpasses };
        reverb.set_room_size(0.5);
        reverb.set_damping(0.5);
        reverb
    }

    /// 0.0 (small room) to 1.0 (hall). Maps to comb feedback 0.7 ..= 0.98.
    pub fn set_room_size(&mut self, size: f32) {
        let feedback = 0.7 + size.clamp(0.0, 1.0) * 0.28;
        for comb in &mut self.combs {
            comb.set_feedback(feedback);
        }
    }

    pub fn set_damping(&mut self, damp: f32) {
        for comb in &mut self.combs {
            comb.set_damp(damp);
        }
    }

    #[inline]
    pub fn process(&mut self, input: f32) -> f32 {
        let mut output = 0.0;
        for comb in &mut self.combs {
            output += comb.process(input);
        }
        output *= 0.25;

        for allpass in &mut self.allpasses {
            output = allpass.process(output);
        }
        output
    }

    pub fn reset(&mut self) {
        self.combs.iter_mut().for_each(CombFilter::reset);
        self.allpasses.iter_mut().for_each(AllpassFilter::reset);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn comb_echoes_after_its_delay() {
        let mut comb = CombFilter::new(10);
        comb.set_feedback(0.5);
        comb.set_damp(0.0);

        assert_eq!(comb.process(1.0), 0.0);
        for _ in 0..9 {
            comb.process(0.0);
        }
        assert!(comb.process(0.0) > 0.9);
    }

    #[test]
    fn impulse_leaves_a_tail() {
        let mut reverb = SchroederReverb::new(48_000.0);
        reverb.process(1.0);

        let tail = (0..5_000).map(|_| reverb.process(0.0)).any(|s| s.abs() > 1e-3);
        assert!(tail);
    }

    #[test]
    fn reset_silences_the_tail() {
        let mut reverb = SchroederReverb::new(44_100.0);
        for _ in 0..2_000 {
            reverb.process(0.5);
        }
        reverb.reset();
        assert!((0..4_000).all(|_| reverb.process(0.0) == 0.0));
    }

    #[test]
    fn largest_room_stays_stable() {
        let mut reverb = SchroederReverb::new(96_000.0);
        reverb.set_room_size(1.0);
        for _ in 0..20_000 {
            let out = reverb.process(0.1);
            assert!(out.is_finite() && out.abs() < 10.0);
        }
    }
}
