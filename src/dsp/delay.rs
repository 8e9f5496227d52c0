/// Circular delay buffer sized once at construction.
///
/// `write` pushes one sample; `read` and `read_interpolated` look back a
/// number of samples from the most recent write. Reads past the buffer
/// length are clamped to the oldest sample held.
pub struct DelayLine {
    buffer: Vec<f32>,
    write_pos: usize,
}

impl DelayLine {
    /// Allocates `capacity` samples. Never resized afterwards.
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            buffer: vec![0.0; capacity.max(2)],
            write_pos: 0,
        }
    }

    pub fn capacity(&self) -> usize {
        self.buffer.len()
    }

    #[inline]
    pub fn write(&mut self, sample: f32) {
        self.buffer[self.write_pos] = sample;
        self.write_pos = (self.write_pos + 1) % self.buffer.len();
    }

    /// Sample written `delay` writes ago (`delay = 1` is the last write).
    #[inline]
    pub fn read(&self, delay: usize) -> f32 {
        let len = self.buffer.len();
        let delay = delay.clamp(1, len);
        self.buffer[(self.write_pos + len - delay) % len]
    }

    /// Linear interpolation between the two samples around a fractional delay.
    #[inline]
    pub fn read_interpolated(&self, delay: f32) -> f32 {
        let max = (self.buffer.len() - 1) as f32;
        let delay = delay.clamp(1.0, max);
        let whole = delay.floor();
        let frac = delay - whole;

        let a = self.read(whole as usize);
        let b = self.read(whole as usize + 1);
        a + (b - a) * frac
    }

    pub fn reset(&mut self) {
        self.buffer.fill(0.0);
        self.write_pos = 0;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn impulse_comes_back_after_delay() {
        let mut line = DelayLine::with_capacity(16);
        line.write(1.0);
        for _ in 0..4 {
            line.write(0.0);
        }
        assert_eq!(line.read(5), 1.0);
        assert_eq!(line.read(4), 0.0);
    }

    #[test]
    fn interpolation_blends_neighbours() {
        let mut line = DelayLine::with_capacity(8);
        line.write(1.0);
        line.write(0.0);
        assert!((line.read_interpolated(1.5) - 0.5).abs() < 1e-6);
    }

    #[test]
    fn oversized_delay_is_clamped() {
        let mut line = DelayLine::with_capacity(4);
        for i in 0..4 {
            line.write(i as f32);
        }
        assert_eq!(line.read(100), 0.0);
        assert!(line.read_interpolated(1_000.0).is_finite());
    }
}
