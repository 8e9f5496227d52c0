//! Audio → UI feed for the scope and spectrum views.
//!
//! The audio side writes every output frame into a ring of atomics and never
//! waits. The reader copies out the most recent window whenever it redraws;
//! anything older than the window is simply overwritten. A reader that falls
//! behind sees the latest audio, not a backlog.

use std::sync::{
    atomic::{AtomicU32, AtomicU64, Ordering},
    Arc,
};

use rustfft::{num_complex::Complex, Fft, FftPlanner};

/// Floor for empty spectrum bins, in dB.
pub const SILENCE_DB: f32 = -120.0;

struct ScopeRing {
    samples: Box<[AtomicU32]>,
    written: AtomicU64,
}

/// Audio-side writer. Lock-free and allocation-free.
pub struct ScopeTap {
    ring: Arc<ScopeRing>,
}

impl ScopeTap {
    pub fn write(&mut self, block: &[f32]) {
        let len = self.ring.samples.len() as u64;
        let start = self.ring.written.load(Ordering::Relaxed);
        for (offset, sample) in block.iter().enumerate() {
            let slot = ((start + offset as u64) % len) as usize;
            self.ring.samples[slot].store(sample.to_bits(), Ordering::Relaxed);
        }
        self.ring
            .written
            .store(start + block.len() as u64, Ordering::Release);
    }
}

/// UI-side reader: latest scope window and its spectrum.
pub struct Visualizer {
    ring: Arc<ScopeRing>,
    window: Vec<f32>,
    hann: Vec<f32>,
    fft: Arc<dyn Fft<f32>>,
    scratch: Vec<Complex<f32>>,
    bin_indices: Vec<usize>,
    bin_freqs: Vec<f32>,
    spectrum: Vec<f32>,
}

/// Create a connected tap and reader.
///
/// The ring holds two windows so a block landing mid-read only disturbs the
/// oldest part of the copy.
pub fn scope_channel(window: usize, sample_rate: f32, bins: usize) -> (ScopeTap, Visualizer) {
    let window = window.max(2);
    let samples: Box<[AtomicU32]> = (0..window * 2).map(|_| AtomicU32::new(0)).collect();
    let ring = Arc::new(ScopeRing {
        samples,
        written: AtomicU64::new(0),
    });

    let hann = (0..window)
        .map(|i| {
            let denom = (window - 1) as f32;
            0.5 * (1.0 - (2.0 * std::f32::consts::PI * i as f32 / denom).cos())
        })
        .collect();

    let (bin_indices, bin_freqs) = log_bins(window, sample_rate, bins.max(1));
    let fft = FftPlanner::new().plan_fft_forward(window);

    let tap = ScopeTap { ring: ring.clone() };
    let visualizer = Visualizer {
        ring,
        window: vec![0.0; window],
        hann,
        fft,
        scratch: vec![Complex::new(0.0, 0.0); window],
        spectrum: vec![SILENCE_DB; bin_indices.len()],
        bin_indices,
        bin_freqs,
    };
    (tap, visualizer)
}

/// FFT bin index and centre frequency for `count` log-spaced bands, 20 Hz to
/// min(Nyquist, 20 kHz).
fn log_bins(window: usize, sample_rate: f32, count: usize) -> (Vec<usize>, Vec<f32>) {
    let max_freq = (sample_rate / 2.0).min(20_000.0).max(1.0);
    let min_freq = 20.0f32.min(max_freq);
    let ratio = max_freq / min_freq;
    let half = (window / 2).max(1);

    (0..count)
        .map(|i| {
            let t = if count > 1 {
                i as f32 / (count - 1) as f32
            } else {
                0.0
            };
            let freq = min_freq * ratio.powf(t);
            let index = ((freq * window as f32 / sample_rate).round() as usize).min(half - 1);
            (index, freq)
        })
        .unzip()
}

impl Visualizer {
    /// Total frames written by the audio side so far.
    pub fn frames_written(&self) -> u64 {
        self.ring.written.load(Ordering::Acquire)
    }

    pub fn window_len(&self) -> usize {
        self.window.len()
    }

    /// Copy of the most recent `window_len()` samples, oldest first.
    ///
    /// Before enough audio has been written the leading samples are zero.
    pub fn sample(&mut self) -> &[f32] {
        let end = self.frames_written();
        let len = self.ring.samples.len() as u64;
        let window = self.window.len() as u64;

        for (i, out) in self.window.iter_mut().enumerate() {
            let frame = (end + i as u64).checked_sub(window);
            *out = match frame {
                Some(frame) => {
                    f32::from_bits(self.ring.samples[(frame % len) as usize].load(Ordering::Relaxed))
                }
                None => 0.0,
            };
        }
        &self.window
    }

    /// Log-spaced magnitude spectrum of the latest window, in dB.
    pub fn spectrum(&mut self) -> &[f32] {
        self.sample();

        for ((slot, sample), weight) in self.scratch.iter_mut().zip(&self.window).zip(&self.hann) {
            *slot = Complex::new(sample * weight, 0.0);
        }
        self.fft.process(&mut self.scratch);

        for (db, &index) in self.spectrum.iter_mut().zip(&self.bin_indices) {
            let bin = self.scratch[index];
            let power = (bin.re * bin.re + bin.im * bin.im).max(1e-12);
            *db = (10.0 * power.log10()).max(SILENCE_DB);
        }
        &self.spectrum
    }

    /// Centre frequency of each spectrum band, in Hz.
    pub fn spectrum_frequencies(&self) -> &[f32] {
        &self.bin_freqs
    }
}
