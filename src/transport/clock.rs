use log::debug;
use serde::{Deserialize, Serialize};

use crate::PATTERN_LENGTH;

pub const MIN_BPM: f32 = 40.0;
pub const MAX_BPM: f32 = 240.0;
pub const DEFAULT_BPM: f32 = 120.0;

/// Sixteenth notes: four steps per beat.
const STEPS_PER_BEAT: f64 = 4.0;

/// Absorbs float noise so a tick that lands on a whole frame is not pushed
/// to the next one.
const FRAME_EPSILON: f64 = 1e-6;

/*
Step Timing
===========

Tick positions are computed from an anchor rather than accumulated:

    step_secs   = 60 / bpm / 4
    step_frames = sample_rate * step_secs      (fractional)

    tick(n)     = anchor + n * step_frames

The anchor is the frame where the clock was started, or the tick that was
already scheduled when the tempo changed. A tick is delivered at the first
whole frame at or after its exact position (`ceil`). Nothing is rounded
between steps, so 44.1 kHz at 130 bpm (66150/13 frames per step) stays on the
grid indefinitely.

`advance(n)` walks the window [frame, frame + n) and fires every tick inside
it before any audio for that window is rendered, so the voice pool can start
each trigger on its exact frame.
*/

/// One step boundary, as seen by the audio timeline.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct StepTick {
    pub step_index: usize,
    /// Absolute frame on the audio timeline.
    pub frame: u64,
    /// `frame / sample_rate`.
    pub time_secs: f64,
}

/// Observable transport state.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TransportState {
    pub bpm: f32,
    pub current_step_index: usize,
    pub is_playing: bool,
}

impl Default for TransportState {
    fn default() -> Self {
        Self {
            bpm: DEFAULT_BPM,
            current_step_index: 0,
            is_playing: false,
        }
    }
}

/// Receives step ticks while the clock advances.
pub trait StepListener {
    fn on_step(&mut self, tick: StepTick);
}

impl<F: FnMut(StepTick)> StepListener for F {
    fn on_step(&mut self, tick: StepTick) {
        self(tick)
    }
}

/// Sample-accurate step clock.
pub struct TransportClock {
    sample_rate: f64,
    bpm: f32,
    playing: bool,
    /// Frames rendered so far.
    frame: u64,
    anchor: f64,
    ticks_since_anchor: u64,
    step_frames: f64,
    next_step: usize,
    current_step: usize,
}

impl TransportClock {
    pub fn new(sample_rate: f32) -> Self {
        Self {
            sample_rate: sample_rate as f64,
            bpm: DEFAULT_BPM,
            playing: false,
            frame: 0,
            anchor: 0.0,
            ticks_since_anchor: 0,
            step_frames: step_frames(sample_rate as f64, DEFAULT_BPM),
            next_step: 0,
            current_step: 0,
        }
    }

    /// Arm the clock. Step 0 fires on the first frame of the next advanced window.
    pub fn start(&mut self) {
        if self.playing {
            return;
        }
        self.playing = true;
        self.anchor = self.frame as f64;
        self.ticks_since_anchor = 0;
        self.step_frames = self.samples_per_step();
    }

    /// Halt future ticks and rewind to step 0.
    pub fn stop(&mut self) {
        self.playing = false;
        self.next_step = 0;
        self.current_step = 0;
    }

    /// Store `clamp(bpm, 40, 240)`. The tick already scheduled keeps its frame;
    /// the new spacing applies after it.
    pub fn set_bpm(&mut self, bpm: f32) -> f32 {
        if !bpm.is_finite() {
            debug!("ignoring non-finite bpm {bpm}");
            return self.bpm;
        }
        let clamped = bpm.clamp(MIN_BPM, MAX_BPM);
        if clamped != bpm {
            debug!("bpm {bpm} clamped to {clamped}");
        }
        if self.playing && clamped != self.bpm {
            self.anchor = self.next_tick();
            self.ticks_since_anchor = 0;
        }
        self.bpm = clamped;
        self.step_frames = self.samples_per_step();
        clamped
    }

    pub fn bpm(&self) -> f32 {
        self.bpm
    }

    pub fn is_playing(&self) -> bool {
        self.playing
    }

    pub fn current_step(&self) -> usize {
        self.current_step
    }

    pub fn sample_rate(&self) -> f32 {
        self.sample_rate as f32
    }

    /// Frames advanced since construction.
    pub fn position(&self) -> u64 {
        self.frame
    }

    pub fn step_duration_secs(&self) -> f64 {
        60.0 / self.bpm as f64 / STEPS_PER_BEAT
    }

    /// Fractional step length in frames.
    pub fn samples_per_step(&self) -> f64 {
        step_frames(self.sample_rate, self.bpm)
    }

    fn next_tick(&self) -> f64 {
        self.anchor + self.ticks_since_anchor as f64 * self.step_frames
    }

    pub fn transport_state(&self) -> TransportState {
        TransportState {
            bpm: self.bpm,
            current_step_index: self.current_step,
            is_playing: self.playing,
        }
    }

    /// Move the timeline forward by `frames`, firing every tick inside the window.
    ///
    /// Returns the number of ticks fired.
    pub fn advance<L: StepListener>(&mut self, frames: usize, listener: &mut L) -> usize {
        let start = self.frame;
        let end = start + frames as u64;
        let mut fired = 0;

        while self.playing {
            let exact = self.next_tick() - FRAME_EPSILON;
            let tick_frame = (exact.ceil().max(0.0) as u64).max(start);
            if tick_frame >= end {
                break;
            }

            let tick = StepTick {
                step_index: self.next_step,
                frame: tick_frame,
                time_secs: tick_frame as f64 / self.sample_rate,
            };
            self.current_step = self.next_step;
            self.next_step = (self.next_step + 1) % PATTERN_LENGTH;
            self.ticks_since_anchor += 1;
            fired += 1;

            listener.on_step(tick);
        }

        self.frame = end;
        fired
    }
}

fn step_frames(sample_rate: f64, bpm: f32) -> f64 {
    sample_rate * 60.0 / bpm as f64 / STEPS_PER_BEAT
}
