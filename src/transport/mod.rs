//! Musical time on the audio timeline.

pub mod clock;

pub use clock::{StepListener, StepTick, TransportClock, TransportState, MAX_BPM, MIN_BPM};
