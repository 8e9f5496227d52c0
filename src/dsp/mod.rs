//! Low-level DSP primitives used by the graph nodes and effect stages.
//!
//! Everything here is allocation-free once constructed, so these structs can
//! be embedded directly in voices and stages that live on the audio thread.

/// Circular delay buffer with fractional reads.
pub mod delay;
/// Waveshaping curves for the distortion stage.
pub mod distortion;
/// Attack/decay/sustain/release envelope generator.
pub mod envelope;
/// State-variable filter and first-order allpass.
pub mod filter;
/// Sine LFO and modulation range helpers.
pub mod lfo;
/// Block-rate modulation math.
pub mod modulate;
/// Phase-accumulator oscillator and noise.
pub mod oscillator;
/// Schroeder reverb (comb bank + allpass diffusers).
pub mod reverb;

pub use envelope::EnvelopeState;
