//! Waveshaping curves.
//!
//! The effects chain exposes a single `distortion` amount in [0, 100]. It is
//! applied as `amount / 100`, which sets both how hard the signal is driven
//! into the curve and how much of the shaped signal replaces the dry one. At
//! 0 the stage is an exact passthrough.

/// Maximum drive reached at amount = 100.
pub const MAX_DRIVE: f32 = 20.0;

/// Rational soft clipper, `x / (1 + |x|)` after drive. Odd-symmetric, never exceeds ±1.
#[inline]
pub fn soft_clip(sample: f32, drive: f32) -> f32 {
    let x = sample * drive;
    x / (1.0 + x.abs())
}

/// Drive factor for a normalised amount in [0, 1].
#[inline]
pub fn drive_for(amount: f32) -> f32 {
    1.0 + amount.clamp(0.0, 1.0) * (MAX_DRIVE - 1.0)
}

/// Shape `buffer` in place. `amount` is normalised to [0, 1].
pub fn shape_buffer(buffer: &mut [f32], amount: f32) {
    let amount = amount.clamp(0.0, 1.0);
    if amount == 0.0 {
        return;
    }

    let drive = drive_for(amount);
    for sample in buffer.iter_mut() {
        let dry = *sample;
        let wet = soft_clip(dry, drive);
        *sample = dry + (wet - dry) * amount;
    }
}
