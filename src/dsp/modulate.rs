//! Block-rate parameter modulation.

/*
A modulated parameter is updated once per rendered block rather than once
per sample:

    value = base + average(modulator block) · depth

Averaging the block (instead of taking its first sample) keeps fast
envelopes like a kick's pitch drop from stair-stepping when block sizes
change. Blocks here are at most 2048 frames and the VoicePool splits them
further at trigger points, so the kick's pitch sweep gets several updates
over its 60 ms.
*/

/// Mean of a block, or 0.0 for an empty one.
#[inline]
pub fn block_average(samples: &[f32]) -> f32 {
    if samples.is_empty() {
        return 0.0;
    }
    samples.iter().sum::<f32>() / samples.len() as f32
}
