//! Synthesis recipes for the track voices.
//!
//! Percussion voices have a fixed profile per [`PercussionKind`]; the melodic
//! voice is described by a [`VoiceSpec`].
//!
//! ```ignore
//! use beatgrid::voices;
//!
//! let kick = voices::kick();
//! let lead = voices::VoiceSpec::pluck().build()?;
//! ```

mod clap;
mod hihat;
mod kick;
mod melodic;
mod snare;

pub use self::clap::clap;
pub use self::hihat::hihat;
pub use self::kick::kick;
pub use self::melodic::{FilterSpec, VoiceSpec};
pub use self::snare::snare;

use crate::graph::{extensions::NodeExt, GraphNode};
use crate::sequencing::PercussionKind;

/// Boxed graph for a percussion track.
pub fn percussion(kind: PercussionKind) -> Box<dyn GraphNode> {
    match kind {
        PercussionKind::Kick => kick().boxed(),
        PercussionKind::Snare => snare().boxed(),
        PercussionKind::HiHat => hihat().boxed(),
        PercussionKind::Clap => clap().boxed(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::RenderCtx;

    fn hit(kind: PercussionKind) -> Vec<f32> {
        let ctx = RenderCtx::from_freq(48_000.0, 0.0, 1.0);
        let mut voice = percussion(kind);
        voice.note_on(&ctx);

        let mut buffer = vec![0.0f32; 2048];
        voice.render_block(&mut buffer, &ctx);
        buffer
    }

    #[test]
    fn every_drum_sounds_and_stays_bounded() {
        for kind in PercussionKind::ALL {
            let buffer = hit(kind);
            let peak = buffer.iter().fold(0.0f32, |acc, s| acc.max(s.abs()));
            assert!(peak > 0.01, "{kind:?} is silent");
            assert!(peak < 4.0, "{kind:?} peaks at {peak}");
        }
    }

    #[test]
    fn drums_decay_to_idle_without_gate_off() {
        let ctx = RenderCtx::from_freq(48_000.0, 0.0, 1.0);
        for kind in PercussionKind::ALL {
            let mut voice = percussion(kind);
            voice.note_on(&ctx);
            let mut buffer = vec![0.0f32; 2048];
            for _ in 0..10 {
                voice.render_block(&mut buffer, &ctx);
            }
            assert!(!voice.is_active(), "{kind:?} never went idle");
        }
    }

    #[test]
    fn hihat_is_brighter_than_kick() {
        let crossings = |b: &[f32]| b.windows(2).filter(|w| (w[0] < 0.0) != (w[1] < 0.0)).count();
        assert!(crossings(&hit(PercussionKind::HiHat)) > crossings(&hit(PercussionKind::Kick)) * 10);
    }
}
