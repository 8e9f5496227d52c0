//! The fixed-order master effects chain.
//!
//! Filter → Delay → Reverb → Distortion → Phaser → Flanger → output.
//! Parameter edits mutate live stages; only an instrument swap rebuilds them.

pub mod chain;
pub mod params;
pub mod stages;

use serde::{Deserialize, Serialize};

pub use chain::{EffectsChain, RebuildOutcome};
pub use params::{EffectParam, EffectParams, ParseParamError};
pub use stages::{DefaultStageFactory, EffectStage, StageFactory};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StageKind {
    Filter,
    Delay,
    Reverb,
    Distortion,
    Phaser,
    Flanger,
}

impl StageKind {
    /// Processing order. Never changes.
    pub const ORDER: [StageKind; 6] = [
        StageKind::Filter,
        StageKind::Delay,
        StageKind::Reverb,
        StageKind::Distortion,
        StageKind::Phaser,
        StageKind::Flanger,
    ];
}
