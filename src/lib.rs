pub mod config; // Engine sizing, loaded from JSON
pub mod dsp;
pub mod effects; // Master effects chain
pub mod engine; // Manager, renderer, devices
pub mod error;
pub mod export; // Offline WAV bounce
pub mod graph; // Composable audio graph nodes
pub mod sequencing; // Track × Step grid
pub mod snapshot; // Project files
pub mod synth; // Voice management and polyphony
pub mod transport; // Sample-accurate step clock
pub mod voices; // Drum and melodic voice recipes

pub use config::EngineConfig;
pub use engine::{AudioGraphManager, EngineEvent, Intent};
pub use error::EngineError;
pub use snapshot::ProjectSnapshot;

pub const MAX_BLOCK_SIZE: usize = 2048;
/// Steps in every pattern.
pub const PATTERN_LENGTH: usize = 16;
pub(crate) const MIN_TIME: f32 = 1.0 / 48_000.0;
