//! Voice management: gated voices, polyphony, and the per-track pool.

pub mod poly;
pub mod pool;
pub mod voice;

pub use pool::{MelodicVoice, VoiceId, VoicePool, VoiceRef};
pub use voice::{Voice, VoiceState};
