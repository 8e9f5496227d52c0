//! The running engine: control-side manager, audio-side renderer, and the
//! rings between them.

pub mod command;
pub mod device;
pub mod manager;
pub mod renderer;
pub mod visualizer;

pub use command::{Command, EngineEvent, Intent, Returned};
pub use device::{AudioDevice, CpalDevice, DeviceInfo, OfflineDevice};
pub use manager::AudioGraphManager;
pub use renderer::{Renderer, RendererHandle, RendererParts};
pub use visualizer::{scope_channel, ScopeTap, Visualizer};
