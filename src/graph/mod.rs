//! Composable synthesis graph used to build the track voices.
//!
//! Graph nodes wrap the DSP primitives with gate events and block rendering.
//! `extensions` adds the fluent helpers (`.amplify()`, `.through()`,
//! `.modulate()`, `.mix()`, `.gain()`) the voice recipes are written with.

/// Multiply a signal by a modulator; fixed gain.
pub mod amplify;
/// Envelope generator node exposing ADSR state.
pub mod envelope;
/// Fluent combinators.
pub mod extensions;
/// State-variable filter node.
pub mod filter;
/// Linear crossfade of two parallel graphs.
pub mod mix;
/// Connect a modulation source to a node parameter.
pub mod modulate;
/// Core traits shared by all graph nodes.
pub mod node;
/// Audio-band oscillators and noise.
pub mod oscillator;
/// Serial chaining of two nodes (source → processor).
pub mod through;

pub use node::{GraphNode, RenderCtx};
