/// Convert a MIDI note number to Hz (A4 = 69 = 440 Hz).
#[inline]
pub fn midi_note_to_freq(note: u8) -> f32 {
    440.0 * 2.0_f32.powf((note as f32 - 69.0) / 12.0)
}

/// Context passed to graph nodes while rendering.
///
/// - `sample_rate`: frames per second of the output stream
/// - `frequency`: pitch to render in Hz (ignored by fixed-pitch drums)
/// - `velocity`: trigger intensity, normalised to 0.0..=1.0
/// - `time`: seconds on the audio timeline at the first frame of the block
#[derive(Debug, Clone, Copy)]
pub struct RenderCtx {
    pub sample_rate: f32,
    pub frequency: f32,
    pub velocity: f32,
    pub time: f64,
}

impl RenderCtx {
    /// Context for a pitched trigger (melodic tracks).
    pub fn from_note(sample_rate: f32, note: u8, velocity: f32) -> Self {
        Self::from_freq(sample_rate, midi_note_to_freq(note), velocity)
    }

    /// Context for a fixed frequency (percussion and effect stages).
    pub fn from_freq(sample_rate: f32, frequency: f32, velocity: f32) -> Self {
        Self {
            sample_rate,
            frequency,
            velocity: velocity.clamp(0.0, 1.0),
            time: 0.0,
        }
    }

    pub fn at_time(self, time: f64) -> Self {
        Self { time, ..self }
    }
}

/// Nodes whose parameters can be driven by another node's output.
pub trait Modulatable: Send {
    type Param: Copy + Send;

    fn get_param(&self, param: Self::Param) -> f32;

    fn apply_modulation(&mut self, param: Self::Param, base: f32, modulation: f32);
}

/// Core trait for synthesis graph nodes.
///
/// Nodes render in blocks and respond to gate events. Every node must be
/// `Send` so a finished voice can be built on the control thread and handed
/// to the audio thread.
pub trait GraphNode: Send {
    fn render_block(&mut self, out: &mut [f32], ctx: &RenderCtx);

    /// Gate on.
    fn note_on(&mut self, _ctx: &RenderCtx) {}

    /// Gate off. Envelopes enter release; other nodes ignore it.
    fn note_off(&mut self, _ctx: &RenderCtx) {}

    fn get_envelope_level(&self) -> Option<f32> {
        None
    }

    /// Whether this node still produces sound. Voices use it to go idle.
    fn is_active(&self) -> bool {
        true
    }
}

impl GraphNode for Box<dyn GraphNode> {
    fn render_block(&mut self, out: &mut [f32], ctx: &RenderCtx) {
        (**self).render_block(out, ctx)
    }

    fn note_on(&mut self, ctx: &RenderCtx) {
        (**self).note_on(ctx)
    }

    fn note_off(&mut self, ctx: &RenderCtx) {
        (**self).note_off(ctx)
    }

    fn get_envelope_level(&self) -> Option<f32> {
        (**self).get_envelope_level()
    }

    fn is_active(&self) -> bool {
        (**self).is_active()
    }
}
