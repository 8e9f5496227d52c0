use crate::{
    dsp::modulate::block_average,
    graph::node::{GraphNode, Modulatable, RenderCtx},
    MAX_BLOCK_SIZE,
};

/// Drives one parameter of `source` from the output of `modulator`.
///
/// The modulator is rendered first, averaged over the block, and applied as
/// `base + average · depth` before the source renders. Blocks longer than
/// `MAX_BLOCK_SIZE` are averaged per chunk. Gate events reach both
/// sides so an envelope modulator restarts on every hit.
pub struct Modulate<S, M>
where
    S: GraphNode + Modulatable,
    M: GraphNode,
{
    source: S,
    modulator: M,
    param: S::Param,
    depth: f32,
    mod_buffer: Vec<f32>,
}

impl<S, M> Modulate<S, M>
where
    S: GraphNode + Modulatable,
    M: GraphNode,
{
    pub fn new(source: S, modulator: M, param: S::Param, depth: f32) -> Self {
        Self {
            source,
            modulator,
            param,
            depth,
            mod_buffer: vec![0.0; MAX_BLOCK_SIZE],
        }
    }
}

impl<S, M> GraphNode for Modulate<S, M>
where
    S: GraphNode + Modulatable,
    M: GraphNode,
{
    fn render_block(&mut self, out: &mut [f32], ctx: &RenderCtx) {
        for chunk in out.chunks_mut(MAX_BLOCK_SIZE) {
            let frames = &mut self.mod_buffer[..chunk.len()];
            self.modulator.render_block(frames, ctx);

            let base = self.source.get_param(self.param);
            let modulation = block_average(frames) * self.depth;
            self.source.apply_modulation(self.param, base, modulation);

            self.source.render_block(chunk, ctx);
        }
    }

    fn note_on(&mut self, ctx: &RenderCtx) {
        self.source.note_on(ctx);
        self.modulator.note_on(ctx);
    }

    fn note_off(&mut self, ctx: &RenderCtx) {
        self.source.note_off(ctx);
        self.modulator.note_off(ctx);
    }

    fn is_active(&self) -> bool {
        self.source.is_active()
    }

    fn get_envelope_level(&self) -> Option<f32> {
        self.source.get_envelope_level()
    }
}
