use crate::graph::node::{GraphNode, RenderCtx};

/// Serial chain: render `source`, then process the buffer in place with `filter`.
///
/// Activity follows the source; a processor on its own never keeps a voice alive.
pub struct Through<S, F> {
    source: S,
    filter: F,
}

impl<S, F> Through<S, F> {
    pub fn new(source: S, filter: F) -> Self {
        Self { source, filter }
    }
}

impl<S: GraphNode, F: GraphNode> GraphNode for Through<S, F> {
    fn render_block(&mut self, out: &mut [f32], ctx: &RenderCtx) {
        self.source.render_block(out, ctx);
        self.filter.render_block(out, ctx);
    }

    fn note_on(&mut self, ctx: &RenderCtx) {
        self.source.note_on(ctx);
        self.filter.note_on(ctx);
    }

    fn note_off(&mut self, ctx: &RenderCtx) {
        self.source.note_off(ctx);
        self.filter.note_off(ctx);
    }

    fn is_active(&self) -> bool {
        self.source.is_active()
    }

    fn get_envelope_level(&self) -> Option<f32> {
        self.source.get_envelope_level()
    }
}

#[cfg(test)]
mod tests {
    use crate::graph::{
        envelope::EnvNode, extensions::NodeExt, filter::FilterNode, node::GraphNode,
        node::RenderCtx, oscillator::OscNode,
    };

    #[test]
    fn activity_follows_the_gated_source() {
        let ctx = RenderCtx::from_freq(48_000.0, 440.0, 1.0);
        let mut node = OscNode::sine()
            .amplify(EnvNode::adsr(0.001, 0.01, 0.0, 0.01))
            .through(FilterNode::lowpass(2_000.0));
        assert!(!node.is_active());

        node.note_on(&ctx);
        let mut buffer = vec![0.0f32; 128];
        node.render_block(&mut buffer, &ctx);
        assert!(node.is_active());
        assert!(buffer.iter().all(|s| s.is_finite()));

        let mut tail = vec![0.0f32; 2048];
        node.render_block(&mut tail, &ctx);
        assert!(!node.is_active());
    }
}
