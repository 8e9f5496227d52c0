use crate::{
    graph::node::{GraphNode, RenderCtx},
    MAX_BLOCK_SIZE,
};

/*
Parallel Mix
============

    out = a · (1 - balance) + b · balance

Linear crossfade: balance 0.0 is all A, 1.0 is all B. The snare recipe uses
it to layer a tonal body under the noise rattle:

    body.mix(rattle, 0.7)   // 30% body, 70% rattle

Both sides receive gate events, and the mix stays active while either side
is, so a long rattle tail is not cut when the short body finishes.
*/

pub struct Mix<A, B> {
    source_a: A,
    source_b: B,
    balance: f32,
    temp_buffer: Vec<f32>,
}

impl<A, B> Mix<A, B> {
    pub fn new(source_a: A, source_b: B, balance: f32) -> Self {
        Mix {
            source_a,
            source_b,
            balance: balance.clamp(0.0, 1.0),
            temp_buffer: vec![0.0; MAX_BLOCK_SIZE],
        }
    }
}

impl<A: GraphNode, B: GraphNode> GraphNode for Mix<A, B> {
    fn render_block(&mut self, out: &mut [f32], ctx: &RenderCtx) {
        let weight_a = 1.0 - self.balance;
        let weight_b = self.balance;
        for chunk in out.chunks_mut(MAX_BLOCK_SIZE) {
            self.source_a.render_block(chunk, ctx);

            let frames = &mut self.temp_buffer[..chunk.len()];
            self.source_b.render_block(frames, ctx);

            for (o, b) in chunk.iter_mut().zip(frames.iter()) {
                *o = *o * weight_a + *b * weight_b;
            }
        }
    }

    fn note_on(&mut self, ctx: &RenderCtx) {
        self.source_a.note_on(ctx);
        self.source_b.note_on(ctx);
    }

    fn note_off(&mut self, ctx: &RenderCtx) {
        self.source_a.note_off(ctx);
        self.source_b.note_off(ctx);
    }

    fn is_active(&self) -> bool {
        self.source_a.is_active() || self.source_b.is_active()
    }

    fn get_envelope_level(&self) -> Option<f32> {
        match (
            self.source_a.get_envelope_level(),
            self.source_b.get_envelope_level(),
        ) {
            (Some(a), Some(b)) => Some(a.max(b)),
            (a, b) => a.or(b),
        }
    }
}

#[cfg(test)]
mod tests {
    use crate::graph::{extensions::NodeExt, node::GraphNode, node::RenderCtx, oscillator::OscNode};

    #[test]
    fn balance_extremes_select_one_side() {
        let ctx = RenderCtx::from_freq(48_000.0, 440.0, 1.0);

        let mut only_a = OscNode::sine().mix(OscNode::square(), 0.0);
        let mut reference = OscNode::sine();
        let mut mixed = vec![0.0f32; 128];
        let mut plain = vec![0.0f32; 128];
        only_a.render_block(&mut mixed, &ctx);
        reference.render_block(&mut plain, &ctx);
        assert_eq!(mixed, plain);

        let mut only_b = OscNode::sine().mix(OscNode::square(), 1.0);
        only_b.render_block(&mut mixed, &ctx);
        assert!(mixed.iter().all(|&s| s == 1.0 || s == -1.0));
    }

    #[test]
    fn long_blocks_match_short_ones() {
        let ctx = RenderCtx::from_freq(48_000.0, 220.0, 1.0);
        let frames = crate::MAX_BLOCK_SIZE * 2 + 7;

        let mut whole = OscNode::sine().mix(OscNode::sawtooth(), 0.5);
        let mut long = vec![0.0f32; frames];
        whole.render_block(&mut long, &ctx);

        let mut pieces = OscNode::sine().mix(OscNode::sawtooth(), 0.5);
        let mut short = vec![0.0f32; frames];
        for chunk in short.chunks_mut(256) {
            pieces.render_block(chunk, &ctx);
        }
        assert!(long.iter().zip(&short).all(|(a, b)| (a - b).abs() < 1e-5));
    }
}
