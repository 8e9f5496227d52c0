//! Snare drum: broadband noise over a short tonal body.
//!
//! The noise half is band-passed around 3 kHz to sound like the wires; the
//! triangle half at a fixed 180 Hz is the drum head.

use crate::graph::{
    envelope::EnvNode, extensions::NodeExt, filter::FilterNode, oscillator::OscNode, GraphNode,
};

pub fn snare() -> impl GraphNode {
    let rattle = OscNode::noise()
        .amplify(EnvNode::adsr(0.001, 0.12, 0.0, 0.08))
        .through(FilterNode::bandpass(3_000.0));

    let body = OscNode::triangle()
        .with_frequency(180.0)
        .amplify(EnvNode::adsr(0.001, 0.08, 0.0, 0.05))
        .through(FilterNode::lowpass(400.0));

    body.mix(rattle, 0.7).gain(1.4)
}
