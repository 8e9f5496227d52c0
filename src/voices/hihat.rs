//! Closed hi-hat: high-passed noise with a very short envelope.

use crate::graph::{
    envelope::EnvNode, extensions::NodeExt, filter::FilterNode, oscillator::OscNode, GraphNode,
};

pub fn hihat() -> impl GraphNode {
    OscNode::noise()
        .amplify(EnvNode::adsr(0.001, 0.05, 0.0, 0.03))
        .through(FilterNode::highpass(7_000.0).with_resonance(0.3))
}
