//! Hand clap: noise focused on the 1.5 kHz "crack" band.

use crate::graph::{
    envelope::EnvNode, extensions::NodeExt, filter::FilterNode, oscillator::OscNode, GraphNode,
};

pub fn clap() -> impl GraphNode {
    OscNode::noise()
        .through(FilterNode::bandpass(1_500.0))
        .amplify(EnvNode::adsr(0.005, 0.08, 0.0, 0.1))
        .gain(1.5)
}
