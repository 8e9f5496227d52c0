//! Kick drum: a membrane model.
//!
//! A sine body whose pitch falls fast from ~170 Hz to 50 Hz, under a short
//! amplitude envelope, then a lowpass to take the edge off the first cycle.
//! The step's note is ignored.

use crate::graph::{
    envelope::EnvNode,
    extensions::NodeExt,
    filter::FilterNode,
    oscillator::{OscNode, OscParam},
    GraphNode,
};

pub fn kick() -> impl GraphNode {
    let pitch_drop = EnvNode::adsr(0.001, 0.06, 0.0, 0.0);

    OscNode::sine()
        .with_frequency(50.0)
        .modulate(pitch_drop, OscParam::Frequency, 120.0)
        .amplify(EnvNode::adsr(0.001, 0.25, 0.0, 0.05))
        .through(FilterNode::lowpass(200.0))
        .gain(1.2)
}
