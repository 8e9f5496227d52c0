use crate::{
    graph::node::{GraphNode, RenderCtx},
    sequencing::Note,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VoiceState {
    Free,      // Available for a new trigger
    Active,    // Gate open
    Releasing, // Gate closed, envelope in release
}

/// One playing instance of a graph, with a timed gate.
///
/// The gate opens on `start` and closes by itself after `gate_frames`. The
/// voice output is scaled by the trigger velocity.
pub struct Voice<T: GraphNode> {
    note: Option<Note>,
    velocity: f32,
    state: VoiceState,
    age: u64,
    gate_remaining: u64,
    sample_rate: f32,
    graph: T,
}

impl<T: GraphNode> Voice<T> {
    pub fn new(graph: T, sample_rate: f32) -> Self {
        Self {
            note: None,
            velocity: 0.0,
            state: VoiceState::Free,
            age: 0,
            gate_remaining: 0,
            sample_rate,
            graph,
        }
    }

    fn ctx(&self, time: f64) -> RenderCtx {
        let ctx = match self.note {
            Some(note) => RenderCtx::from_freq(self.sample_rate, note.frequency(), self.velocity),
            None => RenderCtx::from_freq(self.sample_rate, 0.0, self.velocity),
        };
        ctx.at_time(time)
    }

    /// Open the gate. Retriggers in place if the voice is already sounding.
    pub fn start(&mut self, note: Option<Note>, velocity: f32, age: u64, gate_frames: u64, time: f64) {
        self.note = note;
        self.velocity = velocity.clamp(0.0, 1.0);
        self.state = VoiceState::Active;
        self.age = age;
        self.gate_remaining = gate_frames.max(1);

        let ctx = self.ctx(time);
        self.graph.note_on(&ctx);
    }

    /// Close the gate early.
    pub fn release(&mut self, time: f64) {
        if self.state == VoiceState::Active {
            self.state = VoiceState::Releasing;
            self.gate_remaining = 0;

            let ctx = self.ctx(time);
            self.graph.note_off(&ctx);
        }
    }

    /// Render into `out` (overwriting it). Closes the gate on its exact frame.
    pub fn render(&mut self, out: &mut [f32], time: f64) {
        if self.state == VoiceState::Free {
            out.fill(0.0);
            return;
        }

        let mut rendered = 0;
        if self.state == VoiceState::Active && self.gate_remaining < out.len() as u64 {
            let open = self.gate_remaining as usize;
            let ctx = self.ctx(time);
            self.graph.render_block(&mut out[..open], &ctx);
            rendered = open;
            self.release(time + open as f64 / self.sample_rate as f64);
        }

        let ctx = self.ctx(time + rendered as f64 / self.sample_rate as f64);
        self.graph.render_block(&mut out[rendered..], &ctx);
        if self.state == VoiceState::Active {
            self.gate_remaining -= (out.len() - rendered) as u64;
        }

        for sample in out.iter_mut() {
            *sample *= self.velocity;
        }

        if self.state == VoiceState::Releasing && !self.graph.is_active() {
            self.free();
        }
    }

    pub fn sample_rate(&self) -> f32 {
        self.sample_rate
    }

    pub fn is_free(&self) -> bool {
        self.state == VoiceState::Free
    }

    pub fn is_active(&self) -> bool {
        matches!(self.state, VoiceState::Active | VoiceState::Releasing)
    }

    pub fn get_envelope_level(&self) -> Option<f32> {
        self.graph.get_envelope_level()
    }

    pub fn free(&mut self) {
        self.state = VoiceState::Free;
        self.gate_remaining = 0;
    }

    pub fn note(&self) -> Option<Note> {
        self.note
    }

    pub fn velocity(&self) -> f32 {
        self.velocity
    }

    pub fn age(&self) -> u64 {
        self.age
    }

    pub fn state(&self) -> VoiceState {
        self.state
    }
}
