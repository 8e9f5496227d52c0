use crate::{
    graph::node::GraphNode,
    sequencing::Note,
    synth::voice::{Voice, VoiceState},
    MAX_BLOCK_SIZE,
};

/// A fixed set of sub-voices sharing one recipe.
///
/// All sub-voices are built up front; a trigger reuses a free one or steals
/// the oldest. Nothing here allocates after construction.
pub struct PolyVoice {
    voices: Vec<Voice<Box<dyn GraphNode>>>,
    temp_buffer: Vec<f32>,
    next_age: u64,
}

impl PolyVoice {
    pub fn new(voices: Vec<Voice<Box<dyn GraphNode>>>) -> Self {
        Self {
            voices,
            temp_buffer: vec![0.0; MAX_BLOCK_SIZE],
            next_age: 0,
        }
    }

    pub fn polyphony(&self) -> usize {
        self.voices.len()
    }

    pub fn note_on(&mut self, note: Option<Note>, velocity: f32, gate_frames: u64, time: f64) {
        let age = self.next_age;
        self.next_age += 1;
        if let Some(voice) = self.allocate_voice() {
            voice.start(note, velocity, age, gate_frames, time);
        }
    }

    pub fn release_all(&mut self, time: f64) {
        for voice in &mut self.voices {
            voice.release(time);
        }
    }

    /// Mix every sounding sub-voice into `out` (overwriting it).
    pub fn render(&mut self, out: &mut [f32], time: f64) {
        out.fill(0.0);
        for voice in &mut self.voices {
            if !voice.is_active() {
                continue;
            }
            let seconds_per_frame = 1.0 / voice.sample_rate() as f64;
            for (i, chunk) in out.chunks_mut(MAX_BLOCK_SIZE).enumerate() {
                let temp = &mut self.temp_buffer[..chunk.len()];
                let offset = (i * MAX_BLOCK_SIZE) as f64 * seconds_per_frame;
                voice.render(temp, time + offset);
                for (o, v) in chunk.iter_mut().zip(temp.iter()) {
                    *o += v;
                }
            }
        }
    }

    pub fn is_active(&self) -> bool {
        self.voices.iter().any(Voice::is_active)
    }

    pub fn active_voices(&self) -> usize {
        self.voices.iter().filter(|v| v.is_active()).count()
    }

    fn allocate_voice(&mut self) -> Option<&mut Voice<Box<dyn GraphNode>>> {
        // First pass: a free voice
        if let Some(idx) = self.voices.iter().position(|v| v.is_free()) {
            return self.voices.get_mut(idx);
        }

        // Second pass: the oldest releasing voice, then the oldest held one
        let steal_idx = self
            .voices
            .iter()
            .enumerate()
            .min_by_key(|(_, v)| (v.state() != VoiceState::Releasing, v.age()))
            .map(|(idx, _)| idx);

        steal_idx.and_then(|idx| self.voices.get_mut(idx))
    }
}
