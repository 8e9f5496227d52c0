use log::debug;

use crate::{
    config::EngineConfig,
    error::GraphError,
    graph::node::GraphNode,
    sequencing::{Note, SessionLayout, TrackId, TrackKind, TriggerFault, TriggerSink},
    synth::{poly::PolyVoice, voice::Voice},
    voices::{self, VoiceSpec},
    MAX_BLOCK_SIZE,
};

/// Identity of a melodic instrument. Changes on every instrument swap.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct VoiceId(pub u64);

impl VoiceId {
    pub fn next(self) -> Self {
        Self(self.0 + 1)
    }
}

/// The voice identity currently feeding a track.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct VoiceRef {
    pub track: TrackId,
    pub id: VoiceId,
}

/// A built melodic instrument: `polyphony` copies of one [`VoiceSpec`].
pub struct MelodicVoice {
    id: VoiceId,
    spec: VoiceSpec,
    poly: PolyVoice,
}

impl MelodicVoice {
    pub fn build(
        id: VoiceId,
        spec: VoiceSpec,
        sample_rate: f32,
        polyphony: usize,
    ) -> Result<Self, GraphError> {
        let voices = (0..polyphony.max(1))
            .map(|_| spec.build().map(|graph| Voice::new(graph, sample_rate)))
            .collect::<Result<Vec<_>, _>>()?;

        Ok(Self {
            id,
            spec,
            poly: PolyVoice::new(voices),
        })
    }

    pub fn id(&self) -> VoiceId {
        self.id
    }

    pub fn spec(&self) -> &VoiceSpec {
        &self.spec
    }

    pub fn polyphony(&self) -> usize {
        self.poly.polyphony()
    }
}

enum TrackVoice {
    Percussion(Voice<Box<dyn GraphNode>>),
    Melodic(Box<MelodicVoice>),
}

impl TrackVoice {
    fn start(&mut self, note: Option<Note>, velocity: f32, age: u64, gate: u64, time: f64) {
        match self {
            TrackVoice::Percussion(voice) => voice.start(None, velocity, age, gate, time),
            TrackVoice::Melodic(voice) => voice.poly.note_on(note, velocity, gate, time),
        }
    }

    fn release(&mut self, time: f64) {
        match self {
            TrackVoice::Percussion(voice) => voice.release(time),
            TrackVoice::Melodic(voice) => voice.poly.release_all(time),
        }
    }

    fn is_active(&self) -> bool {
        match self {
            TrackVoice::Percussion(voice) => voice.is_active(),
            TrackVoice::Melodic(voice) => voice.poly.is_active(),
        }
    }

    fn render(&mut self, out: &mut [f32], time: f64) {
        match self {
            TrackVoice::Percussion(voice) => voice.render(out, time),
            TrackVoice::Melodic(voice) => voice.poly.render(out, time),
        }
    }
}

struct TrackSlot {
    kind: TrackKind,
    voice: TrackVoice,
    triggers: u64,
}

#[derive(Debug, Clone, Copy)]
struct PendingTrigger {
    track: TrackId,
    velocity: f32,
    note: Option<Note>,
    frame: u64,
}

/*
Trigger Scheduling
==========================

Ticks for a block are resolved before the block is rendered, so every trigger
arrives with an absolute frame that lies inside (or just after) the block:

    block        |------------------------------------------|
    pending          ^ kick @ 1200          ^ hat @ 3000
    rendered     [0 .. 1200) start kick [1200 .. 3000) start hat [3000 .. end)

`render` walks the pending queue in frame order, renders every track up to
the next trigger offset, starts the trigger, and continues. A trigger therefore
sounds on its exact frame regardless of block size.

The queue is a Vec allocated once with a fixed capacity; when it is full the
trigger is refused rather than grown.
*/

/// One persistent voice per track, driven on the audio timeline.
pub struct VoicePool {
    tracks: Vec<TrackSlot>,
    pending: Vec<PendingTrigger>,
    pending_capacity: usize,
    scratch: Vec<f32>,
    sample_rate: f32,
    gate_frames: u64,
    frame: u64,
    age: u64,
}

impl VoicePool {
    pub fn new(
        layout: &SessionLayout,
        spec: &VoiceSpec,
        sample_rate: f32,
        config: &EngineConfig,
    ) -> Result<Self, GraphError> {
        Self::with_voice_id(layout, spec, VoiceId(0), sample_rate, config)
    }

    pub fn with_voice_id(
        layout: &SessionLayout,
        spec: &VoiceSpec,
        id: VoiceId,
        sample_rate: f32,
        config: &EngineConfig,
    ) -> Result<Self, GraphError> {
        if !sample_rate.is_finite() || sample_rate <= 0.0 {
            return Err(GraphError::InvalidSampleRate(sample_rate));
        }

        let tracks = layout
            .kinds()
            .iter()
            .map(|&kind| {
                let voice = match kind {
                    TrackKind::Percussion(drum) => {
                        TrackVoice::Percussion(Voice::new(voices::percussion(drum), sample_rate))
                    }
                    TrackKind::Melodic => TrackVoice::Melodic(Box::new(MelodicVoice::build(
                        id,
                        *spec,
                        sample_rate,
                        config.melodic_polyphony,
                    )?)),
                };
                Ok(TrackSlot {
                    kind,
                    voice,
                    triggers: 0,
                })
            })
            .collect::<Result<Vec<_>, GraphError>>()?;

        debug!(
            "voice pool: {} tracks, {} pending triggers, polyphony {}",
            tracks.len(),
            config.pending_triggers,
            config.melodic_polyphony
        );

        Ok(Self {
            tracks,
            pending: Vec::with_capacity(config.pending_triggers),
            pending_capacity: config.pending_triggers,
            scratch: vec![0.0; MAX_BLOCK_SIZE],
            sample_rate,
            // one step at the default 120 bpm
            gate_frames: (sample_rate as f64 * 0.125).round() as u64,
            frame: 0,
            age: 0,
        })
    }

    pub fn len(&self) -> usize {
        self.tracks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tracks.is_empty()
    }

    pub fn sample_rate(&self) -> f32 {
        self.sample_rate
    }

    /// Gate length for triggers started from now on. One step at the current tempo.
    pub fn set_gate_frames(&mut self, frames: u64) {
        self.gate_frames = frames.max(1);
    }

    pub fn gate_frames(&self) -> u64 {
        self.gate_frames
    }

    /// Triggers fired on `track` since construction.
    pub fn trigger_count(&self, track: TrackId) -> u64 {
        self.tracks.get(track.0).map_or(0, |slot| slot.triggers)
    }

    /// Timeline frame the next `render` starts at.
    pub fn position(&self) -> u64 {
        self.frame
    }

    /// Move a freshly built pool onto a running timeline.
    pub fn align_to(&mut self, frame: u64) {
        self.frame = frame;
        self.pending.clear();
    }

    pub fn pending_len(&self) -> usize {
        self.pending.len()
    }

    /// Whether any track is still sounding.
    pub fn is_active(&self) -> bool {
        self.tracks.iter().any(|slot| slot.voice.is_active())
    }

    pub fn voice_ref(&self, track: TrackId) -> Option<VoiceRef> {
        match &self.tracks.get(track.0)?.voice {
            TrackVoice::Melodic(voice) => Some(VoiceRef { track, id: voice.id }),
            TrackVoice::Percussion(_) => None,
        }
    }

    /// Gate off every voice. Releases run out naturally.
    pub fn release_all(&mut self) {
        let time = self.time_at(self.frame);
        for slot in &mut self.tracks {
            slot.voice.release(time);
        }
    }

    /// Install a new melodic instrument on `track` and hand back the old one.
    ///
    /// The replaced voice is returned rather than dropped so the caller can
    /// deallocate it off the audio thread. A non-melodic track hands the new
    /// voice straight back as `Err`.
    pub fn swap_melodic_voice(
        &mut self,
        track: TrackId,
        voice: Box<MelodicVoice>,
    ) -> Result<Box<MelodicVoice>, Box<MelodicVoice>> {
        match self.tracks.get_mut(track.0).map(|slot| &mut slot.voice) {
            Some(TrackVoice::Melodic(current)) => Ok(std::mem::replace(current, voice)),
            _ => Err(voice),
        }
    }

    fn time_at(&self, frame: u64) -> f64 {
        frame as f64 / self.sample_rate as f64
    }

    /// Render every track into `out`, starting pending triggers on their frames.
    ///
    /// `out` is overwritten with the dry mix. Blocks longer than
    /// `MAX_BLOCK_SIZE` are rendered in pieces.
    pub fn render(&mut self, out: &mut [f32]) {
        for chunk in out.chunks_mut(MAX_BLOCK_SIZE) {
            self.render_chunk(chunk);
        }
    }

    fn render_chunk(&mut self, out: &mut [f32]) {
        out.fill(0.0);
        let start = self.frame;
        let end = start + out.len() as u64;

        let mut cursor = 0;
        let mut fired = 0;
        while let Some(trigger) = self.pending.get(fired).copied() {
            if trigger.frame >= end {
                break;
            }
            let offset = trigger.frame.saturating_sub(start) as usize;
            self.mix_segment(out, cursor, offset);
            cursor = offset;
            self.fire(trigger);
            fired += 1;
        }
        self.pending.drain(..fired);

        self.mix_segment(out, cursor, out.len());
        self.frame = end;
    }

    fn fire(&mut self, trigger: PendingTrigger) {
        let time = self.time_at(trigger.frame.max(self.frame));
        let age = self.age;
        self.age += 1;
        let gate = self.gate_frames;

        if let Some(slot) = self.tracks.get_mut(trigger.track.0) {
            slot.voice
                .start(trigger.note, trigger.velocity, age, gate, time);
            slot.triggers += 1;
        }
    }

    fn mix_segment(&mut self, out: &mut [f32], from: usize, to: usize) {
        if from >= to {
            return;
        }
        let time = self.time_at(self.frame + from as u64);
        let len = to - from;

        for slot in &mut self.tracks {
            if !slot.voice.is_active() {
                continue;
            }
            let scratch = &mut self.scratch[..len];
            slot.voice.render(scratch, time);
            for (o, s) in out[from..to].iter_mut().zip(scratch.iter()) {
                *o += s;
            }
        }
    }

    #[cfg(test)]
    fn kind(&self, track: TrackId) -> Option<TrackKind> {
        self.tracks.get(track.0).map(|slot| slot.kind)
    }
}

impl TriggerSink for VoicePool {
    fn trigger_voice(
        &mut self,
        track: TrackId,
        velocity: f32,
        note: Option<Note>,
        scheduled_frame: u64,
    ) -> Result<(), TriggerFault> {
        let Some(slot) = self.tracks.get(track.0) else {
            return Err(TriggerFault::UnknownTrack(track));
        };
        if self.pending.len() >= self.pending_capacity {
            return Err(TriggerFault::QueueFull(track));
        }

        let note = if slot.kind.is_melodic() { note } else { None };
        let trigger = PendingTrigger {
            track,
            velocity: velocity.clamp(0.0, 1.0),
            note,
            frame: scheduled_frame,
        };

        // keep frame order; ticks normally arrive sorted so this is a push
        let at = self
            .pending
            .iter()
            .rposition(|p| p.frame <= scheduled_frame)
            .map_or(0, |i| i + 1);
        self.pending.insert(at, trigger);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sequencing::PercussionKind;

    const SR: f32 = 48_000.0;
    const KICK: TrackId = TrackId(0);
    const MELODY: TrackId = TrackId(4);

    fn pool(config: &EngineConfig) -> VoicePool {
        VoicePool::new(&SessionLayout::default(), &VoiceSpec::default(), SR, config)
            .expect("default pool")
    }

    fn first_sound(buffer: &[f32]) -> Option<usize> {
        buffer.iter().position(|s| s.abs() > 1e-6)
    }

    #[test]
    fn one_voice_per_track() {
        let pool = pool(&EngineConfig::default());
        assert_eq!(pool.len(), 5);
        assert_eq!(pool.kind(KICK), Some(TrackKind::Percussion(PercussionKind::Kick)));
        assert_eq!(pool.voice_ref(MELODY), Some(VoiceRef { track: MELODY, id: VoiceId(0) }));
        assert_eq!(pool.voice_ref(KICK), None);
    }

    #[test]
    fn trigger_starts_on_its_exact_frame() {
        for block in [64usize, 256, 2048] {
            let mut pool = pool(&EngineConfig::default());
            pool.trigger_voice(KICK, 1.0, None, 1000).expect("queued");

            let mut rendered = Vec::new();
            let mut buffer = vec![0.0f32; block];
            while rendered.len() < 2048 {
                pool.render(&mut buffer);
                rendered.extend_from_slice(&buffer);
            }

            let onset = first_sound(&rendered).expect("kick sounds");
            assert!(rendered[..1000].iter().all(|s| *s == 0.0), "block size {block}");
            assert!((1000..1048).contains(&onset), "block size {block}: onset {onset}");
            assert_eq!(pool.trigger_count(KICK), 1);
        }
    }

    #[test]
    fn full_queue_refuses_without_growing() {
        let config = EngineConfig {
            pending_triggers: 8,
            ..EngineConfig::default()
        };
        let mut pool = pool(&config);

        for i in 0..8 {
            pool.trigger_voice(KICK, 0.5, None, 10_000 + i).expect("room");
        }
        assert_eq!(
            pool.trigger_voice(KICK, 0.5, None, 20_000),
            Err(TriggerFault::QueueFull(KICK))
        );
        assert_eq!(pool.pending_len(), 8);
        assert_eq!(
            pool.trigger_voice(TrackId(42), 0.5, None, 0),
            Err(TriggerFault::UnknownTrack(TrackId(42)))
        );
    }

    #[test]
    fn amplitude_follows_velocity() {
        let peak = |velocity: f32| {
            let mut pool = pool(&EngineConfig::default());
            pool.trigger_voice(KICK, velocity, None, 0).expect("queued");
            let mut buffer = vec![0.0f32; 2048];
            pool.render(&mut buffer);
            buffer.iter().fold(0.0f32, |acc, s| acc.max(s.abs()))
        };

        let full = peak(1.0);
        assert!(full > 0.01);
        assert!((peak(0.5) - full * 0.5).abs() < 1e-4);
    }

    #[test]
    fn melodic_gate_lasts_one_step_then_releases() {
        let mut pool = pool(&EngineConfig::default());
        pool.set_gate_frames(6000);
        pool.trigger_voice(MELODY, 1.0, Some(Note::A4), 0).expect("queued");

        let mut buffer = vec![0.0f32; 1000];
        for _ in 0..5 {
            pool.render(&mut buffer);
        }
        assert!(pool.is_active());

        // 0.3 s release after the gate closes at frame 6000
        for _ in 0..30 {
            pool.render(&mut buffer);
        }
        assert!(!pool.is_active());
    }

    #[test]
    fn swap_returns_previous_melodic_voice() {
        let mut pool = pool(&EngineConfig::default());
        let next = MelodicVoice::build(VoiceId(1), VoiceSpec::pluck(), SR, 2).expect("build");

        let old = pool
            .swap_melodic_voice(MELODY, Box::new(next))
            .unwrap_or_else(|_| panic!("melodic track"));
        assert_eq!(old.id(), VoiceId(0));
        assert_eq!(pool.voice_ref(MELODY).map(|v| v.id), Some(VoiceId(1)));

        let spare = MelodicVoice::build(VoiceId(2), VoiceSpec::pluck(), SR, 1).expect("build");
        assert!(pool.swap_melodic_voice(KICK, Box::new(spare)).is_err());
    }

    #[test]
    fn release_all_lets_voices_ring_out() {
        let mut pool = pool(&EngineConfig::default());
        pool.set_gate_frames(48_000);
        pool.trigger_voice(MELODY, 1.0, Some(Note::C4), 0).expect("queued");
        let mut buffer = vec![0.0f32; 512];
        pool.render(&mut buffer);

        pool.release_all();
        pool.render(&mut buffer);
        assert!(pool.is_active(), "release tail should still sound");
        assert!(buffer.iter().any(|s| s.abs() > 1e-4));
    }
}
