use rtrb::{Consumer, Producer, PushError, RingBuffer};

use crate::{
    config::EngineConfig,
    effects::EffectsChain,
    engine::{
        command::{Command, EngineEvent, Returned},
        visualizer::ScopeTap,
    },
    sequencing::{Note, StepSequencer, TrackId, TriggerFault, TriggerSink},
    synth::VoicePool,
    transport::{StepTick, TransportClock, TransportState},
    MAX_BLOCK_SIZE,
};

/*
Block Rendering
===============

The Renderer is everything that runs on the audio timeline. The device
callback hands it an interleaved buffer; it renders in chunks of at most
MAX_BLOCK_SIZE frames:

  1. drain pending commands (pattern edits, tempo, params, swaps)
  2. advance the clock over the chunk, resolving each tick on the
     sequencer replica into pool triggers with exact frames
  3. render the pool (split at trigger frames)
  4. run the effects chain, when one is installed
  5. zero non-finite samples, feed the scope tap, copy mono to all channels

Commands are drained at the start of every chunk, so an edit reaches the
replica before the next tick that falls after it.

Nothing here allocates or logs. Objects that must be freed go back to the
control thread through the return ring.
*/

/// Everything the audio side owns, assembled on the control thread.
pub struct RendererParts {
    pub clock: TransportClock,
    pub sequencer: Box<StepSequencer>,
    pub pool: Box<VoicePool>,
    pub chain: Option<Box<EffectsChain>>,
    pub tap: ScopeTap,
    pub master_gain: f32,
}

/// Control-side ends of the renderer's rings.
pub struct RendererHandle {
    pub commands: Producer<Command>,
    pub events: Consumer<EngineEvent>,
    pub returns: Consumer<Returned>,
}

pub struct Renderer {
    clock: TransportClock,
    sequencer: Box<StepSequencer>,
    pool: Box<VoicePool>,
    chain: Option<Box<EffectsChain>>,
    tap: ScopeTap,
    master_gain: f32,
    commands: Consumer<Command>,
    events: Producer<EngineEvent>,
    returns: Producer<Returned>,
    block: Vec<f32>,
    dropped_events: u64,
}

/// Forwards triggers to the pool and reports the ones it refuses.
struct ReportingSink<'a> {
    pool: &'a mut VoicePool,
    events: &'a mut Producer<EngineEvent>,
    dropped_events: &'a mut u64,
}

impl TriggerSink for ReportingSink<'_> {
    fn trigger_voice(
        &mut self,
        track: TrackId,
        velocity: f32,
        note: Option<Note>,
        scheduled_frame: u64,
    ) -> Result<(), TriggerFault> {
        let result = self.pool.trigger_voice(track, velocity, note, scheduled_frame);
        if result.is_err() {
            let event = EngineEvent::TriggerSkipped {
                track,
                frame: scheduled_frame,
            };
            emit(self.events, self.dropped_events, event);
        }
        result
    }
}

fn emit(events: &mut Producer<EngineEvent>, dropped: &mut u64, event: EngineEvent) {
    if events.push(event).is_err() {
        *dropped += 1;
    }
}

impl Renderer {
    pub fn new(parts: RendererParts, config: &EngineConfig) -> (Self, RendererHandle) {
        let (command_tx, command_rx) = RingBuffer::new(config.command_capacity);
        let (event_tx, event_rx) = RingBuffer::new(config.event_capacity);
        let return_capacity = config.return_capacity.max(parts.pool.len() + 2);
        let (return_tx, return_rx) = RingBuffer::new(return_capacity);

        let renderer = Self {
            clock: parts.clock,
            sequencer: parts.sequencer,
            pool: parts.pool,
            chain: parts.chain,
            tap: parts.tap,
            master_gain: parts.master_gain,
            commands: command_rx,
            events: event_tx,
            returns: return_tx,
            block: vec![0.0; MAX_BLOCK_SIZE],
            dropped_events: 0,
        };
        let handle = RendererHandle {
            commands: command_tx,
            events: event_rx,
            returns: return_rx,
        };
        (renderer, handle)
    }

    pub fn sample_rate(&self) -> f32 {
        self.clock.sample_rate()
    }

    pub fn transport_state(&self) -> TransportState {
        self.clock.transport_state()
    }

    /// Frames rendered since construction.
    pub fn position(&self) -> u64 {
        self.clock.position()
    }

    pub fn trigger_count(&self, track: TrackId) -> u64 {
        self.pool.trigger_count(track)
    }

    pub fn has_chain(&self) -> bool {
        self.chain.is_some()
    }

    /// Events that could not be delivered because the event ring was full.
    pub fn dropped_events(&self) -> u64 {
        self.dropped_events
    }

    /// Render mono into `out`.
    pub fn render_mono(&mut self, out: &mut [f32]) {
        self.render_interleaved(out, 1);
    }

    /// Render into an interleaved buffer, copying the mono mix to every channel.
    pub fn render_interleaved(&mut self, out: &mut [f32], channels: usize) {
        let channels = channels.max(1);
        let total_frames = out.len() / channels;
        let mut frames_written = 0;

        while frames_written < total_frames {
            let frames_to_render = (total_frames - frames_written).min(MAX_BLOCK_SIZE);
            self.drain_commands();
            self.render_block(frames_to_render);

            let out_off = frames_written * channels;
            for (i, &s) in self.block[..frames_to_render].iter().enumerate() {
                for ch in 0..channels {
                    out[out_off + i * channels + ch] = s;
                }
            }
            frames_written += frames_to_render;
        }

        out[total_frames * channels..].fill(0.0);
    }

    /// Called by the device after a panic escaped `render_interleaved`.
    pub fn report_fault(&mut self) {
        if let Some(chain) = self.chain.as_mut() {
            chain.reset();
        }
        let frame = self.clock.position();
        emit(&mut self.events, &mut self.dropped_events, EngineEvent::AudioFault { frame });
    }

    fn drain_commands(&mut self) {
        while let Ok(command) = self.commands.pop() {
            self.apply(command);
        }
    }

    fn apply(&mut self, command: Command) {
        match command {
            Command::SetStep { track, step, value } => {
                // addresses were checked on the control side
                let _ = self.sequencer.set_step(track, step, value);
            }
            Command::SetBpm(bpm) => {
                self.clock.set_bpm(bpm);
            }
            Command::SetEffectParam { param, value } => {
                if let Some(chain) = self.chain.as_mut() {
                    chain.set_parameter(param, value);
                }
            }
            Command::Start => self.clock.start(),
            Command::Stop => {
                self.clock.stop();
                self.pool.release_all();
            }
            Command::SwapVoice { track, voice } => {
                let returned = match self.pool.swap_melodic_voice(track, voice) {
                    Ok(old) => {
                        if let Some(voice) = self.pool.voice_ref(track) {
                            self.emit(EngineEvent::InstrumentSwapped { voice });
                        }
                        old
                    }
                    Err(rejected) => rejected,
                };
                self.give_back(Returned::Voice(returned));
            }
            Command::RetireChain => {
                if let Some(chain) = self.chain.take() {
                    self.give_back(Returned::Chain(chain));
                }
            }
            Command::InstallChain(chain) => {
                if let Some(old) = self.chain.replace(chain) {
                    self.give_back(Returned::Chain(old));
                }
            }
            Command::ReplaceSession { sequencer, pool } => {
                let sequencer = std::mem::replace(&mut self.sequencer, sequencer);
                let pool = pool.map(|mut pool| {
                    pool.align_to(self.clock.position());
                    std::mem::replace(&mut self.pool, pool)
                });
                self.give_back(Returned::Session { sequencer, pool });
            }
        }
    }

    fn emit(&mut self, event: EngineEvent) {
        emit(&mut self.events, &mut self.dropped_events, event);
    }

    fn give_back(&mut self, item: Returned) {
        if let Err(PushError::Full(item)) = self.returns.push(item) {
            // The control side sizes this ring for one swap in flight. If it
            // is full anyway the object is freed here.
            self.emit(EngineEvent::ReturnRingFull);
            drop(item);
        }
    }

    fn render_block(&mut self, frames: usize) {
        let Self {
            clock,
            sequencer,
            pool,
            events,
            dropped_events,
            ..
        } = self;

        pool.set_gate_frames(clock.samples_per_step().round() as u64);
        clock.advance(frames, &mut |tick: StepTick| {
            let mut sink = ReportingSink {
                pool: &mut **pool,
                events: &mut *events,
                dropped_events: &mut *dropped_events,
            };
            let summary = sequencer.resolve_tick(&tick, &mut sink);
            let event = EngineEvent::StepFired {
                step_index: tick.step_index,
                frame: tick.frame,
                time_secs: tick.time_secs,
                triggered: summary.fired,
            };
            emit(events, dropped_events, event);
        });

        let block = &mut self.block[..frames];
        self.pool.render(block);
        if let Some(chain) = self.chain.as_mut() {
            chain.process(block);
        }

        let mut fault = false;
        for sample in block.iter_mut() {
            *sample *= self.master_gain;
            if !sample.is_finite() {
                *sample = 0.0;
                fault = true;
            }
        }
        self.tap.write(block);

        if fault {
            if let Some(chain) = self.chain.as_mut() {
                chain.reset();
            }
            let frame = self.clock.position() - frames as u64;
            emit(&mut self.events, &mut self.dropped_events, EngineEvent::AudioFault { frame });
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        effects::{DefaultStageFactory, EffectParams},
        engine::visualizer::scope_channel,
        sequencing::SessionLayout,
        synth::{VoiceId, VoiceRef},
        voices::VoiceSpec,
    };

    const SR: f32 = 48_000.0;
    const KICK: TrackId = TrackId(0);

    fn renderer(with_chain: bool) -> (Renderer, RendererHandle) {
        let config = EngineConfig::default();
        let layout = SessionLayout::default();
        let pool = VoicePool::new(&layout, &VoiceSpec::default(), SR, &config).expect("pool");
        let chain = with_chain.then(|| {
            let voice = VoiceRef {
                track: TrackId(4),
                id: VoiceId(0),
            };
            Box::new(
                EffectsChain::build(voice, EffectParams::default(), SR, &DefaultStageFactory)
                    .expect("chain"),
            )
        });
        let (tap, _vis) = scope_channel(256, SR, 8);
        let parts = RendererParts {
            clock: TransportClock::new(SR),
            sequencer: Box::new(StepSequencer::new(&layout)),
            pool: Box::new(pool),
            chain,
            tap,
            master_gain: 1.0,
        };
        Renderer::new(parts, &config)
    }

    fn drain(handle: &mut RendererHandle) -> Vec<EngineEvent> {
        let mut events = Vec::new();
        while let Ok(event) = handle.events.pop() {
            events.push(event);
        }
        events
    }

    fn set_kick(handle: &mut RendererHandle, step: usize, velocity: f32) {
        let value = crate::sequencing::Step {
            active: true,
            velocity,
            note: None,
        };
        let command = Command::SetStep {
            track: KICK,
            step,
            value,
        };
        assert!(handle.commands.push(command).is_ok());
    }

    #[test]
    fn stopped_transport_renders_silence() {
        let (mut renderer, mut handle) = renderer(true);
        set_kick(&mut handle, 0, 1.0);

        let mut out = vec![1.0f32; 4096];
        renderer.render_mono(&mut out);
        assert!(out.iter().all(|s| *s == 0.0));
        assert!(drain(&mut handle).is_empty());
    }

    #[test]
    fn step_events_and_triggers_follow_pattern() {
        let (mut renderer, mut handle) = renderer(false);
        set_kick(&mut handle, 0, 0.8);
        set_kick(&mut handle, 4, 0.8);
        assert!(handle.commands.push(Command::Start).is_ok());

        // 8 steps at 120 bpm
        let mut out = vec![0.0f32; 6000 * 8];
        renderer.render_mono(&mut out);

        let fired: Vec<(usize, usize)> = drain(&mut handle)
            .into_iter()
            .filter_map(|e| match e {
                EngineEvent::StepFired {
                    step_index,
                    triggered,
                    ..
                } => Some((step_index, triggered)),
                _ => None,
            })
            .collect();

        assert_eq!(fired.len(), 8);
        assert_eq!(fired[0], (0, 1));
        assert_eq!(fired[4], (4, 1));
        assert_eq!(fired[1], (1, 0));
        assert_eq!(renderer.trigger_count(KICK), 2);
        assert!(out[..6000].iter().any(|s| s.abs() > 0.01));
    }

    #[test]
    fn interleaved_output_copies_mono_to_every_channel() {
        let (mut renderer, mut handle) = renderer(true);
        set_kick(&mut handle, 0, 1.0);
        assert!(handle.commands.push(Command::Start).is_ok());

        let mut out = vec![0.0f32; 512 * 2];
        renderer.render_interleaved(&mut out, 2);
        assert!(out.chunks(2).all(|frame| frame[0] == frame[1]));
        assert!(out.iter().any(|s| s.abs() > 0.0));
    }

    #[test]
    fn retired_chain_comes_back_and_audio_passes_dry() {
        let (mut renderer, mut handle) = renderer(true);
        assert!(handle.commands.push(Command::RetireChain).is_ok());

        let mut out = vec![0.0f32; 256];
        renderer.render_mono(&mut out);
        assert!(!renderer.has_chain());
        assert!(matches!(handle.returns.pop(), Ok(Returned::Chain(_))));
    }

    #[test]
    fn fault_report_reaches_control_side() {
        let (mut renderer, mut handle) = renderer(true);
        renderer.report_fault();
        assert_eq!(drain(&mut handle), vec![EngineEvent::AudioFault { frame: 0 }]);
    }
}
