use std::collections::VecDeque;

use log::{debug, error, info, warn};
use rtrb::{Consumer, Producer, PushError};

use crate::{
    config::EngineConfig,
    effects::{DefaultStageFactory, EffectParam, EffectParams, EffectsChain, RebuildOutcome, StageFactory},
    engine::{
        command::{Command, EngineEvent, Intent, Returned},
        device::{AudioDevice, DeviceInfo},
        renderer::{Renderer, RendererParts},
        visualizer::{scope_channel, Visualizer},
    },
    error::EngineError,
    sequencing::{Note, SessionLayout, StepSequencer, TrackId, TrackKind},
    snapshot::ProjectSnapshot,
    synth::{MelodicVoice, VoiceId, VoicePool, VoiceRef},
    transport::{clock::DEFAULT_BPM, TransportClock, TransportState, MAX_BPM, MIN_BPM},
    voices::VoiceSpec,
};

/*
Control Timeline
================

The manager holds the authoritative session: the grid, tempo, play state and
effect parameters. Every intent updates that state first and then sends a
Command to the renderer, which keeps its own replica.

  intent ──▶ manager state ──▶ command ring ──▶ renderer replica
                                                   │
  poll_events ◀── notices ◀── pump ◀── event ring ◀┤
                                 ◀── return ring ◀─┘

A full command ring never drops an edit: commands wait in a backlog and are
flushed on the next send or pump.

Instrument swaps are the only structural change. The new voice is built
here, the audio side trades it for the old one and hands back the effects
chain; pump() frees both, rebuilds the chain for the new voice and installs
it again. Audio passes dry while the chain is away.
*/

/// Everything that exists only while the audio output is running.
struct LiveGraph {
    commands: Producer<Command>,
    events: Consumer<EngineEvent>,
    returns: Consumer<Returned>,
    backlog: VecDeque<Command>,
    visualizer: Visualizer,
    sample_rate: f32,
    chain_in_flight: bool,
}

impl LiveGraph {
    fn flush_backlog(&mut self) {
        while let Some(command) = self.backlog.pop_front() {
            if let Err(PushError::Full(command)) = self.commands.push(command) {
                self.backlog.push_front(command);
                break;
            }
        }
    }

    fn send(&mut self, command: Command) {
        self.flush_backlog();
        if !self.backlog.is_empty() {
            self.backlog.push_back(command);
            return;
        }
        if let Err(PushError::Full(command)) = self.commands.push(command) {
            warn!("command ring full; backlogging");
            self.backlog.push_back(command);
        }
    }
}

/// Owns the audio output and the session, and turns intents into commands.
pub struct AudioGraphManager<D: AudioDevice> {
    device: D,
    config: EngineConfig,
    factory: Box<dyn StageFactory>,
    sequencer: StepSequencer,
    params: EffectParams,
    bpm: f32,
    playing: bool,
    current_step: usize,
    voice_spec: VoiceSpec,
    voice_id: VoiceId,
    live: Option<LiveGraph>,
    notices: VecDeque<EngineEvent>,
}

impl<D: AudioDevice> AudioGraphManager<D> {
    pub fn new(device: D, config: EngineConfig) -> Self {
        Self::with_layout(device, SessionLayout::default(), config)
    }

    pub fn with_layout(device: D, layout: SessionLayout, config: EngineConfig) -> Self {
        Self {
            device,
            config: config.validated(),
            factory: Box::new(DefaultStageFactory),
            sequencer: StepSequencer::new(&layout),
            params: EffectParams::default(),
            bpm: DEFAULT_BPM,
            playing: false,
            current_step: 0,
            voice_spec: VoiceSpec::default(),
            voice_id: VoiceId(0),
            live: None,
            notices: VecDeque::new(),
        }
    }

    /// Use a different builder for effect stages.
    pub fn with_stage_factory(mut self, factory: impl StageFactory + 'static) -> Self {
        self.factory = Box::new(factory);
        self
    }

    /// Acquire the output and build the graph.
    ///
    /// On failure everything acquired so far is released and the error is
    /// returned; call again to retry. A no-op while already running.
    pub fn initialize(&mut self) -> Result<(), EngineError> {
        if self.live.is_some() {
            debug!("initialize: already running");
            return Ok(());
        }
        info!("initializing audio graph");

        let info = self.device.open().map_err(|err| {
            error!("opening audio output failed: {err}");
            EngineError::from(err)
        })?;

        match self.build_graph(info) {
            Ok(live) => {
                self.live = Some(live);
                info!(
                    "audio graph running at {} Hz, {} tracks",
                    info.sample_rate,
                    self.sequencer.tracks().len()
                );
                Ok(())
            }
            Err(err) => {
                error!("initialize failed: {err}");
                if let Err(close_err) = self.device.close() {
                    warn!("{close_err}");
                }
                Err(err)
            }
        }
    }

    fn build_graph(&mut self, info: DeviceInfo) -> Result<LiveGraph, EngineError> {
        let sample_rate = info.sample_rate;
        let layout = self.sequencer.layout();

        let pool = VoicePool::with_voice_id(
            &layout,
            &self.voice_spec,
            self.voice_id,
            sample_rate,
            &self.config,
        )?;
        let chain = EffectsChain::build(
            self.chain_voice(),
            self.params,
            sample_rate,
            self.factory.as_ref(),
        )?;
        let (tap, visualizer) = scope_channel(
            self.config.scope_window,
            sample_rate,
            self.config.spectrum_bins,
        );

        let mut clock = TransportClock::new(sample_rate);
        clock.set_bpm(self.bpm);
        if self.playing {
            clock.start();
        }

        let parts = RendererParts {
            clock,
            sequencer: Box::new(self.sequencer.clone()),
            pool: Box::new(pool),
            chain: Some(Box::new(chain)),
            tap,
            master_gain: self.config.master_gain,
        };
        let (renderer, handle) = Renderer::new(parts, &self.config);
        self.device.start(renderer)?;

        Ok(LiveGraph {
            commands: handle.commands,
            events: handle.events,
            returns: handle.returns,
            backlog: VecDeque::new(),
            visualizer,
            sample_rate,
            chain_in_flight: false,
        })
    }

    /// Stop the stream, drop the renderer, close the device. Safe to repeat.
    pub fn dispose(&mut self) {
        let Some(mut live) = self.live.take() else {
            return;
        };
        info!("disposing audio graph");

        if let Err(err) = self.device.stop() {
            warn!("{err}");
        }
        while live.returns.pop().is_ok() {}
        drop(live);
        if let Err(err) = self.device.close() {
            warn!("{err}");
        }

        self.playing = false;
        self.current_step = 0;
    }

    pub fn is_initialized(&self) -> bool {
        self.live.is_some()
    }

    fn send(&mut self, command: Command) {
        if let Some(live) = self.live.as_mut() {
            live.send(command);
        }
    }

    /// The effects chain follows the first melodic track.
    fn chain_voice(&self) -> VoiceRef {
        let track = self
            .sequencer
            .layout()
            .find(TrackKind::Melodic)
            .unwrap_or(TrackId(0));
        VoiceRef {
            track,
            id: self.voice_id,
        }
    }

    fn sync_step(&mut self, track: TrackId, step: usize) -> Result<(), EngineError> {
        let value = *self.sequencer.step(track, step)?;
        self.send(Command::SetStep { track, step, value });
        Ok(())
    }

    pub fn toggle_step(&mut self, track: TrackId, step: usize) -> Result<bool, EngineError> {
        let active = self.sequencer.toggle_step(track, step)?;
        self.sync_step(track, step)?;
        Ok(active)
    }

    pub fn set_velocity(
        &mut self,
        track: TrackId,
        step: usize,
        velocity: f32,
    ) -> Result<f32, EngineError> {
        let stored = self.sequencer.set_velocity(track, step, velocity)?;
        self.sync_step(track, step)?;
        Ok(stored)
    }

    pub fn set_note(&mut self, track: TrackId, step: usize, note: Note) -> Result<(), EngineError> {
        self.sequencer.set_note(track, step, note)?;
        self.sync_step(track, step)
    }

    /// Returns the tempo actually set. A non-finite value is ignored.
    pub fn set_bpm(&mut self, bpm: f32) -> f32 {
        if !bpm.is_finite() {
            debug!("ignoring bpm {bpm}");
            return self.bpm;
        }
        let clamped = bpm.clamp(MIN_BPM, MAX_BPM);
        if clamped != bpm {
            debug!("bpm {bpm} clamped to {clamped}");
        }
        self.bpm = clamped;
        self.send(Command::SetBpm(clamped));
        clamped
    }

    pub fn set_effect_param(&mut self, param: EffectParam, value: f32) -> f32 {
        let stored = self.params.set(param, value);
        self.send(Command::SetEffectParam {
            param,
            value: stored,
        });
        stored
    }

    pub fn set_effect_param_by_name(&mut self, name: &str, value: f32) -> Result<f32, EngineError> {
        let param = name
            .parse::<EffectParam>()
            .map_err(|err| EngineError::UnknownParam(err.0))?;
        Ok(self.set_effect_param(param, value))
    }

    pub fn start(&mut self) {
        self.playing = true;
        self.send(Command::Start);
    }

    /// Halt scheduling. Sounding notes finish their release.
    pub fn stop(&mut self) {
        self.playing = false;
        self.current_step = 0;
        self.send(Command::Stop);
    }

    /// Replace the melodic instrument on every melodic track.
    ///
    /// The effects chain is rebuilt for the new voice on a later `pump`.
    pub fn swap_instrument(&mut self, spec: VoiceSpec) -> Result<VoiceId, EngineError> {
        spec.validate()?;
        self.pump();
        let id = self.voice_id.next();

        if let Some(live) = self.live.as_mut() {
            let voices = self
                .sequencer
                .tracks()
                .iter()
                .filter(|track| track.kind.is_melodic())
                .map(|track| {
                    MelodicVoice::build(id, spec, live.sample_rate, self.config.melodic_polyphony)
                        .map(|voice| (track.id, Box::new(voice)))
                })
                .collect::<Result<Vec<_>, _>>()?;

            for (track, voice) in voices {
                live.send(Command::SwapVoice { track, voice });
            }
        }

        self.voice_spec = spec;
        self.voice_id = id;
        self.retire_chain();
        info!("instrument swapped to {id:?}");
        Ok(id)
    }

    fn retire_chain(&mut self) {
        if let Some(live) = self.live.as_mut() {
            if !live.chain_in_flight {
                live.send(Command::RetireChain);
                live.chain_in_flight = true;
            }
        }
    }

    /// Free returned objects, reinstall the effects chain and collect events.
    pub fn pump(&mut self) {
        let Some(mut live) = self.live.take() else {
            return;
        };
        live.flush_backlog();

        while let Ok(returned) = live.returns.pop() {
            match returned {
                Returned::Voice(voice) => debug!("released voice {:?}", voice.id()),
                Returned::Session { .. } => debug!("released previous session"),
                Returned::Chain(chain) => self.reinstall_chain(&mut live, chain),
            }
        }

        while let Ok(event) = live.events.pop() {
            match event {
                EngineEvent::StepFired { step_index, .. } => self.current_step = step_index,
                EngineEvent::ReturnRingFull if live.chain_in_flight => {
                    warn!("return ring overflowed; building a fresh effects chain");
                    self.replace_lost_chain(&mut live);
                }
                _ => {}
            }
            self.notices.push_back(event);
        }

        self.live = Some(live);
    }

    fn reinstall_chain(&mut self, live: &mut LiveGraph, mut chain: Box<EffectsChain>) {
        if !live.chain_in_flight {
            debug!("dropping surplus effects chain");
            return;
        }

        let outcome = chain.rebuild(self.chain_voice(), self.factory.as_ref());
        // edits sent while the chain was away never reached it
        for (param, value) in self.params.iter() {
            chain.set_parameter(param, value);
        }

        match outcome {
            RebuildOutcome::Unchanged => {}
            RebuildOutcome::Rebuilt => self.notices.push_back(EngineEvent::ChainRebuilt {
                generation: chain.generation(),
            }),
            RebuildOutcome::RestoredPrevious(err) => {
                self.notices.push_back(EngineEvent::Error(err.to_string()));
                self.notices.push_back(EngineEvent::ChainRebuilt {
                    generation: chain.generation(),
                });
            }
            RebuildOutcome::TornDown(err) => {
                self.notices.push_back(EngineEvent::Error(err.to_string()));
            }
        }

        live.send(Command::InstallChain(chain));
        live.chain_in_flight = false;
    }

    fn replace_lost_chain(&mut self, live: &mut LiveGraph) {
        live.chain_in_flight = false;
        match EffectsChain::build(
            self.chain_voice(),
            self.params,
            live.sample_rate,
            self.factory.as_ref(),
        ) {
            Ok(chain) => {
                self.notices.push_back(EngineEvent::ChainRebuilt {
                    generation: chain.generation(),
                });
                live.send(Command::InstallChain(Box::new(chain)));
            }
            Err(err) => {
                error!("rebuilding lost effects chain failed: {err}");
                self.notices.push_back(EngineEvent::Error(err.to_string()));
            }
        }
    }

    /// Everything that happened since the last call, oldest first.
    pub fn poll_events(&mut self) -> Vec<EngineEvent> {
        self.pump();
        self.notices.drain(..).collect()
    }

    pub fn handle(&mut self, intent: Intent) -> Result<(), EngineError> {
        match intent {
            Intent::Initialize => self.initialize()?,
            Intent::Dispose => self.dispose(),
            Intent::ToggleStep { track, step } => {
                self.toggle_step(track, step)?;
            }
            Intent::SetVelocity {
                track,
                step,
                velocity,
            } => {
                self.set_velocity(track, step, velocity)?;
            }
            Intent::SetNote { track, step, note } => self.set_note(track, step, note)?,
            Intent::SetBpm(bpm) => {
                self.set_bpm(bpm);
            }
            Intent::SetEffectParam { name, value } => {
                self.set_effect_param_by_name(&name, value)?;
            }
            Intent::Start => self.start(),
            Intent::Stop => self.stop(),
            Intent::SwapInstrument(spec) => {
                self.swap_instrument(spec)?;
            }
        }
        Ok(())
    }

    pub fn save(&self) -> ProjectSnapshot {
        ProjectSnapshot::capture(&self.transport(), &self.sequencer, &self.params)
    }

    /// Replace the session with a saved project. Play state is kept.
    ///
    /// Nothing changes if the snapshot is invalid or the voices for a new
    /// track layout cannot be built.
    pub fn restore(&mut self, snapshot: &ProjectSnapshot) -> Result<(), EngineError> {
        let session = snapshot.restore()?;
        let layout = session.sequencer.layout();

        let pool = match self.live.as_ref() {
            Some(live) if layout != self.sequencer.layout() => {
                Some(Box::new(VoicePool::with_voice_id(
                    &layout,
                    &self.voice_spec,
                    self.voice_id,
                    live.sample_rate,
                    &self.config,
                )?))
            }
            _ => None,
        };

        let chain_voice = self.chain_voice();
        self.sequencer = session.sequencer;
        self.params = session.params;
        self.bpm = session.bpm;

        if let Some(live) = self.live.as_mut() {
            live.send(Command::ReplaceSession {
                sequencer: Box::new(self.sequencer.clone()),
                pool,
            });
            live.send(Command::SetBpm(self.bpm));
            for (param, value) in self.params.iter() {
                live.send(Command::SetEffectParam { param, value });
            }
        }
        if self.chain_voice() != chain_voice {
            self.retire_chain();
        }

        info!(
            "restored project: {} tracks at {} bpm",
            self.sequencer.tracks().len(),
            self.bpm
        );
        Ok(())
    }

    pub fn transport(&self) -> TransportState {
        TransportState {
            bpm: self.bpm,
            current_step_index: self.current_step,
            is_playing: self.playing,
        }
    }

    pub fn sequencer(&self) -> &StepSequencer {
        &self.sequencer
    }

    pub fn effect_params(&self) -> &EffectParams {
        &self.params
    }

    pub fn voice_spec(&self) -> &VoiceSpec {
        &self.voice_spec
    }

    pub fn voice_id(&self) -> VoiceId {
        self.voice_id
    }

    /// `None` until initialized.
    pub fn visualizer(&mut self) -> Option<&mut Visualizer> {
        self.live.as_mut().map(|live| &mut live.visualizer)
    }

    /// Commands waiting for room in the command ring.
    pub fn backlog_len(&self) -> usize {
        self.live.as_ref().map_or(0, |live| live.backlog.len())
    }

    pub fn device(&self) -> &D {
        &self.device
    }
}

impl<D: AudioDevice> Drop for AudioGraphManager<D> {
    fn drop(&mut self) {
        self.dispose();
    }
}
