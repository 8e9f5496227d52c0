use log::{debug, error, info, warn};

use crate::{
    effects::{
        stages::validate_sample_rate, EffectParam, EffectParams, EffectStage, StageFactory,
        StageKind,
    },
    error::GraphError,
    synth::VoiceRef,
};

/// What `rebuild` ended up doing.
#[derive(Debug, Clone, PartialEq)]
pub enum RebuildOutcome {
    /// Stages were rebuilt for the new voice.
    Rebuilt,
    /// The voice identity did not change; nothing was touched.
    Unchanged,
    /// The new voice failed; the last working voice was rebuilt instead.
    RestoredPrevious(GraphError),
    /// Nothing could be built. The chain passes audio through dry.
    TornDown(GraphError),
}

impl RebuildOutcome {
    pub fn error(&self) -> Option<&GraphError> {
        match self {
            RebuildOutcome::RestoredPrevious(err) | RebuildOutcome::TornDown(err) => Some(err),
            RebuildOutcome::Rebuilt | RebuildOutcome::Unchanged => None,
        }
    }
}

/// Master effects: a fixed list of stages in [`StageKind::ORDER`].
///
/// Two kinds of change reach the chain and they never mix:
///
/// - value edits (`set_parameter`) retune a live stage in place
/// - voice identity changes (`rebuild`) replace every stage
///
/// `rebuild` allocates and runs on the control thread only.
pub struct EffectsChain {
    stages: Vec<Box<dyn EffectStage>>,
    params: EffectParams,
    sample_rate: f32,
    voice: Option<VoiceRef>,
    last_good: Option<VoiceRef>,
    generation: u64,
}

impl EffectsChain {
    pub fn build(
        voice: VoiceRef,
        params: EffectParams,
        sample_rate: f32,
        factory: &dyn StageFactory,
    ) -> Result<Self, GraphError> {
        validate_sample_rate(sample_rate)?;

        let mut chain = Self {
            stages: Vec::with_capacity(StageKind::ORDER.len()),
            params: params.clamped(),
            sample_rate,
            voice: None,
            last_good: None,
            generation: 0,
        };
        chain.construct(voice, factory)?;
        info!("effects chain built for {voice:?} at {sample_rate} Hz");
        Ok(chain)
    }

    /// Build every stage for `voice`. All or nothing.
    fn construct(&mut self, voice: VoiceRef, factory: &dyn StageFactory) -> Result<(), GraphError> {
        let mut stages = Vec::with_capacity(StageKind::ORDER.len());
        for kind in StageKind::ORDER {
            let stage = factory.build_stage(kind, &self.params, self.sample_rate, voice)?;
            if stage.kind() != kind {
                return Err(GraphError::StageConstruction {
                    stage: kind,
                    reason: format!("factory returned a {:?} stage", stage.kind()),
                });
            }
            stages.push(stage);
        }

        self.stages = stages;
        self.voice = Some(voice);
        self.last_good = Some(voice);
        self.generation += 1;
        Ok(())
    }

    /// Replace every stage for a new voice identity.
    ///
    /// Current stages are disposed before construction starts. If the new
    /// voice cannot be built the last working voice is rebuilt; if that also
    /// fails the chain stays empty and passes audio through.
    pub fn rebuild(&mut self, voice: VoiceRef, factory: &dyn StageFactory) -> RebuildOutcome {
        if self.voice == Some(voice) {
            return RebuildOutcome::Unchanged;
        }

        let previous = self.last_good;
        self.dispose();

        let err = match self.construct(voice, factory) {
            Ok(()) => {
                debug!("effects chain rebuilt for {voice:?} (generation {})", self.generation);
                return RebuildOutcome::Rebuilt;
            }
            Err(err) => err,
        };
        error!("effects chain rebuild for {voice:?} failed: {err}");

        if let Some(previous) = previous.filter(|p| *p != voice) {
            match self.construct(previous, factory) {
                Ok(()) => {
                    warn!("effects chain restored for previous voice {previous:?}");
                    return RebuildOutcome::RestoredPrevious(err);
                }
                Err(restore_err) => {
                    error!("restoring effects chain for {previous:?} failed: {restore_err}");
                }
            }
        }

        self.dispose();
        warn!("effects chain torn down; audio passes through dry");
        RebuildOutcome::TornDown(err)
    }

    /// Store `value` clamped and retune the owning stage. Returns the stored value.
    pub fn set_parameter(&mut self, param: EffectParam, value: f32) -> f32 {
        let stored = self.params.set(param, value);
        let stage = param.stage();
        if let Some(target) = self.stages.iter_mut().find(|s| s.kind() == stage) {
            target.set_param(param, stored);
        }
        stored
    }

    /// Run every stage over `buffer`, in order.
    pub fn process(&mut self, buffer: &mut [f32]) {
        for stage in &mut self.stages {
            stage.process(buffer);
        }
    }

    /// Clear delay lines and filter memory without rebuilding.
    pub fn reset(&mut self) {
        for stage in &mut self.stages {
            stage.reset();
        }
    }

    /// Drop every stage. Safe to call repeatedly.
    pub fn dispose(&mut self) {
        if self.stages.is_empty() && self.voice.is_none() {
            return;
        }
        debug!("disposing {} effect stages", self.stages.len());
        self.stages.clear();
        self.voice = None;
    }

    pub fn is_torn_down(&self) -> bool {
        self.stages.is_empty()
    }

    pub fn stage_kinds(&self) -> Vec<StageKind> {
        self.stages.iter().map(|s| s.kind()).collect()
    }

    pub fn params(&self) -> &EffectParams {
        &self.params
    }

    pub fn voice(&self) -> Option<VoiceRef> {
        self.voice
    }

    pub fn sample_rate(&self) -> f32 {
        self.sample_rate
    }

    /// Successful structural builds so far.
    pub fn generation(&self) -> u64 {
        self.generation
    }
}

impl Drop for EffectsChain {
    fn drop(&mut self) {
        self.dispose();
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use std::cell::Cell;

    use super::*;
    use crate::{effects::DefaultStageFactory, sequencing::TrackId, synth::VoiceId};

    const SR: f32 = 48_000.0;

    pub(crate) fn voice(id: u64) -> VoiceRef {
        VoiceRef {
            track: TrackId(4),
            id: VoiceId(id),
        }
    }

    /// Fails every stage for the listed voice ids; counts construction calls.
    pub(crate) struct FailingFactory {
        pub failing: Vec<VoiceId>,
        pub calls: Cell<usize>,
    }

    impl FailingFactory {
        pub(crate) fn new(failing: Vec<VoiceId>) -> Self {
            Self {
                failing,
                calls: Cell::new(0),
            }
        }
    }

    impl StageFactory for FailingFactory {
        fn build_stage(
            &self,
            kind: StageKind,
            params: &EffectParams,
            sample_rate: f32,
            voice: VoiceRef,
        ) -> Result<Box<dyn EffectStage>, GraphError> {
            self.calls.set(self.calls.get() + 1);
            if self.failing.contains(&voice.id) {
                return Err(GraphError::StageConstruction {
                    stage: kind,
                    reason: format!("refusing {voice:?}"),
                });
            }
            DefaultStageFactory.build_stage(kind, params, sample_rate, voice)
        }
    }

    fn chain() -> EffectsChain {
        EffectsChain::build(voice(0), EffectParams::default(), SR, &DefaultStageFactory)
            .expect("chain builds")
    }

    #[test]
    fn stages_run_in_fixed_order() {
        let chain = chain();
        assert_eq!(chain.stage_kinds(), StageKind::ORDER.to_vec());
        assert_eq!(chain.generation(), 1);
    }

    #[test]
    fn build_rejects_bad_sample_rate() {
        for rate in [f32::NAN, 0.0, 1_000.0, 500_000.0] {
            let result =
                EffectsChain::build(voice(0), EffectParams::default(), rate, &DefaultStageFactory);
            assert!(matches!(result, Err(GraphError::InvalidSampleRate(_))), "{rate}");
        }
    }

    #[test]
    fn parameter_edits_keep_topology() {
        let mut chain = chain();
        let factory = FailingFactory::new(vec![]);

        for i in 0..100 {
            let value = i as f32 * 250.0;
            let stored = chain.set_parameter(EffectParam::FilterFreq, value);
            assert_eq!(stored, value.clamp(20.0, 20_000.0));
        }

        assert_eq!(chain.generation(), 1);
        assert_eq!(chain.stage_kinds(), StageKind::ORDER.to_vec());
        assert_eq!(factory.calls.get(), 0);
        assert_eq!(chain.params().get(EffectParam::FilterFreq), 20_000.0);
    }

    #[test]
    fn rebuild_only_on_identity_change() {
        let mut chain = chain();
        assert_eq!(chain.rebuild(voice(0), &DefaultStageFactory), RebuildOutcome::Unchanged);
        assert_eq!(chain.generation(), 1);

        assert_eq!(chain.rebuild(voice(1), &DefaultStageFactory), RebuildOutcome::Rebuilt);
        assert_eq!(chain.generation(), 2);
        assert_eq!(chain.voice(), Some(voice(1)));
    }

    #[test]
    fn failed_rebuild_restores_previous_voice() {
        let mut chain = chain();
        chain.set_parameter(EffectParam::DelayTime, 0.5);
        let factory = FailingFactory::new(vec![VoiceId(1)]);

        let outcome = chain.rebuild(voice(1), &factory);
        assert!(matches!(outcome, RebuildOutcome::RestoredPrevious(_)));
        assert_eq!(chain.voice(), Some(voice(0)));
        assert_eq!(chain.stage_kinds(), StageKind::ORDER.to_vec());
        assert_eq!(chain.params().get(EffectParam::DelayTime), 0.5);
    }

    #[test]
    fn double_failure_tears_down_to_dry() {
        let mut chain = chain();
        let factory = FailingFactory::new(vec![VoiceId(0), VoiceId(1)]);

        let outcome = chain.rebuild(voice(1), &factory);
        assert!(matches!(outcome, RebuildOutcome::TornDown(_)));
        assert!(chain.is_torn_down());
        assert!(chain.stage_kinds().is_empty());

        let mut buffer = vec![0.25f32; 64];
        chain.process(&mut buffer);
        assert!(buffer.iter().all(|s| *s == 0.25));

        // a later swap to a working voice recovers
        assert_eq!(chain.rebuild(voice(2), &factory), RebuildOutcome::Rebuilt);
        assert_eq!(chain.stage_kinds(), StageKind::ORDER.to_vec());
    }

    #[test]
    fn dispose_is_idempotent() {
        let mut chain = chain();
        chain.dispose();
        chain.dispose();
        assert!(chain.is_torn_down());
        assert_eq!(chain.voice(), None);
    }
}
