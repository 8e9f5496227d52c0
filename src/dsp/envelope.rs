use crate::{graph::node::RenderCtx, MIN_TIME};

/*
Linear ADSR
===========

  level
    1.0 ┐    ╱╲
        │   ╱  ╲________
    S   │  ╱            ╲
    0.0 └─╱──────────────╲──→ t
          A   D    S      R
        gate on       gate off

Every stage is a straight ramp. Per sample the level moves by

    attack   +1 / (attack · sr)
    decay    -(1 - S) / (decay · sr)
    release  -start / (release · sr)

Percussion recipes use S = 0, so a hit decays to silence on its own and the
gate-off only matters when a new hit arrives mid-decay. Melodic voices hold
S until the sequencer closes the gate one step later.

Release is computed from a snapshot taken at gate-off (start level and sample
count) so it always lands exactly on zero, no matter which stage the gate
closed in.
*/

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EnvelopeState {
    Idle,
    Attack,
    Decay,
    Sustain,
    Release,
}

pub struct Envelope {
    attack_time: f32,
    decay_time: f32,
    sustain_level: f32,
    release_time: f32,

    stage: EnvelopeState,
    level: f32,

    release_start_level: f32,
    release_total_samples: u32,
    release_elapsed_samples: u32,
}

impl Default for Envelope {
    fn default() -> Self {
        Self::adsr(0.01, 0.1, 0.7, 0.3)
    }
}

impl Envelope {
    pub fn adsr(attack: f32, decay: f32, sustain: f32, release: f32) -> Self {
        Self {
            attack_time: attack.max(MIN_TIME),
            decay_time: decay.max(MIN_TIME),
            sustain_level: sustain.clamp(0.0, 1.0),
            release_time: release.max(MIN_TIME),

            stage: EnvelopeState::Idle,
            level: 0.0,
            release_start_level: 0.0,
            release_total_samples: 1,
            release_elapsed_samples: 0,
        }
    }

    /// Gate on. Restarts the attack from zero so repeated hits stay distinct.
    pub fn note_on(&mut self, _ctx: &RenderCtx) {
        self.level = 0.0;
        self.stage = EnvelopeState::Attack;
        self.release_elapsed_samples = 0;
    }

    /// Gate off. Ramps from the current level to zero over the release time.
    pub fn note_off(&mut self, ctx: &RenderCtx) {
        if matches!(self.stage, EnvelopeState::Idle | EnvelopeState::Release) {
            return;
        }

        self.release_start_level = self.level;
        self.release_total_samples = (self.release_time * ctx.sample_rate).round().max(1.0) as u32;
        self.release_elapsed_samples = 0;
        self.stage = EnvelopeState::Release;
    }

    pub fn next_sample(&mut self, ctx: &RenderCtx) -> f32 {
        match self.stage {
            EnvelopeState::Idle => {
                self.level = 0.0;
            }
            EnvelopeState::Attack => {
                self.level += 1.0 / (self.attack_time * ctx.sample_rate);
                if self.level >= 1.0 {
                    self.level = 1.0;
                    self.stage = EnvelopeState::Decay;
                }
            }
            EnvelopeState::Decay => {
                let drop = (1.0 - self.sustain_level) / (self.decay_time * ctx.sample_rate);
                self.level -= drop;
                if self.level <= self.sustain_level {
                    self.level = self.sustain_level;
                    self.stage = if self.sustain_level > 0.0 {
                        EnvelopeState::Sustain
                    } else {
                        EnvelopeState::Idle
                    };
                }
            }
            EnvelopeState::Sustain => {
                self.level = self.sustain_level;
            }
            EnvelopeState::Release => {
                self.release_elapsed_samples += 1;
                if self.release_elapsed_samples >= self.release_total_samples {
                    self.level = 0.0;
                    self.stage = EnvelopeState::Idle;
                } else {
                    let remaining = 1.0
                        - self.release_elapsed_samples as f32 / self.release_total_samples as f32;
                    self.level = self.release_start_level * remaining;
                }
            }
        }

        self.level
    }

    pub fn render(&mut self, buffer: &mut [f32], ctx: &RenderCtx) {
        for sample in buffer.iter_mut() {
            *sample = self.next_sample(ctx);
        }
    }

    pub fn is_active(&self) -> bool {
        !matches!(self.stage, EnvelopeState::Idle)
    }

    pub fn reset(&mut self) {
        self.stage = EnvelopeState::Idle;
        self.level = 0.0;
        self.release_elapsed_samples = 0;
        self.release_start_level = 0.0;
    }

    pub fn level(&self) -> f32 {
        self.level
    }

    pub fn state(&self) -> EnvelopeState {
        self.stage
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE_RATE: f32 = 1_000.0;

    fn ctx() -> RenderCtx {
        RenderCtx::from_freq(SAMPLE_RATE, 440.0, 1.0)
    }

    fn run(env: &mut Envelope, samples: usize) {
        let ctx = ctx();
        for _ in 0..samples {
            env.next_sample(&ctx);
        }
    }

    #[test]
    fn attack_reaches_peak_then_decays() {
        let mut env = Envelope::adsr(0.01, 0.1, 0.7, 0.2);
        env.note_on(&ctx());
        run(&mut env, 11);

        assert!(env.level() > 0.99);
        assert_eq!(env.state(), EnvelopeState::Decay);
    }

    #[test]
    fn sustain_holds_while_gate_is_open() {
        let mut env = Envelope::adsr(0.01, 0.05, 0.6, 0.2);
        env.note_on(&ctx());
        run(&mut env, 100);

        assert_eq!(env.state(), EnvelopeState::Sustain);
        assert!((env.level() - 0.6).abs() < 1e-6);
    }

    #[test]
    fn zero_sustain_goes_idle_without_gate_off() {
        let mut env = Envelope::adsr(0.001, 0.05, 0.0, 0.05);
        env.note_on(&ctx());
        run(&mut env, 60);

        assert!(!env.is_active());
        assert_eq!(env.level(), 0.0);
    }

    #[test]
    fn release_from_attack_lands_on_zero() {
        let mut env = Envelope::adsr(0.1, 0.05, 0.5, 0.03);
        env.note_on(&ctx());
        run(&mut env, 20);
        let before = env.level();
        assert!(before > 0.0 && before < 1.0);

        env.note_off(&ctx());
        assert_eq!(env.state(), EnvelopeState::Release);
        run(&mut env, 30);

        assert_eq!(env.level(), 0.0);
        assert_eq!(env.state(), EnvelopeState::Idle);
    }

    #[test]
    fn gate_off_while_idle_is_ignored() {
        let mut env = Envelope::default();
        env.note_off(&ctx());
        assert_eq!(env.state(), EnvelopeState::Idle);
    }
}
