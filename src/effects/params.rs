use std::{fmt, ops::RangeInclusive, str::FromStr};

use log::debug;
use serde::{Deserialize, Serialize};

use crate::effects::StageKind;

/// Values for every effect parameter, stored clamped.
///
/// Fields are only reachable through `get` and `set`, and deserialized values
/// are clamped on the way in. Field names match the saved project format
/// (`filterFreq`, `delayTime`, ...).
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", from = "StoredParams")]
pub struct EffectParams {
    /// Lowpass cutoff in Hz.
    filter_freq: f32,
    /// Filter Q.
    filter_res: f32,
    /// Seconds.
    delay_time: f32,
    delay_feedback: f32,
    reverb_mix: f32,
    /// 0..=100, applied as a fraction.
    distortion: f32,
    /// Sweep rate in Hz.
    phaser_freq: f32,
    flanger_depth: f32,
}

/// Wire form of `EffectParams`, before clamping. Missing fields take defaults.
#[derive(Deserialize)]
#[serde(default, rename_all = "camelCase")]
struct StoredParams {
    filter_freq: f32,
    filter_res: f32,
    delay_time: f32,
    delay_feedback: f32,
    reverb_mix: f32,
    distortion: f32,
    phaser_freq: f32,
    flanger_depth: f32,
}

impl Default for StoredParams {
    fn default() -> Self {
        let d = EffectParams::default();
        Self {
            filter_freq: d.filter_freq,
            filter_res: d.filter_res,
            delay_time: d.delay_time,
            delay_feedback: d.delay_feedback,
            reverb_mix: d.reverb_mix,
            distortion: d.distortion,
            phaser_freq: d.phaser_freq,
            flanger_depth: d.flanger_depth,
        }
    }
}

impl From<StoredParams> for EffectParams {
    fn from(stored: StoredParams) -> Self {
        EffectParams {
            filter_freq: stored.filter_freq,
            filter_res: stored.filter_res,
            delay_time: stored.delay_time,
            delay_feedback: stored.delay_feedback,
            reverb_mix: stored.reverb_mix,
            distortion: stored.distortion,
            phaser_freq: stored.phaser_freq,
            flanger_depth: stored.flanger_depth,
        }
        .clamped()
    }
}

impl Default for EffectParams {
    /// Open filter, short slap delay, a little room, everything else neutral.
    fn default() -> Self {
        Self {
            filter_freq: 20_000.0,
            filter_res: 1.0,
            delay_time: 0.25,
            delay_feedback: 0.3,
            reverb_mix: 0.2,
            distortion: 0.0,
            phaser_freq: 0.5,
            flanger_depth: 0.0,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EffectParam {
    FilterFreq,
    FilterRes,
    DelayTime,
    DelayFeedback,
    ReverbMix,
    Distortion,
    PhaserFreq,
    FlangerDepth,
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown effect parameter {0:?}")]
pub struct ParseParamError(pub String);

impl EffectParam {
    pub const ALL: [EffectParam; 8] = [
        EffectParam::FilterFreq,
        EffectParam::FilterRes,
        EffectParam::DelayTime,
        EffectParam::DelayFeedback,
        EffectParam::ReverbMix,
        EffectParam::Distortion,
        EffectParam::PhaserFreq,
        EffectParam::FlangerDepth,
    ];

    /// Declared range. Every setter clamps into it.
    pub fn range(self) -> RangeInclusive<f32> {
        match self {
            EffectParam::FilterFreq => 20.0..=20_000.0,
            EffectParam::FilterRes => 0.0..=20.0,
            EffectParam::DelayTime => 0.0..=2.0,
            EffectParam::DelayFeedback => 0.0..=0.95,
            EffectParam::ReverbMix => 0.0..=1.0,
            EffectParam::Distortion => 0.0..=100.0,
            EffectParam::PhaserFreq => 0.1..=10.0,
            EffectParam::FlangerDepth => 0.0..=1.0,
        }
    }

    /// The stage that owns this parameter.
    pub fn stage(self) -> StageKind {
        match self {
            EffectParam::FilterFreq | EffectParam::FilterRes => StageKind::Filter,
            EffectParam::DelayTime | EffectParam::DelayFeedback => StageKind::Delay,
            EffectParam::ReverbMix => StageKind::Reverb,
            EffectParam::Distortion => StageKind::Distortion,
            EffectParam::PhaserFreq => StageKind::Phaser,
            EffectParam::FlangerDepth => StageKind::Flanger,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            EffectParam::FilterFreq => "filterFreq",
            EffectParam::FilterRes => "filterRes",
            EffectParam::DelayTime => "delayTime",
            EffectParam::DelayFeedback => "delayFeedback",
            EffectParam::ReverbMix => "reverbMix",
            EffectParam::Distortion => "distortion",
            EffectParam::PhaserFreq => "phaserFreq",
            EffectParam::FlangerDepth => "flangerDepth",
        }
    }

    /// Clamp into the declared range. NaN maps to the range minimum.
    pub fn clamp(self, value: f32) -> f32 {
        let range = self.range();
        if value.is_nan() {
            return *range.start();
        }
        value.clamp(*range.start(), *range.end())
    }
}

impl fmt::Display for EffectParam {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for EffectParam {
    type Err = ParseParamError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        EffectParam::ALL
            .into_iter()
            .find(|param| param.name() == s)
            .ok_or_else(|| ParseParamError(s.to_string()))
    }
}

impl EffectParams {
    pub fn get(&self, param: EffectParam) -> f32 {
        match param {
            EffectParam::FilterFreq => self.filter_freq,
            EffectParam::FilterRes => self.filter_res,
            EffectParam::DelayTime => self.delay_time,
            EffectParam::DelayFeedback => self.delay_feedback,
            EffectParam::ReverbMix => self.reverb_mix,
            EffectParam::Distortion => self.distortion,
            EffectParam::PhaserFreq => self.phaser_freq,
            EffectParam::FlangerDepth => self.flanger_depth,
        }
    }

    fn slot(&mut self, param: EffectParam) -> &mut f32 {
        match param {
            EffectParam::FilterFreq => &mut self.filter_freq,
            EffectParam::FilterRes => &mut self.filter_res,
            EffectParam::DelayTime => &mut self.delay_time,
            EffectParam::DelayFeedback => &mut self.delay_feedback,
            EffectParam::ReverbMix => &mut self.reverb_mix,
            EffectParam::Distortion => &mut self.distortion,
            EffectParam::PhaserFreq => &mut self.phaser_freq,
            EffectParam::FlangerDepth => &mut self.flanger_depth,
        }
    }

    /// Store `value` clamped into the parameter's range. Returns the stored value.
    pub fn set(&mut self, param: EffectParam, value: f32) -> f32 {
        let clamped = param.clamp(value);
        if clamped != value {
            debug!("{param} {value} clamped to {clamped}");
        }
        *self.slot(param) = clamped;
        clamped
    }

    /// Builder form of `set`.
    pub fn with(mut self, param: EffectParam, value: f32) -> Self {
        self.set(param, value);
        self
    }

    /// Copy with every field clamped.
    pub fn clamped(mut self) -> Self {
        for param in EffectParam::ALL {
            let value = self.get(param);
            self.set(param, value);
        }
        self
    }

    pub fn iter(&self) -> impl Iterator<Item = (EffectParam, f32)> + '_ {
        EffectParam::ALL.into_iter().map(|param| (param, self.get(param)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn setters_clamp_to_declared_ranges() {
        let mut params = EffectParams::default();
        assert_eq!(params.set(EffectParam::FilterFreq, 5.0), 20.0);
        assert_eq!(params.set(EffectParam::FilterFreq, 96_000.0), 20_000.0);
        assert_eq!(params.set(EffectParam::DelayFeedback, 1.5), 0.95);
        assert_eq!(params.set(EffectParam::Distortion, 250.0), 100.0);
        assert_eq!(params.set(EffectParam::PhaserFreq, 0.0), 0.1);
        assert_eq!(params.set(EffectParam::ReverbMix, f32::NAN), 0.0);
        assert_eq!(params.get(EffectParam::DelayFeedback), 0.95);
    }

    #[test]
    fn names_round_trip() {
        for param in EffectParam::ALL {
            assert_eq!(param.name().parse::<EffectParam>(), Ok(param));
        }
        assert_eq!(
            "wahWah".parse::<EffectParam>(),
            Err(ParseParamError("wahWah".into()))
        );
    }

    #[test]
    fn defaults_are_inside_their_ranges() {
        let params = EffectParams::default();
        for (param, value) in params.iter() {
            assert!(param.range().contains(&value), "{param} = {value}");
        }
        assert_eq!(params.clamped(), params);
    }

    #[test]
    fn serializes_with_wire_names() {
        let json = serde_json::to_value(EffectParams::default()).expect("serialize");
        for param in EffectParam::ALL {
            assert!(json.get(param.name()).is_some(), "missing {param}");
        }
    }

    #[test]
    fn deserialized_values_are_clamped() {
        let params: EffectParams =
            serde_json::from_str(r#"{ "delayFeedback": 4.0, "filterFreq": 1.0 }"#)
                .expect("deserialize");
        assert_eq!(params.get(EffectParam::DelayFeedback), 0.95);
        assert_eq!(params.get(EffectParam::FilterFreq), 20.0);
        assert_eq!(params.get(EffectParam::ReverbMix), 0.2);
    }

    #[test]
    fn builder_clamps_like_set() {
        let params = EffectParams::default().with(EffectParam::Distortion, 300.0);
        assert_eq!(params.get(EffectParam::Distortion), 100.0);
    }
}
