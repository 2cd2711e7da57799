//! Parameter Store
//!
//! Lock-free store for the eleven host-automatable parameters, plus the
//! snapshot builder that turns the current values into [`ChainSettings`].
//!
//! Values live in `AtomicU32`s as f32 bits so the host, the control thread,
//! the editor and the audio thread can all read them without locks.
//! Every write bumps a generation counter; readers compare generations to
//! find out whether anything changed since their last snapshot.

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicU32, AtomicU64, Ordering};

use serde::{Deserialize, Serialize};
use tracing::debug;
use trieq_dsp::{
    ChainSettings, Slope, MAX_FREQUENCY, MAX_GAIN_DB, MAX_Q, MIN_FREQUENCY, MIN_GAIN_DB, MIN_Q,
};

use crate::error::{PluginError, PluginResult};

/// Number of parameters exposed to the host
pub const PARAM_COUNT: usize = 11;

/// Labels of the two slope choice parameters
pub const SLOPE_CHOICES: [&str; 4] = ["12 db/Oct", "24 db/Oct", "36 db/Oct", "48 db/Oct"];

/// Version tag written into saved plugin state
const STATE_VERSION: u32 = 1;

/// Host-visible parameter identifiers
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ParamId {
    LowCutFreq,
    HighCutFreq,
    PeakFreq,
    PeakGain,
    PeakQuality,
    LowCutSlope,
    HighCutSlope,
    LowCutBypassed,
    PeakBypassed,
    HighCutBypassed,
    AnalyzerEnabled,
}

impl ParamId {
    pub const ALL: [ParamId; PARAM_COUNT] = [
        ParamId::LowCutFreq,
        ParamId::HighCutFreq,
        ParamId::PeakFreq,
        ParamId::PeakGain,
        ParamId::PeakQuality,
        ParamId::LowCutSlope,
        ParamId::HighCutSlope,
        ParamId::LowCutBypassed,
        ParamId::PeakBypassed,
        ParamId::HighCutBypassed,
        ParamId::AnalyzerEnabled,
    ];

    fn index(self) -> usize {
        self as usize
    }

    /// Name the host and saved state use for this parameter
    pub fn name(self) -> &'static str {
        match self {
            ParamId::LowCutFreq => "LowCut Freq",
            ParamId::HighCutFreq => "HighCut Freq",
            ParamId::PeakFreq => "Peak Freq",
            ParamId::PeakGain => "Peak Gain",
            ParamId::PeakQuality => "Peak Quality",
            ParamId::LowCutSlope => "LowCut Slope",
            ParamId::HighCutSlope => "HighCut Slope",
            ParamId::LowCutBypassed => "LowCut Bypassed",
            ParamId::PeakBypassed => "Peak Bypassed",
            ParamId::HighCutBypassed => "HighCut Bypassed",
            ParamId::AnalyzerEnabled => "Analyzer Enabled",
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.iter().copied().find(|id| id.name() == name)
    }

    /// Range and default value
    pub fn info(self) -> ParamInfo {
        let frequency = |default| ParamInfo {
            range: ParamRange::Float {
                min: MIN_FREQUENCY,
                max: MAX_FREQUENCY,
                step: 1.0,
                skew: 0.25,
            },
            default,
        };
        let toggle = |default: bool| ParamInfo {
            range: ParamRange::Bool,
            default: if default { 1.0 } else { 0.0 },
        };
        let slope = ParamInfo {
            range: ParamRange::Choice {
                labels: &SLOPE_CHOICES,
            },
            default: 0.0,
        };

        match self {
            ParamId::LowCutFreq => frequency(MIN_FREQUENCY),
            ParamId::HighCutFreq => frequency(MAX_FREQUENCY),
            ParamId::PeakFreq => frequency(750.0),
            ParamId::PeakGain => ParamInfo {
                range: ParamRange::Float {
                    min: MIN_GAIN_DB,
                    max: MAX_GAIN_DB,
                    step: 0.5,
                    skew: 1.0,
                },
                default: 0.0,
            },
            ParamId::PeakQuality => ParamInfo {
                range: ParamRange::Float {
                    min: MIN_Q,
                    max: MAX_Q,
                    step: 0.05,
                    skew: 1.0,
                },
                default: 1.0,
            },
            ParamId::LowCutSlope | ParamId::HighCutSlope => slope,
            ParamId::LowCutBypassed | ParamId::PeakBypassed | ParamId::HighCutBypassed => {
                toggle(false)
            }
            ParamId::AnalyzerEnabled => toggle(true),
        }
    }
}

/// Value domain of a parameter
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ParamRange {
    /// Continuous range; `skew` < 1 gives more resolution at the low end
    Float { min: f32, max: f32, step: f32, skew: f32 },
    /// Index into a list of labels
    Choice { labels: &'static [&'static str] },
    /// Off (0.0) / on (1.0)
    Bool,
}

impl ParamRange {
    /// Clamp and snap a plain value onto the range
    pub fn constrain(&self, value: f32) -> f32 {
        match *self {
            ParamRange::Float { min, max, step, .. } => {
                if !value.is_finite() {
                    return min;
                }
                let clamped = value.clamp(min, max);
                if step > 0.0 {
                    (min + ((clamped - min) / step).round() * step).clamp(min, max)
                } else {
                    clamped
                }
            }
            ParamRange::Choice { labels } => {
                if !value.is_finite() || value <= 0.0 {
                    return 0.0;
                }
                value.round().min((labels.len() - 1) as f32)
            }
            ParamRange::Bool => {
                if value >= 0.5 {
                    1.0
                } else {
                    0.0
                }
            }
        }
    }

    /// Host-normalised 0..1 value to plain value
    pub fn from_normalized(&self, normalized: f32) -> f32 {
        let p = if normalized.is_finite() {
            normalized.clamp(0.0, 1.0)
        } else {
            0.0
        };
        match *self {
            ParamRange::Float { min, max, skew, .. } => {
                let shaped = if skew != 1.0 && p > 0.0 {
                    (p.ln() / skew).exp()
                } else {
                    p
                };
                self.constrain(min + (max - min) * shaped)
            }
            ParamRange::Choice { labels } => (p * (labels.len() - 1) as f32).round(),
            ParamRange::Bool => self.constrain(p),
        }
    }

    /// Plain value to host-normalised 0..1
    pub fn to_normalized(&self, value: f32) -> f32 {
        let value = self.constrain(value);
        match *self {
            ParamRange::Float { min, max, skew, .. } => {
                let proportion = (value - min) / (max - min);
                if skew != 1.0 {
                    proportion.powf(skew)
                } else {
                    proportion
                }
            }
            ParamRange::Choice { labels } => value / (labels.len() - 1) as f32,
            ParamRange::Bool => value,
        }
    }
}

/// Range plus default of one parameter
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ParamInfo {
    pub range: ParamRange,
    pub default: f32,
}

/// Saved plugin state: plain values keyed by parameter name
#[derive(Debug, Clone, Serialize, Deserialize)]
struct PluginState {
    version: u32,
    params: BTreeMap<String, f32>,
}

/// Lock-free parameter values shared by every thread
pub struct ParameterStore {
    values: [AtomicU32; PARAM_COUNT],
    generation: AtomicU64,
}

impl ParameterStore {
    /// Create a store holding every parameter's default
    pub fn new() -> Self {
        let values = core::array::from_fn(|i| AtomicU32::new(ParamId::ALL[i].info().default.to_bits()));
        Self {
            values,
            generation: AtomicU64::new(0),
        }
    }

    /// Current plain value
    #[inline]
    pub fn get(&self, id: ParamId) -> f32 {
        f32::from_bits(self.values[id.index()].load(Ordering::Relaxed))
    }

    #[inline]
    pub fn get_bool(&self, id: ParamId) -> bool {
        self.get(id) >= 0.5
    }

    pub fn get_normalized(&self, id: ParamId) -> f32 {
        id.info().range.to_normalized(self.get(id))
    }

    /// Set a plain value; returns the value actually stored after clamping/snapping
    pub fn set(&self, id: ParamId, value: f32) -> f32 {
        let constrained = id.info().range.constrain(value);
        self.values[id.index()].store(constrained.to_bits(), Ordering::Relaxed);
        self.generation.fetch_add(1, Ordering::Release);
        constrained
    }

    /// Set from a host-normalised 0..1 value (automation)
    pub fn set_normalized(&self, id: ParamId, normalized: f32) -> f32 {
        self.set(id, id.info().range.from_normalized(normalized))
    }

    /// Look up a parameter by its host name and set it
    pub fn set_by_name(&self, name: &str, value: f32) -> PluginResult<f32> {
        let id = ParamId::from_name(name).ok_or_else(|| PluginError::UnknownParameter(name.to_string()))?;
        Ok(self.set(id, value))
    }

    /// Look up a parameter by its host name
    pub fn find(&self, name: &str) -> Option<(ParamId, f32)> {
        ParamId::from_name(name).map(|id| (id, self.get(id)))
    }

    /// Bumped on every write. Read it *before* taking a snapshot.
    #[inline]
    pub fn generation(&self) -> u64 {
        self.generation.load(Ordering::Acquire)
    }

    /// Restore every parameter to its default
    pub fn reset_to_defaults(&self) {
        for id in ParamId::ALL {
            self.set(id, id.info().default);
        }
    }

    /// Build a [`ChainSettings`] snapshot from the current values
    pub fn chain_settings(&self) -> ChainSettings {
        chain_settings(self)
    }

    /// Serialize all values for the host's session storage
    pub fn save_state(&self) -> PluginResult<Vec<u8>> {
        let params = ParamId::ALL
            .iter()
            .map(|id| (id.name().to_string(), self.get(*id)))
            .collect();
        let state = PluginState {
            version: STATE_VERSION,
            params,
        };
        Ok(serde_json::to_vec(&state)?)
    }

    /// Restore values saved by [`ParameterStore::save_state`]
    ///
    /// Unknown names are ignored; parameters missing from the state keep
    /// their current value.
    pub fn load_state(&self, data: &[u8]) -> PluginResult<()> {
        let state: PluginState = serde_json::from_slice(data)?;
        if state.version != STATE_VERSION {
            debug!("Loading plugin state version {} (current {})", state.version, STATE_VERSION);
        }

        for (name, value) in &state.params {
            match ParamId::from_name(name) {
                Some(id) => {
                    self.set(id, *value);
                }
                None => debug!("Ignoring unknown parameter '{}' in saved state", name),
            }
        }
        Ok(())
    }
}

impl Default for ParameterStore {
    fn default() -> Self {
        Self::new()
    }
}

/// Read the store into a [`ChainSettings`] snapshot
///
/// Read-only and uncached: always reflects the latest values.
pub fn chain_settings(store: &ParameterStore) -> ChainSettings {
    ChainSettings {
        peak_freq: store.get(ParamId::PeakFreq),
        peak_gain_db: store.get(ParamId::PeakGain),
        peak_quality: store.get(ParamId::PeakQuality),
        low_cut_freq: store.get(ParamId::LowCutFreq),
        high_cut_freq: store.get(ParamId::HighCutFreq),
        low_cut_slope: Slope::from_choice(store.get(ParamId::LowCutSlope)),
        high_cut_slope: Slope::from_choice(store.get(ParamId::HighCutSlope)),
        low_cut_bypassed: store.get_bool(ParamId::LowCutBypassed),
        peak_bypassed: store.get_bool(ParamId::PeakBypassed),
        high_cut_bypassed: store.get_bool(ParamId::HighCutBypassed),
    }
}
