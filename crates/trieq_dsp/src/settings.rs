//! Chain Settings
//!
//! Immutable snapshot of every user-facing filter parameter. Rebuilt from the
//! host parameter store on each update cycle and handed to the designer.

use crate::error::DspError;

/// Lowest frequency any band can be tuned to (Hz)
pub const MIN_FREQUENCY: f32 = 20.0;
/// Highest frequency any band can be tuned to (Hz)
pub const MAX_FREQUENCY: f32 = 20000.0;
/// Peak band quality range
pub const MIN_Q: f32 = 0.1;
pub const MAX_Q: f32 = 10.0;
/// Peak band gain range (dB)
pub const MIN_GAIN_DB: f32 = -24.0;
pub const MAX_GAIN_DB: f32 = 24.0;

/// Maximum number of biquad sections in a cut filter (48 dB/oct)
pub const MAX_CUT_STAGES: usize = 4;

/// Cut filter steepness
///
/// Each step adds one second-order section, i.e. 12 dB/oct.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Slope {
    #[default]
    Slope12,
    Slope24,
    Slope36,
    Slope48,
}

impl Slope {
    pub const ALL: [Slope; 4] = [Slope::Slope12, Slope::Slope24, Slope::Slope36, Slope::Slope48];

    /// Choice index as exposed to the host (0-3)
    pub fn index(self) -> usize {
        match self {
            Slope::Slope12 => 0,
            Slope::Slope24 => 1,
            Slope::Slope36 => 2,
            Slope::Slope48 => 3,
        }
    }

    pub fn from_index(index: usize) -> Result<Self, DspError> {
        Self::ALL
            .get(index)
            .copied()
            .ok_or(DspError::InvalidSlope(index))
    }

    /// Convert a host choice value (stored as float) to a slope.
    /// Rounds to the nearest choice and saturates at both ends.
    pub fn from_choice(value: f32) -> Self {
        if !value.is_finite() || value <= 0.0 {
            return Slope::Slope12;
        }
        let index = (value.round() as usize).min(Self::ALL.len() - 1);
        Self::ALL[index]
    }

    /// Number of active biquad sections
    pub fn stage_count(self) -> usize {
        self.index() + 1
    }

    /// Butterworth filter order
    pub fn order(self) -> usize {
        2 * self.stage_count()
    }

    pub fn db_per_octave(self) -> u32 {
        12 * self.stage_count() as u32
    }
}

/// Snapshot of all filter parameters
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ChainSettings {
    pub peak_freq: f32,
    pub peak_gain_db: f32,
    pub peak_quality: f32,
    pub low_cut_freq: f32,
    pub high_cut_freq: f32,
    pub low_cut_slope: Slope,
    pub high_cut_slope: Slope,
    pub low_cut_bypassed: bool,
    pub peak_bypassed: bool,
    pub high_cut_bypassed: bool,
}

impl Default for ChainSettings {
    fn default() -> Self {
        Self {
            peak_freq: 750.0,
            peak_gain_db: 0.0,
            peak_quality: 1.0,
            low_cut_freq: MIN_FREQUENCY,
            high_cut_freq: MAX_FREQUENCY,
            low_cut_slope: Slope::Slope12,
            high_cut_slope: Slope::Slope12,
            low_cut_bypassed: false,
            peak_bypassed: false,
            high_cut_bypassed: false,
        }
    }
}
