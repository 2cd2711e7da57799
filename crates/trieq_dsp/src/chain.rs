//! Filter Chain
//!
//! Runtime-indexed cascade of biquad stages:
//!
//! ```text
//! LowCut [4 stages] -> Peak [1 stage] -> HighCut [4 stages]
//! ```
//!
//! Every stage holds a shared handle to its current coefficients and a bypass
//! flag. Each band (chain position) also has its own bypass flag.
//!
//! Updating a stage is a handle replacement plus a 20-byte copy into the
//! running filter - no allocation, no locks - so the updater functions here
//! are safe to call on the audio thread between blocks.

use std::sync::Arc;

use biquad::{Biquad, Coefficients, DirectForm2Transposed};

use crate::design::{ChainCoefficients, CoefficientSet, SharedCoefficients};
use crate::response::{gain_to_decibels, magnitude_for_frequency};
use crate::settings::{ChainSettings, Slope, MAX_CUT_STAGES};

/// Pass-through section: b0 = 1, everything else 0
fn identity_coefficients() -> Coefficients<f32> {
    Coefficients {
        a1: 0.0,
        a2: 0.0,
        b0: 1.0,
        b1: 0.0,
        b2: 0.0,
    }
}

/// Band positions in the chain
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChainPosition {
    LowCut,
    Peak,
    HighCut,
}

impl ChainPosition {
    pub const ALL: [ChainPosition; 3] = [ChainPosition::LowCut, ChainPosition::Peak, ChainPosition::HighCut];

    fn index(self) -> usize {
        match self {
            ChainPosition::LowCut => 0,
            ChainPosition::Peak => 1,
            ChainPosition::HighCut => 2,
        }
    }
}

/// A single biquad section in the chain
#[derive(Debug, Clone)]
pub struct Stage {
    coefficients: SharedCoefficients,
    filter: DirectForm2Transposed<f32>,
    bypassed: bool,
}

impl Stage {
    /// Create a pass-through stage
    pub fn new() -> Self {
        Self::with_coefficients(Arc::new(identity_coefficients()))
    }

    pub fn with_coefficients(coefficients: SharedCoefficients) -> Self {
        let filter = DirectForm2Transposed::<f32>::new(*coefficients);
        Self {
            coefficients,
            filter,
            bypassed: false,
        }
    }

    /// Current coefficient handle (read-only, for display)
    pub fn coefficients(&self) -> &SharedCoefficients {
        &self.coefficients
    }

    /// Swap in a new coefficient handle
    ///
    /// # Real-time Safety
    /// Clones the `Arc` (refcount increment) and drops the previous one.
    /// The drop only frees memory if nobody else holds the old handle, so
    /// callers on the audio thread must keep published handles alive elsewhere.
    #[inline]
    pub fn set_coefficients(&mut self, coefficients: &SharedCoefficients) {
        if Arc::ptr_eq(&self.coefficients, coefficients) {
            return;
        }
        self.filter.update_coefficients(**coefficients);
        self.coefficients = Arc::clone(coefficients);
    }

    pub fn is_bypassed(&self) -> bool {
        self.bypassed
    }

    pub fn set_bypassed(&mut self, bypassed: bool) {
        self.bypassed = bypassed;
    }

    #[inline]
    pub fn process_sample(&mut self, sample: f32) -> f32 {
        if self.bypassed {
            sample
        } else {
            self.filter.run(sample)
        }
    }

    /// Magnitude of this stage alone (ignores the bypass flag)
    pub fn magnitude_for_frequency(&self, frequency: f64, sample_rate: f64) -> f64 {
        magnitude_for_frequency(&self.coefficients, frequency, sample_rate)
    }

    /// Clear delay lines
    pub fn reset(&mut self) {
        self.filter.reset_state();
    }
}

impl Default for Stage {
    fn default() -> Self {
        Self::new()
    }
}

/// Up to four cascaded sections for a 12-48 dB/oct cut band
#[derive(Debug, Clone, Default)]
pub struct CutFilter {
    stages: [Stage; MAX_CUT_STAGES],
}

impl CutFilter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn stage(&self, index: usize) -> Option<&Stage> {
        self.stages.get(index)
    }

    pub fn stages(&self) -> &[Stage; MAX_CUT_STAGES] {
        &self.stages
    }

    /// Number of stages currently processing audio
    pub fn active_stages(&self) -> usize {
        self.stages.iter().filter(|s| !s.is_bypassed()).count()
    }

    pub fn set_bypassed(&mut self, index: usize, bypassed: bool) {
        if let Some(stage) = self.stages.get_mut(index) {
            stage.set_bypassed(bypassed);
        }
    }

    #[inline]
    pub fn process_sample(&mut self, sample: f32) -> f32 {
        self.stages
            .iter_mut()
            .fold(sample, |s, stage| stage.process_sample(s))
    }

    /// Product of the magnitudes of all active stages
    pub fn magnitude_for_frequency(&self, frequency: f64, sample_rate: f64) -> f64 {
        self.stages
            .iter()
            .filter(|s| !s.is_bypassed())
            .map(|s| s.magnitude_for_frequency(frequency, sample_rate))
            .product()
    }

    pub fn reset(&mut self) {
        for stage in &mut self.stages {
            stage.reset();
        }
    }
}

/// Replace a stage's coefficients and make sure it is active
#[inline]
pub fn update_coefficients(stage: &mut Stage, replacement: &SharedCoefficients) {
    stage.set_coefficients(replacement);
}

/// Activate exactly `slope.stage_count()` stages of a cut filter
///
/// All four stages are bypassed first, then stages 0..=slope_index are
/// loaded and enabled in ascending order. Lower stages are shared by every
/// slope: 48 dB/oct uses stages 0-3, 12 dB/oct only stage 0.
pub fn update_cut_filter(filter: &mut CutFilter, coefficients: &CoefficientSet, slope: Slope) {
    debug_assert_eq!(
        coefficients.len(),
        slope.stage_count(),
        "coefficient set designed for a different slope"
    );

    for stage in &mut filter.stages {
        stage.set_bypassed(true);
    }

    for index in 0..slope.stage_count() {
        if let Some(replacement) = coefficients.get(index) {
            let stage = &mut filter.stages[index];
            update_coefficients(stage, replacement);
            stage.set_bypassed(false);
        }
    }
}

/// One channel of the equalizer: low cut -> peak -> high cut
#[derive(Debug, Clone, Default)]
pub struct MonoChain {
    low_cut: CutFilter,
    peak: Stage,
    high_cut: CutFilter,
    band_bypassed: [bool; 3],
}

impl MonoChain {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn low_cut(&self) -> &CutFilter {
        &self.low_cut
    }

    pub fn peak(&self) -> &Stage {
        &self.peak
    }

    pub fn high_cut(&self) -> &CutFilter {
        &self.high_cut
    }

    /// Stage `index` at a chain position (the peak band only has index 0)
    pub fn stage(&self, position: ChainPosition, index: usize) -> Option<&Stage> {
        match position {
            ChainPosition::LowCut => self.low_cut.stage(index),
            ChainPosition::Peak => (index == 0).then_some(&self.peak),
            ChainPosition::HighCut => self.high_cut.stage(index),
        }
    }

    pub fn is_band_bypassed(&self, position: ChainPosition) -> bool {
        self.band_bypassed[position.index()]
    }

    pub fn set_band_bypassed(&mut self, position: ChainPosition, bypassed: bool) {
        self.band_bypassed[position.index()] = bypassed;
    }

    /// Apply freshly designed coefficients and the bypass flags of `settings`
    ///
    /// Handle swaps and flag writes only; safe between audio blocks.
    pub fn apply(&mut self, settings: &ChainSettings, coefficients: &ChainCoefficients) {
        self.set_band_bypassed(ChainPosition::LowCut, settings.low_cut_bypassed);
        self.set_band_bypassed(ChainPosition::Peak, settings.peak_bypassed);
        self.set_band_bypassed(ChainPosition::HighCut, settings.high_cut_bypassed);

        update_coefficients(&mut self.peak, &coefficients.peak);
        update_cut_filter(&mut self.low_cut, &coefficients.low_cut, settings.low_cut_slope);
        update_cut_filter(&mut self.high_cut, &coefficients.high_cut, settings.high_cut_slope);
    }

    #[inline]
    pub fn process_sample(&mut self, sample: f32) -> f32 {
        let mut s = sample;
        if !self.band_bypassed[0] {
            s = self.low_cut.process_sample(s);
        }
        if !self.band_bypassed[1] {
            s = self.peak.process_sample(s);
        }
        if !self.band_bypassed[2] {
            s = self.high_cut.process_sample(s);
        }
        s
    }

    /// Process a mono block in place
    ///
    /// # Real-time Safety
    /// No allocations. O(n) where n = block length.
    #[inline]
    pub fn process(&mut self, block: &mut [f32]) {
        for sample in block.iter_mut() {
            *sample = self.process_sample(*sample);
        }
    }

    /// Linear magnitude of the whole chain, skipping bypassed bands and stages
    pub fn magnitude_for_frequency(&self, frequency: f64, sample_rate: f64) -> f64 {
        let mut mag = 1.0;
        if !self.is_band_bypassed(ChainPosition::LowCut) {
            mag *= self.low_cut.magnitude_for_frequency(frequency, sample_rate);
        }
        if !self.is_band_bypassed(ChainPosition::Peak) && !self.peak.is_bypassed() {
            mag *= self.peak.magnitude_for_frequency(frequency, sample_rate);
        }
        if !self.is_band_bypassed(ChainPosition::HighCut) {
            mag *= self.high_cut.magnitude_for_frequency(frequency, sample_rate);
        }
        mag
    }

    pub fn magnitude_db(&self, frequency: f64, sample_rate: f64) -> f64 {
        gain_to_decibels(self.magnitude_for_frequency(frequency, sample_rate))
    }

    pub fn reset(&mut self) {
        self.low_cut.reset();
        self.peak.reset();
        self.high_cut.reset();
    }
}
