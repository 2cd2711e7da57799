//! Stereo Equalizer
//!
//! Two independent [`MonoChain`]s (left/right) fed from the same coefficient
//! handles. Designed for real-time use: no allocations in the process path.

use crate::chain::MonoChain;
use crate::design::ChainCoefficients;
use crate::settings::ChainSettings;

/// The main equalizer processor
///
/// Holds the filter state for both channels and processes audio samples.
pub struct Equalizer {
    // Each channel needs its own delay lines; coefficients are shared
    left: MonoChain,
    right: MonoChain,
    settings: ChainSettings,
    sample_rate: f32,
    enabled: bool,
}

impl Equalizer {
    /// Create a new equalizer with a flat (pass-through) response
    ///
    /// Apply designed coefficients with [`Equalizer::apply`] before processing.
    pub fn new(sample_rate: f32) -> Self {
        Self {
            left: MonoChain::new(),
            right: MonoChain::new(),
            settings: ChainSettings::default(),
            sample_rate,
            enabled: true,
        }
    }

    /// Swap new coefficients into both channels
    ///
    /// Call this between buffer processing, not during.
    /// Handle replacement only - no allocation, no locks.
    pub fn apply(&mut self, settings: &ChainSettings, coefficients: &ChainCoefficients) {
        self.left.apply(settings, coefficients);
        self.right.apply(settings, coefficients);
        self.settings = *settings;
    }

    /// Bypass the whole equalizer
    pub fn set_enabled(&mut self, enabled: bool) {
        self.enabled = enabled;
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    /// Process a stereo sample pair through both chains
    ///
    /// # Real-time Safety
    /// This function performs NO allocations and NO syscalls.
    /// Safe to call from audio callback.
    #[inline]
    pub fn process_sample(&mut self, left: f32, right: f32) -> (f32, f32) {
        if !self.enabled {
            return (left, right);
        }
        (self.left.process_sample(left), self.right.process_sample(right))
    }

    /// Process an interleaved stereo buffer in-place
    ///
    /// Buffer format: [L0, R0, L1, R1, L2, R2, ...]
    ///
    /// # Real-time Safety
    /// No allocations. O(n) where n = buffer length.
    #[inline]
    pub fn process_interleaved(&mut self, buffer: &mut [f32]) {
        for frame in buffer.chunks_exact_mut(2) {
            let (l, r) = self.process_sample(frame[0], frame[1]);
            frame[0] = l;
            frame[1] = r;
        }
    }

    /// Process separate left/right channel buffers
    ///
    /// # Panics
    /// Panics if buffers have different lengths (debug builds only)
    #[inline]
    pub fn process_planar(&mut self, left: &mut [f32], right: &mut [f32]) {
        debug_assert_eq!(left.len(), right.len(), "Channel buffers must be same length");

        if !self.enabled {
            return;
        }
        self.left.process(left);
        self.right.process(right);
    }

    /// Settings the current coefficients were designed from
    pub fn settings(&self) -> &ChainSettings {
        &self.settings
    }

    /// Read-only view of the left chain (both chains share coefficients)
    pub fn left(&self) -> &MonoChain {
        &self.left
    }

    pub fn right(&self) -> &MonoChain {
        &self.right
    }

    pub fn sample_rate(&self) -> f32 {
        self.sample_rate
    }

    /// Reset filter state (clear delay lines)
    ///
    /// Call when playback restarts to prevent filter ringing
    pub fn reset(&mut self) {
        self.left.reset();
        self.right.reset();
    }
}
