//! trieq DSP - Digital Signal Processing Module
//!
//! This crate provides the signal path of the trieq equalizer:
//! - Coefficient design: RBJ peak filter and Butterworth cut filters (12-48 dB/oct)
//! - Runtime-indexed filter chain with per-stage and per-band bypass
//! - Chain updates by shared-handle replacement (no allocation on the audio thread)
//! - Magnitude response evaluation for the editor's response curve
//! - FFT spectrum analyzer fed through a lock-free tap
//!
//! # Architecture
//!
//! The DSP chain follows a strict "no allocation in audio callback" rule.
//! Coefficients are designed off the audio thread and swapped in between
//! buffer processing calls.

mod analyzer;
mod chain;
mod design;
mod eq;
mod error;
mod processor;
mod response;
mod settings;

pub use analyzer::{analyzer_channel, AnalyzerTap, SpectrumAnalyzer, FFT_SIZE, NEGATIVE_INFINITY_DB, NUM_BINS};
pub use chain::{update_coefficients, update_cut_filter, ChainPosition, CutFilter, MonoChain, Stage};
pub use design::{
    butterworth_q, design_chain, make_high_cut_filter, make_low_cut_filter, make_peak_filter,
    ChainCoefficients, CoefficientSet, SharedCoefficients,
};
pub use eq::Equalizer;
pub use error::DspError;
pub use processor::{AudioProcessor, ProcessContext};
pub use response::{
    decibels_to_gain, gain_to_decibels, magnitude_for_frequency, map_from_log10, map_to_log10,
    response_curve, MINUS_INFINITY_DB,
};
pub use settings::{
    ChainSettings, Slope, MAX_CUT_STAGES, MAX_FREQUENCY, MAX_GAIN_DB, MAX_Q, MIN_FREQUENCY,
    MIN_GAIN_DB, MIN_Q,
};

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_crate_exports() {
        // Verify all public types are accessible
        let settings = ChainSettings::default();
        let coeffs = design_chain(&settings, 48000.0).unwrap();
        let mut eq = Equalizer::new(48000.0);
        eq.apply(&settings, &coeffs);
    }

    #[test]
    fn test_end_to_end_peak_example() {
        // peak 1kHz, +6dB, Q 1 at 48kHz
        let settings = ChainSettings {
            peak_freq: 1000.0,
            peak_gain_db: 6.0,
            peak_quality: 1.0,
            ..Default::default()
        };
        let coeffs = design_chain(&settings, 48000.0).unwrap();
        let mut eq = Equalizer::new(48000.0);
        eq.apply(&settings, &coeffs);

        let chain = eq.left();
        assert!((chain.magnitude_db(1000.0, 48000.0) - 6.0).abs() < 0.1);
        assert!(chain.magnitude_db(100.0, 48000.0) < 1.0);
        assert!(chain.magnitude_db(10000.0, 48000.0) < 1.0);
    }
}
