//! Editor Model
//!
//! What the plugin window draws: the chain's magnitude response and the
//! analyzer spectrum. The editor keeps its own [`MonoChain`] mirror, built
//! from the parameter store on the UI thread, so drawing never touches the
//! audio thread's filters.

use std::sync::Arc;

use parking_lot::Mutex;
use tracing::warn;
use trieq_dsp::{
    design_chain, map_to_log10, response_curve, MonoChain, SpectrumAnalyzer, MAX_FREQUENCY,
    MIN_FREQUENCY, NEGATIVE_INFINITY_DB, NUM_BINS,
};

use crate::params::{chain_settings, ParamId, ParameterStore};

/// Response curve + spectrum state for one editor instance
pub struct ResponseCurveModel {
    store: Arc<ParameterStore>,
    analyzer: Arc<Mutex<SpectrumAnalyzer>>,
    chain: MonoChain,
    sample_rate: f32,
    points: usize,
    last_generation: Option<u64>,
    magnitudes: Vec<f64>,
    spectrum: [f32; NUM_BINS],
}

impl ResponseCurveModel {
    pub(crate) fn new(
        store: Arc<ParameterStore>,
        analyzer: Arc<Mutex<SpectrumAnalyzer>>,
        sample_rate: f32,
        points: usize,
    ) -> Self {
        let points = points.max(2);
        let mut model = Self {
            store,
            analyzer,
            chain: MonoChain::new(),
            sample_rate,
            points,
            last_generation: None,
            magnitudes: vec![0.0; points],
            spectrum: [NEGATIVE_INFINITY_DB; NUM_BINS],
        };
        model.refresh_curve();
        model
    }

    /// Timer callback: pull new parameters and analyzer data
    ///
    /// Returns `true` if anything the editor draws changed.
    pub fn refresh(&mut self) -> bool {
        let curve_changed = self.refresh_curve();

        let spectrum_changed = if self.store.get_bool(ParamId::AnalyzerEnabled) {
            let mut analyzer = self.analyzer.lock();
            if analyzer.update() {
                self.spectrum = analyzer.spectrum_db();
                true
            } else {
                false
            }
        } else if self.spectrum.iter().any(|&db| db != NEGATIVE_INFINITY_DB) {
            self.analyzer.lock().reset();
            self.spectrum = [NEGATIVE_INFINITY_DB; NUM_BINS];
            true
        } else {
            false
        };

        curve_changed || spectrum_changed
    }

    /// Rebuild the mirror chain if the parameters moved since last time
    fn refresh_curve(&mut self) -> bool {
        let generation = self.store.generation();
        if self.last_generation == Some(generation) {
            return false;
        }
        self.last_generation = Some(generation);

        let settings = chain_settings(&self.store);
        match design_chain(&settings, self.sample_rate) {
            Ok(coefficients) => {
                self.chain.apply(&settings, &coefficients);
                self.magnitudes = response_curve(&self.chain, self.sample_rate as f64, self.points);
                true
            }
            Err(e) => {
                warn!("Editor could not design response curve: {}", e);
                false
            }
        }
    }

    /// Magnitude response in dB at [`frequency`](Self::frequency) `i`
    pub fn magnitudes(&self) -> &[f64] {
        &self.magnitudes
    }

    /// Frequency (Hz) of curve point `i`, log-spaced from 20Hz to 20kHz
    pub fn frequency(&self, i: usize) -> f64 {
        map_to_log10(
            i as f64 / self.points as f64,
            MIN_FREQUENCY as f64,
            MAX_FREQUENCY as f64,
        )
    }

    /// Latest smoothed analyzer spectrum in dB
    pub fn spectrum(&self) -> &[f32; NUM_BINS] {
        &self.spectrum
    }

    /// Centre frequency of analyzer bin `bin`
    pub fn spectrum_frequency(&self, bin: usize) -> f32 {
        self.analyzer.lock().bin_frequency(bin)
    }

    /// The editor's mirror chain, for per-band display
    pub fn chain(&self) -> &MonoChain {
        &self.chain
    }

    pub fn points(&self) -> usize {
        self.points
    }

    pub fn sample_rate(&self) -> f32 {
        self.sample_rate
    }
}
