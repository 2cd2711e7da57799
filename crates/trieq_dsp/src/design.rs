//! Coefficient Designer
//!
//! Turns a [`ChainSettings`] snapshot into biquad coefficients:
//! - Peak band: single RBJ peaking section
//! - Cut bands: Butterworth high-pass / low-pass of order 2, 4, 6 or 8,
//!   realised as a cascade of second-order sections
//!
//! Everything here allocates (one `Arc` per section) and must run off the
//! audio thread. The results are immutable and shared by reference count.

use std::sync::Arc;

use biquad::{Coefficients, ToHertz, Type};

use crate::error::DspError;
use crate::settings::{
    ChainSettings, Slope, MAX_CUT_STAGES, MAX_FREQUENCY, MAX_GAIN_DB, MAX_Q, MIN_FREQUENCY,
    MIN_GAIN_DB, MIN_Q,
};

/// Reference-counted, immutable coefficients for one biquad section
pub type SharedCoefficients = Arc<Coefficients<f32>>;

/// Upper frequency bound as a fraction of the sample rate (just under Nyquist)
const MAX_FREQUENCY_RATIO: f32 = 0.49;

/// Ordered coefficients for the sections of one cut filter
#[derive(Debug, Clone)]
pub struct CoefficientSet {
    stages: [Option<SharedCoefficients>; MAX_CUT_STAGES],
    slope: Slope,
}

impl CoefficientSet {
    /// Number of designed sections (`slope_index + 1`)
    pub fn len(&self) -> usize {
        self.slope.stage_count()
    }

    pub fn is_empty(&self) -> bool {
        false
    }

    /// Butterworth order of the cascade
    pub fn order(&self) -> usize {
        self.slope.order()
    }

    pub fn slope(&self) -> Slope {
        self.slope
    }

    pub fn get(&self, index: usize) -> Option<&SharedCoefficients> {
        self.stages.get(index).and_then(Option::as_ref)
    }

    pub fn iter(&self) -> impl Iterator<Item = &SharedCoefficients> {
        self.stages.iter().flatten()
    }
}

/// Coefficients for the whole low cut -> peak -> high cut chain
#[derive(Debug, Clone)]
pub struct ChainCoefficients {
    pub low_cut: CoefficientSet,
    pub peak: SharedCoefficients,
    pub high_cut: CoefficientSet,
}

impl ChainCoefficients {
    /// Every shared handle in the set, in chain order
    pub fn handles(&self) -> impl Iterator<Item = &SharedCoefficients> {
        self.low_cut
            .iter()
            .chain(std::iter::once(&self.peak))
            .chain(self.high_cut.iter())
    }
}

fn check_sample_rate(sample_rate: f32) -> Result<(), DspError> {
    if sample_rate.is_finite() && sample_rate > 0.0 {
        Ok(())
    } else {
        Err(DspError::InvalidSampleRate(sample_rate))
    }
}

/// Clamp a band frequency into the audible range and below Nyquist
fn clamp_frequency(frequency: f32, sample_rate: f32) -> Result<f32, DspError> {
    if !frequency.is_finite() {
        return Err(DspError::InvalidCoefficients {
            frequency,
            sample_rate,
        });
    }
    let upper = MAX_FREQUENCY.min(sample_rate * MAX_FREQUENCY_RATIO);
    Ok(frequency.clamp(MIN_FREQUENCY.min(upper), upper))
}

fn design_section(
    filter: Type<f32>,
    frequency: f32,
    q: f32,
    sample_rate: f32,
) -> Result<SharedCoefficients, DspError> {
    let coeffs = Coefficients::<f32>::from_params(filter, sample_rate.hz(), frequency.hz(), q)
        .map_err(|_| DspError::InvalidCoefficients {
            frequency,
            sample_rate,
        })?;

    let finite = [coeffs.a1, coeffs.a2, coeffs.b0, coeffs.b1, coeffs.b2]
        .iter()
        .all(|c| c.is_finite());
    if !finite {
        return Err(DspError::InvalidCoefficients {
            frequency,
            sample_rate,
        });
    }

    Ok(Arc::new(coeffs))
}

/// Peak (bell) filter from centre frequency, gain and Q
pub fn make_peak_filter(
    settings: &ChainSettings,
    sample_rate: f32,
) -> Result<SharedCoefficients, DspError> {
    check_sample_rate(sample_rate)?;
    let frequency = clamp_frequency(settings.peak_freq, sample_rate)?;

    if !settings.peak_quality.is_finite() || !settings.peak_gain_db.is_finite() {
        return Err(DspError::InvalidCoefficients {
            frequency,
            sample_rate,
        });
    }
    let q = settings.peak_quality.clamp(MIN_Q, MAX_Q);
    let gain_db = settings.peak_gain_db.clamp(MIN_GAIN_DB, MAX_GAIN_DB);

    design_section(Type::PeakingEQ(gain_db), frequency, q, sample_rate)
}

/// Q of section `k` in an order-`order` Butterworth cascade
///
/// Poles sit at angles (2k+1)π/(2N); each conjugate pair gives Q = 1 / (2cos θ).
/// The product of all section Qs is 1/√2, so the cascade is -3dB at cutoff.
pub fn butterworth_q(order: usize, k: usize) -> f32 {
    let theta = (2 * k + 1) as f64 * std::f64::consts::PI / (2 * order) as f64;
    (1.0 / (2.0 * theta.cos())) as f32
}

/// Which side of the spectrum a cut filter removes
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum CutKind {
    HighPass,
    LowPass,
}

impl CutKind {
    fn filter_type(self) -> Type<f32> {
        match self {
            CutKind::HighPass => Type::HighPass,
            CutKind::LowPass => Type::LowPass,
        }
    }
}

fn make_cut_filter(
    kind: CutKind,
    frequency: f32,
    slope: Slope,
    sample_rate: f32,
) -> Result<CoefficientSet, DspError> {
    check_sample_rate(sample_rate)?;
    let frequency = clamp_frequency(frequency, sample_rate)?;
    let order = slope.order();

    let mut stages: [Option<SharedCoefficients>; MAX_CUT_STAGES] = Default::default();
    for (k, stage) in stages.iter_mut().take(slope.stage_count()).enumerate() {
        let q = butterworth_q(order, k);
        *stage = Some(design_section(kind.filter_type(), frequency, q, sample_rate)?);
    }

    Ok(CoefficientSet { stages, slope })
}

/// Butterworth high-pass for the low cut band
pub fn make_low_cut_filter(
    settings: &ChainSettings,
    sample_rate: f32,
) -> Result<CoefficientSet, DspError> {
    make_cut_filter(
        CutKind::HighPass,
        settings.low_cut_freq,
        settings.low_cut_slope,
        sample_rate,
    )
}

/// Butterworth low-pass for the high cut band
pub fn make_high_cut_filter(
    settings: &ChainSettings,
    sample_rate: f32,
) -> Result<CoefficientSet, DspError> {
    make_cut_filter(
        CutKind::LowPass,
        settings.high_cut_freq,
        settings.high_cut_slope,
        sample_rate,
    )
}

/// Design all three bands at once
pub fn design_chain(
    settings: &ChainSettings,
    sample_rate: f32,
) -> Result<ChainCoefficients, DspError> {
    Ok(ChainCoefficients {
        low_cut: make_low_cut_filter(settings, sample_rate)?,
        peak: make_peak_filter(settings, sample_rate)?,
        high_cut: make_high_cut_filter(settings, sample_rate)?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::response::{gain_to_decibels, magnitude_for_frequency};

    const SAMPLE_RATE: f32 = 48000.0;

    fn cascade_db(set: &CoefficientSet, freq: f64) -> f64 {
        let mag: f64 = set
            .iter()
            .map(|c| magnitude_for_frequency(c, freq, SAMPLE_RATE as f64))
            .product();
        gain_to_decibels(mag)
    }

    #[test]
    fn test_cut_filter_section_counts() {
        for slope in Slope::ALL {
            let settings = ChainSettings {
                low_cut_slope: slope,
                high_cut_slope: slope,
                ..Default::default()
            };
            let low = make_low_cut_filter(&settings, SAMPLE_RATE).unwrap();
            let high = make_high_cut_filter(&settings, SAMPLE_RATE).unwrap();

            assert_eq!(low.len(), slope.index() + 1);
            assert_eq!(low.order(), 2 * (slope.index() + 1));
            assert_eq!(low.iter().count(), slope.stage_count());
            assert_eq!(high.iter().count(), slope.stage_count());
            assert!(low.get(slope.stage_count()).is_none());
        }
    }

    #[test]
    fn test_butterworth_q_values() {
        assert!((butterworth_q(2, 0) - std::f32::consts::FRAC_1_SQRT_2).abs() < 1e-6);
        assert!((butterworth_q(4, 0) - 0.541_196).abs() < 1e-5);
        assert!((butterworth_q(4, 1) - 1.306_563).abs() < 1e-5);

        for order in [2, 4, 6, 8] {
            let product: f32 = (0..order / 2).map(|k| butterworth_q(order, k)).product();
            assert!((product - std::f32::consts::FRAC_1_SQRT_2).abs() < 1e-5);
        }
    }

    #[test]
    fn test_cut_filters_are_minus_3db_at_cutoff() {
        for slope in Slope::ALL {
            let settings = ChainSettings {
                low_cut_freq: 200.0,
                high_cut_freq: 5000.0,
                low_cut_slope: slope,
                high_cut_slope: slope,
                ..Default::default()
            };
            let low = make_low_cut_filter(&settings, SAMPLE_RATE).unwrap();
            let high = make_high_cut_filter(&settings, SAMPLE_RATE).unwrap();

            let low_db = cascade_db(&low, 200.0);
            let high_db = cascade_db(&high, 5000.0);
            assert!((low_db + 3.01).abs() < 0.1, "{:?} low cut: {}dB", slope, low_db);
            assert!((high_db + 3.01).abs() < 0.1, "{:?} high cut: {}dB", slope, high_db);
        }
    }

    #[test]
    fn test_steeper_slope_attenuates_more() {
        let mut previous = 0.0;
        for slope in Slope::ALL {
            let settings = ChainSettings {
                low_cut_freq: 1000.0,
                low_cut_slope: slope,
                ..Default::default()
            };
            let low = make_low_cut_filter(&settings, SAMPLE_RATE).unwrap();
            // One octave below cutoff
            let db = cascade_db(&low, 500.0);
            assert!(db < previous, "{:?} should cut harder than the previous slope", slope);
            // Roughly 12dB per section per octave (asymptotic; less near cutoff)
            assert!(db < -(6.0 * slope.stage_count() as f64));
            previous = db;
        }
    }

    #[test]
    fn test_peak_at_zero_gain_is_unity() {
        let settings = ChainSettings {
            peak_freq: 1000.0,
            peak_gain_db: 0.0,
            peak_quality: 2.5,
            ..Default::default()
        };
        let peak = make_peak_filter(&settings, SAMPLE_RATE).unwrap();
        for freq in [20.0, 100.0, 999.0, 1000.0, 4000.0, 19000.0] {
            let mag = magnitude_for_frequency(&peak, freq, SAMPLE_RATE as f64);
            assert!((mag - 1.0).abs() < 1e-4, "{}Hz: {}", freq, mag);
        }
    }

    #[test]
    fn test_peak_gain_at_centre() {
        let settings = ChainSettings {
            peak_freq: 1000.0,
            peak_gain_db: 6.0,
            peak_quality: 1.0,
            ..Default::default()
        };
        let peak = make_peak_filter(&settings, SAMPLE_RATE).unwrap();

        let centre = gain_to_decibels(magnitude_for_frequency(&peak, 1000.0, 48000.0));
        assert!((centre - 6.0).abs() < 0.1, "centre: {}dB", centre);

        for far in [20.0, 20000.0] {
            let db = gain_to_decibels(magnitude_for_frequency(&peak, far, 48000.0));
            assert!(db.abs() < 0.1, "{}Hz: {}dB", far, db);
        }
    }

    #[test]
    fn test_negative_peak_gain() {
        let settings = ChainSettings {
            peak_freq: 2000.0,
            peak_gain_db: -12.0,
            peak_quality: 4.0,
            ..Default::default()
        };
        let peak = make_peak_filter(&settings, SAMPLE_RATE).unwrap();
        let db = gain_to_decibels(magnitude_for_frequency(&peak, 2000.0, 48000.0));
        assert!((db + 12.0).abs() < 0.1);
    }

    #[test]
    fn test_out_of_range_inputs_are_clamped() {
        let settings = ChainSettings {
            peak_freq: 40000.0,
            peak_quality: -1.0,
            peak_gain_db: 60.0,
            low_cut_freq: 1.0,
            high_cut_freq: 96000.0,
            ..Default::default()
        };
        // Above Nyquist at 32kHz, Q below zero, gain over range: all clamp, none fail
        let coeffs = design_chain(&settings, 32000.0).unwrap();
        assert!(coeffs.handles().all(|c| c.b0.is_finite()));

        let peak_db = gain_to_decibels(magnitude_for_frequency(
            &coeffs.peak,
            (32000.0 * MAX_FREQUENCY_RATIO) as f64,
            32000.0,
        ));
        assert!((peak_db - MAX_GAIN_DB as f64).abs() < 0.1);
    }

    #[test]
    fn test_non_finite_inputs_rejected() {
        let settings = ChainSettings {
            peak_freq: f32::NAN,
            ..Default::default()
        };
        assert!(matches!(
            make_peak_filter(&settings, SAMPLE_RATE),
            Err(DspError::InvalidCoefficients { .. })
        ));

        let settings = ChainSettings {
            peak_quality: f32::INFINITY,
            ..Default::default()
        };
        assert!(make_peak_filter(&settings, SAMPLE_RATE).is_err());

        let settings = ChainSettings {
            low_cut_freq: f32::NEG_INFINITY,
            ..Default::default()
        };
        assert!(make_low_cut_filter(&settings, SAMPLE_RATE).is_err());
    }

    #[test]
    fn test_invalid_sample_rate() {
        let settings = ChainSettings::default();
        assert_eq!(
            make_peak_filter(&settings, 0.0).unwrap_err(),
            DspError::InvalidSampleRate(0.0)
        );
        assert!(design_chain(&settings, -44100.0).is_err());
    }

    #[test]
    fn test_design_is_deterministic() {
        let settings = ChainSettings {
            peak_gain_db: 3.5,
            low_cut_slope: Slope::Slope36,
            ..Default::default()
        };
        let a = design_chain(&settings, SAMPLE_RATE).unwrap();
        let b = design_chain(&settings, SAMPLE_RATE).unwrap();
        for (x, y) in a.handles().zip(b.handles()) {
            assert_eq!(
                [x.b0, x.b1, x.b2, x.a1, x.a2],
                [y.b0, y.b1, y.b2, y.a1, y.a2]
            );
            // Fresh allocations every time
            assert!(!Arc::ptr_eq(x, y));
        }
    }

    #[test]
    fn test_chain_handles_count() {
        let settings = ChainSettings {
            low_cut_slope: Slope::Slope48,
            high_cut_slope: Slope::Slope24,
            ..Default::default()
        };
        let coeffs = design_chain(&settings, SAMPLE_RATE).unwrap();
        assert_eq!(coeffs.handles().count(), 4 + 1 + 2);
    }
}
