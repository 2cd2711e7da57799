//! Frequency Response
//!
//! Evaluates the magnitude of biquad sections and whole chains so the
//! editor can plot the response curve without touching audio state.

use biquad::Coefficients;

use crate::chain::MonoChain;
use crate::settings::{MAX_FREQUENCY, MIN_FREQUENCY};

/// Gains below this are reported as this many dB
pub const MINUS_INFINITY_DB: f64 = -100.0;

/// Magnitude of a single biquad section at `frequency`
///
/// Evaluates H(z) = (b0 + b1 z^-1 + b2 z^-2) / (1 + a1 z^-1 + a2 z^-2)
/// on the unit circle. Done in f64 so cascades of narrow sections stay accurate.
pub fn magnitude_for_frequency(coeffs: &Coefficients<f32>, frequency: f64, sample_rate: f64) -> f64 {
    let w = 2.0 * std::f64::consts::PI * frequency / sample_rate;
    let (sin1, cos1) = w.sin_cos();
    let (sin2, cos2) = (2.0 * w).sin_cos();

    let (b0, b1, b2) = (coeffs.b0 as f64, coeffs.b1 as f64, coeffs.b2 as f64);
    let (a1, a2) = (coeffs.a1 as f64, coeffs.a2 as f64);

    let num_re = b0 + b1 * cos1 + b2 * cos2;
    let num_im = -(b1 * sin1 + b2 * sin2);
    let den_re = 1.0 + a1 * cos1 + a2 * cos2;
    let den_im = -(a1 * sin1 + a2 * sin2);

    let num = (num_re * num_re + num_im * num_im).sqrt();
    let den = (den_re * den_re + den_im * den_im).sqrt();

    if den == 0.0 {
        return f64::INFINITY;
    }
    num / den
}

/// Convert linear gain to dB, floored at [`MINUS_INFINITY_DB`]
pub fn gain_to_decibels(gain: f64) -> f64 {
    if gain > 0.0 {
        (20.0 * gain.log10()).max(MINUS_INFINITY_DB)
    } else {
        MINUS_INFINITY_DB
    }
}

pub fn decibels_to_gain(db: f64) -> f64 {
    if db > MINUS_INFINITY_DB {
        10.0_f64.powf(db / 20.0)
    } else {
        0.0
    }
}

/// Map a 0..1 proportion onto a logarithmic range
pub fn map_to_log10(proportion: f64, min: f64, max: f64) -> f64 {
    let log_min = min.log10();
    let log_max = max.log10();
    10.0_f64.powf(log_min + proportion * (log_max - log_min))
}

/// Inverse of [`map_to_log10`]
pub fn map_from_log10(value: f64, min: f64, max: f64) -> f64 {
    (value.log10() - min.log10()) / (max.log10() - min.log10())
}

/// Sample the chain's magnitude response (dB) at `points` log-spaced
/// frequencies from 20Hz to 20kHz.
///
/// Allocates. Call from the UI thread only.
pub fn response_curve(chain: &MonoChain, sample_rate: f64, points: usize) -> Vec<f64> {
    (0..points)
        .map(|i| {
            let freq = map_to_log10(
                i as f64 / points as f64,
                MIN_FREQUENCY as f64,
                MAX_FREQUENCY as f64,
            );
            chain.magnitude_db(freq, sample_rate)
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_identity_section_is_flat() {
        let unity = Coefficients {
            a1: 0.0,
            a2: 0.0,
            b0: 1.0,
            b1: 0.0,
            b2: 0.0,
        };
        for freq in [20.0, 440.0, 1000.0, 15000.0] {
            let mag = magnitude_for_frequency(&unity, freq, 48000.0);
            assert!((mag - 1.0).abs() < 1e-12);
        }
    }

    #[test]
    fn test_decibel_conversions() {
        assert!((gain_to_decibels(1.0)).abs() < 1e-12);
        assert!((gain_to_decibels(2.0) - 6.0206).abs() < 1e-3);
        assert_eq!(gain_to_decibels(0.0), MINUS_INFINITY_DB);
        assert!((decibels_to_gain(6.0206) - 2.0).abs() < 1e-3);
        assert_eq!(decibels_to_gain(-200.0), 0.0);
    }

    #[test]
    fn test_log_mapping_endpoints() {
        assert!((map_to_log10(0.0, 20.0, 20000.0) - 20.0).abs() < 1e-9);
        assert!((map_to_log10(1.0, 20.0, 20000.0) - 20000.0).abs() < 1e-6);
        // 200Hz is one third of the way across three decades
        assert!((map_from_log10(200.0, 20.0, 20000.0) - 1.0 / 3.0).abs() < 1e-9);
    }

    #[test]
    fn test_response_curve_length() {
        let chain = MonoChain::new();
        let curve = response_curve(&chain, 48000.0, 256);
        assert_eq!(curve.len(), 256);
        assert!(curve.iter().all(|db| db.is_finite()));
    }
}
