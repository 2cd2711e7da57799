//! DSP Error Types

use thiserror::Error;

/// Errors that can occur while designing or applying filter coefficients
#[derive(Error, Debug, Clone, PartialEq)]
pub enum DspError {
    #[error("Invalid filter coefficients for frequency {frequency}Hz at sample rate {sample_rate}Hz")]
    InvalidCoefficients { frequency: f32, sample_rate: f32 },

    #[error("Sample rate must be positive, got {0}")]
    InvalidSampleRate(f32),

    #[error("Invalid slope index: {0} (must be 0-3)")]
    InvalidSlope(usize),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = DspError::InvalidSlope(7);
        assert!(err.to_string().contains('7'));

        let err = DspError::InvalidCoefficients {
            frequency: 1000.0,
            sample_rate: 48000.0,
        };
        assert!(err.to_string().contains("1000"));

        let err = DspError::InvalidSampleRate(-1.0);
        assert!(err.to_string().contains("-1"));
    }
}
