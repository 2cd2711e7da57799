//! FFT Spectrum Analyzer
//!
//! Provides the spectrum overlay drawn behind the response curve.
//!
//! # Architecture
//!
//! ```text
//! Audio thread                      UI thread
//! AnalyzerTap ──rtrb (SPSC)──▶ SpectrumAnalyzer::update() ──▶ spectrum_db()
//! ```
//!
//! The tap never blocks and never allocates: when the UI stops draining,
//! samples are dropped. All FFT work happens on the UI side.

use std::sync::Arc;

use rtrb::{Consumer, Producer, RingBuffer};
use rustfft::{num_complex::Complex, Fft, FftPlanner};

/// FFT size (must be power of 2)
/// 2048 samples at 48kHz = ~42ms window, ~23Hz resolution
pub const FFT_SIZE: usize = 2048;

/// Number of frequency bins to output (reduced for efficient UI rendering)
/// These are logarithmically spaced to match human hearing
pub const NUM_BINS: usize = 64;

/// Floor of the displayed spectrum; anything quieter reads as this
pub const NEGATIVE_INFINITY_DB: f32 = -48.0;

/// Smoothing factor for spectrum decay (0.0 = instant, 1.0 = no decay)
const SPECTRUM_DECAY: f32 = 0.7;

/// Attack factor for spectrum rise (higher = faster response to new peaks)
const SPECTRUM_ATTACK: f32 = 0.5;

fn hann_window(n: usize, size: usize) -> f32 {
    0.5 * (1.0 - (2.0 * std::f32::consts::PI * n as f32 / (size - 1) as f32).cos())
}

/// Audio-side end of the analyzer
pub struct AnalyzerTap {
    producer: Producer<f32>,
}

impl AnalyzerTap {
    /// Push a stereo sample pair (mixed to mono)
    ///
    /// # Real-time Safety
    /// No allocations, no locks, O(1). Drops the sample if the ring is full.
    #[inline]
    pub fn push_sample(&mut self, left: f32, right: f32) {
        let _ = self.producer.push((left + right) * 0.5);
    }

    /// Push an interleaved stereo buffer
    #[inline]
    pub fn push_interleaved(&mut self, buffer: &[f32]) {
        for frame in buffer.chunks_exact(2) {
            self.push_sample(frame[0], frame[1]);
        }
    }

    /// Free space left in the ring
    pub fn slots(&self) -> usize {
        self.producer.slots()
    }
}

/// UI-side spectrum analyzer
pub struct SpectrumAnalyzer {
    consumer: Consumer<f32>,
    /// Last FFT_SIZE samples (ring, oldest at `write_pos`)
    history: Vec<f32>,
    write_pos: usize,
    samples_since_fft: usize,
    samples_per_fft: usize,
    window: Vec<f32>,
    fft: Arc<dyn Fft<f32>>,
    fft_buffer: Vec<Complex<f32>>,
    spectrum: [f32; NUM_BINS],
    smoothed: [f32; NUM_BINS],
    sample_rate: f32,
}

/// Create a connected tap / analyzer pair
///
/// # Arguments
/// * `sample_rate` - Audio sample rate in Hz
/// * `fps` - Target update rate for the spectrum
/// * `capacity` - Ring capacity in samples (should cover a few UI frames)
pub fn analyzer_channel(sample_rate: f32, fps: u32, capacity: usize) -> (AnalyzerTap, SpectrumAnalyzer) {
    let (producer, consumer) = RingBuffer::<f32>::new(capacity.max(1));
    let samples_per_fft = (sample_rate / fps.max(1) as f32).max(1.0) as usize;

    let mut planner = FftPlanner::new();
    let fft = planner.plan_fft_forward(FFT_SIZE);

    let analyzer = SpectrumAnalyzer {
        consumer,
        history: vec![0.0; FFT_SIZE],
        write_pos: 0,
        samples_since_fft: 0,
        samples_per_fft,
        window: (0..FFT_SIZE).map(|i| hann_window(i, FFT_SIZE)).collect(),
        fft,
        fft_buffer: vec![Complex::new(0.0, 0.0); FFT_SIZE],
        spectrum: [NEGATIVE_INFINITY_DB; NUM_BINS],
        smoothed: [NEGATIVE_INFINITY_DB; NUM_BINS],
        sample_rate,
    };

    (AnalyzerTap { producer }, analyzer)
}

impl SpectrumAnalyzer {
    /// Drain the tap and recompute the spectrum if enough new audio arrived
    ///
    /// Call this from the UI thread at your desired frame rate.
    /// Returns true if the spectrum was updated.
    pub fn update(&mut self) -> bool {
        while let Ok(sample) = self.consumer.pop() {
            self.history[self.write_pos] = sample;
            self.write_pos = (self.write_pos + 1) % FFT_SIZE;
            self.samples_since_fft += 1;
        }

        if self.samples_since_fft < self.samples_per_fft {
            return false;
        }
        self.samples_since_fft = 0;

        for i in 0..FFT_SIZE {
            // Oldest sample first
            let sample = self.history[(self.write_pos + i) % FFT_SIZE];
            self.fft_buffer[i] = Complex::new(sample * self.window[i], 0.0);
        }
        self.fft.process(&mut self.fft_buffer);

        compute_log_spectrum(&self.fft_buffer, &mut self.spectrum);

        // Asymmetric attack/decay: snappy rise, smooth falloff
        for (smoothed, &raw) in self.smoothed.iter_mut().zip(self.spectrum.iter()) {
            if raw > *smoothed {
                *smoothed += (raw - *smoothed) * SPECTRUM_ATTACK;
            } else {
                *smoothed = *smoothed * SPECTRUM_DECAY + raw * (1.0 - SPECTRUM_DECAY);
            }
        }

        true
    }

    /// Smoothed spectrum in dB, floored at [`NEGATIVE_INFINITY_DB`]
    pub fn spectrum_db(&self) -> [f32; NUM_BINS] {
        self.smoothed
    }

    /// Unsmoothed spectrum of the last FFT frame
    pub fn raw_spectrum_db(&self) -> [f32; NUM_BINS] {
        self.spectrum
    }

    /// Centre frequency (Hz) of an output bin
    pub fn bin_frequency(&self, bin: usize) -> f32 {
        let (start, end) = bin_range(bin);
        let centre = (start as f32 * end as f32).sqrt();
        centre * self.sample_rate / FFT_SIZE as f32
    }

    /// Drop buffered audio and clear the display
    pub fn reset(&mut self) {
        while self.consumer.pop().is_ok() {}
        self.history.fill(0.0);
        self.write_pos = 0;
        self.samples_since_fft = 0;
        self.spectrum = [NEGATIVE_INFINITY_DB; NUM_BINS];
        self.smoothed = [NEGATIVE_INFINITY_DB; NUM_BINS];
    }
}

/// FFT bin range [start, end] covered by output bin `i`
fn bin_range(i: usize) -> (usize, usize) {
    let nyquist = FFT_SIZE / 2;
    let log_min = 1.0_f32.ln(); // skip DC
    let log_max = (nyquist as f32).ln();
    let log_step = (log_max - log_min) / NUM_BINS as f32;

    let start = (log_min + i as f32 * log_step).exp() as usize;
    let end = ((log_min + (i + 1) as f32 * log_step).exp() as usize).min(nyquist - 1);
    (start.max(1), end.max(start.max(1)))
}

/// Convert FFT output to logarithmically-spaced dB bins
fn compute_log_spectrum(fft_output: &[Complex<f32>], spectrum: &mut [f32; NUM_BINS]) {
    // A full-scale sine through a Hann window peaks at about FFT_SIZE / 4
    let reference_magnitude = FFT_SIZE as f32 / 4.0;

    for (i, bin) in spectrum.iter_mut().enumerate() {
        let (start, end) = bin_range(i);
        let peak = fft_output[start..=end]
            .iter()
            .map(|c| c.norm())
            .fold(0.0_f32, f32::max);

        let db = 20.0 * (peak / reference_magnitude).max(1e-10).log10();
        *bin = db.max(NEGATIVE_INFINITY_DB);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sine(freq: f32, sample_rate: f32, i: usize) -> f32 {
        (2.0 * std::f32::consts::PI * freq * i as f32 / sample_rate).sin()
    }

    #[test]
    fn test_analyzer_starts_silent() {
        let (_tap, analyzer) = analyzer_channel(48000.0, 30, 8192);
        assert!(analyzer.spectrum_db().iter().all(|&db| db == NEGATIVE_INFINITY_DB));
    }

    #[test]
    fn test_no_update_without_audio() {
        let (_tap, mut analyzer) = analyzer_channel(48000.0, 30, 8192);
        assert!(!analyzer.update());
    }

    #[test]
    fn test_sine_shows_up_in_its_bin() {
        let (mut tap, mut analyzer) = analyzer_channel(48000.0, 30, 8192);

        for i in 0..FFT_SIZE * 2 {
            let s = sine(1000.0, 48000.0, i) * 0.5;
            tap.push_sample(s, s);
        }
        assert!(analyzer.update(), "Spectrum should have been updated");

        let raw = analyzer.raw_spectrum_db();
        let loudest = (0..NUM_BINS)
            .max_by(|&a, &b| raw[a].partial_cmp(&raw[b]).unwrap())
            .unwrap();
        let freq = analyzer.bin_frequency(loudest);
        assert!(freq > 500.0 && freq < 2000.0, "loudest bin at {}Hz", freq);

        // -6dB sine should read roughly -6dB
        assert!((raw[loudest] + 6.0).abs() < 3.0, "level {}dB", raw[loudest]);
    }

    #[test]
    fn test_full_ring_drops_samples() {
        let (mut tap, _analyzer) = analyzer_channel(48000.0, 30, 16);
        for _ in 0..100 {
            tap.push_sample(1.0, 1.0);
        }
        assert_eq!(tap.slots(), 0);
    }

    #[test]
    fn test_reset() {
        let (mut tap, mut analyzer) = analyzer_channel(48000.0, 30, 8192);
        let block: Vec<f32> = (0..FFT_SIZE * 2).map(|i| sine(440.0, 48000.0, i / 2)).collect();
        tap.push_interleaved(&block);
        analyzer.update();

        analyzer.reset();
        assert!(analyzer.spectrum_db().iter().all(|&db| db == NEGATIVE_INFINITY_DB));
        assert!(!analyzer.update());
    }

    #[test]
    fn test_hann_window() {
        assert!(hann_window(0, FFT_SIZE) < 0.01, "Window should be ~0 at start");
        assert!(hann_window(FFT_SIZE - 1, FFT_SIZE) < 0.01, "Window should be ~0 at end");
        assert!((hann_window(FFT_SIZE / 2, FFT_SIZE) - 1.0).abs() < 0.01);
    }

    #[test]
    fn test_bin_ranges_cover_spectrum() {
        let (first, _) = bin_range(0);
        let (_, last) = bin_range(NUM_BINS - 1);
        assert_eq!(first, 1);
        assert_eq!(last, FFT_SIZE / 2 - 1);
        for i in 0..NUM_BINS {
            let (s, e) = bin_range(i);
            assert!(s <= e);
        }
    }
}
