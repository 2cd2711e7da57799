//! trieq CLI
//!
//! Headless host for the equalizer: sets parameters, prepares the plugin,
//! pushes test tones through the real-time path and prints the response.

use std::collections::BTreeMap;

use anyhow::Result;
use clap::Parser;
use serde::Serialize;
use tracing::{debug, info};
use tracing_subscriber::EnvFilter;
use trieq_core::{EqPlugin, EqProcessor, ParamId, PluginConfig, ResponseCurveModel};
use trieq_dsp::{gain_to_decibels, AudioProcessor, Slope, NEGATIVE_INFINITY_DB};

/// Frames per processing block
const BLOCK_SIZE: usize = 512;

#[derive(Parser)]
#[command(name = "trieq")]
#[command(about = "Three-band equalizer: low cut, peak, high cut", long_about = None)]
struct Cli {
    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,

    /// Sample rate in Hz
    #[arg(long, default_value_t = 48000)]
    sample_rate: u32,

    /// Peak band centre frequency (Hz)
    #[arg(long)]
    peak_freq: Option<f32>,

    /// Peak band gain (dB)
    #[arg(long, allow_hyphen_values = true)]
    peak_gain: Option<f32>,

    /// Peak band quality
    #[arg(long)]
    peak_q: Option<f32>,

    /// Low cut frequency (Hz)
    #[arg(long)]
    low_cut: Option<f32>,

    /// High cut frequency (Hz)
    #[arg(long)]
    high_cut: Option<f32>,

    /// Low cut slope in dB/oct (12, 24, 36, 48)
    #[arg(long, value_parser = parse_slope)]
    low_cut_slope: Option<Slope>,

    /// High cut slope in dB/oct (12, 24, 36, 48)
    #[arg(long, value_parser = parse_slope)]
    high_cut_slope: Option<Slope>,

    #[arg(long)]
    bypass_low_cut: bool,

    #[arg(long)]
    bypass_peak: bool,

    #[arg(long)]
    bypass_high_cut: bool,

    /// Frequencies to measure with a test tone (Hz)
    #[arg(long, value_delimiter = ',', default_values_t = vec![50.0, 1000.0, 10000.0])]
    probe: Vec<f32>,

    /// Number of response curve points to print
    #[arg(long, default_value_t = 24)]
    points: usize,

    /// Print the report as JSON
    #[arg(long)]
    json: bool,
}

fn parse_slope(value: &str) -> Result<Slope, String> {
    let db: usize = value
        .trim_end_matches("db/Oct")
        .trim()
        .parse()
        .map_err(|_| format!("'{}' is not a slope", value))?;
    Slope::ALL
        .iter()
        .copied()
        .find(|slope| slope.db_per_octave() as usize == db)
        .ok_or_else(|| format!("slope must be 12, 24, 36 or 48 (got {})", db))
}

#[derive(Serialize)]
struct CurvePoint {
    frequency: f64,
    db: f64,
}

#[derive(Serialize)]
struct Probe {
    frequency: f32,
    predicted_db: f64,
    measured_db: f64,
}

#[derive(Serialize)]
struct Report {
    sample_rate: u32,
    parameters: BTreeMap<&'static str, f32>,
    curve: Vec<CurvePoint>,
    probes: Vec<Probe>,
    /// Loudest analyzer bin after the last probe (Hz)
    analyzer_peak: Option<f32>,
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let level = if cli.verbose { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(format!("trieq_core={level},trieq_cli={level}")));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    info!("trieq starting...");

    let mut plugin = EqPlugin::new(PluginConfig {
        response_points: cli.points.max(2),
        ..Default::default()
    })?;

    apply_arguments(&cli, &plugin);

    let mut processor = plugin.prepare(cli.sample_rate as f32, BLOCK_SIZE)?;
    let mut editor = plugin.editor()?;
    editor.refresh();

    let mut probes = Vec::with_capacity(cli.probe.len());
    for &freq in &cli.probe {
        probes.push(measure(&mut processor, &mut editor, freq, cli.sample_rate as f32));
    }

    let analyzer_peak = loudest_bin(&editor);

    let report = Report {
        sample_rate: cli.sample_rate,
        parameters: ParamId::ALL
            .iter()
            .map(|&id| (id.name(), plugin.params().get(id)))
            .collect(),
        curve: (0..editor.points())
            .map(|i| CurvePoint {
                frequency: editor.frequency(i),
                db: editor.magnitudes()[i],
            })
            .collect(),
        probes,
        analyzer_peak,
    };

    if cli.json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        print_report(&report);
    }

    plugin.release();
    Ok(())
}

/// Write command-line overrides into the parameter store
fn apply_arguments(cli: &Cli, plugin: &EqPlugin) {
    let params = plugin.params();
    let floats = [
        (ParamId::PeakFreq, cli.peak_freq),
        (ParamId::PeakGain, cli.peak_gain),
        (ParamId::PeakQuality, cli.peak_q),
        (ParamId::LowCutFreq, cli.low_cut),
        (ParamId::HighCutFreq, cli.high_cut),
        (ParamId::LowCutSlope, cli.low_cut_slope.map(|s| s.index() as f32)),
        (ParamId::HighCutSlope, cli.high_cut_slope.map(|s| s.index() as f32)),
    ];
    for (id, value) in floats {
        if let Some(value) = value {
            let stored = params.set(id, value);
            if stored != value {
                info!("{} adjusted to {}", id.name(), stored);
            }
        }
    }

    let toggles = [
        (ParamId::LowCutBypassed, cli.bypass_low_cut),
        (ParamId::PeakBypassed, cli.bypass_peak),
        (ParamId::HighCutBypassed, cli.bypass_high_cut),
    ];
    for (id, on) in toggles {
        if on {
            params.set(id, 1.0);
        }
    }
}

/// Play a one-second sine through the processor and compare output level
/// against what the editor's curve predicts
///
/// The editor is refreshed after every block, the way its UI timer would,
/// so the analyzer keeps up with the tap instead of overflowing.
fn measure(
    processor: &mut EqProcessor,
    editor: &mut ResponseCurveModel,
    frequency: f32,
    sample_rate: f32,
) -> Probe {
    processor.reset();

    let frames = sample_rate as usize;
    let mut phase = 0.0_f32;
    let step = 2.0 * std::f32::consts::PI * frequency / sample_rate;
    let mut block = vec![0.0_f32; BLOCK_SIZE * 2];
    let mut input_energy = 0.0_f64;
    let mut output_energy = 0.0_f64;

    for start in (0..frames).step_by(BLOCK_SIZE) {
        for frame in block.chunks_exact_mut(2) {
            let s = phase.sin() * 0.25;
            phase = (phase + step) % (2.0 * std::f32::consts::PI);
            frame[0] = s;
            frame[1] = s;
        }
        let dry: f64 = block.iter().step_by(2).map(|&s| (s as f64).powi(2)).sum();
        processor.process_block(&mut block);
        editor.refresh();

        // Skip the first half second so filter transients settle
        if start >= frames / 2 {
            input_energy += dry;
            output_energy += block.iter().step_by(2).map(|&s| (s as f64).powi(2)).sum::<f64>();
        }
    }

    let measured_db = gain_to_decibels((output_energy / input_energy.max(f64::MIN_POSITIVE)).sqrt());
    let predicted_db = editor
        .chain()
        .magnitude_db(frequency as f64, sample_rate as f64);
    debug!(
        "Probe {}Hz: predicted {:.2}dB, measured {:.2}dB",
        frequency, predicted_db, measured_db
    );

    Probe {
        frequency,
        predicted_db,
        measured_db,
    }
}

fn loudest_bin(editor: &ResponseCurveModel) -> Option<f32> {
    editor
        .spectrum()
        .iter()
        .enumerate()
        .filter(|(_, db)| **db > NEGATIVE_INFINITY_DB)
        .max_by(|a, b| a.1.total_cmp(b.1))
        .map(|(bin, _)| editor.spectrum_frequency(bin))
}

fn print_report(report: &Report) {
    println!("Sample rate: {} Hz", report.sample_rate);
    println!();
    println!("Parameters:");
    for (name, value) in &report.parameters {
        println!("  {:<18} {}", name, value);
    }

    println!();
    println!("Response curve:");
    for point in &report.curve {
        let bar_len = ((point.db + 48.0).max(0.0) / 2.0) as usize;
        println!(
            "  {:>8.1} Hz {:>8.2} dB  {}",
            point.frequency,
            point.db,
            "#".repeat(bar_len)
        );
    }

    println!();
    println!("Test tones:");
    for probe in &report.probes {
        println!(
            "  {:>8.1} Hz  predicted {:>8.2} dB  measured {:>8.2} dB",
            probe.frequency, probe.predicted_db, probe.measured_db
        );
    }

    if let Some(freq) = report.analyzer_peak {
        println!();
        println!("Analyzer peak: {:.0} Hz", freq);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE_RATE: f32 = 48000.0;

    #[test]
    fn test_parse_slope() {
        assert_eq!(parse_slope("24").unwrap(), Slope::Slope24);
        assert_eq!(parse_slope("48 db/Oct").unwrap(), Slope::Slope48);
        assert!(parse_slope("18").is_err());
        assert!(parse_slope("steep").is_err());
    }

    #[test]
    fn test_measure_matches_prediction() {
        let mut plugin = EqPlugin::new(PluginConfig::default()).unwrap();
        plugin.params().set(ParamId::PeakFreq, 1000.0);
        plugin.params().set(ParamId::PeakGain, 6.0);
        let mut processor = plugin.prepare(SAMPLE_RATE, BLOCK_SIZE).unwrap();
        let mut editor = plugin.editor().unwrap();

        let tone = measure(&mut processor, &mut editor, 1000.0, SAMPLE_RATE);
        assert!((tone.predicted_db - 6.0).abs() < 0.1);
        assert!((tone.measured_db - tone.predicted_db).abs() < 0.5);
    }

    #[test]
    fn test_analyzer_peak_follows_last_tone() {
        let mut plugin = EqPlugin::new(PluginConfig::default()).unwrap();
        let mut processor = plugin.prepare(SAMPLE_RATE, BLOCK_SIZE).unwrap();
        let mut editor = plugin.editor().unwrap();

        measure(&mut processor, &mut editor, 200.0, SAMPLE_RATE);
        measure(&mut processor, &mut editor, 10000.0, SAMPLE_RATE);

        let peak = loudest_bin(&editor).unwrap();
        assert!((8000.0..12000.0).contains(&peak), "analyzer peak at {}Hz", peak);
    }
}
