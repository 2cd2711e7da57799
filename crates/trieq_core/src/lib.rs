//! trieq Core - Plugin Glue
//!
//! This crate connects the DSP chain to a plugin host:
//! - Host-automatable parameters in a lock-free store
//! - Control thread that designs coefficients when parameters change
//! - Lock-free coefficient swaps into the audio thread
//! - Editor model (response curve + spectrum analyzer)
//! - Plugin state save/restore
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                  Host / Editor Thread                       │
//! │   automation ──▶ ParameterStore ◀── editor controls         │
//! └─────────────────────────────────────────────────────────────┘
//!                              │ generation counter
//!                              ▼
//! ┌─────────────────────────────────────────────────────────────┐
//! │                     Control Thread                          │
//! │   snapshot ──▶ design_chain ──▶ UpdatePublisher (collector) │
//! └─────────────────────────────────────────────────────────────┘
//!                              │ rtrb
//!                              ▼
//! ┌─────────────────────────────────────────────────────────────┐
//! │                      Audio Thread                           │
//! │   apply_pending ──▶ Equalizer ──▶ AnalyzerTap ──rtrb──▶ UI  │
//! │              (Zero allocation in this path)                 │
//! └─────────────────────────────────────────────────────────────┘
//! ```

mod config;
mod controller;
mod editor;
mod error;
mod params;
mod plugin;
mod update;

pub use config::{PluginConfig, StreamConfig};
pub use controller::{ChainController, ControlCommand, ControlThread};
pub use editor::ResponseCurveModel;
pub use error::{PluginError, PluginResult};
pub use params::{
    chain_settings, ParamId, ParamRange, ParamInfo, ParameterStore, PARAM_COUNT, SLOPE_CHOICES,
};
pub use plugin::{EqPlugin, EqProcessor};
pub use update::{update_queue, ChainUpdate, UpdatePublisher, UpdateReceiver};

// Re-export DSP types for convenience
pub use trieq_dsp::{ChainSettings, Equalizer, Slope};

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_crate_exports() {
        // Verify public API is accessible
        let _config = PluginConfig::default();
        let store = ParameterStore::new();
        assert_eq!(chain_settings(&store), ChainSettings::default());
    }

    #[test]
    fn test_end_to_end_peak_example() {
        // Peak 1kHz, +6dB, Q 1 at 48kHz, cut filters at their defaults
        let mut plugin = EqPlugin::new(PluginConfig::default()).unwrap();
        plugin.params().set(ParamId::PeakFreq, 1000.0);
        plugin.params().set(ParamId::PeakGain, 6.0);
        plugin.params().set(ParamId::PeakQuality, 1.0);

        let processor = plugin.prepare(48000.0, 512).unwrap();
        let chain = processor.equalizer().left();
        assert!((chain.magnitude_db(1000.0, 48000.0) - 6.0).abs() < 0.1);
        assert_eq!(chain.low_cut().active_stages(), 1);
        assert_eq!(chain.high_cut().active_stages(), 1);
    }
}
