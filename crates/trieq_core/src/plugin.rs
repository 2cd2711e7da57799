//! Plugin Host Glue
//!
//! [`EqPlugin`] is what a plugin wrapper holds on its main thread. Preparing
//! it hands out an [`EqProcessor`], the only object the audio callback
//! touches:
//!
//! ```text
//! Host main thread            Control thread             Audio thread
//! ┌──────────────┐           ┌────────────────┐        ┌─────────────────┐
//! │ EqPlugin     │──spawn──► │ ChainController│─rtrb──►│ EqProcessor     │
//! │  params ─────┼──Arc────► │  tick()        │        │  Equalizer      │
//! │  editor()    │           └────────────────┘        │  AnalyzerTap ───┼─┐
//! │  analyzer ◄──┼──────────────── rtrb ───────────────┼─────────────────┘ │
//! └──────────────┘                                      └─────────────────┘
//! ```

use std::sync::Arc;

use parking_lot::Mutex;
use tracing::{debug, info};
use trieq_dsp::{
    analyzer_channel, design_chain, AnalyzerTap, AudioProcessor, Equalizer, ProcessContext,
    SpectrumAnalyzer,
};

use crate::config::{PluginConfig, StreamConfig};
use crate::controller::{ChainController, ControlThread};
use crate::editor::ResponseCurveModel;
use crate::error::{PluginError, PluginResult};
use crate::params::{chain_settings, ParamId, ParameterStore};
use crate::update::{update_queue, UpdateReceiver};

/// Plugin instance (main-thread side)
pub struct EqPlugin {
    params: Arc<ParameterStore>,
    config: PluginConfig,
    /// Set between `prepare` and `release`
    analyzer: Option<Arc<Mutex<SpectrumAnalyzer>>>,
    control: Option<ControlThread>,
    /// Exact rate passed to `prepare` (the stream config keeps whole Hz)
    sample_rate: Option<f32>,
}

impl EqPlugin {
    /// Create a plugin with the given configuration
    pub fn new(config: PluginConfig) -> PluginResult<Self> {
        config.validate()?;
        Ok(Self {
            params: Arc::new(ParameterStore::new()),
            config,
            analyzer: None,
            control: None,
            sample_rate: None,
        })
    }

    /// Shared parameter store (host automation and editor controls write here)
    pub fn params(&self) -> &Arc<ParameterStore> {
        &self.params
    }

    pub fn config(&self) -> &PluginConfig {
        &self.config
    }

    pub fn is_prepared(&self) -> bool {
        self.control.is_some()
    }

    /// Get ready to play at `sample_rate`
    ///
    /// Designs the initial chain synchronously so the very first block is
    /// already filtered, then starts the control thread. Calling it again
    /// (sample rate change) releases the previous processor's resources first.
    pub fn prepare(&mut self, sample_rate: f32, max_block_size: usize) -> PluginResult<EqProcessor> {
        if self.is_prepared() {
            debug!("Re-preparing, releasing previous resources");
            self.release();
        }

        let stream = StreamConfig {
            sample_rate: sample_rate as u32,
            max_block_size: max_block_size as u32,
            ..self.config.stream.clone()
        };
        stream.validate()?;
        self.config.stream = stream;

        let generation = self.params.generation();
        let settings = chain_settings(&self.params);
        let coefficients = design_chain(&settings, sample_rate)?;

        let mut equalizer = Equalizer::new(sample_rate);
        equalizer.apply(&settings, &coefficients);

        let (mut publisher, receiver) = update_queue(self.config.update_queue_capacity);
        publisher.adopt(&equalizer);

        let mut controller = ChainController::new(Arc::clone(&self.params), publisher, sample_rate);
        controller.mark_published(generation);
        let control = ControlThread::spawn(controller, self.config.control_rate_hz)?;

        let (tap, analyzer) = analyzer_channel(
            sample_rate,
            self.config.analyzer_fps,
            self.config.analyzer_capacity,
        );

        self.analyzer = Some(Arc::new(Mutex::new(analyzer)));
        self.control = Some(control);
        self.sample_rate = Some(sample_rate);

        info!(
            "Prepared at {}Hz, max block {} ({:.1}ms)",
            sample_rate,
            max_block_size,
            self.config.stream.latency_ms()
        );

        Ok(EqProcessor {
            equalizer,
            receiver,
            tap,
            params: Arc::clone(&self.params),
            context: ProcessContext::new(sample_rate, 2, max_block_size),
        })
    }

    /// Playback stopped: stop the control thread and drop the analyzer
    ///
    /// Coefficient handles the processor swapped out stay alive in its
    /// receiver, so a processor still running after this never frees them.
    pub fn release(&mut self) {
        if let Some(mut control) = self.control.take() {
            control.stop();
            info!("Released");
        }
        self.analyzer = None;
        self.sample_rate = None;
    }

    /// Create the editor-side model
    pub fn editor(&self) -> PluginResult<ResponseCurveModel> {
        let analyzer = self.analyzer.as_ref().ok_or(PluginError::NotPrepared)?;
        let sample_rate = self.sample_rate.ok_or(PluginError::NotPrepared)?;
        Ok(ResponseCurveModel::new(
            Arc::clone(&self.params),
            Arc::clone(analyzer),
            sample_rate,
            self.config.response_points,
        ))
    }

    /// Serialize parameters for the host session
    pub fn save_state(&self) -> PluginResult<Vec<u8>> {
        self.params.save_state()
    }

    /// Restore parameters from the host session
    pub fn load_state(&self, data: &[u8]) -> PluginResult<()> {
        self.params.load_state(data)?;
        if let Some(control) = &self.control {
            control.refresh();
        }
        debug!("Plugin state loaded");
        Ok(())
    }
}

impl Drop for EqPlugin {
    fn drop(&mut self) {
        self.release();
    }
}

/// Audio-thread side of a prepared plugin
///
/// # Real-time Safety
/// `process_block` and `process_planar` never allocate, lock or free.
pub struct EqProcessor {
    equalizer: Equalizer,
    receiver: UpdateReceiver,
    tap: AnalyzerTap,
    params: Arc<ParameterStore>,
    context: ProcessContext,
}

impl EqProcessor {
    /// Process an interleaved stereo block in place
    pub fn process_block(&mut self, buffer: &mut [f32]) {
        self.receiver.apply_pending(&mut self.equalizer);
        self.equalizer.process_interleaved(buffer);

        if self.params.get_bool(ParamId::AnalyzerEnabled) {
            self.tap.push_interleaved(buffer);
        }
    }

    /// Process separate left/right buffers in place
    pub fn process_planar(&mut self, left: &mut [f32], right: &mut [f32]) {
        self.receiver.apply_pending(&mut self.equalizer);
        self.equalizer.process_planar(left, right);

        if self.params.get_bool(ParamId::AnalyzerEnabled) {
            for (&l, &r) in left.iter().zip(right.iter()) {
                self.tap.push_sample(l, r);
            }
        }
    }

    /// Read-only view of the running equalizer
    pub fn equalizer(&self) -> &Equalizer {
        &self.equalizer
    }

    pub fn context(&self) -> &ProcessContext {
        &self.context
    }
}

impl AudioProcessor for EqProcessor {
    fn process(&mut self, buffer: &mut [f32], _context: &ProcessContext) {
        self.process_block(buffer);
    }

    fn reset(&mut self) {
        self.equalizer.reset();
    }

    fn name(&self) -> &'static str {
        "trieq"
    }

    fn is_enabled(&self) -> bool {
        self.equalizer.is_enabled()
    }
}
