//! Control Thread
//!
//! Watches the parameter store and, whenever its generation moves, designs a
//! new set of coefficients and publishes it to the audio thread. Designing
//! allocates, so it never happens on the audio thread.
//!
//! ```text
//! ParameterStore ──generation──► ChainController::tick ──► UpdatePublisher
//!       ▲                                 ▲
//!  host / editor                 ControlThread (recv_timeout loop)
//! ```

use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

use crossbeam_channel::{bounded, RecvTimeoutError, Sender};
use tracing::{debug, info, trace, warn};
use trieq_dsp::design_chain;

use crate::error::{PluginError, PluginResult};
use crate::params::{chain_settings, ParameterStore};
use crate::update::{ChainUpdate, UpdatePublisher};

/// Commands sent to the control thread
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ControlCommand {
    /// Re-check the parameter store now instead of waiting for the next tick
    Refresh,
    /// Stop the thread
    Shutdown,
}

/// Turns parameter changes into published chain updates
pub struct ChainController {
    store: Arc<ParameterStore>,
    publisher: UpdatePublisher,
    sample_rate: f32,
    /// Generation the last design attempt was made from
    last_generation: Option<u64>,
}

impl ChainController {
    pub fn new(store: Arc<ParameterStore>, publisher: UpdatePublisher, sample_rate: f32) -> Self {
        Self {
            store,
            publisher,
            sample_rate,
            last_generation: None,
        }
    }

    /// Mark the current parameter values as already published
    ///
    /// Used when the audio side was primed with these values directly.
    pub fn mark_published(&mut self, generation: u64) {
        self.last_generation = Some(generation);
    }

    /// One control-rate step
    ///
    /// Retries any parked update, frees handles the audio thread released,
    /// and designs + publishes a new chain if parameters changed.
    /// Returns `true` if a new update was published.
    pub fn tick(&mut self) -> bool {
        self.publisher.flush();
        let freed = self.publisher.collect();
        if freed > 0 {
            trace!("Released {} coefficient handles", freed);
        }

        // Generation first: a write racing with the snapshot below is
        // picked up on the next tick
        let generation = self.store.generation();
        if self.last_generation == Some(generation) {
            return false;
        }
        self.last_generation = Some(generation);

        let settings = chain_settings(&self.store);
        match design_chain(&settings, self.sample_rate) {
            Ok(coefficients) => {
                let queued = self.publisher.publish(ChainUpdate {
                    settings,
                    coefficients,
                });
                if !queued {
                    debug!("Audio thread behind, update parked");
                }
                true
            }
            Err(e) => {
                // Audio keeps running with the previous coefficients
                warn!("Coefficient design failed, keeping previous chain: {}", e);
                false
            }
        }
    }

    pub fn publisher(&self) -> &UpdatePublisher {
        &self.publisher
    }

    pub fn sample_rate(&self) -> f32 {
        self.sample_rate
    }
}

/// Background thread running a [`ChainController`] at the control rate
pub struct ControlThread {
    command_sender: Sender<ControlCommand>,
    handle: Option<JoinHandle<()>>,
}

impl ControlThread {
    /// Spawn the control thread
    pub fn spawn(mut controller: ChainController, rate_hz: u32) -> PluginResult<Self> {
        let (command_sender, command_receiver) = bounded::<ControlCommand>(16);
        let interval = Duration::from_secs_f64(1.0 / rate_hz.max(1) as f64);

        let handle = thread::Builder::new()
            .name("trieq-control".into())
            .spawn(move || {
                info!(
                    "Control thread started ({}Hz, {}Hz sample rate)",
                    rate_hz,
                    controller.sample_rate()
                );
                loop {
                    match command_receiver.recv_timeout(interval) {
                        Ok(ControlCommand::Refresh) | Err(RecvTimeoutError::Timeout) => {
                            controller.tick();
                        }
                        Ok(ControlCommand::Shutdown) | Err(RecvTimeoutError::Disconnected) => {
                            break;
                        }
                    }
                }
                info!("Control thread stopped");
            })
            .map_err(|e| PluginError::ThreadSpawnError(e.to_string()))?;

        Ok(Self {
            command_sender,
            handle: Some(handle),
        })
    }

    /// Ask the thread to check for changes immediately
    pub fn refresh(&self) {
        let _ = self.command_sender.try_send(ControlCommand::Refresh);
    }

    /// Stop and join the thread
    pub fn stop(&mut self) {
        let _ = self.command_sender.send(ControlCommand::Shutdown);
        if let Some(handle) = self.handle.take() {
            if handle.join().is_err() {
                warn!("Control thread panicked");
            }
        }
    }

    pub fn is_running(&self) -> bool {
        self.handle.as_ref().is_some_and(|h| !h.is_finished())
    }
}

impl Drop for ControlThread {
    fn drop(&mut self) {
        self.stop();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::params::ParamId;
    use crate::update::update_queue;
    use std::time::Instant;
    use trieq_dsp::Equalizer;

    const SAMPLE_RATE: f32 = 48000.0;

    #[test]
    fn test_tick_publishes_only_on_change() {
        let store = Arc::new(ParameterStore::new());
        let (publisher, mut receiver) = update_queue(4);
        let mut controller = ChainController::new(Arc::clone(&store), publisher, SAMPLE_RATE);
        let mut eq = Equalizer::new(SAMPLE_RATE);

        // First tick always publishes the initial state
        assert!(controller.tick());
        assert!(!controller.tick());
        assert_eq!(receiver.apply_pending(&mut eq), 1);

        store.set(ParamId::PeakGain, 6.0);
        assert!(controller.tick());
        assert!(!controller.tick());
        receiver.apply_pending(&mut eq);
        assert_eq!(eq.settings().peak_gain_db, 6.0);
    }

    #[test]
    fn test_mark_published_skips_initial_design() {
        let store = Arc::new(ParameterStore::new());
        let (publisher, _receiver) = update_queue(4);
        let mut controller = ChainController::new(Arc::clone(&store), publisher, SAMPLE_RATE);

        controller.mark_published(store.generation());
        assert!(!controller.tick());
        assert_eq!(controller.publisher().pending(), 0);
    }

    #[test]
    fn test_design_failure_keeps_previous_chain() {
        let store = Arc::new(ParameterStore::new());
        let (publisher, mut receiver) = update_queue(4);
        // Invalid sample rate: every design fails
        let mut controller = ChainController::new(Arc::clone(&store), publisher, 0.0);
        let mut eq = Equalizer::new(SAMPLE_RATE);

        store.set(ParamId::PeakGain, 6.0);
        assert!(!controller.tick());
        assert_eq!(receiver.apply_pending(&mut eq), 0);
        assert_eq!(eq.settings().peak_gain_db, 0.0);
    }

    #[test]
    fn test_control_thread_delivers_updates() {
        let store = Arc::new(ParameterStore::new());
        let (publisher, mut receiver) = update_queue(4);
        let controller = ChainController::new(Arc::clone(&store), publisher, SAMPLE_RATE);
        let mut control = ControlThread::spawn(controller, 200).unwrap();
        assert!(control.is_running());

        store.set(ParamId::PeakFreq, 2000.0);
        store.set(ParamId::PeakGain, -9.0);
        control.refresh();

        let mut eq = Equalizer::new(SAMPLE_RATE);
        let deadline = Instant::now() + Duration::from_secs(5);
        while eq.settings().peak_gain_db != -9.0 && Instant::now() < deadline {
            receiver.apply_pending(&mut eq);
            thread::sleep(Duration::from_millis(1));
        }
        assert_eq!(eq.settings().peak_gain_db, -9.0);
        assert!((eq.left().magnitude_db(2000.0, SAMPLE_RATE as f64) + 9.0).abs() < 0.1);

        control.stop();
        assert!(!control.is_running());
    }
}
