//! Control -> Audio Chain Updates
//!
//! Freshly designed coefficients travel to the audio thread through a
//! wait-free SPSC ring (`rtrb`). The audio thread only swaps `Arc` handles,
//! which means it only ever *decrements* reference counts: the publisher
//! keeps a clone of every handle it has sent, and [`UpdatePublisher::collect`]
//! releases them on the control thread once the audio side has let go.
//!
//! The retained list is shared with the receiver, so it outlives the
//! publisher: after the control thread stops, updates still in the ring can
//! be applied without the audio thread freeing what they replace.
//!
//! ```text
//! Control thread                          Audio thread
//! ┌──────────────────┐   ChainUpdate    ┌──────────────────┐
//! │ UpdatePublisher  │ ───── rtrb ────► │ UpdateReceiver   │
//! │  retained: Vec   │                  │  apply_pending() │
//! │  collect()       │                  │  Equalizer       │
//! └──────────────────┘                  └──────────────────┘
//! ```

use std::sync::Arc;

use parking_lot::Mutex;
use rtrb::{Consumer, Producer, PushError, RingBuffer};
use tracing::trace;
use trieq_dsp::{ChainCoefficients, ChainPosition, ChainSettings, Equalizer, SharedCoefficients, MAX_CUT_STAGES};

/// A complete, consistent chain configuration
///
/// Either all of it reaches the audio thread or none of it does.
#[derive(Debug, Clone)]
pub struct ChainUpdate {
    pub settings: ChainSettings,
    pub coefficients: ChainCoefficients,
}

/// Every handle ever published that the audio side might still hold
///
/// Locked on the control thread only.
type Retained = Arc<Mutex<Vec<SharedCoefficients>>>;

/// Create a connected publisher/receiver pair
pub fn update_queue(capacity: usize) -> (UpdatePublisher, UpdateReceiver) {
    let (producer, consumer) = RingBuffer::new(capacity.max(1));
    let retained: Retained = Arc::new(Mutex::new(Vec::new()));
    (
        UpdatePublisher {
            producer,
            parked: None,
            retained: Arc::clone(&retained),
        },
        UpdateReceiver {
            consumer,
            _retained: retained,
        },
    )
}

/// Control-side end of the update queue
pub struct UpdatePublisher {
    producer: Producer<ChainUpdate>,
    /// Newest update that did not fit; retried on the next flush
    parked: Option<ChainUpdate>,
    retained: Retained,
}

impl UpdatePublisher {
    /// Send an update to the audio thread
    ///
    /// Returns `true` if it was enqueued. When the ring is full the update
    /// is parked instead, replacing any older parked update, and goes out on
    /// the next [`flush`](Self::flush).
    pub fn publish(&mut self, update: ChainUpdate) -> bool {
        self.retained
            .lock()
            .extend(update.coefficients.handles().map(Arc::clone));

        // Older parked state is superseded by this one
        self.parked = None;
        match self.producer.push(update) {
            Ok(()) => true,
            Err(PushError::Full(update)) => {
                trace!("Update queue full, parking newest update");
                self.parked = Some(update);
                false
            }
        }
    }

    /// Retry a parked update; returns `true` if nothing is left parked
    pub fn flush(&mut self) -> bool {
        let Some(update) = self.parked.take() else {
            return true;
        };
        match self.producer.push(update) {
            Ok(()) => true,
            Err(PushError::Full(update)) => {
                self.parked = Some(update);
                false
            }
        }
    }

    /// Take ownership of the handles an equalizer was built with
    ///
    /// Call once before handing the equalizer to the audio thread so that
    /// the handles it starts with are released here rather than there.
    /// Handles shared between the channels are retained once.
    pub fn adopt(&mut self, equalizer: &Equalizer) {
        let mut retained = self.retained.lock();
        for chain in [equalizer.left(), equalizer.right()] {
            for position in ChainPosition::ALL {
                for index in 0..MAX_CUT_STAGES {
                    if let Some(stage) = chain.stage(position, index) {
                        let handle = stage.coefficients();
                        if !retained.iter().any(|kept| Arc::ptr_eq(kept, handle)) {
                            retained.push(Arc::clone(handle));
                        }
                    }
                }
            }
        }
    }

    /// Release handles nobody but the publisher holds any more
    ///
    /// Returns the number of handles freed.
    pub fn collect(&mut self) -> usize {
        let mut retained = self.retained.lock();
        let before = retained.len();
        retained.retain(|handle| Arc::strong_count(handle) > 1);
        before - retained.len()
    }

    /// Updates enqueued but not yet consumed by the audio thread
    pub fn pending(&self) -> usize {
        self.producer.buffer().capacity() - self.producer.slots()
    }

    pub fn has_parked(&self) -> bool {
        self.parked.is_some()
    }

    /// Handles currently kept alive by the publisher
    pub fn retained(&self) -> usize {
        self.retained.lock().len()
    }
}

/// Audio-side end of the update queue
pub struct UpdateReceiver {
    consumer: Consumer<ChainUpdate>,
    /// Held, never locked: keeps replaced handles alive past the publisher
    _retained: Retained,
}

impl UpdateReceiver {
    /// Drain the queue and apply the newest update, if any
    ///
    /// Returns the number of updates drained. Older updates are skipped.
    ///
    /// # Real-time Safety
    /// No allocation, no locks, no frees: every handle dropped here is
    /// still in the retained list, even once the publisher is gone.
    #[inline]
    pub fn apply_pending(&mut self, equalizer: &mut Equalizer) -> usize {
        let mut drained = 0;
        let mut latest = None;
        while let Ok(update) = self.consumer.pop() {
            latest = Some(update);
            drained += 1;
        }

        if let Some(update) = latest {
            equalizer.apply(&update.settings, &update.coefficients);
        }
        drained
    }

    /// Whether the control side has gone away
    pub fn is_abandoned(&self) -> bool {
        self.consumer.is_abandoned()
    }
}
