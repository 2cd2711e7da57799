//! Block Processing Contract
//!
//! What a host callback needs from anything that sits in the signal path.

/// Stream facts a block processor may need
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ProcessContext {
    pub sample_rate: f32,
    /// Always 2 for this equalizer
    pub channels: usize,
    /// Largest block, in frames, the host will send
    pub max_block_size: usize,
}

impl ProcessContext {
    pub fn new(sample_rate: f32, channels: usize, max_block_size: usize) -> Self {
        Self {
            sample_rate,
            channels,
            max_block_size,
        }
    }
}

/// Something the audio callback can run once per block
///
/// `process` runs on the audio thread: it must not allocate, lock, free
/// shared memory or block, and its cost must be linear in the block length.
pub trait AudioProcessor: Send {
    /// Filter an interleaved stereo block `[L0, R0, L1, R1, ...]` in place
    fn process(&mut self, buffer: &mut [f32], context: &ProcessContext);

    /// Clear filter memory, e.g. when the transport jumps
    fn reset(&mut self);

    fn name(&self) -> &'static str;

    fn is_enabled(&self) -> bool {
        true
    }
}

impl AudioProcessor for crate::Equalizer {
    fn process(&mut self, buffer: &mut [f32], context: &ProcessContext) {
        debug_assert_eq!(context.channels, 2, "Equalizer expects interleaved stereo");
        self.process_interleaved(buffer);
    }

    fn reset(&mut self) {
        crate::Equalizer::reset(self);
    }

    fn name(&self) -> &'static str {
        "Three-Band Equalizer"
    }

    fn is_enabled(&self) -> bool {
        crate::Equalizer::is_enabled(self)
    }
}
