//! Sliding window holding recent output.
//!
//! Bytes are decoded at `pos` and handed to the caller from `written` up to
//! `pos`. Once `pos` reaches `size` the window wraps; writes may overshoot
//! `size` by up to [`SLACK`] bytes, and that overflow is moved to the front
//! when the window wraps.

use alloc::vec;
use alloc::vec::Vec;

use crate::transform::MAX_TRANSFORMED_WORD_LENGTH;

// --- Constants ---

/// Room past the end for one dictionary word written without a bounds check.
pub(crate) const SLACK: usize = MAX_TRANSFORMED_WORD_LENGTH;

/// Smallest window allocated while more meta-blocks may follow.
const MIN_SIZE: usize = 1 << 14;

/// Cap on the running output estimate used for sizing.
const MAX_EXPECTED_TOTAL: usize = 1 << 30;

#[derive(Debug, Default)]
pub(crate) struct RingBuffer {
    pub(crate) buffer: Vec<u8>,
    /// Power of two, or zero before the first allocation.
    pub(crate) size: usize,
    /// `1 << window_bits`.
    max_size: usize,
    expected_total: usize,
    pub(crate) pos: usize,
    /// Bytes up to here have been handed to the caller.
    written: usize,
    /// Bytes up to here may be handed to the caller.
    ready: usize,
}

impl RingBuffer {
    pub(crate) fn set_window(&mut self, window_bits: u32) {
        self.max_size = 1 << window_bits;
    }

    #[inline]
    pub(crate) fn mask(&self) -> usize {
        self.size.wrapping_sub(1)
    }

    /// Byte `back` positions before `pos`.
    #[inline]
    pub(crate) fn byte_before(&self, back: usize) -> u8 {
        self.buffer[self.pos.wrapping_sub(back) & self.mask()]
    }

    pub(crate) fn written(&self) -> usize {
        self.written
    }

    /// Accounts for a meta-block of `length` bytes and grows the window if
    /// the output seen so far no longer fits.
    pub(crate) fn reserve_for_metablock(&mut self, length: usize, is_last: bool) {
        self.expected_total = (self.expected_total + length).min(MAX_EXPECTED_TOTAL);

        let mut new_size = self.max_size;
        if new_size > self.expected_total {
            while new_size >> 1 > self.expected_total {
                new_size >>= 1;
            }
            if !is_last && new_size < MIN_SIZE && self.max_size >= MIN_SIZE {
                new_size = MIN_SIZE;
            }
        }
        if new_size <= self.size {
            return;
        }

        let mut buffer = vec![0u8; new_size + SLACK];
        buffer[..self.size].copy_from_slice(&self.buffer[..self.size]);
        log::debug!("ring buffer resized {} -> {} bytes", self.size, new_size);
        self.buffer = buffer;
        self.size = new_size;
    }

    /// Marks everything decoded so far as ready for output.
    pub(crate) fn mark_ready(&mut self) {
        self.ready = self.pos.min(self.size);
    }

    /// Copies ready bytes into `out`, returning how many were copied.
    pub(crate) fn drain_into(&mut self, out: &mut [u8]) -> usize {
        let n = (self.ready - self.written).min(out.len());
        out[..n].copy_from_slice(&self.buffer[self.written..self.written + n]);
        self.written += n;
        n
    }

    pub(crate) fn has_pending_output(&self) -> bool {
        self.written < self.ready
    }

    /// Moves the overflow past `size` to the front once the window is full.
    pub(crate) fn wrap_if_full(&mut self) {
        if self.size == 0 || self.pos < self.size {
            return;
        }
        if self.pos > self.size {
            self.buffer.copy_within(self.size..self.pos, 0);
        }
        self.pos &= self.mask();
        self.written = 0;
    }

    pub(crate) fn release(&mut self) {
        *self = Self::default();
    }
}
