//! LSB-first bit extraction over a refillable, word-packed input buffer.
//!
//! Bits are served from a 64-bit accumulator that is topped up 32 bits at a
//! time. Refilling the accumulator (`fill_bit_window`) and pulling new bytes
//! from the source (`ensure_input`) are both explicit; callers invoke them
//! before every read that needs them.

use alloc::vec;
use alloc::vec::Vec;

use crate::error::{DecodeError, Halt};
use crate::source::{ByteSource, ReadError};

// --- Constants ---

/// Bytes pulled from the source per refill round.
const CAPACITY: usize = 4096;

/// Refill once fewer than this many words remain ahead of the cursor. One
/// decode step between refill checks never consumes more than this.
const MIN_WORDS_AHEAD: usize = 9;

/// Zeroed words kept past the data so over-reads near the tail stay in bounds
/// until `check_health` reports them.
const SLACK_WORDS: usize = 16;

/// How far past the tail a reader may run before `ensure_input` rejects it.
const MAX_OVERRUN_WORDS: usize = 2;

type Result<T> = core::result::Result<T, DecodeError>;

/// Cursor snapshot used to rewind a partially parsed header.
#[derive(Debug, Clone, Copy)]
struct Mark {
    half_offset: usize,
    accumulator: u64,
    bit_offset: u32,
}

#[derive(Debug)]
pub(crate) struct BitReader<S> {
    source: Option<S>,
    bytes: Vec<u8>,
    words: Vec<u32>,
    /// Valid bytes at the front of `bytes`.
    filled: usize,
    /// Words that may be loaded into the accumulator.
    limit: usize,
    /// Index of the next word to load.
    half_offset: usize,
    accumulator: u64,
    /// Bits of the accumulator already consumed; 64 means empty.
    bit_offset: u32,
    end_of_stream: bool,
    tail_bytes: usize,
    mark: Option<Mark>,
}

impl<S> BitReader<S> {
    pub(crate) fn new() -> Self {
        Self {
            source: None,
            bytes: vec![0; CAPACITY],
            words: vec![0; CAPACITY / 4 + SLACK_WORDS],
            filled: 0,
            limit: 0,
            half_offset: 0,
            accumulator: 0,
            bit_offset: 64,
            end_of_stream: false,
            tail_bytes: 0,
            mark: None,
        }
    }

    pub(crate) fn attach(&mut self, source: S) {
        self.source = Some(source);
    }

    /// Drops the source and the buffers.
    pub(crate) fn release(&mut self) -> Option<S> {
        self.bytes = Vec::new();
        self.words = Vec::new();
        self.filled = 0;
        self.limit = 0;
        self.half_offset = 0;
        self.mark = None;
        self.source.take()
    }

    pub(crate) fn source_mut(&mut self) -> Option<&mut S> {
        self.source.as_mut()
    }

    /// Tops the accumulator up to at least 32 unread bits.
    #[inline]
    pub(crate) fn fill_bit_window(&mut self) {
        if self.bit_offset >= 32 {
            let word = self.words.get(self.half_offset).copied().unwrap_or(0);
            self.accumulator = (u64::from(word) << 32) | (self.accumulator >> 32);
            self.half_offset += 1;
            self.bit_offset -= 32;
        }
    }

    /// Unconsumed accumulator bits, lowest first.
    #[inline]
    pub(crate) fn peek_bits(&self) -> u32 {
        self.accumulator.checked_shr(self.bit_offset).unwrap_or(0) as u32
    }

    #[inline]
    pub(crate) fn skip_bits(&mut self, n: u32) {
        self.bit_offset += n;
    }

    /// Reads `n <= 32` bits without refilling.
    #[inline]
    pub(crate) fn read_few_bits(&mut self, n: u32) -> u32 {
        let value = u64::from(self.peek_bits()) & ((1u64 << n) - 1);
        self.bit_offset += n;
        value as u32
    }

    /// Refills if needed, then reads `n <= 32` bits.
    #[inline]
    pub(crate) fn read_bits(&mut self, n: u32) -> u32 {
        if self.bit_offset + n > 64 {
            self.fill_bit_window();
        }
        self.read_few_bits(n)
    }

    /// Skips to the next byte boundary; the skipped bits must be zero.
    pub(crate) fn jump_to_byte_boundary(&mut self) -> Result<()> {
        let padding = (8 - (self.bit_offset & 7)) & 7;
        if padding != 0 && self.read_bits(padding) != 0 {
            return Err(DecodeError::CorruptPadding);
        }
        Ok(())
    }

    /// Offset of the next unread byte within `bytes`.
    fn byte_offset(&self) -> usize {
        (self.half_offset * 4 + (self.bit_offset as usize).div_ceil(8)).saturating_sub(8)
    }

    /// Validates the cursor against the tail once the source is exhausted.
    ///
    /// With `at_end` set the cursor must sit exactly on the tail.
    pub(crate) fn check_health(&self, at_end: bool) -> Result<()> {
        if !self.end_of_stream {
            return Ok(());
        }
        let offset = self.byte_offset();
        if offset > self.tail_bytes {
            return Err(DecodeError::UnexpectedEof);
        }
        if at_end && offset != self.tail_bytes {
            return Err(DecodeError::ExcessiveTrailingInput);
        }
        Ok(())
    }

    /// Starts a header transaction: bytes from here on stay buffered until
    /// [`commit`](Self::commit) or [`rollback`](Self::rollback).
    pub(crate) fn begin(&mut self) {
        self.mark = Some(Mark {
            half_offset: self.half_offset,
            accumulator: self.accumulator,
            bit_offset: self.bit_offset,
        });
    }

    pub(crate) fn commit(&mut self) {
        self.mark = None;
    }

    /// Restores the cursor saved by [`begin`](Self::begin).
    pub(crate) fn rollback(&mut self) {
        if let Some(mark) = self.mark.take() {
            self.half_offset = mark.half_offset;
            self.accumulator = mark.accumulator;
            self.bit_offset = mark.bit_offset;
        }
    }

    /// Re-derives the word view after `bytes` changed.
    fn index_words(&mut self) {
        if self.end_of_stream {
            let end = self.tail_bytes.next_multiple_of(4);
            self.bytes[self.tail_bytes..end].fill(0);
            self.limit = end / 4;
        } else {
            self.limit = self.filled / 4;
        }
        self.words.resize(self.bytes.len() / 4 + SLACK_WORDS, 0);
        for (word, chunk) in self.words.iter_mut().zip(self.bytes[..self.limit * 4].chunks_exact(4)) {
            *word = u32::from_le_bytes([chunk[0], chunk[1], chunk[2], chunk[3]]);
        }
        self.words[self.limit..].fill(0);
    }
}

impl<S: ByteSource> BitReader<S> {
    /// Compacts the buffer and pulls bytes until it is full, the source
    /// blocks, or the stream ends.
    fn refill(&mut self) -> Result<()> {
        let mut keep = self.half_offset;
        if let Some(mark) = &self.mark {
            keep = keep.min(mark.half_offset);
        }
        let keep_from = (keep * 4).min(self.filled & !3);
        let shift = keep_from / 4;
        self.bytes.copy_within(keep_from..self.filled, 0);
        self.filled -= keep_from;
        self.half_offset -= shift;
        if let Some(mark) = &mut self.mark {
            mark.half_offset -= shift;
        }
        if self.filled == self.bytes.len() {
            // Only a pending transaction can pin a full buffer.
            self.bytes.resize(self.bytes.len() + CAPACITY, 0);
        }

        let Some(source) = self.source.as_mut() else {
            return Err(DecodeError::InvalidRuntimeStateTransition);
        };
        while self.filled < self.bytes.len() {
            match source.read(&mut self.bytes[self.filled..]) {
                Ok(0) => {
                    self.end_of_stream = true;
                    self.tail_bytes = self.filled;
                    break;
                }
                Ok(n) => self.filled += n,
                Err(ReadError::WouldBlock) => break,
                Err(ReadError::Failed) => return Err(DecodeError::ReadFailed),
            }
        }
        self.index_words();
        Ok(())
    }

    /// Makes sure the next decode step has enough buffered input.
    ///
    /// Suspends with [`Halt::NeedMoreInput`] if the source would block before
    /// enough bytes arrive.
    pub(crate) fn ensure_input(&mut self) -> core::result::Result<(), Halt> {
        if self.half_offset + MIN_WORDS_AHEAD <= self.limit {
            return Ok(());
        }
        if !self.end_of_stream {
            self.refill()?;
        }
        if self.end_of_stream {
            if self.half_offset > self.limit + MAX_OVERRUN_WORDS {
                return Err(DecodeError::UnexpectedEof.into());
            }
            return Ok(());
        }
        if self.half_offset + MIN_WORDS_AHEAD <= self.limit {
            Ok(())
        } else {
            log::trace!("bit reader starved, {} words buffered", self.limit - self.half_offset.min(self.limit));
            Err(Halt::NeedMoreInput)
        }
    }

    /// Buffers input and primes the accumulator with 64 bits.
    pub(crate) fn prepare(&mut self) -> core::result::Result<(), Halt> {
        self.ensure_input()?;
        self.check_health(false)?;
        self.fill_bit_window();
        self.fill_bit_window();
        Ok(())
    }

    /// Re-primes an accumulator drained by a raw byte copy.
    pub(crate) fn reload(&mut self) -> core::result::Result<(), Halt> {
        if self.bit_offset == 64 {
            self.prepare()?;
        }
        Ok(())
    }

    /// Copies byte-aligned raw input into `dst`.
    ///
    /// Returns the number of bytes copied, which is short of `dst.len()` only
    /// when the source would block after some progress.
    pub(crate) fn copy_raw_bytes(&mut self, dst: &mut [u8]) -> core::result::Result<usize, Halt> {
        if self.bit_offset & 7 != 0 {
            return Err(DecodeError::InvalidRuntimeStateTransition.into());
        }
        let mut n = 0;
        while self.bit_offset < 64 && n < dst.len() {
            dst[n] = self.peek_bits() as u8;
            self.bit_offset += 8;
            n += 1;
        }
        self.check_health(false)?;
        while n < dst.len() {
            let full_words = if self.end_of_stream { self.tail_bytes / 4 } else { self.limit };
            let whole = full_words.saturating_sub(self.half_offset).min((dst.len() - n) / 4);
            if whole > 0 {
                let from = self.half_offset * 4;
                dst[n..n + whole * 4].copy_from_slice(&self.bytes[from..from + whole * 4]);
                self.half_offset += whole;
                n += whole * 4;
                continue;
            }
            if self.half_offset < self.limit {
                self.fill_bit_window();
                while self.bit_offset < 64 && n < dst.len() {
                    dst[n] = self.peek_bits() as u8;
                    self.bit_offset += 8;
                    n += 1;
                }
                self.check_health(false)?;
                continue;
            }
            if self.end_of_stream {
                return Err(DecodeError::UnexpectedEof.into());
            }
            self.refill()?;
            if !self.end_of_stream && self.half_offset >= self.limit {
                return if n > 0 { Ok(n) } else { Err(Halt::NeedMoreInput) };
            }
        }
        Ok(n)
    }

    /// Confirms the stream ends at the current byte boundary.
    ///
    /// Probes the source for end of stream if it has not been seen yet.
    pub(crate) fn finish(&mut self) -> core::result::Result<(), Halt> {
        loop {
            if self.end_of_stream {
                return Ok(self.check_health(true)?);
            }
            if self.filled > self.byte_offset() {
                return Err(DecodeError::ExcessiveTrailingInput.into());
            }
            self.refill()?;
            if !self.end_of_stream && self.filled <= self.byte_offset() {
                return Err(Halt::NeedMoreInput);
            }
        }
    }
}
