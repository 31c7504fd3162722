//! Caller-attached dictionary chunks that extend the back-reference space.
//!
//! Chunks are addressed as one contiguous byte string in attach order. A
//! coarse block map, built on first use, narrows an address down to the
//! chunk that holds it.

use alloc::vec;
use alloc::vec::Vec;

use crate::error::DecodeError;

type Result<T> = core::result::Result<T, DecodeError>;

// --- Constants ---

/// Most chunks a session accepts.
pub(crate) const MAX_CHUNKS: usize = 15;

/// The block map holds at most `1 << BLOCK_MAP_BITS` entries.
const BLOCK_MAP_BITS: u32 = 8;

/// Position inside an in-progress compound copy.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct CopyCursor {
    index: usize,
    offset: usize,
    remaining: usize,
}

impl CopyCursor {
    pub(crate) fn is_done(&self) -> bool {
        self.remaining == 0
    }
}

#[derive(Debug, Default)]
pub(crate) struct CompoundDictionary {
    chunks: Vec<Vec<u8>>,
    /// `offsets[i]` is the address of chunk `i`; one extra entry holds the total.
    offsets: Vec<usize>,
    block_bits: u32,
    block_map: Vec<u8>,
}

impl CompoundDictionary {
    pub(crate) fn attach(&mut self, chunk: &[u8]) -> Result<()> {
        if self.chunks.len() >= MAX_CHUNKS {
            return Err(DecodeError::CompoundDictionaryOverflow);
        }
        if self.offsets.is_empty() {
            self.offsets.push(0);
        }
        let total = self.total_size() + chunk.len();
        self.chunks.push(chunk.to_vec());
        self.offsets.push(total);
        log::debug!("attached dictionary chunk {} ({} bytes)", self.chunks.len(), chunk.len());
        Ok(())
    }

    pub(crate) fn total_size(&self) -> usize {
        self.offsets.last().copied().unwrap_or(0)
    }

    fn build_block_map(&mut self) {
        let total = self.total_size();
        let mut block_bits = BLOCK_MAP_BITS;
        while (total - 1) >> block_bits != 0 {
            block_bits += 1;
        }
        block_bits -= BLOCK_MAP_BITS;
        self.block_bits = block_bits;

        let mut map = vec![0u8; 1 << BLOCK_MAP_BITS];
        let mut cursor = 0;
        let mut index = 0;
        while cursor < total {
            while self.offsets[index + 1] < cursor {
                index += 1;
            }
            map[cursor >> block_bits] = index as u8;
            cursor += 1 << block_bits;
        }
        log::debug!("compound dictionary block map: {} bytes, {}-bit blocks", total, block_bits);
        self.block_map = map;
    }

    /// Starts a copy of `length` bytes from `address`.
    pub(crate) fn start_copy(&mut self, address: usize, length: usize) -> Result<CopyCursor> {
        let total = self.total_size();
        if address >= total || address.checked_add(length).is_none_or(|end| end > total) {
            return Err(DecodeError::DictionaryAddressOutOfRange);
        }
        if self.block_map.is_empty() {
            self.build_block_map();
        }
        let mut index = usize::from(self.block_map[address >> self.block_bits]);
        while address >= self.offsets[index + 1] {
            index += 1;
        }
        Ok(CopyCursor { index, offset: address - self.offsets[index], remaining: length })
    }

    /// Copies as much of the cursor's range as fits into `dst`.
    ///
    /// Returns the number of bytes written.
    pub(crate) fn copy(&self, cursor: &mut CopyCursor, dst: &mut [u8]) -> usize {
        let mut written = 0;
        while cursor.remaining > 0 && written < dst.len() {
            let chunk = &self.chunks[cursor.index];
            let available = &chunk[cursor.offset..];
            let n = available.len().min(cursor.remaining).min(dst.len() - written);
            dst[written..written + n].copy_from_slice(&available[..n]);
            written += n;
            cursor.remaining -= n;
            cursor.offset += n;
            if cursor.offset == chunk.len() {
                cursor.index += 1;
                cursor.offset = 0;
            }
        }
        written
    }
}
