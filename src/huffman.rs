//! Canonical Huffman lookup tables.
//!
//! A table is a flat array of `(code_length << 16) | symbol` entries. The
//! first `1 << root_bits` entries are indexed directly by the next input bits;
//! longer codes redirect from their root slot into a secondary table appended
//! after the root.

use alloc::vec;
use alloc::vec::Vec;

use crate::bit_reader::BitReader;
use crate::error::DecodeError;

type Result<T> = core::result::Result<T, DecodeError>;

// --- Constants ---

/// Longest code length the format allows.
pub(crate) const MAX_LENGTH: usize = 15;

/// Root table width for every alphabet except code-length codes.
pub(crate) const ROOT_BITS: u32 = 8;

/// Worst-case table size per tree, indexed by `(alphabet_size + 31) >> 5`.
const MAX_TABLE_SIZE: [u16; 23] = [
    256, 402, 436, 468, 500, 534, 566, 598, 630, 662, 694, 726, 758, 790, 822, 854, 886, 920,
    952, 984, 1016, 1048, 1080,
];

/// Worst-case table size for a tree over `alphabet_size` symbols.
pub(crate) fn max_table_size(alphabet_size: usize) -> usize {
    MAX_TABLE_SIZE[(alphabet_size + 31) >> 5].into()
}

/// Next canonical key in bit-reversed order.
#[inline]
fn next_key(key: u32, len: usize) -> u32 {
    let mut step = 1u32 << (len - 1);
    while key & step != 0 {
        step >>= 1;
    }
    (key & step.wrapping_sub(1)) + step
}

/// Stores `item` at every `step`-th slot of `table[..end]`.
#[inline]
fn replicate_value(table: &mut [u32], step: usize, end: usize, item: u32) {
    let mut pos = end;
    while pos > 0 {
        pos -= step;
        table[pos] = item;
    }
}

/// Width of the secondary table that starts with codes of length `len`.
fn next_table_bit_size(count: &[u16; MAX_LENGTH + 1], len: usize, root_bits: usize) -> usize {
    let mut bits = len;
    let mut left = 1i32 << (bits - root_bits);
    while bits < MAX_LENGTH {
        left -= i32::from(count[bits]);
        if left <= 0 {
            break;
        }
        bits += 1;
        left <<= 1;
    }
    bits - root_bits
}

/// Builds the lookup table for `code_lengths` into `table`.
///
/// Returns the number of entries used. A code with exactly one used symbol
/// decodes that symbol without consuming bits; any other code must be
/// complete.
pub(crate) fn build_huffman_table(
    table: &mut [u32],
    root_bits: u32,
    code_lengths: &[u8],
) -> Result<usize> {
    let root_bits = root_bits as usize;
    let mut count = [0u16; MAX_LENGTH + 1];
    for &len in code_lengths {
        let len = usize::from(len);
        if len > MAX_LENGTH {
            return Err(DecodeError::IncompleteHuffmanCode);
        }
        count[len] += 1;
    }

    let used: usize = count[1..].iter().map(|&c| usize::from(c)).sum();
    let mut space = 1i64 << MAX_LENGTH;
    for len in 1..=MAX_LENGTH {
        space -= i64::from(count[len]) << (MAX_LENGTH - len);
    }
    if used == 0 || (used != 1 && space != 0) {
        return Err(DecodeError::IncompleteHuffmanCode);
    }

    let mut offset = [0usize; MAX_LENGTH + 1];
    for len in 1..MAX_LENGTH {
        offset[len + 1] = offset[len] + usize::from(count[len]);
    }
    let mut sorted = vec![0u32; used];
    for (symbol, &len) in code_lengths.iter().enumerate() {
        if len != 0 {
            let slot = &mut offset[usize::from(len)];
            sorted[*slot] = symbol as u32;
            *slot += 1;
        }
    }

    let mut table_bits = root_bits;
    let mut table_size = 1usize << table_bits;
    let mut total_size = table_size;

    if used == 1 {
        table[..total_size].fill(sorted[0]);
        return Ok(total_size);
    }

    let mut key = 0u32;
    let mut symbol = 0;
    let mut step = 1;
    for len in 1..=root_bits {
        step <<= 1;
        while count[len] > 0 {
            let item = ((len as u32) << 16) | sorted[symbol];
            replicate_value(&mut table[key as usize..], step, table_size, item);
            symbol += 1;
            key = next_key(key, len);
            count[len] -= 1;
        }
    }

    let mask = total_size - 1;
    let mut low = usize::MAX;
    let mut current = 0;
    step = 1;
    for len in root_bits + 1..=MAX_LENGTH {
        step <<= 1;
        while count[len] > 0 {
            if key as usize & mask != low {
                current += table_size;
                table_bits = next_table_bit_size(&count, len, root_bits);
                table_size = 1 << table_bits;
                total_size += table_size;
                low = key as usize & mask;
                table[low] = (((table_bits + root_bits) as u32) << 16) | (current - low) as u32;
            }
            let item = (((len - root_bits) as u32) << 16) | sorted[symbol];
            let start = current + (key as usize >> root_bits);
            replicate_value(&mut table[start..], step, table_size, item);
            symbol += 1;
            key = next_key(key, len);
            count[len] -= 1;
        }
    }
    Ok(total_size)
}

/// Decodes one symbol using a table built with [`ROOT_BITS`].
///
/// The accumulator must hold at least 15 unread bits.
#[inline]
pub(crate) fn read_symbol<S>(table: &[u32], br: &mut BitReader<S>) -> u32 {
    let val = br.peek_bits();
    let mut offset = (val & 0xFF) as usize;
    let entry = table[offset];
    let bits = entry >> 16;
    let sym = entry & 0xFFFF;
    if bits <= ROOT_BITS {
        br.skip_bits(bits);
        return sym;
    }
    offset += sym as usize;
    let mask = (1u32 << bits) - 1;
    offset += ((val & mask) >> ROOT_BITS) as usize;
    let entry = table[offset];
    br.skip_bits((entry >> 16) + ROOT_BITS);
    entry & 0xFFFF
}

/// A set of trees sharing one alphabet, stored back to back.
#[derive(Debug, Default)]
pub(crate) struct HuffmanGroup {
    table: Vec<u32>,
    roots: Vec<usize>,
    next: usize,
}

impl HuffmanGroup {
    /// Reserves room for `num_trees` trees over `alphabet_size` symbols.
    pub(crate) fn with_capacity(num_trees: usize, alphabet_size: usize) -> Self {
        Self {
            table: vec![0; num_trees * max_table_size(alphabet_size)],
            roots: Vec::with_capacity(num_trees),
            next: 0,
        }
    }

    /// Unused tail of the table, where the next tree is built.
    pub(crate) fn next_slot(&mut self) -> &mut [u32] {
        &mut self.table[self.next..]
    }

    /// Records a tree of `size` entries just built in [`next_slot`](Self::next_slot).
    pub(crate) fn push(&mut self, size: usize) {
        self.roots.push(self.next);
        self.next += size;
    }

    #[inline]
    pub(crate) fn tree(&self, index: usize) -> &[u32] {
        &self.table[self.roots[index]..]
    }
}
