//! Stream and meta-block header parsing.
//!
//! A compressed meta-block starts with a header describing its block-type
//! partitions, context maps and prefix-code groups. [`Metablock::read`] parses
//! all of that into a fresh [`Metablock`]; the sequence engine then decodes
//! commands against it.

use alloc::vec;
use alloc::vec::Vec;

use crate::bit_reader::BitReader;
use crate::context::ContextMode;
use crate::error::{DecodeError, Halt};
use crate::huffman::{self, HuffmanGroup, ROOT_BITS, build_huffman_table, max_table_size};
use crate::prefix::{BLOCK_LENGTH_N_BITS, BLOCK_LENGTH_OFFSET, NUM_BLOCK_LENGTH_CODES, NUM_COMMAND_CODES};
use crate::source::ByteSource;

type Result<T> = core::result::Result<T, DecodeError>;
type Step<T> = core::result::Result<T, Halt>;

// --- Constants ---

/// Window bits accepted in a large-window stream header.
const LARGE_WINDOW_BITS: core::ops::RangeInclusive<u32> = 10..=30;

pub(crate) const NUM_LITERAL_CODES: usize = 256;

pub(crate) const NUM_DISTANCE_SHORT_CODES: usize = 16;

/// Extra-bit ceiling of a regular distance code.
const MAX_DISTANCE_BITS: usize = 24;

/// Extra-bit ceiling of a large-window distance code.
const MAX_LARGE_WINDOW_DISTANCE_BITS: usize = 62;

/// Largest distance a stream may encode.
pub(crate) const MAX_ALLOWED_DISTANCE: usize = 0x7FFF_FFFC;

/// Context ids per literal block type.
const LITERAL_CONTEXT_BITS: usize = 6;

/// Context ids per distance block type.
pub(crate) const DISTANCE_CONTEXT_BITS: usize = 2;

const CODE_LENGTH_CODES: usize = 18;

/// Order in which code-length code lengths are transmitted.
const CODE_LENGTH_CODE_ORDER: [usize; CODE_LENGTH_CODES] =
    [1, 2, 3, 4, 0, 5, 17, 6, 16, 7, 8, 9, 10, 11, 12, 13, 14, 15];

/// Fixed prefix code for code-length code lengths: `(bits << 16) | length`.
const FIXED_TABLE: [u32; 16] = [
    0x020000, 0x020004, 0x020003, 0x030002, 0x020000, 0x020004, 0x020003, 0x040001, 0x020000,
    0x020004, 0x020003, 0x030002, 0x020000, 0x020004, 0x020003, 0x040005,
];

/// Code length assumed before the first explicit one.
const DEFAULT_CODE_LENGTH: u8 = 8;

const CODE_LENGTH_REPEAT_CODE: u8 = 16;

/// Root width of the code-length code table.
const CODE_LENGTH_ROOT_BITS: u32 = 5;

// --- Stream header ---

/// Decodes the window size from the stream header.
///
/// Returns the window bits and whether the stream uses the large-window
/// encoding, which is only accepted when `allow_large` is set.
pub(crate) fn decode_window_bits<S>(br: &mut BitReader<S>, allow_large: bool) -> Result<(u32, bool)> {
    br.fill_bit_window();
    if br.read_few_bits(1) == 0 {
        return Ok((16, false));
    }
    let n = br.read_few_bits(3);
    if n != 0 {
        return Ok((17 + n, false));
    }
    match br.read_few_bits(3) {
        0 => Ok((17, false)),
        1 => {
            if !allow_large || br.read_few_bits(1) != 0 {
                return Err(DecodeError::CorruptWindowBits);
            }
            let bits = br.read_few_bits(6);
            if !LARGE_WINDOW_BITS.contains(&bits) {
                return Err(DecodeError::CorruptWindowBits);
            }
            Ok((bits, true))
        }
        n => Ok((8 + n, false)),
    }
}

// --- Meta-block header ---

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum MetablockKind {
    Compressed,
    Uncompressed,
    Metadata,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct MetablockHeader {
    pub is_last: bool,
    /// Output bytes for data blocks, skipped bytes for metadata.
    pub length: usize,
    pub kind: MetablockKind,
}

/// Decodes `ISLAST`, the meta-block length and the block kind.
///
/// A final empty meta-block is reported as a compressed block of length 0.
pub(crate) fn decode_metablock_length<S>(br: &mut BitReader<S>) -> Result<MetablockHeader> {
    br.fill_bit_window();
    let is_last = br.read_few_bits(1) == 1;
    if is_last && br.read_few_bits(1) == 1 {
        return Ok(MetablockHeader { is_last, length: 0, kind: MetablockKind::Compressed });
    }

    let nibbles = br.read_few_bits(2) + 4;
    if nibbles == 7 {
        if br.read_few_bits(1) != 0 {
            return Err(DecodeError::CorruptMetablockLength);
        }
        let size_bytes = br.read_few_bits(2);
        let mut length = 0usize;
        for i in 0..size_bytes {
            let byte = br.read_bits(8);
            if byte == 0 && i + 1 == size_bytes && size_bytes > 1 {
                return Err(DecodeError::CorruptMetablockLength);
            }
            length |= (byte as usize) << (i * 8);
        }
        if size_bytes > 0 {
            length += 1;
        }
        return Ok(MetablockHeader { is_last, length, kind: MetablockKind::Metadata });
    }

    let mut length = 0usize;
    for i in 0..nibbles {
        let nibble = br.read_bits(4);
        if nibble == 0 && i + 1 == nibbles && nibbles > 4 {
            return Err(DecodeError::CorruptMetablockLength);
        }
        length |= (nibble as usize) << (i * 4);
    }
    let kind = if !is_last && br.read_bits(1) == 1 {
        MetablockKind::Uncompressed
    } else {
        MetablockKind::Compressed
    };
    Ok(MetablockHeader { is_last, length: length + 1, kind })
}

/// Decodes a value in `0..=255` stored in 1 to 11 bits.
fn decode_var_len_byte<S>(br: &mut BitReader<S>) -> u32 {
    br.fill_bit_window();
    if br.read_few_bits(1) == 0 {
        return 0;
    }
    match br.read_few_bits(3) {
        0 => 1,
        n => br.read_few_bits(n) + (1 << n),
    }
}

// --- Prefix codes ---

/// Reads one prefix code into `table`, returning the entries used.
///
/// Symbols are drawn from an alphabet of `alphabet_size_max` symbols, of
/// which only the first `alphabet_size_limit` may occur.
fn read_huffman_code<S: ByteSource>(
    alphabet_size_max: usize,
    alphabet_size_limit: usize,
    table: &mut [u32],
    br: &mut BitReader<S>,
) -> Step<usize> {
    br.ensure_input()?;
    br.fill_bit_window();
    match br.read_few_bits(2) {
        1 => Ok(read_simple_huffman_code(alphabet_size_max, alphabet_size_limit, table, br)?),
        skip => read_complex_huffman_code(alphabet_size_limit, skip as usize, table, br),
    }
}

/// Up to four explicitly listed symbols with fixed code lengths.
fn read_simple_huffman_code<S>(
    alphabet_size_max: usize,
    alphabet_size_limit: usize,
    table: &mut [u32],
    br: &mut BitReader<S>,
) -> Result<usize> {
    let max_bits = usize::BITS - (alphabet_size_max - 1).leading_zeros();
    let num_symbols = br.read_few_bits(2) as usize + 1;
    let mut symbols = [0usize; 4];
    for slot in &mut symbols[..num_symbols] {
        let symbol = br.read_bits(max_bits) as usize;
        if symbol >= alphabet_size_limit {
            return Err(DecodeError::IncompleteHuffmanCode);
        }
        *slot = symbol;
    }
    for i in 0..num_symbols {
        if symbols[i + 1..num_symbols].contains(&symbols[i]) {
            return Err(DecodeError::DuplicateSimpleHuffmanSymbol);
        }
    }

    let lengths: &[u8] = match num_symbols {
        1 => &[1],
        2 => &[1, 1],
        3 => &[1, 2, 2],
        _ if br.read_bits(1) == 0 => &[2, 2, 2, 2],
        _ => &[1, 2, 3, 3],
    };
    let mut code_lengths = vec![0u8; alphabet_size_limit];
    for (&symbol, &len) in symbols.iter().zip(lengths) {
        code_lengths[symbol] = len;
    }
    build_huffman_table(table, ROOT_BITS, &code_lengths)
}

/// Code lengths transmitted with a prefix code of their own.
fn read_complex_huffman_code<S: ByteSource>(
    alphabet_size_limit: usize,
    skip: usize,
    table: &mut [u32],
    br: &mut BitReader<S>,
) -> Step<usize> {
    let mut code_length_code_lengths = [0u8; CODE_LENGTH_CODES];
    let mut space = 32i32;
    let mut num_codes = 0;
    for &index in &CODE_LENGTH_CODE_ORDER[skip..] {
        if space <= 0 {
            break;
        }
        br.fill_bit_window();
        let entry = FIXED_TABLE[(br.peek_bits() & 15) as usize];
        br.skip_bits(entry >> 16);
        let len = (entry & 0xFFFF) as u8;
        code_length_code_lengths[index] = len;
        if len != 0 {
            space -= 32 >> len;
            num_codes += 1;
        }
    }
    if space != 0 && num_codes != 1 {
        return Err(DecodeError::IncompleteHuffmanCode.into());
    }

    let code_lengths = read_code_lengths(&code_length_code_lengths, alphabet_size_limit, br)?;
    Ok(build_huffman_table(table, ROOT_BITS, &code_lengths)?)
}

/// Decodes `num_symbols` code lengths, expanding repeat codes 16 and 17.
fn read_code_lengths<S: ByteSource>(
    code_length_code_lengths: &[u8; CODE_LENGTH_CODES],
    num_symbols: usize,
    br: &mut BitReader<S>,
) -> Step<Vec<u8>> {
    let mut table = [0u32; 1 << CODE_LENGTH_ROOT_BITS];
    build_huffman_table(&mut table, CODE_LENGTH_ROOT_BITS, code_length_code_lengths)?;

    let mut code_lengths = vec![0u8; num_symbols];
    let mut symbol = 0;
    let mut prev_len = DEFAULT_CODE_LENGTH;
    let mut repeat = 0usize;
    let mut repeat_len = 0u8;
    let mut space = 32768i32;

    while symbol < num_symbols && space > 0 {
        br.ensure_input()?;
        br.fill_bit_window();
        let entry = table[(br.peek_bits() & 31) as usize];
        br.skip_bits(entry >> 16);
        let code = (entry & 0xFFFF) as u8;

        if code < CODE_LENGTH_REPEAT_CODE {
            repeat = 0;
            code_lengths[symbol] = code;
            symbol += 1;
            if code != 0 {
                prev_len = code;
                space -= 32768 >> code;
            }
            continue;
        }

        let extra_bits = u32::from(code - 14);
        let new_len = if code == CODE_LENGTH_REPEAT_CODE { prev_len } else { 0 };
        if repeat_len != new_len {
            repeat = 0;
            repeat_len = new_len;
        }
        let old_repeat = repeat;
        if repeat > 0 {
            repeat = (repeat - 2) << extra_bits;
        }
        repeat += br.read_bits(extra_bits) as usize + 3;
        let delta = repeat - old_repeat;
        if symbol + delta > num_symbols {
            return Err(DecodeError::IncompleteHuffmanCode.into());
        }
        code_lengths[symbol..symbol + delta].fill(repeat_len);
        symbol += delta;
        if repeat_len != 0 {
            space -= (delta << (15 - repeat_len)) as i32;
        }
    }
    if space != 0 {
        return Err(DecodeError::IncompleteHuffmanCode.into());
    }
    Ok(code_lengths)
}

fn read_huffman_group<S: ByteSource>(
    alphabet_size_max: usize,
    alphabet_size_limit: usize,
    num_trees: usize,
    br: &mut BitReader<S>,
) -> Step<HuffmanGroup> {
    let mut group = HuffmanGroup::with_capacity(num_trees, alphabet_size_limit);
    for _ in 0..num_trees {
        let size = read_huffman_code(alphabet_size_max, alphabet_size_limit, group.next_slot(), br)?;
        group.push(size);
    }
    Ok(group)
}

// --- Context maps ---

fn inverse_move_to_front(values: &mut [u8]) {
    let mut mtf: [u8; 256] = core::array::from_fn(|i| i as u8);
    for value in values {
        let index = usize::from(*value);
        let front = mtf[index];
        *value = front;
        if index != 0 {
            mtf.copy_within(0..index, 1);
            mtf[0] = front;
        }
    }
}

/// Decodes a context map of `size` entries and the number of trees it uses.
fn decode_context_map<S: ByteSource>(size: usize, br: &mut BitReader<S>) -> Step<(Vec<u8>, usize)> {
    br.ensure_input()?;
    let num_trees = decode_var_len_byte(br) as usize + 1;
    let mut map = vec![0u8; size];
    if num_trees == 1 {
        return Ok((map, num_trees));
    }

    br.fill_bit_window();
    let max_run_length_prefix = if br.read_few_bits(1) != 0 { br.read_few_bits(4) as usize + 1 } else { 0 };
    let alphabet_size = num_trees + max_run_length_prefix;
    let mut table = vec![0u32; max_table_size(alphabet_size)];
    read_huffman_code(alphabet_size, alphabet_size, &mut table, br)?;

    let mut i = 0;
    while i < size {
        br.ensure_input()?;
        br.fill_bit_window();
        let code = huffman::read_symbol(&table, br) as usize;
        if code == 0 {
            i += 1;
        } else if code <= max_run_length_prefix {
            let reps = (1 << code) + br.read_bits(code as u32) as usize;
            if i + reps > size {
                return Err(DecodeError::ContextMapOverflow.into());
            }
            i += reps;
        } else {
            map[i] = (code - max_run_length_prefix) as u8;
            i += 1;
        }
    }

    if br.read_bits(1) == 1 {
        inverse_move_to_front(&mut map);
    }
    Ok((map, num_trees))
}

// --- Block switching ---

fn read_block_length<S>(table: &[u32], br: &mut BitReader<S>) -> usize {
    br.fill_bit_window();
    let code = huffman::read_symbol(table, br) as usize;
    let n_bits = u32::from(BLOCK_LENGTH_N_BITS[code]);
    BLOCK_LENGTH_OFFSET[code] as usize + br.read_bits(n_bits) as usize
}

/// Block-type partition of one symbol category.
#[derive(Debug, Default)]
pub(crate) struct BlockSwitch {
    pub num_types: usize,
    type_tree: Vec<u32>,
    length_tree: Vec<u32>,
    /// Symbols left before the next switch.
    pub remaining: usize,
    /// Previous and current block type.
    ring: [usize; 2],
}

impl BlockSwitch {
    fn read<S: ByteSource>(br: &mut BitReader<S>) -> Step<Self> {
        br.ensure_input()?;
        let num_types = decode_var_len_byte(br) as usize + 1;
        if num_types == 1 {
            return Ok(Self { num_types, remaining: 1 << 28, ring: [1, 0], ..Self::default() });
        }

        let alphabet_size = num_types + 2;
        let mut type_tree = vec![0u32; max_table_size(alphabet_size)];
        read_huffman_code(alphabet_size, alphabet_size, &mut type_tree, br)?;
        let mut length_tree = vec![0u32; max_table_size(NUM_BLOCK_LENGTH_CODES)];
        read_huffman_code(NUM_BLOCK_LENGTH_CODES, NUM_BLOCK_LENGTH_CODES, &mut length_tree, br)?;
        let remaining = read_block_length(&length_tree, br);
        Ok(Self { num_types, type_tree, length_tree, remaining, ring: [1, 0] })
    }

    pub(crate) fn current(&self) -> usize {
        self.ring[1]
    }

    /// Reads the next block type and length, returning the new type.
    fn switch<S>(&mut self, br: &mut BitReader<S>) -> usize {
        br.fill_bit_window();
        let symbol = huffman::read_symbol(&self.type_tree, br) as usize;
        self.remaining = read_block_length(&self.length_tree, br);
        let mut block_type = match symbol {
            0 => self.ring[0],
            1 => self.ring[1] + 1,
            s => s - 2,
        };
        if block_type >= self.num_types {
            block_type -= self.num_types;
        }
        self.ring = [self.ring[1], block_type];
        block_type
    }
}

// --- Distance codes ---

fn distance_alphabet_size(npostfix: u32, ndirect: usize, max_ndistbits: usize) -> usize {
    NUM_DISTANCE_SHORT_CODES + ndirect + 2 * (max_ndistbits << npostfix)
}

/// Smallest alphabet covering every distance up to `max_distance`.
fn distance_alphabet_limit(max_distance: usize, npostfix: u32, ndirect: usize) -> usize {
    let offset = ((max_distance - ndirect) >> npostfix) + 4;
    let ndistbits = offset.ilog2() as usize - 1;
    let group = ((ndistbits - 1) << 1) | ((offset >> ndistbits) & 1);
    ((group - 1) << npostfix) + (1 << npostfix) + ndirect + NUM_DISTANCE_SHORT_CODES
}

/// Extra bits and base distance for every long distance code.
fn distance_lut(npostfix: u32, ndirect: usize, alphabet_size: usize) -> (Vec<u8>, Vec<usize>) {
    let mut extra_bits = vec![0u8; alphabet_size];
    let mut offsets = vec![0usize; alphabet_size];
    let postfix = 1usize << npostfix;

    let mut i = NUM_DISTANCE_SHORT_CODES;
    for j in 0..ndirect {
        offsets[i] = j + 1;
        i += 1;
    }

    let mut bits = 1usize;
    let mut half = 0usize;
    while i < alphabet_size {
        let base = ndirect + ((((2 + half) << bits) - 4) << npostfix) + 1;
        for j in 0..postfix.min(alphabet_size - i) {
            extra_bits[i] = bits as u8;
            offsets[i] = base + j;
            i += 1;
        }
        bits += half;
        half ^= 1;
    }
    (extra_bits, offsets)
}

// --- Compressed meta-block ---

/// Everything a compressed meta-block header defines, plus the selectors
/// that track the active block types while commands are decoded.
#[derive(Debug, Default)]
pub(crate) struct Metablock {
    pub literal_switch: BlockSwitch,
    pub command_switch: BlockSwitch,
    pub distance_switch: BlockSwitch,
    pub distance_postfix_bits: u32,
    context_modes: Vec<ContextMode>,
    context_map: Vec<u8>,
    /// Every literal context of a block type maps to the tree of that type.
    pub trivial_literal_context: bool,
    dist_context_map: Vec<u8>,
    pub literal_trees: HuffmanGroup,
    pub command_trees: HuffmanGroup,
    pub distance_trees: HuffmanGroup,
    pub dist_extra_bits: Vec<u8>,
    pub dist_offset: Vec<usize>,

    context_map_slice: usize,
    dist_context_map_slice: usize,
    context_mode: ContextMode,
    /// Literal tree of the current block type when the context is trivial.
    pub literal_tree: usize,
}

impl Metablock {
    /// Parses a compressed meta-block header.
    pub(crate) fn read<S: ByteSource>(br: &mut BitReader<S>, large_window: bool) -> Step<Self> {
        let literal_switch = BlockSwitch::read(br)?;
        let command_switch = BlockSwitch::read(br)?;
        let distance_switch = BlockSwitch::read(br)?;

        br.ensure_input()?;
        br.fill_bit_window();
        let npostfix = br.read_few_bits(2);
        let ndirect = (br.read_few_bits(4) as usize) << npostfix;

        let num_literal_types = literal_switch.num_types;
        let mut context_modes = Vec::with_capacity(num_literal_types);
        for i in 0..num_literal_types {
            if i % 96 == 0 {
                br.ensure_input()?;
            }
            br.fill_bit_window();
            context_modes.push(ContextMode::from_bits(br.read_few_bits(2)));
        }

        let (context_map, num_literal_trees) =
            decode_context_map(num_literal_types << LITERAL_CONTEXT_BITS, br)?;
        let trivial_literal_context = context_map
            .iter()
            .enumerate()
            .all(|(j, &tree)| usize::from(tree) == j >> LITERAL_CONTEXT_BITS);
        let (dist_context_map, num_dist_trees) =
            decode_context_map(distance_switch.num_types << DISTANCE_CONTEXT_BITS, br)?;

        let literal_trees = read_huffman_group(NUM_LITERAL_CODES, NUM_LITERAL_CODES, num_literal_trees, br)?;
        let command_trees =
            read_huffman_group(NUM_COMMAND_CODES, NUM_COMMAND_CODES, command_switch.num_types, br)?;

        let (alphabet_size_max, alphabet_size_limit) = if large_window {
            (
                distance_alphabet_size(npostfix, ndirect, MAX_LARGE_WINDOW_DISTANCE_BITS),
                distance_alphabet_limit(MAX_ALLOWED_DISTANCE, npostfix, ndirect),
            )
        } else {
            let size = distance_alphabet_size(npostfix, ndirect, MAX_DISTANCE_BITS);
            (size, size)
        };
        let distance_trees = read_huffman_group(alphabet_size_max, alphabet_size_limit, num_dist_trees, br)?;
        let (dist_extra_bits, dist_offset) = distance_lut(npostfix, ndirect, alphabet_size_limit);

        log::trace!(
            "block types {}/{}/{}, npostfix {}, ndirect {}, trees {}/{}/{}",
            num_literal_types,
            command_switch.num_types,
            distance_switch.num_types,
            npostfix,
            ndirect,
            num_literal_trees,
            command_switch.num_types,
            num_dist_trees
        );

        let context_mode = context_modes[0];
        let literal_tree = usize::from(context_map[0]);
        Ok(Self {
            literal_switch,
            command_switch,
            distance_switch,
            distance_postfix_bits: npostfix,
            context_modes,
            context_map,
            trivial_literal_context,
            dist_context_map,
            literal_trees,
            command_trees,
            distance_trees,
            dist_extra_bits,
            dist_offset,
            context_map_slice: 0,
            dist_context_map_slice: 0,
            context_mode,
            literal_tree,
        })
    }

    pub(crate) fn switch_literal_block<S>(&mut self, br: &mut BitReader<S>) {
        let block_type = self.literal_switch.switch(br);
        self.context_map_slice = block_type << LITERAL_CONTEXT_BITS;
        self.literal_tree = usize::from(self.context_map[self.context_map_slice]);
        self.context_mode = self.context_modes[block_type];
    }

    pub(crate) fn switch_command_block<S>(&mut self, br: &mut BitReader<S>) {
        self.command_switch.switch(br);
    }

    pub(crate) fn switch_distance_block<S>(&mut self, br: &mut BitReader<S>) {
        let block_type = self.distance_switch.switch(br);
        self.dist_context_map_slice = block_type << DISTANCE_CONTEXT_BITS;
    }

    /// Tree for the current command block type.
    pub(crate) fn command_tree(&self) -> &[u32] {
        self.command_trees.tree(self.command_switch.current())
    }

    /// Literal tree selected by the two preceding output bytes.
    #[inline]
    pub(crate) fn literal_tree_for(&self, p1: u8, p2: u8) -> usize {
        let context = self.context_mode.context(p1, p2);
        usize::from(self.context_map[self.context_map_slice + context])
    }

    /// Distance tree for distance context `context` (0..4).
    pub(crate) fn distance_tree(&self, context: usize) -> &[u32] {
        let index = self.dist_context_map[self.dist_context_map_slice + context];
        self.distance_trees.tree(usize::from(index))
    }
}
