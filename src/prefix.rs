//! Fixed prefix-code tables: insert-and-copy commands, block lengths and
//! distance short codes.

// --- Block lengths ---

/// Base value of each block-length code.
pub(crate) const BLOCK_LENGTH_OFFSET: [u32; 26] = [
    1, 5, 9, 13, 17, 25, 33, 41, 49, 65, 81, 97, 113, 145, 177, 209, 241, 305, 369, 497, 753,
    1265, 2289, 4337, 8433, 16625,
];

/// Extra bits following each block-length code.
pub(crate) const BLOCK_LENGTH_N_BITS: [u8; 26] = [
    2, 2, 2, 2, 3, 3, 3, 3, 4, 4, 4, 4, 5, 5, 5, 5, 6, 6, 7, 8, 9, 10, 11, 12, 13, 24,
];

/// Symbols in the block-length alphabet.
pub(crate) const NUM_BLOCK_LENGTH_CODES: usize = 26;

// --- Distance short codes ---

/// Ring slot, relative to the newest distance, reused by short codes 0..16.
pub(crate) const DISTANCE_SHORT_CODE_INDEX_OFFSET: [usize; 16] =
    [0, 3, 2, 1, 0, 0, 0, 0, 0, 0, 3, 3, 3, 3, 3, 3];

/// Adjustment applied to the reused distance by short codes 0..16.
pub(crate) const DISTANCE_SHORT_CODE_VALUE_OFFSET: [isize; 16] =
    [0, 0, 0, 0, -1, 1, -2, 2, -3, 3, -1, 1, -2, 2, -3, 3];

// --- Insert-and-copy commands ---

/// Symbols in the command alphabet.
pub(crate) const NUM_COMMAND_CODES: usize = 704;

const INSERT_LENGTH_N_BITS: [u8; 24] =
    [0, 0, 0, 0, 0, 0, 1, 1, 2, 2, 3, 3, 4, 4, 5, 5, 6, 7, 8, 9, 10, 12, 14, 24];

const COPY_LENGTH_N_BITS: [u8; 24] =
    [0, 0, 0, 0, 0, 0, 0, 0, 1, 1, 2, 2, 3, 3, 4, 4, 5, 5, 6, 7, 8, 9, 10, 24];

/// Decoded form of one command symbol.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct Command {
    pub insert_extra_bits: u8,
    pub copy_extra_bits: u8,
    pub insert_offset: u32,
    pub copy_offset: u32,
    /// Distance context 0..4, or negative when the command reuses the last
    /// distance without coding one.
    pub distance_context: i8,
}

const fn length_offsets(n_bits: &[u8; 24], first: u32) -> [u32; 24] {
    let mut offsets = [0u32; 24];
    offsets[0] = first;
    let mut i = 0;
    while i < 23 {
        offsets[i + 1] = offsets[i] + (1 << n_bits[i]);
        i += 1;
    }
    offsets
}

const fn build_command_lookup() -> [Command; NUM_COMMAND_CODES] {
    let insert_offsets = length_offsets(&INSERT_LENGTH_N_BITS, 0);
    let copy_offsets = length_offsets(&COPY_LENGTH_N_BITS, 2);
    let empty = Command {
        insert_extra_bits: 0,
        copy_extra_bits: 0,
        insert_offset: 0,
        copy_offset: 0,
        distance_context: 0,
    };
    let mut table = [empty; NUM_COMMAND_CODES];
    let mut cmd = 0;
    while cmd < NUM_COMMAND_CODES {
        let mut range = cmd >> 6;
        let mut context_base: i8 = -4;
        if range >= 2 {
            range -= 2;
            context_base = 0;
        }
        let insert_code = (((0x29850 >> (range * 2)) & 3) << 3) | ((cmd >> 3) & 7);
        let copy_code = (((0x26244 >> (range * 2)) & 3) << 3) | (cmd & 7);
        let copy_offset = copy_offsets[copy_code];
        let short_copy = if copy_offset > 4 { 3 } else { copy_offset as i8 - 2 };
        table[cmd] = Command {
            insert_extra_bits: INSERT_LENGTH_N_BITS[insert_code],
            copy_extra_bits: COPY_LENGTH_N_BITS[copy_code],
            insert_offset: insert_offsets[insert_code],
            copy_offset,
            distance_context: context_base + short_copy,
        };
        cmd += 1;
    }
    table
}

/// Command symbol -> insert/copy length codes and distance context.
pub(crate) static COMMAND_LOOKUP: [Command; NUM_COMMAND_CODES] = build_command_lookup();
