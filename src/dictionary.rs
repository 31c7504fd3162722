//! The built-in static dictionary.
//!
//! Words are bucketed by length (4..=24 bytes). Within bucket `len` there are
//! `1 << SIZE_BITS_BY_LENGTH[len]` words stored back to back starting at
//! `OFFSETS_BY_LENGTH[len]`.

use crate::error::DecodeError;

type Result<T> = core::result::Result<T, DecodeError>;

static DATA: &[u8; 122_784] = include_bytes!("dictionary.bin");

/// log2 of the word count per length; zero marks an empty bucket.
pub(crate) const SIZE_BITS_BY_LENGTH: [u8; 32] = [
    0, 0, 0, 0, 10, 10, 11, 11, 10, 10, 10, 10, 10, 9, 9, 8, 7, 7, 8, 7, 7, 6, 6, 5, 5, 0, 0, 0, 0,
    0, 0, 0,
];

const fn build_offsets() -> [u32; 32] {
    let mut offsets = [0u32; 32];
    let mut pos = 0u32;
    let mut len = 0;
    while len < 32 {
        offsets[len] = pos;
        if SIZE_BITS_BY_LENGTH[len] != 0 {
            pos += (len as u32) << SIZE_BITS_BY_LENGTH[len];
        }
        len += 1;
    }
    offsets
}

/// Start of each length bucket in [`data`].
pub(crate) const OFFSETS_BY_LENGTH: [u32; 32] = build_offsets();

/// Raw dictionary bytes.
pub fn data() -> &'static [u8] {
    DATA
}

/// Resolves a dictionary address for a word of `len` bytes.
///
/// The low `SIZE_BITS_BY_LENGTH[len]` bits of `address` pick the word; the
/// remaining high bits are returned as the transform index.
pub(crate) fn lookup(len: usize, address: usize) -> Result<(&'static [u8], usize)> {
    let Some(&bits) = SIZE_BITS_BY_LENGTH.get(len) else {
        return Err(DecodeError::DictionaryAddressOutOfRange);
    };
    if bits == 0 {
        return Err(DecodeError::DictionaryAddressOutOfRange);
    }
    let mask = (1usize << bits) - 1;
    let start = OFFSETS_BY_LENGTH[len] as usize + (address & mask) * len;
    Ok((&DATA[start..start + len], address >> bits))
}
