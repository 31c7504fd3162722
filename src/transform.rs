//! Word transforms applied to static dictionary references.
//!
//! The decoder only uses the 121 [`builtin`] transforms, none of which shift
//! code points. [`TransformKind::ShiftFirst`] and [`TransformKind::ShiftAll`]
//! exist for callers that build their own transform sets and apply them with
//! [`transform_dictionary_word`]:
//!
//! ```
//! use brotli_dec::transform::{Transform, TransformKind, transform_dictionary_word};
//!
//! let kind = TransformKind::from_type(22, 1).unwrap();
//! assert_eq!(kind, TransformKind::ShiftAll(1));
//!
//! let transform = Transform { prefix: b"<", kind, suffix: b">" };
//! let mut out = [0u8; 16];
//! let n = transform_dictionary_word(&mut out, b"abc", &transform);
//! assert_eq!(&out[..n], b"<bcd>");
//! ```

/// Byte-level edit applied to a dictionary word.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransformKind {
    Identity,
    /// Drop the last `n` (1..=9) bytes.
    OmitLast(u8),
    UppercaseFirst,
    UppercaseAll,
    /// Drop the first `n` (1..=9) bytes.
    OmitFirst(u8),
    /// Add a signed scalar to the first code point.
    ShiftFirst(u16),
    /// Add a signed scalar to every code point.
    ShiftAll(u16),
}

impl TransformKind {
    /// Decodes a transform type id.
    ///
    /// `param` is the signed 16-bit scalar of the shift kinds (ids 21 and 22)
    /// and is ignored otherwise. Built-in transforms always pass 0.
    pub fn from_type(id: u8, param: u16) -> Option<Self> {
        Some(match id {
            0 => Self::Identity,
            1..=9 => Self::OmitLast(id),
            10 => Self::UppercaseFirst,
            11 => Self::UppercaseAll,
            12..=20 => Self::OmitFirst(id - 11),
            21 => Self::ShiftFirst(param),
            22 => Self::ShiftAll(param),
            _ => return None,
        })
    }
}

/// Prefix, word edit and suffix making up one transform.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Transform<'a> {
    pub prefix: &'a [u8],
    pub kind: TransformKind,
    pub suffix: &'a [u8],
}

/// Longest output of a built-in transform: 5 byte prefix, 24 byte word,
/// 8 byte suffix.
pub const MAX_TRANSFORMED_WORD_LENGTH: usize = 5 + 24 + 8;

/// Number of built-in transforms.
pub const NUM_TRANSFORMS: usize = 121;

const AFFIXES: [&[u8]; 50] = [
    b"", b" ", b"s ", b", ", b"e ", b".", b" the ", b".com/", b"\xc2\xa0", b" of ", b" and ",
    b" in ", b" to ", b"\"", b"\">", b"\n", b"]", b" for ", b" a ", b" that ", b". ", b" with ",
    b"'", b" from ", b" by ", b". The ", b" on ", b" as ", b" is ", b"ing ", b"\n\t", b":",
    b"ed ", b"(", b" at ", b"ly ", b"=\"", b" of the ", b". This ", b",", b" not ", b"er ",
    b"al ", b"='", b"ful ", b"ive ", b"less ", b"est ", b"ize ", b"ous ",
];

/// `[prefix, type, suffix]` per built-in transform, indexing [`AFFIXES`].
const TRIPLETS: [[u8; 3]; NUM_TRANSFORMS] = [
    [0, 0, 0], [0, 0, 1], [1, 0, 1], [0, 12, 0], [0, 10, 1], [0, 0, 6],
    [1, 0, 0], [2, 0, 1], [0, 0, 9], [0, 10, 0], [0, 0, 10], [0, 13, 0],
    [0, 1, 0], [3, 0, 1], [0, 0, 3], [1, 10, 1], [0, 0, 11], [0, 0, 12],
    [4, 0, 1], [0, 0, 13], [0, 0, 5], [0, 0, 14], [0, 0, 15], [0, 3, 0],
    [0, 0, 16], [0, 0, 17], [0, 14, 0], [0, 2, 0], [0, 0, 18], [0, 0, 19],
    [1, 10, 0], [0, 0, 20], [5, 0, 0], [1, 0, 3], [0, 15, 0], [0, 0, 21],
    [0, 0, 22], [0, 0, 23], [0, 0, 24], [0, 16, 0], [0, 17, 0], [6, 0, 0],
    [0, 4, 0], [0, 0, 25], [0, 11, 0], [0, 0, 26], [0, 0, 27], [0, 0, 28],
    [0, 7, 0], [0, 1, 29], [0, 0, 30], [0, 0, 31], [1, 0, 20], [0, 0, 32],
    [0, 20, 0], [0, 18, 0], [0, 6, 0], [0, 0, 33], [0, 10, 3], [0, 8, 0],
    [0, 0, 34], [0, 0, 35], [6, 0, 9], [0, 5, 0], [0, 9, 0], [1, 10, 3],
    [0, 10, 13], [5, 0, 33], [0, 11, 1], [0, 10, 14], [0, 0, 36], [1, 0, 5],
    [7, 0, 0], [6, 0, 37], [0, 10, 22], [0, 0, 38], [0, 0, 39], [5, 0, 1],
    [0, 10, 33], [0, 10, 5], [0, 0, 40], [1, 0, 36], [0, 0, 41], [1, 11, 1],
    [0, 0, 42], [1, 11, 0], [0, 0, 43], [0, 11, 13], [0, 10, 20], [1, 0, 33],
    [0, 0, 44], [1, 10, 20], [0, 0, 45], [0, 0, 46], [0, 11, 22], [0, 0, 47],
    [1, 10, 5], [0, 11, 14], [1, 0, 43], [0, 10, 39], [0, 0, 48], [0, 11, 5],
    [8, 0, 0], [1, 0, 39], [0, 10, 36], [0, 11, 36], [0, 0, 49], [0, 11, 3],
    [0, 10, 43], [1, 10, 39], [1, 11, 36], [1, 11, 3], [0, 11, 39], [0, 11, 33],
    [0, 11, 20], [1, 11, 5], [0, 11, 43], [1, 11, 20], [1, 10, 36], [1, 11, 43],
    [1, 10, 43],
];

/// Built-in transform `index`, if in range.
pub fn builtin(index: usize) -> Option<Transform<'static>> {
    let [prefix, id, suffix] = *TRIPLETS.get(index)?;
    Some(Transform {
        prefix: AFFIXES[usize::from(prefix)],
        kind: TransformKind::from_type(id, 0)?,
        suffix: AFFIXES[usize::from(suffix)],
    })
}

/// Uppercases the UTF-8 sequence starting at `word[i]`, returning its length.
fn to_upper_case(word: &mut [u8], i: usize) -> usize {
    let c0 = word[i];
    if c0 < 0xC0 {
        if c0.is_ascii_lowercase() {
            word[i] ^= 32;
        }
        return 1;
    }
    if c0 < 0xE0 {
        if let Some(b) = word.get_mut(i + 1) {
            *b ^= 32;
        }
        return 2;
    }
    if let Some(b) = word.get_mut(i + 2) {
        *b ^= 5;
    }
    3
}

/// Adds `scalar` to the code point at `word[i..]`, returning the bytes stepped over.
fn shift(word: &mut [u8], i: usize, scalar: u32) -> usize {
    let len = word.len() - i;
    let c0 = u32::from(word[i]);
    if c0 < 0x80 {
        let cp = c0.wrapping_add(scalar);
        word[i] = (cp & 0x7F) as u8;
        1
    } else if c0 < 0xC0 {
        1
    } else if c0 < 0xE0 {
        if len < 2 {
            return len;
        }
        let c1 = u32::from(word[i + 1]);
        let cp = (((c0 & 0x1F) << 6) | (c1 & 0x3F)).wrapping_add(scalar);
        word[i] = (0xC0 | ((cp >> 6) & 0x1F)) as u8;
        word[i + 1] = ((c1 & 0xC0) | (cp & 0x3F)) as u8;
        2
    } else if c0 < 0xF0 {
        if len < 3 {
            return len;
        }
        let c1 = u32::from(word[i + 1]);
        let c2 = u32::from(word[i + 2]);
        let cp = (((c0 & 0x0F) << 12) | ((c1 & 0x3F) << 6) | (c2 & 0x3F)).wrapping_add(scalar);
        word[i] = (0xE0 | ((cp >> 12) & 0x0F)) as u8;
        word[i + 1] = ((c1 & 0xC0) | ((cp >> 6) & 0x3F)) as u8;
        word[i + 2] = ((c2 & 0xC0) | (cp & 0x3F)) as u8;
        3
    } else if c0 < 0xF8 {
        if len < 4 {
            return len;
        }
        let c1 = u32::from(word[i + 1]);
        let c2 = u32::from(word[i + 2]);
        let c3 = u32::from(word[i + 3]);
        let cp = (((c0 & 0x07) << 18) | ((c1 & 0x3F) << 12) | ((c2 & 0x3F) << 6) | (c3 & 0x3F))
            .wrapping_add(scalar);
        word[i] = (0xF0 | ((cp >> 18) & 0x07)) as u8;
        word[i + 1] = ((c1 & 0xC0) | ((cp >> 12) & 0x3F)) as u8;
        word[i + 2] = ((c2 & 0xC0) | ((cp >> 6) & 0x3F)) as u8;
        word[i + 3] = ((c3 & 0xC0) | (cp & 0x3F)) as u8;
        4
    } else {
        1
    }
}

/// Writes `transform` applied to `word` at the start of `dst`.
///
/// Returns the number of bytes written. `dst` must hold at least
/// `prefix + word + suffix` bytes.
pub fn transform_dictionary_word(dst: &mut [u8], word: &[u8], transform: &Transform<'_>) -> usize {
    let mut offset = 0;
    dst[..transform.prefix.len()].copy_from_slice(transform.prefix);
    offset += transform.prefix.len();

    let (omit_first, omit_last) = match transform.kind {
        TransformKind::OmitFirst(n) => (usize::from(n), 0),
        TransformKind::OmitLast(n) => (0, usize::from(n)),
        _ => (0, 0),
    };
    let word = &word[omit_first.min(word.len())..];
    let word = &word[..word.len().saturating_sub(omit_last)];
    let start = offset;
    dst[start..start + word.len()].copy_from_slice(word);
    offset += word.len();

    let body = &mut dst[start..offset];
    match transform.kind {
        TransformKind::UppercaseFirst if !body.is_empty() => {
            to_upper_case(body, 0);
        }
        TransformKind::UppercaseAll => {
            let mut i = 0;
            while i < body.len() {
                i += to_upper_case(body, i);
            }
        }
        TransformKind::ShiftFirst(param) | TransformKind::ShiftAll(param) => {
            let scalar = u32::from(param & 0x7FFF) + (0x0100_0000 - u32::from(param & 0x8000));
            let all = matches!(transform.kind, TransformKind::ShiftAll(_));
            let mut i = 0;
            while i < body.len() {
                i += shift(body, i, scalar);
                if !all {
                    break;
                }
            }
        }
        _ => {}
    }

    dst[offset..offset + transform.suffix.len()].copy_from_slice(transform.suffix);
    offset + transform.suffix.len()
}

#[cfg(test)]
mod tests {
    use super::*;
    use alloc::vec::Vec;

    fn crc64(data: &[u8]) -> u64 {
        let mut crc = u64::MAX;
        for &byte in data {
            let mut c = (crc ^ u64::from(byte)) & 0xFF;
            for _ in 0..8 {
                c = (c >> 1) ^ ((c & 1).wrapping_neg() & 0xC96C_5795_D787_0F42);
            }
            crc = c ^ (crc >> 8);
        }
        !crc
    }

    fn apply(word: &[u8], transform: &Transform<'_>) -> Vec<u8> {
        let mut out = [0u8; 64];
        let n = transform_dictionary_word(&mut out, word, transform);
        out[..n].to_vec()
    }

    #[test]
    fn trim_everything() {
        let t = Transform { prefix: b"[", kind: TransformKind::OmitFirst(5), suffix: b"]" };
        assert_eq!(apply(b"word", &t), b"[]");
    }

    #[test]
    fn uppercase_all_handles_multibyte() {
        let t = Transform { prefix: b"[", kind: TransformKind::UppercaseAll, suffix: b"]" };
        let word = "qæप".as_bytes();
        assert_eq!(apply(word, &t), "[QÆय]".as_bytes());
    }

    #[test]
    fn all_builtin_transforms() {
        let word = b"o123456789abcdef";
        let mut out = Vec::new();
        for index in 0..NUM_TRANSFORMS {
            out.extend(apply(word, &builtin(index).unwrap()));
            out.push(0xFF);
        }
        assert_eq!(out.len(), 2259);
        assert_eq!(crc64(&out), 8_929_191_060_211_225_186);
        assert!(builtin(NUM_TRANSFORMS).is_none());
    }

    #[test]
    fn familiar_entries() {
        let t = builtin(73).unwrap();
        assert_eq!(apply(b"end", &t), b" the end of the ");
        let t = builtin(9).unwrap();
        assert_eq!(apply(b"hello", &t), b"Hello");
    }

    #[test]
    fn shift_moves_code_points() {
        let shift_all = Transform { prefix: b"", kind: TransformKind::ShiftAll(1), suffix: b"" };
        assert_eq!(apply(b"abc", &shift_all), b"bcd");
        assert_eq!(apply("é".as_bytes(), &shift_all), "ê".as_bytes());

        // 0x8000 sets the sign: 0xFFFF adds -1.
        let shift_first = Transform { prefix: b"", kind: TransformKind::ShiftFirst(0xFFFF), suffix: b"" };
        assert_eq!(apply(b"bb", &shift_first), b"ab");
    }
}
