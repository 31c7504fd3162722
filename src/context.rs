//! Literal context modes and the lookup table that turns the two previous
//! output bytes into a 6-bit context id.

/// How a literal block derives its context from preceding bytes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub(crate) enum ContextMode {
    #[default]
    Lsb6,
    Msb6,
    Utf8,
    Signed,
}

impl ContextMode {
    pub(crate) fn from_bits(bits: u32) -> Self {
        match bits & 3 {
            0 => Self::Lsb6,
            1 => Self::Msb6,
            2 => Self::Utf8,
            _ => Self::Signed,
        }
    }

    /// Context id for a literal preceded by `p1` (newest) and `p2`.
    #[inline]
    pub(crate) fn context(self, p1: u8, p2: u8) -> usize {
        let base = (self as usize) << 9;
        usize::from(LOOKUP[base + usize::from(p1)] | LOOKUP[base + 256 + usize::from(p2)])
    }
}

/// Class of the first byte in UTF-8 mode, times four, for bytes below 0x80.
const UTF8_ASCII_CLASS: &[u8; 128] = b"         !!  !                  \"#$##%#$&'##(#)#++++++++++((&*'##,---,---,-----,-----,-----&#'###.///.///./////./////./////&#'# ";

/// Run lengths of the second-byte classes 0, 1, 2, 3, 0, 1, ... in UTF-8 mode.
const UTF8_SECOND_BYTE_RUNS: [u8; 19] = [33, 15, 10, 0, 0, 7, 26, 0, 0, 6, 0, 26, 0, 4, 0, 0, 97, 0, 32];

/// Four 512-entry halves, one per mode: `[p1 table | p2 table]`.
const fn build_lookup() -> [u8; 2048] {
    let mut lookup = [0u8; 2048];
    let mut i = 0;
    while i < 256 {
        lookup[i] = (i & 0x3F) as u8;
        lookup[512 + i] = (i >> 2) as u8;
        lookup[1792 + i] = 2 + (i >> 6) as u8;
        i += 1;
    }

    i = 0;
    while i < 128 {
        lookup[1024 + i] = 4 * (UTF8_ASCII_CLASS[i] - b' ');
        i += 1;
    }
    i = 0;
    while i < 64 {
        lookup[1152 + i] = (i & 1) as u8;
        lookup[1216 + i] = 2 + (i & 1) as u8;
        i += 1;
    }
    let mut offset = 1280;
    let mut k = 0;
    while k < UTF8_SECOND_BYTE_RUNS.len() {
        let value = (k & 3) as u8;
        let mut rep = UTF8_SECOND_BYTE_RUNS[k];
        while rep > 0 {
            lookup[offset] = value;
            offset += 1;
            rep -= 1;
        }
        k += 1;
    }

    i = 0;
    while i < 16 {
        lookup[1792 + i] = 1;
        lookup[2032 + i] = 6;
        i += 1;
    }
    lookup[1792] = 0;
    lookup[2047] = 7;

    i = 0;
    while i < 256 {
        lookup[1536 + i] = lookup[1792 + i] << 3;
        i += 1;
    }
    lookup
}

static LOOKUP: [u8; 2048] = build_lookup();
