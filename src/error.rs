use thiserror::Error;

/// Every way a decode session can fail.
///
/// Format violations, source failures and API misuse share one closed set so
/// callers can match on the kind. Once a session reports one of these it stays
/// failed.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum DecodeError {
    #[error("Invalid window bits in stream header")]
    CorruptWindowBits,

    #[error("Invalid meta-block length or reserved bit")]
    CorruptMetablockLength,

    #[error("Non-zero padding bits")]
    CorruptPadding,

    #[error("Duplicate symbol in simple Huffman code")]
    DuplicateSimpleHuffmanSymbol,

    #[error("Huffman code is incomplete or over-subscribed")]
    IncompleteHuffmanCode,

    #[error("Context map run exceeds map size")]
    ContextMapOverflow,

    #[error("Invalid backward distance")]
    InvalidDistance,

    #[error("Copy length exceeds remaining meta-block length")]
    CopyLengthExceedsBlock,

    #[error("Dictionary reference out of range")]
    DictionaryAddressOutOfRange,

    #[error("Too many compound dictionary chunks")]
    CompoundDictionaryOverflow,

    #[error("Byte source reported a read failure")]
    ReadFailed,

    #[error("Unexpected end of stream")]
    UnexpectedEof,

    #[error("Unused bytes after end of stream")]
    ExcessiveTrailingInput,

    #[error("Decoder is already closed")]
    AlreadyClosed,

    #[error("Decoder is already initialized")]
    DoubleInitialization,

    #[error("Operation not allowed in the current decoder state")]
    InvalidRuntimeStateTransition,
}

/// Why a decode step stopped before completing.
///
/// `NeedMoreInput` is a suspension, not a failure: the step left the session
/// in a state that can be re-entered once the source has more bytes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Halt {
    NeedMoreInput,
    Error(DecodeError),
}

impl From<DecodeError> for Halt {
    fn from(err: DecodeError) -> Self {
        Self::Error(err)
    }
}
