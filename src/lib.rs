//! # Brotli Decompression
//!
//! `brotli_dec` is a safe, pure-Rust decoder for the Brotli compressed data
//! format (RFC 7932), including the large-window extension and caller-supplied
//! compound dictionaries.
//!
//! Decoding is resumable: a [`Decoder`] pulls input from a [`ByteSource`] and
//! writes into whatever output buffer it is given. When either runs dry the call
//! returns a [`Status`] and the next call continues exactly where it stopped.
//!
//! ## Example
//!
//! ```rust
//! use brotli_dec::decode_all;
//!
//! // One uncompressed meta-block holding "BROTLI", then an empty last block.
//! let stream = [0x8b, 0x02, 0x80, b'B', b'R', b'O', b'T', b'L', b'I', 0x03];
//!
//! let output = decode_all(&stream, None).expect("Decompression failed");
//! assert_eq!(output, b"BROTLI");
//! ```

#![no_std]
#![forbid(unsafe_code)]

extern crate alloc;
#[cfg(feature = "std")]
extern crate std;

mod bit_reader;
mod compound;
mod context;
mod huffman;
mod metablock;
mod prefix;
mod ring_buffer;
mod sequence;

pub mod decompress;
pub mod dictionary;
pub mod error;
pub mod source;
pub mod transform;

pub use decompress::{Decoder, DecoderOptions, Progress, Status, decode_all, decompress};
pub use error::DecodeError;
#[cfg(feature = "std")]
pub use source::IoSource;
pub use source::{ByteSource, InputQueue, ReadError};
