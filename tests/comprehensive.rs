use std::io::{Read, Write};

use brotli_dec::{
    DecodeError, Decoder, DecoderOptions, InputQueue, IoSource, Status, decode_all, decompress,
};

// --- Test Constants ---

/// Uncompressed meta-block holding "BROTLI", then an empty last block.
const BROTLI: [u8; 10] = [0x8b, 0x02, 0x80, b'B', b'R', b'O', b'T', b'L', b'I', 0x03];

/// A single command copying a 22-byte word from just past the window.
const ONE_COPY: [u8; 11] = [0xa1, 0xa8, 0x00, 0xc0, 0x2f, 0x01, 0x10, 0xc4, 0x44, 0x09, 0x00];

/// Static dictionary word `ONE_COPY` resolves to without a compound dictionary.
const ONE_COPY_WORD: &[u8] = b"alternate\" type=\"appli";

const SLONA: &[u8] = b"Kot lomom kolol slona!";

// --- Helpers ---

/// Compresses `input` with the reference encoder.
fn encode(input: &[u8], quality: u32, lgwin: u32) -> Vec<u8> {
    let mut writer = brotli::CompressorWriter::new(Vec::new(), 4096, quality, lgwin);
    writer.write_all(input).expect("in-memory write");
    writer.into_inner()
}

/// Packs `(value, width)` fields LSB-first into bytes.
fn pack(fields: &[(u64, u32)]) -> Vec<u8> {
    let mut out = Vec::new();
    let mut acc = 0u64;
    let mut used = 0u32;
    for &(value, width) in fields {
        for bit in 0..width {
            acc |= ((value >> bit) & 1) << used;
            used += 1;
            if used == 8 {
                out.push(acc as u8);
                acc = 0;
                used = 0;
            }
        }
    }
    if used > 0 {
        out.push(acc as u8);
    }
    out
}

/// Text with enough repetition to exercise back-references and context modeling.
fn sample_text(size: usize) -> Vec<u8> {
    let line = b"<div class=\"entry\"><a href=\"/item\">The quick brown fox jumps over the lazy dog.</a></div>\n";
    line.iter().copied().cycle().take(size).collect()
}

/// Deterministic high-entropy bytes.
fn sample_noise(size: usize) -> Vec<u8> {
    let mut seed: u64 = 0xDEAD_BEEF;
    (0..size)
        .map(|_| {
            seed = seed.wrapping_mul(6_364_136_223_846_793_005).wrapping_add(1_442_695_040_888_963_407);
            (seed >> 56) as u8
        })
        .collect()
}

/// Encodes with the reference encoder and asserts bit-exact reconstruction.
#[track_caller]
fn assert_round_trip(input: &[u8], quality: u32, lgwin: u32) {
    let compressed = encode(input, quality, lgwin);
    match decode_all(&compressed, None) {
        Ok(output) => assert_eq!(output, input, "Round-trip output mismatches input (q{quality}, w{lgwin})"),
        Err(e) => panic!("Decompression failed during round-trip (q{quality}, w{lgwin}): {e:?}"),
    }
}

/// Drives a decoder fed one input byte at a time through `out_size`-byte output buffers.
#[track_caller]
fn decode_trickle(input: &[u8], out_size: usize, eager: bool) -> Vec<u8> {
    let options = DecoderOptions { eager_output: eager, ..DecoderOptions::default() };
    let mut decoder = Decoder::with_options(InputQueue::new(), options);
    let mut out = vec![0u8; out_size];
    let mut output = Vec::new();
    let mut fed = 0;
    loop {
        let progress = decoder.decompress(&mut out).expect("valid stream");
        output.extend_from_slice(&out[..progress.written]);
        match progress.status {
            Status::Done => return output,
            Status::NeedMoreOutput => {}
            Status::NeedMoreInput => {
                let queue = decoder.source_mut().expect("source attached");
                if fed < input.len() {
                    queue.push(&input[fed..=fed]);
                    fed += 1;
                } else {
                    queue.finish();
                }
            }
        }
    }
}

// --- Fixed Vectors (Tests 1-8) ---

/// Test: Both single-byte empty streams decode to nothing.
#[test]
fn t01_empty_streams() {
    assert_eq!(decode_all(&[0x06], None).unwrap(), b"");
    assert_eq!(decode_all(&[0x3b], None).unwrap(), b"");
}

/// Test: An uncompressed meta-block is copied through unchanged.
#[test]
fn t02_uncompressed_block() {
    let mut output = Vec::new();
    decompress(&BROTLI, &mut output).unwrap();
    assert_eq!(output, b"BROTLI");
}

/// Test: A distance past the window resolves to a static dictionary word.
#[test]
fn t03_static_dictionary_word() {
    assert_eq!(decode_all(&ONE_COPY, None).unwrap(), ONE_COPY_WORD);
}

/// Test: The same distance resolves into an attached compound dictionary instead.
#[test]
fn t04_compound_dictionary() {
    assert_eq!(decode_all(&ONE_COPY, Some(SLONA)).unwrap(), SLONA);
}

/// Test: A compound dictionary split into chunks reads as one byte string.
#[test]
fn t05_compound_dictionary_chunks() {
    let mut decoder = Decoder::with_source(&ONE_COPY[..]);
    decoder.attach_dictionary_chunk(&SLONA[..13]).unwrap();
    decoder.attach_dictionary_chunk(&SLONA[13..]).unwrap();
    let mut output = Vec::new();
    assert_eq!(decoder.read_to_end(&mut output), Ok(Status::Done));
    assert_eq!(output, SLONA);
}

/// Test: Only fifteen compound dictionary chunks are accepted.
#[test]
fn t06_compound_chunk_limit() {
    let mut decoder = Decoder::with_source(&ONE_COPY[..]);
    for _ in 0..15 {
        decoder.attach_dictionary_chunk(b"ab").unwrap();
    }
    assert_eq!(decoder.attach_dictionary_chunk(b"ab"), Err(DecodeError::CompoundDictionaryOverflow));
}

/// Test: Large-window headers are rejected unless the session opts in.
#[test]
fn t07_large_window_header() {
    // WBITS 24 in large-window form, one uncompressed block, then an empty last block.
    let mut stream = pack(&[
        (1, 1),
        (0, 3),
        (1, 3),
        (0, 1),
        (24, 6),
        (0, 1),
        (0, 2),
        (5, 16),
        (1, 1),
    ]);
    stream.extend_from_slice(b"BROTLI");
    stream.push(0x03);

    assert_eq!(decode_all(&stream, None), Err(DecodeError::CorruptWindowBits));

    let mut decoder = Decoder::with_source(&stream[..]);
    decoder.enable_large_window().unwrap();
    let mut output = Vec::new();
    assert_eq!(decoder.read_to_end(&mut output), Ok(Status::Done));
    assert_eq!(output, b"BROTLI");
}

/// Test: A metadata block is skipped without producing output.
#[test]
fn t08_metadata_block() {
    // WBITS 16, then a metadata block skipping three bytes.
    let mut stream = pack(&[(0, 1), (0, 1), (3, 2), (0, 1), (1, 2), (2, 8)]);
    stream.extend_from_slice(b"abc");
    stream.extend(pack(&[(0, 1), (0, 2), (5, 16), (1, 1)]));
    stream.extend_from_slice(b"BROTLI");
    stream.push(0x03);
    assert_eq!(decode_all(&stream, None).unwrap(), b"BROTLI");
}

// --- Malformed Streams (Tests 9-14) ---

/// Test: A byte after the final meta-block fails the session, and keeps failing it.
#[test]
fn t09_trailing_byte() {
    let mut input = BROTLI.to_vec();
    input.push(0);
    let mut decoder = Decoder::with_source(&input[..]);
    let mut out = [0u8; 32];
    assert_eq!(decoder.decompress(&mut out), Err(DecodeError::ExcessiveTrailingInput));
    assert_eq!(decoder.decompress(&mut out), Err(DecodeError::ExcessiveTrailingInput));
}

/// Test: Set padding bits after the stream are rejected.
#[test]
fn t10_nonzero_padding() {
    let mut input = BROTLI.to_vec();
    input[9] = 0x83;
    assert_eq!(decode_all(&input, None), Err(DecodeError::CorruptPadding));
}

/// Test: Every strict prefix of a valid stream fails instead of succeeding.
#[test]
fn t11_truncation() {
    let compressed = encode(&sample_text(5000), 9, 18);
    for cut in 0..compressed.len() {
        assert!(
            decode_all(&compressed[..cut], None).is_err(),
            "prefix of {cut} bytes decoded successfully"
        );
    }
}

/// Test: A truncated stream reports an unexpected end, not a format error.
#[test]
fn t12_truncated_uncompressed_block() {
    assert_eq!(decode_all(&BROTLI[..6], None), Err(DecodeError::UnexpectedEof));
}

/// Test: A reserved metadata bit is a format error.
#[test]
fn t13_reserved_metadata_bit() {
    let stream = pack(&[(0, 1), (0, 1), (3, 2), (1, 1), (0, 2)]);
    assert_eq!(decode_all(&stream, None), Err(DecodeError::CorruptMetablockLength));
}

/// Test: Random corruption never panics.
#[test]
fn t14_corrupted_bytes_never_panic() {
    let compressed = encode(&sample_text(20_000), 6, 16);
    for i in 0..compressed.len() {
        let mut damaged = compressed.clone();
        damaged[i] ^= 0xA5;
        let _ = decode_all(&damaged, None);
    }
}

// --- Session Lifecycle (Tests 15-18) ---

/// Test: A second init is rejected.
#[test]
fn t15_double_init() {
    let mut decoder: Decoder<&[u8]> = Decoder::new();
    decoder.init(&BROTLI).unwrap();
    assert_eq!(decoder.init(&BROTLI), Err(DecodeError::DoubleInitialization));
}

/// Test: Every call after close fails, and close itself is idempotent.
#[test]
fn t16_close() {
    let mut decoder = Decoder::with_source(&BROTLI[..]);
    decoder.close();
    decoder.close();
    let mut out = [0u8; 8];
    assert_eq!(decoder.decompress(&mut out), Err(DecodeError::AlreadyClosed));
    assert_eq!(decoder.enable_eager_output(), Err(DecodeError::AlreadyClosed));
    assert_eq!(decoder.attach_dictionary_chunk(b"x"), Err(DecodeError::AlreadyClosed));
}

/// Test: Options are frozen once decoding starts.
#[test]
fn t17_options_frozen_after_start() {
    let compressed = encode(&sample_text(200_000), 5, 16);
    let mut decoder = Decoder::with_source(&compressed[..]);
    let mut out = [0u8; 16];
    assert_eq!(decoder.decompress(&mut out).unwrap().status, Status::NeedMoreOutput);
    assert_eq!(decoder.enable_large_window(), Err(DecodeError::InvalidRuntimeStateTransition));
    assert_eq!(decoder.attach_dictionary_chunk(b"x"), Err(DecodeError::InvalidRuntimeStateTransition));
}

/// Test: A finished session keeps reporting `Done` with no output.
#[test]
fn t18_done_is_sticky() {
    let mut decoder = Decoder::with_source(&BROTLI[..]);
    let mut out = [0u8; 16];
    assert_eq!(decoder.decompress(&mut out).unwrap().written, 6);
    assert!(decoder.is_finished());
    let progress = decoder.decompress(&mut out).unwrap();
    assert_eq!((progress.written, progress.status), (0, Status::Done));
}

// --- Reference Encoder Round-Trips (Tests 19-24) ---

/// Test: Every quality level round-trips compressible text.
#[test]
fn t19_all_qualities() {
    let input = sample_text(40_000);
    for quality in 0..=11 {
        assert_round_trip(&input, quality, 22);
    }
}

/// Test: Window sizes from the smallest to the default.
#[test]
fn t20_window_sizes() {
    let input = sample_text(100_000);
    for lgwin in [10, 12, 16, 18, 20, 24] {
        assert_round_trip(&input, 9, lgwin);
    }
}

/// Test: Incompressible data round-trips (typically as uncompressed blocks).
#[test]
fn t21_incompressible() {
    assert_round_trip(&sample_noise(70_000), 5, 16);
    assert_round_trip(&sample_noise(70_000), 11, 22);
}

/// Test: Outputs larger than the window wrap the ring buffer many times.
#[test]
fn t22_output_larger_than_window() {
    let mut input = sample_text(300_000);
    input.extend(sample_noise(50_000));
    input.extend(sample_text(300_000));
    assert_round_trip(&input, 7, 10);
    assert_round_trip(&input, 11, 16);
}

/// Test: Zero-filled input, the long-run best case.
#[test]
fn t23_zeroes() {
    assert_round_trip(&vec![0u8; 1 << 20], 9, 22);
}

/// Test: Tiny inputs.
#[test]
fn t24_tiny_inputs() {
    assert_round_trip(b"", 5, 22);
    assert_round_trip(b"A", 5, 22);
    assert_round_trip(b"Hi", 11, 22);
}

// --- Streaming (Tests 25-29) ---

/// Test: One input byte and one output byte at a time.
#[test]
fn t25_byte_at_a_time() {
    let input = sample_text(20_000);
    let compressed = encode(&input, 9, 16);
    assert_eq!(decode_trickle(&compressed, 1, false), input);
}

/// Test: Eager output changes when bytes are delivered, never what they are.
#[test]
fn t26_eager_output_parity() {
    let mut input = sample_text(150_000);
    input.extend(sample_noise(10_000));
    let compressed = encode(&input, 6, 16);
    for out_size in [1, 7, 4096] {
        assert_eq!(decode_trickle(&compressed, out_size, true), input);
        assert_eq!(decode_trickle(&compressed, out_size, false), input);
    }
}

/// Test: Eager output hands bytes over before the window fills.
#[test]
fn t27_eager_output_is_early() {
    let input = sample_text(100_000);
    let compressed = encode(&input, 5, 16);

    let mut decoder = Decoder::with_source(&compressed[..]);
    decoder.enable_eager_output().unwrap();
    let mut out = [0u8; 100];
    let progress = decoder.decompress(&mut out).unwrap();
    assert_eq!(progress.written, 100);
    assert_eq!(&out[..], &input[..100]);
}

/// Test: `std::io::Read` over a decoder, fed through an `IoSource`.
#[test]
fn t28_io_read_adapter() {
    let input = sample_text(50_000);
    let compressed = encode(&input, 9, 18);

    let mut decoder = Decoder::with_source(IoSource::new(std::io::Cursor::new(compressed)));
    let mut output = Vec::new();
    Read::read_to_end(&mut decoder, &mut output).unwrap();
    assert_eq!(output, input);
}

/// Test: Corrupt data surfaces from `std::io::Read` as `InvalidData`.
#[test]
fn t29_io_read_reports_invalid_data() {
    let mut input = BROTLI.to_vec();
    input.push(0);
    let mut decoder = Decoder::with_source(&input[..]);
    let err = Read::read_to_end(&mut decoder, &mut Vec::new()).unwrap_err();
    assert_eq!(err.kind(), std::io::ErrorKind::InvalidData);
}

// --- Dictionary & Scenario Properties (Tests 30-32) ---

/// Size of the payload copied by [`whole_dictionary_copy`].
const DICTIONARY_LEN: u64 = 4096;

/// Builds a stream whose only command copies all of a 4096-byte compound
/// dictionary.
///
/// Every prefix code is a single-symbol simple code, so symbols cost no bits:
/// command 391 (no insert, copy code 23) and distance code 36 (base 4093).
fn whole_dictionary_copy() -> Vec<u8> {
    pack(&[
        (0, 1),                       // WBITS 16
        (1, 1),                       // ISLAST
        (0, 1),                       // ISLASTEMPTY
        (0, 2),                       // MNIBBLES 4
        (DICTIONARY_LEN - 1, 16),     // MLEN - 1
        (0, 3),                       // one block type per category
        (0, 2),                       // NPOSTFIX
        (0, 4),                       // NDIRECT
        (0, 2),                       // literal context mode
        (0, 1),                       // one literal tree
        (0, 1),                       // one distance tree
        (1, 2),                       // literal code: simple, one symbol
        (0, 2),
        (b'x'.into(), 8),
        (1, 2),                       // command code
        (0, 2),
        (391, 10),
        (1, 2),                       // distance code
        (0, 2),
        (36, 6),
        (DICTIONARY_LEN - 2118, 24),  // copy length extra bits
        (DICTIONARY_LEN - 4093, 11),  // distance extra bits
    ])
}

/// Test: A stream referencing a dictionary equal to the payload is tiny and
/// reproduces the payload exactly once the dictionary is attached.
#[test]
fn t30_dictionary_round_trip() {
    let payload = sample_noise(DICTIONARY_LEN as usize);
    let compressed = whole_dictionary_copy();
    assert!(compressed.len() <= 20, "stream is {} bytes", compressed.len());

    assert_eq!(decode_all(&compressed, Some(&payload)).unwrap(), payload);
    assert_eq!(decode_all(&compressed, None), Err(DecodeError::DictionaryAddressOutOfRange));
}

/// Test: The same dictionary copy split over chunks and drained through a tiny buffer.
#[test]
fn t31_dictionary_copy_in_pieces() {
    let payload = sample_text(DICTIONARY_LEN as usize);
    let compressed = whole_dictionary_copy();

    let mut decoder = Decoder::with_source(&compressed[..]);
    for chunk in payload.chunks(300) {
        decoder.attach_dictionary_chunk(chunk).unwrap();
    }
    let mut out = [0u8; 64];
    let mut output = Vec::new();
    loop {
        let progress = decoder.decompress(&mut out).unwrap();
        output.extend_from_slice(&out[..progress.written]);
        if progress.status == Status::Done {
            break;
        }
    }
    assert_eq!(output, payload);
}

/// Test: Repetitive html compresses below half its size and decodes back exactly.
#[test]
fn t32_repeated_html() {
    let input = b"<html><body><H1>Hello world</H1></body></html>".repeat(1000);
    let compressed = encode(&input, 11, 22);
    assert!(compressed.len() < input.len() / 2);
    assert_eq!(decode_all(&compressed, None).unwrap(), input);
}

// --- Output Boundaries & Transformed Words (Tests 33-36) ---

/// Drives an eager decoder through `out_size`-byte buffers, requiring every
/// call before the last to fill its buffer.
#[track_caller]
fn decode_eager_exact(decoder: &mut Decoder<&[u8]>, out_size: usize, expected_len: usize) -> Vec<u8> {
    let mut out = vec![0u8; out_size];
    let mut output = Vec::new();
    for _ in 0..=expected_len / out_size + 1 {
        let progress = decoder.decompress(&mut out).unwrap();
        output.extend_from_slice(&out[..progress.written]);
        match progress.status {
            Status::Done => return output,
            Status::NeedMoreOutput => assert_eq!(progress.written, out_size, "decoder stalled"),
            Status::NeedMoreInput => panic!("slice source ran dry"),
        }
    }
    panic!("no progress after {} bytes with a {out_size}-byte buffer", output.len());
}

/// Builds a 1-byte last meta-block whose only command references a 10-byte
/// static dictionary word with distance code `code` and its extra bits.
fn single_word_block(code: u64, extra: (u64, u32)) -> Vec<u8> {
    pack(&[
        (0, 1),                       // WBITS 16
        (1, 1),                       // ISLAST
        (0, 1),                       // ISLASTEMPTY
        (0, 2),                       // MNIBBLES 4
        (0, 16),                      // MLEN - 1
        (0, 3),                       // one block type per category
        (0, 2),                       // NPOSTFIX
        (0, 4),                       // NDIRECT
        (0, 2),                       // literal context mode
        (0, 1),                       // one literal tree
        (0, 1),                       // one distance tree
        (1, 2),                       // literal code: simple, one symbol
        (0, 2),
        (b'x'.into(), 8),
        (1, 2),                       // command code
        (0, 2),
        (192, 10),                    // no insert, copy code 8 (10 or 11 bytes)
        (1, 2),                       // distance code
        (0, 2),
        (code, 6),
        (0, 1),                       // copy length 10
        extra,
    ])
}

/// Test: Eager output through buffers that the compound copy fills exactly.
#[test]
fn t33_eager_compound_copy_exact_buffers() {
    for out_size in [1, 2, 11, 22] {
        let mut decoder = Decoder::with_source(&ONE_COPY[..]);
        decoder.enable_eager_output().unwrap();
        decoder.attach_dictionary_chunk(SLONA).unwrap();
        assert_eq!(decode_eager_exact(&mut decoder, out_size, SLONA.len()), SLONA);
    }

    let payload = sample_noise(DICTIONARY_LEN as usize);
    let compressed = whole_dictionary_copy();
    for out_size in [64, 4096] {
        let mut decoder = Decoder::with_source(&compressed[..]);
        decoder.enable_eager_output().unwrap();
        for chunk in payload.chunks(1000) {
            decoder.attach_dictionary_chunk(chunk).unwrap();
        }
        assert_eq!(decode_eager_exact(&mut decoder, out_size, payload.len()), payload);
    }
}

/// Test: A dictionary word longer than the meta-block fits once transform 64
/// drops its last 9 bytes, and agrees with the reference decoder.
#[test]
fn t34_omit_transform_ends_block() {
    // Distance code 44 has base 65533 and 15 extra bits: 65537 is word 0 under transform 64.
    let stream = single_word_block(44, (4, 15));
    assert_eq!(decode_all(&stream, None).unwrap(), b"c");

    let mut reference = Vec::new();
    brotli::Decompressor::new(&stream[..], 4096).read_to_end(&mut reference).unwrap();
    assert_eq!(reference, b"c");
}

/// Test: The shortened word also decodes through a one-byte eager buffer.
#[test]
fn t35_omit_transform_eager() {
    let stream = single_word_block(44, (4, 15));
    let mut decoder = Decoder::with_source(&stream[..]);
    decoder.enable_eager_output().unwrap();
    assert_eq!(decode_eager_exact(&mut decoder, 1, 1), b"c");
}

/// Test: An untransformed word that overruns the meta-block is rejected.
#[test]
fn t36_whole_word_overruns_block() {
    // Distance code 16 has base 1 and one extra bit: distance 1 is word 0, identity.
    let stream = single_word_block(16, (0, 1));
    assert_eq!(decode_all(&stream, None), Err(DecodeError::CopyLengthExceedsBlock));
}
