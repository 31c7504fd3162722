#![no_main]

use std::io::Write;

use brotli_dec::{Decoder, InputQueue, Status, decode_all, decompress};
use libfuzzer_sys::fuzz_target;

/// Arbitrary bytes must decode or fail; never panic.
///
/// Also checks the one-shot helpers agree with each other.
fn verify_decompression_robustness(data: &[u8]) {
    let mut output = Vec::new();
    let result = decompress(data, &mut output);
    if result.is_ok() {
        assert_eq!(decode_all(data, None).ok(), Some(output));
    }
}

/// Feeding the same bytes in small pieces must reach the same outcome as
/// decoding them in one go.
fn verify_streaming_agrees(data: &[u8]) {
    let expected = decode_all(data, None);

    let mut decoder = Decoder::with_source(InputQueue::new());
    let mut out = [0u8; 333];
    let mut output = Vec::new();
    let mut pieces = data.chunks(7);
    let result = loop {
        match decoder.decompress(&mut out) {
            Ok(progress) => {
                output.extend_from_slice(&out[..progress.written]);
                match progress.status {
                    Status::Done => break Ok(output),
                    Status::NeedMoreOutput => {}
                    Status::NeedMoreInput => {
                        let queue = decoder.source_mut().unwrap();
                        match pieces.next() {
                            Some(piece) => queue.push(piece),
                            None => queue.finish(),
                        }
                    }
                }
            }
            Err(e) => break Err(e),
        }
    };

    match (&expected, &result) {
        (Ok(a), Ok(b)) => assert_eq!(a, b, "streaming output differs"),
        (Err(_), Err(_)) => {}
        _ => panic!("streaming outcome differs: {:?} vs {:?}", expected.is_ok(), result.is_ok()),
    }
}

/// `decode(encode(data)) == data` for the reference encoder.
fn verify_round_trip(data: &[u8]) {
    let mut writer = brotli::CompressorWriter::new(Vec::new(), 4096, 5, 18);
    writer.write_all(data).unwrap();
    let compressed = writer.into_inner();

    match decode_all(&compressed, None) {
        Ok(decompressed) => {
            if decompressed != data {
                panic!(
                    "Round-trip mismatch!\nInput len: {}\nCompressed len: {}\nDecompressed len: {}",
                    data.len(),
                    compressed.len(),
                    decompressed.len()
                );
            }
        }
        Err(e) => panic!("Round-trip failed! Decoder rejected a valid stream.\nError: {e:?}\nInput len: {}", data.len()),
    }
}

fuzz_target!(|data: &[u8]| {
    verify_decompression_robustness(data);
    verify_streaming_agrees(data);
    verify_round_trip(data);
});
