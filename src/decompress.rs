use alloc::vec::Vec;

use crate::bit_reader::BitReader;
use crate::compound::{CompoundDictionary, CopyCursor};
use crate::error::{DecodeError, Halt};
use crate::metablock::{self, Metablock, MetablockKind};
use crate::ring_buffer::RingBuffer;
use crate::source::ByteSource;

type Result<T> = core::result::Result<T, DecodeError>;
type Step<T> = core::result::Result<T, Halt>;

// --- Constants ---

/// Output bytes requested per round by the `Vec` helpers.
const OUTPUT_CHUNK: usize = 64 * 1024;

/// Distances assumed before the first one is decoded, oldest first.
const INITIAL_DISTANCES: [usize; 4] = [16, 15, 11, 4];

/// Session settings that must be fixed before the first byte is decoded.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DecoderOptions {
    /// Accept streams using the large-window header (window up to 1 GiB).
    pub large_window: bool,
    /// Hand output to the caller as soon as it fits instead of once the
    /// window fills. Does not change the decoded bytes.
    pub eager_output: bool,
}

/// Why a [`Decoder::decompress`] call returned.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Status {
    /// The source has no more bytes right now; call again once it does.
    NeedMoreInput,
    /// The output buffer is full; drain it and call again.
    NeedMoreOutput,
    /// The stream ended and all output has been delivered.
    Done,
}

/// Result of one [`Decoder::decompress`] call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Progress {
    /// Bytes written to the front of the output buffer.
    pub written: usize,
    pub status: Status,
}

/// Where decoding continues once buffered output has been written.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Resume {
    MainLoop,
    InsertLoop { inserted: usize },
    CopyLoop { copied: usize },
    CompoundDictionaryCopy(CopyCursor),
    CopyUncompressed,
    Finishing,
}

impl From<Resume> for RunningState {
    fn from(resume: Resume) -> Self {
        match resume {
            Resume::MainLoop => Self::MainLoop,
            Resume::InsertLoop { inserted } => Self::InsertLoop { inserted },
            Resume::CopyLoop { copied } => Self::CopyLoop { copied },
            Resume::CompoundDictionaryCopy(cursor) => Self::CompoundDictionaryCopy(cursor),
            Resume::CopyUncompressed => Self::CopyUncompressed,
            Resume::Finishing => Self::Finishing,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum RunningState {
    Uninitialized,
    Initialized,
    BlockStart,
    CompressedBlockStart,
    /// Next command, or the end of the meta-block.
    MainLoop,
    InsertLoop { inserted: usize },
    ReadDistance,
    CopyLoop { copied: usize },
    UseDictionary,
    CompoundDictionaryCopy(CopyCursor),
    ReadMetadata,
    CopyUncompressed,
    Write(Resume),
    Finishing,
    Finished,
    Closed,
    Failed(DecodeError),
}

/// A resumable Brotli decoding session.
///
/// The decoder pulls compressed bytes from its [`ByteSource`] and writes
/// decompressed bytes into the buffer passed to [`decompress`](Self::decompress).
/// Either side may run dry: the call then returns a [`Status`] saying which,
/// and the next call picks up exactly where this one stopped.
///
/// ```rust
/// use brotli_dec::{Decoder, InputQueue, Status};
///
/// let stream = [0x8b, 0x02, 0x80, b'B', b'R', b'O', b'T', b'L', b'I', 0x03];
/// let mut decoder = Decoder::with_source(InputQueue::new());
/// let mut out = [0u8; 16];
///
/// decoder.source_mut().unwrap().push(&stream[..4]);
/// let progress = decoder.decompress(&mut out).unwrap();
/// assert_eq!(progress.status, Status::NeedMoreInput);
///
/// let queue = decoder.source_mut().unwrap();
/// queue.push(&stream[4..]);
/// queue.finish();
/// let progress = decoder.decompress(&mut out).unwrap();
/// assert_eq!(progress.status, Status::Done);
/// assert_eq!(&out[..progress.written], b"BROTLI");
/// ```
#[derive(Debug)]
pub struct Decoder<S> {
    pub(crate) state: RunningState,
    pub(crate) bits: BitReader<S>,
    pub(crate) ring: RingBuffer,
    pub(crate) block: Metablock,
    pub(crate) compound: CompoundDictionary,
    options: DecoderOptions,
    /// The stream header used the large-window encoding.
    large_window_stream: bool,
    /// The current meta-block is the last one.
    input_end: bool,
    /// Bytes left in the current meta-block.
    pub(crate) meta_len: usize,

    pub(crate) distances: [usize; 4],
    /// Slot of the newest entry in `distances`.
    pub(crate) distance_index: usize,
    pub(crate) max_backward_distance: usize,
    pub(crate) max_distance: usize,

    // Current command.
    pub(crate) insert_len: usize,
    pub(crate) copy_len: usize,
    pub(crate) distance_context: i8,
    pub(crate) distance: usize,
}

impl<S> Default for Decoder<S> {
    fn default() -> Self {
        Self::new()
    }
}

impl<S> Decoder<S> {
    /// Creates a decoder with no source; call [`init`](Self::init) before decoding.
    pub fn new() -> Self {
        Self {
            state: RunningState::Uninitialized,
            bits: BitReader::new(),
            ring: RingBuffer::default(),
            block: Metablock::default(),
            compound: CompoundDictionary::default(),
            options: DecoderOptions::default(),
            large_window_stream: false,
            input_end: false,
            meta_len: 0,
            distances: INITIAL_DISTANCES,
            distance_index: 3,
            max_backward_distance: 0,
            max_distance: 0,
            insert_len: 0,
            copy_len: 0,
            distance_context: 0,
            distance: 0,
        }
    }

    pub fn with_source(source: S) -> Self {
        Self::with_options(source, DecoderOptions::default())
    }

    pub fn with_options(source: S, options: DecoderOptions) -> Self {
        let mut decoder = Self::new();
        decoder.options = options;
        decoder.bits.attach(source);
        decoder.state = RunningState::Initialized;
        decoder
    }

    /// Binds the session to its byte source.
    ///
    /// # Errors
    /// [`DecodeError::DoubleInitialization`] if a source is already bound,
    /// [`DecodeError::AlreadyClosed`] after [`close`](Self::close).
    pub fn init(&mut self, source: S) -> Result<()> {
        match self.state {
            RunningState::Uninitialized => {
                self.bits.attach(source);
                self.state = RunningState::Initialized;
                Ok(())
            }
            RunningState::Closed => Err(DecodeError::AlreadyClosed),
            _ => Err(DecodeError::DoubleInitialization),
        }
    }

    /// Fails unless decoding has not started yet.
    fn check_configurable(&self) -> Result<()> {
        match self.state {
            RunningState::Uninitialized | RunningState::Initialized => Ok(()),
            RunningState::Closed => Err(DecodeError::AlreadyClosed),
            _ => Err(DecodeError::InvalidRuntimeStateTransition),
        }
    }

    pub fn enable_large_window(&mut self) -> Result<()> {
        self.check_configurable()?;
        self.options.large_window = true;
        Ok(())
    }

    pub fn enable_eager_output(&mut self) -> Result<()> {
        self.check_configurable()?;
        self.options.eager_output = true;
        Ok(())
    }

    /// Appends a chunk to the compound dictionary.
    ///
    /// Chunks extend the back-reference space past the window, in attach
    /// order. At most 15 may be attached, all before decoding starts.
    pub fn attach_dictionary_chunk(&mut self, chunk: &[u8]) -> Result<()> {
        self.check_configurable()?;
        self.compound.attach(chunk)
    }

    /// Ends the session and frees its buffers. Idempotent.
    ///
    /// Every later call other than `close` fails with
    /// [`DecodeError::AlreadyClosed`].
    pub fn close(&mut self) {
        if self.state == RunningState::Closed {
            return;
        }
        self.bits.release();
        self.ring.release();
        self.block = Metablock::default();
        self.compound = CompoundDictionary::default();
        self.state = RunningState::Closed;
        log::debug!("decoder closed");
    }

    pub fn is_finished(&self) -> bool {
        self.state == RunningState::Finished
    }

    pub fn is_closed(&self) -> bool {
        self.state == RunningState::Closed
    }

    pub fn source_mut(&mut self) -> Option<&mut S> {
        self.bits.source_mut()
    }

    pub(crate) fn push_distance(&mut self, distance: usize) {
        self.distance_index = (self.distance_index + 1) & 3;
        self.distances[self.distance_index] = distance;
    }

    /// Ring position at which decoding pauses to hand out output.
    fn fence(&self, output_space: usize) -> usize {
        if self.options.eager_output {
            self.ring.size.min(self.ring.written() + output_space)
        } else {
            self.ring.size
        }
    }
}

impl<S: ByteSource> Decoder<S> {
    /// Decodes into `out` until the stream ends or either side runs dry.
    ///
    /// # Errors
    /// Any [`DecodeError`]. A failed session keeps returning the same error.
    pub fn decompress(&mut self, out: &mut [u8]) -> Result<Progress> {
        match self.state {
            RunningState::Uninitialized => return Err(DecodeError::InvalidRuntimeStateTransition),
            RunningState::Closed => return Err(DecodeError::AlreadyClosed),
            RunningState::Failed(err) => return Err(err),
            _ => {}
        }

        let mut written = 0;
        loop {
            let fence = self.fence(out.len() - written);
            let next = match self.state {
                RunningState::Finished => return Ok(Progress { written, status: Status::Done }),
                RunningState::Write(resume) => {
                    self.ring.mark_ready();
                    written += self.ring.drain_into(&mut out[written..]);
                    if self.ring.has_pending_output() {
                        log::trace!("output buffer full after {written} bytes");
                        return Ok(Progress { written, status: Status::NeedMoreOutput });
                    }
                    // A full buffer leaves an eager fence at `pos`, so resuming could not advance.
                    if written == out.len() && resume != Resume::Finishing {
                        log::trace!("output buffer exactly filled with {written} bytes");
                        return Ok(Progress { written, status: Status::NeedMoreOutput });
                    }
                    if self.ring.pos >= self.max_backward_distance {
                        self.max_distance = self.max_backward_distance;
                    }
                    self.ring.wrap_if_full();
                    Ok(resume.into())
                }
                state => self.step(state, fence),
            };
            match next {
                Ok(state) => self.state = state,
                Err(Halt::NeedMoreInput) => {
                    log::trace!("suspended for input in {:?}", self.state);
                    return Ok(Progress { written, status: Status::NeedMoreInput });
                }
                Err(Halt::Error(err)) => {
                    log::debug!("decoding failed in {:?}: {err}", self.state);
                    self.state = RunningState::Failed(err);
                    return Err(err);
                }
            }
        }
    }

    fn step(&mut self, state: RunningState, fence: usize) -> Step<RunningState> {
        match state {
            RunningState::Initialized => self.read_stream_header(),
            RunningState::BlockStart => self.read_metablock_header(),
            RunningState::CompressedBlockStart => self.read_compressed_header(),
            RunningState::MainLoop => self.read_command(),
            RunningState::InsertLoop { inserted } => self.insert_literals(inserted, fence),
            RunningState::ReadDistance => self.read_distance(),
            RunningState::CopyLoop { copied } => Ok(self.copy_backward(copied, fence)),
            RunningState::UseDictionary => self.use_dictionary(fence),
            RunningState::CompoundDictionaryCopy(cursor) => Ok(self.copy_from_compound(cursor, fence)),
            RunningState::ReadMetadata => self.skip_metadata(),
            RunningState::CopyUncompressed => self.copy_uncompressed(),
            RunningState::Finishing => {
                self.bits.jump_to_byte_boundary()?;
                self.bits.finish()?;
                log::debug!("stream finished");
                Ok(RunningState::Finished)
            }
            RunningState::Uninitialized
            | RunningState::Write(_)
            | RunningState::Finished
            | RunningState::Closed
            | RunningState::Failed(_) => Err(DecodeError::InvalidRuntimeStateTransition.into()),
        }
    }

    fn read_stream_header(&mut self) -> Step<RunningState> {
        self.bits.prepare()?;
        let (window_bits, large) = metablock::decode_window_bits(&mut self.bits, self.options.large_window)?;
        self.bits.check_health(false)?;
        log::debug!("window bits {window_bits}{}", if large { " (large window)" } else { "" });
        self.large_window_stream = large;
        self.ring.set_window(window_bits);
        self.max_backward_distance = (1 << window_bits) - 16;
        Ok(RunningState::BlockStart)
    }

    fn read_metablock_header(&mut self) -> Step<RunningState> {
        if self.input_end {
            return Ok(RunningState::Write(Resume::Finishing));
        }
        self.bits.ensure_input()?;
        let header = metablock::decode_metablock_length(&mut self.bits)?;
        self.bits.check_health(false)?;
        log::debug!("meta-block {:?}, {} bytes, last: {}", header.kind, header.length, header.is_last);
        self.input_end = header.is_last;
        self.meta_len = header.length;

        match header.kind {
            MetablockKind::Metadata => {
                self.bits.jump_to_byte_boundary()?;
                Ok(RunningState::ReadMetadata)
            }
            _ if header.length == 0 => Ok(RunningState::BlockStart),
            MetablockKind::Uncompressed => {
                self.bits.jump_to_byte_boundary()?;
                self.ring.reserve_for_metablock(header.length, header.is_last);
                Ok(RunningState::CopyUncompressed)
            }
            MetablockKind::Compressed => {
                self.ring.reserve_for_metablock(header.length, header.is_last);
                Ok(RunningState::CompressedBlockStart)
            }
        }
    }

    /// Parses trees and context maps as one unit, rewinding if input runs out.
    fn read_compressed_header(&mut self) -> Step<RunningState> {
        self.bits.begin();
        match Metablock::read(&mut self.bits, self.large_window_stream) {
            Ok(block) => {
                self.bits.commit();
                self.block = block;
                self.bits.check_health(false)?;
                Ok(RunningState::MainLoop)
            }
            Err(Halt::NeedMoreInput) => {
                self.bits.rollback();
                Err(Halt::NeedMoreInput)
            }
            Err(err) => {
                self.bits.commit();
                Err(err)
            }
        }
    }

    fn skip_metadata(&mut self) -> Step<RunningState> {
        while self.meta_len > 0 {
            self.bits.ensure_input()?;
            self.bits.fill_bit_window();
            self.bits.read_few_bits(8);
            self.meta_len -= 1;
        }
        Ok(RunningState::BlockStart)
    }

    fn copy_uncompressed(&mut self) -> Step<RunningState> {
        if self.meta_len == 0 {
            self.bits.reload()?;
            return Ok(RunningState::BlockStart);
        }
        let pos = self.ring.pos;
        let chunk = (self.ring.size - pos).min(self.meta_len);
        let copied = self.bits.copy_raw_bytes(&mut self.ring.buffer[pos..pos + chunk])?;
        self.ring.pos += copied;
        self.meta_len -= copied;
        if copied < chunk {
            return Err(Halt::NeedMoreInput);
        }
        if self.ring.pos == self.ring.size {
            return Ok(RunningState::Write(Resume::CopyUncompressed));
        }
        self.bits.reload()?;
        Ok(RunningState::BlockStart)
    }

    /// Decodes everything available, appending it to `output`.
    ///
    /// Returns [`Status::Done`] at the end of the stream, or
    /// [`Status::NeedMoreInput`] if the source would block first.
    pub fn read_to_end(&mut self, output: &mut Vec<u8>) -> Result<Status> {
        loop {
            let start = output.len();
            let room = output.capacity().saturating_sub(start).max(OUTPUT_CHUNK);
            output.resize(start + room, 0);
            match self.decompress(&mut output[start..]) {
                Ok(progress) => {
                    output.truncate(start + progress.written);
                    if progress.status != Status::NeedMoreOutput {
                        return Ok(progress.status);
                    }
                }
                Err(err) => {
                    output.truncate(start);
                    return Err(err);
                }
            }
        }
    }
}

#[cfg(feature = "std")]
impl<S: ByteSource> std::io::Read for Decoder<S> {
    /// Returns `WouldBlock` if the source would block before any output.
    fn read(&mut self, buf: &mut [u8]) -> std::io::Result<usize> {
        if buf.is_empty() {
            return Ok(0);
        }
        let progress = self
            .decompress(buf)
            .map_err(|err| std::io::Error::new(std::io::ErrorKind::InvalidData, err))?;
        if progress.written == 0 && progress.status == Status::NeedMoreInput {
            return Err(std::io::ErrorKind::WouldBlock.into());
        }
        Ok(progress.written)
    }
}

/// Decodes a complete stream held in memory.
///
/// A `dictionary`, if given, is attached as a single compound dictionary chunk.
pub fn decode_all(input: &[u8], dictionary: Option<&[u8]>) -> Result<Vec<u8>> {
    let mut decoder = Decoder::with_source(input);
    if let Some(dictionary) = dictionary {
        decoder.attach_dictionary_chunk(dictionary)?;
    }
    let mut output = Vec::new();
    match decoder.read_to_end(&mut output)? {
        Status::Done => Ok(output),
        _ => Err(DecodeError::UnexpectedEof),
    }
}

/// Decompresses an entire Brotli stream, appending the result to `output`.
///
/// On error `output` keeps whatever was appended before the failure.
pub fn decompress(input: &[u8], output: &mut Vec<u8>) -> Result<()> {
    let heuristic_cap = input.len().saturating_mul(4);
    output.reserve(heuristic_cap.min(OUTPUT_CHUNK));

    let mut decoder = Decoder::with_source(input);
    match decoder.read_to_end(output)? {
        Status::Done => Ok(()),
        _ => Err(DecodeError::UnexpectedEof),
    }
}
