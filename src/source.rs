//! Byte sources the decoder pulls compressed input from.

use alloc::collections::VecDeque;

/// Failure modes of a [`ByteSource`] read.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReadError {
    /// No bytes are available right now; the decoder suspends with
    /// [`Status::NeedMoreInput`](crate::Status::NeedMoreInput).
    WouldBlock,
    /// The transport failed; the session fails with
    /// [`DecodeError::ReadFailed`](crate::DecodeError::ReadFailed).
    Failed,
}

/// Pull-based supplier of compressed bytes.
///
/// `Ok(0)` signals end of stream. After that the source is never read again.
pub trait ByteSource {
    fn read(&mut self, buf: &mut [u8]) -> Result<usize, ReadError>;
}

impl ByteSource for &[u8] {
    fn read(&mut self, buf: &mut [u8]) -> Result<usize, ReadError> {
        let n = buf.len().min(self.len());
        let (head, tail) = self.split_at(n);
        buf[..n].copy_from_slice(head);
        *self = tail;
        Ok(n)
    }
}

impl<T: ByteSource + ?Sized> ByteSource for &mut T {
    fn read(&mut self, buf: &mut [u8]) -> Result<usize, ReadError> {
        (**self).read(buf)
    }
}

/// Push-fed input for callers that receive compressed data in pieces.
///
/// Reads report [`ReadError::WouldBlock`] while the queue is empty, until
/// [`finish`](Self::finish) marks the end of the stream.
#[derive(Debug, Default, Clone)]
pub struct InputQueue {
    pending: VecDeque<u8>,
    finished: bool,
}

impl InputQueue {
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends bytes to the end of the queue.
    pub fn push(&mut self, bytes: &[u8]) {
        self.pending.extend(bytes);
    }

    /// Marks the end of input. Bytes still queued are delivered first.
    pub fn finish(&mut self) {
        self.finished = true;
    }

    pub fn is_finished(&self) -> bool {
        self.finished
    }

    /// Bytes pushed but not yet consumed by the decoder.
    pub fn len(&self) -> usize {
        self.pending.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }
}

impl ByteSource for InputQueue {
    fn read(&mut self, buf: &mut [u8]) -> Result<usize, ReadError> {
        if self.pending.is_empty() {
            return if self.finished { Ok(0) } else { Err(ReadError::WouldBlock) };
        }
        let n = buf.len().min(self.pending.len());
        for (dst, src) in buf.iter_mut().zip(self.pending.drain(..n)) {
            *dst = src;
        }
        Ok(n)
    }
}

/// Adapts any [`std::io::Read`] into a [`ByteSource`].
#[cfg(feature = "std")]
#[derive(Debug)]
pub struct IoSource<R> {
    inner: R,
}

#[cfg(feature = "std")]
impl<R: std::io::Read> IoSource<R> {
    pub fn new(inner: R) -> Self {
        Self { inner }
    }

    pub fn into_inner(self) -> R {
        self.inner
    }
}

#[cfg(feature = "std")]
impl<R: std::io::Read> ByteSource for IoSource<R> {
    fn read(&mut self, buf: &mut [u8]) -> Result<usize, ReadError> {
        loop {
            match self.inner.read(buf) {
                Ok(n) => return Ok(n),
                Err(err) if err.kind() == std::io::ErrorKind::Interrupted => continue,
                Err(err) if err.kind() == std::io::ErrorKind::WouldBlock => {
                    return Err(ReadError::WouldBlock);
                }
                Err(err) => {
                    log::debug!("byte source read failed: {err}");
                    return Err(ReadError::Failed);
                }
            }
        }
    }
}
