//! Chunked reads from a byte source.
//!
//! A body is read through a fixed-capacity [`Chunk`] whose valid length is
//! tracked separately from its capacity. [`read_all`] aggregates a whole body
//! for bulk conversions. [`ChunkReader`] hands out one chunk at a time for the
//! streaming modes, so at most one chunk of raw bytes is held per session.
use std::io::{self, Read};

use tokio::io::AsyncReadExt;

use crate::transport::ByteSource;

/// An owned, fixed-capacity byte region with a valid-length marker.
#[derive(Debug, Clone)]
pub struct Chunk {
    buf: Box<[u8]>,
    len: usize,
}

impl Chunk {
    /// Allocates a chunk. A capacity of zero is raised to one byte.
    #[must_use]
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            buf: vec![0; capacity.max(1)].into_boxed_slice(),
            len: 0,
        }
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.len
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    #[must_use]
    pub fn capacity(&self) -> usize {
        self.buf.len()
    }

    #[must_use]
    pub fn is_full(&self) -> bool {
        self.len == self.buf.len()
    }

    /// The valid bytes. Never includes stale data past the valid length.
    #[must_use]
    pub fn as_bytes(&self) -> &[u8] {
        &self.buf[..self.len]
    }

    pub fn clear(&mut self) {
        self.len = 0;
    }

    /// Reads from `source` until the chunk is full or the source is
    /// exhausted. Returns `true` on exhaustion.
    ///
    /// # Errors
    ///
    /// Propagates the source's transport error.
    pub async fn fill<R: ByteSource + ?Sized>(&mut self, source: &mut R) -> io::Result<bool> {
        while !self.is_full() {
            let n = source.read(&mut self.buf[self.len..]).await?;
            if n == 0 {
                return Ok(true);
            }
            self.len += n;
        }
        Ok(false)
    }

    /// Blocking counterpart of [`Chunk::fill`].
    ///
    /// # Errors
    ///
    /// Propagates the reader's error. Interrupted reads are retried.
    pub fn fill_blocking<R: Read + ?Sized>(&mut self, source: &mut R) -> io::Result<bool> {
        while !self.is_full() {
            match source.read(&mut self.buf[self.len..]) {
                Ok(0) => return Ok(true),
                Ok(n) => self.len += n,
                Err(err) if err.kind() == io::ErrorKind::Interrupted => {}
                Err(err) => return Err(err),
            }
        }
        Ok(false)
    }
}

/// Reads a whole body into one contiguous buffer.
///
/// Chunks of `chunk_size` bytes are filled one after another; a full chunk is
/// moved to a held list and replaced by a fresh one. On exhaustion the held
/// chunks and the final partial chunk are copied, in order, into a buffer of
/// exactly the total valid length. The total size is never guessed up front.
///
/// # Errors
///
/// A transport failure is returned immediately and nothing read so far is
/// kept.
pub async fn read_all<R: ByteSource + ?Sized>(source: &mut R, chunk_size: usize) -> io::Result<Vec<u8>> {
    let mut held = Vec::new();
    let mut current = Chunk::with_capacity(chunk_size);
    while !current.fill(source).await? {
        let full = core::mem::replace(&mut current, Chunk::with_capacity(chunk_size));
        held.push(full);
    }
    held.push(current);

    let total = held.iter().map(Chunk::len).sum();
    let mut body = Vec::with_capacity(total);
    for chunk in &held {
        body.extend_from_slice(chunk.as_bytes());
    }
    tracing::debug!(len = total, chunks = held.len(), "aggregated body");
    Ok(body)
}

/// Hands out a body one chunk at a time.
///
/// The same chunk buffer is reused for every read: the slice returned by
/// [`ChunkReader::next_chunk`] is valid until the next call.
#[derive(Debug)]
pub struct ChunkReader<R> {
    source: R,
    chunk: Chunk,
    exhausted: bool,
}

impl<R: ByteSource> ChunkReader<R> {
    #[must_use]
    pub fn new(source: R, chunk_size: usize) -> Self {
        Self {
            source,
            chunk: Chunk::with_capacity(chunk_size),
            exhausted: false,
        }
    }

    /// Reads the next chunk. Yields a chunk when it is full or the source is
    /// exhausted, and `None` once the source has nothing more.
    ///
    /// # Errors
    ///
    /// Propagates the source's transport error.
    pub async fn next_chunk(&mut self) -> io::Result<Option<&[u8]>> {
        if self.exhausted {
            return Ok(None);
        }
        self.chunk.clear();
        self.exhausted = self.chunk.fill(&mut self.source).await?;
        tracing::trace!(len = self.chunk.len(), exhausted = self.exhausted, "read chunk");
        if self.chunk.is_empty() {
            return Ok(None);
        }
        Ok(Some(self.chunk.as_bytes()))
    }

    #[must_use]
    pub fn is_exhausted(&self) -> bool {
        self.exhausted
    }

    pub fn into_inner(self) -> R {
        self.source
    }
}

/// Blocking counterpart of [`ChunkReader`] over [`std::io::Read`].
#[derive(Debug)]
pub struct BlockingChunkReader<R> {
    source: R,
    chunk: Chunk,
    exhausted: bool,
}

impl<R: Read> BlockingChunkReader<R> {
    #[must_use]
    pub fn new(source: R, chunk_size: usize) -> Self {
        Self {
            source,
            chunk: Chunk::with_capacity(chunk_size),
            exhausted: false,
        }
    }

    /// # Errors
    ///
    /// Propagates the reader's error.
    pub fn next_chunk(&mut self) -> io::Result<Option<&[u8]>> {
        if self.exhausted {
            return Ok(None);
        }
        self.chunk.clear();
        self.exhausted = self.chunk.fill_blocking(&mut self.source)?;
        tracing::trace!(len = self.chunk.len(), exhausted = self.exhausted, "read chunk");
        if self.chunk.is_empty() {
            return Ok(None);
        }
        Ok(Some(self.chunk.as_bytes()))
    }

    pub fn into_inner(self) -> R {
        self.source
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn read_all_combines_held_chunks_in_order() {
        let body: Vec<u8> = (0..=255u8).cycle().take(1000).collect();
        for chunk_size in [1, 3, 7, 256, 999, 1000, 1001, 8192] {
            let mut source = &body[..];
            let all = read_all(&mut source, chunk_size).await.unwrap();
            assert_eq!(all, body, "chunk size {chunk_size}");
        }
    }

    #[tokio::test]
    async fn read_all_of_empty_source() {
        let mut source: &[u8] = b"";
        assert!(read_all(&mut source, 16).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn short_reads_still_fill_whole_chunks() {
        let mut source = tokio_test::io::Builder::new()
            .read(b"ab")
            .read(b"c")
            .read(b"defg")
            .build();
        let mut reader = ChunkReader::new(&mut source, 4);
        assert_eq!(reader.next_chunk().await.unwrap(), Some(&b"abcd"[..]));
        assert_eq!(reader.next_chunk().await.unwrap(), Some(&b"efg"[..]));
        assert!(reader.is_exhausted());
        assert_eq!(reader.next_chunk().await.unwrap(), None);
    }

    #[tokio::test]
    async fn transport_failure_is_propagated() {
        let mut source = tokio_test::io::Builder::new()
            .read(b"[1,")
            .read_error(io::Error::new(io::ErrorKind::ConnectionReset, "reset"))
            .build();
        let err = read_all(&mut source, 2).await.unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::ConnectionReset);
    }

    #[test]
    fn blocking_reader_reuses_one_chunk() {
        let mut reader = BlockingChunkReader::new(&b"hello world"[..], 5);
        let mut seen = Vec::new();
        while let Some(chunk) = reader.next_chunk().unwrap() {
            assert!(chunk.len() <= 5);
            seen.extend_from_slice(chunk);
        }
        assert_eq!(seen, b"hello world");
    }

    #[test]
    fn zero_capacity_is_raised() {
        let chunk = Chunk::with_capacity(0);
        assert_eq!(chunk.capacity(), 1);
        assert!(chunk.is_empty());
        assert!(!chunk.is_full());
    }
}
