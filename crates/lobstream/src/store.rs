//! Byte-addressable backing storage for LOB values.
//!
//! A [`ByteRangeStore`] is owned by exactly one value. Every mutating call
//! bumps the store's update counter once; readers compare counters to find
//! out whether the stream they hold still reflects the store.

use std::{
    fmt,
    io::{self, BufRead, Read},
    sync::Arc,
};

use bstr::BStr;

use crate::{
    codec,
    error::{LobError, Result},
};

/// Byte storage behind a writable character value.
///
/// Every mutating call bumps [`ByteRangeStore::update_count`] exactly once.
pub trait ByteRangeStore: Send {
    /// Stream type handed out by [`ByteRangeStore::input_stream`].
    type Stream: Read + Send + 'static;

    /// Returns a stream positioned at `byte_pos`.
    ///
    /// # Errors
    ///
    /// [`LobError::EndOfValue`] if `byte_pos` exceeds the length,
    /// [`LobError::InvalidState`] once freed.
    fn input_stream(&self, byte_pos: u64) -> Result<Self::Stream>;

    /// Overwrites (and possibly extends) the store with `bytes` starting at
    /// `at`, returning the position just past the written range.
    ///
    /// # Errors
    ///
    /// [`LobError::EndOfValue`] if `at` exceeds the length,
    /// [`LobError::InvalidState`] once freed.
    fn write(&mut self, bytes: &[u8], at: u64) -> Result<u64>;

    /// Replaces the range `start..end` with `bytes`; the store grows or
    /// shrinks as needed.
    ///
    /// # Errors
    ///
    /// [`LobError::EndOfValue`] if the range is not inside the store,
    /// [`LobError::InvalidState`] once freed.
    fn replace_bytes(&mut self, bytes: &[u8], start: u64, end: u64) -> Result<()>;

    /// Shrinks the store to `len` bytes.
    ///
    /// # Errors
    ///
    /// [`LobError::EndOfValue`] if `len` exceeds the length,
    /// [`LobError::InvalidState`] once freed.
    fn truncate(&mut self, len: u64) -> Result<()>;

    /// Number of stored bytes.
    ///
    /// # Errors
    ///
    /// [`LobError::InvalidState`] once freed.
    fn length(&self) -> Result<u64>;

    /// Count of mutations so far.
    fn update_count(&self) -> u64;

    /// Drops the contents. Idempotent.
    ///
    /// # Errors
    ///
    /// Implementation specific; [`MemoryStore`] never fails.
    fn free(&mut self) -> Result<()>;

    /// Appends up to `max_bytes` bytes read from `src`, returning the
    /// number appended.
    ///
    /// # Errors
    ///
    /// I/O failures of `src` and failures of [`ByteRangeStore::write`].
    fn copy_data(&mut self, src: &mut dyn Read, max_bytes: u64) -> Result<u64> {
        let mut bytes = Vec::new();
        src.take(max_bytes).read_to_end(&mut bytes)?;
        let at = self.length()?;
        self.write(&bytes, at)?;
        Ok(bytes.len() as u64)
    }

    /// Appends up to `max_chars` encoded characters read from `src`,
    /// returning the number of characters appended.
    ///
    /// # Errors
    ///
    /// [`LobError::MalformedData`] if `src` is not validly encoded, plus the
    /// failures of [`ByteRangeStore::copy_data`].
    fn copy_encoded_data(&mut self, src: &mut dyn BufRead, max_chars: u64) -> Result<u64> {
        let mut bytes = Vec::new();
        let count = codec::scan(src, 0, max_chars, |chunk| bytes.extend_from_slice(chunk))?;
        let at = self.length()?;
        self.write(&bytes, at)?;
        Ok(count.chars)
    }
}

/// Heap-backed store.
///
/// Contents are copy-on-write: a [`MemoryStream`] keeps the bytes it was
/// opened on even if the store is mutated afterwards.
#[derive(Clone, Default)]
pub struct MemoryStore {
    data: Arc<Vec<u8>>,
    update_count: u64,
    freed: bool,
}

impl MemoryStore {
    /// Empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Store holding `data`.
    #[must_use]
    pub fn from_vec(data: Vec<u8>) -> Self {
        Self {
            data: Arc::new(data),
            update_count: 0,
            freed: false,
        }
    }

    fn check_live(&self) -> Result<()> {
        if self.freed { Err(LobError::InvalidState) } else { Ok(()) }
    }

    fn index(&self, pos: u64) -> Result<usize> {
        usize::try_from(pos)
            .ok()
            .filter(|&i| i <= self.data.len())
            .ok_or(LobError::EndOfValue { pos })
    }

    fn bytes_mut(&mut self) -> &mut Vec<u8> {
        self.update_count += 1;
        Arc::make_mut(&mut self.data)
    }
}

impl fmt::Debug for MemoryStore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        const PREVIEW: usize = 32;
        let shown = &self.data[..self.data.len().min(PREVIEW)];
        f.debug_struct("MemoryStore")
            .field("len", &self.data.len())
            .field("head", &BStr::new(shown))
            .field("update_count", &self.update_count)
            .field("freed", &self.freed)
            .finish()
    }
}

impl ByteRangeStore for MemoryStore {
    type Stream = MemoryStream;

    fn input_stream(&self, byte_pos: u64) -> Result<MemoryStream> {
        self.check_live()?;
        let pos = self.index(byte_pos)?;
        Ok(MemoryStream {
            data: Arc::clone(&self.data),
            pos,
        })
    }

    fn write(&mut self, bytes: &[u8], at: u64) -> Result<u64> {
        self.check_live()?;
        let start = self.index(at)?;
        let data = self.bytes_mut();
        let overlap = bytes.len().min(data.len() - start);
        data[start..start + overlap].copy_from_slice(&bytes[..overlap]);
        data.extend_from_slice(&bytes[overlap..]);
        Ok(at + bytes.len() as u64)
    }

    fn replace_bytes(&mut self, bytes: &[u8], start: u64, end: u64) -> Result<()> {
        self.check_live()?;
        let from = self.index(start)?;
        let to = self.index(end)?;
        if to < from {
            return Err(LobError::EndOfValue { pos: start });
        }
        self.bytes_mut().splice(from..to, bytes.iter().copied());
        Ok(())
    }

    fn truncate(&mut self, len: u64) -> Result<()> {
        self.check_live()?;
        let len = self.index(len)?;
        self.bytes_mut().truncate(len);
        Ok(())
    }

    fn length(&self) -> Result<u64> {
        self.check_live()?;
        Ok(self.data.len() as u64)
    }

    fn update_count(&self) -> u64 {
        self.update_count
    }

    fn free(&mut self) -> Result<()> {
        if !self.freed {
            self.freed = true;
            self.data = Arc::default();
        }
        Ok(())
    }
}

/// Snapshot stream over [`MemoryStore`] contents or any shared byte buffer.
#[derive(Debug, Clone)]
pub struct MemoryStream {
    data: Arc<Vec<u8>>,
    pos: usize,
}

impl MemoryStream {
    /// Stream over `data`, starting at byte `pos` (clamped to the end).
    #[must_use]
    pub fn new(data: Arc<Vec<u8>>, pos: u64) -> Self {
        let pos = usize::try_from(pos).map_or(data.len(), |p| p.min(data.len()));
        Self { data, pos }
    }

    /// Advances by up to `n` bytes, returning how far it moved.
    pub fn skip(&mut self, n: u64) -> u64 {
        let step = usize::try_from(n).map_or(self.remaining(), |n| n.min(self.remaining()));
        self.pos += step;
        step as u64
    }

    /// Bytes left before the end of the snapshot.
    #[must_use]
    pub fn remaining(&self) -> usize {
        self.data.len() - self.pos
    }
}

impl Read for MemoryStream {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        let n = buf.len().min(self.remaining());
        buf[..n].copy_from_slice(&self.data[self.pos..self.pos + n]);
        self.pos += n;
        Ok(n)
    }
}

impl BufRead for MemoryStream {
    fn fill_buf(&mut self) -> io::Result<&[u8]> {
        Ok(&self.data[self.pos..])
    }

    fn consume(&mut self, amt: usize) {
        self.pos = (self.pos + amt).min(self.data.len());
    }
}
