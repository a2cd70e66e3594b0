//! Binary LOB values.
//!
//! A [`Blob`] either references bytes held by the engine or owns a
//! [`MemoryStore`]. The switch from the first to the second happens on the
//! first write and is never undone.

mod stream;

use std::{
    fmt,
    io::{BufRead, Read},
    sync::{Arc, Weak},
};

use parking_lot::Mutex;
use tracing::{debug, warn};

pub use self::stream::ResyncingByteStream;
use crate::{
    error::{ArgumentError, LobError, Result},
    options::LobOptions,
    search::StreamSearch,
    store::{ByteRangeStore, MemoryStore, MemoryStream},
};

pub(crate) enum BlobState {
    Stored(Arc<Vec<u8>>),
    Materialized(MemoryStore),
    Released,
}

impl BlobState {
    /// Stream from the first byte, the current update count, and whether the
    /// value is materialized.
    fn open(&self) -> Result<(MemoryStream, u64, bool)> {
        match self {
            Self::Stored(bytes) => Ok((MemoryStream::new(Arc::clone(bytes), 0), 0, false)),
            Self::Materialized(store) => Ok((store.input_stream(0)?, store.update_count(), true)),
            Self::Released => Err(LobError::InvalidState),
        }
    }

    fn length(&self) -> Result<u64> {
        match self {
            Self::Stored(bytes) => Ok(bytes.len() as u64),
            Self::Materialized(store) => store.length(),
            Self::Released => Err(LobError::InvalidState),
        }
    }

    fn materialize(&mut self) -> Result<&mut MemoryStore> {
        if let Self::Stored(bytes) = self {
            let store = MemoryStore::from_vec(bytes.to_vec());
            debug!(len = bytes.len(), "materializing binary value");
            *self = Self::Materialized(store);
        }
        match self {
            Self::Materialized(store) => Ok(store),
            Self::Stored(_) | Self::Released => Err(LobError::InvalidState),
        }
    }
}

/// State shared between a [`Blob`] and its streams.
pub(crate) struct BlobShared {
    pub(crate) state: Mutex<BlobState>,
    options: LobOptions,
}

/// A binary large object. Positions are 1-based byte offsets.
pub struct Blob {
    shared: Arc<BlobShared>,
}

fn check_position(pos: u64) -> Result<()> {
    if pos == 0 {
        return Err(ArgumentError::BadPosition(pos).into());
    }
    Ok(())
}

impl Blob {
    /// Empty materialized value.
    #[must_use]
    pub fn new() -> Self {
        Self::with_options(LobOptions::default())
    }

    /// Empty materialized value with custom `options`.
    #[must_use]
    pub fn with_options(options: LobOptions) -> Self {
        Self::with_state(BlobState::Materialized(MemoryStore::new()), options)
    }

    /// Materialized value owning `bytes`.
    #[must_use]
    pub fn from_bytes(bytes: Vec<u8>) -> Self {
        Self::with_state(BlobState::Materialized(MemoryStore::from_vec(bytes)), LobOptions::default())
    }

    /// Unmaterialized value referencing `bytes`. Nothing is copied until the
    /// first write.
    #[must_use]
    pub fn from_stored(bytes: impl Into<Arc<Vec<u8>>>) -> Self {
        Self::from_stored_with_options(bytes, LobOptions::default())
    }

    /// Like [`Blob::from_stored`], with custom `options`.
    #[must_use]
    pub fn from_stored_with_options(bytes: impl Into<Arc<Vec<u8>>>, options: LobOptions) -> Self {
        Self::with_state(BlobState::Stored(bytes.into()), options)
    }

    fn with_state(state: BlobState, options: LobOptions) -> Self {
        Self {
            shared: Arc::new(BlobShared {
                state: Mutex::new(state),
                options,
            }),
        }
    }

    /// # Errors
    ///
    /// [`LobError::InvalidState`] once freed.
    pub fn is_materialized(&self) -> Result<bool> {
        match &*self.shared.state.lock() {
            BlobState::Stored(_) => Ok(false),
            BlobState::Materialized(_) => Ok(true),
            BlobState::Released => Err(LobError::InvalidState),
        }
    }

    /// # Errors
    ///
    /// [`LobError::InvalidState`] once freed.
    pub fn length(&self) -> Result<u64> {
        self.shared.state.lock().length()
    }

    /// Snapshot stream at 0-based `offset`, after checking that `offset` is
    /// at most the length.
    fn open_at(&self, pos: u64) -> Result<(MemoryStream, u64, bool)> {
        check_position(pos)?;
        let (mut stream, update_count, materialized) = self.shared.state.lock().open()?;
        if stream.skip(pos - 1) < pos - 1 {
            return Err(LobError::EndOfValue { pos });
        }
        Ok((stream, update_count, materialized))
    }

    /// Up to `len` bytes starting at `pos`; shorter if the value ends first.
    ///
    /// # Errors
    ///
    /// [`LobError::InvalidArgument`] for position zero,
    /// [`LobError::EndOfValue`] past `length + 1`.
    pub fn get_bytes(&self, pos: u64, len: usize) -> Result<Vec<u8>> {
        let (stream, ..) = self.open_at(pos)?;
        let mut out = Vec::with_capacity(len.min(stream.remaining()));
        stream.take(len as u64).read_to_end(&mut out)?;
        Ok(out)
    }

    /// Stream over the whole value.
    ///
    /// # Errors
    ///
    /// [`LobError::InvalidState`] once freed.
    pub fn binary_stream(&self) -> Result<ResyncingByteStream> {
        let (stream, update_count, materialized) = self.open_at(1)?;
        Ok(ResyncingByteStream::new(self.weak(), stream, materialized, update_count, 0, u64::MAX))
    }

    /// Stream over `len` bytes starting at `pos`.
    ///
    /// # Errors
    ///
    /// [`LobError::InvalidArgument`] for position zero or a window reaching
    /// past the current end.
    pub fn binary_stream_range(&self, pos: u64, len: u64) -> Result<ResyncingByteStream> {
        check_position(pos)?;
        let length = self.length()?;
        if length.checked_sub(pos - 1).is_none_or(|available| len > available) {
            return Err(ArgumentError::WindowBeyondEnd { pos, len }.into());
        }
        let (stream, update_count, materialized) = self.open_at(pos)?;
        let start = pos - 1;
        Ok(ResyncingByteStream::new(
            self.weak(),
            stream,
            materialized,
            update_count,
            start,
            start + len,
        ))
    }

    /// Position of the first occurrence of `pattern` at or after `start`.
    /// An empty pattern matches at `start`.
    ///
    /// # Errors
    ///
    /// [`LobError::InvalidArgument`] for position zero,
    /// [`LobError::EndOfValue`] past `length + 1`.
    pub fn position(&self, pattern: &[u8], start: u64) -> Result<Option<u64>> {
        let (mut stream, ..) = self.open_at(start)?;
        if pattern.is_empty() {
            return Ok(Some(start));
        }
        let mut search = StreamSearch::new(pattern.to_vec());
        let chunk_size = self.shared.options.search_chunk_size.max(1);
        loop {
            let chunk = stream.fill_buf()?;
            if chunk.is_empty() {
                return Ok(None);
            }
            let n = chunk.len().min(chunk_size);
            if let Some(offset) = search.feed(&chunk[..n]) {
                return Ok(Some(start + offset));
            }
            stream.consume(n);
        }
    }

    /// Writes `bytes` at `pos`, overwriting and extending as needed. The
    /// first write materializes the value.
    ///
    /// # Errors
    ///
    /// [`LobError::InvalidArgument`] for position zero,
    /// [`LobError::EndOfValue`] past `length + 1`.
    pub fn set_bytes(&self, pos: u64, bytes: &[u8]) -> Result<u64> {
        check_position(pos)?;
        let mut state = self.shared.state.lock();
        if pos - 1 > state.length()? {
            return Err(LobError::EndOfValue { pos });
        }
        if bytes.is_empty() {
            return Ok(0);
        }
        state.materialize()?.write(bytes, pos - 1)?;
        Ok(bytes.len() as u64)
    }

    /// Cuts the value down to `len` bytes, materializing it first.
    ///
    /// # Errors
    ///
    /// [`LobError::EndOfValue`] if `len` exceeds the length.
    pub fn truncate(&self, len: u64) -> Result<()> {
        let mut state = self.shared.state.lock();
        if len > state.length()? {
            return Err(LobError::EndOfValue { pos: len });
        }
        state.materialize()?.truncate(len)
    }

    /// Releases the value. Streams fail on their next read. Idempotent.
    ///
    /// # Errors
    ///
    /// Store failures while freeing.
    pub fn free(&self) -> Result<()> {
        let previous = std::mem::replace(&mut *self.shared.state.lock(), BlobState::Released);
        match previous {
            BlobState::Released => Ok(()),
            BlobState::Stored(_) => {
                debug!("freeing stored binary value");
                Ok(())
            }
            BlobState::Materialized(mut store) => {
                debug!("freeing materialized binary value");
                store.free()
            }
        }
    }

    fn weak(&self) -> Weak<BlobShared> {
        Arc::downgrade(&self.shared)
    }
}

impl Default for Blob {
    fn default() -> Self {
        Self::new()
    }
}

impl From<Vec<u8>> for Blob {
    fn from(bytes: Vec<u8>) -> Self {
        Self::from_bytes(bytes)
    }
}

impl Drop for Blob {
    fn drop(&mut self) {
        if let Err(err) = self.free() {
            warn!(%err, "failed to free binary value");
        }
    }
}

impl fmt::Debug for Blob {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut s = f.debug_struct("Blob");
        match self.shared.state.try_lock().as_deref() {
            Some(BlobState::Stored(bytes)) => s.field("stored", &bytes.len()),
            Some(BlobState::Materialized(store)) => s.field("materialized", store),
            Some(BlobState::Released) => s.field("released", &true),
            None => return s.finish_non_exhaustive(),
        };
        s.finish()
    }
}
