use std::{
    io::{self, Read},
    sync::Weak,
};

use tracing::{debug, trace};

use super::{BlobShared, BlobState};
use crate::{
    error::{LobError, Result},
    store::{ByteRangeStore, MemoryStream},
};

/// Byte stream over a [`crate::Blob`] that survives materialization.
///
/// Until the value is first written, the stream reads the engine's stored
/// bytes. Once the value has been copied into its own store the stream moves
/// over to that store at the same logical offset, and from then on follows
/// the store's content. The switch happens at most once.
pub struct ResyncingByteStream {
    owner: Weak<BlobShared>,
    /// Logical offset of the next byte, 0-based.
    pos: u64,
    /// Offset the stream stops at.
    end: u64,
    materialized: bool,
    /// Update count of the store the inner stream was opened on.
    seen: u64,
    inner: MemoryStream,
}

impl ResyncingByteStream {
    pub(crate) fn new(owner: Weak<BlobShared>, inner: MemoryStream, materialized: bool, seen: u64, pos: u64, end: u64) -> Self {
        Self {
            owner,
            pos,
            end,
            materialized,
            seen,
            inner,
        }
    }

    /// 1-based position of the next byte.
    #[must_use]
    pub fn position(&self) -> u64 {
        self.pos + 1
    }

    /// Whether the stream has moved over to the materialized store.
    #[must_use]
    pub fn is_materialized(&self) -> bool {
        self.materialized
    }

    fn sync(&mut self) -> Result<()> {
        let owner = self.owner.upgrade().ok_or(LobError::InvalidState)?;
        let state = owner.state.lock();
        let store = match &*state {
            BlobState::Released => return Err(LobError::InvalidState),
            BlobState::Stored(_) => return Ok(()),
            BlobState::Materialized(store) => store,
        };

        let update_count = store.update_count();
        if self.materialized && update_count == self.seen {
            return Ok(());
        }
        let mut inner = store.input_stream(0)?;
        let moved = inner.skip(self.pos);
        if self.materialized {
            trace!(pos = self.pos, update_count, "binary stream reopened after write");
        } else {
            debug!(pos = self.pos, "binary value materialized, stream rebound");
            self.materialized = true;
        }
        if moved < self.pos {
            trace!(pos = self.pos, len = moved, "binary value shrank below the stream");
        }
        self.inner = inner;
        self.seen = update_count;
        Ok(())
    }

    fn left(&mut self) -> Result<u64> {
        self.sync()?;
        Ok(self.end.saturating_sub(self.pos))
    }

    /// Reads one byte, or `None` at the end of the stream.
    ///
    /// # Errors
    ///
    /// [`LobError::InvalidState`] once the value is freed.
    pub fn read_byte(&mut self) -> Result<Option<u8>> {
        let mut one = [0u8; 1];
        let n = self.read_into(&mut one)?;
        Ok((n == 1).then_some(one[0]))
    }

    /// Skips up to `n` bytes, stopping at the end of the stream.
    ///
    /// # Errors
    ///
    /// [`LobError::InvalidState`] once the value is freed.
    pub fn skip(&mut self, n: u64) -> Result<u64> {
        let left = self.left()?;
        let skipped = self.inner.skip(n.min(left));
        self.pos += skipped;
        Ok(skipped)
    }

    fn read_into(&mut self, buf: &mut [u8]) -> Result<usize> {
        let left = self.left()?;
        let want = usize::try_from(left).map_or(buf.len(), |left| left.min(buf.len()));
        let n = self.inner.read(&mut buf[..want])?;
        self.pos += n as u64;
        Ok(n)
    }
}

impl Read for ResyncingByteStream {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        Ok(self.read_into(buf)?)
    }
}

impl std::fmt::Debug for ResyncingByteStream {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ResyncingByteStream")
            .field("pos", &self.pos)
            .field("end", &self.end)
            .field("materialized", &self.materialized)
            .finish_non_exhaustive()
    }
}
