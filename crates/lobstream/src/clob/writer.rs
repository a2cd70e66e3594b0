use std::{fmt, sync::Arc};

use super::MutableCharLob;
use crate::{
    error::Result,
    store::{ByteRangeStore, MemoryStore},
};

/// Character writer over a [`MutableCharLob`].
///
/// Each write lands at the writer's current position, overwriting what is
/// there, and moves the position past the written text.
#[derive(Debug)]
pub struct ClobWriter<S: ByteRangeStore = MemoryStore> {
    lob: Arc<MutableCharLob<S>>,
    pos: u64,
}

impl<S: ByteRangeStore> ClobWriter<S> {
    pub(crate) fn new(lob: Arc<MutableCharLob<S>>, pos: u64) -> Self {
        Self { lob, pos }
    }

    /// Position the next write starts at.
    #[must_use]
    pub fn position(&self) -> u64 {
        self.pos
    }

    /// # Errors
    ///
    /// Fails like [`MutableCharLob::insert_string`], including
    /// [`crate::LobError::InvalidState`] once the value is released.
    pub fn write_str(&mut self, text: &str) -> Result<u64> {
        let written = self.lob.insert_string(text, self.pos)?;
        self.pos += written;
        Ok(written)
    }

    /// # Errors
    ///
    /// See [`ClobWriter::write_str`].
    pub fn write_units(&mut self, units: &[u16]) -> Result<u64> {
        let written = self.lob.insert_units(units, self.pos)?;
        self.pos += written;
        Ok(written)
    }
}

/// Lets `write!` target the value. The underlying [`crate::LobError`] is
/// lost; call [`ClobWriter::write_str`] directly to keep it.
impl<S: ByteRangeStore> fmt::Write for ClobWriter<S> {
    fn write_str(&mut self, text: &str) -> fmt::Result {
        ClobWriter::write_str(self, text).map(drop).map_err(|_| fmt::Error)
    }
}
