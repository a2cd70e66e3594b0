//! Character reader that follows its value through mutations and
//! representation swaps.
//!
//! Reopening a decoder means rescanning from the nearest known position,
//! so the reader keeps one inner decoder across calls and only rebuilds it
//! when the value's [`BindingVersion`] changes. The version covers both
//! cases: an in-place mutation bumps the update count, and a swap to a new
//! representation bumps the generation.
//!
//! The reader only holds a [`Weak`] reference to its value and takes the
//! current binding afresh on every call. Once the value is released the
//! reader closes itself.

use std::sync::Weak;

use tracing::{debug, trace};

use super::{BindingVersion, CharBinding, ClobShared};
use crate::{
    error::{LobError, Result},
    reader::{CharRead, Exhausted},
};

/// Character stream over a [`crate::Clob`], optionally limited to a window.
pub struct ResyncingCharReader {
    owner: Weak<ClobShared>,
    /// Next character to deliver, 1-based.
    pos: u64,
    /// First position past the readable window.
    end: u64,
    last_seen: Option<BindingVersion>,
    inner: Option<Box<dyn CharRead + Send>>,
    closed: bool,
}

impl ResyncingCharReader {
    /// Reader over `len` characters from `pos`, or to the end of the value
    /// when `len` is `None`.
    pub(crate) fn new(owner: Weak<ClobShared>, pos: u64, len: Option<u64>) -> Self {
        Self {
            owner,
            pos,
            end: len.map_or(u64::MAX, |len| pos.saturating_add(len)),
            last_seen: None,
            inner: None,
            closed: false,
        }
    }

    /// Position of the next character this reader returns.
    #[must_use]
    pub fn position(&self) -> u64 {
        self.pos
    }

    /// Whether the reader has been closed.
    #[must_use]
    pub fn is_closed(&self) -> bool {
        self.closed
    }

    /// Closes the reader. Idempotent; later reads fail with
    /// [`LobError::StreamClosed`].
    pub fn close(&mut self) {
        self.closed = true;
        self.inner = None;
        self.last_seen = None;
    }

    fn binding(owner: &ClobShared) -> Option<CharBinding> {
        owner.current_binding().filter(|binding| !binding.is_released())
    }

    /// Brings the inner reader up to date. Returns `false` when the value
    /// is gone and the reader has closed itself.
    fn resync(&mut self) -> Result<bool> {
        let Some(owner) = self.owner.upgrade() else {
            debug!(pos = self.pos, "character value dropped, closing reader");
            self.close();
            return Ok(false);
        };
        self.open_current(|| Self::binding(&owner))
    }

    /// Reopens the inner reader on the binding `fetch` yields, unless it is
    /// already open on that version. `fetch` returns `None` for a released
    /// value.
    fn open_current(&mut self, mut fetch: impl FnMut() -> Option<CharBinding>) -> Result<bool> {
        // A released binding may just have been swapped for a writable copy,
        // either before it was taken or before it was opened. Ask once more
        // before giving up.
        let mut retried = false;
        loop {
            let Some(binding) = fetch() else {
                if !retried {
                    retried = true;
                    continue;
                }
                debug!(pos = self.pos, "character value released, closing reader");
                self.close();
                return Ok(false);
            };

            let version = binding.version();
            if self.inner.is_some() && self.last_seen == Some(version) {
                return Ok(true);
            }
            trace!(pos = self.pos, old = ?self.last_seen, new = ?version, "reopening inner reader");
            let inner: Box<dyn CharRead + Send> = match binding.lob().reader(self.pos) {
                Ok(reader) => reader,
                // The value shrank below the cursor.
                Err(LobError::EndOfValue { .. }) => Box::new(Exhausted),
                Err(LobError::InvalidState) if !retried => {
                    retried = true;
                    continue;
                }
                Err(LobError::InvalidState) => {
                    debug!(pos = self.pos, "character value released while reopening, closing reader");
                    self.close();
                    return Ok(false);
                }
                Err(err) => return Err(err),
            };
            self.inner = Some(inner);
            self.last_seen = Some(version);
            return Ok(true);
        }
    }

    fn window_left(&mut self) -> Result<Option<u64>> {
        if self.closed {
            return Err(LobError::StreamClosed);
        }
        if self.pos >= self.end || !self.resync()? {
            return Ok(None);
        }
        Ok(Some(self.end - self.pos))
    }
}

impl CharRead for ResyncingCharReader {
    fn read(&mut self, buf: &mut [u16]) -> Result<usize> {
        let Some(left) = self.window_left()? else {
            return Ok(0);
        };
        let want = usize::try_from(left).map_or(buf.len(), |left| left.min(buf.len()));
        let inner = self.inner.as_mut().ok_or(LobError::StreamClosed)?;
        let n = inner.read(&mut buf[..want])?;
        self.pos += n as u64;
        Ok(n)
    }

    fn skip(&mut self, n: u64) -> Result<u64> {
        let Some(left) = self.window_left()? else {
            return Ok(0);
        };
        let inner = self.inner.as_mut().ok_or(LobError::StreamClosed)?;
        let skipped = inner.skip(n.min(left))?;
        self.pos += skipped;
        Ok(skipped)
    }
}

impl std::fmt::Debug for ResyncingCharReader {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ResyncingCharReader")
            .field("pos", &self.pos)
            .field("end", &self.end)
            .field("last_seen", &self.last_seen)
            .field("closed", &self.closed)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use std::{io::Read, sync::Arc, time::Duration};

    use rstest::rstest;

    use super::*;
    use crate::{CharLob, Clob, LobOptions, MutableCharLob, StoredCharLob, codec};

    /// Stored value that is released after it was bound but before it is
    /// opened, as happens when a writer swaps the representation in between.
    struct ReleasedOnOpen(StoredCharLob);

    impl CharLob for ReleasedOnOpen {
        fn char_length(&self) -> Result<u64> {
            self.0.char_length()
        }

        fn char_length_if_known(&self) -> Option<u64> {
            self.0.char_length_if_known()
        }

        fn byte_length(&self) -> Result<u64> {
            self.0.byte_length()
        }

        fn raw_byte_stream(&self) -> Result<Box<dyn Read + Send>> {
            self.0.raw_byte_stream()
        }

        fn reader(&self, char_pos: u64) -> Result<Box<dyn CharRead + Send>> {
            self.0.release()?;
            self.0.reader(char_pos)
        }

        fn internal_reader(&self, char_pos: u64) -> Result<Box<dyn CharRead + '_>> {
            self.0.release()?;
            self.0.internal_reader(char_pos)
        }

        fn update_count(&self) -> u64 {
            self.0.update_count()
        }

        fn is_released(&self) -> bool {
            self.0.is_released()
        }

        fn is_writable(&self) -> bool {
            false
        }

        fn release(&self) -> Result<()> {
            self.0.release()
        }
    }

    fn released_on_open(text: &str) -> ReleasedOnOpen {
        ReleasedOnOpen(StoredCharLob::new(codec::encode_str(text), None, LobOptions::default()))
    }

    fn bound(generation: u64, lob: impl CharLob + 'static) -> CharBinding {
        CharBinding {
            generation,
            lob: Arc::new(lob),
        }
    }

    fn read_n(reader: &mut ResyncingCharReader, n: usize) -> String {
        let mut buf = vec![0u16; n];
        let got = reader.read(&mut buf).unwrap();
        String::from_utf16_lossy(&buf[..got])
    }

    fn rest(reader: &mut ResyncingCharReader) -> String {
        let mut out = String::new();
        reader.read_to_string(&mut out).unwrap();
        out
    }

    #[rstest]
    #[timeout(Duration::from_millis(1_000))]
    fn follows_text_written_after_the_cursor() {
        let clob = Clob::from_text("abcdefgh");
        let mut reader = clob.character_stream().unwrap();
        assert_eq!(read_n(&mut reader, 3), "abc");
        clob.set_string(4, "XYZ").unwrap();
        assert_eq!(reader.position(), 4);
        assert_eq!(rest(&mut reader), "XYZgh");
    }

    #[rstest]
    #[timeout(Duration::from_millis(1_000))]
    fn sees_end_of_stream_after_truncation_below_the_cursor() {
        let clob = Clob::from_text("abcdefgh");
        let mut reader = clob.character_stream().unwrap();
        assert_eq!(read_n(&mut reader, 5), "abcde");
        clob.truncate(2).unwrap();
        assert_eq!(read_n(&mut reader, 4), "");
        clob.set_string(3, "cdefZZ").unwrap();
        assert_eq!(rest(&mut reader), "fZZ");
    }

    #[rstest]
    #[timeout(Duration::from_millis(1_000))]
    fn migrates_from_stored_to_writable_representation() {
        let clob = Clob::from_stored(codec::encode_str("stored text"), None);
        let mut reader = clob.character_stream().unwrap();
        assert_eq!(read_n(&mut reader, 7), "stored ");
        let before = clob.binding().unwrap().version();
        clob.set_string(1, "STORED").unwrap();
        assert_ne!(before, clob.binding().unwrap().version());
        assert_eq!(rest(&mut reader), "text");
    }

    #[test]
    fn closes_itself_when_the_value_is_freed() {
        let clob = Clob::from_text("abc");
        let mut reader = clob.character_stream().unwrap();
        assert_eq!(read_n(&mut reader, 1), "a");
        clob.free().unwrap();
        assert_eq!(read_n(&mut reader, 1), "");
        assert!(reader.is_closed());
        let mut buf = [0u16; 1];
        assert!(matches!(reader.read(&mut buf), Err(LobError::StreamClosed)));
    }

    #[test]
    fn closes_itself_when_the_value_is_dropped() {
        let clob = Clob::from_text("abc");
        let mut reader = clob.character_stream().unwrap();
        drop(clob);
        assert_eq!(read_n(&mut reader, 3), "");
        assert!(reader.is_closed());
    }

    #[test]
    fn opens_the_writable_copy_when_the_stored_value_is_released_mid_open() {
        let copy = MutableCharLob::with_text("new text", LobOptions::default());
        let mut bindings = vec![bound(0, released_on_open("old text")), bound(1, copy)].into_iter();
        let mut reader = ResyncingCharReader::new(Weak::new(), 5, None);

        assert!(reader.open_current(|| bindings.next()).unwrap());
        assert!(!reader.is_closed());
        assert_eq!(reader.last_seen.map(|version| version.generation), Some(1));
        let mut out = String::new();
        reader.inner.as_mut().unwrap().read_to_string(&mut out).unwrap();
        assert_eq!(out, "text");
    }

    #[test]
    fn closes_when_the_value_is_freed_mid_open() {
        let mut bindings = vec![bound(0, released_on_open("abc"))].into_iter();
        let mut reader = ResyncingCharReader::new(Weak::new(), 1, None);

        assert!(!reader.open_current(|| bindings.next()).unwrap());
        assert!(reader.is_closed());
        let mut buf = [0u16; 1];
        assert!(matches!(reader.read(&mut buf), Err(LobError::StreamClosed)));
    }

    #[test]
    fn window_bounds_reads_and_skips() {
        let clob = Clob::from_text("0123456789");
        let mut reader = clob.character_stream_range(3, 5).unwrap();
        assert_eq!(reader.skip(2).unwrap(), 2);
        assert_eq!(read_n(&mut reader, 10), "456");
        assert_eq!(reader.skip(1).unwrap(), 0);
        assert_eq!(read_n(&mut reader, 1), "");
    }

    #[test]
    fn close_is_idempotent_and_final() {
        let clob = Clob::from_text("abc");
        let mut reader = clob.character_stream().unwrap();
        reader.close();
        reader.close();
        assert!(matches!(reader.skip(1), Err(LobError::StreamClosed)));
        let mut buf = [0u16; 1];
        assert!(matches!(reader.read(&mut buf), Err(LobError::StreamClosed)));
    }

    #[test]
    fn empty_buffer_reads_nothing_without_closing() {
        let clob = Clob::from_text("abc");
        let mut reader = clob.character_stream().unwrap();
        assert_eq!(reader.read(&mut []).unwrap(), 0);
        assert_eq!(read_n(&mut reader, 3), "abc");
    }
}
