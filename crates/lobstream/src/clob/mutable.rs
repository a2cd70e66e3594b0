//! Writable character LOB over a private byte store.
//!
//! Overview
//! - Content lives in a [`ByteRangeStore`] in the variable-width encoding
//!   from [`crate::codec`], so character positions are resolved by scanning.
//!   A [`PositionCache`] remembers the last resolved point and lets
//!   sequential callers resume from it.
//! - The decoded length is cached once known. `None` means unknown; a known
//!   empty value is `Some(0)` and is never rescanned.
//! - An internal reader can be borrowed for bulk reads (substring, search).
//!   It lives inside the lock and is repositioned in place, so consecutive
//!   forward reads do not reopen the store.
//!
//! Locking
//! - Every public method runs under the instance mutex. The position cache
//!   and internal reader are only touched with that mutex held.
//! - [`InternalReader`] keeps the mutex for as long as it is alive, which
//!   serializes it against writers on other threads.
//!
//! Mutations
//! - `insert_*` overwrites the run of characters that the new text covers
//!   and appends whatever extends past the end. Every mutation drops the
//!   internal reader; the cache is kept only when the bytes in front of it
//!   are unchanged.

use std::{
    fmt,
    io::{BufReader, Read},
    sync::Arc,
};

use parking_lot::{Mutex, MutexGuard};
use tracing::trace;

use super::{CharLob, writer::ClobWriter};
use crate::{
    codec::{self, SkipCount},
    error::{ArgumentError, LobError, Result},
    options::LobOptions,
    position_cache::PositionCache,
    reader::{CharRead, Utf8Reader},
    store::{ByteRangeStore, MemoryStore},
};

/// Writable character value over a [`ByteRangeStore`].
///
/// Positions are translated to byte offsets through a [`PositionCache`], so
/// walking forward through the value only decodes each byte once.
pub struct MutableCharLob<S: ByteRangeStore = MemoryStore> {
    inner: Mutex<Inner<S>>,
}

struct Inner<S: ByteRangeStore> {
    store: S,
    cache: PositionCache,
    char_length: Option<u64>,
    released: bool,
    internal_reader: Option<PositionedReader<S::Stream>>,
    options: LobOptions,
}

struct PositionedReader<R> {
    reader: Utf8Reader<R>,
    /// Character the next read returns.
    char_pos: u64,
    /// Store update count the reader was opened at.
    update_count: u64,
}

fn check_position(char_pos: u64) -> Result<()> {
    if char_pos == 0 {
        return Err(ArgumentError::BadPosition(char_pos).into());
    }
    Ok(())
}

impl<S: ByteRangeStore> Inner<S> {
    fn new(store: S, char_length: Option<u64>, options: LobOptions) -> Self {
        Self {
            store,
            cache: PositionCache::new(),
            char_length,
            released: false,
            internal_reader: None,
            options,
        }
    }

    fn check_live(&self) -> Result<()> {
        if self.released { Err(LobError::InvalidState) } else { Ok(()) }
    }

    fn scan_from(&self, byte_pos: u64, max_chars: u64) -> Result<SkipCount> {
        let stream = self.store.input_stream(byte_pos)?;
        let mut src = BufReader::with_capacity(self.options.read_buffer_size.max(1), stream);
        codec::scan(&mut src, byte_pos, max_chars, |_| {})
    }

    fn char_length(&mut self) -> Result<u64> {
        self.check_live()?;
        if let Some(len) = self.char_length {
            return Ok(len);
        }
        let len = self.scan_from(0, u64::MAX)?.chars;
        self.char_length = Some(len);
        Ok(len)
    }

    /// Byte offset of `char_pos`, or `None` when it lies past the
    /// one-past-end position.
    fn probe_byte_position(&mut self, char_pos: u64) -> Result<Option<u64>> {
        check_position(char_pos)?;
        if let Some(byte_pos) = self.cache.lookup(char_pos) {
            return Ok(Some(byte_pos));
        }

        let (from_char, from_byte) = if char_pos > self.cache.char_pos() {
            (self.cache.char_pos(), self.cache.byte_pos())
        } else {
            (1, 0)
        };
        let wanted = char_pos - from_char;
        let count = self.scan_from(from_byte, wanted)?;
        if count.chars < wanted {
            return Ok(None);
        }

        let byte_pos = from_byte + count.bytes;
        self.cache.update(char_pos, byte_pos)?;
        Ok(Some(byte_pos))
    }

    fn translate(&mut self, char_pos: u64) -> Result<u64> {
        self.check_live()?;
        self.probe_byte_position(char_pos)?
            .ok_or(LobError::EndOfValue { pos: char_pos })
    }

    fn insert(&mut self, units: &[u16], pos: u64) -> Result<u64> {
        self.check_live()?;
        let start = self.translate(pos)?;
        let byte_len = self.store.length()?;
        let encoded = codec::encode_units(units);
        let written = units.len() as u64;

        if start == byte_len {
            self.store.write(&encoded, start)?;
        } else {
            // Overwrite the characters the new text covers; past the end of
            // the value everything up to the end is replaced.
            let end = self.probe_byte_position(pos + written)?.unwrap_or(byte_len);
            self.cache.update(pos, start)?;
            self.store.replace_bytes(&encoded, start, end)?;
        }

        self.internal_reader = None;
        if let Some(prev) = self.char_length {
            self.char_length = Some(prev.max(pos - 1 + written));
        }
        Ok(written)
    }

    fn truncate(&mut self, new_len: u64) -> Result<()> {
        self.check_live()?;
        // Always from byte 0: the cache may point past the new end.
        let count = self.scan_from(0, new_len)?;
        if count.chars < new_len {
            return Err(LobError::EndOfValue { pos: new_len });
        }
        self.store.truncate(count.bytes)?;
        self.cache.reset();
        self.internal_reader = None;
        self.char_length = Some(new_len);
        Ok(())
    }

    fn open_reader(&mut self, char_pos: u64) -> Result<Utf8Reader<S::Stream>> {
        let byte_pos = self.translate(char_pos)?;
        let stream = self.store.input_stream(byte_pos)?;
        Ok(Utf8Reader::new(stream, byte_pos, self.options.read_buffer_size))
    }

    fn position_internal_reader(&mut self, char_pos: u64) -> Result<()> {
        self.check_live()?;
        check_position(char_pos)?;
        let update_count = self.store.update_count();

        let reader = match self.internal_reader.take() {
            Some(mut current) if current.update_count == update_count && current.char_pos <= char_pos => {
                let gap = char_pos - current.char_pos;
                if current.reader.skip(gap)? < gap {
                    return Err(LobError::EndOfValue { pos: char_pos });
                }
                current.char_pos = char_pos;
                current
            }
            _ => PositionedReader {
                reader: self.open_reader(char_pos)?,
                char_pos,
                update_count,
            },
        };
        self.internal_reader = Some(reader);
        Ok(())
    }

    fn release(&mut self) -> Result<()> {
        if self.released {
            return Ok(());
        }
        self.released = true;
        self.internal_reader = None;
        self.cache.reset();
        self.char_length = None;
        trace!("releasing character store");
        self.store.free()
    }
}

impl<S: ByteRangeStore> MutableCharLob<S> {
    /// Wraps `store`, whose current bytes become the value's content.
    ///
    /// # Errors
    ///
    /// Fails if the store cannot report its length.
    pub fn new(store: S, options: LobOptions) -> Result<Self> {
        let char_length = (store.length()? == 0).then_some(0);
        Ok(Self::from_inner(Inner::new(store, char_length, options)))
    }

    /// Replaces the contents of `store` with `text`.
    ///
    /// # Errors
    ///
    /// Store failures propagate.
    pub fn from_str(text: &str, mut store: S, options: LobOptions) -> Result<Self> {
        let units: Vec<u16> = text.encode_utf16().collect();
        let len = store.length()?;
        store.replace_bytes(&codec::encode_units(&units), 0, len)?;
        Ok(Self::from_inner(Inner::new(store, Some(units.len() as u64), options)))
    }

    /// Copies the content of `source` into `store`, keeping at most `limit`
    /// characters.
    ///
    /// When the exact length of `source` is known and no shorter prefix is
    /// requested, the bytes are copied without decoding.
    ///
    /// # Errors
    ///
    /// [`LobError::TruncatedSource`] if `limit` asks for more characters than
    /// `source` holds. Store and source failures propagate.
    pub fn clone_from(source: &dyn CharLob, limit: Option<u64>, mut store: S, options: LobOptions) -> Result<Self> {
        let char_length = match (source.char_length_if_known(), limit) {
            (Some(available), Some(requested)) if requested > available => {
                return Err(LobError::TruncatedSource { requested, available });
            }
            (Some(known), None) => {
                store.copy_data(&mut source.raw_byte_stream()?, u64::MAX)?;
                known
            }
            (Some(known), Some(requested)) if requested == known => {
                store.copy_data(&mut source.raw_byte_stream()?, u64::MAX)?;
                known
            }
            (_, limit) => {
                let raw = source.raw_byte_stream()?;
                let mut src = BufReader::with_capacity(options.read_buffer_size.max(1), raw);
                let copied = store.copy_encoded_data(&mut src, limit.unwrap_or(u64::MAX))?;
                match limit {
                    Some(requested) if copied < requested => {
                        return Err(LobError::TruncatedSource {
                            requested,
                            available: copied,
                        });
                    }
                    _ => copied,
                }
            }
        };
        Ok(Self::from_inner(Inner::new(store, Some(char_length), options)))
    }

    fn from_inner(inner: Inner<S>) -> Self {
        Self {
            inner: Mutex::new(inner),
        }
    }

    /// Exact length of the encoded content in bytes.
    ///
    /// # Errors
    ///
    /// [`LobError::InvalidState`] once released.
    pub fn byte_length(&self) -> Result<u64> {
        let inner = self.inner.lock();
        inner.check_live()?;
        inner.store.length()
    }

    /// Exact number of characters, scanning the store the first time.
    ///
    /// # Errors
    ///
    /// [`LobError::InvalidState`] once released; decode and store failures.
    pub fn char_length(&self) -> Result<u64> {
        self.inner.lock().char_length()
    }

    /// The cached length, if one is known.
    #[must_use]
    pub fn char_length_if_known(&self) -> Option<u64> {
        let inner = self.inner.lock();
        if inner.released { None } else { inner.char_length }
    }

    /// Byte offset at which character `char_pos` starts. `length + 1`
    /// resolves to the end of the store.
    ///
    /// # Errors
    ///
    /// [`LobError::InvalidArgument`] for position zero,
    /// [`LobError::EndOfValue`] beyond `length + 1`.
    pub fn translate_to_byte_position(&self, char_pos: u64) -> Result<u64> {
        self.inner.lock().translate(char_pos)
    }

    /// Stream over the encoded bytes, from the first byte.
    ///
    /// # Errors
    ///
    /// [`LobError::InvalidState`] once released.
    pub fn raw_byte_stream(&self) -> Result<S::Stream> {
        let inner = self.inner.lock();
        inner.check_live()?;
        inner.store.input_stream(0)
    }

    /// Fresh decoding reader positioned at `char_pos`.
    ///
    /// # Errors
    ///
    /// Same as [`MutableCharLob::translate_to_byte_position`].
    pub fn reader(&self, char_pos: u64) -> Result<Utf8Reader<S::Stream>> {
        let mut inner = self.inner.lock();
        inner.check_live()?;
        check_position(char_pos)?;
        inner.open_reader(char_pos)
    }

    /// Borrows the long-lived internal reader, repositioned at `char_pos`.
    ///
    /// The instance stays locked until the returned reader is dropped.
    ///
    /// # Errors
    ///
    /// Same as [`MutableCharLob::translate_to_byte_position`].
    pub fn internal_reader(&self, char_pos: u64) -> Result<InternalReader<'_, S>> {
        let mut guard = self.inner.lock();
        guard.position_internal_reader(char_pos)?;
        Ok(InternalReader { guard })
    }

    /// Character writer that starts writing at `pos`.
    ///
    /// # Errors
    ///
    /// [`LobError::InvalidState`] once released, [`LobError::InvalidArgument`]
    /// for position zero.
    pub fn writer(self: &Arc<Self>, pos: u64) -> Result<ClobWriter<S>> {
        let mut inner = self.inner.lock();
        inner.check_live()?;
        check_position(pos)?;
        if pos < inner.cache.char_pos() {
            inner.cache.reset();
        }
        Ok(ClobWriter::new(Arc::clone(self), pos))
    }

    /// Writes `text` starting at `pos`, returning the number of characters
    /// written.
    ///
    /// # Errors
    ///
    /// [`LobError::EndOfValue`] if `pos > length + 1`.
    pub fn insert_string(&self, text: &str, pos: u64) -> Result<u64> {
        let units: Vec<u16> = text.encode_utf16().collect();
        self.insert_units(&units, pos)
    }

    /// Writes raw code units starting at `pos`.
    ///
    /// # Errors
    ///
    /// See [`MutableCharLob::insert_string`].
    pub fn insert_units(&self, units: &[u16], pos: u64) -> Result<u64> {
        self.inner.lock().insert(units, pos)
    }

    /// Cuts the value down to `new_len` characters.
    ///
    /// # Errors
    ///
    /// [`LobError::EndOfValue`] if `new_len` exceeds the current length.
    pub fn truncate(&self, new_len: u64) -> Result<()> {
        self.inner.lock().truncate(new_len)
    }

    /// Frees the store. Idempotent.
    ///
    /// # Errors
    ///
    /// Store failures while freeing propagate.
    pub fn release(&self) -> Result<()> {
        self.inner.lock().release()
    }

    /// Whether [`MutableCharLob::release`] has run.
    #[must_use]
    pub fn is_released(&self) -> bool {
        self.inner.lock().released
    }

    /// The store's update count.
    #[must_use]
    pub fn update_count(&self) -> u64 {
        self.inner.lock().store.update_count()
    }
}

impl MutableCharLob {
    /// Empty in-memory value.
    #[must_use]
    pub fn empty(options: LobOptions) -> Self {
        Self::from_inner(Inner::new(MemoryStore::new(), Some(0), options))
    }

    /// In-memory value holding `text`.
    #[must_use]
    pub fn with_text(text: &str, options: LobOptions) -> Self {
        let units: Vec<u16> = text.encode_utf16().collect();
        let store = MemoryStore::from_vec(codec::encode_units(&units));
        Self::from_inner(Inner::new(store, Some(units.len() as u64), options))
    }
}

impl<S: ByteRangeStore> fmt::Debug for MutableCharLob<S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut s = f.debug_struct("MutableCharLob");
        match self.inner.try_lock() {
            Some(inner) => s
                .field("cache", &inner.cache)
                .field("char_length", &inner.char_length)
                .field("released", &inner.released)
                .field("update_count", &inner.store.update_count())
                .finish(),
            None => s.finish_non_exhaustive(),
        }
    }
}

impl<S> CharLob for MutableCharLob<S>
where
    S: ByteRangeStore + 'static,
{
    fn char_length(&self) -> Result<u64> {
        MutableCharLob::char_length(self)
    }

    fn char_length_if_known(&self) -> Option<u64> {
        MutableCharLob::char_length_if_known(self)
    }

    fn byte_length(&self) -> Result<u64> {
        MutableCharLob::byte_length(self)
    }

    fn raw_byte_stream(&self) -> Result<Box<dyn Read + Send>> {
        Ok(Box::new(MutableCharLob::raw_byte_stream(self)?))
    }

    fn reader(&self, char_pos: u64) -> Result<Box<dyn CharRead + Send>> {
        Ok(Box::new(MutableCharLob::reader(self, char_pos)?))
    }

    fn internal_reader(&self, char_pos: u64) -> Result<Box<dyn CharRead + '_>> {
        Ok(Box::new(MutableCharLob::internal_reader(self, char_pos)?))
    }

    fn update_count(&self) -> u64 {
        MutableCharLob::update_count(self)
    }

    fn is_released(&self) -> bool {
        MutableCharLob::is_released(self)
    }

    fn is_writable(&self) -> bool {
        true
    }

    fn release(&self) -> Result<()> {
        MutableCharLob::release(self)
    }
}

/// The internal reader of a [`MutableCharLob`], borrowed with the instance
/// locked. Dropping it hands the reader back; it cannot be closed.
pub struct InternalReader<'a, S: ByteRangeStore> {
    guard: MutexGuard<'a, Inner<S>>,
}

impl<S: ByteRangeStore> CharRead for InternalReader<'_, S> {
    fn read(&mut self, buf: &mut [u16]) -> Result<usize> {
        let current = self.guard.internal_reader.as_mut().ok_or(LobError::InvalidState)?;
        let n = current.reader.read(buf)?;
        current.char_pos += n as u64;
        Ok(n)
    }

    fn skip(&mut self, n: u64) -> Result<u64> {
        let current = self.guard.internal_reader.as_mut().ok_or(LobError::InvalidState)?;
        let skipped = current.reader.skip(n)?;
        current.char_pos += skipped;
        Ok(skipped)
    }
}

#[cfg(test)]
mod tests {
    use std::io::Read;

    use super::*;
    use crate::clob::StoredCharLob;

    fn lob(text: &str) -> MutableCharLob {
        MutableCharLob::from_str(text, MemoryStore::new(), LobOptions::default()).unwrap()
    }

    fn contents(lob: &MutableCharLob) -> String {
        let mut out = String::new();
        lob.reader(1).unwrap().read_to_string(&mut out).unwrap();
        out
    }

    #[test]
    fn translates_positions_through_multibyte_characters() {
        let lob = lob("héllo");
        assert_eq!(lob.translate_to_byte_position(1).unwrap(), 0);
        assert_eq!(lob.translate_to_byte_position(2).unwrap(), 1);
        assert_eq!(lob.translate_to_byte_position(3).unwrap(), 3);
        assert_eq!(lob.translate_to_byte_position(6).unwrap(), 6);
        assert_eq!(lob.char_length().unwrap(), 5);
        assert_eq!(lob.byte_length().unwrap(), 6);
        assert!(matches!(
            lob.translate_to_byte_position(7),
            Err(LobError::EndOfValue { pos: 7 })
        ));
        assert!(matches!(
            lob.translate_to_byte_position(0),
            Err(LobError::InvalidArgument(ArgumentError::BadPosition(0)))
        ));
    }

    #[test]
    fn backwards_lookup_rescans_from_the_start() {
        let lob = lob("aé€b");
        assert_eq!(lob.translate_to_byte_position(4).unwrap(), 6);
        assert_eq!(lob.translate_to_byte_position(2).unwrap(), 1);
        assert_eq!(lob.translate_to_byte_position(3).unwrap(), 3);
    }

    #[test]
    fn insert_overwrites_the_characters_it_covers() {
        let lob = lob("héllo");
        assert_eq!(lob.insert_string("X", 3).unwrap(), 1);
        assert_eq!(contents(&lob), "héXlo");
        assert_eq!(lob.char_length().unwrap(), 5);
    }

    #[test]
    fn insert_past_the_end_replaces_the_tail_and_grows() {
        let lob = lob("héllo");
        lob.insert_string("€€€€", 4).unwrap();
        assert_eq!(contents(&lob), "hél€€€€");
        assert_eq!(lob.char_length_if_known(), Some(7));
        assert_eq!(lob.byte_length().unwrap(), 1 + 2 + 1 + 12);
    }

    #[test]
    fn append_at_one_past_end() {
        let lob = lob("héllo");
        let before = lob.byte_length().unwrap();
        lob.insert_string(" wörld", 6).unwrap();
        assert_eq!(contents(&lob), "héllo wörld");
        assert_eq!(lob.char_length().unwrap(), 11);
        let mut raw = Vec::new();
        lob.raw_byte_stream().unwrap().read_to_end(&mut raw).unwrap();
        assert_eq!(&raw[usize::try_from(before).unwrap()..], codec::encode_str(" wörld"));
    }

    #[test]
    fn insert_beyond_one_past_end_fails() {
        let lob = lob("ab");
        assert!(matches!(lob.insert_string("x", 4), Err(LobError::EndOfValue { pos: 4 })));
        assert_eq!(contents(&lob), "ab");
    }

    #[test]
    fn empty_value_has_known_zero_length() {
        let lob = MutableCharLob::new(MemoryStore::new(), LobOptions::default()).unwrap();
        assert_eq!(lob.char_length_if_known(), Some(0));
        lob.insert_string("abc", 1).unwrap();
        assert_eq!(lob.char_length_if_known(), Some(3));
    }

    #[test]
    fn unknown_length_is_scanned_once() {
        let store = MemoryStore::from_vec(codec::encode_str("naïve"));
        let lob = MutableCharLob::new(store, LobOptions::default()).unwrap();
        assert_eq!(lob.char_length_if_known(), None);
        assert_eq!(lob.char_length().unwrap(), 5);
        assert_eq!(lob.char_length_if_known(), Some(5));
    }

    #[test]
    fn truncate_sets_the_exact_length() {
        let lob = lob("héllo");
        lob.translate_to_byte_position(5).unwrap();
        lob.truncate(2).unwrap();
        assert_eq!(contents(&lob), "hé");
        assert_eq!(lob.char_length_if_known(), Some(2));
        assert_eq!(lob.translate_to_byte_position(3).unwrap(), 3);
        assert!(matches!(lob.truncate(3), Err(LobError::EndOfValue { pos: 3 })));
        lob.truncate(0).unwrap();
        assert_eq!(lob.byte_length().unwrap(), 0);
    }

    #[test]
    fn internal_reader_is_reused_for_forward_reads() {
        let lob = lob("abcdef");
        let mut buf = [0u16; 2];
        {
            let mut reader = lob.internal_reader(2).unwrap();
            assert_eq!(reader.read(&mut buf).unwrap(), 2);
            assert_eq!(String::from_utf16_lossy(&buf), "bc");
        }
        {
            let mut reader = lob.internal_reader(5).unwrap();
            assert_eq!(reader.read(&mut buf).unwrap(), 2);
            assert_eq!(String::from_utf16_lossy(&buf), "ef");
        }
        {
            let mut reader = lob.internal_reader(1).unwrap();
            assert_eq!(reader.read(&mut buf).unwrap(), 2);
            assert_eq!(String::from_utf16_lossy(&buf), "ab");
        }
    }

    #[test]
    fn internal_reader_sees_mutations() {
        let lob = lob("abcdef");
        let mut buf = [0u16; 3];
        lob.internal_reader(1).unwrap().read(&mut buf).unwrap();
        lob.insert_string("XY", 4).unwrap();
        let mut reader = lob.internal_reader(4).unwrap();
        assert_eq!(reader.read(&mut buf).unwrap(), 3);
        assert_eq!(String::from_utf16_lossy(&buf), "XYf");
    }

    #[test]
    fn writer_advances_with_each_write() {
        let lob = Arc::new(lob("0123456789"));
        let mut writer = lob.writer(3).unwrap();
        writer.write_str("ab").unwrap();
        writer.write_str("€").unwrap();
        assert_eq!(writer.position(), 6);
        assert_eq!(contents(&lob), "01ab€56789");
    }

    #[test]
    fn clone_copies_raw_bytes_when_length_is_known() {
        let source = lob("héllo");
        source.char_length().unwrap();
        let copy = MutableCharLob::clone_from(&source, None, MemoryStore::new(), LobOptions::default()).unwrap();
        assert_eq!(contents(&copy), "héllo");
        assert_eq!(copy.char_length_if_known(), Some(5));
    }

    #[test]
    fn clone_with_limit_decodes_a_prefix() {
        let source = StoredCharLob::new(codec::encode_str("héllo"), None, LobOptions::default());
        let copy = MutableCharLob::clone_from(&source, Some(3), MemoryStore::new(), LobOptions::default()).unwrap();
        assert_eq!(contents(&copy), "hél");
        assert_eq!(copy.char_length_if_known(), Some(3));
        assert_eq!(copy.byte_length().unwrap(), 4);
    }

    #[test]
    fn clone_asking_for_too_much_fails() {
        let unknown = StoredCharLob::new(codec::encode_str("abc"), None, LobOptions::default());
        assert!(matches!(
            MutableCharLob::clone_from(&unknown, Some(5), MemoryStore::new(), LobOptions::default()),
            Err(LobError::TruncatedSource { requested: 5, available: 3 })
        ));
        let known = lob("abc");
        assert!(matches!(
            MutableCharLob::clone_from(&known, Some(4), MemoryStore::new(), LobOptions::default()),
            Err(LobError::TruncatedSource { requested: 4, available: 3 })
        ));
    }

    #[test]
    fn release_is_idempotent_and_blocks_everything_else() {
        let lob = lob("héllo");
        lob.release().unwrap();
        lob.release().unwrap();
        assert!(lob.is_released());
        assert!(matches!(lob.char_length(), Err(LobError::InvalidState)));
        assert!(matches!(lob.byte_length(), Err(LobError::InvalidState)));
        assert!(matches!(lob.reader(1), Err(LobError::InvalidState)));
        assert!(matches!(lob.internal_reader(1), Err(LobError::InvalidState)));
        assert!(matches!(lob.insert_string("x", 1), Err(LobError::InvalidState)));
        assert!(matches!(lob.truncate(0), Err(LobError::InvalidState)));
        assert_eq!(lob.char_length_if_known(), None);
    }
}
