//! Character LOB values.
//!
//! A [`Clob`] starts out either empty and writable, or as a read-only
//! [`StoredCharLob`] over bytes supplied by the engine. The first mutation of
//! a stored value copies it into a [`MutableCharLob`] and releases the
//! stored one. Streams handed out by a `Clob` are [`ResyncingCharReader`]s,
//! which notice both kinds of change and carry on from their current
//! character position.

mod ascii;
mod mutable;
mod resync;
mod stored;
mod writer;

use std::{
    fmt,
    io::Read,
    sync::{Arc, Weak},
};

use parking_lot::Mutex;
use tracing::{debug, warn};

pub use self::{
    ascii::{AsciiStream, AsciiWriter},
    mutable::{InternalReader, MutableCharLob},
    resync::ResyncingCharReader,
    stored::StoredCharLob,
    writer::ClobWriter,
};
use crate::{
    error::{ArgumentError, LobError, Result},
    options::LobOptions,
    reader::CharRead,
    search::StreamSearch,
    store::MemoryStore,
};

/// Common interface of the character representations a [`Clob`] can be
/// bound to.
pub trait CharLob: Send + Sync {
    /// Exact number of characters.
    ///
    /// # Errors
    ///
    /// [`LobError::InvalidState`] once released.
    fn char_length(&self) -> Result<u64>;

    /// The cached length, without scanning.
    fn char_length_if_known(&self) -> Option<u64>;

    /// Exact number of encoded bytes.
    ///
    /// # Errors
    ///
    /// [`LobError::InvalidState`] once released.
    fn byte_length(&self) -> Result<u64>;

    /// The encoded bytes, from the start.
    ///
    /// # Errors
    ///
    /// [`LobError::InvalidState`] once released.
    fn raw_byte_stream(&self) -> Result<Box<dyn Read + Send>>;

    /// A fresh reader at `char_pos`, independent of the value's lock.
    ///
    /// # Errors
    ///
    /// [`LobError::EndOfValue`] past `length + 1`, [`LobError::InvalidState`]
    /// once released.
    fn reader(&self, char_pos: u64) -> Result<Box<dyn CharRead + Send>>;

    /// A reader at `char_pos` the value may reuse between calls. It must be
    /// dropped before any other method is called on the same value.
    ///
    /// # Errors
    ///
    /// See [`CharLob::reader`].
    fn internal_reader(&self, char_pos: u64) -> Result<Box<dyn CharRead + '_>>;

    /// Changes whenever the content changes.
    fn update_count(&self) -> u64;

    /// Whether [`CharLob::release`] has run.
    fn is_released(&self) -> bool;

    /// Whether the representation accepts modifications.
    fn is_writable(&self) -> bool;

    /// Frees the representation. Idempotent.
    ///
    /// # Errors
    ///
    /// Store failures while freeing.
    fn release(&self) -> Result<()>;
}

/// Identifies exactly which content a reader was opened against.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BindingVersion {
    /// Bumped each time the owning [`Clob`] swaps representation.
    pub generation: u64,
    /// The representation's own update count.
    pub update_count: u64,
}

/// A representation together with the generation it was bound at.
#[derive(Clone)]
pub struct CharBinding {
    generation: u64,
    lob: Arc<dyn CharLob>,
}

impl CharBinding {
    /// Generation of the owning [`Clob`] this binding was taken at.
    #[must_use]
    pub fn generation(&self) -> u64 {
        self.generation
    }

    /// The bound representation.
    #[must_use]
    pub fn lob(&self) -> &Arc<dyn CharLob> {
        &self.lob
    }

    /// Current staleness key: the generation plus the update count.
    #[must_use]
    pub fn version(&self) -> BindingVersion {
        BindingVersion {
            generation: self.generation,
            update_count: self.lob.update_count(),
        }
    }

    /// Whether the bound representation has been released.
    #[must_use]
    pub fn is_released(&self) -> bool {
        self.lob.is_released()
    }
}

impl fmt::Debug for CharBinding {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CharBinding")
            .field("generation", &self.generation)
            .field("writable", &self.lob.is_writable())
            .field("released", &self.lob.is_released())
            .finish()
    }
}

#[derive(Clone)]
enum Representation {
    Stored(Arc<StoredCharLob>),
    Writable(Arc<MutableCharLob>),
}

impl Representation {
    fn lob(&self) -> Arc<dyn CharLob> {
        match self {
            Self::Stored(lob) => Arc::clone(lob) as Arc<dyn CharLob>,
            Self::Writable(lob) => Arc::clone(lob) as Arc<dyn CharLob>,
        }
    }
}

struct ClobState {
    /// `None` once freed.
    repr: Option<Representation>,
    generation: u64,
}

/// State shared between a [`Clob`] and the readers it hands out.
pub(crate) struct ClobShared {
    state: Mutex<ClobState>,
    options: LobOptions,
}

impl ClobShared {
    pub(crate) fn current_binding(&self) -> Option<CharBinding> {
        let state = self.state.lock();
        state.repr.as_ref().map(|repr| CharBinding {
            generation: state.generation,
            lob: repr.lob(),
        })
    }

    /// The writable representation, creating it from the stored one first if
    /// needed. The flag reports whether a copy was made; `limit` only applies
    /// to that copy.
    fn writable(&self, limit: Option<u64>) -> Result<(Arc<MutableCharLob>, bool)> {
        let mut state = self.state.lock();
        let stored = match &state.repr {
            None => return Err(LobError::InvalidState),
            Some(Representation::Writable(lob)) => return Ok((Arc::clone(lob), false)),
            Some(Representation::Stored(lob)) => Arc::clone(lob),
        };

        let copy = MutableCharLob::clone_from(&*stored, limit, MemoryStore::new(), self.options)?;
        let copy = Arc::new(copy);
        state.repr = Some(Representation::Writable(Arc::clone(&copy)));
        state.generation += 1;
        debug!(generation = state.generation, "stored character value copied for writing");
        stored.release()?;
        Ok((copy, true))
    }
}

/// A character large object.
///
/// All positions are 1-based and count UTF-16 code units.
///
/// # Examples
///
/// ```rust
/// use lobstream::{CharRead, Clob};
///
/// let clob = Clob::from_text("hello world");
/// let mut reader = clob.character_stream().unwrap();
/// let mut head = [0u16; 6];
/// reader.read(&mut head).unwrap();
///
/// clob.set_string(7, "there").unwrap();
/// let mut rest = String::new();
/// reader.read_to_string(&mut rest).unwrap();
/// assert_eq!(rest, "there");
/// ```
pub struct Clob {
    shared: Arc<ClobShared>,
}

impl Clob {
    /// Empty writable value.
    #[must_use]
    pub fn new() -> Self {
        Self::with_options(LobOptions::default())
    }

    /// Empty writable value with custom `options`.
    #[must_use]
    pub fn with_options(options: LobOptions) -> Self {
        let lob = MutableCharLob::empty(options);
        Self::bound_to(Representation::Writable(Arc::new(lob)), options)
    }

    /// Writable value holding `text`.
    #[must_use]
    pub fn from_text(text: &str) -> Self {
        let options = LobOptions::default();
        let lob = MutableCharLob::with_text(text, options);
        Self::bound_to(Representation::Writable(Arc::new(lob)), options)
    }

    /// Read-only value over already encoded `bytes`. It becomes writable on
    /// first modification.
    #[must_use]
    pub fn from_stored(bytes: impl Into<Arc<Vec<u8>>>, char_length: Option<u64>) -> Self {
        Self::from_stored_with_options(bytes, char_length, LobOptions::default())
    }

    /// Like [`Clob::from_stored`], with custom `options`.
    #[must_use]
    pub fn from_stored_with_options(
        bytes: impl Into<Arc<Vec<u8>>>,
        char_length: Option<u64>,
        options: LobOptions,
    ) -> Self {
        let lob = StoredCharLob::new(bytes, char_length, options);
        Self::bound_to(Representation::Stored(Arc::new(lob)), options)
    }

    fn bound_to(repr: Representation, options: LobOptions) -> Self {
        Self {
            shared: Arc::new(ClobShared {
                state: Mutex::new(ClobState {
                    repr: Some(repr),
                    generation: 0,
                }),
                options,
            }),
        }
    }

    /// The representation currently backing this value.
    ///
    /// # Errors
    ///
    /// [`LobError::InvalidState`] once freed.
    pub fn binding(&self) -> Result<CharBinding> {
        self.shared.current_binding().ok_or(LobError::InvalidState)
    }

    /// Whether the value has been copied into a writable representation.
    ///
    /// # Errors
    ///
    /// [`LobError::InvalidState`] once freed.
    pub fn is_writable(&self) -> Result<bool> {
        Ok(self.binding()?.lob.is_writable())
    }

    /// Number of characters.
    ///
    /// # Errors
    ///
    /// [`LobError::InvalidState`] once freed.
    pub fn length(&self) -> Result<u64> {
        self.binding()?.lob.char_length()
    }

    /// Up to `len` characters starting at `pos`; shorter if the value ends
    /// first.
    ///
    /// # Errors
    ///
    /// [`LobError::InvalidArgument`] for position zero,
    /// [`LobError::EndOfValue`] past `length + 1`.
    pub fn get_sub_string(&self, pos: u64, len: usize) -> Result<String> {
        if pos == 0 {
            return Err(ArgumentError::BadPosition(pos).into());
        }
        let binding = self.binding()?;
        let mut reader = binding.lob.internal_reader(pos)?;
        // `len` is only an upper bound, so grow the result chunk by chunk.
        let mut units = Vec::new();
        let mut chunk = vec![0u16; self.shared.options.search_chunk_size.clamp(1, len.max(1))];
        while units.len() < len {
            let want = (len - units.len()).min(chunk.len());
            let n = reader.read(&mut chunk[..want])?;
            if n == 0 {
                break;
            }
            units.extend_from_slice(&chunk[..n]);
        }
        Ok(String::from_utf16_lossy(&units))
    }

    /// Reader over the whole value that follows later modifications.
    ///
    /// # Errors
    ///
    /// [`LobError::InvalidState`] once freed.
    pub fn character_stream(&self) -> Result<ResyncingCharReader> {
        self.binding()?;
        Ok(ResyncingCharReader::new(self.weak(), 1, None))
    }

    /// Reader over `len` characters starting at `pos`.
    ///
    /// # Errors
    ///
    /// [`LobError::InvalidArgument`] for position zero or a window reaching
    /// past the current end.
    pub fn character_stream_range(&self, pos: u64, len: u64) -> Result<ResyncingCharReader> {
        if pos == 0 {
            return Err(ArgumentError::BadPosition(pos).into());
        }
        let length = self.length()?;
        if length.checked_sub(pos - 1).is_none_or(|available| len > available) {
            return Err(ArgumentError::WindowBeyondEnd { pos, len }.into());
        }
        Ok(ResyncingCharReader::new(self.weak(), pos, Some(len)))
    }

    /// Byte stream of the characters, one byte each.
    ///
    /// # Errors
    ///
    /// [`LobError::InvalidState`] once freed.
    pub fn ascii_stream(&self) -> Result<AsciiStream> {
        Ok(AsciiStream::new(self.character_stream()?))
    }

    /// Position of the first occurrence of `pattern` at or after `start`.
    /// An empty pattern matches at `start`.
    ///
    /// # Errors
    ///
    /// [`LobError::InvalidArgument`] for position zero,
    /// [`LobError::EndOfValue`] if `start` is past `length + 1`.
    pub fn position(&self, pattern: &str, start: u64) -> Result<Option<u64>> {
        self.position_units(pattern.encode_utf16().collect(), start)
    }

    /// Like [`Clob::position`], searching for the content of `pattern`.
    ///
    /// # Errors
    ///
    /// See [`Clob::position`]; also fails if `pattern` has been freed.
    pub fn position_clob(&self, pattern: &Clob, start: u64) -> Result<Option<u64>> {
        let mut units = Vec::new();
        let mut reader = pattern.binding()?.lob.reader(1)?;
        let mut chunk = vec![0u16; self.shared.options.search_chunk_size.max(1)];
        loop {
            let n = reader.read(&mut chunk)?;
            if n == 0 {
                break;
            }
            units.extend_from_slice(&chunk[..n]);
        }
        self.position_units(units, start)
    }

    fn position_units(&self, pattern: Vec<u16>, start: u64) -> Result<Option<u64>> {
        if start == 0 {
            return Err(ArgumentError::BadPosition(start).into());
        }
        let binding = self.binding()?;
        if pattern.is_empty() {
            return Ok(Some(start));
        }

        let mut reader = binding.lob.internal_reader(start)?;
        let mut search = StreamSearch::new(pattern);
        let mut chunk = vec![0u16; self.shared.options.search_chunk_size.max(1)];
        loop {
            let n = reader.read(&mut chunk)?;
            if n == 0 {
                return Ok(None);
            }
            if let Some(offset) = search.feed(&chunk[..n]) {
                return Ok(Some(start + offset));
            }
        }
    }

    /// Writes `text` at `pos`, overwriting the characters it covers.
    /// Returns the number of characters written.
    ///
    /// # Errors
    ///
    /// [`LobError::InvalidArgument`] for position zero,
    /// [`LobError::EndOfValue`] if `pos` is past `length + 1`.
    pub fn set_string(&self, pos: u64, text: &str) -> Result<u64> {
        if pos == 0 {
            return Err(ArgumentError::BadPosition(pos).into());
        }
        let length = self.length()?;
        if pos > length + 1 {
            return Err(LobError::EndOfValue { pos });
        }
        if text.is_empty() {
            return Ok(0);
        }
        let (lob, _) = self.shared.writable(None)?;
        lob.insert_string(text, pos)
    }

    /// Writer starting at `pos`.
    ///
    /// # Errors
    ///
    /// [`LobError::InvalidArgument`] for position zero,
    /// [`LobError::InvalidState`] once freed.
    pub fn set_character_stream(&self, pos: u64) -> Result<ClobWriter> {
        if pos == 0 {
            return Err(ArgumentError::BadPosition(pos).into());
        }
        let (lob, _) = self.shared.writable(None)?;
        lob.writer(pos)
    }

    /// Byte writer starting at `pos`; each byte becomes one character.
    ///
    /// # Errors
    ///
    /// See [`Clob::set_character_stream`].
    pub fn set_ascii_stream(&self, pos: u64) -> Result<AsciiWriter> {
        Ok(AsciiWriter::new(self.set_character_stream(pos)?))
    }

    /// Shortens the value to `len` characters.
    ///
    /// # Errors
    ///
    /// [`LobError::EndOfValue`] if `len` exceeds the current length.
    pub fn truncate(&self, len: u64) -> Result<()> {
        let (lob, copied) = self.shared.writable(Some(len)).map_err(|err| match err {
            LobError::TruncatedSource { .. } => LobError::EndOfValue { pos: len },
            err => err,
        })?;
        if copied {
            return Ok(());
        }
        lob.truncate(len)
    }

    /// Releases the value. Readers close on their next call. Idempotent.
    ///
    /// # Errors
    ///
    /// Store failures while freeing.
    pub fn free(&self) -> Result<()> {
        let repr = self.shared.state.lock().repr.take();
        if let Some(repr) = repr {
            debug!("freeing character value");
            repr.lob().release()?;
        }
        Ok(())
    }

    fn weak(&self) -> Weak<ClobShared> {
        Arc::downgrade(&self.shared)
    }
}

impl Default for Clob {
    fn default() -> Self {
        Self::new()
    }
}

impl From<&str> for Clob {
    fn from(text: &str) -> Self {
        Self::from_text(text)
    }
}

impl Drop for Clob {
    fn drop(&mut self) {
        if let Err(err) = self.free() {
            warn!(%err, "failed to free character value");
        }
    }
}

impl fmt::Debug for Clob {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Clob")
            .field("binding", &self.shared.current_binding())
            .finish()
    }
}
