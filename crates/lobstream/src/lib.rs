//! Streaming access to character and binary large objects.
//!
//! Character values are kept in a compact variable-width encoding, so a
//! character position has to be resolved by decoding from some earlier
//! known point. [`MutableCharLob`] remembers the last resolved point in a
//! [`PositionCache`] and resumes from there.
//!
//! Readers handed out by [`Clob`] and [`Blob`] stay usable while the value
//! changes underneath them. A [`ResyncingCharReader`] reopens itself at its
//! logical position whenever the value was modified or swapped to another
//! representation. A [`ResyncingByteStream`] does the same when a binary
//! value is materialized into its own store.

mod blob;
mod clob;
pub mod codec;
mod error;
mod options;
mod position_cache;
mod reader;
mod search;
mod store;

#[cfg(test)]
mod tests;

pub use blob::{Blob, ResyncingByteStream};
pub use clob::{
    AsciiStream, AsciiWriter, BindingVersion, CharBinding, CharLob, Clob, ClobWriter, InternalReader, MutableCharLob,
    ResyncingCharReader, StoredCharLob,
};
pub use error::{ArgumentError, LobError, Result};
pub use options::LobOptions;
pub use position_cache::PositionCache;
pub use reader::{CharRead, Exhausted, Utf8Reader};
pub use store::{ByteRangeStore, MemoryStore, MemoryStream};
