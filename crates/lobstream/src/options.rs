/// Tuning knobs shared by character and binary values.
///
/// # Examples
///
/// ```rust
/// use lobstream::{Clob, LobOptions};
///
/// let options = LobOptions {
///     read_buffer_size: 64 * 1024,
///     ..Default::default()
/// };
/// let clob = Clob::with_options(options);
/// assert_eq!(clob.length().unwrap(), 0);
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LobOptions {
    /// Capacity of the buffer placed in front of store streams while
    /// scanning for character positions or decoding text.
    ///
    /// # Default
    ///
    /// `8192`
    pub read_buffer_size: usize,

    /// Number of characters fetched per chunk when searching a character
    /// value for a pattern.
    ///
    /// # Default
    ///
    /// `4096`
    pub search_chunk_size: usize,
}

impl Default for LobOptions {
    fn default() -> Self {
        Self {
            read_buffer_size: 8192,
            search_chunk_size: 4096,
        }
    }
}
