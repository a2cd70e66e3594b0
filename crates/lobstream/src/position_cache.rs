use crate::error::{LobError, Result};

/// Remembers the byte offset of the last character position resolved.
///
/// Translating a character position into a byte offset means decoding every
/// character in front of it. Sequential access asks for positions in
/// increasing order, so starting each scan from the last known point keeps
/// a full pass linear instead of quadratic.
///
/// Not synchronized; the owning value guards it with its own lock.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PositionCache {
    char_pos: u64,
    byte_pos: u64,
}

impl Default for PositionCache {
    fn default() -> Self {
        Self {
            char_pos: 1,
            byte_pos: 0,
        }
    }
}

impl PositionCache {
    /// Cache holding the first character at byte 0.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Cached 1-based character position.
    #[must_use]
    pub fn char_pos(&self) -> u64 {
        self.char_pos
    }

    /// Byte offset where [`PositionCache::char_pos`] starts.
    #[must_use]
    pub fn byte_pos(&self) -> u64 {
        self.byte_pos
    }

    /// Byte offset of `char_pos` if it is the cached position.
    #[must_use]
    pub fn lookup(&self, char_pos: u64) -> Option<u64> {
        (char_pos == self.char_pos).then_some(self.byte_pos)
    }

    /// Records that character `char_pos` starts at `byte_pos`.
    ///
    /// # Errors
    ///
    /// [`LobError::InvariantViolation`] if `char_pos` is zero or if
    /// `char_pos - 1 > byte_pos`: every character takes at least one byte.
    pub fn update(&mut self, char_pos: u64, byte_pos: u64) -> Result<()> {
        if char_pos == 0 || char_pos - 1 > byte_pos {
            return Err(LobError::InvariantViolation { char_pos, byte_pos });
        }
        self.char_pos = char_pos;
        self.byte_pos = byte_pos;
        Ok(())
    }

    /// Forgets everything but the start of the value.
    pub fn reset(&mut self) {
        *self = Self::default();
    }
}
