//! Streaming substring search over chunked input.

/// Knuth-Morris-Pratt matcher fed one chunk at a time, so callers never
/// need to back up the stream they search.
#[derive(Debug)]
pub(crate) struct StreamSearch<T> {
    pattern: Vec<T>,
    failure: Vec<usize>,
    matched: usize,
    consumed: u64,
}

impl<T: PartialEq + Copy> StreamSearch<T> {
    /// `pattern` must not be empty.
    pub(crate) fn new(pattern: Vec<T>) -> Self {
        debug_assert!(!pattern.is_empty());
        let mut failure = vec![0; pattern.len()];
        let mut k = 0;
        for i in 1..pattern.len() {
            while k > 0 && pattern[i] != pattern[k] {
                k = failure[k - 1];
            }
            if pattern[i] == pattern[k] {
                k += 1;
            }
            failure[i] = k;
        }
        Self {
            pattern,
            failure,
            matched: 0,
            consumed: 0,
        }
    }

    /// Feeds the next chunk. Returns the zero-based offset, relative to the
    /// first element ever fed, at which the first match starts.
    pub(crate) fn feed(&mut self, chunk: &[T]) -> Option<u64> {
        for (i, &item) in chunk.iter().enumerate() {
            while self.matched > 0 && item != self.pattern[self.matched] {
                self.matched = self.failure[self.matched - 1];
            }
            if item == self.pattern[self.matched] {
                self.matched += 1;
            }
            if self.matched == self.pattern.len() {
                let end = self.consumed + i as u64 + 1;
                return Some(end - self.pattern.len() as u64);
            }
        }
        self.consumed += chunk.len() as u64;
        None
    }
}
