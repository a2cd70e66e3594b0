use std::io::{BufRead, BufReader, Read};

use crate::{
    codec::{self, sequence_width},
    error::{LobError, Result},
};

/// Sequential reader of UTF-16 code units.
///
/// The contract mirrors [`std::io::Read`]: `Ok(0)` from a non-empty buffer
/// means end of stream.
pub trait CharRead {
    /// Reads up to `buf.len()` code units, returning how many were read.
    ///
    /// # Errors
    ///
    /// Implementation specific; see the implementing type.
    fn read(&mut self, buf: &mut [u16]) -> Result<usize>;

    /// Skips up to `n` code units, returning how many were skipped.
    ///
    /// # Errors
    ///
    /// Implementation specific; see the implementing type.
    fn skip(&mut self, n: u64) -> Result<u64> {
        let mut scratch = [0u16; 512];
        let mut skipped = 0;
        while skipped < n {
            let want = usize::try_from(n - skipped).map_or(scratch.len(), |w| w.min(scratch.len()));
            let got = self.read(&mut scratch[..want])?;
            if got == 0 {
                break;
            }
            skipped += got as u64;
        }
        Ok(skipped)
    }

    /// Reads a single code unit, or `None` at end of stream.
    ///
    /// # Errors
    ///
    /// See [`CharRead::read`].
    fn read_unit(&mut self) -> Result<Option<u16>> {
        let mut one = [0u16; 1];
        Ok((self.read(&mut one)? == 1).then_some(one[0]))
    }

    /// Drains the stream into `out`, returning the number of code units
    /// consumed. Unpaired surrogates become U+FFFD.
    ///
    /// # Errors
    ///
    /// See [`CharRead::read`].
    fn read_to_string(&mut self, out: &mut String) -> Result<u64> {
        let mut units = Vec::new();
        let mut chunk = [0u16; 1024];
        loop {
            let n = self.read(&mut chunk)?;
            if n == 0 {
                break;
            }
            units.extend_from_slice(&chunk[..n]);
        }
        out.extend(char::decode_utf16(units.iter().copied()).map(|c| c.unwrap_or(char::REPLACEMENT_CHARACTER)));
        Ok(units.len() as u64)
    }
}

impl<T: CharRead + ?Sized> CharRead for Box<T> {
    fn read(&mut self, buf: &mut [u16]) -> Result<usize> {
        (**self).read(buf)
    }

    fn skip(&mut self, n: u64) -> Result<u64> {
        (**self).skip(n)
    }
}

/// Decodes code units from an encoded byte stream.
#[derive(Debug)]
pub struct Utf8Reader<R> {
    src: BufReader<R>,
    /// Absolute byte offset of the next undecoded byte.
    offset: u64,
}

impl<R: Read> Utf8Reader<R> {
    /// Wraps `src`, whose first byte sits at absolute offset `offset` in its
    /// store.
    pub fn new(src: R, offset: u64, buffer_size: usize) -> Self {
        Self {
            src: BufReader::with_capacity(buffer_size.max(1), src),
            offset,
        }
    }

    /// Byte offset of the next undecoded byte.
    #[must_use]
    pub fn byte_offset(&self) -> u64 {
        self.offset
    }

    fn next_unit(&mut self) -> Result<Option<u16>> {
        let start = self.offset;
        let buf = self.src.fill_buf()?;
        let Some(&lead) = buf.first() else {
            return Ok(None);
        };
        let width = sequence_width(lead).ok_or(LobError::MalformedData { offset: start })?;

        let unit = if buf.len() >= width {
            let unit = codec::decode_sequence(&buf[..width], start)?;
            self.src.consume(width);
            unit
        } else {
            // The sequence straddles a buffer refill.
            let mut seq = [0u8; 3];
            self.src
                .read_exact(&mut seq[..width])
                .map_err(|_| LobError::MalformedData { offset: start })?;
            codec::decode_sequence(&seq[..width], start)?
        };
        self.offset += width as u64;
        Ok(Some(unit))
    }
}

impl<R: Read> CharRead for Utf8Reader<R> {
    fn read(&mut self, buf: &mut [u16]) -> Result<usize> {
        let mut n = 0;
        while n < buf.len() {
            match self.next_unit()? {
                Some(unit) => {
                    buf[n] = unit;
                    n += 1;
                }
                None => break,
            }
        }
        Ok(n)
    }

    fn skip(&mut self, n: u64) -> Result<u64> {
        let count = codec::scan(&mut self.src, self.offset, n, |_| {})?;
        self.offset += count.bytes;
        Ok(count.chars)
    }
}

/// A reader that is already at end of stream.
#[derive(Debug, Clone, Copy, Default)]
pub struct Exhausted;

impl CharRead for Exhausted {
    fn read(&mut self, _buf: &mut [u16]) -> Result<usize> {
        Ok(0)
    }

    fn skip(&mut self, _n: u64) -> Result<u64> {
        Ok(0)
    }
}
