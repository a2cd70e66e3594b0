use std::io::{self, Read, Write};

use super::{ClobWriter, ResyncingCharReader};
use crate::reader::CharRead;

/// Byte view of a character stream. Code units above `0xFF` read as `?`.
#[derive(Debug)]
pub struct AsciiStream {
    reader: ResyncingCharReader,
    chunk: Vec<u16>,
}

impl AsciiStream {
    pub(crate) fn new(reader: ResyncingCharReader) -> Self {
        Self {
            reader,
            chunk: Vec::new(),
        }
    }

    /// Closes the underlying character reader. Later reads fail.
    pub fn close(&mut self) {
        self.reader.close();
    }
}

impl Read for AsciiStream {
    #[allow(clippy::cast_possible_truncation)]
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        self.chunk.resize(buf.len(), 0);
        let n = self.reader.read(&mut self.chunk)?;
        for (dst, &unit) in buf.iter_mut().zip(&self.chunk[..n]) {
            *dst = if unit <= 0xFF { unit as u8 } else { b'?' };
        }
        Ok(n)
    }
}

/// Byte writer over a character value. Each byte is stored as the character
/// with the same code.
#[derive(Debug)]
pub struct AsciiWriter {
    writer: ClobWriter,
    chunk: Vec<u16>,
}

impl AsciiWriter {
    pub(crate) fn new(writer: ClobWriter) -> Self {
        Self {
            writer,
            chunk: Vec::new(),
        }
    }

    /// Character position the next byte lands at.
    #[must_use]
    pub fn position(&self) -> u64 {
        self.writer.position()
    }
}

impl Write for AsciiWriter {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.chunk.clear();
        self.chunk.extend(buf.iter().map(|&byte| u16::from(byte)));
        self.writer.write_units(&self.chunk)?;
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}
