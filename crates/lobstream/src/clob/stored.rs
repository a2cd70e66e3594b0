use std::{
    io::Read,
    sync::{
        Arc,
        atomic::{AtomicBool, Ordering},
    },
};

use parking_lot::Mutex;

use super::CharLob;
use crate::{
    codec,
    error::{ArgumentError, LobError, Result},
    options::LobOptions,
    reader::{CharRead, Utf8Reader},
    store::MemoryStream,
};

/// Read-only character LOB referencing encoded bytes held by the engine.
///
/// This is the representation a value has until it is first modified. It
/// never changes, so its update count is constant.
#[derive(Debug)]
pub struct StoredCharLob {
    data: Arc<Vec<u8>>,
    char_length: Mutex<Option<u64>>,
    released: AtomicBool,
    options: LobOptions,
}

impl StoredCharLob {
    /// `char_length` may be supplied when the engine already knows it.
    pub fn new(data: impl Into<Arc<Vec<u8>>>, char_length: Option<u64>, options: LobOptions) -> Self {
        Self {
            data: data.into(),
            char_length: Mutex::new(char_length),
            released: AtomicBool::new(false),
            options,
        }
    }

    fn check_live(&self) -> Result<()> {
        if self.released.load(Ordering::Acquire) {
            Err(LobError::InvalidState)
        } else {
            Ok(())
        }
    }

    fn decoder(&self) -> Utf8Reader<MemoryStream> {
        Utf8Reader::new(MemoryStream::new(Arc::clone(&self.data), 0), 0, self.options.read_buffer_size)
    }
}

impl CharLob for StoredCharLob {
    fn char_length(&self) -> Result<u64> {
        self.check_live()?;
        let mut cached = self.char_length.lock();
        if let Some(len) = *cached {
            return Ok(len);
        }
        let len = codec::count_chars(&mut MemoryStream::new(Arc::clone(&self.data), 0))?.chars;
        *cached = Some(len);
        Ok(len)
    }

    fn char_length_if_known(&self) -> Option<u64> {
        if self.released.load(Ordering::Acquire) {
            return None;
        }
        *self.char_length.lock()
    }

    fn byte_length(&self) -> Result<u64> {
        self.check_live()?;
        Ok(self.data.len() as u64)
    }

    fn raw_byte_stream(&self) -> Result<Box<dyn Read + Send>> {
        self.check_live()?;
        Ok(Box::new(MemoryStream::new(Arc::clone(&self.data), 0)))
    }

    fn reader(&self, char_pos: u64) -> Result<Box<dyn CharRead + Send>> {
        self.check_live()?;
        if char_pos == 0 {
            return Err(ArgumentError::BadPosition(char_pos).into());
        }
        let mut reader = self.decoder();
        if reader.skip(char_pos - 1)? < char_pos - 1 {
            return Err(LobError::EndOfValue { pos: char_pos });
        }
        Ok(Box::new(reader))
    }

    fn internal_reader(&self, char_pos: u64) -> Result<Box<dyn CharRead + '_>> {
        let reader: Box<dyn CharRead + '_> = self.reader(char_pos)?;
        Ok(reader)
    }

    fn update_count(&self) -> u64 {
        0
    }

    fn is_released(&self) -> bool {
        self.released.load(Ordering::Acquire)
    }

    fn is_writable(&self) -> bool {
        false
    }

    fn release(&self) -> Result<()> {
        self.released.store(true, Ordering::Release);
        Ok(())
    }
}
