//! Plain `Vec<u16>` model of a character value and random edits against it.

use quickcheck::{Arbitrary, Gen};

use crate::{CharRead, Clob};

#[derive(Debug, Clone)]
pub(crate) enum Edit {
    /// `pos` is reduced modulo `len + 1` before use.
    Write { pos: usize, text: String },
    /// `len` is reduced modulo `len + 1` before use.
    Truncate { len: usize },
}

impl Arbitrary for Edit {
    fn arbitrary(g: &mut Gen) -> Self {
        if u8::arbitrary(g) % 4 == 0 {
            Edit::Truncate {
                len: usize::arbitrary(g),
            }
        } else {
            Edit::Write {
                pos: usize::arbitrary(g),
                text: String::arbitrary(g),
            }
        }
    }

    fn shrink(&self) -> Box<dyn Iterator<Item = Self>> {
        match self.clone() {
            Edit::Write { pos, text } => Box::new(
                text.shrink()
                    .map(move |text| Edit::Write { pos, text })
                    .chain(std::iter::once(Edit::Truncate { len: pos })),
            ),
            Edit::Truncate { len } => Box::new(len.shrink().map(|len| Edit::Truncate { len })),
        }
    }
}

#[derive(Debug, Clone, Default)]
pub(crate) struct Model {
    pub(crate) units: Vec<u16>,
}

impl Model {
    pub(crate) fn new(text: &str) -> Self {
        Self {
            units: text.encode_utf16().collect(),
        }
    }

    /// Applies `edit` to both the model and `clob`.
    pub(crate) fn apply(&mut self, edit: &Edit, clob: &Clob) {
        let len = self.units.len();
        match edit {
            Edit::Write { pos, text } => {
                let start = pos % (len + 1);
                for (i, unit) in text.encode_utf16().enumerate() {
                    match self.units.get_mut(start + i) {
                        Some(slot) => *slot = unit,
                        None => self.units.push(unit),
                    }
                }
                clob.set_string(start as u64 + 1, text).unwrap();
            }
            Edit::Truncate { len: new_len } => {
                let new_len = new_len % (len + 1);
                self.units.truncate(new_len);
                clob.truncate(new_len as u64).unwrap();
            }
        }
    }
}

/// Every code unit `reader` still has to deliver.
pub(crate) fn drain(reader: &mut dyn CharRead) -> Vec<u16> {
    let mut out = Vec::new();
    let mut chunk = [0u16; 7];
    loop {
        let n = reader.read(&mut chunk).unwrap();
        if n == 0 {
            return out;
        }
        out.extend_from_slice(&chunk[..n]);
    }
}

pub(crate) fn contents(clob: &Clob) -> Vec<u16> {
    drain(&mut clob.character_stream().unwrap())
}
