#![no_main]
//! Drives random edits and reads against a `Clob` and checks every result
//! against a plain vector of code units.

use arbitrary::Arbitrary;
use libfuzzer_sys::fuzz_target;
use lobstream::{CharRead, Clob, LobOptions, ResyncingCharReader, codec};

#[derive(Debug, Arbitrary)]
enum Op {
    Write { pos: u16, text: String },
    Truncate { len: u16 },
    Read { reader: u8, len: u8 },
    Skip { reader: u8, len: u8 },
    OpenReader { pos: u16 },
    SubString { pos: u16, len: u8 },
    Search { pos: u16, pattern: String },
}

#[derive(Debug, Arbitrary)]
struct Input {
    initial: String,
    stored: bool,
    read_buffer_size: u8,
    ops: Vec<Op>,
}

struct TrackedReader {
    reader: ResyncingCharReader,
    /// 0-based index of the next unit.
    next: usize,
}

fn bounded(value: u16, len: usize) -> usize {
    usize::from(value) % (len + 1)
}

fn run(input: Input) {
    let options = LobOptions {
        read_buffer_size: usize::from(input.read_buffer_size).max(1),
        search_chunk_size: 3,
    };
    let clob = if input.stored {
        Clob::from_stored_with_options(codec::encode_str(&input.initial), None, options)
    } else {
        let clob = Clob::with_options(options);
        clob.set_string(1, &input.initial).unwrap();
        clob
    };
    let mut model: Vec<u16> = input.initial.encode_utf16().collect();
    let mut readers: Vec<TrackedReader> = Vec::new();

    for op in input.ops {
        match op {
            Op::Write { pos, text } => {
                let start = bounded(pos, model.len());
                for (i, unit) in text.encode_utf16().enumerate() {
                    match model.get_mut(start + i) {
                        Some(slot) => *slot = unit,
                        None => model.push(unit),
                    }
                }
                clob.set_string(start as u64 + 1, &text).unwrap();
            }
            Op::Truncate { len } => {
                let len = bounded(len, model.len());
                model.truncate(len);
                clob.truncate(len as u64).unwrap();
            }
            Op::OpenReader { pos } => {
                let start = bounded(pos, model.len());
                let len = (model.len() - start) as u64;
                readers.push(TrackedReader {
                    reader: clob.character_stream_range(start as u64 + 1, len).unwrap(),
                    next: start,
                });
            }
            Op::Read { .. } | Op::Skip { .. } if readers.is_empty() => {}
            Op::Read { reader, len } => {
                let tracked = &mut readers[usize::from(reader) % readers.len()];
                let mut buf = vec![0u16; usize::from(len)];
                let n = tracked.reader.read(&mut buf).unwrap();
                let expected = model.get(tracked.next..).unwrap_or_default();
                assert!(n <= expected.len());
                assert_eq!(buf[..n], expected[..n]);
                tracked.next += n;
            }
            Op::Skip { reader, len } => {
                let tracked = &mut readers[usize::from(reader) % readers.len()];
                let skipped = tracked.reader.skip(u64::from(len)).unwrap();
                assert!(tracked.next + skipped as usize <= model.len().max(tracked.next));
                tracked.next += skipped as usize;
            }
            Op::SubString { pos, len } => {
                let start = bounded(pos, model.len());
                let end = (start + usize::from(len)).min(model.len());
                let text = clob.get_sub_string(start as u64 + 1, usize::from(len)).unwrap();
                assert_eq!(text, String::from_utf16_lossy(&model[start..end]));
            }
            Op::Search { pos, pattern } => {
                let start = bounded(pos, model.len());
                let needle: Vec<u16> = pattern.encode_utf16().collect();
                let expected = if needle.is_empty() {
                    Some(start)
                } else {
                    model[start..].windows(needle.len()).position(|w| w == needle).map(|i| start + i)
                };
                let found = clob.position(&pattern, start as u64 + 1).unwrap();
                assert_eq!(found, expected.map(|i| i as u64 + 1));
            }
        }
        assert_eq!(clob.length().unwrap(), model.len() as u64);
    }
}

fuzz_target!(|input: Input| run(input));
