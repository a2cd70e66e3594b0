use quickcheck::QuickCheck;

use super::iterations;
use crate::{LobOptions, MutableCharLob, codec};

fn byte_offset(units: &[u16], char_pos: usize) -> u64 {
    units[..char_pos - 1].iter().map(|&u| codec::encoded_len(u) as u64).sum()
}

/// Property: whatever order positions are looked up in, and whatever is
/// written in between, the translated byte offset equals a fresh count from
/// the start of the value.
#[test]
fn cached_translation_matches_a_fresh_scan() {
    #[allow(clippy::needless_pass_by_value)]
    fn prop(initial: String, steps: Vec<(usize, Option<(usize, String)>)>) -> bool {
        let options = LobOptions {
            read_buffer_size: 3,
            ..LobOptions::default()
        };
        let lob = MutableCharLob::with_text(&initial, options);
        let mut units: Vec<u16> = initial.encode_utf16().collect();

        for (lookup, write) in &steps {
            let char_pos = lookup % (units.len() + 1) + 1;
            if lob.translate_to_byte_position(char_pos as u64).unwrap() != byte_offset(&units, char_pos) {
                return false;
            }
            if let Some((pos, text)) = write {
                let start = pos % (units.len() + 1);
                for (i, unit) in text.encode_utf16().enumerate() {
                    match units.get_mut(start + i) {
                        Some(slot) => *slot = unit,
                        None => units.push(unit),
                    }
                }
                lob.insert_string(text, start as u64 + 1).unwrap();
            }
        }
        lob.char_length().unwrap() == units.len() as u64
            && lob.byte_length().unwrap() == byte_offset(&units, units.len() + 1)
    }

    QuickCheck::new()
        .tests(iterations())
        .quickcheck(prop as fn(String, Vec<(usize, Option<(usize, String)>)>) -> bool);
}
