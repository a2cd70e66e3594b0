//! Variable-width text encoding used for persisted character data.
//!
//! Every UTF-16 code unit is encoded on its own, in one to three bytes:
//!
//! | unit                          | bytes | layout                        |
//! |-------------------------------|-------|-------------------------------|
//! | `0x0001..=0x007F`             | 1     | `0xxxxxxx`                    |
//! | `0x0000`, `0x0080..=0x07FF`   | 2     | `110xxxxx 10xxxxxx`           |
//! | `0x0800..=0xFFFF`             | 3     | `1110xxxx 10xxxxxx 10xxxxxx`  |
//!
//! Surrogates are encoded as two independent three-byte units; there are no
//! four-byte sequences. Because the width varies, locating the n-th
//! character means walking the bytes that precede it. [`scan`] is the
//! primitive for that walk.

use std::io::BufRead;

use crate::error::{LobError, Result};

/// Characters and bytes covered by a [`scan`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SkipCount {
    /// Decoded code units.
    pub chars: u64,
    /// Encoded bytes consumed.
    pub bytes: u64,
}

/// Width of the sequence introduced by `lead`, or `None` if `lead` cannot
/// start a sequence.
#[inline]
#[must_use]
pub fn sequence_width(lead: u8) -> Option<usize> {
    if lead & 0x80 == 0 {
        Some(1)
    } else if lead & 0xE0 == 0xC0 {
        Some(2)
    } else if lead & 0xF0 == 0xE0 {
        Some(3)
    } else {
        None
    }
}

#[inline]
fn is_continuation(b: u8) -> bool {
    b & 0xC0 == 0x80
}

/// Number of bytes `unit` occupies once encoded.
#[inline]
#[must_use]
pub fn encoded_len(unit: u16) -> usize {
    match unit {
        0x0001..=0x007F => 1,
        0x0000 | 0x0080..=0x07FF => 2,
        _ => 3,
    }
}

/// Appends the encoding of `unit` to `out`.
#[allow(clippy::cast_possible_truncation)]
pub fn encode_unit(unit: u16, out: &mut Vec<u8>) {
    match encoded_len(unit) {
        1 => out.push(unit as u8),
        2 => out.extend_from_slice(&[0xC0 | (unit >> 6) as u8, 0x80 | (unit & 0x3F) as u8]),
        _ => out.extend_from_slice(&[
            0xE0 | (unit >> 12) as u8,
            0x80 | ((unit >> 6) & 0x3F) as u8,
            0x80 | (unit & 0x3F) as u8,
        ]),
    }
}

/// Encodes `units`, one sequence per unit.
#[must_use]
pub fn encode_units(units: &[u16]) -> Vec<u8> {
    let mut out = Vec::with_capacity(units.iter().map(|&u| encoded_len(u)).sum());
    for &unit in units {
        encode_unit(unit, &mut out);
    }
    out
}

/// Encodes the UTF-16 code units of `s`.
#[must_use]
pub fn encode_str(s: &str) -> Vec<u8> {
    let mut out = Vec::with_capacity(s.len());
    for unit in s.encode_utf16() {
        encode_unit(unit, &mut out);
    }
    out
}

/// Decodes a complete byte sequence into code units.
///
/// # Errors
///
/// [`LobError::MalformedData`] if `bytes` is not a sequence of well-formed
/// encoded units.
pub fn decode(bytes: &[u8]) -> Result<Vec<u16>> {
    let mut out = Vec::with_capacity(bytes.len());
    let mut i = 0;
    while i < bytes.len() {
        let offset = i as u64;
        let width = sequence_width(bytes[i]).ok_or(LobError::MalformedData { offset })?;
        let seq = bytes.get(i..i + width).ok_or(LobError::MalformedData { offset })?;
        out.push(decode_sequence(seq, offset)?);
        i += width;
    }
    Ok(out)
}

/// Decodes one complete sequence whose width matches its lead byte.
pub(crate) fn decode_sequence(seq: &[u8], offset: u64) -> Result<u16> {
    let (lead, rest) = seq.split_first().ok_or(LobError::MalformedData { offset })?;
    let mut unit = match rest.len() {
        0 => u16::from(*lead),
        1 => u16::from(lead & 0x1F),
        _ => u16::from(lead & 0x0F),
    };
    for &b in rest {
        if !is_continuation(b) {
            return Err(LobError::MalformedData { offset });
        }
        unit = (unit << 6) | u16::from(b & 0x3F);
    }
    Ok(unit)
}

/// Walks over at most `max_chars` encoded characters of `src`.
///
/// Stops early, without error, when `src` runs dry; the returned count
/// tells the caller how far it got. Every consumed byte is handed to `sink`
/// in order, which lets callers copy while they count. `base` is the
/// absolute offset of the first byte of `src` and is only used to report
/// where malformed data was found.
///
/// # Errors
///
/// [`LobError::MalformedData`] on an invalid lead or continuation byte, or a
/// sequence cut off by the end of input. I/O failures of `src` propagate.
pub fn scan<R, F>(src: &mut R, base: u64, max_chars: u64, mut sink: F) -> Result<SkipCount>
where
    R: BufRead + ?Sized,
    F: FnMut(&[u8]),
{
    let mut count = SkipCount::default();
    // Continuation bytes still owed by the character in progress.
    let mut pending = 0usize;
    let mut seq_start = base;

    while count.chars < max_chars || pending > 0 {
        let buf = src.fill_buf()?;
        if buf.is_empty() {
            if pending > 0 {
                return Err(LobError::MalformedData { offset: seq_start });
            }
            break;
        }

        let mut used = 0;
        while used < buf.len() {
            let b = buf[used];
            if pending > 0 {
                if !is_continuation(b) {
                    return Err(LobError::MalformedData { offset: seq_start });
                }
                pending -= 1;
                used += 1;
                if pending == 0 {
                    count.chars += 1;
                }
                continue;
            }
            if count.chars == max_chars {
                break;
            }
            seq_start = base + count.bytes + used as u64;
            let width = sequence_width(b).ok_or(LobError::MalformedData { offset: seq_start })?;
            pending = width - 1;
            used += 1;
            if pending == 0 {
                count.chars += 1;
            }
        }

        sink(&buf[..used]);
        count.bytes += used as u64;
        src.consume(used);
    }

    Ok(count)
}

/// Counts every character remaining in `src`.
///
/// # Errors
///
/// See [`scan`].
pub fn count_chars<R: BufRead + ?Sized>(src: &mut R) -> Result<SkipCount> {
    scan(src, 0, u64::MAX, |_| {})
}

#[cfg(test)]
mod tests {
    use std::io::{BufReader, Cursor};

    use rstest::rstest;

    use super::*;

    #[rstest]
    #[case(0x0041, &[0x41])]
    #[case(0x0000, &[0xC0, 0x80])]
    #[case(0x00E9, &[0xC3, 0xA9])]
    #[case(0x07FF, &[0xDF, 0xBF])]
    #[case(0x20AC, &[0xE2, 0x82, 0xAC])]
    #[case(0xD83D, &[0xED, 0xA0, 0xBD])]
    fn encodes_each_width(#[case] unit: u16, #[case] expected: &[u8]) {
        let mut out = Vec::new();
        encode_unit(unit, &mut out);
        assert_eq!(out, expected);
        assert_eq!(encoded_len(unit), expected.len());
        assert_eq!(decode(expected).unwrap(), vec![unit]);
    }

    #[test]
    fn supplementary_characters_take_six_bytes() {
        let bytes = encode_str("😀");
        assert_eq!(bytes.len(), 6);
        assert_eq!(decode(&bytes).unwrap(), "😀".encode_utf16().collect::<Vec<_>>());
    }

    #[test]
    fn scan_counts_characters_and_bytes() {
        let bytes = encode_str("héllo");
        let count = count_chars(&mut Cursor::new(&bytes)).unwrap();
        assert_eq!(count, SkipCount { chars: 5, bytes: 6 });
    }

    #[test]
    fn scan_stops_at_requested_character() {
        let bytes = encode_str("héllo");
        let mut src = Cursor::new(&bytes);
        let count = scan(&mut src, 0, 2, |_| {}).unwrap();
        assert_eq!(count, SkipCount { chars: 2, bytes: 3 });
        assert_eq!(src.position(), 3);
    }

    #[test]
    fn scan_handles_sequences_split_across_buffer_refills() {
        let text = "a€é€b";
        let bytes = encode_str(text);
        let mut src = BufReader::with_capacity(1, Cursor::new(&bytes));
        let mut copied = Vec::new();
        let count = scan(&mut src, 0, 4, |chunk| copied.extend_from_slice(chunk)).unwrap();
        assert_eq!(count.chars, 4);
        assert_eq!(count.bytes, 1 + 3 + 2 + 3);
        assert_eq!(copied, &bytes[..9]);
    }

    #[test]
    fn scan_reports_short_input_through_the_count() {
        let bytes = encode_str("ab");
        let count = scan(&mut Cursor::new(&bytes), 0, 10, |_| {}).unwrap();
        assert_eq!(count, SkipCount { chars: 2, bytes: 2 });
    }

    #[test]
    fn malformed_lead_byte_is_rejected_with_offset() {
        let bytes = [b'a', 0xF0, 0x80];
        let err = count_chars(&mut Cursor::new(&bytes)).unwrap_err();
        assert!(matches!(err, LobError::MalformedData { offset: 1 }));

        let err = scan(&mut Cursor::new(&bytes), 100, u64::MAX, |_| {}).unwrap_err();
        assert!(matches!(err, LobError::MalformedData { offset: 101 }));
    }

    #[test]
    fn truncated_sequence_is_rejected() {
        let bytes = [b'a', 0xE2, 0x82];
        let err = count_chars(&mut Cursor::new(&bytes)).unwrap_err();
        assert!(matches!(err, LobError::MalformedData { offset: 1 }));
        assert!(decode(&bytes).is_err());
    }

    #[test]
    fn bad_continuation_byte_is_rejected() {
        let bytes = [0xC3, b'a'];
        assert!(matches!(
            count_chars(&mut Cursor::new(&bytes)),
            Err(LobError::MalformedData { offset: 0 })
        ));
    }
}
