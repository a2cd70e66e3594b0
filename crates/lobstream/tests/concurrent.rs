#![allow(missing_docs)]
use std::{thread, time::Duration};

use lobstream::{Blob, CharRead, Clob, codec};
use rstest::rstest;

const ROUNDS: usize = if cfg!(miri) { 5 } else { 200 };

#[rstest]
#[timeout(Duration::from_secs(30))]
fn reader_follows_a_concurrent_appender() {
    let clob = Clob::from_stored(codec::encode_str("start:"), None);
    let pieces: Vec<String> = (0..ROUNDS).map(|i| format!("[{i}é€]")).collect();
    let expected: Vec<u16> = format!("start:{}", pieces.concat()).encode_utf16().collect();

    thread::scope(|s| {
        s.spawn(|| {
            for piece in &pieces {
                let end = clob.length().unwrap() + 1;
                clob.set_string(end, piece).unwrap();
            }
        });

        let mut reader = clob.character_stream().unwrap();
        let mut seen = Vec::new();
        let mut chunk = [0u16; 5];
        while seen.len() < expected.len() {
            let n = reader.read(&mut chunk).unwrap();
            if n == 0 {
                thread::yield_now();
            }
            seen.extend_from_slice(&chunk[..n]);
            assert_eq!(seen[..], expected[..seen.len()]);
        }
    });
}

#[rstest]
#[timeout(Duration::from_secs(30))]
fn substrings_never_observe_a_half_applied_write() {
    let len = 64;
    let clob = Clob::from_text(&"a".repeat(len));

    thread::scope(|s| {
        s.spawn(|| {
            for i in 0..ROUNDS {
                let fill = if i % 2 == 0 { "b" } else { "a" };
                clob.set_string(1, &fill.repeat(len)).unwrap();
            }
        });

        for _ in 0..ROUNDS {
            let text = clob.get_sub_string(1, len).unwrap();
            assert_eq!(text.len(), len);
            assert!(text.chars().all(|c| c == 'a') || text.chars().all(|c| c == 'b'), "{text}");
        }
    });
}

#[rstest]
#[timeout(Duration::from_secs(30))]
fn byte_stream_survives_concurrent_materialization() {
    let data: Vec<u8> = (0..4096u32).map(|i| (i % 251) as u8).collect();
    let blob = Blob::from_stored(data.clone());

    thread::scope(|s| {
        let mut stream = blob.binary_stream().unwrap();
        s.spawn(|| {
            blob.set_bytes(1, &data[..1]).unwrap();
        });

        let mut seen = Vec::new();
        let mut chunk = [0u8; 37];
        loop {
            let n = std::io::Read::read(&mut stream, &mut chunk).unwrap();
            if n == 0 {
                break;
            }
            seen.extend_from_slice(&chunk[..n]);
        }
        assert_eq!(seen, data);
    });
}
