//! Integration tests for the sealed-frame transport.
//!
//! These tests push payloads through the full outbound path (seal, then
//! length-prefix) and the full inbound path (reassemble, then open) using
//! only the public API, the same way the peer application does.

use snftp_core::{
    crypto::{Session, SessionKey, KEY_LEN, MAX_PLAINTEXT_LEN},
    protocol::{encode_frame, FileMetadata, FrameDecoder},
};

fn session() -> Session {
    Session::new(SessionKey::from_bytes([0x5A; KEY_LEN]))
}

fn seal_and_frame(session: &Session, payload: &[u8]) -> Vec<u8> {
    let body = session.encrypt(payload).expect("seal must succeed");
    encode_frame(&body).expect("frame must fit")
}

fn drain(decoder: &mut FrameDecoder, session: &Session) -> Vec<Vec<u8>> {
    let mut out = Vec::new();
    while let Some(body) = decoder.next_frame().expect("well-formed stream") {
        out.push(session.decrypt(&body).expect("authentic frame"));
    }
    out
}

#[test]
fn test_metadata_and_content_survive_arbitrary_read_boundaries() {
    // Arrange: a metadata frame followed by three content frames.
    let tx = session();
    let rx = session();
    let meta = FileMetadata::new(30, "notes.txt").encode().unwrap();
    let chunks: [&[u8]; 3] = [b"0123456789", b"abcdefghij", b"ABCDEFGHIJ"];

    let mut wire = seal_and_frame(&tx, &meta);
    for chunk in chunks {
        wire.extend(seal_and_frame(&tx, chunk));
    }

    // Act: deliver the stream in irregular slices (1, 2, 3, ... bytes).
    let mut decoder = FrameDecoder::new();
    let mut received = Vec::new();
    let mut offset = 0;
    let mut step = 1;
    while offset < wire.len() {
        let end = (offset + step).min(wire.len());
        decoder.extend(&wire[offset..end]);
        received.extend(drain(&mut decoder, &rx));
        offset = end;
        step += 1;
    }

    // Assert
    assert_eq!(received.len(), 4);
    assert_eq!(FileMetadata::decode(&received[0]).unwrap().file_name, "notes.txt");
    assert_eq!(received[1..].concat(), chunks.concat());
    assert_eq!(decoder.buffered_len(), 0);
}

#[test]
fn test_largest_payload_round_trips_through_one_frame() {
    let tx = session();
    let payload: Vec<u8> = (0..MAX_PLAINTEXT_LEN).map(|i| (i % 251) as u8).collect();

    let wire = seal_and_frame(&tx, &payload);
    assert_eq!(&wire[..2], &[0xFF, 0xFF]);

    let mut decoder = FrameDecoder::new();
    decoder.extend(&wire);
    assert_eq!(drain(&mut decoder, &tx), vec![payload]);
}

#[test]
fn test_frame_from_different_password_fails_to_open() {
    // Arrange
    let tx = Session::from_password("alpha").unwrap();
    let rx = Session::from_password("bravo").unwrap();
    let wire = seal_and_frame(&tx, b"hello");

    // Act
    let mut decoder = FrameDecoder::new();
    decoder.extend(&wire);
    let body = decoder.next_frame().unwrap().expect("complete frame");

    // Assert
    assert_eq!(rx.decrypt(&body), None);
}
