//! TCP/HTTP frame layer: `u16 packet_id | u8 compressed | u32
//! length | payload[length]`, all integers little-endian. When
//! `compressed` is set the payload is raw-deflate (no zlib header).

use std::io::{Read, Write};

use flate2::read::DeflateDecoder;
use flate2::write::DeflateEncoder;
use flate2::Compression;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum FrameError {
    #[error("frame is incomplete")]
    Incomplete,
    #[error("failed to inflate compressed payload: {0}")]
    Inflate(std::io::Error),
    #[error("failed to deflate payload: {0}")]
    Deflate(std::io::Error),
}

/// A single decoded frame: packet id plus its (already decompressed)
/// payload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PacketFrame {
    pub packet_id: u16,
    pub payload: Vec<u8>,
}

/// Attempts to parse one frame from the front of `buf`. Returns the
/// number of bytes consumed alongside the frame, or `None` if `buf`
/// does not yet contain a complete frame — callers should read more
/// bytes and retry, mirroring a streaming decoder.
pub fn try_parse_frame(buf: &[u8]) -> Result<Option<(usize, PacketFrame)>, FrameError> {
    const HEADER_LEN: usize = 2 + 1 + 4;
    if buf.len() < HEADER_LEN {
        return Ok(None);
    }
    let packet_id = u16::from_le_bytes([buf[0], buf[1]]);
    let compressed = buf[2] != 0;
    let length = u32::from_le_bytes([buf[3], buf[4], buf[5], buf[6]]) as usize;

    if buf.len() < HEADER_LEN + length {
        return Ok(None);
    }

    let raw = &buf[HEADER_LEN..HEADER_LEN + length];
    let payload = if compressed {
        inflate(raw)?
    } else {
        raw.to_vec()
    };

    Ok(Some((
        HEADER_LEN + length,
        PacketFrame { packet_id, payload },
    )))
}

/// Encodes a single frame. `compressed` selects raw-deflate; the
/// simplest and always-acceptable choice for an encoder is
/// `compressed = false`.
pub fn encode_frame(packet_id: u16, payload: &[u8], compressed: bool) -> Vec<u8> {
    let body = if compressed {
        deflate(payload)
    } else {
        payload.to_vec()
    };

    let mut out = Vec::with_capacity(7 + body.len());
    out.extend_from_slice(&packet_id.to_le_bytes());
    out.push(u8::from(compressed));
    out.extend_from_slice(&(body.len() as u32).to_le_bytes());
    out.extend_from_slice(&body);
    out
}

fn inflate(data: &[u8]) -> Result<Vec<u8>, FrameError> {
    let mut decoder = DeflateDecoder::new(data);
    let mut out = Vec::new();
    decoder.read_to_end(&mut out).map_err(FrameError::Inflate)?;
    Ok(out)
}

fn deflate(data: &[u8]) -> Vec<u8> {
    let mut encoder = DeflateEncoder::new(Vec::new(), Compression::default());
    // An in-memory `Vec<u8>` writer never fails.
    encoder.write_all(data).expect("deflate into Vec cannot fail");
    encoder.finish().expect("deflate into Vec cannot fail")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn frame_round_trips_uncompressed() {
        let payload = b"hello bancho".to_vec();
        let encoded = encode_frame(42, &payload, false);
        let (consumed, frame) = try_parse_frame(&encoded).unwrap().unwrap();
        assert_eq!(consumed, encoded.len());
        assert_eq!(frame.packet_id, 42);
        assert_eq!(frame.payload, payload);
    }

    #[test]
    fn frame_round_trips_compressed() {
        let payload = b"this payload should compress nicely nicely nicely".to_vec();
        let encoded = encode_frame(7, &payload, true);
        let (_, frame) = try_parse_frame(&encoded).unwrap().unwrap();
        assert_eq!(frame.payload, payload);
    }

    #[test]
    fn empty_compressed_payload_decodes_to_empty() {
        let encoded = encode_frame(1, &[], true);
        let (_, frame) = try_parse_frame(&encoded).unwrap().unwrap();
        assert!(frame.payload.is_empty());
    }

    #[test]
    fn incomplete_header_returns_none() {
        assert!(try_parse_frame(&[1, 2, 3]).unwrap().is_none());
    }

    #[test]
    fn incomplete_payload_returns_none() {
        let encoded = encode_frame(1, b"0123456789", false);
        assert!(try_parse_frame(&encoded[..encoded.len() - 2])
            .unwrap()
            .is_none());
    }

    #[test]
    fn parses_two_consecutive_frames_from_one_buffer() {
        let mut buf = encode_frame(1, b"a", false);
        buf.extend(encode_frame(2, b"bb", false));

        let (consumed1, f1) = try_parse_frame(&buf).unwrap().unwrap();
        assert_eq!(f1.packet_id, 1);
        let (consumed2, f2) = try_parse_frame(&buf[consumed1..]).unwrap().unwrap();
        assert_eq!(f2.packet_id, 2);
        assert_eq!(consumed1 + consumed2, buf.len());
    }
}
