//! Length-prefixed frame codec.
//!
//! One frame is the ASCII decimal byte length of the UTF-8 payload, a single
//! `\n`, then exactly that many payload bytes. There is no terminator after
//! the payload.
//!
//! ```text
//! 7\n{"a":1}
//! ```
//!
//! Use [`FrameCodec`] with [`tokio_util::codec::Framed`] over the accepted
//! TCP stream.

// ============================================================================
// Imports
// ============================================================================

use bytes::{BufMut, BytesMut};
use tokio_util::codec::{Decoder, Encoder};

use crate::error::{Error, Result};

// ============================================================================
// Constants
// ============================================================================

/// Default upper bound on a declared payload length: 256 MiB.
pub const DEFAULT_MAX_FRAME_BYTES: usize = 256 * 1024 * 1024;

/// Longest accepted length header, excluding the newline.
///
/// `u64::MAX` has 20 decimal digits.
const MAX_HEADER_BYTES: usize = 20;

// ============================================================================
// FrameCodec
// ============================================================================

/// Codec for `<len>\n<payload>` frames.
///
/// # Decoder
///
/// Buffers until both the header line and the full payload are present.
/// A header that is not decimal, is longer than 20 bytes, or declares more
/// than `max_frame_bytes` yields [`Error::Transport`].
///
/// # Encoder
///
/// Writes the header and payload; the size limit is a decoder-side concern.
#[derive(Debug, Clone)]
pub struct FrameCodec {
    max_frame_bytes: usize,
    /// Declared length of the frame whose header was already consumed.
    pending: Option<usize>,
}

impl FrameCodec {
    /// Creates a codec with the [`DEFAULT_MAX_FRAME_BYTES`] limit.
    #[must_use]
    pub fn new() -> Self {
        Self::with_max_frame_bytes(DEFAULT_MAX_FRAME_BYTES)
    }

    /// Creates a codec with a custom payload limit.
    #[must_use]
    pub fn with_max_frame_bytes(max_frame_bytes: usize) -> Self {
        Self {
            max_frame_bytes,
            pending: None,
        }
    }

    /// Returns the configured payload limit.
    #[inline]
    #[must_use]
    pub const fn max_frame_bytes(&self) -> usize {
        self.max_frame_bytes
    }
}

impl Default for FrameCodec {
    fn default() -> Self {
        Self::new()
    }
}

impl Decoder for FrameCodec {
    type Item = String;
    type Error = Error;

    fn decode(&mut self, src: &mut BytesMut) -> Result<Option<Self::Item>> {
        let len = match self.pending {
            Some(len) => len,
            None => {
                let Some(newline) = src.iter().position(|b| *b == b'\n') else {
                    if src.len() > MAX_HEADER_BYTES {
                        return Err(Error::transport("frame header too long"));
                    }
                    return Ok(None);
                };

                if newline > MAX_HEADER_BYTES {
                    return Err(Error::transport("frame header too long"));
                }

                let header = src.split_to(newline + 1);
                let len = parse_length(&header[..newline])?;

                if len > self.max_frame_bytes {
                    return Err(Error::transport(format!(
                        "frame of {len} bytes exceeds limit of {} bytes",
                        self.max_frame_bytes
                    )));
                }

                self.pending = Some(len);
                len
            }
        };

        if src.len() < len {
            src.reserve(len - src.len());
            return Ok(None);
        }

        self.pending = None;
        let payload = src.split_to(len);

        String::from_utf8(payload.to_vec())
            .map(Some)
            .map_err(|e| Error::transport(format!("frame payload is not UTF-8: {e}")))
    }
}

impl Encoder<String> for FrameCodec {
    type Error = Error;

    fn encode(&mut self, item: String, dst: &mut BytesMut) -> Result<()> {
        let payload = item.as_bytes();
        let header = payload.len().to_string();

        dst.reserve(header.len() + 1 + payload.len());
        dst.put_slice(header.as_bytes());
        dst.put_u8(b'\n');
        dst.put_slice(payload);
        Ok(())
    }
}

// ============================================================================
// Helpers
// ============================================================================

/// Parses the decimal length header, tolerating surrounding ASCII whitespace.
fn parse_length(header: &[u8]) -> Result<usize> {
    let digits = header.trim_ascii();

    if digits.is_empty() || !digits.iter().all(u8::is_ascii_digit) {
        return Err(Error::transport(format!(
            "invalid frame header: {:?}",
            String::from_utf8_lossy(header)
        )));
    }

    // All-digit ASCII is valid UTF-8; overflow is the only remaining failure.
    std::str::from_utf8(digits)
        .ok()
        .and_then(|s| s.parse::<usize>().ok())
        .ok_or_else(|| Error::transport("frame length overflows"))
}

/// Encodes a single frame into a fresh buffer.
#[must_use]
pub fn encode_frame(payload: &str) -> Vec<u8> {
    let mut frame = Vec::with_capacity(payload.len() + 8);
    frame.extend_from_slice(payload.len().to_string().as_bytes());
    frame.push(b'\n');
    frame.extend_from_slice(payload.as_bytes());
    frame
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    use proptest::prelude::*;

    fn decode_all(codec: &mut FrameCodec, buf: &mut BytesMut) -> Vec<String> {
        let mut frames = Vec::new();
        while let Some(frame) = codec.decode(buf).expect("decode") {
            frames.push(frame);
        }
        frames
    }

    #[test]
    fn test_encode_format() {
        let mut codec = FrameCodec::new();
        let mut dst = BytesMut::new();
        codec.encode(r#"{"a":1}"#.to_string(), &mut dst).expect("encode");
        assert_eq!(&dst[..], b"7\n{\"a\":1}");
    }

    #[test]
    fn test_length_counts_utf8_bytes() {
        // 'é' is two bytes, '中' is three
        let frame = encode_frame("é中");
        assert_eq!(&frame[..2], b"5\n");
        assert_eq!(frame.len(), 2 + 5);
    }

    #[test]
    fn test_empty_payload() {
        let mut codec = FrameCodec::new();
        let mut buf = BytesMut::from(&b"0\n"[..]);
        assert_eq!(codec.decode(&mut buf).expect("decode"), Some(String::new()));
    }

    #[test]
    fn test_decode_waits_for_header() {
        let mut codec = FrameCodec::new();
        let mut buf = BytesMut::from(&b"12"[..]);
        assert_eq!(codec.decode(&mut buf).expect("decode"), None);
    }

    #[test]
    fn test_decode_waits_for_payload() {
        let mut codec = FrameCodec::new();
        let mut buf = BytesMut::from(&b"4\npo"[..]);
        assert_eq!(codec.decode(&mut buf).expect("decode"), None);

        buf.extend_from_slice(b"ng");
        assert_eq!(codec.decode(&mut buf).expect("decode"), Some("pong".to_string()));
        assert!(buf.is_empty());
    }

    #[test]
    fn test_decode_back_to_back_frames() {
        let mut codec = FrameCodec::new();
        let mut buf = BytesMut::new();
        buf.extend_from_slice(&encode_frame("ping"));
        buf.extend_from_slice(&encode_frame(r#"{"b":2}"#));

        let frames = decode_all(&mut codec, &mut buf);
        assert_eq!(frames, vec!["ping".to_string(), r#"{"b":2}"#.to_string()]);
    }

    #[test]
    fn test_header_tolerates_carriage_return() {
        let mut codec = FrameCodec::new();
        let mut buf = BytesMut::from(&b"4\r\npong"[..]);
        assert_eq!(codec.decode(&mut buf).expect("decode"), Some("pong".to_string()));
    }

    #[test]
    fn test_rejects_non_decimal_header() {
        let mut codec = FrameCodec::new();
        let mut buf = BytesMut::from(&b"-4\npong"[..]);
        let err = codec.decode(&mut buf).unwrap_err();
        assert!(err.is_transport_error());
    }

    #[test]
    fn test_rejects_empty_header() {
        let mut codec = FrameCodec::new();
        let mut buf = BytesMut::from(&b"\npong"[..]);
        assert!(codec.decode(&mut buf).is_err());
    }

    #[test]
    fn test_rejects_runaway_header() {
        let mut codec = FrameCodec::new();
        let mut buf = BytesMut::from(&[b'9'; 32][..]);
        assert!(codec.decode(&mut buf).is_err());
    }

    #[test]
    fn test_rejects_oversized_frame() {
        let mut codec = FrameCodec::with_max_frame_bytes(8);
        let mut buf = BytesMut::from(&b"9\n123456789"[..]);
        let err = codec.decode(&mut buf).unwrap_err();
        assert!(err.to_string().contains("exceeds limit"));
    }

    #[test]
    fn test_rejects_invalid_utf8() {
        let mut codec = FrameCodec::new();
        let mut buf = BytesMut::from(&b"2\n\xff\xfe"[..]);
        assert!(codec.decode(&mut buf).is_err());
    }

    proptest! {
        #[test]
        fn prop_decodes_under_arbitrary_chunking(
            payloads in proptest::collection::vec(".{0,64}", 1..6),
            chunk in 1usize..17,
        ) {
            let mut wire = Vec::new();
            for p in &payloads {
                wire.extend_from_slice(&encode_frame(p));
            }

            let mut codec = FrameCodec::new();
            let mut buf = BytesMut::new();
            let mut decoded = Vec::new();
            for piece in wire.chunks(chunk) {
                buf.extend_from_slice(piece);
                while let Some(frame) = codec.decode(&mut buf).expect("decode") {
                    decoded.push(frame);
                }
            }

            prop_assert_eq!(decoded, payloads);
            prop_assert!(buf.is_empty());
        }
    }
}
