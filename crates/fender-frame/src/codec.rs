use bytes::{Buf, BufMut, Bytes, BytesMut};

use crate::error::{FrameError, Result};

/// Frame header: magic (2) + kind (1) + reserved (1) + correlation id (8)
/// + route length (2) + payload length (4) = 18 bytes.
pub const HEADER_SIZE: usize = 18;

/// Magic bytes: "FD" (0x46 0x44).
pub const MAGIC: [u8; 2] = [0x46, 0x44];

/// Default maximum payload size: 16 MiB.
pub const DEFAULT_MAX_PAYLOAD: usize = 16 * 1024 * 1024;

/// Longest route the 2-byte length prefix can carry.
pub const MAX_ROUTE_LEN: usize = u16::MAX as usize;

/// What a frame means to the receiver.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum FrameKind {
    /// Client to server: invoke `route` with `payload`.
    Request = 1,
    /// Server to client: successful reply body.
    Response = 2,
    /// Server to client: the call failed; payload is a UTF-8 message.
    Error = 3,
    /// Client to server: the caller no longer waits for this id.
    Abandon = 4,
}

impl FrameKind {
    pub fn as_u8(self) -> u8 {
        self as u8
    }
}

impl TryFrom<u8> for FrameKind {
    type Error = FrameError;

    fn try_from(value: u8) -> Result<Self> {
        match value {
            1 => Ok(Self::Request),
            2 => Ok(Self::Response),
            3 => Ok(Self::Error),
            4 => Ok(Self::Abandon),
            other => Err(FrameError::UnknownKind(other)),
        }
    }
}

/// One framed RPC message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame {
    pub kind: FrameKind,
    /// Ties a reply to the request that caused it.
    pub correlation_id: u64,
    /// `/pkg.Service/Method` for requests, empty otherwise.
    pub route: String,
    pub payload: Bytes,
}

impl Frame {
    pub fn request(correlation_id: u64, route: impl Into<String>, payload: impl Into<Bytes>) -> Self {
        Self {
            kind: FrameKind::Request,
            correlation_id,
            route: route.into(),
            payload: payload.into(),
        }
    }

    pub fn response(correlation_id: u64, payload: impl Into<Bytes>) -> Self {
        Self::reply(FrameKind::Response, correlation_id, payload.into())
    }

    /// Error reply carrying a human-readable message.
    pub fn error(correlation_id: u64, message: &str) -> Self {
        Self::reply(
            FrameKind::Error,
            correlation_id,
            Bytes::copy_from_slice(message.as_bytes()),
        )
    }

    pub fn abandon(correlation_id: u64) -> Self {
        Self::reply(FrameKind::Abandon, correlation_id, Bytes::new())
    }

    fn reply(kind: FrameKind, correlation_id: u64, payload: Bytes) -> Self {
        Self {
            kind,
            correlation_id,
            route: String::new(),
            payload,
        }
    }

    /// The total wire size of this frame (header + route + payload).
    pub fn wire_size(&self) -> usize {
        HEADER_SIZE + self.route.len() + self.payload.len()
    }
}

/// Encode a frame into the wire format.
///
/// Wire format:
/// ```text
/// ┌────────┬──────┬──────┬────────────┬──────────┬──────────┬───────┬─────────┐
/// │ Magic  │ Kind │ Rsvd │ Corr. id   │ Route len│ Len      │ Route │ Payload │
/// │ "FD"   │ (1B) │ (1B) │ (8B LE)    │ (2B LE)  │ (4B LE)  │       │         │
/// └────────┴──────┴──────┴────────────┴──────────┴──────────┴───────┴─────────┘
/// ```
pub fn encode_frame(frame: &Frame, max_payload: usize, dst: &mut BytesMut) -> Result<()> {
    if frame.route.len() > MAX_ROUTE_LEN {
        return Err(FrameError::RouteTooLong {
            len: frame.route.len(),
            max: MAX_ROUTE_LEN,
        });
    }
    let max = max_payload.min(u32::MAX as usize);
    if frame.payload.len() > max {
        return Err(FrameError::PayloadTooLarge {
            size: frame.payload.len(),
            max,
        });
    }

    dst.reserve(frame.wire_size());
    dst.put_slice(&MAGIC);
    dst.put_u8(frame.kind.as_u8());
    dst.put_u8(0);
    dst.put_u64_le(frame.correlation_id);
    dst.put_u16_le(frame.route.len() as u16);
    dst.put_u32_le(frame.payload.len() as u32);
    dst.put_slice(frame.route.as_bytes());
    dst.put_slice(&frame.payload);
    Ok(())
}

/// Decode a frame from a buffer.
///
/// Returns `Ok(None)` if the buffer doesn't contain a complete frame yet.
/// On success, consumes the frame bytes from the buffer.
pub fn decode_frame(src: &mut BytesMut, max_payload: usize) -> Result<Option<Frame>> {
    if src.len() < HEADER_SIZE {
        return Ok(None);
    }

    if src[0..2] != MAGIC {
        return Err(FrameError::InvalidMagic);
    }

    let mut header = &src[2..HEADER_SIZE];
    let kind = FrameKind::try_from(header.get_u8())?;
    let _reserved = header.get_u8();
    let correlation_id = header.get_u64_le();
    let route_len = header.get_u16_le() as usize;
    let payload_len = header.get_u32_le() as usize;

    if payload_len > max_payload {
        return Err(FrameError::PayloadTooLarge {
            size: payload_len,
            max: max_payload,
        });
    }

    let total = HEADER_SIZE + route_len + payload_len;
    if src.len() < total {
        src.reserve(total - src.len());
        return Ok(None);
    }

    src.advance(HEADER_SIZE);
    let route = src.split_to(route_len);
    let route = std::str::from_utf8(&route)
        .map_err(|_| FrameError::InvalidRoute)?
        .to_string();
    let payload = src.split_to(payload_len).freeze();

    Ok(Some(Frame {
        kind,
        correlation_id,
        route,
        payload,
    }))
}

/// Configuration for the frame codec.
#[derive(Debug, Clone)]
pub struct FrameConfig {
    /// Maximum payload size in bytes. Default: 16 MiB.
    pub max_payload_size: usize,
}

impl Default for FrameConfig {
    fn default() -> Self {
        Self {
            max_payload_size: DEFAULT_MAX_PAYLOAD,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn encoded(frame: &Frame) -> BytesMut {
        let mut buf = BytesMut::new();
        encode_frame(frame, DEFAULT_MAX_PAYLOAD, &mut buf).unwrap();
        buf
    }

    #[test]
    fn test_request_roundtrip() {
        let frame = Frame::request(42, "/spotify.v1.TrackMetadata/Search", &b"{\"q\":\"Hot\"}"[..]);
        let mut buf = encoded(&frame);
        assert_eq!(buf.len(), frame.wire_size());

        let decoded = decode_frame(&mut buf, DEFAULT_MAX_PAYLOAD).unwrap().unwrap();
        assert_eq!(decoded, frame);
        assert!(buf.is_empty());
    }

    #[test]
    fn test_header_layout() {
        let buf = encoded(&Frame::response(0x0102, &b"{}"[..]));
        assert_eq!(&buf[0..2], b"FD");
        assert_eq!(buf[2], 2);
        assert_eq!(buf[3], 0);
        assert_eq!(&buf[4..12], &[0x02, 0x01, 0, 0, 0, 0, 0, 0]);
        assert_eq!(&buf[12..14], &[0, 0]);
        assert_eq!(&buf[14..18], &[2, 0, 0, 0]);
    }

    #[test]
    fn test_decode_incomplete() {
        let mut buf = BytesMut::from(&b"FD\x01"[..]);
        assert!(decode_frame(&mut buf, DEFAULT_MAX_PAYLOAD).unwrap().is_none());

        let mut buf = encoded(&Frame::request(1, "/a.B/C", &b"hello"[..]));
        buf.truncate(HEADER_SIZE + 3);
        assert!(decode_frame(&mut buf, DEFAULT_MAX_PAYLOAD).unwrap().is_none());
    }

    #[test]
    fn test_decode_invalid_magic_and_kind() {
        let mut buf = BytesMut::from(&[0xFF; HEADER_SIZE][..]);
        assert!(matches!(
            decode_frame(&mut buf, DEFAULT_MAX_PAYLOAD),
            Err(FrameError::InvalidMagic)
        ));

        let mut buf = encoded(&Frame::abandon(9));
        buf[2] = 7;
        assert!(matches!(
            decode_frame(&mut buf, DEFAULT_MAX_PAYLOAD),
            Err(FrameError::UnknownKind(7))
        ));
    }

    #[test]
    fn test_payload_limits() {
        let frame = Frame::response(1, vec![0u8; 64]);
        let mut buf = BytesMut::new();
        assert!(matches!(
            encode_frame(&frame, 32, &mut buf),
            Err(FrameError::PayloadTooLarge { size: 64, max: 32 })
        ));

        let mut buf = encoded(&frame);
        assert!(matches!(
            decode_frame(&mut buf, 32),
            Err(FrameError::PayloadTooLarge { .. })
        ));
    }

    #[test]
    fn test_route_too_long() {
        let frame = Frame::request(1, "r".repeat(MAX_ROUTE_LEN + 1), Bytes::new());
        let mut buf = BytesMut::new();
        assert!(matches!(
            encode_frame(&frame, DEFAULT_MAX_PAYLOAD, &mut buf),
            Err(FrameError::RouteTooLong { .. })
        ));
    }

    #[test]
    fn test_multiple_frames() {
        let mut buf = encoded(&Frame::error(1, "no such method"));
        buf.extend_from_slice(&encoded(&Frame::abandon(2)));

        let first = decode_frame(&mut buf, DEFAULT_MAX_PAYLOAD).unwrap().unwrap();
        assert_eq!(first.kind, FrameKind::Error);
        assert_eq!(first.payload.as_ref(), b"no such method");

        let second = decode_frame(&mut buf, DEFAULT_MAX_PAYLOAD).unwrap().unwrap();
        assert_eq!(second.kind, FrameKind::Abandon);
        assert_eq!(second.correlation_id, 2);
        assert!(second.payload.is_empty());
        assert!(buf.is_empty());
    }
}
