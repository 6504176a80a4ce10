//! Fixed-layout packet codec. All multi-byte fields travel big-endian.
//!
//! Encoding never fails: callers allocate buffers of exactly the packet's
//! fixed size. Decoding validates the leading tag byte before trusting any
//! payload bytes and reports failures as [`PacketDecodeError`].

use crate::checksum::StreamChecksum;
use crate::protocol::{
    start_of_stream_packet_size, PingResponse, StartOfStream, PING_RESPONSE_PACKET_SIZE,
    PING_RESPONSE_TAG, PING_TAG, START_OF_STREAM_TAG,
};

/// Failure decoding a packet from a buffer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum PacketDecodeError {
    #[error("unexpected packet tag {found:#04x}, expected {expected:#04x}")]
    WrongTag { expected: u8, found: u8 },
    #[error("packet truncated: {found} bytes, expected {expected}")]
    Truncated { expected: usize, found: usize },
}

/// Write a 16-bit value big-endian into the front of `buf`.
pub fn write_u16(buf: &mut [u8], value: u16) {
    buf[..2].copy_from_slice(&value.to_be_bytes());
}

/// Read a big-endian 16-bit value from the front of `buf`.
pub fn read_u16(buf: &[u8]) -> u16 {
    u16::from_be_bytes([buf[0], buf[1]])
}

/// Write a 32-bit value big-endian into the front of `buf`.
pub fn write_u32(buf: &mut [u8], value: u32) {
    buf[..4].copy_from_slice(&value.to_be_bytes());
}

/// Read a big-endian 32-bit value from the front of `buf`.
pub fn read_u32(buf: &[u8]) -> u32 {
    u32::from_be_bytes([buf[0], buf[1], buf[2], buf[3]])
}

/// Encode a ping packet into `buf`.
pub fn encode_ping(buf: &mut [u8]) {
    buf[0] = PING_TAG;
}

/// Whether `buf` holds a ping packet.
pub fn decode_ping(buf: &[u8]) -> bool {
    buf.first() == Some(&PING_TAG)
}

/// Encode a ping-response packet into `buf` (exactly
/// [`PING_RESPONSE_PACKET_SIZE`] bytes).
pub fn encode_ping_response(buf: &mut [u8], packet: &PingResponse) {
    buf[0] = PING_RESPONSE_TAG;
    write_u32(&mut buf[1..5], packet.peripheral_type);
    write_u16(&mut buf[5..7], packet.peripheral_version);
}

/// Decode a ping-response packet from `buf`.
pub fn decode_ping_response(buf: &[u8]) -> Result<PingResponse, PacketDecodeError> {
    if buf.len() < PING_RESPONSE_PACKET_SIZE {
        return Err(PacketDecodeError::Truncated {
            expected: PING_RESPONSE_PACKET_SIZE,
            found: buf.len(),
        });
    }
    if buf[0] != PING_RESPONSE_TAG {
        return Err(PacketDecodeError::WrongTag {
            expected: PING_RESPONSE_TAG,
            found: buf[0],
        });
    }
    Ok(PingResponse {
        peripheral_type: read_u32(&buf[1..5]),
        peripheral_version: read_u16(&buf[5..7]),
    })
}

/// Encode a start-of-stream packet into `buf` (exactly
/// [`start_of_stream_packet_size`]`::<C>()` bytes).
pub fn encode_start_of_stream<C: StreamChecksum>(buf: &mut [u8], packet: &StartOfStream<C>) {
    buf[0] = START_OF_STREAM_TAG;
    write_u16(&mut buf[1..3], packet.data_size);
    buf[3..3 + C::WIDTH].copy_from_slice(packet.checksum.as_ref());
}

/// Decode a start-of-stream packet from `buf`.
pub fn decode_start_of_stream<C: StreamChecksum>(
    buf: &[u8],
) -> Result<StartOfStream<C>, PacketDecodeError> {
    let size = start_of_stream_packet_size::<C>();
    if buf.len() < size {
        return Err(PacketDecodeError::Truncated {
            expected: size,
            found: buf.len(),
        });
    }
    if buf[0] != START_OF_STREAM_TAG {
        return Err(PacketDecodeError::WrongTag {
            expected: START_OF_STREAM_TAG,
            found: buf[0],
        });
    }
    Ok(StartOfStream {
        data_size: read_u16(&buf[1..3]),
        checksum: C::digest_from_wire(&buf[3..3 + C::WIDTH]),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::checksum::{Crc32, Md5};
    use crate::protocol::PING_PACKET_SIZE;

    #[test]
    fn ping_roundtrip() {
        let mut buf = [0u8; PING_PACKET_SIZE];
        encode_ping(&mut buf);
        assert_eq!(buf, [0xA0]);
        assert!(decode_ping(&buf));
    }

    #[test]
    fn ping_rejects_wrong_tag() {
        assert!(!decode_ping(&[0xA1]));
        assert!(!decode_ping(&[]));
    }

    #[test]
    fn ping_response_roundtrip() {
        let packet = PingResponse {
            peripheral_type: 0x0000_0007,
            peripheral_version: 0x0003,
        };
        let mut buf = [0u8; PING_RESPONSE_PACKET_SIZE];
        encode_ping_response(&mut buf, &packet);
        // Big-endian layout is part of the wire contract.
        assert_eq!(buf, [0xA1, 0, 0, 0, 7, 0, 3]);
        assert_eq!(decode_ping_response(&buf), Ok(packet));
    }

    #[test]
    fn ping_response_rejects_wrong_tag() {
        let mut buf = [0u8; PING_RESPONSE_PACKET_SIZE];
        encode_ping_response(
            &mut buf,
            &PingResponse {
                peripheral_type: 1,
                peripheral_version: 1,
            },
        );
        buf[0] = 0xA0;
        assert_eq!(
            decode_ping_response(&buf),
            Err(PacketDecodeError::WrongTag {
                expected: 0xA1,
                found: 0xA0
            })
        );
    }

    #[test]
    fn ping_response_rejects_truncated() {
        assert!(matches!(
            decode_ping_response(&[0xA1, 0, 0]),
            Err(PacketDecodeError::Truncated { .. })
        ));
    }

    #[test]
    fn start_of_stream_roundtrip_crc32() {
        let packet = StartOfStream::<Crc32> {
            data_size: 40,
            checksum: Crc32::compute(b"payload"),
        };
        let mut buf = vec![0u8; start_of_stream_packet_size::<Crc32>()];
        encode_start_of_stream(&mut buf, &packet);
        assert_eq!(buf.len(), 7);
        assert_eq!(buf[0], 0xA2);
        assert_eq!(read_u16(&buf[1..3]), 40);
        assert_eq!(decode_start_of_stream::<Crc32>(&buf), Ok(packet));
    }

    #[test]
    fn start_of_stream_roundtrip_md5() {
        let packet = StartOfStream::<Md5> {
            data_size: 1024,
            checksum: Md5::compute(b"payload"),
        };
        let mut buf = vec![0u8; start_of_stream_packet_size::<Md5>()];
        encode_start_of_stream(&mut buf, &packet);
        assert_eq!(buf.len(), 19);
        assert_eq!(decode_start_of_stream::<Md5>(&buf), Ok(packet));
    }

    #[test]
    fn start_of_stream_rejects_wrong_tag() {
        let mut buf = vec![0u8; start_of_stream_packet_size::<Crc32>()];
        encode_start_of_stream(
            &mut buf,
            &StartOfStream::<Crc32> {
                data_size: 8,
                checksum: [0; 4],
            },
        );
        buf[0] = 0xA1;
        assert!(matches!(
            decode_start_of_stream::<Crc32>(&buf),
            Err(PacketDecodeError::WrongTag { .. })
        ));
    }

    #[test]
    fn start_of_stream_variant_sizes_differ() {
        // A CRC32 header is too short to be an MD5 header; the variants are
        // not wire-compatible.
        let packet = StartOfStream::<Crc32> {
            data_size: 8,
            checksum: [1, 2, 3, 4],
        };
        let mut buf = vec![0u8; start_of_stream_packet_size::<Crc32>()];
        encode_start_of_stream(&mut buf, &packet);
        assert!(matches!(
            decode_start_of_stream::<Md5>(&buf),
            Err(PacketDecodeError::Truncated { .. })
        ));
    }

    #[test]
    fn integer_helpers_are_big_endian() {
        let mut buf = [0u8; 4];
        write_u32(&mut buf, 0x0102_0304);
        assert_eq!(buf, [1, 2, 3, 4]);
        assert_eq!(read_u32(&buf), 0x0102_0304);
        write_u16(&mut buf, 0x0A0B);
        assert_eq!(buf[..2], [0x0A, 0x0B]);
        assert_eq!(read_u16(&buf), 0x0A0B);
    }
}
