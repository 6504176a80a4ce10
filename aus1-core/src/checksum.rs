//! Stream checksum variants: whole-transfer digest announced in the stream
//! header and verified by the receiver.
//!
//! A deployment fixes exactly one variant at the type level. `Crc32` and
//! `Md5` produce different header sizes and can never be mixed on one bus.

use md5::Digest as _;

/// Checksum primitive used for a whole streamed payload.
pub trait StreamChecksum {
    /// Digest width on the wire, in bytes.
    const WIDTH: usize;

    /// Digest value carried in a start-of-stream header.
    type Digest: AsRef<[u8]> + Copy + PartialEq + Eq + core::fmt::Debug;

    /// Checksum a whole payload.
    fn compute(payload: &[u8]) -> Self::Digest;

    /// Rebuild a digest from its wire bytes. `bytes` must be exactly `WIDTH` long.
    fn digest_from_wire(bytes: &[u8]) -> Self::Digest;
}

/// CRC32 (IEEE) variant; 4-byte digest, big-endian on the wire.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Crc32;

impl StreamChecksum for Crc32 {
    const WIDTH: usize = 4;
    type Digest = [u8; 4];

    fn compute(payload: &[u8]) -> [u8; 4] {
        let mut hasher = crc32fast::Hasher::new();
        hasher.update(payload);
        hasher.finalize().to_be_bytes()
    }

    fn digest_from_wire(bytes: &[u8]) -> [u8; 4] {
        let mut digest = [0u8; 4];
        digest.copy_from_slice(bytes);
        digest
    }
}

/// MD5 variant; 16-byte digest.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Md5;

impl StreamChecksum for Md5 {
    const WIDTH: usize = 16;
    type Digest = [u8; 16];

    fn compute(payload: &[u8]) -> [u8; 16] {
        let mut hasher = md5::Md5::new();
        hasher.update(payload);
        hasher.finalize().into()
    }

    fn digest_from_wire(bytes: &[u8]) -> [u8; 16] {
        let mut digest = [0u8; 16];
        digest.copy_from_slice(bytes);
        digest
    }
}

/// Verify a payload against the digest announced in a stream header.
pub fn verify<C: StreamChecksum>(payload: &[u8], expected: &C::Digest) -> bool {
    C::compute(payload) == *expected
}
