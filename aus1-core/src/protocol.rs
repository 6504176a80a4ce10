//! AUS1 wire protocol: packet types, tags, fixed sizes, bus and timing constants.

use crate::checksum::StreamChecksum;

/// Fixed bus address of the AUS1 peripheral.
pub const BUS_ADDRESS: u8 = 0x0A;

/// Type tag of a ping packet.
pub const PING_TAG: u8 = 0xA0;
/// Type tag of a ping-response packet.
pub const PING_RESPONSE_TAG: u8 = 0xA1;
/// Type tag of a start-of-stream packet.
pub const START_OF_STREAM_TAG: u8 = 0xA2;

/// Encoded size of a ping packet.
pub const PING_PACKET_SIZE: usize = 1;
/// Encoded size of a ping-response packet: tag + type (4) + version (2).
pub const PING_RESPONSE_PACKET_SIZE: usize = 7;

/// Encoded size of a start-of-stream packet for checksum variant `C`:
/// tag + data size (2) + digest (`C::WIDTH`).
pub fn start_of_stream_packet_size<C: StreamChecksum>() -> usize {
    3 + C::WIDTH
}

/// Interval between presence pings while the controller is idle.
pub const PING_INTERVAL_MS: u64 = 20;
/// Window after stray idle-state bytes during which state processing is deferred.
pub const IDLE_NOISE_WINDOW_MS: u64 = 10;
/// Default silence period after which a non-idle controller abandons the exchange.
pub const DEFAULT_TIMEOUT_MS: u64 = 250;

/// Identity advertised by a peripheral in answer to a ping.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PingResponse {
    pub peripheral_type: u32,
    pub peripheral_version: u16,
}

/// Announces an incoming stream: payload length and whole-stream checksum.
/// The checksum variant is fixed per deployment; the two header layouts are
/// not wire-compatible.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StartOfStream<C: StreamChecksum> {
    pub data_size: u16,
    pub checksum: C::Digest,
}
