//! Peripheral (bus slave) state machine: ping replies, stream header
//! announcement, chunked transmission.
//!
//! The request event ([`Peripheral::on_data_requested`]) is the one entry
//! point driven from outside the poll cycle. The outbound payload is
//! handed off as a whole (`Option` take/replace), so a request event can
//! never observe a half-built snapshot; if the event fires from an
//! interrupt context the host must serialize it against `update` with a
//! critical section.

use std::marker::PhantomData;

use tracing::{debug, warn};

use crate::bus::{BusPort, WriteStatus};
use crate::checksum::StreamChecksum;
use crate::chunk::DATA_CHUNK_SIZE;
use crate::protocol::{
    start_of_stream_packet_size, PingResponse, StartOfStream, BUS_ADDRESS, PING_PACKET_SIZE,
    PING_RESPONSE_PACKET_SIZE,
};
use crate::wire;

/// Peripheral state, derived from whether a payload snapshot is live.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PeripheralState {
    Idle,
    SendingData,
}

/// Produces the payload for one outbound transfer.
///
/// Invoked at most once per transfer, only on the transport's request
/// event. Payloads longer than `u16::MAX` bytes cannot be announced in a
/// stream header and must not be returned.
pub type DataProvider = Box<dyn FnMut() -> Vec<u8>>;

/// One payload snapshot being streamed out in chunks.
#[derive(Debug)]
struct Outbound {
    data: Vec<u8>,
    cursor: usize,
}

/// Bus slave for one AUS1 link.
pub struct Peripheral<B: BusPort, C: StreamChecksum> {
    bus: B,
    peripheral_type: u32,
    peripheral_version: u16,
    provider: DataProvider,
    outbound: Option<Outbound>,
    _variant: PhantomData<C>,
}

impl<B: BusPort, C: StreamChecksum> Peripheral<B, C> {
    pub fn new(bus: B, peripheral_type: u32, peripheral_version: u16, provider: DataProvider) -> Self {
        Self {
            bus,
            peripheral_type,
            peripheral_version,
            provider,
            outbound: None,
            _variant: PhantomData,
        }
    }

    pub fn state(&self) -> PeripheralState {
        if self.outbound.is_some() {
            PeripheralState::SendingData
        } else {
            PeripheralState::Idle
        }
    }

    /// Handle the transport's request event: the controller has signalled a
    /// read.
    ///
    /// The first event of a transfer invokes the provider, announces the
    /// stream with a header packet, and arms chunked transmission. Events
    /// arriving while a stream is outbound are chunk pacing and carry no new
    /// work.
    pub fn on_data_requested(&mut self) {
        if self.outbound.is_some() {
            return;
        }
        let data = (self.provider)();
        debug_assert!(data.len() <= u16::MAX as usize);

        let header = StartOfStream::<C> {
            data_size: data.len() as u16,
            checksum: C::compute(&data),
        };
        let mut buf = vec![0u8; start_of_stream_packet_size::<C>()];
        wire::encode_start_of_stream(&mut buf, &header);
        let status = self.send(&buf);
        if !status.is_ack() {
            warn!(?status, "stream header write failed");
        }
        if data.is_empty() {
            // Announced as size 0, which the controller rejects; nothing to stream.
            warn!("provider returned an empty payload");
            return;
        }
        debug!(data_size = data.len(), "stream announced");
        self.outbound = Some(Outbound { data, cursor: 0 });
    }

    /// Poll: advance an outbound stream by one chunk, or answer a ping.
    pub fn update(&mut self) {
        if let Some(mut out) = self.outbound.take() {
            let remaining = out.data.len() - out.cursor;
            if remaining > DATA_CHUNK_SIZE {
                let end = out.cursor + DATA_CHUNK_SIZE;
                self.send(&out.data[out.cursor..end]);
                out.cursor = end;
                self.outbound = Some(out);
            } else {
                // Tail chunk: exactly the bytes that remain, then release.
                self.send(&out.data[out.cursor..]);
                debug!("stream fully sent");
            }
            return;
        }

        match self.bus.bytes_available() {
            0 => {}
            PING_PACKET_SIZE => {
                if let Some(byte) = self.bus.read_byte() {
                    if wire::decode_ping(&[byte]) {
                        self.send_ping_response();
                    }
                }
            }
            _ => {
                // Anything longer than a ping is protocol noise; drain it.
                while self.bus.read_byte().is_some() {}
            }
        }
    }

    fn send_ping_response(&mut self) {
        let packet = PingResponse {
            peripheral_type: self.peripheral_type,
            peripheral_version: self.peripheral_version,
        };
        let mut buf = [0u8; PING_RESPONSE_PACKET_SIZE];
        wire::encode_ping_response(&mut buf, &packet);
        let status = self.send(&buf);
        if !status.is_ack() {
            warn!(?status, "ping response write failed");
        }
    }

    fn send(&mut self, bytes: &[u8]) -> WriteStatus {
        self.bus.begin_write(BUS_ADDRESS);
        self.bus.write(bytes);
        self.bus.end_write()
    }
}
