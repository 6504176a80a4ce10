//! Controller (bus master) state machine: presence pings, transfer
//! negotiation, chunked receive, checksum verification.

use std::time::Duration;

use tracing::{debug, warn};

use crate::buffer::RecvBuffer;
use crate::bus::{BusPort, Clock, WriteStatus};
use crate::checksum::{self, StreamChecksum};
use crate::chunk::{padded_len, DATA_CHUNK_SIZE};
use crate::protocol::{
    start_of_stream_packet_size, BUS_ADDRESS, DEFAULT_TIMEOUT_MS, IDLE_NOISE_WINDOW_MS,
    PING_INTERVAL_MS, PING_PACKET_SIZE, PING_RESPONSE_PACKET_SIZE,
};
use crate::wire;

/// Controller state, advanced one step per [`Controller::update`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ControllerState {
    Idle,
    AwaitingPingResponse,
    AwaitingStartOfStream,
    ReceivingData,
}

/// Completion handler for one data request.
///
/// Invoked at most once: with the received buffer (moved in) and its
/// (logical, padded) sizes on success, or with `(None, 0, 0)` on checksum
/// failure. Never invoked for an abandoned request; abandonment is
/// observable only through [`Controller::connected`] turning false.
pub type ReceiveHandler = Box<dyn FnOnce(Option<Vec<u8>>, usize, usize)>;

/// Bus master for one AUS1 link.
///
/// The host polls [`update`](Controller::update) on a fixed cadence; each
/// call drains the port, applies the liveness rules, and advances the state
/// machine one step. Nothing blocks internally.
pub struct Controller<B: BusPort, C: StreamChecksum, T: Clock> {
    bus: B,
    clock: T,
    state: ControllerState,
    is_connected: bool,
    device_type: u32,
    device_version: u16,
    receiver: Option<ReceiveHandler>,
    expected_checksum: Option<C::Digest>,
    expected_data_size: u16,
    buffer: RecvBuffer,
    /// Bytes of the padded stream covered by issued chunk requests.
    requested: usize,
    timeout_period_ms: u64,
    /// When the last ping was acknowledged; `None` until the first answer.
    last_ping_ms: Option<u64>,
    /// When bytes last arrived or the current exchange was opened.
    last_activity_ms: Option<u64>,
}

impl<B: BusPort, C: StreamChecksum, T: Clock> Controller<B, C, T> {
    pub fn new(bus: B, clock: T) -> Self {
        Self {
            bus,
            clock,
            state: ControllerState::Idle,
            is_connected: false,
            device_type: 0,
            device_version: 0,
            receiver: None,
            expected_checksum: None,
            expected_data_size: 0,
            buffer: RecvBuffer::new(),
            requested: 0,
            timeout_period_ms: DEFAULT_TIMEOUT_MS,
            last_ping_ms: None,
            last_activity_ms: None,
        }
    }

    /// Whether a peripheral has answered a ping within the timeout window.
    pub fn connected(&self) -> bool {
        self.is_connected
    }

    /// Type of the last peripheral that answered a ping. Stale once
    /// [`connected`](Controller::connected) is false.
    pub fn device_type(&self) -> u32 {
        self.device_type
    }

    /// Version of the last peripheral that answered a ping.
    pub fn device_version(&self) -> u16 {
        self.device_version
    }

    pub fn get_state(&self) -> ControllerState {
        self.state
    }

    /// Silence period after which a non-idle exchange is abandoned.
    pub fn set_timeout_period(&mut self, period: Duration) {
        self.timeout_period_ms = period.as_millis() as u64;
    }

    /// Request one bulk transfer from the peripheral.
    ///
    /// Only one request may be outstanding; a second is rejected (returns
    /// false, `handler` dropped uninvoked) and must be queued by the caller.
    pub fn request_data(&mut self, handler: ReceiveHandler) -> bool {
        if self.receiver.is_some() {
            warn!("data request rejected: another request is outstanding");
            return false;
        }
        self.receiver = Some(handler);
        true
    }

    /// Poll the port and advance the state machine one step.
    pub fn update(&mut self) {
        let now = self.clock.now_ms();

        let mut received = false;
        while self.bus.bytes_available() > 0 {
            let Some(byte) = self.bus.read_byte() else { break };
            received = true;
            // A full buffer discards the excess rather than growing.
            self.buffer.push(byte);
        }
        if received {
            self.last_activity_ms = Some(now);
        }

        if self.state == ControllerState::Idle {
            // Stray bytes on an idle bus: let the noise settle before acting.
            if let Some(t) = self.last_activity_ms {
                if now.saturating_sub(t) <= IDLE_NOISE_WINDOW_MS {
                    return;
                }
            }
        } else if let Some(t) = self.last_activity_ms {
            if now.saturating_sub(t) > self.timeout_period_ms {
                warn!(state = ?self.state, "bus went silent; abandoning exchange");
                self.abort_exchange();
                return;
            }
        }

        match self.state {
            ControllerState::Idle => self.update_idle(now),
            ControllerState::AwaitingPingResponse => self.update_awaiting_ping_response(now),
            ControllerState::AwaitingStartOfStream => self.update_awaiting_start_of_stream(now),
            ControllerState::ReceivingData => self.update_receiving_data(),
        }
    }

    fn update_idle(&mut self, now: u64) {
        if self.receiver.is_some() {
            let header_size = start_of_stream_packet_size::<C>();
            self.bus.request_from(BUS_ADDRESS, header_size);
            self.buffer.reset(header_size);
            self.last_activity_ms = Some(now);
            self.state = ControllerState::AwaitingStartOfStream;
            debug!("data request issued; awaiting stream header");
            return;
        }

        let ping_due = match self.last_ping_ms {
            None => true,
            Some(t) => now.saturating_sub(t) > PING_INTERVAL_MS,
        };
        if !ping_due {
            return;
        }
        let mut packet = [0u8; PING_PACKET_SIZE];
        wire::encode_ping(&mut packet);
        if self.send(&packet).is_timeout() {
            if self.is_connected {
                debug!("ping timed out; peripheral disconnected");
            }
            self.is_connected = false;
            return;
        }
        self.buffer.reset(PING_RESPONSE_PACKET_SIZE);
        self.last_activity_ms = Some(now);
        self.state = ControllerState::AwaitingPingResponse;
    }

    fn update_awaiting_ping_response(&mut self, now: u64) {
        if !self.buffer.is_full() {
            return;
        }
        match wire::decode_ping_response(self.buffer.filled()) {
            Ok(packet) if packet.peripheral_type != 0 => {
                if !self.is_connected {
                    debug!(
                        device_type = packet.peripheral_type,
                        device_version = packet.peripheral_version,
                        "peripheral connected"
                    );
                }
                self.device_type = packet.peripheral_type;
                self.device_version = packet.peripheral_version;
                self.is_connected = true;
                self.last_ping_ms = Some(now);
            }
            _ => {
                warn!("invalid ping response; resetting");
                self.is_connected = false;
                self.receiver = None;
                self.buffer.reset(0);
            }
        }
        self.state = ControllerState::Idle;
    }

    fn update_awaiting_start_of_stream(&mut self, now: u64) {
        if !self.buffer.is_full() {
            return;
        }
        match wire::decode_start_of_stream::<C>(self.buffer.filled()) {
            Ok(packet) if packet.data_size != 0 => {
                let padded = padded_len(packet.data_size as usize, DATA_CHUNK_SIZE);
                debug!(data_size = packet.data_size, padded, "stream header accepted");
                self.expected_data_size = packet.data_size;
                self.expected_checksum = Some(packet.checksum);
                self.buffer.reset(padded);
                self.requested = 0;
                self.last_activity_ms = Some(now);
                self.state = ControllerState::ReceivingData;
            }
            _ => {
                warn!("invalid stream header; resetting");
                self.is_connected = false;
                self.receiver = None;
                self.buffer.reset(0);
                self.state = ControllerState::Idle;
            }
        }
    }

    fn update_receiving_data(&mut self) {
        if self.buffer.is_full() {
            let physical_size = self.buffer.capacity();
            let logical_size = self.expected_data_size as usize;
            let bytes = self.buffer.take();
            let checksum_ok = self
                .expected_checksum
                .take()
                .is_some_and(|digest| checksum::verify::<C>(&bytes[..logical_size], &digest));
            if let Some(receiver) = self.receiver.take() {
                if checksum_ok {
                    debug!(logical_size, physical_size, "transfer complete");
                    receiver(Some(bytes), logical_size, physical_size);
                } else {
                    warn!("stream checksum mismatch; reporting failed transfer");
                    receiver(None, 0, 0);
                }
            }
            self.expected_data_size = 0;
            self.requested = 0;
            self.state = ControllerState::Idle;
            return;
        }

        // One read-request per chunk boundary the write cursor has crossed.
        while self.requested <= self.buffer.len() && self.requested < self.buffer.capacity() {
            self.bus.request_from(BUS_ADDRESS, DATA_CHUNK_SIZE);
            self.requested += DATA_CHUNK_SIZE;
        }
    }

    /// Timeout recovery: the request is abandoned, not reported.
    fn abort_exchange(&mut self) {
        self.state = ControllerState::Idle;
        self.is_connected = false;
        self.receiver = None;
        self.expected_checksum = None;
        self.expected_data_size = 0;
        self.requested = 0;
        self.buffer.reset(0);
    }

    fn send(&mut self, bytes: &[u8]) -> WriteStatus {
        self.bus.begin_write(BUS_ADDRESS);
        self.bus.write(bytes);
        self.bus.end_write()
    }
}
