//! In-memory loopback link: both ends of one AUS1 bus.
//!
//! Master read-clocking semantics: a `request_from(addr, n)` records an
//! outstanding read of `n` bytes, and the slave's next framed write answers
//! the oldest outstanding read as exactly `n` bytes (truncated or
//! filler-padded). Slave writes with no outstanding read pass through
//! unpadded, which is how ping responses travel. Each read request is also
//! surfaced as an event for the host to forward to
//! [`Peripheral::on_data_requested`](aus1_core::Peripheral::on_data_requested).

use std::cell::RefCell;
use std::collections::VecDeque;
use std::rc::Rc;

use aus1_core::{
    BusPort, Controller, Peripheral, PeripheralState, StreamChecksum, WriteStatus,
};

use crate::clock::SimClock;

/// What an idle two-wire data line reads as.
const FILLER_BYTE: u8 = 0xFF;

struct LinkState {
    to_peripheral: VecDeque<u8>,
    to_controller: VecDeque<u8>,
    /// Outstanding master reads, oldest first: byte counts still to serve.
    pending_reads: VecDeque<usize>,
    /// Reads issued since the host last polled for request events.
    unseen_requests: usize,
    /// Status for the controller's next framed write (failure-injection hook).
    next_controller_status: WriteStatus,
    /// Corrupt the next byte the controller reads (failure-injection hook).
    flip_next_controller_byte: bool,
}

/// Handle to a loopback link; clones share the same bus state.
#[derive(Clone)]
pub struct Link {
    state: Rc<RefCell<LinkState>>,
}

impl Link {
    pub fn new() -> Self {
        Self {
            state: Rc::new(RefCell::new(LinkState {
                to_peripheral: VecDeque::new(),
                to_controller: VecDeque::new(),
                pending_reads: VecDeque::new(),
                unseen_requests: 0,
                next_controller_status: WriteStatus::Ack,
                flip_next_controller_byte: false,
            })),
        }
    }

    /// Port for the controller (master) end.
    pub fn controller_port(&self) -> ControllerPort {
        ControllerPort {
            state: self.state.clone(),
            frame: Vec::new(),
        }
    }

    /// Port for the peripheral (slave) end.
    pub fn peripheral_port(&self) -> PeripheralPort {
        PeripheralPort {
            state: self.state.clone(),
            frame: Vec::new(),
        }
    }

    /// Consume one read-request event, if any. The host forwards each to
    /// the peripheral's request handler.
    pub fn take_request_event(&self) -> bool {
        let mut s = self.state.borrow_mut();
        if s.unseen_requests > 0 {
            s.unseen_requests -= 1;
            true
        } else {
            false
        }
    }

    /// Whether a master read is still waiting to be served by the slave.
    pub fn has_pending_read(&self) -> bool {
        !self.state.borrow().pending_reads.is_empty()
    }

    /// Fail the controller's next framed write with `status`.
    pub fn fail_next_controller_write(&self, status: WriteStatus) {
        self.state.borrow_mut().next_controller_status = status;
    }

    /// Corrupt the next byte the controller reads off the bus.
    pub fn flip_next_controller_byte(&self) {
        self.state.borrow_mut().flip_next_controller_byte = true;
    }
}

impl Default for Link {
    fn default() -> Self {
        Self::new()
    }
}

/// Master end of the link.
pub struct ControllerPort {
    state: Rc<RefCell<LinkState>>,
    frame: Vec<u8>,
}

impl BusPort for ControllerPort {
    fn begin_write(&mut self, _address: u8) {
        self.frame.clear();
    }

    fn write(&mut self, bytes: &[u8]) {
        self.frame.extend_from_slice(bytes);
    }

    fn end_write(&mut self) -> WriteStatus {
        let mut s = self.state.borrow_mut();
        let status = std::mem::replace(&mut s.next_controller_status, WriteStatus::Ack);
        let frame = std::mem::take(&mut self.frame);
        if status.is_ack() {
            s.to_peripheral.extend(frame);
        }
        status
    }

    fn bytes_available(&self) -> usize {
        self.state.borrow().to_controller.len()
    }

    fn read_byte(&mut self) -> Option<u8> {
        let mut s = self.state.borrow_mut();
        let byte = s.to_controller.pop_front()?;
        if s.flip_next_controller_byte {
            s.flip_next_controller_byte = false;
            return Some(byte ^ 0xFF);
        }
        Some(byte)
    }

    fn request_from(&mut self, _address: u8, count: usize) {
        let mut s = self.state.borrow_mut();
        s.pending_reads.push_back(count);
        s.unseen_requests += 1;
    }
}

/// Slave end of the link.
pub struct PeripheralPort {
    state: Rc<RefCell<LinkState>>,
    frame: Vec<u8>,
}

impl BusPort for PeripheralPort {
    fn begin_write(&mut self, _address: u8) {
        self.frame.clear();
    }

    fn write(&mut self, bytes: &[u8]) {
        self.frame.extend_from_slice(bytes);
    }

    fn end_write(&mut self) -> WriteStatus {
        let mut s = self.state.borrow_mut();
        let mut frame = std::mem::take(&mut self.frame);
        if let Some(count) = s.pending_reads.pop_front() {
            // The master clocks exactly `count` bytes, whatever the slave
            // actually supplied.
            frame.truncate(count);
            frame.resize(count, FILLER_BYTE);
        }
        s.to_controller.extend(frame);
        WriteStatus::Ack
    }

    fn bytes_available(&self) -> usize {
        self.state.borrow().to_peripheral.len()
    }

    fn read_byte(&mut self) -> Option<u8> {
        self.state.borrow_mut().to_peripheral.pop_front()
    }

    fn request_from(&mut self, _address: u8, _count: usize) {
        // The slave never initiates reads on this link.
    }
}

/// Advance the simulation by one millisecond.
///
/// Polls the controller, forwards request events, and polls the peripheral
/// with stream writes paced by outstanding master reads: a chunk goes out
/// only when a read is waiting to clock it.
pub fn step<C: StreamChecksum>(
    link: &Link,
    clock: &SimClock,
    controller: &mut Controller<ControllerPort, C, SimClock>,
    peripheral: &mut Peripheral<PeripheralPort, C>,
) {
    clock.advance(1);
    controller.update();
    while link.take_request_event() {
        peripheral.on_data_requested();
    }
    if peripheral.state() == PeripheralState::Idle || link.has_pending_read() {
        peripheral.update();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn slave_write_pads_to_pending_read() {
        let link = Link::new();
        let mut master = link.controller_port();
        let mut slave = link.peripheral_port();

        master.request_from(0x0A, 4);
        assert!(link.take_request_event());
        assert!(!link.take_request_event());

        slave.begin_write(0x0A);
        slave.write(&[1, 2]);
        assert!(slave.end_write().is_ack());

        let read: Vec<u8> = std::iter::from_fn(|| master.read_byte()).collect();
        assert_eq!(read, vec![1, 2, FILLER_BYTE, FILLER_BYTE]);
        assert!(!link.has_pending_read());
    }

    #[test]
    fn unsolicited_slave_write_passes_through() {
        let link = Link::new();
        let mut master = link.controller_port();
        let mut slave = link.peripheral_port();

        slave.begin_write(0x0A);
        slave.write(&[9, 8, 7]);
        slave.end_write();

        assert_eq!(master.bytes_available(), 3);
        assert_eq!(master.read_byte(), Some(9));
    }

    #[test]
    fn failed_master_write_is_dropped() {
        let link = Link::new();
        let mut master = link.controller_port();
        let slave = link.peripheral_port();

        link.fail_next_controller_write(WriteStatus::Timeout);
        master.begin_write(0x0A);
        master.write(&[0xA0]);
        assert!(master.end_write().is_timeout());
        assert_eq!(slave.bytes_available(), 0);

        // The hook only arms one write.
        master.begin_write(0x0A);
        master.write(&[0xA0]);
        assert!(master.end_write().is_ack());
        assert_eq!(slave.bytes_available(), 1);
    }

    #[test]
    fn flip_hook_corrupts_one_byte() {
        let link = Link::new();
        let mut master = link.controller_port();
        let mut slave = link.peripheral_port();

        slave.begin_write(0x0A);
        slave.write(&[0x00, 0x00]);
        slave.end_write();

        link.flip_next_controller_byte();
        assert_eq!(master.read_byte(), Some(0xFF));
        assert_eq!(master.read_byte(), Some(0x00));
    }
}
