//! AUS1 bus protocol reference implementation.
//! Host-driven: no I/O of its own; the bus port and clock are caller-supplied.

pub mod buffer;
pub mod bus;
pub mod checksum;
pub mod chunk;
pub mod controller;
pub mod peripheral;
pub mod protocol;
pub mod wire;

pub use buffer::RecvBuffer;
pub use bus::{BusPort, Clock, SystemClock, WriteStatus};
pub use checksum::{verify, Crc32, Md5, StreamChecksum};
pub use chunk::DATA_CHUNK_SIZE;
pub use controller::{Controller, ControllerState, ReceiveHandler};
pub use peripheral::{DataProvider, Peripheral, PeripheralState};
pub use protocol::{PingResponse, StartOfStream, BUS_ADDRESS};
pub use wire::PacketDecodeError;
