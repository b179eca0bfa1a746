//! Shared vocabulary for the device driver: the wire protocol's status and
//! command bytes, reply/payload types, and the transport boundary traits.

pub mod transport;
pub mod wire;

pub use transport::{
    LinkEvent, SerialConfig, SerialPortInfo, Transport, TransportError, TransportFactory,
};
pub use wire::{DeviceError, Payload, Reply, ReplyStatus};
