use async_trait::async_trait;
use futures_channel::mpsc;
use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum TransportError {
    #[error("IO error: {0}")]
    Io(String),
    #[error("failed to open port: {0}")]
    OpenFailed(String),
    #[error("not connected")]
    NotConnected,
}

/// Notification emitted by a transport's read loop.
///
/// `Closed` is always the last event a transport instance emits; after it,
/// the instance is dead and a fresh one must be opened.
#[derive(Debug, Clone, PartialEq)]
pub enum LinkEvent {
    /// A chunk of inbound bytes, in arrival order.
    Data(Vec<u8>),
    /// The link faulted. A `Closed` event follows.
    Error(TransportError),
    /// The link is gone (device unplugged, port closed by the OS, EOF).
    Closed,
}

/// Serial line parameters. The device speaks 8N1; only the baud rate and
/// the exclusive-access flag vary.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SerialConfig {
    pub baud_rate: u32,
    pub data_bits: u8,
    pub stop_bits: u8,
    /// Request exclusive access to the port on open.
    pub exclusive: bool,
}

impl SerialConfig {
    /// Standard 8N1 configuration at the given baud rate.
    pub fn new_8n1(baud_rate: u32) -> Self {
        Self {
            baud_rate,
            data_bits: 8,
            stop_bits: 1,
            exclusive: true,
        }
    }
}

/// A discovered serial port, possibly backed by a USB bridge.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SerialPortInfo {
    pub path: String,
    pub vid: Option<u16>,
    pub pid: Option<u16>,
}

impl SerialPortInfo {
    pub fn new(path: String, vid: Option<u16>, pid: Option<u16>) -> Self {
        Self { path, vid, pid }
    }
}

/// The write half of an open link. Inbound bytes arrive through the
/// `LinkEvent` receiver handed out by the factory at open time.
#[async_trait]
pub trait Transport: Send + 'static {
    /// Write bytes to the device.
    async fn write(&mut self, data: &[u8]) -> Result<(), TransportError>;

    /// Close the link. The read loop stops without emitting `Closed`.
    async fn close(&mut self);
}

/// Opens transports. The engine calls this once at startup and again on
/// every reconnect attempt, so implementations must be reusable.
#[async_trait]
pub trait TransportFactory: Send + 'static {
    type Transport: Transport;

    /// Open the named port. On success, returns the write half and the
    /// receiver on which the spawned read loop delivers `LinkEvent`s.
    async fn open(
        &mut self,
        path: &str,
        config: &SerialConfig,
    ) -> Result<(Self::Transport, mpsc::Receiver<LinkEvent>), TransportError>;
}
