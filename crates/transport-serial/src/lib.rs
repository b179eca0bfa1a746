//! Native serial transport.
//!
//! [`SerialFactory`] opens a port with `tokio-serial` and splits it: the
//! write half becomes the [`SerialTransport`] handed to the engine, the
//! read half is owned by a spawned read loop that forwards inbound chunks
//! as [`LinkEvent`]s until the link dies or the transport is closed.

#![deny(
    clippy::unwrap_used,
    clippy::expect_used,
    clippy::panic,
    clippy::indexing_slicing,
    clippy::todo
)]

pub mod enumerate;

use async_trait::async_trait;
use core_types::{LinkEvent, SerialConfig, Transport, TransportError, TransportFactory};
use futures::stream::StreamExt;
use futures::SinkExt;
use futures_channel::mpsc;
use tokio::io::{AsyncReadExt, AsyncWriteExt, ReadHalf, WriteHalf};
use tokio_serial::{DataBits, FlowControl, Parity, SerialPortBuilderExt, SerialStream, StopBits};
use tracing::{trace, warn};

pub use enumerate::{discover, list_ports, DEVICE_PID, DEVICE_VID};

/// Capacity of the inbound event channel. The engine drains promptly; this
/// only has to absorb short bursts.
const EVENT_CHANNEL_CAPACITY: usize = 64;

/// Read buffer size for one delivery.
const READ_BUF_SIZE: usize = 512;

/// The write half of an open serial link.
pub struct SerialTransport {
    writer: WriteHalf<SerialStream>,
    shutdown_tx: mpsc::Sender<()>,
}

#[async_trait]
impl Transport for SerialTransport {
    async fn write(&mut self, data: &[u8]) -> Result<(), TransportError> {
        trace!("TX {} bytes: [{}]", data.len(), hex(data));
        self.writer
            .write_all(data)
            .await
            .map_err(|e| TransportError::Io(e.to_string()))?;
        self.writer
            .flush()
            .await
            .map_err(|e| TransportError::Io(e.to_string()))
    }

    async fn close(&mut self) {
        // Read loop exits without emitting Closed; the writer is released
        // when the transport is dropped.
        let _ = self.shutdown_tx.clone().try_send(());
    }
}

/// Opens [`SerialTransport`]s.
#[derive(Debug, Clone, Default)]
pub struct SerialFactory;

impl SerialFactory {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl TransportFactory for SerialFactory {
    type Transport = SerialTransport;

    async fn open(
        &mut self,
        path: &str,
        config: &SerialConfig,
    ) -> Result<(SerialTransport, mpsc::Receiver<LinkEvent>), TransportError> {
        let mut stream = tokio_serial::new(path, config.baud_rate)
            .data_bits(map_data_bits(config.data_bits))
            .stop_bits(map_stop_bits(config.stop_bits))
            .parity(Parity::None)
            .flow_control(FlowControl::None)
            .open_native_async()
            .map_err(|e| TransportError::OpenFailed(e.to_string()))?;

        #[cfg(unix)]
        if config.exclusive {
            if let Err(e) = stream.set_exclusive(true) {
                warn!("could not take exclusive lock on {}: {}", path, e);
            }
        }

        let (reader, writer) = tokio::io::split(stream);
        let (event_tx, event_rx) = mpsc::channel(EVENT_CHANNEL_CAPACITY);
        let (shutdown_tx, shutdown_rx) = mpsc::channel(1);

        spawn_read_loop(reader, event_tx, shutdown_rx);

        Ok((
            SerialTransport {
                writer,
                shutdown_tx,
            },
            event_rx,
        ))
    }
}

fn spawn_read_loop(
    mut reader: ReadHalf<SerialStream>,
    mut event_tx: mpsc::Sender<LinkEvent>,
    mut shutdown_rx: mpsc::Receiver<()>,
) {
    tokio::spawn(async move {
        let mut buf = [0u8; READ_BUF_SIZE];
        loop {
            tokio::select! {
                _ = shutdown_rx.next() => {
                    trace!("read loop: shutdown signal");
                    break;
                }
                result = reader.read(&mut buf) => match result {
                    Ok(0) => {
                        let _ = event_tx.send(LinkEvent::Closed).await;
                        break;
                    }
                    Ok(n) => {
                        let chunk = buf.get(..n).map(<[u8]>::to_vec).unwrap_or_default();
                        trace!("RX {} bytes: [{}]", n, hex(&chunk));
                        if event_tx.send(LinkEvent::Data(chunk)).await.is_err() {
                            // Engine is gone, nothing left to deliver to.
                            break;
                        }
                    }
                    Err(e) => {
                        let _ = event_tx
                            .send(LinkEvent::Error(TransportError::Io(e.to_string())))
                            .await;
                        let _ = event_tx.send(LinkEvent::Closed).await;
                        break;
                    }
                },
            }
        }
    });
}

fn map_data_bits(bits: u8) -> DataBits {
    match bits {
        5 => DataBits::Five,
        6 => DataBits::Six,
        7 => DataBits::Seven,
        _ => DataBits::Eight,
    }
}

fn map_stop_bits(bits: u8) -> StopBits {
    match bits {
        2 => StopBits::Two,
        _ => StopBits::One,
    }
}

fn hex(data: &[u8]) -> String {
    data.iter()
        .map(|b| format!("{:02X}", b))
        .collect::<Vec<_>>()
        .join(" ")
}
