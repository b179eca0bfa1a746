//! # Protocol engine
//!
//! Host-side driver core for a serial-connected hardware security device.
//! The engine owns the serial stream, queues outgoing commands, parses the
//! inbound byte stream into a reply state machine with escape-encoded
//! output payloads, enforces at-most-one in-flight exchange with FIFO
//! ordering, arbitrates multi-step sequences via cooperative locks, and
//! survives disconnects by reconnecting while failing in-flight work.
//!
//! ## Architecture
//!
//! One engine task consumes a single mailbox; API calls, link events, and
//! timer fires are all messages on it, so queue and state are only ever
//! touched from one logical execution context.
//!
//! ```ignore
//! use engine::{start, EngineConfig};
//! use transport_serial::SerialFactory;
//!
//! let (handle, mut events) = start(SerialFactory::new(), "/dev/ttyUSB0", EngineConfig::default());
//! let reply = handle.send(core_types::wire::command::INFO).await?;
//! ```

#![deny(
    clippy::unwrap_used,
    clippy::expect_used,
    clippy::panic,
    clippy::indexing_slicing,
    clippy::todo
)]

pub mod actor;
pub mod arbiter;
pub mod config;
pub mod constants;
pub mod engine;
pub mod errors;
pub mod events;
pub mod handle;
pub mod messages;
pub mod queue;
pub mod state;
pub mod watchdog;

pub use config::EngineConfig;
pub use engine::Engine;
pub use errors::EngineError;
pub use events::EngineEvent;
pub use handle::{start, EngineHandle};
pub use state::EngineState;
