use core_types::SerialConfig;
use serde::{Deserialize, Serialize};

/// Engine configuration.
///
/// All keys are optional when deserialized; the two legacy key names from
/// earlier releases are accepted as aliases.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct EngineConfig {
    /// Serial baud rate.
    pub baud_rate: u32,

    /// Take an exclusive transport-level lock on the port, so a second
    /// process (or a second engine) cannot open it concurrently.
    pub lock: bool,

    /// Interval between reconnect attempts after an unintentional close.
    #[serde(alias = "reconnectTime")]
    pub reconnect_interval_ms: u64,

    /// When the device reports it is PIN-locked, fail every queued
    /// exchange with `Locked` instead of waiting for the unlock.
    #[serde(alias = "rejectOnLocked")]
    pub reject_on_locked: bool,

    /// Observability only.
    pub debug: bool,

    /// Observability only.
    pub log_level: Option<String>,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            baud_rate: 115200,
            lock: true,
            reconnect_interval_ms: 1000,
            reject_on_locked: false,
            debug: false,
            log_level: None,
        }
    }
}

impl EngineConfig {
    /// The serial line parameters this configuration asks for.
    pub fn serial_config(&self) -> SerialConfig {
        let mut serial = SerialConfig::new_8n1(self.baud_rate);
        serial.exclusive = self.lock;
        serial
    }
}
