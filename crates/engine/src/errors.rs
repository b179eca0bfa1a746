use core_types::DeviceError;
use thiserror::Error;

/// Caller-facing error taxonomy.
///
/// Every failed exchange resolves with exactly one of these; transport
/// faults additionally surface as events.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum EngineError {
    /// Enqueue attempted while the transport is not open, or the transport
    /// closed while the exchange was queued or in flight.
    #[error("not connected")]
    Disconnected,

    /// No inbound byte for the watchdog period while awaiting a reply.
    #[error("no reply from device within the watchdog period")]
    Watchdog,

    /// The exchange was dropped by `clear()` or `close()`.
    #[error("exchange cleared")]
    Cleared,

    /// The device reported it is PIN-locked and `reject_on_locked` is set.
    #[error("device is locked")]
    Locked,

    /// First reply byte is not in the status vocabulary.
    #[error("unknown response byte {0:#04x}")]
    UnknownResponse(u8),

    /// The device reported an error code.
    #[error("device error: {0}")]
    Device(#[from] DeviceError),

    /// The transport failed while writing this exchange.
    #[error("transport error: {0}")]
    Transport(String),

    /// The engine task is gone; no completion can arrive.
    #[error("engine shut down")]
    Shutdown,
}

#[cfg(test)]
#[allow(clippy::panic, clippy::unwrap_used, clippy::indexing_slicing)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        assert_eq!(EngineError::Disconnected.to_string(), "not connected");
        assert_eq!(
            EngineError::UnknownResponse(0x2A).to_string(),
            "unknown response byte 0x2a"
        );
        assert_eq!(
            EngineError::Device(DeviceError::NotInitialised).to_string(),
            "device error: device not initialised"
        );
    }

    #[test]
    fn test_device_error_conversion() {
        let err: EngineError = DeviceError::MemoryError.into();
        assert_eq!(err, EngineError::Device(DeviceError::MemoryError));
    }
}
