use serde::{Deserialize, Serialize};

/// Notifications from the engine to the application.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub enum EngineEvent {
    /// The transport is open; queued exchanges are being dispatched.
    Open,

    /// The transport closed, intentionally or not.
    Close,

    /// A transport-level fault occurred.
    Error { message: String },

    /// The connection attempt (or the open link) failed; reconnection is
    /// scheduled unless the engine is closing.
    Failed { message: String },

    /// The device reported it is PIN-locked.
    Locked,

    /// The device is waiting for on-device user confirmation; the watchdog
    /// is disarmed until the next inbound delivery.
    WaitUserConfirm,
}

#[cfg(test)]
#[allow(clippy::panic, clippy::unwrap_used, clippy::indexing_slicing)]
mod tests {
    use super::*;

    #[test]
    fn test_event_serialization() {
        let event = EngineEvent::Failed {
            message: "port vanished".into(),
        };
        let json = serde_json::to_string(&event).unwrap();
        let back: EngineEvent = serde_json::from_str(&json).unwrap();
        assert_eq!(event, back);
    }
}
