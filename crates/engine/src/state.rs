use serde::{Deserialize, Serialize};

/// # Engine state machine
///
/// ```text
///          enqueue + write OK
///   Idle ----------------------> Sending
///    ^                             |   |
///    |  terminal status / error /  |   | OUTPUT_BEGIN
///    |  watchdog / clear           |   v
///    +-----------------------------+  Reading
///    ^                                 |
///    |  OUTPUT_END / watchdog / clear  |
///    +---------------------------------+
/// ```
///
/// ## Invariants
///
/// - **Reading**: queue non-empty; the head owns the accumulating decoder.
/// - **Sending**: queue non-empty; watchdog armed.
/// - **Idle**: watchdog disarmed. The queue may momentarily be non-empty
///   between a completion and the dispatch of the next entry.
/// - At most one exchange is ever in flight: the head, while state is not
///   `Idle`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub enum EngineState {
    /// Nothing in flight.
    #[default]
    Idle,
    /// The head exchange has been written; awaiting a status byte.
    Sending,
    /// An output payload is being accumulated for the head exchange.
    Reading,
}

impl EngineState {
    /// Whether the head exchange is currently in flight.
    pub fn in_flight(&self) -> bool {
        !matches!(self, Self::Idle)
    }

    /// Validate a transition. Self-transitions are idempotent no-ops.
    pub fn can_transition_to(&self, new_state: EngineState) -> bool {
        use EngineState::*;

        match (self, new_state) {
            // Dispatching the head
            (Idle, Sending) => true,
            // Terminal status, error, watchdog, or clear
            (Sending, Idle) => true,
            // OUTPUT_BEGIN
            (Sending, Reading) => true,
            // OUTPUT_END, watchdog, error, or clear
            (Reading, Idle) => true,

            (Idle, Idle) | (Sending, Sending) | (Reading, Reading) => true,

            _ => false,
        }
    }
}

#[cfg(test)]
#[allow(clippy::panic, clippy::unwrap_used, clippy::indexing_slicing)]
mod tests {
    use super::*;

    #[test]
    fn test_valid_transitions() {
        assert!(EngineState::Idle.can_transition_to(EngineState::Sending));
        assert!(EngineState::Sending.can_transition_to(EngineState::Reading));
        assert!(EngineState::Sending.can_transition_to(EngineState::Idle));
        assert!(EngineState::Reading.can_transition_to(EngineState::Idle));
    }

    #[test]
    fn test_invalid_transitions() {
        // Reading is only entered from Sending via OUTPUT_BEGIN
        assert!(!EngineState::Idle.can_transition_to(EngineState::Reading));
        assert!(!EngineState::Reading.can_transition_to(EngineState::Sending));
    }

    #[test]
    fn test_in_flight() {
        assert!(!EngineState::Idle.in_flight());
        assert!(EngineState::Sending.in_flight());
        assert!(EngineState::Reading.in_flight());
    }

    #[test]
    fn test_serialization_roundtrip() {
        for state in [EngineState::Idle, EngineState::Sending, EngineState::Reading] {
            let json = serde_json::to_string(&state).unwrap();
            let back: EngineState = serde_json::from_str(&json).unwrap();
            assert_eq!(state, back);
        }
    }
}
