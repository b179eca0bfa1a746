use crate::errors::EngineError;
use core_types::{LinkEvent, Reply};
use futures_channel::oneshot;

/// Completion sink for one exchange.
pub type ReplySink = oneshot::Sender<Result<Reply, EngineError>>;

/// Completion sink for a lock grant.
pub type LockSink = oneshot::Sender<Result<(), EngineError>>;

/// Everything that can happen to the engine funnels through this enum on
/// one channel: API calls, link events, and timer fires. That single
/// consumer is what serializes all mutation of queue and state.
pub enum EngineMessage {
    /// Enqueue an exchange (`prepend` inserts at the head of the pending
    /// portion, never displacing the one in flight).
    Send {
        payload: Vec<u8>,
        prepend: bool,
        done: ReplySink,
    },

    /// Request a cooperative lock; granted in FIFO order.
    Lock { granted: LockSink },

    /// Release the oldest outstanding lock.
    Unlock,

    /// Is at least one lock currently held?
    Locked { reply: oneshot::Sender<bool> },

    /// Fail every pending exchange with `Cleared` and release all locks.
    Clear { done: oneshot::Sender<()> },

    /// Close the transport and stop reconnecting. Idempotent.
    Close { done: oneshot::Sender<()> },

    /// (Re)open the transport, optionally on a different port. Idempotent
    /// when already open.
    Open {
        port: Option<String>,
        done: oneshot::Sender<Result<(), EngineError>>,
    },

    /// Event from a transport read loop. `instance` identifies which
    /// transport emitted it; events from superseded instances are stale
    /// and ignored.
    Link { instance: u64, event: LinkEvent },

    /// The watchdog period elapsed. Stale generations are ignored.
    WatchdogElapsed { generation: u64 },

    /// Periodic reconnect tick while the link is down.
    ReconnectTick,
}

impl std::fmt::Debug for EngineMessage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Send {
                payload, prepend, ..
            } => f
                .debug_struct("Send")
                .field("payload", payload)
                .field("prepend", prepend)
                .finish(),
            Self::Lock { .. } => write!(f, "Lock"),
            Self::Unlock => write!(f, "Unlock"),
            Self::Locked { .. } => write!(f, "Locked"),
            Self::Clear { .. } => write!(f, "Clear"),
            Self::Close { .. } => write!(f, "Close"),
            Self::Open { port, .. } => f.debug_struct("Open").field("port", port).finish(),
            Self::Link { instance, event } => f
                .debug_struct("Link")
                .field("instance", instance)
                .field("event", event)
                .finish(),
            Self::WatchdogElapsed { generation } => f
                .debug_struct("WatchdogElapsed")
                .field("generation", generation)
                .finish(),
            Self::ReconnectTick => write!(f, "ReconnectTick"),
        }
    }
}
