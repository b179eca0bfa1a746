//! Timing and capacity constants for the engine.

/// Watchdog period in milliseconds.
///
/// The device answers well inside a second under normal conditions; five
/// seconds covers slow user-facing prompts that do not go through the
/// explicit wait-confirm notification. Fixed by the wire protocol's host
/// conventions, not configurable.
pub const WATCHDOG_MS: u64 = 5000;

/// Interval at which cancellable timer tasks re-check their cancel flag.
pub const TIMER_POLL_MS: u64 = 500;

/// Capacity of the engine command channel. API calls, link events, and
/// timer fires all funnel through it; link data from a 115200 baud line
/// stays far below this.
pub const COMMAND_CHANNEL_CAPACITY: usize = 256;

/// Capacity of the event channel toward the application. Events are
/// low-frequency; once a slow consumer fills the buffer, further events
/// are dropped rather than stalling the engine.
pub const EVENT_CHANNEL_CAPACITY: usize = 128;
