//! Bus subject names understood by the node.

/// Batch of agents that should be running.
pub const AGENTS_RUN: &str = "agents:run";
/// Batch of agents that should be stopped.
pub const AGENTS_STOP: &str = "agents:stop";
/// Broadcast for agents that are known to be running.
pub const AGENTS_STATUS_RUNNING: &str = "agents:status:running";
/// Broadcast for agents that were asked to stop.
pub const AGENTS_STATUS_STOPPED: &str = "agents:status:stopped";
/// Block progress published by the scanner.
pub const SCANNER_BLOCK: &str = "scanner:block";
/// Results of a finished self-inspection.
pub const INSPECTION_DONE: &str = "inspection:done";

/// Every subject the node either consumes or publishes.
pub fn all() -> &'static [&'static str] {
    &[
        AGENTS_RUN,
        AGENTS_STOP,
        AGENTS_STATUS_RUNNING,
        AGENTS_STATUS_STOPPED,
        SCANNER_BLOCK,
        INSPECTION_DONE,
    ]
}
