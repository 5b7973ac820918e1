//! The single process-wide poll countdown timer.

use tokio::task::JoinHandle;
use uuid::Uuid;

/// Handle to the countdown task of the currently active poll.
///
/// At most one timer exists at a time; arming a new one aborts the previous
/// task first.
#[derive(Debug)]
pub struct PollTimer {
    /// Poll the countdown belongs to.
    pub poll_id: Uuid,
    /// Task that will end the poll when the countdown elapses.
    pub handle: JoinHandle<()>,
}
