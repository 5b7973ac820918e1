//! Per-connection sliding-window rate limiting for chat.

use std::collections::VecDeque;
use std::time::Duration;

use tokio::time::Instant;

/// Sliding window of send instants for one connection.
///
/// A send is admitted when fewer than `max` sends happened within the last
/// `window`. Admitted sends are recorded; rejected sends are not, so a burst
/// does not extend its own penalty.
#[derive(Debug, Default)]
pub struct SlidingWindow {
    sends: VecDeque<Instant>,
}

impl SlidingWindow {
    /// Create an empty window.
    pub fn new() -> Self {
        Self::default()
    }

    /// Try to admit a send at `now`. Returns `true` and records the send when
    /// under the limit, `false` otherwise.
    pub fn try_acquire(&mut self, now: Instant, window: Duration, max: u32) -> bool {
        while let Some(&oldest) = self.sends.front() {
            if now.duration_since(oldest) >= window {
                self.sends.pop_front();
            } else {
                break;
            }
        }

        if self.sends.len() < max as usize {
            self.sends.push_back(now);
            true
        } else {
            false
        }
    }
}
