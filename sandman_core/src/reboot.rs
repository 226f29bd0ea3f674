//! Deferred reboot: wait for the "restarting" announcement to finish, but
//! never longer than [`REBOOT_CEILING`].

use std::time::{Duration, Instant};

pub const REBOOT_CEILING: Duration = Duration::from_secs(60);

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct RebootSequence {
    armed_at: Option<Instant>,
}

impl RebootSequence {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn arm(&mut self, now: Instant) {
        if self.armed_at.is_none() {
            tracing::warn!("reboot armed");
            self.armed_at = Some(now);
        }
    }

    pub fn is_armed(&self) -> bool {
        self.armed_at.is_some()
    }

    pub fn cancel(&mut self) {
        self.armed_at = None;
    }

    /// True once, when the reboot should happen now. `last_finished` is when
    /// the most recent announcement finished playing.
    pub fn poll(&mut self, now: Instant, last_finished: Option<Instant>) -> bool {
        let Some(armed) = self.armed_at else {
            return false;
        };
        let spoken = last_finished.is_some_and(|t| t > armed);
        let expired = now.saturating_duration_since(armed) >= REBOOT_CEILING;
        if spoken || expired {
            tracing::info!(spoken, expired, "reboot wait complete");
            self.armed_at = None;
            return true;
        }
        false
    }
}
