//! Rate-limited broadcast of the engine's current message.

use contracts::{Milliseconds, PatternId, SyncMessage};

/// Default minimum spacing between two sends of an unchanged pattern.
pub const DEFAULT_MIN_SEND_INTERVAL: Milliseconds = 100;

/// Decides when the pending message goes out.
///
/// A pending message is sent when nothing was sent yet, when more than the
/// minimum interval has passed, or as soon as its current pattern differs from
/// the last one sent. The pending message stays armed until it is replaced or
/// disabled, so it is rebroadcast periodically.
#[derive(Debug, Clone)]
pub struct SendSchedule {
    min_interval: Milliseconds,
    pending: Option<SyncMessage>,
    last_send_time: Option<Milliseconds>,
    last_sent_pattern: Option<PatternId>,
}

impl Default for SendSchedule {
    fn default() -> Self {
        Self::new(DEFAULT_MIN_SEND_INTERVAL)
    }
}

impl SendSchedule {
    pub fn new(min_interval: Milliseconds) -> Self {
        Self {
            min_interval,
            pending: None,
            last_send_time: None,
            last_sent_pattern: None,
        }
    }

    /// Replace the message to broadcast.
    pub fn set(&mut self, message: &SyncMessage) {
        self.pending = Some(message.clone());
    }

    /// Stop broadcasting until the next `set`.
    pub fn disable(&mut self) {
        self.pending = None;
    }

    /// Forget the last send time so the next poll fires.
    pub fn trigger_asap(&mut self) {
        self.last_send_time = None;
    }

    pub fn is_armed(&self) -> bool {
        self.pending.is_some()
    }

    /// Message to send at `now`, if one is due.
    pub fn poll(&mut self, now: Milliseconds) -> Option<SyncMessage> {
        let message = self.pending.as_ref()?;
        let due = match self.last_send_time {
            None => true,
            Some(last) => {
                now.saturating_sub(last) > self.min_interval
                    || self.last_sent_pattern != Some(message.current_pattern)
            }
        };
        if !due {
            return None;
        }
        self.last_send_time = Some(now);
        self.last_sent_pattern = Some(message.current_pattern);
        Some(message.clone())
    }
}
