//! Local user controls.
//!
//! Every control counts as user input: it boosts local precedence, pins
//! leadership for the input window, re-runs the leader decision right away
//! and asks transports to send immediately.

use contracts::{BuiltinPattern, Milliseconds, PatternId, PatternKind, Precedence, SPECIAL_PATTERNS};
use tracing::{debug, info, warn};

use crate::SyncEngine;

impl SyncEngine {
    /// Skip to the next pattern, honouring loop mode.
    pub fn next(&mut self, now: Milliseconds) {
        self.begin(now);
        info!(
            now,
            from = %self.current_pattern,
            to = %self.next_pattern,
            leader = %self.current_leader(),
            "next command received"
        );
        self.last_user_input = Some(now);
        self.current_pattern_start_time = now;
        if self.looping && self.current_pattern == self.next_pattern {
            self.current_pattern = self.advance(self.current_pattern);
            self.next_pattern = self.current_pattern;
        } else {
            self.current_pattern = self.next_pattern;
            self.next_pattern = self.advance(self.next_pattern);
        }
        self.apply_user_change(now);
    }

    /// Play `pattern` now. Reserved ids that name no built-in are refused.
    pub fn set_pattern(&mut self, pattern: PatternId, now: Milliseconds) -> bool {
        self.begin(now);
        if pattern.is_reserved() && BuiltinPattern::decode(pattern).is_none() {
            warn!(now, pattern = ?pattern, "refusing unknown reserved pattern");
            return false;
        }
        info!(
            now,
            from = %self.current_pattern,
            to = %pattern,
            leader = %self.current_leader(),
            "set pattern command received"
        );
        self.last_user_input = Some(now);
        self.current_pattern_start_time = now;
        self.current_pattern = pattern;
        self.next_pattern = if self.looping {
            pattern
        } else {
            self.advance(pattern)
        };
        self.apply_user_change(now);
        true
    }

    /// Keep playing the current pattern.
    pub fn loop_one(&mut self, now: Milliseconds) {
        self.begin(now);
        self.last_user_input = Some(now);
        if !self.looping {
            info!(now, pattern = %self.current_pattern, "looping");
            self.looping = true;
            self.next_pattern = self.current_pattern;
        }
        self.apply_user_change(now);
    }

    /// Resume the rotation after the current pattern.
    pub fn stop_looping(&mut self, now: Milliseconds) {
        self.begin(now);
        self.last_user_input = Some(now);
        if self.looping {
            info!(now, pattern = %self.current_pattern, "stopping loop");
            self.looping = false;
            self.next_pattern = self.advance(self.current_pattern);
        }
        self.apply_user_change(now);
    }

    /// Force every generated pattern onto `palette`.
    pub fn force_palette(&mut self, palette: u16, now: Milliseconds) {
        info!(now, palette, "forcing palette");
        self.forced_palette = Some(palette);
        let pattern = self.enforce_palette(self.current_pattern);
        self.set_pattern(pattern, now);
    }

    /// Let patterns pick their own palettes again. The one playing keeps its
    /// palette until it rotates out.
    pub fn stop_force_palette(&mut self, now: Milliseconds) {
        self.begin(now);
        self.last_user_input = Some(now);
        if let Some(palette) = self.forced_palette.take() {
            info!(now, palette, "stop forcing palette");
        }
        self.apply_user_change(now);
    }

    /// Step through the calibration and solid color looks, in loop mode.
    pub fn cycle_special(&mut self, now: Milliseconds) {
        self.begin(now);
        let index = match self.special_index {
            Some(index) => (index + 1) % SPECIAL_PATTERNS.len(),
            None => 0,
        };
        self.special_index = Some(index);
        let pattern = SPECIAL_PATTERNS[index].pattern_id();
        info!(now, mode = index + 1, pattern = %pattern, "starting special mode");

        self.last_user_input = Some(now);
        self.current_pattern_start_time = now;
        self.current_pattern = pattern;
        self.next_pattern = pattern;
        self.looping = true;
        self.apply_user_change(now);
    }

    /// Leave special mode and return to generated patterns.
    pub fn stop_special(&mut self, now: Milliseconds) {
        if self.special_index.take().is_none() {
            return;
        }
        info!(now, "stopping special mode");
        self.last_user_input = Some(now);
        self.current_pattern_start_time = now;
        self.current_pattern = self.advance(self.current_pattern);
        self.next_pattern = if self.looping {
            self.current_pattern
        } else {
            self.advance(self.current_pattern)
        };
        self.apply_user_change(now);
    }

    /// Change precedence settings. No-op when nothing changed.
    pub fn update_precedence(&mut self, base: Precedence, gain: Precedence, now: Milliseconds) {
        if self.config.base_precedence == base && self.config.precedence_gain == gain {
            return;
        }
        info!(now, base, gain, "updating precedence");
        self.config.base_precedence = base;
        self.config.precedence_gain = gain;
        self.begin(now);
        self.evict(now);
        self.decide_and_publish(now);
        self.trigger_send_asap(now);
    }

    /// Handle a text command from an operator console.
    ///
    /// `next` skips ahead and stops looping, `prev` loops the current pattern,
    /// `status?` only reports.
    pub fn handle_command(&mut self, command: &str, now: Milliseconds) -> String {
        let response = match command.trim() {
            "status?" => None,
            "next" => {
                self.stop_looping(now);
                self.next(now);
                None
            }
            "prev" => {
                self.loop_one(now);
                None
            }
            _ => Some("! unknown command".to_string()),
        }
        .unwrap_or_else(|| format!("playing {}", self.playing(now).0.name()));
        debug!(command, response = %response, "handled command");
        response
    }

    /// Whether a special look is being shown.
    pub fn in_special_mode(&self) -> bool {
        self.special_index.is_some()
    }

    fn apply_user_change(&mut self, now: Milliseconds) {
        self.restart_requested = true;
        self.evict(now);
        self.decide_and_publish(now);
        self.trigger_send_asap(now);
        debug!(
            now,
            current = %self.current_pattern,
            next = %self.next_pattern,
            generated = matches!(self.current_pattern.kind(), PatternKind::Generated(_)),
            "user change applied"
        );
    }
}
