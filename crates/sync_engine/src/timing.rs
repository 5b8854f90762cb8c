//! Protocol timing constants.

use contracts::Milliseconds;

/// Play length of one pattern in the rotation.
pub const EFFECT_DURATION: Milliseconds = 10_000;

/// How long local user input keeps boosting precedence and pins leadership.
pub const INPUT_DURATION: Milliseconds = 10 * 60 * 1000;

/// An equal-or-longer route replaces the current next hop once its origination
/// time is this much newer.
pub const ORIGINATION_TIME_OVERRIDE: Milliseconds = 8_000;

/// Routes and messages whose origination time is older than this are dropped.
pub const ORIGINATION_TIME_DISCARD: Milliseconds = 9_000;

/// Routes and messages whose pattern started longer ago than this are dropped.
pub const PATTERN_START_DISCARD: Milliseconds = 2 * EFFECT_DURATION;

/// Start-time moves below this are treated as jitter.
pub const START_TIME_JITTER: Milliseconds = 100;

/// Start-time moves at or above this are accepted immediately.
pub const START_TIME_JUMP: Milliseconds = 500;

/// Consecutive same-direction moves needed to accept a mid-sized shift.
pub const START_TIME_DRIFT_SAMPLES: i8 = 5;

/// A followed leader's start time jumping forward by more than this restarts
/// the local render even if the pattern id is unchanged.
pub const RESTART_JUMP: Milliseconds = EFFECT_DURATION - EFFECT_DURATION / 10;

const _: () = assert!(ORIGINATION_TIME_OVERRIDE < ORIGINATION_TIME_DISCARD);
const _: () = assert!(ORIGINATION_TIME_DISCARD < EFFECT_DURATION);
const _: () = assert!(START_TIME_JITTER < START_TIME_JUMP);
