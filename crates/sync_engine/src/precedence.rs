//! Local precedence: base value plus a boost that fades after user input.

use contracts::{Milliseconds, Precedence};

use crate::timing::INPUT_DURATION;

/// Boost earned by user input at `last_input`, evaluated at `now`.
///
/// Full `max_gain` for the first tenth of the input window, then a linear
/// decay to zero at the end of it. Input stamped in the future counts as
/// fresh.
pub fn precedence_gain(
    last_input: Option<Milliseconds>,
    now: Milliseconds,
    max_gain: Precedence,
) -> Precedence {
    let Some(epoch) = last_input else {
        return 0;
    };
    if now < epoch {
        return max_gain;
    }
    let elapsed = now - epoch;
    if elapsed > INPUT_DURATION {
        return 0;
    }
    if elapsed < INPUT_DURATION / 10 {
        return max_gain;
    }
    ((INPUT_DURATION - elapsed) * max_gain as u64 / INPUT_DURATION) as Precedence
}

/// `base + gain`, saturating at the maximum precedence.
pub fn local_precedence(
    base: Precedence,
    max_gain: Precedence,
    last_input: Option<Milliseconds>,
    now: Milliseconds,
) -> Precedence {
    base.saturating_add(precedence_gain(last_input, now, max_gain))
}
