//! Leader precedence ordering.

use std::cmp::Ordering;

use crate::DeviceId;

/// A device's willingness to lead. Higher wins.
pub type Precedence = u16;

/// Compare two `(precedence, device)` pairs.
///
/// Precedence decides first; the device id breaks ties. This is a strict
/// total order, so every device that sees the same candidates picks the same
/// winner. `Ordering::Greater` means the first pair wins.
#[inline]
pub fn compare_precedence(
    p1: Precedence,
    id1: &DeviceId,
    p2: Precedence,
    id2: &DeviceId,
) -> Ordering {
    p1.cmp(&p2).then_with(|| id1.cmp(id2))
}
