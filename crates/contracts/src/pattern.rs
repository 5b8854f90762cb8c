//! PatternId - opaque 32-bit animation identifier
//!
//! Generated patterns walk a deterministic pseudo-random sequence
//! ([`PatternId::next`]). Identifiers whose low byte is zero are reserved for
//! a fixed table of built-in looks, selected by bits 8..16.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Animation identifier.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PatternId(u32);

impl PatternId {
    /// First pattern played after boot.
    pub const START: PatternId = PatternId(0x00b3_db69);

    const PALETTE_MASK: u32 = 0x1FFF_E000;
    const PALETTE_SHIFT: u32 = 13;
    const PALETTE_FLAG: u32 = 0x8000_0000;

    #[inline]
    pub const fn new(bits: u32) -> Self {
        Self(bits)
    }

    #[inline]
    pub const fn bits(self) -> u32 {
        self.0
    }

    /// Reserved identifiers (low byte zero) denote built-in looks.
    #[inline]
    pub const fn is_reserved(self) -> bool {
        self.0 & 0xFF == 0
    }

    /// Next identifier in the generated sequence.
    ///
    /// A 32-bit xorshift variant followed by a data-dependent rotation. The
    /// result is never reserved: reserved outputs are fed back through the
    /// generator until a non-reserved one comes out.
    pub fn next(self) -> PatternId {
        let mut p = self.0;
        loop {
            p ^= p << 13;
            p ^= p >> 17;
            p ^= p << 5;
            p = p.wrapping_add(0x1337);
            p = p.rotate_left((p / 16384) % 32);
            if p == 0 {
                p = Self::START.0;
            }
            if p & 0xFF != 0 {
                return PatternId(p);
            }
        }
    }

    /// Force a palette onto a generated pattern.
    ///
    /// Reserved inputs are first advanced to the next generated pattern so the
    /// result always carries the palette bits.
    pub fn apply_palette(self, palette: u16) -> PatternId {
        let base = if self.is_reserved() { self.next() } else { self };
        let bits = (base.0 & !Self::PALETTE_MASK)
            | Self::PALETTE_FLAG
            | ((palette as u32) << Self::PALETTE_SHIFT);
        PatternId(bits)
    }

    /// Decode which look this identifier selects.
    pub fn kind(self) -> PatternKind {
        if self.is_reserved() {
            PatternKind::Builtin(BuiltinPattern::decode(self).unwrap_or(BuiltinPattern::Red))
        } else {
            PatternKind::Generated(PatternFamily::from_bits(self.0))
        }
    }

    /// Human-readable name, for logs and status output.
    pub fn name(self) -> &'static str {
        match self.kind() {
            PatternKind::Builtin(builtin) => builtin.name(),
            PatternKind::Generated(family) => family.name(),
        }
    }
}

impl Default for PatternId {
    fn default() -> Self {
        Self::START
    }
}

impl From<u32> for PatternId {
    fn from(bits: u32) -> Self {
        Self(bits)
    }
}

impl fmt::Display for PatternId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({:08x})", self.name(), self.0)
    }
}

impl fmt::Debug for PatternId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "PatternId({:#010x})", self.0)
    }
}

/// Decoded look of a pattern identifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PatternKind {
    Builtin(BuiltinPattern),
    Generated(PatternFamily),
}

/// Procedural pattern families, chosen by the two most significant bits.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PatternFamily {
    /// `11`
    Spin,
    /// `10`
    Hiphotic,
    /// `01`
    Flame,
    /// `00`
    Rings,
}

impl PatternFamily {
    fn from_bits(bits: u32) -> Self {
        match bits >> 30 {
            0b11 => Self::Spin,
            0b10 => Self::Hiphotic,
            0b01 => Self::Flame,
            _ => Self::Rings,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            Self::Spin => "spin",
            Self::Hiphotic => "hiphotic",
            Self::Flame => "flame",
            Self::Rings => "rings",
        }
    }
}

/// Built-in looks addressed by reserved identifiers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BuiltinPattern {
    Black,
    Red,
    Green,
    Blue,
    Purple,
    Cyan,
    Yellow,
    White,
    GlowRed,
    GlowGreen,
    GlowBlue,
    GlowPurple,
    GlowCyan,
    GlowYellow,
    GlowWhite,
    SyncTest,
    Calibration,
    FollowStrand,
    Glitter,
    TheMatrix,
    Threesine,
    Warm,
    GlowWarm,
    /// Selector `0xFF`, rendered as a white glow.
    Beacon,
}

/// Selector (bits 8..16) to built-in look. Unlisted selectors are undefined.
const BUILTIN_TABLE: [(u8, BuiltinPattern); 24] = [
    (0x00, BuiltinPattern::Black),
    (0x01, BuiltinPattern::Red),
    (0x02, BuiltinPattern::Green),
    (0x03, BuiltinPattern::Blue),
    (0x04, BuiltinPattern::Purple),
    (0x05, BuiltinPattern::Cyan),
    (0x06, BuiltinPattern::Yellow),
    (0x07, BuiltinPattern::White),
    (0x08, BuiltinPattern::GlowRed),
    (0x09, BuiltinPattern::GlowGreen),
    (0x0A, BuiltinPattern::GlowBlue),
    (0x0B, BuiltinPattern::GlowPurple),
    (0x0C, BuiltinPattern::GlowCyan),
    (0x0D, BuiltinPattern::GlowYellow),
    (0x0E, BuiltinPattern::GlowWhite),
    (0x0F, BuiltinPattern::SyncTest),
    (0x10, BuiltinPattern::Calibration),
    (0x11, BuiltinPattern::FollowStrand),
    (0x12, BuiltinPattern::Glitter),
    (0x13, BuiltinPattern::TheMatrix),
    (0x14, BuiltinPattern::Threesine),
    (0x15, BuiltinPattern::Warm),
    (0x16, BuiltinPattern::GlowWarm),
    (0xFF, BuiltinPattern::Beacon),
];

impl BuiltinPattern {
    /// Look up the built-in selected by a reserved identifier.
    ///
    /// Returns `None` for non-reserved identifiers and for reserved ones whose
    /// selector is not in the table.
    pub fn decode(pattern: PatternId) -> Option<Self> {
        if !pattern.is_reserved() {
            return None;
        }
        let selector = ((pattern.bits() >> 8) & 0xFF) as u8;
        BUILTIN_TABLE
            .iter()
            .find(|(bits, _)| *bits == selector)
            .map(|(_, builtin)| *builtin)
    }

    /// Reserved identifier for this look (upper 16 bits clear).
    pub fn pattern_id(self) -> PatternId {
        let selector = BUILTIN_TABLE
            .iter()
            .find(|(_, builtin)| *builtin == self)
            .map(|(bits, _)| *bits)
            .unwrap_or(0x01);
        PatternId::new((selector as u32) << 8)
    }

    pub fn name(self) -> &'static str {
        match self {
            Self::Black => "black",
            Self::Red => "red",
            Self::Green => "green",
            Self::Blue => "blue",
            Self::Purple => "purple",
            Self::Cyan => "cyan",
            Self::Yellow => "yellow",
            Self::White => "white",
            Self::GlowRed => "glow-red",
            Self::GlowGreen => "glow-green",
            Self::GlowBlue => "glow-blue",
            Self::GlowPurple => "glow-purple",
            Self::GlowCyan => "glow-cyan",
            Self::GlowYellow => "glow-yellow",
            Self::GlowWhite | Self::Beacon => "glow-white",
            Self::SyncTest => "sync-test",
            Self::Calibration => "calibration",
            Self::FollowStrand => "follow-strand",
            Self::Glitter => "glitter",
            Self::TheMatrix => "the-matrix",
            Self::Threesine => "threesine",
            Self::Warm => "warm",
            Self::GlowWarm => "glow-warm",
        }
    }
}

/// Looks cycled through by the "special" control, in order.
pub const SPECIAL_PATTERNS: [BuiltinPattern; 6] = [
    BuiltinPattern::Calibration,
    BuiltinPattern::Black,
    BuiltinPattern::Red,
    BuiltinPattern::Green,
    BuiltinPattern::Blue,
    BuiltinPattern::White,
];

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_next_is_deterministic() {
        let a = PatternId::START.next();
        let b = PatternId::START.next();
        assert_eq!(a, b);
        assert_ne!(a, PatternId::START);
    }

    #[test]
    fn test_next_known_vectors() {
        let vectors = [
            (0x0000_0000, 0x0000_1337),
            (0x0000_0001, 0x3358_0004),
            (0x00b3_db69, 0x7d00_0629),
            (0xdead_beef, 0x3ee4_77d3),
            (0xffff_ffff, 0xf9ab_0001),
            (0x0000_0100, 0x0420_3647),
            (0x1234_5678, 0x0f30_dbb9),
        ];
        for (input, expected) in vectors {
            assert_eq!(
                PatternId::new(input).next().bits(),
                expected,
                "next({input:08x})"
            );
        }
    }

    #[test]
    fn test_thousand_steps_from_start() {
        let p = (0..1000).fold(PatternId::START, |p, _| p.next());
        assert_eq!(p.bits(), 0xaa78_dffe);
    }

    #[test]
    fn test_next_of_zero_never_returns_zero() {
        let next = PatternId::new(0).next();
        assert_ne!(next.bits(), 0);
        assert!(!next.is_reserved());
    }

    #[test]
    fn test_reserved_is_low_byte_zero() {
        assert!(PatternId::new(0x0000_0100).is_reserved());
        assert!(PatternId::new(0xABCD_EF00).is_reserved());
        assert!(!PatternId::new(0x0000_0110).is_reserved());
        assert!(!PatternId::START.is_reserved());
    }

    #[test]
    fn test_apply_palette_sets_bits() {
        let p = PatternId::new(0x0000_0001).apply_palette(0x0005);
        assert_eq!(p.bits() & 0x8000_0000, 0x8000_0000);
        assert_eq!((p.bits() & 0x1FFF_E000) >> 13, 0x0005);
        assert_eq!(p.bits() & 0x1FFF, 0x0001);
        assert!(!p.is_reserved());
    }

    #[test]
    fn test_apply_palette_skips_reserved() {
        let reserved = PatternId::new(0x0000_0300);
        let p = reserved.apply_palette(2);
        assert!(!p.is_reserved());
        assert_eq!(p.bits() & 0xFF, reserved.next().bits() & 0xFF);
    }

    #[test]
    fn test_builtin_table() {
        assert_eq!(
            BuiltinPattern::decode(PatternId::new(0x0000_1000)),
            Some(BuiltinPattern::Calibration)
        );
        assert_eq!(
            BuiltinPattern::decode(PatternId::new(0x0000_0000)),
            Some(BuiltinPattern::Black)
        );
        assert_eq!(BuiltinPattern::decode(PatternId::new(0x0000_4000)), None);
        assert_eq!(BuiltinPattern::decode(PatternId::new(0x0000_0101)), None);
        for (bits, builtin) in BUILTIN_TABLE {
            assert_eq!(builtin.pattern_id().bits(), (bits as u32) << 8);
        }
    }

    #[test]
    fn test_unknown_builtin_renders_red() {
        assert_eq!(PatternId::new(0x0000_4000).name(), "red");
    }

    #[test]
    fn test_family_names() {
        assert_eq!(PatternId::new(0xC000_0001).name(), "spin");
        assert_eq!(PatternId::new(0x8000_0001).name(), "hiphotic");
        assert_eq!(PatternId::new(0x4000_0001).name(), "flame");
        assert_eq!(PatternId::new(0x0000_0001).name(), "rings");
    }

    proptest! {
        #[test]
        fn prop_next_never_reserved(bits in any::<u32>()) {
            let next = PatternId::new(bits).next();
            prop_assert!(next.bits() & 0xFF != 0);
            prop_assert_eq!(next, PatternId::new(bits).next());
        }

        #[test]
        fn prop_palette_never_reserved(bits in any::<u32>(), palette in any::<u16>()) {
            let p = PatternId::new(bits).apply_palette(palette);
            prop_assert!(!p.is_reserved());
            prop_assert_eq!((p.bits() >> 13) & 0xFFFF, palette as u32);
        }
    }
}
