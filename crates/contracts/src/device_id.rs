//! DeviceId - Fixed-width device identifier used for deterministic tie-breaking
//!
//! Six bytes, normally taken from a hardware (MAC) address. Ordering is
//! byte-wise lexicographic on unsigned bytes.

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::str::FromStr;

use rand::Rng;

use crate::ContractError;

/// Device identifier.
///
/// The derived `Ord` compares the raw bytes lexicographically, which is exactly
/// the tie-break order the protocol relies on.
///
/// # Examples
/// ```
/// use contracts::DeviceId;
///
/// let id: DeviceId = "02:00:00:00:00:2a".parse().unwrap();
/// assert_eq!(id.as_bytes()[5], 0x2a);
/// assert_eq!(id.to_string(), "02:00:00:00:00:2a");
/// ```
#[derive(Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct DeviceId([u8; 6]);

impl DeviceId {
    /// Length of a device identifier on the wire.
    pub const LEN: usize = 6;

    /// Create a DeviceId from raw bytes.
    #[inline]
    pub const fn new(bytes: [u8; 6]) -> Self {
        Self(bytes)
    }

    /// Generate a random, locally administered unicast identifier.
    pub fn random() -> Self {
        let mut bytes = [0u8; 6];
        rand::rng().fill(&mut bytes[..]);
        bytes[0] = (bytes[0] & 0xFE) | 0x02;
        Self(bytes)
    }

    /// Raw bytes.
    #[inline]
    pub const fn as_bytes(&self) -> &[u8; 6] {
        &self.0
    }

    /// All-zero identifiers are never valid for a live device.
    #[inline]
    pub fn is_zero(&self) -> bool {
        self.0 == [0u8; 6]
    }

    /// Identifier with the last byte incremented (wrapping), handy for
    /// addressing simulated neighbours.
    pub fn plus_one(&self) -> Self {
        let mut bytes = self.0;
        bytes[5] = bytes[5].wrapping_add(1);
        Self(bytes)
    }
}

impl From<[u8; 6]> for DeviceId {
    #[inline]
    fn from(bytes: [u8; 6]) -> Self {
        Self(bytes)
    }
}

impl FromStr for DeviceId {
    type Err = ContractError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let mut bytes = [0u8; 6];
        let mut parts = s.split(':');
        for byte in bytes.iter_mut() {
            let part = parts
                .next()
                .ok_or_else(|| ContractError::invalid_device_id(s, "expected 6 octets"))?;
            if part.len() != 2 {
                return Err(ContractError::invalid_device_id(
                    s,
                    format!("octet '{part}' must be two hex digits"),
                ));
            }
            *byte = u8::from_str_radix(part, 16).map_err(|e| {
                ContractError::invalid_device_id(s, format!("octet '{part}': {e}"))
            })?;
        }
        if parts.next().is_some() {
            return Err(ContractError::invalid_device_id(s, "expected 6 octets"));
        }
        Ok(Self(bytes))
    }
}

impl fmt::Display for DeviceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let b = &self.0;
        write!(
            f,
            "{:02x}:{:02x}:{:02x}:{:02x}:{:02x}:{:02x}",
            b[0], b[1], b[2], b[3], b[4], b[5]
        )
    }
}

impl fmt::Debug for DeviceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "DeviceId({self})")
    }
}

impl Serialize for DeviceId {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for DeviceId {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(serde::de::Error::custom)
    }
}
