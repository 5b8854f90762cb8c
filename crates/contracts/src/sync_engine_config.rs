//! Sync engine configuration contracts that can be shared across crates.

use serde::{Deserialize, Serialize};

use crate::{DeviceId, PatternId, Precedence};

/// Sync engine configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SyncEngineConfig {
    /// Precedence when no user input is recent
    #[serde(default = "default_base_precedence")]
    pub base_precedence: Precedence,

    /// Extra precedence right after user input, decaying to zero
    #[serde(default = "default_precedence_gain")]
    pub precedence_gain: Precedence,

    /// Fixed device identifier (otherwise taken from a transport or random)
    #[serde(default)]
    pub device_id: Option<DeviceId>,

    /// Ignore transport identifiers and always pick a random one
    #[serde(default)]
    pub randomize_device_id: bool,

    /// First pattern played after boot
    #[serde(default)]
    pub start_pattern: PatternId,

    /// Start in loop-one-pattern mode
    #[serde(default)]
    pub start_looping: bool,

    /// Originators at or above this precedence stay eligible during user input
    #[serde(default)]
    pub admin_precedence: Option<Precedence>,
}

fn default_base_precedence() -> Precedence {
    1000
}

fn default_precedence_gain() -> Precedence {
    1000
}

impl Default for SyncEngineConfig {
    fn default() -> Self {
        Self {
            base_precedence: default_base_precedence(),
            precedence_gain: default_precedence_gain(),
            device_id: None,
            randomize_device_id: false,
            start_pattern: PatternId::START,
            start_looping: false,
            admin_precedence: None,
        }
    }
}
