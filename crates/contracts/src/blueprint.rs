//! DeviceBlueprint - Config Loader output
//!
//! Describes one device: engine tuning, runtime loop settings and the
//! transports to bring up.

use serde::{Deserialize, Serialize};
use std::net::{Ipv4Addr, SocketAddrV4};

use crate::{Milliseconds, SyncEngineConfig};

/// Configuration version
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum ConfigVersion {
    #[default]
    V1,
}

/// Full device configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeviceBlueprint {
    /// Configuration version
    #[serde(default)]
    pub version: ConfigVersion,

    /// Protocol engine settings
    #[serde(default)]
    pub engine: SyncEngineConfig,

    /// Tick loop and exporter settings
    #[serde(default)]
    pub runtime: RuntimeConfig,

    /// Transports to register with the engine
    pub transports: Vec<TransportConfig>,
}

/// Tick loop settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RuntimeConfig {
    /// Interval between engine ticks
    #[serde(default = "default_tick_interval_ms")]
    pub tick_interval_ms: Milliseconds,

    /// Prometheus exporter port (0 = disabled)
    #[serde(default)]
    pub metrics_port: u16,
}

fn default_tick_interval_ms() -> Milliseconds {
    10
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            tick_interval_ms: default_tick_interval_ms(),
            metrics_port: 0,
        }
    }
}

/// Transport definition, tagged by `kind`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum TransportConfig {
    /// UDP multicast
    Udp(UdpConfig),
}

/// UDP multicast transport settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UdpConfig {
    /// Multicast group
    #[serde(default = "default_multicast_addr")]
    pub multicast_addr: Ipv4Addr,

    /// Port bound locally and sent to
    #[serde(default = "default_udp_port")]
    pub port: u16,

    /// Local interface used to join the group
    #[serde(default = "default_interface")]
    pub interface: Ipv4Addr,

    /// Keep broadcasting on this transport while following through it
    #[serde(default)]
    pub echo: bool,

    /// Minimum time between two sends of an unchanged pattern
    #[serde(default = "default_min_send_interval_ms")]
    pub min_send_interval_ms: Milliseconds,
}

fn default_multicast_addr() -> Ipv4Addr {
    Ipv4Addr::new(224, 0, 0, 169)
}

fn default_udp_port() -> u16 {
    6699
}

fn default_interface() -> Ipv4Addr {
    Ipv4Addr::UNSPECIFIED
}

fn default_min_send_interval_ms() -> Milliseconds {
    100
}

impl Default for UdpConfig {
    fn default() -> Self {
        Self {
            multicast_addr: default_multicast_addr(),
            port: default_udp_port(),
            interface: default_interface(),
            echo: false,
            min_send_interval_ms: default_min_send_interval_ms(),
        }
    }
}

impl UdpConfig {
    /// Group address datagrams are sent to.
    pub fn group(&self) -> SocketAddrV4 {
        SocketAddrV4::new(self.multicast_addr, self.port)
    }

    /// Short label for logs and metrics
    pub fn label(&self) -> String {
        format!("udp://{}", self.group())
    }
}

impl TransportConfig {
    /// Short label for logs
    pub fn label(&self) -> String {
        match self {
            Self::Udp(udp) => udp.label(),
        }
    }
}

impl DeviceBlueprint {
    /// Engine configuration for this device.
    pub fn to_sync_engine_config(&self) -> SyncEngineConfig {
        self.engine.clone()
    }

    /// UDP transport definitions
    pub fn udp_transports(&self) -> impl Iterator<Item = &UdpConfig> {
        self.transports.iter().map(|transport| match transport {
            TransportConfig::Udp(udp) => udp,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::PatternId;

    #[test]
    fn test_defaults_from_json() {
        let blueprint: DeviceBlueprint =
            serde_json::from_str(r#"{ "transports": [ { "kind": "udp" } ] }"#).unwrap();
        assert_eq!(blueprint.version, ConfigVersion::V1);
        assert_eq!(blueprint.runtime.tick_interval_ms, 10);
        assert_eq!(blueprint.engine.start_pattern, PatternId::START);

        let udp = blueprint.udp_transports().next().unwrap();
        assert_eq!(udp.group().to_string(), "224.0.0.169:6699");
        assert_eq!(udp.min_send_interval_ms, 100);
        assert!(!udp.echo);
    }

    #[test]
    fn test_engine_overrides() {
        let blueprint: DeviceBlueprint = serde_json::from_str(
            r#"{
                "engine": { "base_precedence": 5, "device_id": "02:00:00:00:00:07", "admin_precedence": 60000 },
                "transports": []
            }"#,
        )
        .unwrap();
        let config = blueprint.to_sync_engine_config();
        assert_eq!(config.base_precedence, 5);
        assert_eq!(config.precedence_gain, 1000);
        assert_eq!(config.admin_precedence, Some(60000));
        assert_eq!(config.device_id.unwrap().to_string(), "02:00:00:00:00:07");
    }
}
