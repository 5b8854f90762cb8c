//! Configuration validation
//!
//! Rules:
//! - at least one transport
//! - unique (multicast_addr, port) pairs
//! - multicast address inside 224.0.0.0/4, port not zero
//! - tick interval in 1..=1000 ms
//! - explicit device id not all zero
//! - a reserved start pattern names a built-in
//! - admin precedence above base precedence

use std::collections::HashSet;

use contracts::{BuiltinPattern, ContractError, DeviceBlueprint};

/// Validate a DeviceBlueprint
///
/// Returns the first error found, or Ok(()).
pub fn validate(blueprint: &DeviceBlueprint) -> Result<(), ContractError> {
    validate_transports(blueprint)?;
    validate_runtime(blueprint)?;
    validate_engine(blueprint)?;
    Ok(())
}

fn validate_transports(blueprint: &DeviceBlueprint) -> Result<(), ContractError> {
    if blueprint.transports.is_empty() {
        return Err(ContractError::config_validation(
            "transports",
            "at least one transport is required",
        ));
    }

    let mut seen = HashSet::new();
    for (idx, udp) in blueprint.udp_transports().enumerate() {
        if !udp.multicast_addr.is_multicast() {
            return Err(ContractError::config_validation(
                format!("transports[{}].multicast_addr", idx),
                format!("{} is not a multicast address", udp.multicast_addr),
            ));
        }
        if udp.port == 0 {
            return Err(ContractError::config_validation(
                format!("transports[{}].port", idx),
                "port must be > 0",
            ));
        }
        if !seen.insert(udp.group()) {
            return Err(ContractError::config_validation(
                format!("transports[{}]", idx),
                format!("duplicate transport group {}", udp.group()),
            ));
        }
    }
    Ok(())
}

fn validate_runtime(blueprint: &DeviceBlueprint) -> Result<(), ContractError> {
    let tick = blueprint.runtime.tick_interval_ms;
    if !(1..=1000).contains(&tick) {
        return Err(ContractError::config_validation(
            "runtime.tick_interval_ms",
            format!("tick_interval_ms must be within 1..=1000, got {}", tick),
        ));
    }
    Ok(())
}

fn validate_engine(blueprint: &DeviceBlueprint) -> Result<(), ContractError> {
    let engine = &blueprint.engine;

    if engine.device_id.is_some_and(|id| id.is_zero()) {
        return Err(ContractError::config_validation(
            "engine.device_id",
            "device_id cannot be all zero",
        ));
    }

    let start = engine.start_pattern;
    if start.is_reserved() && BuiltinPattern::decode(start).is_none() {
        return Err(ContractError::config_validation(
            "engine.start_pattern",
            format!("{:08x} is reserved but names no built-in pattern", start.bits()),
        ));
    }

    if let Some(admin) = engine.admin_precedence {
        if admin <= engine.base_precedence {
            return Err(ContractError::config_validation(
                "engine.admin_precedence",
                format!(
                    "admin_precedence ({}) must be > base_precedence ({})",
                    admin, engine.base_precedence
                ),
            ));
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use contracts::{
        ConfigVersion, DeviceId, PatternId, RuntimeConfig, SyncEngineConfig, TransportConfig,
        UdpConfig,
    };
    use std::net::Ipv4Addr;

    fn minimal_blueprint() -> DeviceBlueprint {
        DeviceBlueprint {
            version: ConfigVersion::V1,
            engine: SyncEngineConfig::default(),
            runtime: RuntimeConfig::default(),
            transports: vec![TransportConfig::Udp(UdpConfig::default())],
        }
    }

    fn udp_mut(bp: &mut DeviceBlueprint, idx: usize) -> &mut UdpConfig {
        let TransportConfig::Udp(udp) = &mut bp.transports[idx];
        udp
    }

    #[test]
    fn test_valid_config() {
        let bp = minimal_blueprint();
        assert!(validate(&bp).is_ok());
    }

    #[test]
    fn test_no_transports() {
        let mut bp = minimal_blueprint();
        bp.transports.clear();
        let err = validate(&bp).unwrap_err().to_string();
        assert!(err.contains("at least one transport"), "got: {err}");
    }

    #[test]
    fn test_duplicate_group() {
        let mut bp = minimal_blueprint();
        bp.transports.push(bp.transports[0].clone());
        let err = validate(&bp).unwrap_err().to_string();
        assert!(err.contains("duplicate transport group"), "got: {err}");
    }

    #[test]
    fn test_same_group_other_port_is_fine() {
        let mut bp = minimal_blueprint();
        bp.transports.push(bp.transports[0].clone());
        udp_mut(&mut bp, 1).port = 6700;
        assert!(validate(&bp).is_ok());
    }

    #[test]
    fn test_unicast_address() {
        let mut bp = minimal_blueprint();
        udp_mut(&mut bp, 0).multicast_addr = Ipv4Addr::new(192, 168, 1, 10);
        let err = validate(&bp).unwrap_err().to_string();
        assert!(err.contains("not a multicast address"), "got: {err}");
    }

    #[test]
    fn test_zero_port() {
        let mut bp = minimal_blueprint();
        udp_mut(&mut bp, 0).port = 0;
        let err = validate(&bp).unwrap_err().to_string();
        assert!(err.contains("port must be > 0"), "got: {err}");
    }

    #[test]
    fn test_tick_interval_bounds() {
        let mut bp = minimal_blueprint();
        bp.runtime.tick_interval_ms = 0;
        assert!(validate(&bp).is_err());
        bp.runtime.tick_interval_ms = 1001;
        let err = validate(&bp).unwrap_err().to_string();
        assert!(err.contains("tick_interval_ms"), "got: {err}");
        bp.runtime.tick_interval_ms = 1000;
        assert!(validate(&bp).is_ok());
    }

    #[test]
    fn test_zero_device_id() {
        let mut bp = minimal_blueprint();
        bp.engine.device_id = Some(DeviceId::default());
        let err = validate(&bp).unwrap_err().to_string();
        assert!(err.contains("all zero"), "got: {err}");
    }

    #[test]
    fn test_start_pattern() {
        let mut bp = minimal_blueprint();
        bp.engine.start_pattern = BuiltinPattern::Warm.pattern_id();
        assert!(validate(&bp).is_ok());

        bp.engine.start_pattern = PatternId::new(0x0000_4200);
        let err = validate(&bp).unwrap_err().to_string();
        assert!(err.contains("names no built-in"), "got: {err}");
    }

    #[test]
    fn test_admin_precedence() {
        let mut bp = minimal_blueprint();
        bp.engine.admin_precedence = Some(bp.engine.base_precedence);
        let err = validate(&bp).unwrap_err().to_string();
        assert!(err.contains("admin_precedence"), "got: {err}");

        bp.engine.admin_precedence = Some(bp.engine.base_precedence + 1);
        assert!(validate(&bp).is_ok());
    }
}
