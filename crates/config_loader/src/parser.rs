//! Configuration parsing
//!
//! TOML is the primary format, JSON is accepted as well.

use contracts::{ContractError, DeviceBlueprint};

/// Configuration file format
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigFormat {
    /// TOML (preferred)
    Toml,
    /// JSON
    Json,
}

impl ConfigFormat {
    /// Infer the format from a file extension
    pub fn from_extension(ext: &str) -> Option<Self> {
        match ext.to_lowercase().as_str() {
            "toml" => Some(Self::Toml),
            "json" => Some(Self::Json),
            _ => None,
        }
    }
}

/// Parse a TOML configuration
pub fn parse_toml(content: &str) -> Result<DeviceBlueprint, ContractError> {
    toml::from_str(content).map_err(|e| ContractError::ConfigParse {
        message: format!("TOML parse error: {e}"),
        source: Some(Box::new(e)),
    })
}

/// Parse a JSON configuration
pub fn parse_json(content: &str) -> Result<DeviceBlueprint, ContractError> {
    serde_json::from_str(content).map_err(|e| ContractError::ConfigParse {
        message: format!("JSON parse error: {e}"),
        source: Some(Box::new(e)),
    })
}

/// Parse according to `format`
pub fn parse(content: &str, format: ConfigFormat) -> Result<DeviceBlueprint, ContractError> {
    match format {
        ConfigFormat::Toml => parse_toml(content),
        ConfigFormat::Json => parse_json(content),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use contracts::{DeviceId, PatternId, TransportConfig};

    #[test]
    fn test_parse_toml_full() {
        let content = r#"
version = "V1"

[engine]
base_precedence = 2000
precedence_gain = 5000
device_id = "02:00:00:00:00:01"
start_pattern = 0x00b3db69
admin_precedence = 60000

[runtime]
tick_interval_ms = 20

[[transports]]
kind = "udp"
multicast_addr = "239.1.2.3"
port = 7000
echo = true
"#;
        let result = parse_toml(content);
        assert!(result.is_ok(), "Failed: {:?}", result.err());
        let bp = result.unwrap();
        assert_eq!(bp.engine.base_precedence, 2000);
        assert_eq!(bp.engine.precedence_gain, 5000);
        assert_eq!(bp.engine.device_id, Some(DeviceId::new([2, 0, 0, 0, 0, 1])));
        assert_eq!(bp.engine.start_pattern, PatternId::START);
        assert_eq!(bp.engine.admin_precedence, Some(60000));
        assert_eq!(bp.runtime.tick_interval_ms, 20);
        assert_eq!(bp.transports.len(), 1);
        let TransportConfig::Udp(udp) = &bp.transports[0];
        assert_eq!(udp.port, 7000);
        assert!(udp.echo);
        assert_eq!(udp.min_send_interval_ms, 100);
    }

    #[test]
    fn test_parse_json_minimal() {
        let content = r#"{ "transports": [{ "kind": "udp" }] }"#;
        let result = parse_json(content);
        assert!(result.is_ok(), "Failed: {:?}", result.err());
        let bp = result.unwrap();
        assert_eq!(bp.engine.base_precedence, 1000);
        assert_eq!(bp.runtime.tick_interval_ms, 10);
    }

    #[test]
    fn test_parse_toml_syntax_error() {
        let result = parse_toml("invalid toml [[[");
        assert!(matches!(result, Err(ContractError::ConfigParse { .. })));
    }

    #[test]
    fn test_parse_bad_device_id() {
        let content = r#"
[engine]
device_id = "not-a-mac"
"#;
        let result = parse_toml(content);
        assert!(result.is_err());
    }

    #[test]
    fn test_unknown_transport_kind() {
        let content = r#"
[[transports]]
kind = "carrier_pigeon"
"#;
        assert!(parse_toml(content).is_err());
    }

    #[test]
    fn test_format_from_extension() {
        assert_eq!(ConfigFormat::from_extension("toml"), Some(ConfigFormat::Toml));
        assert_eq!(ConfigFormat::from_extension("TOML"), Some(ConfigFormat::Toml));
        assert_eq!(ConfigFormat::from_extension("json"), Some(ConfigFormat::Json));
        assert_eq!(ConfigFormat::from_extension("yaml"), None);
    }
}
