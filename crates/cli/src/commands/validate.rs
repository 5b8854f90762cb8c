//! `validate` command implementation.

use anyhow::{Context, Result};
use serde::Serialize;
use tracing::info;

use crate::cli::ValidateArgs;

/// Validation result for JSON output
#[derive(Serialize)]
struct ValidationResult {
    valid: bool,
    config_path: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    warnings: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    summary: Option<ConfigSummary>,
}

#[derive(Serialize)]
struct ConfigSummary {
    version: String,
    transport_count: usize,
    base_precedence: u16,
    tick_interval_ms: u64,
}

/// Execute the `validate` command
pub fn run_validate(args: &ValidateArgs) -> Result<()> {
    info!(config = %args.config.display(), "Validating configuration");

    let result = validate_config(args);

    if args.json {
        let json = serde_json::to_string_pretty(&result)
            .context("Failed to serialize validation result")?;
        println!("{}", json);
    } else {
        print_validation_result(&result);
    }

    if result.valid {
        Ok(())
    } else {
        anyhow::bail!("Configuration validation failed")
    }
}

fn validate_config(args: &ValidateArgs) -> ValidationResult {
    let config_path = args.config.display().to_string();

    if !args.config.exists() {
        return ValidationResult {
            valid: false,
            config_path,
            error: Some(format!("File not found: {}", args.config.display())),
            warnings: None,
            summary: None,
        };
    }

    match config_loader::ConfigLoader::load_from_path(&args.config) {
        Ok(blueprint) => {
            let warnings = collect_warnings(&blueprint);
            ValidationResult {
                valid: true,
                config_path,
                error: None,
                warnings: if warnings.is_empty() {
                    None
                } else {
                    Some(warnings)
                },
                summary: Some(ConfigSummary {
                    version: format!("{:?}", blueprint.version),
                    transport_count: blueprint.transports.len(),
                    base_precedence: blueprint.engine.base_precedence,
                    tick_interval_ms: blueprint.runtime.tick_interval_ms,
                }),
            }
        }
        Err(e) => ValidationResult {
            valid: false,
            config_path,
            error: Some(e.to_string()),
            warnings: None,
            summary: None,
        },
    }
}

/// Collect configuration warnings (non-fatal issues)
fn collect_warnings(blueprint: &contracts::DeviceBlueprint) -> Vec<String> {
    let mut warnings = Vec::new();

    if blueprint.engine.device_id.is_none() && !blueprint.engine.randomize_device_id {
        warnings.push(
            "engine.device_id not set and UDP transports carry no hardware id - a random id will be used"
                .to_string(),
        );
    }

    if blueprint.engine.precedence_gain == 0 {
        warnings.push("engine.precedence_gain is 0 - user input will not take over leadership".to_string());
    }

    if blueprint.runtime.tick_interval_ms > 100 {
        warnings.push(format!(
            "runtime.tick_interval_ms is {} - timeline adjustments will be coarse",
            blueprint.runtime.tick_interval_ms
        ));
    }

    for udp in blueprint.udp_transports() {
        if udp.min_send_interval_ms < blueprint.runtime.tick_interval_ms {
            warnings.push(format!(
                "{}: min_send_interval_ms below tick interval has no effect",
                udp.label()
            ));
        }
    }

    warnings
}

fn print_validation_result(result: &ValidationResult) {
    if result.valid {
        println!("✓ Configuration is valid: {}", result.config_path);

        if let Some(ref summary) = result.summary {
            println!("\n  Version: {}", summary.version);
            println!("  Transports: {}", summary.transport_count);
            println!("  Base precedence: {}", summary.base_precedence);
            println!("  Tick interval: {} ms", summary.tick_interval_ms);
        }

        if let Some(ref warnings) = result.warnings {
            println!("\n⚠ Warnings:");
            for warning in warnings {
                println!("  - {}", warning);
            }
        }
    } else {
        println!("✗ Configuration is invalid: {}", result.config_path);
        if let Some(ref error) = result.error {
            println!("\n  Error: {}", error);
        }
    }
}
