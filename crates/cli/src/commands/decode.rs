//! `decode` command implementation.

use anyhow::{Context, Result};
use contracts::SyncMessage;
use serde::Serialize;
use tracing::info;

use crate::cli::DecodeArgs;
use crate::error::CliError;

/// Decoded message for JSON output
#[derive(Serialize)]
struct DecodedMessage {
    sender: String,
    originator: String,
    precedence: u16,
    num_hops: u8,
    current_pattern: String,
    current_pattern_name: &'static str,
    next_pattern: String,
    next_pattern_name: &'static str,
    current_pattern_age_ms: u64,
    origination_age_ms: u64,
}

/// Execute the `decode` command
pub fn run_decode(args: &DecodeArgs) -> Result<()> {
    let payload = parse_payload(&args.payload)?;
    info!(bytes = payload.len(), now = args.now, "Decoding payload");

    let message = wire_codec::decode(&payload, args.now)
        .map_err(|e| CliError::invalid_payload(e.to_string()))?;
    let decoded = describe(&message, args.now);

    if args.json {
        let json =
            serde_json::to_string_pretty(&decoded).context("Failed to serialize message")?;
        println!("{}", json);
    } else {
        println!("sender:        {}", decoded.sender);
        println!("originator:    {}", decoded.originator);
        println!("precedence:    {}", decoded.precedence);
        println!("hops:          {}", decoded.num_hops);
        println!(
            "current:       {} ({}) started {} ms ago",
            decoded.current_pattern, decoded.current_pattern_name, decoded.current_pattern_age_ms
        );
        println!(
            "next:          {} ({})",
            decoded.next_pattern, decoded.next_pattern_name
        );
        println!("originated:    {} ms ago", decoded.origination_age_ms);
    }
    Ok(())
}

/// Accept hex with optional whitespace, colons or a leading `0x`.
fn parse_payload(input: &str) -> Result<Vec<u8>, CliError> {
    let trimmed = input.trim();
    let trimmed = trimmed.strip_prefix("0x").unwrap_or(trimmed);
    let digits: String = trimmed
        .chars()
        .filter(|c| !c.is_whitespace() && *c != ':')
        .collect();
    hex::decode(&digits).map_err(|e| CliError::invalid_payload(e.to_string()))
}

fn describe(message: &SyncMessage, now: u64) -> DecodedMessage {
    DecodedMessage {
        sender: message.sender.to_string(),
        originator: message.originator.to_string(),
        precedence: message.precedence,
        num_hops: message.num_hops,
        current_pattern: format!("{:08x}", message.current_pattern.bits()),
        current_pattern_name: message.current_pattern.name(),
        next_pattern: format!("{:08x}", message.next_pattern.bits()),
        next_pattern_name: message.next_pattern.name(),
        current_pattern_age_ms: now.saturating_sub(message.current_pattern_start_time),
        origination_age_ms: now.saturating_sub(message.last_origination_time),
    }
}
