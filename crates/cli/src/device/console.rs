//! Operator console commands read line by line from stdin.

use std::str::FromStr;

use contracts::{Milliseconds, PatternId};
use sync_engine::SyncEngine;
use tracing::info;

use crate::error::CliError;

/// One parsed console line
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConsoleCommand {
    /// Skip to the next pattern and stop looping
    Next,
    /// Keep playing the current pattern
    Loop,
    /// Leave special mode, or stop looping
    Stop,
    /// Play a specific pattern
    Pattern(PatternId),
    /// Force a palette onto generated patterns
    Palette(u16),
    /// Drop the forced palette
    NoPalette,
    /// Step through the calibration and solid colour looks
    Special,
    /// Report what is playing
    Status,
}

impl FromStr for ConsoleCommand {
    type Err = CliError;

    fn from_str(line: &str) -> Result<Self, Self::Err> {
        let mut words = line.split_whitespace();
        let command = words.next().unwrap_or_default().to_ascii_lowercase();
        let argument = words.next();

        let parsed = match (command.as_str(), argument) {
            ("next", None) => Self::Next,
            ("prev" | "loop", None) => Self::Loop,
            ("stop", None) => Self::Stop,
            ("nopalette", None) => Self::NoPalette,
            ("special", None) => Self::Special,
            ("status" | "status?", None) => Self::Status,
            ("pattern", Some(arg)) => Self::Pattern(PatternId::new(parse_hex(line, arg)?)),
            ("palette", Some(arg)) => Self::Palette(
                arg.parse()
                    .map_err(|e| CliError::console(line, format!("palette: {e}")))?,
            ),
            ("pattern" | "palette", None) => {
                return Err(CliError::console(line, "missing argument"));
            }
            ("", _) => return Err(CliError::console(line, "empty line")),
            _ => return Err(CliError::console(line, "unknown command")),
        };

        if words.next().is_some() {
            return Err(CliError::console(line, "too many arguments"));
        }
        Ok(parsed)
    }
}

fn parse_hex(line: &str, arg: &str) -> Result<u32, CliError> {
    let digits = arg
        .strip_prefix("0x")
        .or_else(|| arg.strip_prefix("0X"))
        .unwrap_or(arg);
    u32::from_str_radix(digits, 16).map_err(|e| CliError::console(line, format!("pattern: {e}")))
}

impl ConsoleCommand {
    /// Apply to the engine and return the line to show the operator.
    pub fn apply(self, engine: &mut SyncEngine, now: Milliseconds) -> String {
        info!(command = ?self, "console command");
        match self {
            Self::Next => return engine.handle_command("next", now),
            Self::Loop => return engine.handle_command("prev", now),
            Self::Status => return engine.handle_command("status?", now),
            Self::Stop if engine.in_special_mode() => engine.stop_special(now),
            Self::Stop => engine.stop_looping(now),
            Self::Pattern(pattern) => {
                if !engine.set_pattern(pattern, now) {
                    return format!("! unknown pattern {:08x}", pattern.bits());
                }
            }
            Self::Palette(palette) => engine.force_palette(palette, now),
            Self::NoPalette => engine.stop_force_palette(now),
            Self::Special => engine.cycle_special(now),
        }
        engine.handle_command("status?", now)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use contracts::{BuiltinPattern, SyncEngineConfig};

    fn engine() -> SyncEngine {
        let mut engine = SyncEngine::new(SyncEngineConfig::default());
        engine.begin(1_000);
        engine
    }

    #[test]
    fn test_parse_simple_commands() {
        assert_eq!("next".parse::<ConsoleCommand>().unwrap(), ConsoleCommand::Next);
        assert_eq!("prev".parse::<ConsoleCommand>().unwrap(), ConsoleCommand::Loop);
        assert_eq!(" LOOP ".parse::<ConsoleCommand>().unwrap(), ConsoleCommand::Loop);
        assert_eq!("status?".parse::<ConsoleCommand>().unwrap(), ConsoleCommand::Status);
        assert_eq!(
            "nopalette".parse::<ConsoleCommand>().unwrap(),
            ConsoleCommand::NoPalette
        );
    }

    #[test]
    fn test_parse_arguments() {
        assert_eq!(
            "pattern 0x00b3db69".parse::<ConsoleCommand>().unwrap(),
            ConsoleCommand::Pattern(PatternId::START)
        );
        assert_eq!(
            "pattern b3db69".parse::<ConsoleCommand>().unwrap(),
            ConsoleCommand::Pattern(PatternId::START)
        );
        assert_eq!(
            "palette 3".parse::<ConsoleCommand>().unwrap(),
            ConsoleCommand::Palette(3)
        );
    }

    #[test]
    fn test_parse_errors() {
        let err = "dance".parse::<ConsoleCommand>().unwrap_err();
        assert!(err.to_string().contains("unknown command"));
        assert!("pattern".parse::<ConsoleCommand>().is_err());
        assert!("pattern zz".parse::<ConsoleCommand>().is_err());
        assert!("next please".parse::<ConsoleCommand>().is_err());
        assert!("".parse::<ConsoleCommand>().is_err());
    }

    #[test]
    fn test_apply_reports_playing() {
        let mut engine = engine();
        let reply = ConsoleCommand::Status.apply(&mut engine, 1_010);
        assert!(reply.starts_with("playing "), "got: {reply}");
    }

    #[test]
    fn test_apply_loop_and_stop() {
        let mut engine = engine();
        ConsoleCommand::Loop.apply(&mut engine, 1_010);
        assert!(engine.is_looping());
        ConsoleCommand::Stop.apply(&mut engine, 1_020);
        assert!(!engine.is_looping());
    }

    #[test]
    fn test_apply_special_then_stop() {
        let mut engine = engine();
        ConsoleCommand::Special.apply(&mut engine, 1_010);
        assert!(engine.in_special_mode());
        ConsoleCommand::Stop.apply(&mut engine, 1_020);
        assert!(!engine.in_special_mode());
    }

    #[test]
    fn test_apply_pattern() {
        let mut engine = engine();
        let red = BuiltinPattern::Red.pattern_id();
        let reply = ConsoleCommand::Pattern(red).apply(&mut engine, 1_010);
        assert_eq!(engine.current_pattern(), red);
        assert_eq!(reply, format!("playing {}", red.name()));

        let reply = ConsoleCommand::Pattern(PatternId::new(0x0000_4200)).apply(&mut engine, 1_020);
        assert!(reply.starts_with("! unknown pattern"), "got: {reply}");
    }
}
