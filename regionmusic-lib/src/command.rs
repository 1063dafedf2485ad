//! Colon-delimited text commands.
//!
//! ```text
//! MUSIC:<file>:<loop>:<fade>   STOP[:<fade>]   VOLUME:<float>   GET_VOLUME
//! CONFIG  LIST  INIT  FORMATS  SHUTDOWN|LOGOUT  CACHE_<STATS|CLEAR|STATUS|
//! INFO|RAM_CLEAR|DISK_CLEAR|OPTIMIZE>  <file>
//! ```
//!
//! Any other non-empty text plays that file without looping or fading.

use std::str::FromStr;

use thiserror::Error;

/// Parsed command.
#[derive(Debug, Clone, PartialEq)]
pub enum Command {
    Play {
        filename: String,
        looping: bool,
        fade: bool,
    },
    Stop {
        fade: bool,
    },
    /// Slider position, usually in `[0, 1]`.
    Volume(f32),
    GetVolume,
    Config,
    List,
    Init,
    Formats,
    Shutdown,
    CacheStats,
    CacheClear,
    CacheStatus,
    CacheInfo,
    CacheRamClear,
    CacheDiskClear,
    CacheOptimize,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CommandError {
    #[error("empty command")]
    Empty,
    #[error("invalid volume: {0:?}")]
    InvalidVolume(String),
    #[error("invalid music command, expected MUSIC:<file>:<loop>:<fade>")]
    MalformedMusic,
    #[error("unknown cache command: {0}")]
    UnknownCacheCommand(String),
}

/// `true` only for a case-insensitive "true".
fn parse_flag(value: &str) -> bool {
    value.eq_ignore_ascii_case("true")
}

impl FromStr for Command {
    type Err = CommandError;

    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        if raw.trim().is_empty() {
            return Err(CommandError::Empty);
        }

        if let Some(value) = raw.strip_prefix("VOLUME:") {
            let volume = value
                .trim()
                .parse::<f32>()
                .map_err(|_| CommandError::InvalidVolume(value.to_string()))?;
            return Ok(Command::Volume(volume));
        }
        if raw == "GET_VOLUME" {
            return Ok(Command::GetVolume);
        }
        if raw == "CONFIG" {
            return Ok(Command::Config);
        }
        if raw.starts_with("MUSIC:") {
            let parts: Vec<&str> = raw.splitn(4, ':').collect();
            if parts.len() < 4 {
                return Err(CommandError::MalformedMusic);
            }
            return Ok(Command::Play {
                filename: parts[1].to_string(),
                looping: parse_flag(parts[2]),
                fade: parse_flag(parts[3]),
            });
        }
        if let Some(value) = raw.strip_prefix("STOP:") {
            return Ok(Command::Stop {
                fade: parse_flag(value),
            });
        }

        let upper = raw.to_uppercase();
        if upper.starts_with("CACHE_") {
            return match upper.as_str() {
                "CACHE_STATS" => Ok(Command::CacheStats),
                "CACHE_CLEAR" => Ok(Command::CacheClear),
                "CACHE_STATUS" => Ok(Command::CacheStatus),
                "CACHE_INFO" => Ok(Command::CacheInfo),
                "CACHE_RAM_CLEAR" => Ok(Command::CacheRamClear),
                "CACHE_DISK_CLEAR" => Ok(Command::CacheDiskClear),
                "CACHE_OPTIMIZE" => Ok(Command::CacheOptimize),
                _ => Err(CommandError::UnknownCacheCommand(raw.to_string())),
            };
        }

        Ok(match upper.as_str() {
            "STOP" => Command::Stop { fade: false },
            "INIT" => Command::Init,
            "LIST" => Command::List,
            "FORMATS" => Command::Formats,
            "LOGOUT" | "SHUTDOWN" => Command::Shutdown,
            _ => Command::Play {
                filename: raw.to_string(),
                looping: false,
                fade: false,
            },
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(raw: &str) -> Result<Command, CommandError> {
        raw.parse()
    }

    #[test]
    fn music_command_carries_flags() {
        assert_eq!(
            parse("MUSIC:tavern.ogg:true:TRUE").unwrap(),
            Command::Play {
                filename: "tavern.ogg".into(),
                looping: true,
                fade: true,
            }
        );
        assert_eq!(
            parse("MUSIC:a.wav:yes:1").unwrap(),
            Command::Play {
                filename: "a.wav".into(),
                looping: false,
                fade: false,
            }
        );
    }

    #[test]
    fn music_fade_field_keeps_extra_colons() {
        assert_eq!(
            parse("MUSIC:a.wav:true:true:extra").unwrap(),
            Command::Play {
                filename: "a.wav".into(),
                looping: true,
                fade: false,
            }
        );
    }

    #[test]
    fn short_music_command_is_malformed() {
        assert_eq!(parse("MUSIC:a.wav:true"), Err(CommandError::MalformedMusic));
    }

    #[test]
    fn volume_parses_float_or_fails() {
        assert_eq!(parse("VOLUME: 0.5").unwrap(), Command::Volume(0.5));
        assert_eq!(
            parse("VOLUME:loud"),
            Err(CommandError::InvalidVolume("loud".into()))
        );
    }

    #[test]
    fn stop_variants() {
        assert_eq!(parse("STOP").unwrap(), Command::Stop { fade: false });
        assert_eq!(parse("stop").unwrap(), Command::Stop { fade: false });
        assert_eq!(parse("STOP:true").unwrap(), Command::Stop { fade: true });
        assert_eq!(parse("STOP:nope").unwrap(), Command::Stop { fade: false });
    }

    #[test]
    fn keywords_are_case_insensitive() {
        assert_eq!(parse("list").unwrap(), Command::List);
        assert_eq!(parse("Init").unwrap(), Command::Init);
        assert_eq!(parse("formats").unwrap(), Command::Formats);
        assert_eq!(parse("logout").unwrap(), Command::Shutdown);
        assert_eq!(parse("SHUTDOWN").unwrap(), Command::Shutdown);
        assert_eq!(parse("cache_optimize").unwrap(), Command::CacheOptimize);
        assert_eq!(parse("CACHE_RAM_CLEAR").unwrap(), Command::CacheRamClear);
    }

    #[test]
    fn exact_match_commands_are_case_sensitive() {
        assert_eq!(parse("GET_VOLUME").unwrap(), Command::GetVolume);
        assert_eq!(parse("CONFIG").unwrap(), Command::Config);
        assert!(matches!(parse("config").unwrap(), Command::Play { .. }));
    }

    #[test]
    fn unknown_cache_command_is_rejected() {
        assert_eq!(
            parse("CACHE_PURGE"),
            Err(CommandError::UnknownCacheCommand("CACHE_PURGE".into()))
        );
    }

    #[test]
    fn bare_text_plays_without_loop_or_fade() {
        assert_eq!(
            parse("forest.wav").unwrap(),
            Command::Play {
                filename: "forest.wav".into(),
                looping: false,
                fade: false,
            }
        );
        assert_eq!(parse("   "), Err(CommandError::Empty));
    }
}
