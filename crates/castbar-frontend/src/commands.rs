//! Commands typed into the terminal shell. Each one mirrors a tray menu entry.

use std::str::FromStr;

use castbar_bridge::config::{PlayerHardwareDecode, PlayerPosition, PlayerSize};

pub const HELP: &str = "\
commands:
  toggle            start or stop casting
  check             check for updates
  about             open the project page
  status            show the current state and settings
  size <n>          player size (see status for the indices)
  position <n>      player position
  hw <n>            hardware decoding mode
  autocheck on|off  check for updates on startup
  login on|off      start at login
  copy              print the URI of the playing video
  help              show this text
  quit              stop casting and exit";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Command {
    Toggle,
    CheckUpdate,
    About,
    Status,
    Size(PlayerSize),
    Position(PlayerPosition),
    HardwareDecode(PlayerHardwareDecode),
    AutoCheck(bool),
    StartAtLogin(bool),
    CopyUri,
    Help,
    Quit,
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum CommandError {
    #[error("empty command")]
    Empty,
    #[error("unknown command {0:?}, type `help` for a list")]
    Unknown(String),
    #[error("`{0}` needs an argument")]
    MissingArgument(&'static str),
    #[error("`{command}` does not accept {value:?}")]
    InvalidArgument {
        command: &'static str,
        value: String,
    },
}

fn index_argument<T>(
    command: &'static str,
    argument: Option<&str>,
    from_index: impl Fn(i64) -> Option<T>,
) -> Result<T, CommandError> {
    let value = argument.ok_or(CommandError::MissingArgument(command))?;
    value
        .parse::<i64>()
        .ok()
        .and_then(from_index)
        .ok_or_else(|| CommandError::InvalidArgument {
            command,
            value: value.to_string(),
        })
}

fn switch_argument(command: &'static str, argument: Option<&str>) -> Result<bool, CommandError> {
    match argument {
        Some("on" | "1" | "true") => Ok(true),
        Some("off" | "0" | "false") => Ok(false),
        Some(value) => Err(CommandError::InvalidArgument {
            command,
            value: value.to_string(),
        }),
        None => Err(CommandError::MissingArgument(command)),
    }
}

impl FromStr for Command {
    type Err = CommandError;

    fn from_str(line: &str) -> Result<Self, Self::Err> {
        let mut words = line.split_whitespace();
        let name = words.next().ok_or(CommandError::Empty)?.to_ascii_lowercase();
        let argument = words.next();

        let command = match name.as_str() {
            "toggle" | "t" => Self::Toggle,
            "check" => Self::CheckUpdate,
            "about" => Self::About,
            "status" | "s" => Self::Status,
            "size" => Self::Size(index_argument("size", argument, PlayerSize::from_index)?),
            "position" | "pos" => Self::Position(index_argument(
                "position",
                argument,
                PlayerPosition::from_index,
            )?),
            "hw" => Self::HardwareDecode(index_argument(
                "hw",
                argument,
                PlayerHardwareDecode::from_index,
            )?),
            "autocheck" => Self::AutoCheck(switch_argument("autocheck", argument)?),
            "login" => Self::StartAtLogin(switch_argument("login", argument)?),
            "copy" => Self::CopyUri,
            "help" | "?" => Self::Help,
            "quit" | "q" | "exit" => Self::Quit,
            _ => return Err(CommandError::Unknown(name)),
        };
        Ok(command)
    }
}
