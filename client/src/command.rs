use shared::{Event, Team};
use std::str::FromStr;

pub const HELP: &str = "\
Commands:
  hit <shooter> <target>   tag a player
  base <red|green>         score a base hit for the team
  start                    send the start code
  end                      send the end code (three times)
  random [count]           send random hits and base hits
  raw <text>               send text as-is
  help                     show this message
  quit                     leave";

/// One line typed at the interactive console.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    Send(Event),
    Random(usize),
    Raw(String),
    Help,
    Quit,
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum CommandError {
    #[error("empty command")]
    Empty,
    #[error("unknown command '{0}', try 'help'")]
    Unknown(String),
    #[error("usage: {0}")]
    Usage(&'static str),
    #[error("'{0}' is not a player id")]
    BadId(String),
    #[error("{0}")]
    BadTeam(String),
}

fn parse_id(word: &str) -> Result<u32, CommandError> {
    word.parse().map_err(|_| CommandError::BadId(word.to_string()))
}

impl FromStr for Command {
    type Err = CommandError;

    fn from_str(line: &str) -> Result<Self, Self::Err> {
        let line = line.trim();
        let (verb, rest) = line.split_once(char::is_whitespace).unwrap_or((line, ""));
        let args: Vec<&str> = rest.split_whitespace().collect();

        match (verb.to_ascii_lowercase().as_str(), args.as_slice()) {
            ("", _) => Err(CommandError::Empty),
            ("hit", [shooter, target]) => Ok(Command::Send(Event::Hit {
                shooter_id: parse_id(shooter)?,
                target_id: parse_id(target)?,
            })),
            ("hit", _) => Err(CommandError::Usage("hit <shooter> <target>")),
            ("base", [team]) => {
                let team: Team = team.parse().map_err(CommandError::BadTeam)?;
                Ok(Command::Send(Event::BaseHit { team }))
            }
            ("base", _) => Err(CommandError::Usage("base <red|green>")),
            ("start", []) => Ok(Command::Send(Event::GameStart)),
            ("end", []) => Ok(Command::Send(Event::GameEnd)),
            ("start", _) => Err(CommandError::Usage("start")),
            ("end", _) => Err(CommandError::Usage("end")),
            ("random", []) => Ok(Command::Random(1)),
            ("random", [count]) => count
                .parse()
                .map(Command::Random)
                .map_err(|_| CommandError::Usage("random [count]")),
            ("raw", _) if !rest.trim().is_empty() => Ok(Command::Raw(rest.trim().to_string())),
            ("raw", _) => Err(CommandError::Usage("raw <text>")),
            ("help" | "?", _) => Ok(Command::Help),
            ("quit" | "exit" | "q", _) => Ok(Command::Quit),
            _ => Err(CommandError::Unknown(verb.to_string())),
        }
    }
}
