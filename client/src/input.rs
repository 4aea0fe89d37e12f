//! Line commands typed by the player

use shared::Territory;
use thiserror::Error;

pub const HELP: &str = "\
Commands:
  place <territory> [armies]          claim, reinforce or place armies
  attack <from> <to>                  attack with as many dice as possible
  transfer <armies>                   move into the territory just conquered
  end [<from> <to> <armies>]          end the turn, optionally fortifying
  exchange                            trade in a set of cards
  say <text>                          chat with everyone
  board                               show the board again
  quit                                leave the game
Territories are given by id or by name, e.g. 17 or north-africa.";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    Place { territory: Territory, armies: u16 },
    Attack { from: Territory, to: Territory },
    Transfer { armies: u16 },
    End { fortify: Option<(Territory, Territory, u16)> },
    Exchange,
    Chat(String),
    Board,
    Help,
    Quit,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum InputError {
    #[error("type 'help' for the list of commands")]
    Empty,
    #[error("unknown command '{0}'")]
    UnknownCommand(String),
    #[error("usage: {0}")]
    Usage(&'static str),
    #[error("no territory called '{0}'")]
    Territory(String),
    #[error("'{0}' is not an army count")]
    Armies(String),
}

/// Territory by numeric id or by name. Case, spaces, dashes and underscores
/// in names are ignored.
pub fn parse_territory(word: &str) -> Result<Territory, InputError> {
    if let Ok(id) = word.parse::<u8>() {
        return Territory::from_id(id)
            .ok_or_else(|| InputError::Territory(word.to_string()));
    }

    let wanted = normalize(word);
    Territory::all()
        .find(|territory| normalize(territory.name()) == wanted)
        .ok_or_else(|| InputError::Territory(word.to_string()))
}

fn normalize(name: &str) -> String {
    name.chars()
        .filter(char::is_ascii_alphanumeric)
        .map(|c| c.to_ascii_lowercase())
        .collect()
}

fn parse_armies(word: &str) -> Result<u16, InputError> {
    word.parse()
        .map_err(|_| InputError::Armies(word.to_string()))
}

pub fn parse_command(line: &str) -> Result<Command, InputError> {
    let line = line.trim();
    let (verb, rest) = match line.split_once(char::is_whitespace) {
        Some((verb, rest)) => (verb, rest.trim()),
        None => (line, ""),
    };
    let args: Vec<&str> = rest.split_whitespace().collect();

    let command = match (verb.to_ascii_lowercase().as_str(), args.as_slice()) {
        ("", _) => return Err(InputError::Empty),
        ("place", [territory]) => Command::Place {
            territory: parse_territory(territory)?,
            armies: 1,
        },
        ("place", [territory, armies]) => Command::Place {
            territory: parse_territory(territory)?,
            armies: parse_armies(armies)?,
        },
        ("place", _) => return Err(InputError::Usage("place <territory> [armies]")),
        ("attack", [from, to]) => Command::Attack {
            from: parse_territory(from)?,
            to: parse_territory(to)?,
        },
        ("attack", _) => return Err(InputError::Usage("attack <from> <to>")),
        ("transfer", [armies]) => Command::Transfer {
            armies: parse_armies(armies)?,
        },
        ("transfer", _) => return Err(InputError::Usage("transfer <armies>")),
        ("end", []) => Command::End { fortify: None },
        ("end", [from, to, armies]) => Command::End {
            fortify: Some((
                parse_territory(from)?,
                parse_territory(to)?,
                parse_armies(armies)?,
            )),
        },
        ("end", _) => return Err(InputError::Usage("end [<from> <to> <armies>]")),
        ("exchange", []) => Command::Exchange,
        ("say" | "chat", _) if !rest.is_empty() => Command::Chat(rest.to_string()),
        ("say" | "chat", _) => return Err(InputError::Usage("say <text>")),
        ("board", []) => Command::Board,
        ("help", _) => Command::Help,
        ("quit" | "exit", []) => Command::Quit,
        (other, _) => return Err(InputError::UnknownCommand(other.to_string())),
    };
    Ok(command)
}
