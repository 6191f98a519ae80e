//! Wire protocol shared by the scoring station and the traffic generator.
//!
//! Equipment talks to the station with short ASCII datagrams. Payloads are
//! case-sensitive and trimmed of surrounding whitespace before matching:
//!
//! | Payload       | Event                                   |
//! |---------------|-----------------------------------------|
//! | `<int>:<int>` | [`Event::Hit`] (shooter id, target id)  |
//! | `202`         | [`Event::GameStart`]                    |
//! | `221`         | [`Event::GameEnd`]                      |
//! | `53`          | [`Event::BaseHit`] for [`Team::Red`]    |
//! | `43`          | [`Event::BaseHit`] for [`Team::Green`]  |
//!
//! Anything else fails with [`DecodeError::Unrecognized`] and is meant to be
//! dropped by the receiver.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

pub const START_CODE: &str = "202";
pub const END_CODE: &str = "221";
pub const RED_BASE_CODE: &str = "53";
pub const GREEN_BASE_CODE: &str = "43";

pub const DEFAULT_HOST: &str = "127.0.0.1";
pub const DEFAULT_RX_PORT: u16 = 7501;
pub const DEFAULT_TX_PORT: u16 = 7500;
pub const RECV_BUFFER_SIZE: usize = 1024;

/// How many times a sender transmits the end-of-match literal.
pub const END_REPEAT: usize = 3;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Team {
    Red,
    Green,
}

impl Team {
    pub const ALL: [Team; 2] = [Team::Red, Team::Green];

    pub fn opponent(self) -> Team {
        match self {
            Team::Red => Team::Green,
            Team::Green => Team::Red,
        }
    }

    pub fn base_code(self) -> &'static str {
        match self {
            Team::Red => RED_BASE_CODE,
            Team::Green => GREEN_BASE_CODE,
        }
    }
}

impl fmt::Display for Team {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Team::Red => f.write_str("Red"),
            Team::Green => f.write_str("Green"),
        }
    }
}

impl FromStr for Team {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "red" => Ok(Team::Red),
            "green" => Ok(Team::Green),
            other => Err(format!("Invalid team '{}'. Must be 'Red' or 'Green'", other)),
        }
    }
}

/// A decoded datagram.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Event {
    Hit { shooter_id: u32, target_id: u32 },
    BaseHit { team: Team },
    GameStart,
    GameEnd,
}

impl Event {
    /// Number of times a sender should put this event on the wire.
    ///
    /// Only the end-of-match literal is repeated; receivers absorb the copies.
    pub fn transmissions(&self) -> usize {
        match self {
            Event::GameEnd => END_REPEAT,
            _ => 1,
        }
    }
}

impl fmt::Display for Event {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Event::Hit {
                shooter_id,
                target_id,
            } => write!(f, "{}:{}", shooter_id, target_id),
            Event::BaseHit { team } => f.write_str(team.base_code()),
            Event::GameStart => f.write_str(START_CODE),
            Event::GameEnd => f.write_str(END_CODE),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum DecodeError {
    #[error("unrecognized payload {0:?}")]
    Unrecognized(String),
}

impl FromStr for Event {
    type Err = DecodeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let payload = s.trim();

        if let Some((shooter, target)) = payload.split_once(':') {
            return match (parse_id(shooter), parse_id(target)) {
                (Some(shooter_id), Some(target_id)) => Ok(Event::Hit {
                    shooter_id,
                    target_id,
                }),
                _ => Err(DecodeError::Unrecognized(payload.to_string())),
            };
        }

        match payload {
            START_CODE => Ok(Event::GameStart),
            END_CODE => Ok(Event::GameEnd),
            RED_BASE_CODE => Ok(Event::BaseHit { team: Team::Red }),
            GREEN_BASE_CODE => Ok(Event::BaseHit { team: Team::Green }),
            _ => Err(DecodeError::Unrecognized(payload.to_string())),
        }
    }
}

// Digits only: rejects signs, inner whitespace and a second ':'.
fn parse_id(part: &str) -> Option<u32> {
    if part.is_empty() || !part.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    part.parse().ok()
}

/// Decodes one datagram payload.
pub fn decode(raw: &[u8]) -> Result<Event, DecodeError> {
    match std::str::from_utf8(raw) {
        Ok(text) => text.parse(),
        Err(_) => Err(DecodeError::Unrecognized(
            String::from_utf8_lossy(raw).into_owned(),
        )),
    }
}

/// Encodes one event into its datagram payload.
pub fn encode(event: &Event) -> Vec<u8> {
    event.to_string().into_bytes()
}
