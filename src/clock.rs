//! The fixed game-clock scale at which score margins are sampled.

use std::fmt::{Display, Formatter};
use std::str::FromStr;

use thiserror::Error;

/// One sampling position on the game clock: whole minutes remaining, or
/// seconds remaining inside the final minute.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Checkpoint {
    Minutes(u8),
    Seconds(u8),
}

use Checkpoint::{Minutes, Seconds};

/// Sampling positions from the opening tip (48 minutes remaining) to the final
/// buzzer. The scale jumps from 48 straight to 36, proceeds minute by minute,
/// and switches to five-second resolution inside the final minute.
pub const CHECKPOINTS: [Checkpoint; 43] = [
    Minutes(48),
    Minutes(36),
    Minutes(35),
    Minutes(34),
    Minutes(33),
    Minutes(32),
    Minutes(31),
    Minutes(30),
    Minutes(29),
    Minutes(28),
    Minutes(27),
    Minutes(26),
    Minutes(25),
    Minutes(24),
    Minutes(23),
    Minutes(22),
    Minutes(21),
    Minutes(20),
    Minutes(19),
    Minutes(18),
    Minutes(17),
    Minutes(16),
    Minutes(15),
    Minutes(14),
    Minutes(13),
    Minutes(12),
    Minutes(11),
    Minutes(10),
    Minutes(9),
    Minutes(8),
    Minutes(7),
    Minutes(6),
    Minutes(5),
    Minutes(4),
    Minutes(3),
    Minutes(2),
    Minutes(1),
    Seconds(45),
    Seconds(30),
    Seconds(15),
    Seconds(10),
    Seconds(5),
    Minutes(0),
];

impl Checkpoint {
    /// Position of this checkpoint on the sampling scale, if it lies on it.
    pub fn index(&self) -> Option<usize> {
        CHECKPOINTS.iter().position(|checkpoint| checkpoint == self)
    }
}

impl Display for Checkpoint {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Minutes(minutes) => write!(f, "{minutes}"),
            Seconds(seconds) => write!(f, "{seconds}s"),
        }
    }
}

#[derive(Debug, Error, PartialEq, Eq)]
#[error("'{0}' is not a position on the sampling scale")]
pub struct CheckpointParseError(String);

impl FromStr for Checkpoint {
    type Err = CheckpointParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let checkpoint = match s.strip_suffix('s') {
            Some(seconds) => seconds
                .parse()
                .map(Seconds)
                .map_err(|_| CheckpointParseError(s.into()))?,
            None => s
                .parse()
                .map(Minutes)
                .map_err(|_| CheckpointParseError(s.into()))?,
        };
        match checkpoint.index() {
            Some(_) => Ok(checkpoint),
            None => Err(CheckpointParseError(s.into())),
        }
    }
}
